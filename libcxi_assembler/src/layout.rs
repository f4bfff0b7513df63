use ndarray::Array2;

use super::chunk::{ChunkProvider, DetectorSources};
use super::error::AssemblerError;
use super::frame_index::FrameIndex;
use super::mapper::{ChunkMapper, MappedBlock};

/// Whether a field carries a full module image per frame or a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// (frames, modules, y, x)
    PerModuleImage,
    /// (frames, modules)
    PerFrameScalar,
}

/// Element type and fill value for the unmapped cells of a field.
#[derive(Debug, Clone, Copy)]
pub enum FieldDtype {
    Float32 { fill: f32 },
    Uint16 { fill: u16 },
}

/// One named output field and where its source values live.
#[derive(Debug)]
pub struct FieldDescriptor {
    /// Dataset name in the output container
    pub name: &'static str,
    /// Key of the source datasets, e.g. "image.data"
    pub key: &'static str,
    pub shape: FieldShape,
    pub dtype: FieldDtype,
}

/// The fixed set of per-frame fields assembled from every module stream.
pub static DETECTOR_FIELDS: [FieldDescriptor; 4] = [
    FieldDescriptor {
        name: "data",
        key: "image.data",
        shape: FieldShape::PerModuleImage,
        dtype: FieldDtype::Float32 { fill: f32::NAN },
    },
    FieldDescriptor {
        name: "gain",
        key: "image.gain",
        shape: FieldShape::PerModuleImage,
        dtype: FieldDtype::Float32 { fill: f32::NAN },
    },
    FieldDescriptor {
        name: "mask",
        key: "image.mask",
        shape: FieldShape::PerModuleImage,
        dtype: FieldDtype::Float32 { fill: f32::NAN },
    },
    FieldDescriptor {
        name: "cellId",
        key: "image.cellId",
        shape: FieldShape::PerFrameScalar,
        dtype: FieldDtype::Uint16 { fill: 0 },
    },
];

/// Tracks which (frame, module) cells of one field have a mapped block.
#[derive(Debug, Clone)]
pub struct CoverageMap {
    have_data: Array2<bool>,
}

impl CoverageMap {
    pub fn new(n_frames: usize, n_modules: usize) -> Self {
        Self {
            have_data: Array2::from_elem((n_frames, n_modules), false),
        }
    }

    pub fn mark(&mut self, frame_start: usize, len: usize, module_ix: usize) {
        for frame in frame_start..frame_start + len {
            self.have_data[[frame, module_ix]] = true;
        }
    }

    pub fn filled_cells(&self) -> usize {
        self.have_data.iter().filter(|filled| **filled).count()
    }

    pub fn total_cells(&self) -> usize {
        self.have_data.len()
    }

    pub fn filled_fraction(&self) -> f64 {
        self.filled_cells() as f64 / self.total_cells() as f64
    }

    pub fn is_complete(&self) -> bool {
        self.filled_cells() == self.total_cells()
    }
}

/// A block-reference assembly of one field: every mapped block together with
/// the dataset it points into. No payload is read while building this; the
/// writer realizes it at the very end.
#[derive(Debug)]
pub struct SourceBlock {
    pub dataset: hdf5::Dataset,
    pub block: MappedBlock,
}

#[derive(Debug)]
pub struct VirtualLayout {
    pub field: &'static FieldDescriptor,
    pub n_frames: usize,
    pub n_modules: usize,
    pub module_shape: (usize, usize),
    pub blocks: Vec<SourceBlock>,
    coverage: CoverageMap,
}

impl VirtualLayout {
    pub fn new(
        field: &'static FieldDescriptor,
        n_frames: usize,
        n_modules: usize,
        module_shape: (usize, usize),
    ) -> Self {
        Self {
            field,
            n_frames,
            n_modules,
            module_shape,
            blocks: Vec::new(),
            coverage: CoverageMap::new(n_frames, n_modules),
        }
    }

    pub fn add_block(&mut self, dataset: hdf5::Dataset, block: MappedBlock) {
        self.coverage
            .mark(block.frame_start, block.len, block.module_ix);
        self.blocks.push(SourceBlock { dataset, block });
    }

    pub fn coverage(&self) -> &CoverageMap {
        &self.coverage
    }
}

/// Run the mapper over every (module, field) pair and assemble one layout per
/// field. Partial coverage is expected here; unfilled cells keep the field's
/// fill value and the filled fraction is logged for diagnostics only.
pub fn build_layouts<P: ChunkProvider>(
    index: &FrameIndex,
    detector: &DetectorSources,
    provider: &P,
) -> Result<Vec<VirtualLayout>, AssemblerError> {
    let mapper = ChunkMapper::new(index);
    let mut layouts = Vec::with_capacity(DETECTOR_FIELDS.len());

    for field in DETECTOR_FIELDS.iter() {
        let mut layout = VirtualLayout::new(
            field,
            index.total_frames(),
            detector.n_modules(),
            detector.module_shape,
        );

        for (module_ix, source) in detector.module_to_source.values().enumerate() {
            for chunk in provider.find_chunks(source, field.key)? {
                for block in mapper.map_chunk(
                    &chunk.train_ids,
                    &chunk.counts,
                    chunk.first,
                    module_ix,
                    source,
                )? {
                    layout.add_block(chunk.dataset.clone(), block);
                }
            }
        }

        spdlog::info!(
            "Assembled {} blocks for {}, filling {:.2}% of the hyperslab",
            layout.blocks.len(),
            field.key,
            layout.coverage().filled_fraction() * 100.0
        );
        layouts.push(layout);
    }

    Ok(layouts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_coverage() {
        let mut coverage = CoverageMap::new(6, 2);
        for module_ix in 0..2 {
            coverage.mark(0, 6, module_ix);
        }
        assert!(coverage.is_complete());
        assert_eq!(coverage.filled_cells(), 12);
        assert_eq!(coverage.filled_fraction(), 1.0);
    }

    #[test]
    fn test_partial_coverage_is_reported_not_failed() {
        let mut coverage = CoverageMap::new(6, 2);
        coverage.mark(0, 6, 0);
        coverage.mark(0, 2, 1);
        coverage.mark(4, 2, 1);
        assert!(!coverage.is_complete());
        assert_eq!(coverage.filled_cells(), 10);
        assert!((coverage.filled_fraction() - 10.0 / 12.0).abs() < 1e-12);
    }
}
