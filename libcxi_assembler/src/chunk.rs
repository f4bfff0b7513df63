use std::collections::BTreeMap;

use super::error::RunSourceError;

/// One contiguous run of stored frames from a single (source, key) dataset.
///
/// `train_ids` and `counts` are parallel: the chunk holds `counts[i]` frames
/// of train `train_ids[i]`, stored consecutively in `dataset` starting at row
/// `first`. Chunks from one source never overlap in frame coverage.
#[derive(Debug, Clone)]
pub struct DataChunk {
    pub source: String,
    pub dataset: hdf5::Dataset,
    pub train_ids: Vec<u64>,
    pub counts: Vec<u64>,
    pub first: u64,
}

impl DataChunk {
    /// Number of stored frames covered by this chunk.
    pub fn total_frames(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// The source-index side of the assembly: hands out the chunks recorded for
/// one (source, key) pair. Iteration order is not assumed chronological; the
/// mapper anchors every chunk independently.
pub trait ChunkProvider {
    fn find_chunks(&self, source: &str, key: &str) -> Result<Vec<DataChunk>, RunSourceError>;
}

/// Per-run description of the detector: which sources exist, which module
/// number each one is, and the frame geometry shared by all of them.
#[derive(Debug, Clone)]
pub struct DetectorSources {
    /// Module number to source name, ordered by module number. The iteration
    /// order of this map defines the module axis of every assembled array.
    pub module_to_source: BTreeMap<u64, String>,
    /// Sorted unique train ids over the whole run.
    pub train_ids: Vec<u64>,
    /// Constant number of frames recorded per train.
    pub frames_per_train: usize,
    /// Intrinsic per-frame shape (y, x) of one module image.
    pub module_shape: (usize, usize),
}

impl DetectorSources {
    pub fn n_modules(&self) -> usize {
        self.module_to_source.len()
    }

    /// Module numbers in module-axis order.
    pub fn module_numbers(&self) -> Vec<u64> {
        self.module_to_source.keys().copied().collect()
    }
}
