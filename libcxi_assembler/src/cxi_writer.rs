use hdf5::types::VarLenUnicode;
use hdf5::File;
use ndarray::{s, Array1, Array3};
use std::path::Path;
use std::str::FromStr;

use super::error::CxiWriterError;
use super::layout::{FieldDtype, FieldShape, VirtualLayout};

const ENTRY_NAME: &str = "entry_1";
const INSTRUMENT_NAME: &str = "instrument_1";
const DETECTOR_NAME: &str = "detector_1";
const IDENTIFIER_NAME: &str = "experiment_identifier";
const MODULE_IDENTIFIER_NAME: &str = "module_identifier";

/// This is the version tag of the output format
const FORMAT_VERSION: i32 = 150;

const AXES_PER_FRAME: &str = "experiment_identifier:module_identifier";
const AXES_PER_MODULE_IMAGE: &str = "experiment_identifier:module_identifier:y:x";

/// Per-frame composite identifiers formed as "<trainId>:<pulseId>".
pub fn composite_ids(train_ids: &[u64], pulse_ids: &Array1<u64>) -> Vec<String> {
    train_ids
        .iter()
        .zip(pulse_ids.iter())
        .map(|(tid, pid)| format!("{tid}:{pid}"))
        .collect()
}

/// A simple struct which wraps around the hdf5-rust library.
///
/// Opens an HDF5 file for writing the assembled run in the CXI layout. The
/// file handle is held exclusively for the writer's lifetime and released on
/// every exit path when the writer drops. The hdf5 crate offers no way to
/// create HDF5 virtual datasets, so each assembled field is realized as an
/// explicit block-by-block copy instead of a block-reference dataset; path
/// aliases are HDF5 soft links either way.
#[derive(Debug)]
pub struct CxiWriter {
    file_handle: File,
    entry_group: hdf5::Group,
    detector_group: hdf5::Group,
}

// Structure
// format_version(dset)
// entry_1
// |---- experiment_identifier(dset), pulseId(dset), trainId(dset)
// |---- cellId(dset) - axes
// |---- data_1 -> soft link to instrument_1/detector_1
// |---- instrument_1/detector_1
// |    |---- data(dset), gain(dset), mask(dset) - axes
// |    |---- experiment_identifier -> soft link to /entry_1/experiment_identifier
// |    |---- module_identifier(dset)

impl CxiWriter {
    /// Create the writer, opening a file at path and creating the group tree
    pub fn new(path: &Path) -> Result<Self, CxiWriterError> {
        let file_handle = File::create(path)?;

        file_handle
            .new_dataset::<i32>()
            .create("format_version")?
            .write_scalar(&FORMAT_VERSION)?;

        let entry_group = file_handle.create_group(ENTRY_NAME)?;
        let instrument_group = entry_group.create_group(INSTRUMENT_NAME)?;
        let detector_group = instrument_group.create_group(DETECTOR_NAME)?;

        Ok(Self {
            file_handle,
            entry_group,
            detector_group,
        })
    }

    /// Write the per-frame identifier arrays and the alias links that point
    /// downstream readers at them.
    pub fn write_frame_ids(
        &self,
        train_ids: &[u64],
        pulse_ids: &Array1<u64>,
    ) -> Result<(), CxiWriterError> {
        let ids: Array1<VarLenUnicode> = Array1::from(
            composite_ids(train_ids, pulse_ids)
                .iter()
                .map(|id| VarLenUnicode::from_str(id).unwrap())
                .collect::<Vec<_>>(),
        );
        self.entry_group
            .new_dataset_builder()
            .with_data(&ids)
            .create(IDENTIFIER_NAME)?;

        // pulseId and trainId are not part of the CXI standard, but the
        // format allows extra data
        self.entry_group
            .new_dataset_builder()
            .with_data(pulse_ids)
            .create("pulseId")?;
        self.entry_group
            .new_dataset_builder()
            .with_data(train_ids)
            .create("trainId")?;

        self.detector_group.link_soft(
            &format!("/{ENTRY_NAME}/{IDENTIFIER_NAME}"),
            IDENTIFIER_NAME,
        )?;
        self.entry_group.link_soft(
            &format!("/{ENTRY_NAME}/{INSTRUMENT_NAME}/{DETECTOR_NAME}"),
            "data_1",
        )?;
        Ok(())
    }

    /// Write the module numbers, in the same order as the module axis
    pub fn write_module_numbers(&self, module_numbers: &[u64]) -> Result<(), CxiWriterError> {
        self.detector_group
            .new_dataset_builder()
            .with_data(module_numbers)
            .create(MODULE_IDENTIFIER_NAME)?;
        Ok(())
    }

    /// Realize one assembled field: create the full-shape dataset with its
    /// fill value, then copy every mapped block from its source dataset.
    pub fn write_layout(&self, layout: &VirtualLayout) -> Result<(), CxiWriterError> {
        let dataset = match layout.field.dtype {
            FieldDtype::Float32 { fill } => self.write_layout_f32(layout, fill)?,
            FieldDtype::Uint16 { fill } => self.write_layout_u16(layout, fill)?,
        };

        let axes = match layout.field.shape {
            FieldShape::PerModuleImage => AXES_PER_MODULE_IMAGE,
            FieldShape::PerFrameScalar => AXES_PER_FRAME,
        };
        dataset
            .new_attr::<VarLenUnicode>()
            .create("axes")?
            .write_scalar(&VarLenUnicode::from_str(axes).unwrap())?;
        Ok(())
    }

    fn write_layout_f32(
        &self,
        layout: &VirtualLayout,
        fill: f32,
    ) -> Result<hdf5::Dataset, CxiWriterError> {
        let (y, x) = layout.module_shape;
        match layout.field.shape {
            FieldShape::PerModuleImage => {
                let dataset = self
                    .detector_group
                    .new_dataset::<f32>()
                    .shape((layout.n_frames, layout.n_modules, y, x))
                    .fill_value(fill)
                    .create(layout.field.name)?;
                for source_block in layout.blocks.iter() {
                    let block = &source_block.block;
                    let row = block.source_start as usize;
                    let values: Array3<f32> = source_block
                        .dataset
                        .read_slice(s![row..row + block.len, .., ..])?;
                    dataset.write_slice(
                        &values,
                        s![
                            block.frame_start..block.frame_start + block.len,
                            block.module_ix,
                            ..,
                            ..
                        ],
                    )?;
                }
                Ok(dataset)
            }
            FieldShape::PerFrameScalar => {
                let dataset = self
                    .entry_group
                    .new_dataset::<f32>()
                    .shape((layout.n_frames, layout.n_modules))
                    .fill_value(fill)
                    .create(layout.field.name)?;
                for source_block in layout.blocks.iter() {
                    let block = &source_block.block;
                    let values = read_scalar_rows::<f32>(&source_block.dataset, block)?;
                    dataset.write_slice(
                        &values,
                        s![
                            block.frame_start..block.frame_start + block.len,
                            block.module_ix
                        ],
                    )?;
                }
                Ok(dataset)
            }
        }
    }

    fn write_layout_u16(
        &self,
        layout: &VirtualLayout,
        fill: u16,
    ) -> Result<hdf5::Dataset, CxiWriterError> {
        let (y, x) = layout.module_shape;
        match layout.field.shape {
            FieldShape::PerModuleImage => {
                let dataset = self
                    .detector_group
                    .new_dataset::<u16>()
                    .shape((layout.n_frames, layout.n_modules, y, x))
                    .fill_value(fill)
                    .create(layout.field.name)?;
                for source_block in layout.blocks.iter() {
                    let block = &source_block.block;
                    let row = block.source_start as usize;
                    let values: Array3<u16> = source_block
                        .dataset
                        .read_slice(s![row..row + block.len, .., ..])?;
                    dataset.write_slice(
                        &values,
                        s![
                            block.frame_start..block.frame_start + block.len,
                            block.module_ix,
                            ..,
                            ..
                        ],
                    )?;
                }
                Ok(dataset)
            }
            FieldShape::PerFrameScalar => {
                let dataset = self
                    .entry_group
                    .new_dataset::<u16>()
                    .shape((layout.n_frames, layout.n_modules))
                    .fill_value(fill)
                    .create(layout.field.name)?;
                for source_block in layout.blocks.iter() {
                    let block = &source_block.block;
                    let values = read_scalar_rows::<u16>(&source_block.dataset, block)?;
                    dataset.write_slice(
                        &values,
                        s![
                            block.frame_start..block.frame_start + block.len,
                            block.module_ix
                        ],
                    )?;
                }
                Ok(dataset)
            }
        }
    }
}

/// Read one block of a per-frame scalar source. Some files store these with
/// an extra trailing dimension of length 1.
fn read_scalar_rows<T: hdf5::H5Type>(
    dataset: &hdf5::Dataset,
    block: &super::mapper::MappedBlock,
) -> Result<Array1<T>, hdf5::Error> {
    let row = block.source_start as usize;
    if dataset.ndim() > 1 {
        dataset.read_slice(s![row..row + block.len, 0])
    } else {
        dataset.read_slice(s![row..row + block.len])
    }
}
