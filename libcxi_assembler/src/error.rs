use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FrameIndexError {
    #[error("Cannot build a frame index from an empty train list")]
    EmptyTrainList,
    #[error("Cannot build a frame index with zero frames per train")]
    ZeroFramesPerTrain,
    #[error("Train ids given to the frame index must be sorted and unique")]
    UnsortedTrainIds,
}

#[derive(Debug, Clone, Error)]
pub enum ChunkMapError {
    #[error("Chunk from source {source_name} references train {train_id} which is not in the frame index")]
    UnknownTrainId { train_id: u64, source_name: String },
    #[error("Chunk from source {source_name} anchored at train {train_id} extends past the last train in the frame index")]
    ChunkPastEnd { train_id: u64, source_name: String },
    #[error("Chunk from source {source_name} has extra frames of train {train_id} beyond the global frames per train; they would overlap already mapped frames")]
    MisalignedChunk { train_id: u64, source_name: String },
    #[error("Chunk from source {source_name} has train id and count lists of different lengths")]
    MismatchedIndex { source_name: String },
}

#[derive(Debug, Clone, Error)]
pub enum PulseIdError {
    #[error("Failed to find pulse ids for {} frames (first missing frame: {})", .0.len(), .0.first().copied().unwrap_or_default())]
    MissingFrames(Vec<usize>),
    #[error("Inconsistent pulse ids between modules for {} frames (first offending frame: {})", .0.len(), .0.first().copied().unwrap_or_default())]
    InconsistentFrames(Vec<usize>),
    #[error("Pulse id collection failed while mapping a chunk: {0}")]
    MapError(#[from] ChunkMapError),
}

#[derive(Debug, Error)]
pub enum RunSourceError {
    #[error("Could not open run directory because {0:?} does not exist")]
    BadRunPath(PathBuf),
    #[error("Run directory does not contain any detector module sources")]
    NoModuleSources,
    #[error("Could not parse a module number from source name {0}")]
    BadSourceName(String),
    #[error("Index for source {0} has mismatched train/first/count lengths")]
    MalformedIndex(String),
    #[error("Image dataset for source {0} does not have (frames, y, x) shape")]
    BadDataShape(String),
    #[error("RunDirectory failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("RunDirectory failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
}

#[derive(Debug, Error)]
pub enum CxiWriterError {
    #[error("CxiWriter failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("CxiWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("Assembler failed due to FrameIndex error: {0}")]
    FrameIndexError(#[from] FrameIndexError),
    #[error("Assembler failed due to ChunkMapper error: {0}")]
    ChunkMapError(#[from] ChunkMapError),
    #[error("Assembler failed due to PulseId error: {0}")]
    PulseIdError(#[from] PulseIdError),
    #[error("Assembler failed due to RunDirectory error: {0}")]
    RunSourceError(#[from] RunSourceError),
    #[error("Assembler failed due to CxiWriter error: {0}")]
    WriterError(#[from] CxiWriterError),
    #[error("Assembler failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Assembler failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
}
