use super::error::ChunkMapError;
use super::frame_index::FrameIndex;

/// One contiguous block reference into the assembled array.
///
/// `len` consecutive stored frames starting at row `source_start` of the
/// chunk's dataset land at frame slots `frame_start..frame_start + len` of
/// module `module_ix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedBlock {
    pub frame_start: usize,
    pub len: usize,
    pub source_start: u64,
    pub module_ix: usize,
}

/// Matches one chunk's train id sequence against the global frame index.
///
/// A chunk points at physically contiguous source data, but if the module
/// dropped a train the chunk does not correspond to a contiguous region of
/// the assembled array. The mapper splits the chunk into the minimal set of
/// contiguous block references without ever touching the payload.
#[derive(Debug)]
pub struct ChunkMapper<'a> {
    index: &'a FrameIndex,
}

impl<'a> ChunkMapper<'a> {
    pub fn new(index: &'a FrameIndex) -> Self {
        Self { index }
    }

    /// Map one chunk, given as parallel (train id, count) lists and the row
    /// offset of its first stored frame. `source` is only used to identify
    /// the offending module in errors.
    ///
    /// Runs in a single forward scan over the chunk, no backtracking.
    pub fn map_chunk(
        &self,
        train_ids: &[u64],
        counts: &[u64],
        first: u64,
        module_ix: usize,
        source: &str,
    ) -> Result<Vec<MappedBlock>, ChunkMapError> {
        if train_ids.len() != counts.len() {
            return Err(ChunkMapError::MismatchedIndex {
                source_name: source.to_string(),
            });
        }

        // Expand the train id list to one entry per stored frame
        let total: u64 = counts.iter().sum();
        let mut chunk_tids = Vec::with_capacity(total as usize);
        for (&tid, &count) in train_ids.iter().zip(counts.iter()) {
            chunk_tids.extend(std::iter::repeat(tid).take(count as usize));
        }

        let target_tids = self.index.per_frame_train_ids();

        let mut blocks = Vec::new();
        let mut pos = 0;
        let mut source_cursor = first;
        while pos < chunk_tids.len() {
            // Look up where the remaining chunk anchors in the target
            let anchor = chunk_tids[pos];
            let frame_start =
                self.index
                    .start_offset(anchor)
                    .ok_or_else(|| ChunkMapError::UnknownTrainId {
                        train_id: anchor,
                        source_name: source.to_string(),
                    })?;

            let remaining = chunk_tids.len() - pos;
            if frame_start + remaining > target_tids.len() {
                return Err(ChunkMapError::ChunkPastEnd {
                    train_id: anchor,
                    source_name: source.to_string(),
                });
            }
            let window = &target_tids[frame_start..frame_start + remaining];
            debug_assert_eq!(window[0], anchor);

            // How much of this chunk can be mapped in one go?
            let mut n_match = 0;
            while n_match < remaining && chunk_tids[pos + n_match] == window[n_match] {
                n_match += 1;
            }

            // If the unmatched remainder continues the train just matched,
            // the chunk holds more frames of that train than the run does
            // (or repeats it outright); re-anchoring would map those rows
            // onto frames this chunk already covered. A remainder starting
            // at a new train re-anchors cleanly at that train's first frame.
            if pos + n_match < chunk_tids.len()
                && chunk_tids[pos + n_match] == chunk_tids[pos + n_match - 1]
            {
                return Err(ChunkMapError::MisalignedChunk {
                    train_id: chunk_tids[pos + n_match],
                    source_name: source.to_string(),
                });
            }

            blocks.push(MappedBlock {
                frame_start,
                len: n_match,
                source_start: source_cursor,
                module_ix,
            });

            source_cursor += n_match as u64;
            pos += n_match;
        }

        Ok(blocks)
    }
}
