use ndarray::{Array1, Array2};

use super::error::{ChunkMapError, PulseIdError};
use super::mapper::ChunkMapper;

/// Sentinel marking a (frame, module) cell no chunk has filled yet. Real
/// machine pulse ids stay well below this value.
pub const NO_PULSE_ID: u64 = 9999;

/// Gathers the per-frame pulse id reported by every module and checks that
/// the modules agree.
///
/// The table is (frames, modules), seeded with [NO_PULSE_ID]. Validation runs
/// over the complete table before failing, so one error report names every
/// offending frame instead of the first one.
#[derive(Debug)]
pub struct PulseIdCollector {
    table: Array2<u64>,
}

impl PulseIdCollector {
    pub fn new(n_frames: usize, n_modules: usize) -> Self {
        Self {
            table: Array2::from_elem((n_frames, n_modules), NO_PULSE_ID),
        }
    }

    /// Route one chunk's pulse id values through the mapper into the table.
    ///
    /// `values` holds exactly the chunk's stored frames, so a block's row
    /// offset is relative to `first`.
    pub fn record_chunk(
        &mut self,
        mapper: &ChunkMapper,
        train_ids: &[u64],
        counts: &[u64],
        first: u64,
        values: &[u64],
        module_ix: usize,
        source: &str,
    ) -> Result<(), ChunkMapError> {
        for block in mapper.map_chunk(train_ids, counts, first, module_ix, source)? {
            let rel = (block.source_start - first) as usize;
            for offset in 0..block.len {
                self.table[[block.frame_start + offset, module_ix]] = values[rel + offset];
            }
        }
        Ok(())
    }

    /// Check full coverage and cross-module agreement, consuming the table.
    ///
    /// On success returns the one validated pulse id per frame.
    pub fn validate(self) -> Result<Array1<u64>, PulseIdError> {
        let mut missing = Vec::new();
        let mut inconsistent = Vec::new();
        let mut pulse_ids = Vec::with_capacity(self.table.nrows());

        for (frame, row) in self.table.outer_iter().enumerate() {
            let min = row.iter().copied().min().unwrap_or(NO_PULSE_ID);
            let max = row.iter().copied().max().unwrap_or(NO_PULSE_ID);
            if min == NO_PULSE_ID {
                missing.push(frame);
            } else if min != max {
                inconsistent.push(frame);
            }
            pulse_ids.push(min);
        }

        if !missing.is_empty() {
            return Err(PulseIdError::MissingFrames(missing));
        }
        if !inconsistent.is_empty() {
            return Err(PulseIdError::InconsistentFrames(inconsistent));
        }
        Ok(Array1::from(pulse_ids))
    }
}
