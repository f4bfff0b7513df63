use fxhash::FxHashMap;

use super::error::FrameIndexError;

/// The global per-frame addressing scheme for one assembly run.
///
/// Every train occupies a fixed number of consecutive frame slots, so the
/// frame index of a pulse is `train_ordinal * frames_per_train + pulse_offset`.
/// The index owns the per-frame expansion of the train id list, which the
/// ChunkMapper uses as its comparison window.
#[derive(Debug, Clone)]
pub struct FrameIndex {
    frames_per_train: usize,
    per_frame: Vec<u64>,
    start_offsets: FxHashMap<u64, usize>,
}

impl FrameIndex {
    /// Build the index from the sorted unique train ids of a run.
    pub fn new(train_ids: &[u64], frames_per_train: usize) -> Result<Self, FrameIndexError> {
        if train_ids.is_empty() {
            return Err(FrameIndexError::EmptyTrainList);
        }
        if frames_per_train == 0 {
            return Err(FrameIndexError::ZeroFramesPerTrain);
        }
        if train_ids.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(FrameIndexError::UnsortedTrainIds);
        }

        let mut per_frame = Vec::with_capacity(train_ids.len() * frames_per_train);
        let mut start_offsets =
            FxHashMap::with_capacity_and_hasher(train_ids.len(), Default::default());
        for (ordinal, tid) in train_ids.iter().enumerate() {
            start_offsets.insert(*tid, ordinal * frames_per_train);
            per_frame.extend(std::iter::repeat(*tid).take(frames_per_train));
        }

        Ok(Self {
            frames_per_train,
            per_frame,
            start_offsets,
        })
    }

    pub fn total_frames(&self) -> usize {
        self.per_frame.len()
    }

    pub fn n_trains(&self) -> usize {
        self.per_frame.len() / self.frames_per_train
    }

    pub fn frames_per_train(&self) -> usize {
        self.frames_per_train
    }

    /// First frame slot of the given train, or None if the train is unknown.
    pub fn start_offset(&self, train_id: u64) -> Option<usize> {
        self.start_offsets.get(&train_id).copied()
    }

    /// The train id occupying the given frame slot.
    pub fn train_id_at(&self, frame: usize) -> u64 {
        self.per_frame[frame]
    }

    /// The train id of every frame slot, in frame order.
    pub fn per_frame_train_ids(&self) -> &[u64] {
        &self.per_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion_and_offsets() {
        let index = FrameIndex::new(&[100, 101, 102], 2).unwrap();
        assert_eq!(index.total_frames(), 6);
        assert_eq!(index.n_trains(), 3);
        assert_eq!(
            index.per_frame_train_ids(),
            &[100, 100, 101, 101, 102, 102]
        );
        assert_eq!(index.start_offset(100), Some(0));
        assert_eq!(index.start_offset(102), Some(4));
        assert_eq!(index.start_offset(103), None);
        assert_eq!(index.train_id_at(3), 101);
    }

    #[test]
    fn test_empty_train_list() {
        assert!(matches!(
            FrameIndex::new(&[], 2),
            Err(FrameIndexError::EmptyTrainList)
        ));
    }

    #[test]
    fn test_zero_frames_per_train() {
        assert!(matches!(
            FrameIndex::new(&[100], 0),
            Err(FrameIndexError::ZeroFramesPerTrain)
        ));
    }

    #[test]
    fn test_unsorted_train_ids() {
        assert!(matches!(
            FrameIndex::new(&[101, 100], 2),
            Err(FrameIndexError::UnsortedTrainIds)
        ));
        assert!(matches!(
            FrameIndex::new(&[100, 100], 2),
            Err(FrameIndexError::UnsortedTrainIds)
        ));
    }
}
