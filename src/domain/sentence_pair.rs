// ============================================================
// Layer 3 - SentencePair Domain Type
// ============================================================
// One aligned training example: a source sentence and its
// reference translation, both already mapped to vocabulary ids.
//
// Both sequences end with the end-of-sentence id. The decoder
// input (target shifted right) is derived later by the batcher,
// so only the raw sequences are stored here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    /// Line index in the split files
    pub id: usize,

    /// Source token ids, EOS terminated
    pub source: Vec<u32>,

    /// Target token ids, EOS terminated
    pub target: Vec<u32>,
}

impl SentencePair {
    pub fn new(id: usize, source: Vec<u32>, target: Vec<u32>) -> Self {
        Self { id, source, target }
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn target_len(&self) -> usize {
        self.target.len()
    }

    /// Longest side, used when packing batches under a token budget
    pub fn max_len(&self) -> usize {
        self.source_len().max(self.target_len())
    }

    /// True when both sides fit the (source, target) position limits
    pub fn fits(&self, max_positions: (usize, usize)) -> bool {
        self.source_len() <= max_positions.0 && self.target_len() <= max_positions.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_checks_both_sides() {
        let pair = SentencePair::new(0, vec![4, 5, 2], vec![6, 2]);
        assert!(pair.fits((3, 2)));
        assert!(!pair.fits((2, 2)));
        assert!(!pair.fits((3, 1)));
        assert_eq!(pair.max_len(), 3);
    }
}
