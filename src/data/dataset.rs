// ============================================================
// Layer 4 - Translation Dataset and Batch Planning
// ============================================================
// TranslationDataset holds one split in memory and implements
// Burn's Dataset trait. batches() plans an epoch:
//
//   1. drop pairs longer than max_positions
//   2. shuffle (seeded) so ties in length are broken differently
//      every epoch, then stable-sort by length
//   3. greedily pack under max_tokens / max_sentences, where the
//      token cost of a batch is rows × longest row (padded size)
//   4. optionally keep only N sampled batches, in planned order
//   5. shuffle the batch order unless the curriculum asks for
//      length order, then reverse it when descending
//   6. keep every num_shards-th batch starting at shard_id
//
// The result is a plain Vec<RawBatch>: the trainer consumes it
// sequentially and knows batches_per_epoch up front.
//
// Reference: Burn Book §4 (Datasets)

use burn::data::dataset::Dataset;
use rand::{
    rngs::StdRng,
    seq::{index, SliceRandom},
};

use crate::domain::sentence_pair::SentencePair;

/// A planned batch before tensor materialisation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    pub pairs: Vec<SentencePair>,
}

/// Batching constraints passed through from the configuration.
#[derive(Debug, Clone)]
pub struct BatchingOptions {
    pub max_tokens:                 Option<usize>,
    pub max_sentences:              Option<usize>,
    /// (source, target) length limits; longer pairs are skipped
    pub max_positions:              (usize, usize),
    /// Keep batches in length order (curriculum epochs)
    pub sort_by_length:             bool,
    /// Randomise tie order and batch order
    pub shuffle:                    bool,
    /// Largest batches first (validation)
    pub descending:                 bool,
    /// Keep only this many sampled batches per epoch (0 = all)
    pub sample_without_replacement: usize,
    pub shard_id:                   usize,
    pub num_shards:                 usize,
}

impl Default for BatchingOptions {
    fn default() -> Self {
        Self {
            max_tokens:                 Some(6000),
            max_sentences:              Some(64),
            max_positions:              (1024, 1024),
            sort_by_length:             false,
            shuffle:                    true,
            descending:                 false,
            sample_without_replacement: 0,
            shard_id:                   0,
            num_shards:                 1,
        }
    }
}

pub struct TranslationDataset {
    pairs: Vec<SentencePair>,
}

impl TranslationDataset {
    pub fn new(pairs: Vec<SentencePair>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[SentencePair] {
        &self.pairs
    }

    /// Plan one epoch of batches.
    pub fn batches(&self, opts: &BatchingOptions, rng: &mut StdRng) -> Vec<RawBatch> {
        let mut order: Vec<usize> = (0..self.pairs.len())
            .filter(|&i| self.pairs[i].fits(opts.max_positions))
            .collect();

        let skipped = self.pairs.len() - order.len();
        if skipped > 0 {
            tracing::warn!(
                "Skipping {} pairs longer than max positions {:?}",
                skipped, opts.max_positions
            );
        }

        if opts.shuffle {
            order.shuffle(rng);
        }
        order.sort_by_key(|&i| (self.pairs[i].source_len(), self.pairs[i].target_len()));

        let mut batches = pack(&self.pairs, &order, opts);

        // Sampled batches keep their planned (length) order.
        if opts.sample_without_replacement > 0 && opts.sample_without_replacement < batches.len() {
            let mut keep = index::sample(rng, batches.len(), opts.sample_without_replacement).into_vec();
            keep.sort_unstable();
            let mut planned: Vec<Option<RawBatch>> = batches.into_iter().map(Some).collect();
            batches = keep.into_iter().filter_map(|i| planned[i].take()).collect();
        }
        if opts.shuffle && !opts.sort_by_length {
            batches.shuffle(rng);
        }
        if opts.descending {
            batches.reverse();
        }

        let num_shards = opts.num_shards.max(1);
        batches
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % num_shards == opts.shard_id)
            .map(|(_, b)| b)
            .collect()
    }
}

/// Greedy packing of `order` under the token and sentence budgets
fn pack(pairs: &[SentencePair], order: &[usize], opts: &BatchingOptions) -> Vec<RawBatch> {
    let max_tokens    = opts.max_tokens.unwrap_or(usize::MAX);
    let max_sentences = opts.max_sentences.unwrap_or(usize::MAX).max(1);

    let mut batches = Vec::new();
    let mut current: Vec<SentencePair> = Vec::new();
    let mut longest = 0usize;

    for &i in order {
        let pair = &pairs[i];
        let new_longest = longest.max(pair.max_len());
        let over_tokens = (current.len() + 1) * new_longest > max_tokens;
        let over_rows   = current.len() + 1 > max_sentences;

        if !current.is_empty() && (over_tokens || over_rows) {
            batches.push(RawBatch { pairs: std::mem::take(&mut current) });
            longest = 0;
        }
        longest = longest.max(pair.max_len());
        current.push(pair.clone());
    }
    if !current.is_empty() {
        batches.push(RawBatch { pairs: current });
    }
    batches
}

impl Dataset<SentencePair> for TranslationDataset {
    fn get(&self, index: usize) -> Option<SentencePair> {
        self.pairs.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}
