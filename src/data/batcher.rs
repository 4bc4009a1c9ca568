// ============================================================
// Layer 4 - Translation Batcher
// ============================================================
// Turns a group of SentencePairs into device tensors.
//
// Sequences have different lengths, so each side is right-padded
// to the longest row in the batch:
//
//   src_tokens          [B, S]   source ids + EOS, then PAD
//   target              [B, T]   target ids + EOS, then PAD
//   prev_output_tokens  [B, T]   EOS + target without its last id
//                                (decoder input for teacher forcing)
//
// The batcher is generic over the Backend: training materialises
// batches on the autodiff backend, validation on the inner one.
//
// Reference: Burn Book §4 (Batcher)

use burn::{prelude::*, tensor::TensorData};

use crate::data::dataset::RawBatch;
use crate::domain::sentence_pair::SentencePair;

/// A batch ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct TranslationBatch<B: Backend> {
    pub src_tokens:         Tensor<B, 2, Int>,
    pub prev_output_tokens: Tensor<B, 2, Int>,
    pub target:             Tensor<B, 2, Int>,
    /// Non-pad target tokens in the batch
    pub ntokens:            usize,
    pub nsentences:         usize,
}

impl<B: Backend> TranslationBatch<B> {
    pub fn from_raw(raw: &RawBatch, pad_id: usize, eos_id: usize, device: &B::Device) -> Self {
        Self::from_pairs(&raw.pairs, pad_id, eos_id, device)
    }

    pub fn from_pairs(pairs: &[SentencePair], pad_id: usize, eos_id: usize, device: &B::Device) -> Self {
        let pad = pad_id as i64;
        let eos = eos_id as i64;

        let sources: Vec<Vec<i64>> = pairs
            .iter()
            .map(|p| p.source.iter().map(|&t| t as i64).collect())
            .collect();
        let targets: Vec<Vec<i64>> = pairs
            .iter()
            .map(|p| p.target.iter().map(|&t| t as i64).collect())
            .collect();

        // EOS first, then the target shifted right by one
        let prev_outputs: Vec<Vec<i64>> = targets
            .iter()
            .map(|t| {
                let mut prev = Vec::with_capacity(t.len());
                prev.push(eos);
                prev.extend_from_slice(&t[..t.len().saturating_sub(1)]);
                prev
            })
            .collect();

        let ntokens = targets.iter().map(Vec::len).sum();

        Self {
            src_tokens:         pad_rows(&sources, pad, device),
            prev_output_tokens: pad_rows(&prev_outputs, pad, device),
            target:             pad_rows(&targets, pad, device),
            ntokens,
            nsentences:         pairs.len(),
        }
    }

    /// Gradient/loss denominator: sentences when `sentence_avg`, tokens otherwise
    pub fn sample_size(&self, sentence_avg: bool) -> usize {
        if sentence_avg { self.nsentences } else { self.ntokens }
    }
}

/// Right-pad every row to the longest one and build a [rows, len] tensor
fn pad_rows<B: Backend>(rows: &[Vec<i64>], pad: i64, device: &B::Device) -> Tensor<B, 2, Int> {
    let len = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let mut flat = Vec::with_capacity(rows.len() * len);
    for row in rows {
        flat.extend_from_slice(row);
        flat.extend(std::iter::repeat(pad).take(len - row.len()));
    }
    Tensor::<B, 2, Int>::from_data(TensorData::new(flat, [rows.len(), len]), device)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_padding_and_shift() {
        let pairs = vec![
            SentencePair::new(0, vec![5, 6, 1], vec![7, 1]),
            SentencePair::new(1, vec![5, 1], vec![8, 9, 1]),
        ];
        let batch = TranslationBatch::<TB>::from_pairs(&pairs, 0, 1, &Default::default());

        assert_eq!(batch.src_tokens.dims(), [2, 3]);
        assert_eq!(
            batch.src_tokens.to_data().to_vec::<i64>().unwrap(),
            vec![5, 6, 1, 5, 1, 0]
        );
        assert_eq!(
            batch.target.to_data().to_vec::<i64>().unwrap(),
            vec![7, 1, 0, 8, 9, 1]
        );
        assert_eq!(
            batch.prev_output_tokens.to_data().to_vec::<i64>().unwrap(),
            vec![1, 7, 0, 1, 8, 9]
        );
        assert_eq!(batch.ntokens, 5);
        assert_eq!(batch.nsentences, 2);
        assert_eq!(batch.sample_size(true), 2);
        assert_eq!(batch.sample_size(false), 5);
    }
}
