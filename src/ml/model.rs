// ============================================================
// Layer 5 - Model Contracts
// ============================================================
// The trainer never names a concrete network. It talks to the
// generator and discriminator through these two traits, which the
// reference LSTM models in generator.rs / discriminator.rs
// implement for every Backend.
//
// Train vs eval mode is burn's split between a module on an
// AutodiffBackend (graph recorded, dropout/noise active) and the
// same module after AutodiffModule::valid() on the inner backend.

use burn::{prelude::*, tensor::activation::softmax};

use crate::data::batcher::TranslationBatch;

/// Per-token distributions plus an optional extra loss term
/// (the KL divergence of a variational generator).
pub struct GeneratorOutput<B: Backend> {
    /// [batch, trg_len, vocab], log-softmax normalised
    pub log_probs: Tensor<B, 3>,
    pub aux_loss:  Option<Tensor<B, 1>>,
}

/// Sequence-to-sequence model producing target-side distributions.
pub trait Generator<B: Backend>: Module<B> {
    /// Teacher-forced pass over `batch.prev_output_tokens`
    fn forward(&self, batch: &TranslationBatch<B>) -> GeneratorOutput<B>;

    /// Free-running greedy decoding, at most `max_len` tokens per row
    fn translate(&self, src_tokens: Tensor<B, 2, Int>, max_len: usize) -> Tensor<B, 2, Int>;
}

/// Classifier estimating P(real | source, target) for each row.
pub trait Discriminator<B: Backend>: Module<B> {
    /// Returns probabilities in (0, 1), shape [batch]
    fn forward(&self, src_tokens: Tensor<B, 2, Int>, trg_tokens: Tensor<B, 2, Int>) -> Tensor<B, 1>;
}

/// [batch, len, vocab] → [batch, len] argmax ids
pub fn greedy_decode<B: Backend>(log_probs: Tensor<B, 3>) -> Tensor<B, 2, Int> {
    let [batch, len, _] = log_probs.dims();
    log_probs.argmax(2).reshape([batch, len])
}

/// Dot-product attention of `query` [B,T,H] over `keys` [B,S,H].
/// `key_pad` is [B,S] with 1.0 at padded key positions.
/// Returns the context vectors [B,T,H].
pub fn dot_attention<B: Backend>(
    query:   Tensor<B, 3>,
    keys:    Tensor<B, 3>,
    key_pad: Tensor<B, 2>,
) -> Tensor<B, 3> {
    let scores = query.matmul(keys.clone().swap_dims(1, 2));
    let scores = scores + key_pad.unsqueeze_dim::<3>(1).mul_scalar(-1e9);
    softmax(scores, 2).matmul(keys)
}
