// ============================================================
// Layer 5 - Attention Discriminator
// ============================================================
// Scores a (source, target) pair with P(target is a human
// translation of source):
//
//   source ──► Embedding (frozen) ──► LSTM ──► source states ─┐
//                                                             │ attention
//   target ──► Embedding (frozen) ──► LSTM ──► target states ─┴──► relu(Linear)
//                                                                     │
//                             mean over non-pad target positions ◄────┘
//                                                                     │
//                                             Linear ──► sigmoid ──► [B]
//
// Embeddings are frozen with Module::no_grad(): the optimizer finds
// no gradient for them and leaves them untouched.

use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig, Lstm, LstmConfig},
    prelude::*,
    tensor::activation::{relu, sigmoid},
};

use crate::ml::model::{dot_attention, Discriminator};

#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    pub src_vocab_size: usize,
    pub trg_vocab_size: usize,
    #[config(default = 128)]
    pub embed_dim: usize,
    #[config(default = 128)]
    pub hidden_dim: usize,
    #[config(default = 0)]
    pub pad_id: usize,
}

impl DiscriminatorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AttentionDiscriminator<B> {
        AttentionDiscriminator {
            embed_src:   EmbeddingConfig::new(self.src_vocab_size, self.embed_dim).init(device),
            embed_trg:   EmbeddingConfig::new(self.trg_vocab_size, self.embed_dim).init(device),
            src_encoder: LstmConfig::new(self.embed_dim, self.hidden_dim, true).init(device),
            trg_encoder: LstmConfig::new(self.embed_dim, self.hidden_dim, true).init(device),
            combine:     LinearConfig::new(2 * self.hidden_dim, self.hidden_dim).init(device),
            classifier:  LinearConfig::new(self.hidden_dim, 1).init(device),
            pad_id:      self.pad_id,
        }
        .fix_embeddings()
    }
}

#[derive(Module, Debug)]
pub struct AttentionDiscriminator<B: Backend> {
    pub embed_src:   Embedding<B>,
    pub embed_trg:   Embedding<B>,
    pub src_encoder: Lstm<B>,
    pub trg_encoder: Lstm<B>,
    pub combine:     Linear<B>,
    pub classifier:  Linear<B>,
    pub pad_id:      usize,
}

impl<B: Backend> AttentionDiscriminator<B> {
    /// Mark both embedding tables as not trainable.
    /// Called at construction and again after loading a record.
    pub fn fix_embeddings(mut self) -> Self {
        self.embed_src = self.embed_src.no_grad();
        self.embed_trg = self.embed_trg.no_grad();
        self
    }
}

impl<B: Backend> Discriminator<B> for AttentionDiscriminator<B> {
    fn forward(&self, src_tokens: Tensor<B, 2, Int>, trg_tokens: Tensor<B, 2, Int>) -> Tensor<B, 1> {
        let [batch, _] = trg_tokens.dims();
        let src_pad  = src_tokens.clone().equal_elem(self.pad_id as i64).float();
        let trg_keep = trg_tokens.clone().not_equal_elem(self.pad_id as i64).float();

        let (src_states, _) = self.src_encoder.forward(self.embed_src.forward(src_tokens), None);
        let (trg_states, _) = self.trg_encoder.forward(self.embed_trg.forward(trg_tokens), None);

        let context = dot_attention(trg_states.clone(), src_states, src_pad);
        let hidden  = relu(self.combine.forward(Tensor::cat(vec![trg_states, context], 2)));

        // Masked mean over target positions: [B,T,H] → [B,1,H]
        let lengths = trg_keep.clone().sum_dim(1).clamp_min(1.0).unsqueeze_dim::<3>(2);
        let pooled  = (hidden * trg_keep.unsqueeze_dim::<3>(2)).sum_dim(1) / lengths;

        sigmoid(self.classifier.forward(pooled)).reshape([batch])
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn tiny() -> AttentionDiscriminator<TB> {
        DiscriminatorConfig::new(6, 7)
            .with_embed_dim(4)
            .with_hidden_dim(5)
            .init(&Default::default())
    }

    #[test]
    fn test_outputs_probabilities_per_row() {
        let device = Default::default();
        let src = Tensor::<TB, 2, Int>::from_data([[2i64, 3, 1], [4, 1, 0]], &device);
        let trg = Tensor::<TB, 2, Int>::from_data([[5i64, 1], [6, 1]], &device);
        let probs = tiny().forward(src, trg).to_data().to_vec::<f32>().unwrap();

        assert_eq!(probs.len(), 2);
        assert!(probs.iter().all(|p| *p > 0.0 && *p < 1.0));
    }

    #[test]
    fn test_trailing_padding_does_not_change_score() {
        let device = Default::default();
        let model = tiny();

        let short = model.forward(
            Tensor::<TB, 2, Int>::from_data([[2i64, 3, 1]], &device),
            Tensor::<TB, 2, Int>::from_data([[5i64, 1]], &device),
        );
        let padded = model.forward(
            Tensor::<TB, 2, Int>::from_data([[2i64, 3, 1, 0, 0]], &device),
            Tensor::<TB, 2, Int>::from_data([[5i64, 1, 0]], &device),
        );

        let a = short.into_scalar().elem::<f32>();
        let b = padded.into_scalar().elem::<f32>();
        assert!((a - b).abs() < 1e-5);
    }
}
