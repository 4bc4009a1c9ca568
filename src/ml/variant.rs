// ============================================================
// Layer 5 - Model Variants
// ============================================================
// Each ModelVariant (Layer 3) maps to one construction function
// that turns the architecture options into model configs:
//
//   gan  LSTM seq2seq generator + attention discriminator
//   mle  LSTM seq2seq generator only
//   vae  LSTM seq2seq generator with a variational bridge only
//
// The configs are saved next to the checkpoints so inference can
// rebuild the exact same modules before loading their records.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::variant::ModelVariant;
use crate::infra::tokenizer_store::{EOS_ID, PAD_ID};
use crate::ml::{
    discriminator::{AttentionDiscriminator, DiscriminatorConfig},
    generator::{LstmSeq2Seq, Seq2SeqConfig},
};

/// Layer sizes shared by every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    pub embed_dim:       usize,
    pub hidden_dim:      usize,
    pub num_layers:      usize,
    /// Only read by the VAE variant
    pub latent_dim:      usize,
    pub disc_embed_dim:  usize,
    pub disc_hidden_dim: usize,
}

impl Default for Architecture {
    fn default() -> Self {
        Self {
            embed_dim:       256,
            hidden_dim:      256,
            num_layers:      2,
            latent_dim:      64,
            disc_embed_dim:  256,
            disc_hidden_dim: 256,
        }
    }
}

/// Everything needed to instantiate the models of one variant.
#[derive(Debug)]
pub struct VariantConfigs {
    pub generator:     Seq2SeqConfig,
    pub discriminator: Option<DiscriminatorConfig>,
}

pub struct VariantModels<B: Backend> {
    pub generator:     LstmSeq2Seq<B>,
    pub discriminator: Option<AttentionDiscriminator<B>>,
}

impl VariantConfigs {
    pub fn init<B: Backend>(&self, device: &B::Device) -> VariantModels<B> {
        VariantModels {
            generator:     self.generator.init(device),
            discriminator: self.discriminator.as_ref().map(|d| d.init(device)),
        }
    }
}

/// (architecture, source vocab size, target vocab size) → configs
pub type VariantBuilder = fn(&Architecture, usize, usize) -> VariantConfigs;

pub fn variant_builder(variant: ModelVariant) -> VariantBuilder {
    match variant {
        ModelVariant::Gan => build_gan,
        ModelVariant::Mle => build_mle,
        ModelVariant::Vae => build_vae,
    }
}

fn seq2seq(arch: &Architecture, src_vocab: usize, trg_vocab: usize) -> Seq2SeqConfig {
    Seq2SeqConfig::new(src_vocab, trg_vocab)
        .with_embed_dim(arch.embed_dim)
        .with_hidden_dim(arch.hidden_dim)
        .with_num_layers(arch.num_layers)
        .with_pad_id(PAD_ID as usize)
        .with_eos_id(EOS_ID as usize)
}

fn build_gan(arch: &Architecture, src_vocab: usize, trg_vocab: usize) -> VariantConfigs {
    VariantConfigs {
        generator:     seq2seq(arch, src_vocab, trg_vocab),
        discriminator: Some(
            DiscriminatorConfig::new(src_vocab, trg_vocab)
                .with_embed_dim(arch.disc_embed_dim)
                .with_hidden_dim(arch.disc_hidden_dim)
                .with_pad_id(PAD_ID as usize),
        ),
    }
}

fn build_mle(arch: &Architecture, src_vocab: usize, trg_vocab: usize) -> VariantConfigs {
    VariantConfigs {
        generator:     seq2seq(arch, src_vocab, trg_vocab),
        discriminator: None,
    }
}

fn build_vae(arch: &Architecture, src_vocab: usize, trg_vocab: usize) -> VariantConfigs {
    VariantConfigs {
        generator:     seq2seq(arch, src_vocab, trg_vocab).with_latent_dim(Some(arch.latent_dim)),
        discriminator: None,
    }
}
