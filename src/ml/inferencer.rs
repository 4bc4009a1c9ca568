// ============================================================
// Layer 5 - Translator
// ============================================================
// Rebuilds a trained generator from its run directory and decodes
// batches greedily:
//
//   generator.json  ──► Seq2SeqConfig ──► LstmSeq2Seq::init
//   best_gmodel.pt  ──► record        ──► load_record
//
// Inference runs on a plain Backend (no autodiff), so the VAE
// bridge uses its mean instead of sampling.
//
// Output length per batch: max_len_a * longest source + max_len_b.

use anyhow::Result;
use burn::prelude::*;
use std::path::Path;

use crate::data::{batcher::TranslationBatch, dataset::RawBatch};
use crate::infra::checkpoint::{CheckpointManager, BEST_GENERATOR, GENERATOR_CONFIG};
use crate::ml::{
    generator::{LstmSeq2Seq, Seq2SeqConfig},
    model::Generator,
};

/// One decoded sentence, keyed by the pair id it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub id:     usize,
    pub tokens: Vec<u32>,
}

pub struct Translator<B: Backend> {
    model:     LstmSeq2Seq<B>,
    config:    Seq2SeqConfig,
    device:    B::Device,
    max_len_a: f64,
    max_len_b: usize,
}

impl<B: Backend> Translator<B> {
    /// Load `model_file` (default: the run's best_gmodel.pt)
    pub fn from_run(run: &CheckpointManager, model_file: Option<&Path>, device: B::Device) -> Result<Self> {
        let config: Seq2SeqConfig = run.load_config(GENERATOR_CONFIG)?;
        let path = model_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| run.path(BEST_GENERATOR));

        let model = CheckpointManager::load_module(config.init::<B>(&device), &path, &device)?;
        tracing::info!("Generator loaded from '{}'", path.display());
        Ok(Self::new(model, config, device))
    }

    pub fn new(model: LstmSeq2Seq<B>, config: Seq2SeqConfig, device: B::Device) -> Self {
        Self { model, config, device, max_len_a: 0.0, max_len_b: 200 }
    }

    pub fn with_max_len(mut self, a: f64, b: usize) -> Self {
        self.max_len_a = a;
        self.max_len_b = b;
        self
    }

    /// Greedy translations for every pair of `raw`, EOS included
    /// when the model produced one.
    pub fn translate_batch(&self, raw: &RawBatch) -> Result<Vec<Hypothesis>> {
        let batch = TranslationBatch::<B>::from_raw(raw, self.config.pad_id, self.config.eos_id, &self.device);

        let longest = raw.pairs.iter().map(|p| p.source_len()).max().unwrap_or(0);
        let max_len = ((self.max_len_a * longest as f64) as usize + self.max_len_b).max(1);

        let out = self.model.translate(batch.src_tokens, max_len);
        let [rows, cols] = out.dims();
        let flat = out
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| anyhow::anyhow!("Cannot read decoded tokens: {e:?}"))?;

        let eos = self.config.eos_id as u32;
        let hypotheses = (0..rows)
            .zip(&raw.pairs)
            .map(|(r, pair)| {
                let mut tokens = Vec::with_capacity(cols);
                for &t in &flat[r * cols..(r + 1) * cols] {
                    tokens.push(t as u32);
                    if t as u32 == eos {
                        break;
                    }
                }
                Hypothesis { id: pair.id, tokens }
            })
            .collect();
        Ok(hypotheses)
    }
}
