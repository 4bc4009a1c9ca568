// ============================================================
// Layer 2 - TranslateUseCase
// ============================================================
// Greedy translation of one split with a trained run:
//
//   Step 1: Read params.json and the vocabularies     (Layer 6)
//   Step 2: Load the split's sentence pairs           (Layer 4)
//   Step 3: Rebuild and load the generator            (Layer 5)
//   Step 4: Decode batch by batch                     (Layer 5)
//   Step 5: Write predictions.txt and real.txt        (Layer 2)
//
// Line N of predictions.txt is the hypothesis for line N of
// real.txt (the reference), in corpus order.

use anyhow::{Context, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};
use rand::{rngs::StdRng, SeedableRng};
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    dataset::{BatchingOptions, TranslationDataset},
    loader::RawTextLoader,
    preprocessor::Preprocessor,
};
use crate::domain::{error::ConfigError, traits::CorpusSource, variant::DeviceChoice};
use crate::infra::{
    checkpoint::{CheckpointManager, PARAMS_FILE, SRC_VOCAB_FILE, TRG_VOCAB_FILE},
    tokenizer_store::Vocabulary,
};
use crate::ml::inferencer::{Hypothesis, Translator};

pub const PREDICTIONS_FILE: &str = "predictions.txt";
pub const REFERENCES_FILE:  &str = "real.txt";

#[derive(Debug, Clone)]
pub struct TranslateConfig {
    pub run_dir:       String,
    /// Defaults to the data directory recorded in params.json
    pub data_dir:      Option<String>,
    /// Defaults to best_gmodel.pt in the run directory
    pub model_file:    Option<String>,
    pub split:         String,
    pub max_sentences: usize,
    pub max_len_a:     f64,
    pub max_len_b:     usize,
    pub output_dir:    String,
    pub device:        String,
}

/// Where the two output files were written and how many lines.
#[derive(Debug, Clone)]
pub struct TranslationReport {
    pub predictions: PathBuf,
    pub references:  PathBuf,
    pub sentences:   usize,
}

pub struct TranslateUseCase {
    config: TranslateConfig,
}

impl TranslateUseCase {
    pub fn new(config: TranslateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TranslationReport> {
        let cfg    = &self.config;
        let device: DeviceChoice = cfg.device.parse()?;

        // ── Step 1: Run config and vocabularies ───────────────────────────────
        let run = CheckpointManager::open(&cfg.run_dir)?;
        let params: TrainConfig = run.load_config(PARAMS_FILE)?;
        let (src_lang, trg_lang) = match (&params.src_lang, &params.trg_lang) {
            (Some(s), Some(t)) => (s.clone(), t.clone()),
            _ => return Err(ConfigError::MissingLanguagePair.into()),
        };
        let src_vocab = Vocabulary::load(&run.path(SRC_VOCAB_FILE))?;
        let trg_vocab = Vocabulary::load(&run.path(TRG_VOCAB_FILE))?;

        // ── Step 2: Sentence pairs ────────────────────────────────────────────
        let data_dir = cfg.data_dir.clone().unwrap_or_else(|| params.data_dir.clone());
        let loader = RawTextLoader::new(
            &data_dir,
            &src_lang,
            &trg_lang,
            src_vocab,
            trg_vocab,
            Preprocessor::new().with_lowercase(params.lowercase),
        );
        let dataset = TranslationDataset::new(loader.load_split(&cfg.split)?);
        tracing::info!("Loaded {} sentence pairs from {}/{}", dataset.pairs().len(), data_dir, cfg.split);

        // ── Steps 3 and 4: Decode on the selected device ──────────────────────
        let model_file = cfg.model_file.as_deref().map(Path::new);
        let hypotheses = match device {
            DeviceChoice::Cpu  => self.decode::<NdArray>(&run, model_file, &dataset, NdArrayDevice::default())?,
            DeviceChoice::Wgpu => self.decode::<Wgpu>(&run, model_file, &dataset, WgpuDevice::default())?,
        };

        // ── Step 5: Output files ──────────────────────────────────────────────
        self.write_outputs(&dataset, &hypotheses, &loader)
    }

    fn decode<B: Backend>(
        &self,
        run:        &CheckpointManager,
        model_file: Option<&Path>,
        dataset:    &TranslationDataset,
        device:     B::Device,
    ) -> Result<Vec<Hypothesis>> {
        let translator = Translator::<B>::from_run(run, model_file, device)?
            .with_max_len(self.config.max_len_a, self.config.max_len_b);

        let opts = BatchingOptions {
            max_tokens:     None,
            max_sentences:  Some(self.config.max_sentences.max(1)),
            max_positions:  (usize::MAX, usize::MAX),
            shuffle:        false,
            ..Default::default()
        };
        // No shuffling: the rng is never drawn from
        let batches = dataset.batches(&opts, &mut StdRng::seed_from_u64(0));

        let mut hypotheses = Vec::with_capacity(dataset.pairs().len());
        for raw in &batches {
            hypotheses.extend(translator.translate_batch(raw)?);
        }
        hypotheses.sort_by_key(|h| h.id);
        Ok(hypotheses)
    }

    fn write_outputs(
        &self,
        dataset:    &TranslationDataset,
        hypotheses: &[Hypothesis],
        loader:     &RawTextLoader,
    ) -> Result<TranslationReport> {
        let out_dir = Path::new(&self.config.output_dir);
        fs::create_dir_all(out_dir)
            .with_context(|| format!("Cannot create '{}'", out_dir.display()))?;

        let predictions = out_dir.join(PREDICTIONS_FILE);
        let references  = out_dir.join(REFERENCES_FILE);
        let mut pred_out = BufWriter::new(fs::File::create(&predictions)
            .with_context(|| format!("Cannot create '{}'", predictions.display()))?);
        let mut real_out = BufWriter::new(fs::File::create(&references)
            .with_context(|| format!("Cannot create '{}'", references.display()))?);

        // Pair ids are the corpus line numbers, hypotheses are sorted by id
        let mut pairs: Vec<_> = dataset.pairs().iter().collect();
        pairs.sort_by_key(|p| p.id);

        for (pair, hypo) in pairs.iter().zip(hypotheses) {
            writeln!(pred_out, "{}", loader.trg_vocab().decode(&hypo.tokens))?;
            writeln!(real_out, "{}", loader.trg_vocab().decode(&pair.target))?;
        }
        pred_out.flush()?;
        real_out.flush()?;

        tracing::info!("Wrote {} translations to '{}'", hypotheses.len(), predictions.display());
        Ok(TranslationReport { predictions, references, sentences: hypotheses.len() })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainUseCase;
    use crate::ml::variant::Architecture;

    #[test]
    fn test_translates_test_split_of_a_trained_run() {
        let data = tempfile::tempdir().unwrap();
        let ckpt = tempfile::tempdir().unwrap();
        let out  = tempfile::tempdir().unwrap();
        for split in ["train", "valid", "test"] {
            fs::write(data.path().join(format!("{split}.de")), "das haus\nein hund\nder hund\n").unwrap();
            fs::write(data.path().join(format!("{split}.en")), "the house\na dog\nthe dog\n").unwrap();
        }

        let train_cfg = TrainConfig {
            data_dir:         data.path().display().to_string(),
            src_lang:         Some("de".to_string()),
            trg_lang:         Some("en".to_string()),
            checkpoint_dir:   ckpt.path().display().to_string(),
            model_name:       "vae".to_string(),
            epochs:           1,
            joint_batch_size: 2,
            architecture: Architecture {
                embed_dim: 8, hidden_dim: 8, num_layers: 1, latent_dim: 4,
                disc_embed_dim: 4, disc_hidden_dim: 4,
            },
            ..Default::default()
        };
        let summary = TrainUseCase::new(train_cfg).execute().unwrap();

        let report = TranslateUseCase::new(TranslateConfig {
            run_dir:       summary.run_dir.display().to_string(),
            data_dir:      None,
            model_file:    None,
            split:         "test".to_string(),
            max_sentences: 2,
            max_len_a:     0.0,
            max_len_b:     5,
            output_dir:    out.path().display().to_string(),
            device:        "cpu".to_string(),
        })
        .execute()
        .unwrap();

        assert_eq!(report.sentences, 3);
        let real = fs::read_to_string(&report.references).unwrap();
        assert_eq!(real.lines().collect::<Vec<_>>(), vec!["the house", "a dog", "the dog"]);
        assert_eq!(fs::read_to_string(&report.predictions).unwrap().lines().count(), 3);
    }
}
