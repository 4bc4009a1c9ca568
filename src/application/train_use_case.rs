// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates a joint training run in order:
//
//   Step 1: Resolve names (model, optimizers, device)   (Layer 3)
//   Step 2: Read raw train text for both languages      (Layer 4)
//   Step 3: Create the run directory                    (Layer 6)
//   Step 4: Build vocabularies into the run directory   (Layer 6)
//   Step 5: Load train / valid pairs                    (Layer 4)
//   Step 6: Save params.json                            (Layer 6)
//   Step 7: Build models for the variant, save configs  (Layer 5)
//   Step 8: Run the joint training loop                 (Layer 5)
//
// Steps 1 and 2 fail before anything is written to disk, so a
// bad configuration never leaves an empty run directory behind.
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{
    dataset::{BatchingOptions, TranslationDataset},
    loader::{read_lines, RawTextLoader},
    preprocessor::Preprocessor,
};
use crate::domain::{
    error::ConfigError,
    traits::CorpusSource,
    variant::{DeviceChoice, ModelVariant, OptimizerKind},
};
use crate::infra::{
    checkpoint::{
        CheckpointManager, DISCRIMINATOR_CONFIG, GENERATOR_CONFIG, PARAMS_FILE, SRC_VOCAB_FILE,
        TRG_VOCAB_FILE,
    },
    metrics::CsvScalarWriter,
    tokenizer_store::{Vocabulary, EOS_ID, PAD_ID},
};
use crate::ml::{
    session::{SessionOptions, TrainingSession},
    steps::StepOptions,
    trainer::{JointTrainer, TrainerOptions, TrainingSummary},
    variant::{variant_builder, Architecture, VariantConfigs},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every option of a run. Saved as params.json in the run directory
// and read back by `translate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:                   String,
    pub src_lang:                   Option<String>,
    pub trg_lang:                   Option<String>,
    pub checkpoint_dir:             String,
    pub model_name:                 String,
    pub device:                     String,

    pub epochs:                     usize,
    pub seed:                       u64,
    pub curriculum:                 usize,

    pub g_optimizer:                String,
    pub g_learning_rate:            f64,
    pub d_optimizer:                String,
    pub d_learning_rate:            f64,
    pub momentum:                   f64,
    pub lr_shrink:                  f64,
    pub clip_norm:                  f64,
    pub sentence_avg:               bool,
    pub pg_probability:             f64,
    pub kld_weight:                 f64,

    pub max_tokens:                 Option<usize>,
    pub joint_batch_size:           usize,
    pub fixed_max_len:              usize,
    pub sample_without_replacement: usize,
    pub distributed_rank:           usize,
    pub distributed_world_size:     usize,

    pub max_vocab:                  usize,
    pub lowercase:                  bool,
    pub architecture:               Architecture,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:                   "data".to_string(),
            src_lang:                   None,
            trg_lang:                   None,
            checkpoint_dir:             "checkpoints".to_string(),
            model_name:                 "gan".to_string(),
            device:                     "cpu".to_string(),
            epochs:                     12,
            seed:                       1,
            curriculum:                 0,
            g_optimizer:                "adam".to_string(),
            g_learning_rate:            1e-3,
            d_optimizer:                "sgd".to_string(),
            d_learning_rate:            1e-3,
            momentum:                   0.9,
            lr_shrink:                  0.5,
            clip_norm:                  5.0,
            sentence_avg:               false,
            pg_probability:             0.5,
            kld_weight:                 1.0,
            max_tokens:                 Some(6000),
            joint_batch_size:           64,
            fixed_max_len:              50,
            sample_without_replacement: 0,
            distributed_rank:           0,
            distributed_world_size:     1,
            max_vocab:                  0,
            lowercase:                  false,
            architecture:               Architecture::default(),
        }
    }
}

/// Names of a TrainConfig resolved to their closed sets.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNames {
    pub variant:     ModelVariant,
    pub g_optimizer: OptimizerKind,
    pub d_optimizer: OptimizerKind,
    pub device:      DeviceChoice,
    pub src_lang:    String,
    pub trg_lang:    String,
}

impl TrainConfig {
    /// Check every option that can be checked without touching disk.
    pub fn resolve(&self) -> Result<ResolvedNames, ConfigError> {
        let (src_lang, trg_lang) = match (&self.src_lang, &self.trg_lang) {
            (Some(s), Some(t)) if !s.is_empty() && !t.is_empty() => (s.clone(), t.clone()),
            _ => return Err(ConfigError::MissingLanguagePair),
        };

        if self.epochs == 0 {
            return Err(invalid("epochs", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.pg_probability) {
            return Err(invalid("pg_probability", "must lie in [0, 1]"));
        }
        if self.lr_shrink <= 0.0 {
            return Err(invalid("lr_shrink", "must be positive"));
        }
        if self.joint_batch_size == 0 {
            return Err(invalid("joint_batch_size", "must be at least 1"));
        }
        if self.distributed_world_size == 0 || self.distributed_rank >= self.distributed_world_size {
            return Err(invalid(
                "distributed_rank",
                format!("{} is not below world size {}", self.distributed_rank, self.distributed_world_size),
            ));
        }

        Ok(ResolvedNames {
            variant:     self.model_name.parse()?,
            g_optimizer: self.g_optimizer.parse()?,
            d_optimizer: self.d_optimizer.parse()?,
            device:      self.device.parse()?,
            src_lang,
            trg_lang,
        })
    }

    fn batching(&self) -> BatchingOptions {
        BatchingOptions {
            max_tokens:                 self.max_tokens,
            max_sentences:              Some(self.joint_batch_size),
            max_positions:              (self.fixed_max_len, self.fixed_max_len),
            sort_by_length:             false,
            shuffle:                    true,
            descending:                 false,
            sample_without_replacement: self.sample_without_replacement,
            shard_id:                   self.distributed_rank,
            num_shards:                 self.distributed_world_size,
        }
    }

    fn trainer_options(&self) -> TrainerOptions {
        let train_batching = self.batching();
        let valid_batching = BatchingOptions {
            shuffle:                    false,
            descending:                 true,
            sample_without_replacement: 0,
            ..train_batching.clone()
        };

        TrainerOptions {
            epochs:          self.epochs,
            seed:            self.seed,
            curriculum:      self.curriculum,
            g_learning_rate: self.g_learning_rate,
            lr_shrink:       self.lr_shrink,
            pg_probability:  self.pg_probability,
            eos_id:          EOS_ID as usize,
            step: StepOptions {
                clip_norm:    self.clip_norm,
                sentence_avg: self.sentence_avg,
                kld_weight:   self.kld_weight,
                pad_id:       PAD_ID as usize,
            },
            train_batching,
            valid_batching,
        }
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidOption { name, reason: reason.into() }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainingSummary> {
        let cfg = &self.config;

        // ── Step 1: Resolve names ─────────────────────────────────────────────
        let names = cfg.resolve()?;
        tracing::info!(
            "Model {} | G {:?} lr={} | D {:?} lr={} | device {:?}",
            names.variant, names.g_optimizer, cfg.g_learning_rate,
            names.d_optimizer, cfg.d_learning_rate, names.device
        );

        // ── Step 2: Raw train text (also checks the split files exist) ────────
        let data_dir     = Path::new(&cfg.data_dir);
        let preprocessor = Preprocessor::new().with_lowercase(cfg.lowercase);
        let src_lines    = read_lines(data_dir, "train", &names.src_lang, &preprocessor)?;
        let trg_lines    = read_lines(data_dir, "train", &names.trg_lang, &preprocessor)?;

        // ── Step 3: Run directory ─────────────────────────────────────────────
        let run = CheckpointManager::create_run(&cfg.checkpoint_dir)?;

        // ── Step 4: Vocabularies ──────────────────────────────────────────────
        let src_vocab = Vocabulary::build(&src_lines, cfg.max_vocab, &run.path(SRC_VOCAB_FILE))?;
        let trg_vocab = Vocabulary::build(&trg_lines, cfg.max_vocab, &run.path(TRG_VOCAB_FILE))?;
        tracing::info!(
            "[{}] dictionary: {} types | [{}] dictionary: {} types",
            names.src_lang, src_vocab.len(), names.trg_lang, trg_vocab.len()
        );
        let (src_size, trg_size) = (src_vocab.len(), trg_vocab.len());

        // ── Step 5: Sentence pairs ────────────────────────────────────────────
        let loader = RawTextLoader::new(
            data_dir, &names.src_lang, &names.trg_lang, src_vocab, trg_vocab, preprocessor,
        );
        let train = TranslationDataset::new(loader.load_split("train")?);
        let valid = TranslationDataset::new(loader.load_split("valid")?);

        // ── Step 6: Run config ────────────────────────────────────────────────
        run.save_config(PARAMS_FILE, cfg)?;

        // ── Step 7: Models ────────────────────────────────────────────────────
        let configs = variant_builder(names.variant)(&cfg.architecture, src_size, trg_size);
        run.save_config(GENERATOR_CONFIG, &configs.generator)?;
        if let Some(d) = &configs.discriminator {
            run.save_config(DISCRIMINATOR_CONFIG, d)?;
        }

        // ── Step 8: Joint training on the selected device ─────────────────────
        let summary = match names.device {
            DeviceChoice::Cpu => {
                train_on::<Autodiff<NdArray>>(cfg, &names, &configs, run, &train, &valid, NdArrayDevice::default())?
            }
            DeviceChoice::Wgpu => {
                train_on::<Autodiff<Wgpu>>(cfg, &names, &configs, run, &train, &valid, WgpuDevice::default())?
            }
        };
        Ok(summary)
    }
}

fn train_on<B: AutodiffBackend>(
    cfg:     &TrainConfig,
    names:   &ResolvedNames,
    configs: &VariantConfigs,
    run:     CheckpointManager,
    train:   &TranslationDataset,
    valid:   &TranslationDataset,
    device:  B::Device,
) -> Result<TrainingSummary> {
    tracing::info!("Using device: {:?}", device);
    B::seed(&device, cfg.seed);

    let models = configs.init::<B>(&device);
    let sink   = CsvScalarWriter::new(run.dir())?;
    let session_opts = SessionOptions {
        g_optimizer:     names.g_optimizer,
        g_learning_rate: cfg.g_learning_rate,
        d_optimizer:     names.d_optimizer,
        d_learning_rate: cfg.d_learning_rate,
        momentum:        cfg.momentum,
    };
    let session = TrainingSession::new(
        models.generator,
        models.discriminator,
        &session_opts,
        Box::new(sink),
        device,
    );

    JointTrainer::new(session, run, cfg.trainer_options()).fit(train, valid)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config() -> TrainConfig {
        TrainConfig {
            src_lang: Some("de".to_string()),
            trg_lang: Some("en".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_defaults() {
        let names = config().resolve().unwrap();
        assert_eq!(names.variant, ModelVariant::Gan);
        assert_eq!(names.g_optimizer, OptimizerKind::Adam);
        assert_eq!(names.d_optimizer, OptimizerKind::Sgd);
        assert_eq!(names.device, DeviceChoice::Cpu);
    }

    #[test]
    fn test_resolve_rejects_bad_options() {
        let missing = TrainConfig { trg_lang: None, ..config() };
        assert_eq!(missing.resolve().unwrap_err(), ConfigError::MissingLanguagePair);

        let model = TrainConfig { model_name: "transformer".to_string(), ..config() };
        assert_eq!(model.resolve().unwrap_err(), ConfigError::UnknownModel("transformer".to_string()));

        let optim = TrainConfig { d_optimizer: "rmsprop".to_string(), ..config() };
        assert_eq!(optim.resolve().unwrap_err(), ConfigError::UnknownOptimizer("rmsprop".to_string()));

        let shard = TrainConfig { distributed_rank: 2, distributed_world_size: 2, ..config() };
        assert!(matches!(shard.resolve(), Err(ConfigError::InvalidOption { name: "distributed_rank", .. })));

        let p = TrainConfig { pg_probability: 1.5, ..config() };
        assert!(matches!(p.resolve(), Err(ConfigError::InvalidOption { name: "pg_probability", .. })));
    }

    #[test]
    fn test_missing_split_fails_before_run_dir() {
        let data = tempfile::tempdir().unwrap();
        let ckpt = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            data_dir:       data.path().display().to_string(),
            checkpoint_dir: ckpt.path().join("runs").display().to_string(),
            ..config()
        };

        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::MissingSplit { .. })));
        assert!(!ckpt.path().join("runs").exists());
    }

    #[test]
    fn test_end_to_end_cpu_run() {
        let data = tempfile::tempdir().unwrap();
        let ckpt = tempfile::tempdir().unwrap();
        for split in ["train", "valid"] {
            fs::write(data.path().join(format!("{split}.de")), "das haus\nein hund\nder hund\nein haus\n").unwrap();
            fs::write(data.path().join(format!("{split}.en")), "the house\na dog\nthe dog\na house\n").unwrap();
        }

        let cfg = TrainConfig {
            data_dir:         data.path().display().to_string(),
            checkpoint_dir:   ckpt.path().display().to_string(),
            epochs:           1,
            joint_batch_size: 2,
            architecture: Architecture {
                embed_dim: 8, hidden_dim: 8, num_layers: 1, latent_dim: 4,
                disc_embed_dim: 4, disc_hidden_dim: 4,
            },
            ..config()
        };

        let summary = TrainUseCase::new(cfg).execute().unwrap();
        assert_eq!(summary.num_updates, 2);
        for file in [PARAMS_FILE, GENERATOR_CONFIG, DISCRIMINATOR_CONFIG, SRC_VOCAB_FILE, TRG_VOCAB_FILE, "scalars.csv"] {
            assert!(summary.run_dir.join(file).exists(), "missing {file}");
        }
    }
}
