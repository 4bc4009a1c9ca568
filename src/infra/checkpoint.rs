// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// One directory per training run, named after its start time:
//
//   checkpoints/
//     2024-05-01_13-37-00.123456/
//       params.json                      ← run configuration
//       generator.json                   ← generator architecture
//       discriminator.json               ← discriminator architecture (GAN)
//       src_vocab.json / trg_vocab.json  ← vocabularies
//       scalars.csv                      ← per-step scalars
//       joint_4.127.epoch_1.pt           ← generator after epoch 1
//       joint_4.127.epoch_1_discr.pt     ← discriminator after epoch 1
//       best_gmodel.pt                   ← lowest validation loss so far
//
// Model state is serialised with BinBytesRecorder and written with
// fs::write, so the file names above are used exactly as given
// (the file recorders would replace the extension).
//
// The architecture configs are saved next to the weights because a
// record can only be loaded into a module of the same shape.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub const PARAMS_FILE:          &str = "params.json";
pub const GENERATOR_CONFIG:     &str = "generator.json";
pub const DISCRIMINATOR_CONFIG: &str = "discriminator.json";
pub const SRC_VOCAB_FILE:       &str = "src_vocab.json";
pub const TRG_VOCAB_FILE:       &str = "trg_vocab.json";
pub const BEST_GENERATOR:       &str = "best_gmodel.pt";

type Bytes = BinBytesRecorder<FullPrecisionSettings>;

/// Owns the directory of one training run.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create `<root>/<YYYY-mm-dd_HH-MM-SS.ffffff>` (parents included).
    /// A clash with an existing directory gets a numeric suffix.
    pub fn create_run(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .with_context(|| format!("Cannot create checkpoint root '{}'", root.display()))?;

        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S%.6f").to_string();
        let mut dir = root.join(&stamp);
        let mut suffix = 1;
        // An existing directory belongs to another run and is never reused.
        loop {
            match fs::create_dir(&dir) {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    dir = root.join(format!("{stamp}_{suffix}"));
                    suffix += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Cannot create run directory '{}'", dir.display())
                    })
                }
            }
        }
        tracing::info!("Run directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Attach to an existing run directory (inference)
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            anyhow::bail!(
                "Run directory '{}' does not exist. Have you run 'train' first?",
                dir.display()
            );
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    // ─── Module state ─────────────────────────────────────────────────────────

    /// Serialise the full record of `module` to `path`.
    pub fn save_module<B: Backend, M: Module<B>>(module: &M, path: &Path) -> Result<()> {
        let bytes = Recorder::<B>::record(&Bytes::default(), module.clone().into_record(), ())
            .with_context(|| format!("Cannot serialise module for '{}'", path.display()))?;
        fs::write(path, bytes)
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        tracing::debug!("Saved checkpoint '{}'", path.display());
        Ok(())
    }

    /// Restore a record written by `save_module` into `module`.
    /// The module must have the architecture the record was saved from.
    pub fn load_module<B: Backend, M: Module<B>>(module: M, path: &Path, device: &B::Device) -> Result<M> {
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;
        let record = Recorder::<B>::load(&Bytes::default(), bytes, device)
            .with_context(|| format!("Cannot decode checkpoint '{}'", path.display()))?;
        Ok(module.load_record(record))
    }

    /// `joint_{loss:.3}.epoch_{n}.pt`; a NaN loss is spelled "NaN"
    pub fn epoch_file_name(epoch: usize, valid_loss: f64) -> String {
        format!("joint_{valid_loss:.3}.epoch_{epoch}.pt")
    }

    /// `joint_{loss:.3}.epoch_{n}_discr.pt`
    pub fn discriminator_file_name(epoch: usize, valid_loss: f64) -> String {
        format!("joint_{valid_loss:.3}.epoch_{epoch}_discr.pt")
    }

    /// Save the epoch snapshot of both models (the discriminator only
    /// when the variant has one). Returns the generator's path.
    pub fn save_epoch<B, G, D>(
        &self,
        epoch:         usize,
        valid_loss:    f64,
        generator:     &G,
        discriminator: Option<&D>,
    ) -> Result<PathBuf>
    where
        B: Backend,
        G: Module<B>,
        D: Module<B>,
    {
        let g_path = self.path(&Self::epoch_file_name(epoch, valid_loss));
        Self::save_module(generator, &g_path)?;

        if let Some(discriminator) = discriminator {
            let d_path = self.path(&Self::discriminator_file_name(epoch, valid_loss));
            Self::save_module(discriminator, &d_path)?;
        }
        Ok(g_path)
    }

    /// Overwrite `best_gmodel.pt`
    pub fn save_best<B: Backend, G: Module<B>>(&self, generator: &G) -> Result<PathBuf> {
        let path = self.path(BEST_GENERATOR);
        Self::save_module(generator, &path)?;
        Ok(path)
    }

    // ─── Configs ──────────────────────────────────────────────────────────────

    /// Write any serde config as pretty JSON under the run directory
    pub fn save_config<T: Serialize>(&self, file: &str, cfg: &T) -> Result<()> {
        let path = self.path(file);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved config '{}'", path.display());
        Ok(())
    }

    pub fn load_config<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.path(file);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }
}

// ─── BestLoss ─────────────────────────────────────────────────────────────────
/// Lowest validation loss seen so far. Only ever moves down.
#[derive(Debug, Clone, Copy)]
pub struct BestLoss {
    loss:  f64,
    epoch: Option<usize>,
}

impl BestLoss {
    pub fn new() -> Self {
        Self { loss: f64::INFINITY, epoch: None }
    }

    /// Record `loss` for `epoch`; true when it is strictly lower than
    /// every previous one. NaN is never an improvement.
    pub fn observe(&mut self, epoch: usize, loss: f64) -> bool {
        if loss.is_nan() {
            tracing::warn!("Epoch {}: validation loss is NaN, best model unchanged", epoch);
            return false;
        }
        if loss < self.loss {
            self.loss  = loss;
            self.epoch = Some(epoch);
            true
        } else {
            false
        }
    }

    pub fn loss(&self) -> f64 {
        self.loss
    }

    pub fn epoch(&self) -> Option<usize> {
        self.epoch
    }
}

impl Default for BestLoss {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::NdArray,
        nn::{Linear, LinearConfig},
    };

    type TB = NdArray;

    #[test]
    fn test_best_loss_selection() {
        let mut best = BestLoss::new();
        let improved: Vec<usize> = [2.0, 1.5, 1.8, 1.2]
            .iter()
            .enumerate()
            .filter_map(|(i, &loss)| best.observe(i + 1, loss).then_some(i + 1))
            .collect();

        assert_eq!(improved, vec![1, 2, 4]);
        assert_eq!(best.epoch(), Some(4));
        assert_eq!(best.loss(), 1.2);
    }

    #[test]
    fn test_nan_and_equal_losses_do_not_improve() {
        let mut best = BestLoss::new();
        assert!(!best.observe(1, f64::NAN));
        assert!(best.observe(2, 3.0));
        assert!(!best.observe(3, 3.0));
        assert!(!best.observe(4, f64::NAN));
        assert_eq!(best.epoch(), Some(2));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(CheckpointManager::epoch_file_name(3, 4.12345), "joint_4.123.epoch_3.pt");
        assert_eq!(
            CheckpointManager::discriminator_file_name(3, 4.12345),
            "joint_4.123.epoch_3_discr.pt"
        );
        assert_eq!(CheckpointManager::epoch_file_name(1, f64::NAN), "joint_NaN.epoch_1.pt");
    }

    #[test]
    fn test_module_round_trip_keeps_weights() {
        let root = tempfile::tempdir().unwrap();
        let run = CheckpointManager::create_run(root.path()).unwrap();
        let device = Default::default();

        let saved: Linear<TB> = LinearConfig::new(3, 2).init(&device);
        let path = run.save_best(&saved).unwrap();
        assert!(path.ends_with(BEST_GENERATOR));

        let fresh: Linear<TB> = LinearConfig::new(3, 2).init(&device);
        let loaded = CheckpointManager::load_module(fresh, &path, &device).unwrap();
        assert_eq!(
            loaded.weight.val().to_data().to_vec::<f32>().unwrap(),
            saved.weight.val().to_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_back_to_back_runs_get_separate_directories() {
        let root = tempfile::tempdir().unwrap();
        let first = CheckpointManager::create_run(root.path()).unwrap();
        first.save_config(PARAMS_FILE, &"first").unwrap();

        let runs: Vec<CheckpointManager> = (0..5)
            .map(|_| CheckpointManager::create_run(root.path()).unwrap())
            .collect();
        for run in &runs {
            assert_ne!(run.dir(), first.dir());
            assert!(run.dir().is_dir());
            assert!(!run.path(PARAMS_FILE).exists());
        }
        let mut dirs: Vec<&Path> = runs.iter().map(|r| r.dir()).collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), runs.len());

        let kept: String = first.load_config(PARAMS_FILE).unwrap();
        assert_eq!(kept, "first");
    }

    #[test]
    fn test_config_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let run = CheckpointManager::create_run(root.path()).unwrap();
        run.save_config(PARAMS_FILE, &vec![1u32, 2, 3]).unwrap();
        let back: Vec<u32> = run.load_config(PARAMS_FILE).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}
