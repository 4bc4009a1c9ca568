// ============================================================
// Layer 3 - Configuration Errors
// ============================================================
// Everything that can be wrong with a run before the first batch
// is seen. These are fatal: the CLI reports them and exits
// without creating a run directory.
//
// Resource and numerical failures during training are carried as
// anyhow::Error with context instead.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown model name '{0}' (expected one of: gan, mle, vae)")]
    UnknownModel(String),

    #[error("unknown optimizer '{0}' (expected one of: sgd, adam, adamw, adagrad)")]
    UnknownOptimizer(String),

    #[error("unknown device '{0}' (expected one of: cpu, wgpu)")]
    UnknownDevice(String),

    #[error("missing required language pair: both --src-lang and --trg-lang must be set")]
    MissingLanguagePair,

    #[error("split '{split}' has no file for language '{lang}' at {path}")]
    MissingSplit {
        split: String,
        lang:  String,
        path:  String,
    },

    #[error("invalid option {name}: {reason}")]
    InvalidOption {
        name:   &'static str,
        reason: String,
    },
}
