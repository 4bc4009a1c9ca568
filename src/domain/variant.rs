// ============================================================
// Layer 3 - Configuration Choices
// ============================================================
// Closed sets of options a run is configured with. Each one is
// parsed from its command-line name exactly once at startup;
// an unknown name is a ConfigError before any model is built.
//
//   ModelVariant    which generator/discriminator pair to train
//   OptimizerKind   which update rule each model uses
//   DeviceChoice    which burn backend runs the tensors

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ─── ModelVariant ─────────────────────────────────────────────────────────────
/// Training-mode variant. Each variant supplies its own model
/// construction function in `ml::variant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// LSTM generator + attention discriminator, joint adversarial training
    Gan,
    /// LSTM generator trained with maximum likelihood only
    Mle,
    /// Variational LSTM generator (KL term added to the MLE loss)
    Vae,
}

impl ModelVariant {
    pub fn name(self) -> &'static str {
        match self {
            ModelVariant::Gan => "gan",
            ModelVariant::Mle => "mle",
            ModelVariant::Vae => "vae",
        }
    }
}

impl FromStr for ModelVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gan" => Ok(ModelVariant::Gan),
            "mle" => Ok(ModelVariant::Mle),
            "vae" => Ok(ModelVariant::Vae),
            _     => Err(ConfigError::UnknownModel(s.to_string())),
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── OptimizerKind ────────────────────────────────────────────────────────────
/// Supported optimization algorithms, matched by name
/// (case-insensitive, so "SGD" and "sgd" are the same).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    Adam,
    AdamW,
    AdaGrad,
}

impl FromStr for OptimizerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sgd"     => Ok(OptimizerKind::Sgd),
            "adam"    => Ok(OptimizerKind::Adam),
            "adamw"   => Ok(OptimizerKind::AdamW),
            "adagrad" => Ok(OptimizerKind::AdaGrad),
            _         => Err(ConfigError::UnknownOptimizer(s.to_string())),
        }
    }
}

// ─── DeviceChoice ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceChoice {
    /// NdArray backend on the CPU
    Cpu,
    /// Wgpu backend on the default adapter
    Wgpu,
}

impl FromStr for DeviceChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu"  => Ok(DeviceChoice::Cpu),
            "wgpu" | "gpu" => Ok(DeviceChoice::Wgpu),
            _      => Err(ConfigError::UnknownDevice(s.to_string())),
        }
    }
}
