// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// `train` and `translate` with all their flags. Names follow the
// long-standing fairseq-style options (--g-learning-rate,
// --joint-batch-size, --fixed-max-len, ...).
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{train_use_case::TrainConfig, translate_use_case::TranslateConfig};
use crate::ml::variant::Architecture;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Jointly train a generator (and discriminator) on a parallel corpus
    Train(TrainArgs),

    /// Greedily translate a split with a trained run
    Translate(TranslateArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory with <split>.<lang> files
    #[arg(long, default_value = "data")]
    pub data: String,

    /// Source language suffix
    #[arg(long)]
    pub src_lang: Option<String>,

    /// Target language suffix
    #[arg(long)]
    pub trg_lang: Option<String>,

    /// Root directory for run directories
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// gan | mle | vae
    #[arg(long, default_value = "gan")]
    pub model_name: String,

    /// cpu | wgpu
    #[arg(long, default_value = "cpu")]
    pub device: String,

    #[arg(long, default_value_t = 12)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Train in length order for the first N epochs
    #[arg(long, default_value_t = 0)]
    pub curriculum: usize,

    /// sgd | adam | adamw | adagrad
    #[arg(long, default_value = "adam")]
    pub g_optimizer: String,

    #[arg(long, default_value_t = 1e-3)]
    pub g_learning_rate: f64,

    /// sgd | adam | adamw | adagrad
    #[arg(long, default_value = "sgd")]
    pub d_optimizer: String,

    #[arg(long, default_value_t = 1e-3)]
    pub d_learning_rate: f64,

    /// Nesterov momentum of the discriminator SGD
    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,

    /// Generator lr multiplier applied every 80 000 updates
    #[arg(long, default_value_t = 0.5)]
    pub lr_shrink: f64,

    /// Global gradient norm bound (0 disables clipping)
    #[arg(long, default_value_t = 5.0)]
    pub clip_norm: f64,

    /// Normalise the MLE loss by sentences instead of tokens
    #[arg(long)]
    pub sentence_avg: bool,

    /// Chance of a policy-gradient step instead of MLE per batch
    #[arg(long, default_value_t = 0.5)]
    pub pg_probability: f64,

    /// Weight of the KL term (vae)
    #[arg(long, default_value_t = 1.0)]
    pub kld_weight: f64,

    /// Token budget per batch (padded size)
    #[arg(long, default_value_t = 6000)]
    pub max_tokens: usize,

    /// Sentences per batch
    #[arg(long, default_value_t = 64)]
    pub joint_batch_size: usize,

    /// Longest source / target kept for training
    #[arg(long, default_value_t = 50)]
    pub fixed_max_len: usize,

    /// Batches sampled per epoch (0 = all)
    #[arg(long, default_value_t = 0)]
    pub sample_without_replacement: usize,

    #[arg(long, default_value_t = 0)]
    pub distributed_rank: usize,

    #[arg(long, default_value_t = 1)]
    pub distributed_world_size: usize,

    /// Most frequent words kept per language (0 = all)
    #[arg(long, default_value_t = 0)]
    pub max_vocab: usize,

    #[arg(long)]
    pub lowercase: bool,

    #[arg(long, default_value_t = 256)]
    pub embed_dim: usize,

    #[arg(long, default_value_t = 256)]
    pub hidden_dim: usize,

    #[arg(long, default_value_t = 2)]
    pub num_layers: usize,

    /// Latent size of the variational bridge (vae)
    #[arg(long, default_value_t = 64)]
    pub latent_dim: usize,

    #[arg(long, default_value_t = 256)]
    pub disc_embed_dim: usize,

    #[arg(long, default_value_t = 256)]
    pub disc_hidden_dim: usize,
}

/// Layer 1 → Layer 2 boundary: the application never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:                   a.data,
            src_lang:                   a.src_lang,
            trg_lang:                   a.trg_lang,
            checkpoint_dir:             a.checkpoint_dir,
            model_name:                 a.model_name,
            device:                     a.device,
            epochs:                     a.epochs,
            seed:                       a.seed,
            curriculum:                 a.curriculum,
            g_optimizer:                a.g_optimizer,
            g_learning_rate:            a.g_learning_rate,
            d_optimizer:                a.d_optimizer,
            d_learning_rate:            a.d_learning_rate,
            momentum:                   a.momentum,
            lr_shrink:                  a.lr_shrink,
            clip_norm:                  a.clip_norm,
            sentence_avg:               a.sentence_avg,
            pg_probability:             a.pg_probability,
            kld_weight:                 a.kld_weight,
            max_tokens:                 (a.max_tokens > 0).then_some(a.max_tokens),
            joint_batch_size:           a.joint_batch_size,
            fixed_max_len:              a.fixed_max_len,
            sample_without_replacement: a.sample_without_replacement,
            distributed_rank:           a.distributed_rank,
            distributed_world_size:     a.distributed_world_size,
            max_vocab:                  a.max_vocab,
            lowercase:                  a.lowercase,
            architecture: Architecture {
                embed_dim:       a.embed_dim,
                hidden_dim:      a.hidden_dim,
                num_layers:      a.num_layers,
                latent_dim:      a.latent_dim,
                disc_embed_dim:  a.disc_embed_dim,
                disc_hidden_dim: a.disc_hidden_dim,
            },
        }
    }
}

#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// Run directory written by `train`
    #[arg(long)]
    pub run_dir: String,

    /// Override the data directory recorded in params.json
    #[arg(long)]
    pub data: Option<String>,

    /// Generator checkpoint (default: <run_dir>/best_gmodel.pt)
    #[arg(long)]
    pub model_file: Option<String>,

    #[arg(long, default_value = "test")]
    pub split: String,

    #[arg(long, default_value_t = 64)]
    pub max_sentences: usize,

    /// Output length = max_len_a * source length + max_len_b
    #[arg(long, default_value_t = 0.0)]
    pub max_len_a: f64,

    #[arg(long, default_value_t = 200)]
    pub max_len_b: usize,

    /// Where predictions.txt and real.txt are written
    #[arg(long, default_value = ".")]
    pub output_dir: String,

    /// cpu | wgpu
    #[arg(long, default_value = "cpu")]
    pub device: String,
}

impl From<TranslateArgs> for TranslateConfig {
    fn from(a: TranslateArgs) -> Self {
        TranslateConfig {
            run_dir:       a.run_dir,
            data_dir:      a.data,
            model_file:    a.model_file,
            split:         a.split,
            max_sentences: a.max_sentences,
            max_len_a:     a.max_len_a,
            max_len_b:     a.max_len_b,
            output_dir:    a.output_dir,
            device:        a.device,
        }
    }
}
