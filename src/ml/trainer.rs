// ============================================================
// Layer 5 - Joint Training Loop
// ============================================================
// Epoch orchestrator for the generator/discriminator pair.
//
//   EpochStart ──► Training ──► Validating ──► Checkpointing ──► EpochEnd
//       ▲                                                           │
//       └──────────────────────── next epoch ◄──────────────────────┘
//                                                   (after the last: Finished)
//
// Per epoch e (1-based):
//   - StdRng seeded with seed + e (wrapping) drives batch planning and the
//     MLE / policy-gradient coin flips, so a run is reproducible
//   - generator lr = base_lr * shrink ^ floor(num_updates / 80 000)
//   - training batches are in length order while e <= curriculum
//   - validation runs on model.valid() (inner backend, no autodiff)
//     with batches materialised on the inner backend as well
//   - the epoch checkpoint is named after the mean validation loss;
//     best_gmodel.pt follows the lowest loss seen so far
//
// Scalars are tagged with batch_index + (e - 1) * batches_in_phase.
//
// Reference: Burn Book §5 (Custom Training Loop)
//            Wu et al. (2018) Adversarial Neural Machine Translation

use anyhow::Result;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;

use crate::data::{
    batcher::TranslationBatch,
    dataset::{BatchingOptions, RawBatch, TranslationDataset},
};
use crate::infra::checkpoint::{BestLoss, CheckpointManager};
use crate::ml::{
    model::{Discriminator, Generator},
    optim::{decayed_learning_rate, LR_DECAY_INTERVAL},
    session::TrainingSession,
    steps::{
        discriminator_step, mle_step, pg_step, validation_losses, AlternationPolicy,
        GeneratorObjective, StepOptions,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    EpochStart,
    Training,
    Validating,
    Checkpointing,
    EpochEnd,
    Finished,
}

/// Everything the loop needs besides the session.
#[derive(Debug, Clone)]
pub struct TrainerOptions {
    pub epochs:          usize,
    pub seed:            u64,
    /// Epochs (from the first) trained in length order
    pub curriculum:      usize,
    pub g_learning_rate: f64,
    pub lr_shrink:       f64,
    pub pg_probability:  f64,
    pub eos_id:          usize,
    pub step:            StepOptions,
    pub train_batching:  BatchingOptions,
    pub valid_batching:  BatchingOptions,
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub epochs:      usize,
    pub num_updates: u64,
    pub best_loss:   f64,
    pub best_epoch:  Option<usize>,
    pub run_dir:     PathBuf,
}

pub struct JointTrainer<B: AutodiffBackend, G, D> {
    session:     TrainingSession<B, G, D>,
    checkpoints: CheckpointManager,
    options:     TrainerOptions,
    policy:      AlternationPolicy,
    best:        BestLoss,
    num_updates: u64,
    phase:       Phase,
}

impl<B, G, D> JointTrainer<B, G, D>
where
    B: AutodiffBackend,
    G: Generator<B> + AutodiffModule<B> + 'static,
    G::InnerModule: Generator<B::InnerBackend>,
    D: Discriminator<B> + AutodiffModule<B> + 'static,
    D::InnerModule: Discriminator<B::InnerBackend>,
{
    pub fn new(session: TrainingSession<B, G, D>, checkpoints: CheckpointManager, options: TrainerOptions) -> Self {
        let policy = if session.has_discriminator() {
            AlternationPolicy::new(options.pg_probability)
        } else {
            AlternationPolicy::mle_only()
        };

        Self {
            session,
            checkpoints,
            options,
            policy,
            best: BestLoss::new(),
            num_updates: 0,
            phase: Phase::EpochStart,
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::trace!("Phase {:?} → {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Run every epoch. Checkpoint write failures abort the run.
    pub fn fit(&mut self, train: &TranslationDataset, valid: &TranslationDataset) -> Result<TrainingSummary> {
        tracing::info!(
            "Joint training: {} epochs, pg probability {:.2}, discriminator: {}",
            self.options.epochs,
            self.policy.pg_probability(),
            self.session.has_discriminator()
        );

        for epoch in 1..=self.options.epochs {
            self.enter(Phase::EpochStart);
            tracing::info!("At epoch {}", epoch);
            let mut rng = StdRng::seed_from_u64(self.options.seed.wrapping_add(epoch as u64));

            self.enter(Phase::Training);
            let train_opts = BatchingOptions {
                sort_by_length: epoch <= self.options.curriculum,
                ..self.options.train_batching.clone()
            };
            let train_batches = train.batches(&train_opts, &mut rng);
            self.train_epoch(epoch, &train_batches, &mut rng)?;

            self.enter(Phase::Validating);
            let valid_batches = valid.batches(&self.options.valid_batching, &mut rng);
            let valid_loss = self.validate_epoch(epoch, &valid_batches);

            self.enter(Phase::Checkpointing);
            self.checkpoint(epoch, valid_loss)?;

            self.enter(Phase::EpochEnd);
        }

        self.enter(Phase::Finished);
        tracing::info!(
            "Training complete: {} updates, best valid loss {:.3} (epoch {:?})",
            self.num_updates, self.best.loss(), self.best.epoch()
        );

        Ok(TrainingSummary {
            epochs:      self.options.epochs,
            num_updates: self.num_updates,
            best_loss:   self.best.loss(),
            best_epoch:  self.best.epoch(),
            run_dir:     self.checkpoints.dir().to_path_buf(),
        })
    }

    fn train_epoch(&mut self, epoch: usize, batches: &[RawBatch], rng: &mut StdRng) -> Result<()> {
        self.session.reset_meters();

        let lr = decayed_learning_rate(
            self.num_updates,
            LR_DECAY_INTERVAL,
            self.options.g_learning_rate,
            self.options.lr_shrink,
        );
        self.session.g_optim.set_learning_rate(lr);
        tracing::info!("Epoch {}: {} training batches, generator lr={}", epoch, batches.len(), lr);

        let opts   = self.options.step;
        let offset = (epoch - 1) * batches.len();

        for (i, raw) in batches.iter().enumerate() {
            let batch = TranslationBatch::<B>::from_raw(raw, opts.pad_id, self.options.eos_id, &self.session.device);
            let step  = i + offset;

            match self.policy.choose(rng) {
                GeneratorObjective::PolicyGradient => {
                    pg_step(&mut self.session, &batch, &opts, step)?;
                }
                GeneratorObjective::Mle => {
                    mle_step(&mut self.session, &batch, &opts, step);
                }
            }
            self.num_updates += 1;

            if self.session.has_discriminator() {
                discriminator_step(&mut self.session, &batch, &opts, step)?;
            }
        }

        tracing::info!(
            "Epoch {} train | G {} | D {}",
            epoch, self.session.g_meters.summary(), self.session.d_meters.summary()
        );
        Ok(())
    }

    /// Returns the generator's mean validation loss (NaN when empty)
    fn validate_epoch(&mut self, epoch: usize, batches: &[RawBatch]) -> f64 {
        self.session.reset_meters();

        let generator     = self.session.generator.valid();
        let discriminator = self.session.adversary.as_ref().map(|a| a.model.valid());
        let opts   = self.options.step;
        let offset = (epoch - 1) * batches.len();

        for (i, raw) in batches.iter().enumerate() {
            let batch = TranslationBatch::<B::InnerBackend>::from_raw(
                raw, opts.pad_id, self.options.eos_id, &self.session.device,
            );
            let step  = i + offset;
            let stats = validation_losses(&generator, discriminator.as_ref(), &batch, &opts);

            let g = &mut self.session.g_meters;
            g.valid_loss.update(stats.g_loss, stats.sample_size);
            if stats.total > 0.0 {
                g.valid_acc.update(stats.token_accuracy(), stats.total);
            }
            let running = g.valid_loss.avg();
            self.session.sink.write(
                &[("mle_valid_loss", stats.g_loss), ("mle_valid_loss_avg", running)],
                step,
            );
            tracing::debug!("G dev loss at batch {}: {:.3}", i, running);

            if let Some((d_loss, d_acc)) = stats.discriminator {
                let d = &mut self.session.d_meters;
                d.valid_loss.update(d_loss, 1.0);
                d.valid_acc.update(d_acc, 1.0);
                self.session.sink.write(&[("disc_valid_loss", d_loss), ("disc_valid_acc", d_acc)], step);
            }
        }

        let valid_loss = self.session.g_meters.valid_loss.avg();
        tracing::info!(
            "Epoch {} valid over {} samples | G {} | D {}",
            epoch,
            self.session.g_meters.valid_loss.count(),
            self.session.g_meters.summary(),
            self.session.d_meters.summary()
        );
        valid_loss
    }

    fn checkpoint(&mut self, epoch: usize, valid_loss: f64) -> Result<()> {
        let path = self.checkpoints.save_epoch(
            epoch,
            valid_loss,
            &self.session.generator,
            self.session.adversary.as_ref().map(|a| &a.model),
        )?;
        tracing::info!("Checkpoint saved for epoch {}: {}", epoch, path.display());

        if self.best.observe(epoch, valid_loss) {
            let best = self.checkpoints.save_best(&self.session.generator)?;
            tracing::info!("New best validation loss {:.3}: {}", valid_loss, best.display());
        }
        Ok(())
    }
}
