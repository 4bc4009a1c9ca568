// ============================================================
// Layer 5 - Training Session
// ============================================================
// The single owner of everything a run mutates:
//
//   generator + its optimizer
//   discriminator + its optimizer (GAN variant only)
//   running meters for both models
//   the scalar sink
//
// Step functions (steps.rs) borrow the session mutably for one
// batch; the epoch orchestrator (trainer.rs) owns it for the run.

use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};

use crate::domain::{traits::ScalarSink, variant::OptimizerKind};
use crate::infra::meters::ModelMeters;
use crate::ml::{
    model::{Discriminator, Generator},
    optim::ModelOptimizer,
};

/// Optimizer choices for both models.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub g_optimizer:     OptimizerKind,
    pub g_learning_rate: f64,
    pub d_optimizer:     OptimizerKind,
    pub d_learning_rate: f64,
    /// SGD momentum for the discriminator (Nesterov)
    pub momentum:        f64,
}

/// The discriminator together with its optimizer
pub struct Adversary<B, D> {
    pub model: D,
    pub optim: ModelOptimizer<D, B>,
}

pub struct TrainingSession<B: AutodiffBackend, G, D> {
    pub generator: G,
    pub g_optim:   ModelOptimizer<G, B>,
    pub adversary: Option<Adversary<B, D>>,
    pub g_meters:  ModelMeters,
    pub d_meters:  ModelMeters,
    pub sink:      Box<dyn ScalarSink>,
    pub device:    B::Device,
}

impl<B, G, D> TrainingSession<B, G, D>
where
    B: AutodiffBackend,
    G: Generator<B> + AutodiffModule<B> + 'static,
    D: Discriminator<B> + AutodiffModule<B> + 'static,
{
    pub fn new(
        generator:     G,
        discriminator: Option<D>,
        opts:          &SessionOptions,
        sink:          Box<dyn ScalarSink>,
        device:        B::Device,
    ) -> Self {
        let adversary = discriminator.map(|model| Adversary {
            model,
            optim: ModelOptimizer::new(opts.d_optimizer, opts.d_learning_rate, Some(opts.momentum)),
        });

        Self {
            generator,
            g_optim: ModelOptimizer::new(opts.g_optimizer, opts.g_learning_rate, None),
            adversary,
            g_meters: ModelMeters::new(),
            d_meters: ModelMeters::new(),
            sink,
            device,
        }
    }

    pub fn has_discriminator(&self) -> bool {
        self.adversary.is_some()
    }

    pub fn reset_meters(&mut self) {
        self.g_meters.reset();
        self.d_meters.reset();
    }
}
