// ============================================================
// Layer 5 - Optimizers, LR Schedule, Gradient Utilities
// ============================================================
// Burn optimizers take the learning rate as an argument to every
// step, so the "current rate" lives next to the optimizer in
// ModelOptimizer and is only changed by the schedule.
//
// Optimizer names are resolved through OptimizerKind (Layer 3),
// never evaluated: each kind maps to one burn config here.
//
// Gradient utilities work on GradientsParams directly:
//   scale_gradients   multiply every gradient (MLE denominator)
//   clip_grad_norm    global L2 norm clipping across all params
// Burn's own GradientClippingConfig clips each tensor separately,
// which is not the same thing as a global max-norm.
//
// Reference: Burn Book §5 (Optimizers)
//            Pascanu et al. (2013) On the difficulty of training RNNs

use std::marker::PhantomData;

use burn::{
    module::{AutodiffModule, ModuleVisitor, Param},
    optim::{
        momentum::MomentumConfig, AdaGradConfig, AdamConfig, AdamWConfig, GradientsParams,
        Optimizer, SgdConfig,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::domain::variant::OptimizerKind;

/// Generator updates between two learning-rate shrinks
pub const LR_DECAY_INTERVAL: u64 = 80_000;

/// Step decay: `base_lr * shrink ^ floor(update_count / interval)`
pub fn decayed_learning_rate(update_count: u64, interval: u64, base_lr: f64, shrink: f64) -> f64 {
    let decays = update_count / interval.max(1);
    base_lr * shrink.powi(decays as i32)
}

// ─── ModelOptimizer ───────────────────────────────────────────────────────────
// Object-safe view of burn's Optimizer trait (which carries an
// associated Record type), so different algorithms share one field type.
trait GradientStep<M, B>: Send {
    fn apply(&mut self, lr: f64, module: M, grads: GradientsParams) -> M;
}

impl<M, B, O> GradientStep<M, B> for O
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    fn apply(&mut self, lr: f64, module: M, grads: GradientsParams) -> M {
        self.step(lr, module, grads)
    }
}

/// One model's optimizer: update rule state plus current learning rate.
pub struct ModelOptimizer<M, B> {
    kind:  OptimizerKind,
    lr:    f64,
    inner: Box<dyn GradientStep<M, B>>,
}

impl<M, B> ModelOptimizer<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    /// `momentum` is only used by SGD (Nesterov) and ignored by the
    /// adaptive methods, which keep their own moment estimates.
    pub fn new(kind: OptimizerKind, lr: f64, momentum: Option<f64>) -> Self {
        let inner: Box<dyn GradientStep<M, B>> = match kind {
            OptimizerKind::Sgd => {
                let momentum = momentum.filter(|m| *m > 0.0).map(|m| {
                    MomentumConfig::new()
                        .with_momentum(m)
                        .with_dampening(0.0)
                        .with_nesterov(true)
                });
                Box::new(SgdConfig::new().with_momentum(momentum).init::<B, M>())
            }
            OptimizerKind::Adam    => Box::new(AdamConfig::new().init::<B, M>()),
            OptimizerKind::AdamW   => Box::new(AdamWConfig::new().init::<B, M>()),
            OptimizerKind::AdaGrad => Box::new(AdaGradConfig::new().init::<B, M>()),
        };
        Self { kind, lr, inner }
    }

    pub fn kind(&self) -> OptimizerKind {
        self.kind
    }

    pub fn learning_rate(&self) -> f64 {
        self.lr
    }

    pub fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }

    /// Apply one update at the current learning rate
    pub fn step(&mut self, module: M, grads: GradientsParams) -> M {
        self.inner.apply(self.lr, module, grads)
    }
}

// ─── Gradient visitors ────────────────────────────────────────────────────────
struct SquaredNorm<'a, B: AutodiffBackend> {
    grads:  &'a GradientsParams,
    sq_sum: f64,
    _b:     PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        if let Some(g) = self.grads.get::<B::InnerBackend, D>(param.id) {
            self.sq_sum += (g.clone() * g).sum().into_scalar().elem::<f64>();
        }
    }
}

struct Scale<'a, B: AutodiffBackend> {
    grads:  &'a mut GradientsParams,
    factor: f64,
    _b:     PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Scale<'_, B> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        if let Some(g) = self.grads.remove::<B::InnerBackend, D>(param.id) {
            self.grads.register::<B::InnerBackend, D>(param.id, g.mul_scalar(self.factor));
        }
    }
}

/// Global L2 norm over every gradient the module owns
pub fn global_grad_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm::<B> { grads, sq_sum: 0.0, _b: PhantomData };
    module.visit(&mut visitor);
    visitor.sq_sum.sqrt()
}

/// Multiply every gradient of `module` by `factor`
pub fn scale_gradients<B, M>(module: &M, mut grads: GradientsParams, factor: f64) -> GradientsParams
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = Scale::<B> { grads: &mut grads, factor, _b: PhantomData };
    module.visit(&mut visitor);
    grads
}

/// Rescale gradients so their global norm is at most `max_norm`.
/// Returns the gradients and the norm measured before clipping.
/// A non-positive `max_norm` disables clipping.
pub fn clip_grad_norm<B, M>(module: &M, grads: GradientsParams, max_norm: f64) -> (GradientsParams, f64)
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm(module, &grads);
    if max_norm <= 0.0 || !norm.is_finite() {
        return (grads, norm);
    }
    let coef = max_norm / (norm + 1e-6);
    if coef < 1.0 {
        (scale_gradients(module, grads, coef), norm)
    } else {
        (grads, norm)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        nn::{Linear, LinearConfig},
    };

    type TB = Autodiff<NdArray>;

    fn linear_and_grads(scale: f32) -> (Linear<TB>, GradientsParams) {
        let device = Default::default();
        let model: Linear<TB> = LinearConfig::new(3, 2).init(&device);
        let x = Tensor::<TB, 2>::from_data([[1.0f32, -2.0, 3.0]], &device);
        let loss = model.forward(x).sum().mul_scalar(scale);
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        (model, grads)
    }

    #[test]
    fn test_lr_schedule_steps() {
        let lr = |n| decayed_learning_rate(n, LR_DECAY_INTERVAL, 1.0, 0.5);
        assert_eq!(lr(0), 1.0);
        assert_eq!(lr(79_999), 1.0);
        assert_eq!(lr(80_000), 0.5);
        assert_eq!(lr(160_000), 0.25);
    }

    #[test]
    fn test_clip_bounds_global_norm() {
        let (model, grads) = linear_and_grads(1000.0);
        let (clipped, before) = clip_grad_norm(&model, grads, 1.0);
        assert!(before > 1.0);
        let after = global_grad_norm(&model, &clipped);
        assert!((after - 1.0).abs() < 1e-3, "norm after clipping was {after}");
    }

    #[test]
    fn test_clip_leaves_small_gradients_alone() {
        let (model, grads) = linear_and_grads(1e-3);
        let before = global_grad_norm(&model, &grads);
        let (grads, _) = clip_grad_norm(&model, grads, 10.0);
        assert!((global_grad_norm(&model, &grads) - before).abs() < 1e-9);
    }

    #[test]
    fn test_scale_gradients() {
        let (model, grads) = linear_and_grads(1.0);
        let before = global_grad_norm(&model, &grads);
        let scaled = scale_gradients(&model, grads, 0.25);
        assert!((global_grad_norm(&model, &scaled) - before * 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_optimizer_step_uses_current_rate() {
        for kind in [OptimizerKind::Sgd, OptimizerKind::Adam, OptimizerKind::AdamW, OptimizerKind::AdaGrad] {
            let (model, grads) = linear_and_grads(1.0);
            let before = model.weight.val().to_data().to_vec::<f32>().unwrap();

            let mut optim = ModelOptimizer::<Linear<TB>, TB>::new(kind, 0.1, Some(0.9));
            optim.set_learning_rate(0.05);
            assert_eq!(optim.learning_rate(), 0.05);
            assert_eq!(optim.kind(), kind);

            let model = optim.step(model, grads);
            let after = model.weight.val().to_data().to_vec::<f32>().unwrap();
            assert_ne!(before, after, "{kind:?} did not move the weights");
        }
    }
}
