// ============================================================
// Layer 5 - Step Functions
// ============================================================
// One optimisation step per call, all with the same shape:
//
//   forward ──► loss ──► backward ──► clip (global norm)
//           ──► optimizer step ──► meters ──► scalar sink
//
// Burn builds a fresh gradient container on every backward pass,
// so there is no explicit "zero grad".
//
//   mle_step            supervised NLL (+ weighted KL for the VAE),
//                       gradients divided by the sample size
//   pg_step             REINFORCE with the discriminator's detached
//                       score of the greedy prediction as reward
//   discriminator_step  BCE on [generated..., reference...] with
//                       labels [0..., 1...]
//
// Which generator step runs is decided per batch by the
// AlternationPolicy; the discriminator step always follows when
// the session has a discriminator.
//
// Logged losses are in bits (divided by ln 2).

use std::f64::consts::LN_2;

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, Rng};

use crate::data::batcher::TranslationBatch;
use crate::ml::{
    loss::{
        binary_cross_entropy, discriminator_accuracy, nll_loss, policy_gradient_loss,
        to_f64, token_accuracy,
    },
    model::{greedy_decode, Discriminator, Generator},
    optim::{clip_grad_norm, scale_gradients},
    session::TrainingSession,
};

/// Per-step knobs shared by training and validation.
#[derive(Debug, Clone, Copy)]
pub struct StepOptions {
    /// Global gradient norm bound; <= 0 disables clipping
    pub clip_norm:    f64,
    /// Normalise by sentences instead of target tokens
    pub sentence_avg: bool,
    /// Weight of the generator's auxiliary (KL) loss
    pub kld_weight:   f64,
    pub pad_id:       usize,
}

// ─── Alternation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorObjective {
    Mle,
    PolicyGradient,
}

/// Per-batch coin flip between the two generator objectives.
#[derive(Debug, Clone, Copy)]
pub struct AlternationPolicy {
    pg_probability: f64,
}

impl AlternationPolicy {
    pub fn new(pg_probability: f64) -> Self {
        Self { pg_probability: pg_probability.clamp(0.0, 1.0) }
    }

    /// Always MLE, for variants without a discriminator
    pub fn mle_only() -> Self {
        Self::new(0.0)
    }

    pub fn pg_probability(&self) -> f64 {
        self.pg_probability
    }

    /// Draw u ~ U[0,1); policy gradient when u >= 1 - p
    pub fn choose(&self, rng: &mut StdRng) -> GeneratorObjective {
        let u: f64 = rng.gen();
        if u >= 1.0 - self.pg_probability {
            GeneratorObjective::PolicyGradient
        } else {
            GeneratorObjective::Mle
        }
    }
}

// ─── Shared computations ──────────────────────────────────────────────────────

/// Greedy prediction with the reference's padding copied over,
/// so the discriminator masks the same positions for both.
pub fn greedy_prediction<B: Backend>(
    log_probs: Tensor<B, 3>,
    target:    &Tensor<B, 2, Int>,
    pad_id:    usize,
) -> Tensor<B, 2, Int> {
    let pad_mask = target.clone().equal_elem(pad_id as i64);
    greedy_decode(log_probs).mask_fill(pad_mask, pad_id as i64)
}

/// Summed NLL and the generator output it came from
pub struct MleLoss<B: Backend> {
    pub nll:       Tensor<B, 1>,
    pub aux:       Option<Tensor<B, 1>>,
    pub log_probs: Tensor<B, 3>,
}

pub fn mle_loss<B: Backend, G: Generator<B>>(generator: &G, batch: &TranslationBatch<B>, pad_id: usize) -> MleLoss<B> {
    let out = generator.forward(batch);
    MleLoss {
        nll:       nll_loss(out.log_probs.clone(), batch.target.clone(), pad_id),
        aux:       out.aux_loss,
        log_probs: out.log_probs,
    }
}

/// BCE loss and accuracy of the discriminator on the generator's
/// greedy output (label 0) and the reference (label 1).
/// The generator output is detached: no gradient reaches it.
pub fn discriminator_loss_acc<B, G, D>(
    generator:     &G,
    discriminator: &D,
    batch:         &TranslationBatch<B>,
    pad_id:        usize,
) -> (Tensor<B, 1>, Tensor<B, 1>)
where
    B: Backend,
    G: Generator<B>,
    D: Discriminator<B>,
{
    let [bsz, _] = batch.target.dims();
    let device = batch.target.device();

    let log_probs = generator.forward(batch).log_probs.detach();
    let fake = greedy_prediction(log_probs, &batch.target, pad_id);

    let disc_fake = discriminator.forward(batch.src_tokens.clone(), fake);
    let disc_real = discriminator.forward(batch.src_tokens.clone(), batch.target.clone());

    let probs  = Tensor::cat(vec![disc_fake, disc_real], 0);
    let labels = Tensor::cat(
        vec![Tensor::<B, 1>::zeros([bsz], &device), Tensor::<B, 1>::ones([bsz], &device)],
        0,
    );

    (
        binary_cross_entropy(probs.clone(), labels.clone()),
        discriminator_accuracy(probs, labels),
    )
}

// ─── Training steps ───────────────────────────────────────────────────────────

/// Supervised step. Returns the logged loss (bits per sample unit).
pub fn mle_step<B, G, D>(
    session: &mut TrainingSession<B, G, D>,
    batch:   &TranslationBatch<B>,
    opts:    &StepOptions,
    step:    usize,
) -> f64
where
    B: AutodiffBackend,
    G: Generator<B> + AutodiffModule<B> + 'static,
{
    let sample_size = batch.sample_size(opts.sentence_avg).max(1) as f64;

    let MleLoss { nll, aux, .. } = mle_loss(&session.generator, batch, opts.pad_id);
    let loss = match aux {
        Some(kld) => nll + kld.mul_scalar(opts.kld_weight),
        None      => nll,
    };
    let loss_value = to_f64(loss.clone());

    let grads = GradientsParams::from_grads(loss.backward(), &session.generator);
    let grads = scale_gradients(&session.generator, grads, 1.0 / sample_size);
    let (grads, norm) = clip_grad_norm(&session.generator, grads, opts.clip_norm);
    session.generator = session.g_optim.step(session.generator.clone(), grads);

    let logged = loss_value / sample_size / LN_2;
    session.g_meters.bsz.update(batch.nsentences as f64, 1.0);
    session.g_meters.train_loss.update(logged, sample_size);
    session.sink.write(&[("mle_train_loss", logged)], step);

    tracing::debug!(
        "G MLE loss at step {}: {:.3} (avg {:.3}), grad norm {:.3}, lr={}",
        step, logged, session.g_meters.train_loss.avg(), norm, session.g_optim.learning_rate()
    );
    logged
}

/// Policy-gradient step. Needs the session's discriminator.
pub fn pg_step<B, G, D>(
    session: &mut TrainingSession<B, G, D>,
    batch:   &TranslationBatch<B>,
    opts:    &StepOptions,
    step:    usize,
) -> Result<f64>
where
    B: AutodiffBackend,
    G: Generator<B> + AutodiffModule<B> + 'static,
    D: Discriminator<B>,
{
    let adversary = session
        .adversary
        .as_ref()
        .context("policy-gradient step requires a discriminator")?;

    let out = session.generator.forward(batch);
    let prediction = greedy_prediction(out.log_probs.clone().detach(), &batch.target, opts.pad_id);
    let reward = adversary
        .model
        .forward(batch.src_tokens.clone(), prediction)
        .detach();

    let loss = policy_gradient_loss(out.log_probs, batch.target.clone(), reward, opts.pad_id);
    let loss_value = to_f64(loss.clone());

    let grads = GradientsParams::from_grads(loss.backward(), &session.generator);
    let (grads, norm) = clip_grad_norm(&session.generator, grads, opts.clip_norm);
    session.generator = session.g_optim.step(session.generator.clone(), grads);

    let sample_size = batch.sample_size(opts.sentence_avg).max(1) as f64;
    let logged = loss_value / LN_2;
    session.g_meters.train_loss.update(logged, sample_size);
    session.sink.write(&[("pg_train_loss", logged)], step);

    tracing::debug!(
        "G policy gradient loss at step {}: {:.3}, grad norm {:.3}, lr={}",
        step, loss_value, norm, session.g_optim.learning_rate()
    );
    Ok(logged)
}

/// Discriminator update. Returns (loss, accuracy).
pub fn discriminator_step<B, G, D>(
    session: &mut TrainingSession<B, G, D>,
    batch:   &TranslationBatch<B>,
    opts:    &StepOptions,
    step:    usize,
) -> Result<(f64, f64)>
where
    B: AutodiffBackend,
    G: Generator<B>,
    D: Discriminator<B> + AutodiffModule<B> + 'static,
{
    let adversary = session
        .adversary
        .as_mut()
        .context("discriminator step requires a discriminator")?;

    let (loss, acc) = discriminator_loss_acc(&session.generator, &adversary.model, batch, opts.pad_id);
    let loss_value = to_f64(loss.clone());
    let acc_value  = to_f64(acc);

    let grads = GradientsParams::from_grads(loss.backward(), &adversary.model);
    let (grads, _) = clip_grad_norm(&adversary.model, grads, opts.clip_norm);
    adversary.model = adversary.optim.step(adversary.model.clone(), grads);

    session.d_meters.train_loss.update(loss_value, 1.0);
    session.d_meters.train_acc.update(acc_value, 1.0);
    session.d_meters.bsz.update(batch.nsentences as f64, 1.0);
    session.sink.write(&[("disc_train_loss", loss_value), ("disc_train_acc", acc_value)], step);

    tracing::debug!(
        "D training loss {:.3}, acc {:.3} at step {}",
        session.d_meters.train_loss.avg(), session.d_meters.train_acc.avg(), step
    );
    Ok((loss_value, acc_value))
}

// ─── Validation ───────────────────────────────────────────────────────────────

/// Host-side numbers from one validation batch.
#[derive(Debug, Clone, Copy)]
pub struct ValidationStats {
    /// Generator NLL in bits per sample unit
    pub g_loss:        f64,
    pub sample_size:   f64,
    pub correct:       f64,
    pub total:         f64,
    /// (loss, accuracy) when a discriminator is present
    pub discriminator: Option<(f64, f64)>,
}

impl ValidationStats {
    pub fn token_accuracy(&self) -> f64 {
        if self.total > 0.0 { self.correct / self.total } else { f64::NAN }
    }
}

/// Loss computations of the validation pass, run on eval-mode
/// modules (`AutodiffModule::valid`), so nothing is recorded.
pub fn validation_losses<B, G, D>(
    generator:     &G,
    discriminator: Option<&D>,
    batch:         &TranslationBatch<B>,
    opts:          &StepOptions,
) -> ValidationStats
where
    B: Backend,
    G: Generator<B>,
    D: Discriminator<B>,
{
    let sample_size = batch.sample_size(opts.sentence_avg).max(1) as f64;
    let MleLoss { nll, log_probs, .. } = mle_loss(generator, batch, opts.pad_id);
    let (correct, total) = token_accuracy(log_probs, batch.target.clone(), opts.pad_id);

    let discriminator = discriminator.map(|d| {
        let (loss, acc) = discriminator_loss_acc(generator, d, batch, opts.pad_id);
        (to_f64(loss), to_f64(acc))
    });

    ValidationStats {
        g_loss: to_f64(nll) / sample_size / LN_2,
        sample_size,
        correct,
        total,
        discriminator,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{sentence_pair::SentencePair, traits::NullSink, variant::OptimizerKind};
    use crate::ml::{
        discriminator::{AttentionDiscriminator, DiscriminatorConfig},
        generator::{LstmSeq2Seq, Seq2SeqConfig},
        session::SessionOptions,
    };
    use burn::backend::{Autodiff, NdArray};
    use rand::SeedableRng;

    type TB = Autodiff<NdArray>;
    type Session = TrainingSession<TB, LstmSeq2Seq<TB>, AttentionDiscriminator<TB>>;

    const OPTS: StepOptions = StepOptions {
        clip_norm:    1.0,
        sentence_avg: false,
        kld_weight:   1.0,
        pad_id:       0,
    };

    fn session(with_discriminator: bool) -> Session {
        let device = Default::default();
        let generator = Seq2SeqConfig::new(8, 9)
            .with_embed_dim(6)
            .with_hidden_dim(8)
            .with_num_layers(1)
            .init(&device);
        let discriminator = with_discriminator.then(|| {
            DiscriminatorConfig::new(8, 9)
                .with_embed_dim(4)
                .with_hidden_dim(5)
                .init(&device)
        });
        let opts = SessionOptions {
            g_optimizer:     OptimizerKind::Adam,
            g_learning_rate: 1e-2,
            d_optimizer:     OptimizerKind::Adam,
            d_learning_rate: 1e-2,
            momentum:        0.9,
        };
        TrainingSession::new(generator, discriminator, &opts, Box::new(NullSink), device)
    }

    fn batch() -> TranslationBatch<TB> {
        let pairs = vec![
            SentencePair::new(0, vec![3, 4, 5, 1], vec![6, 7, 1]),
            SentencePair::new(1, vec![3, 1], vec![8, 6, 2, 1]),
        ];
        TranslationBatch::from_pairs(&pairs, 0, 1, &Default::default())
    }

    fn weights<const D: usize>(t: Tensor<TB, D>) -> Vec<f32> {
        t.to_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_alternation_is_reproducible() {
        let policy = AlternationPolicy::new(0.5);
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..32).map(|_| policy.choose(&mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(draw(11), draw(11));
        assert!(draw(11).contains(&GeneratorObjective::Mle));
        assert!(draw(11).contains(&GeneratorObjective::PolicyGradient));
    }

    #[test]
    fn test_alternation_extremes() {
        let mut rng = StdRng::seed_from_u64(0);
        let never = AlternationPolicy::mle_only();
        let always = AlternationPolicy::new(1.0);
        for _ in 0..64 {
            assert_eq!(never.choose(&mut rng), GeneratorObjective::Mle);
            assert_eq!(always.choose(&mut rng), GeneratorObjective::PolicyGradient);
        }
    }

    #[test]
    fn test_mle_step_updates_generator_and_meters() {
        let mut s = session(false);
        let before = weights(s.generator.output.weight.val());

        let logged = mle_step(&mut s, &batch(), &OPTS, 0);

        assert!(logged.is_finite() && logged > 0.0);
        assert_ne!(before, weights(s.generator.output.weight.val()));
        assert_eq!(s.g_meters.train_loss.count(), 7.0);
        assert_eq!(s.g_meters.bsz.avg(), 2.0);
    }

    #[test]
    fn test_pg_step_requires_discriminator() {
        let mut s = session(false);
        assert!(pg_step(&mut s, &batch(), &OPTS, 0).is_err());
        assert!(discriminator_step(&mut s, &batch(), &OPTS, 0).is_err());
    }

    #[test]
    fn test_pg_step_leaves_discriminator_untouched() {
        let mut s = session(true);
        let d_before = weights(s.adversary.as_ref().unwrap().model.classifier.weight.val());
        let g_before = weights(s.generator.output.weight.val());

        let logged = pg_step(&mut s, &batch(), &OPTS, 0).unwrap();

        assert!(logged.is_finite());
        assert_ne!(g_before, weights(s.generator.output.weight.val()));
        assert_eq!(d_before, weights(s.adversary.as_ref().unwrap().model.classifier.weight.val()));
    }

    #[test]
    fn test_discriminator_step_keeps_embeddings_frozen() {
        let mut s = session(true);
        let adv = s.adversary.as_ref().unwrap();
        let src_embed  = weights(adv.model.embed_src.weight.val());
        let trg_embed  = weights(adv.model.embed_trg.weight.val());
        let classifier = weights(adv.model.classifier.weight.val());
        let generator  = weights(s.generator.output.weight.val());

        let (loss, acc) = discriminator_step(&mut s, &batch(), &OPTS, 0).unwrap();
        assert!(loss.is_finite());
        assert!((0.0..=1.0).contains(&acc));

        let adv = s.adversary.as_ref().unwrap();
        assert_eq!(src_embed, weights(adv.model.embed_src.weight.val()));
        assert_eq!(trg_embed, weights(adv.model.embed_trg.weight.val()));
        assert_ne!(classifier, weights(adv.model.classifier.weight.val()));
        assert_eq!(generator, weights(s.generator.output.weight.val()));
        assert_eq!(s.d_meters.train_acc.count(), 1.0);
    }

    #[test]
    fn test_validation_on_eval_modules() {
        let s = session(true);
        let generator = s.generator.valid();
        let discriminator = s.adversary.as_ref().map(|a| a.model.valid());

        let pairs = vec![SentencePair::new(0, vec![3, 1], vec![6, 7, 1])];
        let batch = TranslationBatch::<NdArray>::from_pairs(&pairs, 0, 1, &Default::default());
        let stats = validation_losses(&generator, discriminator.as_ref(), &batch, &OPTS);

        assert!(stats.g_loss.is_finite() && stats.g_loss > 0.0);
        assert_eq!(stats.sample_size, 3.0);
        assert_eq!(stats.total, 3.0);
        let (d_loss, d_acc) = stats.discriminator.unwrap();
        assert!(d_loss.is_finite());
        assert!([0.0, 0.5, 1.0].contains(&d_acc));
    }

    #[test]
    fn test_greedy_prediction_copies_padding() {
        let device = Default::default();
        let lp = Tensor::<NdArray, 3>::from_data(
            [[[0.0f32, 0.1, 0.9], [0.0, 0.9, 0.1]]],
            &device,
        );
        let target = Tensor::<NdArray, 2, Int>::from_data([[5i64, 0]], &device);
        let pred = greedy_prediction(lp, &target, 0);
        assert_eq!(pred.to_data().to_vec::<i64>().unwrap(), vec![2, 0]);
    }
}
