// ============================================================
// Layer 5 - Loss Functions
// ============================================================
// The three objectives that couple generator and discriminator:
//
//   nll_loss                summed token NLL, padding ignored
//   binary_cross_entropy    real (1) vs generated (0) classification
//   policy_gradient_loss    token log-probs weighted by a per-sentence
//                           reward, averaged over the batch
//
// All functions are generic over the Backend so the same code runs
// under autodiff (training) and on the inner backend (validation).
//
// Shapes:
//   log_probs: [batch, trg_len, vocab]  (log-softmax output)
//   target:    [batch, trg_len]         (Int, right-padded)
//   probs:     [n]                      (discriminator output in (0, 1))

use burn::prelude::*;

/// log p(target) at every position: [batch, trg_len]
pub fn target_log_probs<B: Backend>(
    log_probs: Tensor<B, 3>,
    target:    Tensor<B, 2, Int>,
) -> Tensor<B, 2> {
    let [batch, len, vocab] = log_probs.dims();
    log_probs
        .reshape([batch * len, vocab])
        .gather(1, target.reshape([batch * len, 1]))
        .reshape([batch, len])
}

/// Summed negative log-likelihood over every non-pad target token.
///
/// Pad positions are masked to zero after the gather, so whatever the
/// model predicts there contributes nothing.
pub fn nll_loss<B: Backend>(
    log_probs: Tensor<B, 3>,
    target:    Tensor<B, 2, Int>,
    pad_id:    usize,
) -> Tensor<B, 1> {
    let pad_mask = target.clone().equal_elem(pad_id as i64);
    target_log_probs(log_probs, target)
        .mask_fill(pad_mask, 0.0)
        .sum()
        .neg()
}

/// Mean binary cross-entropy. Log terms are clamped at -100 so a
/// saturated discriminator yields a large finite loss, not infinity.
pub fn binary_cross_entropy<B: Backend>(
    probs:  Tensor<B, 1>,
    labels: Tensor<B, 1>,
) -> Tensor<B, 1> {
    let log_p   = probs.clone().log().clamp_min(-100.0);
    let log_not = probs.neg().add_scalar(1.0).log().clamp_min(-100.0);
    let per_example = labels.clone() * log_p + labels.neg().add_scalar(1.0) * log_not;
    per_example.mean().neg()
}

/// REINFORCE-style loss: -(1/B) Σ_b reward_b Σ_t log p(target_bt),
/// pad positions excluded. `reward` is [batch] and must already be
/// detached from the discriminator graph.
pub fn policy_gradient_loss<B: Backend>(
    log_probs: Tensor<B, 3>,
    target:    Tensor<B, 2, Int>,
    reward:    Tensor<B, 1>,
    pad_id:    usize,
) -> Tensor<B, 1> {
    let [batch, _, _] = log_probs.dims();
    let pad_mask = target.clone().equal_elem(pad_id as i64);
    let picked = target_log_probs(log_probs, target).mask_fill(pad_mask, 0.0);
    (picked * reward.reshape([batch, 1]))
        .sum()
        .neg()
        .div_scalar(batch as f64)
}

/// Fraction of discriminator outputs that round to their label.
/// Rounding follows round-half-to-even at 0.5, i.e. 0.5 counts as 0.
pub fn discriminator_accuracy<B: Backend>(
    probs:  Tensor<B, 1>,
    labels: Tensor<B, 1>,
) -> Tensor<B, 1> {
    probs
        .greater_elem(0.5)
        .float()
        .equal(labels)
        .float()
        .mean()
}

/// (correct, total) greedy token predictions over non-pad positions
pub fn token_accuracy<B: Backend>(
    log_probs: Tensor<B, 3>,
    target:    Tensor<B, 2, Int>,
    pad_id:    usize,
) -> (f64, f64) {
    let [batch, len, _] = log_probs.dims();
    let predicted = log_probs.argmax(2).reshape([batch, len]);
    let keep      = target.clone().not_equal_elem(pad_id as i64);
    let correct   = predicted.equal(target).int() * keep.clone().int();
    (
        correct.sum().into_scalar().elem::<f64>(),
        keep.int().sum().into_scalar().elem::<f64>(),
    )
}

/// Read a single-element float tensor back to the host
pub fn to_f64<B: Backend>(t: Tensor<B, 1>) -> f64 {
    t.into_scalar().elem::<f64>()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn log_probs(rows: [[f32; 3]; 3]) -> Tensor<TB, 3> {
        let p = Tensor::<TB, 2>::from_data(rows, &Default::default());
        burn::tensor::activation::log_softmax(p, 1).reshape([1, 3, 3])
    }

    fn ids(row: [i64; 3]) -> Tensor<TB, 2, Int> {
        Tensor::<TB, 1, Int>::from_data(row, &Default::default()).reshape([1, 3])
    }

    #[test]
    fn test_nll_ignores_padding_positions() {
        const PAD: usize = 0;
        let a = log_probs([[0.1, 3.0, 0.2], [0.3, 0.1, 2.0], [5.0, 0.0, 0.0]]);
        // Same first two rows, wildly different prediction at the pad slot
        let b = log_probs([[0.1, 3.0, 0.2], [0.3, 0.1, 2.0], [0.0, 0.0, 9.0]]);

        let target = ids([1, 2, 0]);
        let loss_a = to_f64(nll_loss(a.clone(), target.clone(), PAD));
        let loss_b = to_f64(nll_loss(b, target.clone(), PAD));
        assert!((loss_a - loss_b).abs() < 1e-5);

        let lp = a.clone().reshape([3, 3]).to_data().to_vec::<f32>().unwrap();
        let expected = -(lp[1] + lp[5]) as f64;
        assert!((loss_a - expected).abs() < 1e-5);

        // Turning the pad slot into a real token makes it count
        let unpadded = to_f64(nll_loss(a, ids([1, 2, 1]), PAD));
        assert!(unpadded > loss_a + 1e-3);
    }

    #[test]
    fn test_accuracy_rounding() {
        let device = Default::default();
        let labels = Tensor::<TB, 1>::from_data([0.0f32, 1.0], &device);

        let all_right = Tensor::<TB, 1>::from_data([0.1f32, 0.9], &device);
        assert_eq!(to_f64(discriminator_accuracy(all_right, labels.clone())), 1.0);

        let one_wrong = Tensor::<TB, 1>::from_data([0.6f32, 0.9], &device);
        assert_eq!(to_f64(discriminator_accuracy(one_wrong, labels.clone())), 0.5);

        let half = Tensor::<TB, 1>::from_data([0.5f32, 0.5], &device);
        assert_eq!(to_f64(discriminator_accuracy(half, labels)), 0.5);
    }

    #[test]
    fn test_bce_matches_closed_form() {
        let device = Default::default();
        let probs  = Tensor::<TB, 1>::from_data([0.2f32, 0.7], &device);
        let labels = Tensor::<TB, 1>::from_data([0.0f32, 1.0], &device);
        let got = to_f64(binary_cross_entropy(probs, labels));
        let expected = -((0.8f64).ln() + (0.7f64).ln()) / 2.0;
        assert!((got - expected).abs() < 1e-5);
    }

    #[test]
    fn test_bce_is_finite_when_saturated() {
        let device = Default::default();
        let probs  = Tensor::<TB, 1>::from_data([1.0f32], &device);
        let labels = Tensor::<TB, 1>::from_data([0.0f32], &device);
        let got = to_f64(binary_cross_entropy(probs, labels));
        assert!((got - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_policy_gradient_scales_with_reward() {
        const PAD: usize = 0;
        let lp = log_probs([[0.1, 3.0, 0.2], [0.3, 0.1, 2.0], [5.0, 0.0, 0.0]]);
        let target = ids([1, 2, 0]);
        let device = Default::default();

        let nll = to_f64(nll_loss(lp.clone(), target.clone(), PAD));
        let full = to_f64(policy_gradient_loss(
            lp.clone(), target.clone(),
            Tensor::<TB, 1>::from_data([1.0f32], &device), PAD,
        ));
        let half = to_f64(policy_gradient_loss(
            lp, target,
            Tensor::<TB, 1>::from_data([0.5f32], &device), PAD,
        ));

        // One sentence, reward 1: identical to the supervised loss
        assert!((full - nll).abs() < 1e-5);
        assert!((half - nll / 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_token_accuracy_skips_padding() {
        let lp = log_probs([[0.1, 3.0, 0.2], [0.3, 2.0, 0.1], [5.0, 0.0, 0.0]]);
        // argmax = [1, 1, 0]; last position is pad
        let (correct, total) = token_accuracy(lp, ids([1, 2, 0]), 0);
        assert_eq!(total, 2.0);
        assert_eq!(correct, 1.0);
    }
}
