// ============================================================
// Layer 6 - Running Averages
// ============================================================
// AverageMeter keeps a weighted running mean as (sum, count).
// The trainer owns one ModelMeters group per model and resets
// it at every phase boundary (start of training, start of
// validation), so nothing leaks from one phase into the next.
//
// An empty meter has no average: avg() returns NaN rather than
// dividing by zero, and callers treat NaN as "no data".

/// Weighted running mean of a single metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AverageMeter {
    sum:   f64,
    count: f64,
}

impl AverageMeter {
    /// Add `value` with weight `weight` (use 1.0 for a plain mean).
    pub fn update(&mut self, value: f64, weight: f64) {
        self.sum   += value * weight;
        self.count += weight;
    }

    /// sum / count, or NaN when nothing has been recorded
    pub fn avg(&self) -> f64 {
        if self.count == 0.0 {
            f64::NAN
        } else {
            self.sum / self.count
        }
    }

    pub fn count(&self) -> f64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0.0
    }

    pub fn reset(&mut self) {
        self.sum   = 0.0;
        self.count = 0.0;
    }
}

/// The five meters tracked for each model.
#[derive(Debug, Clone, Default)]
pub struct ModelMeters {
    pub train_loss: AverageMeter,
    pub valid_loss: AverageMeter,
    pub train_acc:  AverageMeter,
    pub valid_acc:  AverageMeter,
    /// Sentences per batch
    pub bsz:        AverageMeter,
}

impl ModelMeters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.train_loss.reset();
        self.valid_loss.reset();
        self.train_acc.reset();
        self.valid_acc.reset();
        self.bsz.reset();
    }

    /// Name/meter pairs in a stable order, for summary lines
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &AverageMeter)> {
        [
            ("train_loss", &self.train_loss),
            ("valid_loss", &self.valid_loss),
            ("train_acc",  &self.train_acc),
            ("valid_acc",  &self.valid_acc),
            ("bsz",        &self.bsz),
        ]
        .into_iter()
    }

    /// "name=avg" for every non-empty meter
    pub fn summary(&self) -> String {
        self.iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(name, m)| format!("{name}={:.3}", m.avg()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
