// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The two collaborators the trainer talks to without knowing
// their implementation:
//
//   CorpusSource   where sentence pairs come from
//                  (RawTextLoader reads <data>/<split>.<lang>)
//   ScalarSink     where per-step scalars go
//                  (CsvScalarWriter appends to scalars.csv)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::sentence_pair::SentencePair;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Any component that can produce aligned sentence pairs for a
/// named split ("train", "valid", "test").
pub trait CorpusSource {
    fn load_split(&self, split: &str) -> Result<Vec<SentencePair>>;
}

// ─── ScalarSink ───────────────────────────────────────────────────────────────
/// Receives named scalar values tagged with a global step.
///
/// Side-effect only. Implementations swallow (and log) their own
/// I/O failures: losing a plot point must never stop training.
pub trait ScalarSink {
    fn write(&mut self, scores: &[(&str, f64)], step: usize);
}

/// Sink that drops everything, for runs that only want checkpoints
pub struct NullSink;

impl ScalarSink for NullSink {
    fn write(&mut self, _scores: &[(&str, f64)], _step: usize) {}
}
