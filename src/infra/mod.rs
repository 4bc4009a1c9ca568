// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   checkpoint.rs      run directory, model records, run configs,
//                      best-loss tracking
//   tokenizer_store.rs word-level vocabularies as tokenizer JSON
//   metrics.rs         scalars.csv writer (ScalarSink)
//   meters.rs          running weighted averages
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

pub mod checkpoint;

pub mod tokenizer_store;

pub mod metrics;

pub mod meters;
