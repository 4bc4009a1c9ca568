// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// From raw parallel text to device tensors:
//
//   <data>/<split>.<lang> files
//       │
//       ▼
//   Preprocessor         → cleans each line
//       │
//       ▼
//   RawTextLoader        → vocabulary ids + EOS, aligned pairs
//       │
//       ▼
//   TranslationDataset   → Burn Dataset; plans an epoch of RawBatches
//       │                  (length-sorted, token budget, shards)
//       ▼
//   TranslationBatch     → padded [B, len] tensors on a device
//
// Reference: Burn Book §4 (Datasets)

/// Reads <split>.<lang> files into SentencePairs
pub mod loader;

/// Cleans raw corpus lines
pub mod preprocessor;

/// In-memory split and epoch batch planning
pub mod dataset;

/// Materialises planned batches as tensors
pub mod batcher;
