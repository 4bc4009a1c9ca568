// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust types describing a translation training run.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only structs, enums, and traits
//
// The ML layer (Layer 5) and the data layer (Layer 4) both build
// on these definitions, so they stay small and dependency-free.

// A tokenised source/target sentence pair
pub mod sentence_pair;

// Closed choices selected by configuration (model variant, optimizer, device)
pub mod variant;

// Collaborator traits (corpus source, scalar sink)
pub mod traits;

// Fatal configuration errors
pub mod error;
