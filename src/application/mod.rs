// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Workflow coordination only: no tensor math (Layer 5), no file
// formats (Layers 4 and 6), no printing (Layer 1).
//
//   train_use_case      config → vocabularies → datasets → models
//                       → joint training on the chosen device
//   translate_use_case  run directory → generator → greedy
//                       translations of a split
//
// Reference: Clean Architecture pattern

pub mod train_use_case;

pub mod translate_use_case;
