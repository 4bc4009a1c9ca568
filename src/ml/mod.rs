// ============================================================
// Layer 5 - ML Layer (Burn)
// ============================================================
// All tensor code lives here.
//
//   model.rs          Generator / Discriminator traits, attention
//   generator.rs      LSTM encoder/decoder (+ variational bridge)
//   discriminator.rs  attention classifier over (source, target)
//   variant.rs        gan / mle / vae construction functions
//   loss.rs           NLL, BCE, policy-gradient loss, accuracies
//   optim.rs          optimizer kinds, lr decay, gradient clipping
//   session.rs        models + optimizers + meters + sink
//   steps.rs          MLE, policy-gradient and discriminator steps
//   trainer.rs        epoch loop, validation, checkpoint selection
//   inferencer.rs     greedy translation from a saved run
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

pub mod model;

pub mod generator;

pub mod discriminator;

pub mod variant;

pub mod loss;

pub mod optim;

pub mod session;

pub mod steps;

pub mod trainer;

pub mod inferencer;
