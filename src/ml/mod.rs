// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// All Burn model and training code lives here.
//
//   model.rs       encoder-decoder CNN: a strided entry conv,
//                  three residual separable-conv down blocks,
//                  four residual transposed-conv up blocks and
//                  a per-pixel classification head
//
//   trainer.rs     epoch loop: forward pass, per-pixel
//                  cross-entropy, backward pass, optimiser step,
//                  validation, best-checkpoint saving
//
//   inferencer.rs  loads the best checkpoint and predicts
//                  class masks for images

/// Encoder-decoder segmentation network
pub mod model;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Loads a checkpoint and predicts masks
pub mod inferencer;
