// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything between two directories on disk and tensor
// batches for the training loop:
//
//   images/*.jpg + trimaps/*.png
//       │
//       ▼
//   PetsIndex          → lists, filters, sorts and pairs files
//       │
//       ▼
//   splitter           → seeded shuffle, hold out validation tail
//       │
//       ▼
//   PetsDataset        → Burn Dataset; decodes one pair per get()
//       │                 (decoder: resize, labels 1..3 → 0..2)
//       ▼
//   SegmentationBatcher → stacks items into NCHW / NHW tensors
//       │
//       ▼
//   DataLoader         → feeds batches to the training loop

/// Lists and pairs image and trimap files
pub mod index;

/// Decodes and resizes photos and trimaps
pub mod decoder;

/// Implements Burn's Dataset trait over image/mask pairs
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded shuffle and train/validation split
pub mod splitter;
