// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Cross-cutting persistence used by training and prediction:
//
//   checkpoint.rs  best-epoch model weights (Burn CompactRecorder)
//                  plus the TrainConfig as JSON so prediction
//                  can rebuild the model and the data split.
//
//   metrics.rs     per-epoch loss/accuracy rows in a CSV file.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
