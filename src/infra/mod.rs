// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting file concerns used by the application and ml
// layers but owned by neither:
//
//   checkpoint.rs — the best-accuracy checkpoint of every tag
//                   network, its manifest, and the run's
//                   TrainConfig, all inside one output directory
//
//   metrics.rs    — per-epoch CSV of loss and accuracy

/// Best-model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
