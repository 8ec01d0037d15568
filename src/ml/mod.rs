// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All burn code lives in this layer; the domain and data layers
// only see plain ids and the traits of domain::traits.
//
//   lstm.rs      — LSTM cell and layer stack, stepped one char at a time
//   model.rs     — one tag's transducer network, and the bank of all tags
//   optim.rs     — Adadelta with L2 weight decay
//   tag_bank.rs  — (network, optimiser) pairs, one per tag
//   trainer.rs   — epoch loop, evaluation, best-accuracy checkpointing
//   decoder.rs   — greedy ensemble decoding with log-prob averaging
//   evaluator.rs — exact-match accuracy and the best-score policy
//   base_lm.rs   — the frozen character n-gram language model
//   numeric.rs   — NaN / infinity guards
//   error.rs     — TransducerError
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Hochreiter & Schmidhuber (1997) Long Short-Term Memory

pub mod lstm;

/// Per-tag transducer network
pub mod model;

pub mod optim;

pub mod tag_bank;

/// Training loop with evaluation and checkpointing
pub mod trainer;

/// Ensemble greedy decoder
pub mod decoder;

pub mod evaluator;

/// Character n-gram base language model
pub mod base_lm;

pub mod numeric;

pub mod error;

#[cfg(test)]
pub mod test_support;
