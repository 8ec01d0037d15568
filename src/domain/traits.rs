// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the training/decoding engine and the
// components it only talks to through a narrow contract:
//
//   - CharLanguageModel → the frozen base language model
//   - StepScorer        → anything the ensemble decoder can drive
//                         one step at a time
//   - Persistable       → components saved to / restored from disk
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::Path;

use crate::domain::example::{CharId, TagId};

// ─── CharLanguageModel ────────────────────────────────────────────────────────
/// A pretrained character-level scorer, read-only for the whole run.
///
/// Only `&self` methods: the training loop holds it by shared
/// reference and its output reaches the networks as plain numbers,
/// so there is no path for a gradient to flow back into it.
pub trait CharLanguageModel {
    /// Size of the character vocabulary the distribution ranges over.
    fn vocab_size(&self) -> usize;

    /// log P(next char | context) for every char id.
    ///
    /// `context` is the partial output so far, starting with `<s>`.
    fn next_log_probs(&self, context: &[CharId]) -> Vec<f32>;

    /// Total log-probability of `sequence` (excluding its first token,
    /// which is treated as given).
    fn score(&self, sequence: &[CharId]) -> f32 {
        (1..sequence.len())
            .map(|t| {
                let next = sequence[t];
                self.next_log_probs(&sequence[..t])
                    .get(next)
                    .copied()
                    .unwrap_or(f32::NEG_INFINITY)
            })
            .sum()
    }
}

// ─── StepScorer ───────────────────────────────────────────────────────────────
/// A model the greedy decoder can query one output step at a time.
///
/// Implementations:
///   - TransducerBank → the per-tag networks
///   - test doubles   → scripted distributions
pub trait StepScorer {
    /// Per-input decoding state (encoder summary, recurrent state, ...).
    type State;

    /// Size of the distribution `next_log_probs` returns.
    fn vocab_size(&self) -> usize;

    /// Prepare to decode `input` with the network of `tag`.
    fn begin(&self, tag: TagId, input: &[CharId]) -> Result<Self::State>;

    /// Log-probabilities of the next char given the committed `history`
    /// (which starts with `<s>`). Advances `state` by the last history item.
    fn next_log_probs(
        &self,
        tag:     TagId,
        state:   &mut Self::State,
        history: &[CharId],
        lm:      &dyn CharLanguageModel,
    ) -> Result<Vec<f32>>;
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose state can be saved and restored from disk.
pub trait Persistable: Sized {
    fn save(&self, path: &Path) -> Result<()>;

    fn load(path: &Path) -> Result<Self>;
}
