// ============================================================
// Layer 5 — Held-out Evaluation
// ============================================================
// Exact-match accuracy over an evaluation set, and the policy that
// decides when a new accuracy deserves a checkpoint.
//
// The decoder is passed in as a closure so the same scoring code
// serves the training loop (current model), the decode command
// (a loaded ensemble), and tests (canned predictions).

use anyhow::Result;
use thiserror::Error;

use crate::domain::example::{CharId, Example};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("accuracy is undefined on an empty evaluation set")]
    EmptyEvaluationSet,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub correct: usize,
    pub total:   usize,
}

impl EvalReport {
    pub fn accuracy(&self) -> f64 {
        self.correct as f64 / self.total as f64
    }
}

/// Decode every example in order and count exact matches.
pub fn evaluate<F>(examples: &[Example], mut decode: F) -> Result<EvalReport>
where
    F: FnMut(&Example) -> Result<Vec<CharId>>,
{
    if examples.is_empty() {
        return Err(EvalError::EmptyEvaluationSet.into());
    }

    let mut correct = 0usize;
    for ex in examples {
        let predicted = decode(ex)?;
        if ex.is_exact_match(&predicted) {
            correct += 1;
        }
    }

    Ok(EvalReport { correct, total: examples.len() })
}

/// Best held-out accuracy seen so far in a run.
///
/// Starts below every reachable accuracy, so the first evaluation always
/// counts as an improvement; afterwards only a strictly higher value does.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestScore {
    best: Option<f64>,
}

impl BestScore {
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn is_improvement(&self, accuracy: f64) -> bool {
        match self.best {
            None => true,
            Some(b) => accuracy > b,
        }
    }

    /// Record `accuracy`; returns whether it was an improvement.
    pub fn update(&mut self, accuracy: f64) -> bool {
        let improved = self.is_improvement(accuracy);
        if improved {
            self.best = Some(accuracy);
        }
        improved
    }
}
