// ============================================================
// Layer 3 — Example Domain Type
// ============================================================
// One parsed record of a training or evaluation file:
//
//   "c a t | c a t s | NN"
//      │       │       └── tag id     (tag vocabulary)
//      │       └────────── target ids (character vocabulary)
//      └────────────────── input ids  (character vocabulary)
//
// Examples are immutable once parsed. Sequences never carry the
// <s> / </s> markers; the network adds them itself.

use serde::{Deserialize, Serialize};

/// Dense id in the character vocabulary.
pub type CharId = usize;

/// Dense id in the morphological tag vocabulary.
pub type TagId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    input:  Vec<CharId>,
    target: Vec<CharId>,
    tag:    TagId,
}

impl Example {
    pub fn new(input: Vec<CharId>, target: Vec<CharId>, tag: TagId) -> Self {
        Self { input, target, tag }
    }

    pub fn input(&self) -> &[CharId] {
        &self.input
    }

    pub fn target(&self) -> &[CharId] {
        &self.target
    }

    pub fn tag(&self) -> TagId {
        self.tag
    }

    /// Exact match against a predicted sequence: same length, same ids,
    /// same order. No partial credit.
    pub fn is_exact_match(&self, predicted: &[CharId]) -> bool {
        self.target.as_slice() == predicted
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_is_order_sensitive() {
        let ex = Example::new(vec![1, 2], vec![3, 4, 5], 0);
        assert!(ex.is_exact_match(&[3, 4, 5]));
        assert!(!ex.is_exact_match(&[3, 5, 4]));
        assert!(!ex.is_exact_match(&[3, 4]));
        assert!(!ex.is_exact_match(&[3, 4, 5, 5]));
    }
}
