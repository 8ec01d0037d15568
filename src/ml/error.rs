use thiserror::Error;

use crate::domain::example::{CharId, TagId};

/// Failures of the transducer networks themselves (as opposed to I/O).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransducerError {
    #[error("tag id {tag} has no parameter store ({tag_count} allocated)")]
    UnknownTag { tag: TagId, tag_count: usize },

    #[error("character id {id} is outside the vocabulary (size {vocab_size})")]
    CharOutOfRange { id: CharId, vocab_size: usize },

    #[error("{0} sequence is empty")]
    EmptySequence(&'static str),

    #[error("base language model covers {lm} characters, the networks {model}")]
    LmVocabMismatch { lm: usize, model: usize },
}

/// Reject empty sequences and ids the vocabulary does not have.
pub fn check_sequence(
    what:       &'static str,
    ids:        &[CharId],
    vocab_size: usize,
) -> Result<(), TransducerError> {
    if ids.is_empty() {
        return Err(TransducerError::EmptySequence(what));
    }
    match ids.iter().find(|&&id| id >= vocab_size) {
        Some(&id) => Err(TransducerError::CharOutOfRange { id, vocab_size }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_sequence() {
        assert!(check_sequence("input", &[0, 3, 4], 5).is_ok());
        assert_eq!(
            check_sequence("input", &[], 5),
            Err(TransducerError::EmptySequence("input"))
        );
        assert_eq!(
            check_sequence("target", &[1, 5], 5),
            Err(TransducerError::CharOutOfRange { id: 5, vocab_size: 5 })
        );
    }
}
