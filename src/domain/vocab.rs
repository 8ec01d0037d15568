// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// A closed, bidirectional token <-> id table.
//
// The table is built once from the token list of a vocabulary
// file and never grows afterwards. Looking up a token that is
// not in the table is an error, never an implicit insert: an
// unseen character in a data file must not silently allocate a
// fresh id and shift the id space away from the one the model
// (and the base language model) were built against.
//
// Character and tag vocabularies are two separate instances;
// their ids live in disjoint namespaces.

use std::collections::HashMap;
use thiserror::Error;

/// Sequence start marker, must be present in the character vocabulary.
pub const BOS: &str = "<s>";

/// Sequence end marker, must be present in the character vocabulary.
pub const EOS: &str = "</s>";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VocabError {
    #[error("token '{token}' is not in the {kind} vocabulary")]
    OutOfVocabulary { kind: String, token: String },

    #[error("id {id} is outside the {kind} vocabulary (size {size})")]
    UnknownId { kind: String, id: usize, size: usize },

    #[error("token '{token}' appears twice in the {kind} vocabulary (ids {first} and {second})")]
    DuplicateToken { kind: String, token: String, first: usize, second: usize },

    #[error("empty token at line {line} of the {kind} vocabulary")]
    EmptyToken { kind: String, line: usize },

    #[error("the {kind} vocabulary is missing the required marker '{marker}'")]
    MissingMarker { kind: String, marker: String },
}

/// Token table whose ids are the positions of the tokens it was built from.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// Human readable name used in diagnostics ("character", "tag")
    kind:   String,
    tokens: Vec<String>,
    index:  HashMap<String, usize>,
}

impl Vocabulary {
    /// Build a vocabulary where the i-th token gets id i.
    ///
    /// Rejects empty tokens and duplicates so that every id maps to
    /// exactly one surface token and vice versa.
    pub fn from_tokens<I, S>(kind: impl Into<String>, tokens: I) -> Result<Self, VocabError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kind = kind.into();
        let mut list  = Vec::new();
        let mut index = HashMap::new();

        for (id, token) in tokens.into_iter().enumerate() {
            let token: String = token.into();
            if token.is_empty() {
                return Err(VocabError::EmptyToken { kind, line: id });
            }
            if let Some(&first) = index.get(&token) {
                return Err(VocabError::DuplicateToken { kind, token, first, second: id });
            }
            index.insert(token.clone(), id);
            list.push(token);
        }

        Ok(Self { kind, tokens: list, index })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Id of `token`, or `OutOfVocabulary`.
    pub fn id(&self, token: &str) -> Result<usize, VocabError> {
        self.index
            .get(token)
            .copied()
            .ok_or_else(|| VocabError::OutOfVocabulary {
                kind:  self.kind.clone(),
                token: token.to_string(),
            })
    }

    /// Surface token for `id`.
    pub fn token(&self, id: usize) -> Result<&str, VocabError> {
        self.tokens
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| VocabError::UnknownId {
                kind: self.kind.clone(),
                id,
                size: self.tokens.len(),
            })
    }

    /// Map every token, failing on the first unknown one.
    pub fn encode<'a, I>(&self, tokens: I) -> Result<Vec<usize>, VocabError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tokens.into_iter().map(|t| self.id(t)).collect()
    }

    /// Render ids as their space-separated surface form, e.g. "c a t s".
    pub fn render(&self, ids: &[usize]) -> Result<String, VocabError> {
        let parts = ids
            .iter()
            .map(|&id| self.token(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join(" "))
    }

    /// Id of a marker token the rest of the system depends on.
    pub fn marker(&self, marker: &str) -> Result<usize, VocabError> {
        self.id(marker).map_err(|_| VocabError::MissingMarker {
            kind:   self.kind.clone(),
            marker: marker.to_string(),
        })
    }
}
