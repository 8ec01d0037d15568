// ============================================================
// Layer 4 — Record Parser
// ============================================================
// Turns one data line into an Example:
//
//   "c a t | c a t s | NN"
//     field 0: space-separated input characters
//     field 1: space-separated target characters
//     field 2: a single morphological tag token
//
// Every token is looked up in a closed vocabulary. A line with the
// wrong number of fields, an empty sequence, a `<s>`/`</s>` marker
// anywhere but the ends of a sequence, or a token the vocabulary
// does not know is a DataError. What happens next is
// the caller's DataPolicy: abort the run, or log and skip the line.

use anyhow::Result;
use thiserror::Error;

use crate::domain::{
    example::Example,
    vocab::{VocabError, Vocabulary, BOS, EOS},
};

#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("line {line}: expected 3 '|'-separated fields, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("line {line}: the {field} sequence is empty")]
    EmptySequence { line: usize, field: &'static str },

    #[error("line {line}: marker '{marker}' inside the {field} sequence")]
    MarkerInSequence { line: usize, field: &'static str, marker: &'static str },

    #[error("line {line}: {source}")]
    Vocab { line: usize, #[source] source: VocabError },
}

/// What to do with a line that fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataPolicy {
    /// Any bad line aborts the run
    Strict,
    /// Bad lines are reported with a warning and left out
    #[default]
    Skip,
}

/// Parse a single record. `line` is only used for diagnostics.
pub fn parse_line(
    line:  usize,
    text:  &str,
    chars: &Vocabulary,
    tags:  &Vocabulary,
) -> Result<Example, DataError> {
    let fields: Vec<&str> = text.split('|').collect();
    if fields.len() != 3 {
        return Err(DataError::FieldCount { line, found: fields.len() });
    }

    let input  = parse_sequence(line, "input", fields[0], chars)?;
    let target = parse_sequence(line, "target", fields[1], chars)?;

    let tag = tags
        .id(fields[2].trim())
        .map_err(|source| DataError::Vocab { line, source })?;

    Ok(Example::new(input, target, tag))
}

// Markers already present in the file are dropped; the network adds its own.
fn parse_sequence(
    line:  usize,
    field: &'static str,
    text:  &str,
    chars: &Vocabulary,
) -> Result<Vec<usize>, DataError> {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.first() == Some(&BOS) {
        tokens.remove(0);
    }
    if tokens.last() == Some(&EOS) {
        tokens.pop();
    }
    if tokens.is_empty() {
        return Err(DataError::EmptySequence { line, field });
    }
    for marker in [BOS, EOS] {
        if tokens.contains(&marker) {
            return Err(DataError::MarkerInSequence { line, field, marker });
        }
    }

    chars
        .encode(tokens)
        .map_err(|source| DataError::Vocab { line, source })
}

/// Parse every record, applying `policy` to the ones that fail.
pub fn parse_examples(
    lines:  &[(usize, String)],
    chars:  &Vocabulary,
    tags:   &Vocabulary,
    policy: DataPolicy,
) -> Result<Vec<Example>> {
    let mut examples = Vec::with_capacity(lines.len());
    let mut rejected = 0usize;

    for (line, text) in lines {
        match parse_line(*line, text, chars, tags) {
            Ok(ex) => examples.push(ex),
            Err(e) if policy == DataPolicy::Skip => {
                tracing::warn!("Skipping record: {}", e);
                rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if rejected > 0 {
        tracing::warn!("Rejected {} of {} records", rejected, lines.len());
    }
    Ok(examples)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn vocabs() -> (Vocabulary, Vocabulary) {
        let chars = Vocabulary::from_tokens(
            "character",
            ["<s>", "</s>", "c", "a", "t", "s", "d", "o", "g"],
        )
        .unwrap();
        let tags = Vocabulary::from_tokens("tag", ["NN", "VB"]).unwrap();
        (chars, tags)
    }

    #[test]
    fn test_parse_well_formed_line() {
        let (chars, tags) = vocabs();
        let ex = parse_line(1, "c a t | c a t s | NN", &chars, &tags).unwrap();
        assert_eq!(ex.input(), &[2, 3, 4]);
        assert_eq!(ex.target(), &[2, 3, 4, 5]);
        assert_eq!(ex.tag(), 0);
    }

    #[test]
    fn test_markers_are_stripped() {
        let (chars, tags) = vocabs();
        let ex = parse_line(1, "<s> d o g </s>|<s> d o g </s>|VB", &chars, &tags).unwrap();
        assert_eq!(ex.input(), &[6, 7, 8]);
        assert_eq!(ex.target(), &[6, 7, 8]);
        assert_eq!(ex.tag(), 1);
    }

    #[test]
    fn test_interior_markers_are_rejected() {
        let (chars, tags) = vocabs();
        let err = parse_line(5, "c <s> a | c a t | NN", &chars, &tags).unwrap_err();
        assert_eq!(err, DataError::MarkerInSequence { line: 5, field: "input", marker: "<s>" });

        let err = parse_line(6, "c a | c </s> t | NN", &chars, &tags).unwrap_err();
        assert_eq!(err, DataError::MarkerInSequence { line: 6, field: "target", marker: "</s>" });

        // a doubled end marker leaves one behind
        assert!(parse_line(7, "c a t </s> </s> | c | NN", &chars, &tags).is_err());
    }

    #[test]
    fn test_wrong_field_count() {
        let (chars, tags) = vocabs();
        let err = parse_line(7, "c a t | c a t s", &chars, &tags).unwrap_err();
        assert_eq!(err, DataError::FieldCount { line: 7, found: 2 });
    }

    #[test]
    fn test_unknown_char_and_tag() {
        let (chars, tags) = vocabs();
        assert!(matches!(
            parse_line(2, "c a x | c a t | NN", &chars, &tags),
            Err(DataError::Vocab { line: 2, .. })
        ));
        assert!(matches!(
            parse_line(3, "c a t | c a t | JJ", &chars, &tags),
            Err(DataError::Vocab { line: 3, .. })
        ));
        // nothing was registered along the way
        assert_eq!(chars.len(), 9);
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_empty_sequence() {
        let (chars, tags) = vocabs();
        let err = parse_line(4, " <s> </s> | c | NN", &chars, &tags).unwrap_err();
        assert_eq!(err, DataError::EmptySequence { line: 4, field: "input" });
    }

    #[test]
    fn test_skip_policy_keeps_good_lines() {
        let (chars, tags) = vocabs();
        let lines = vec![
            (1, "c a t | c a t s | NN".to_string()),
            (2, "c a t | c a t s".to_string()),
            (3, "d o g | d o g | VB".to_string()),
        ];
        let examples = parse_examples(&lines, &chars, &tags, DataPolicy::Skip).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[1].tag(), 1);
    }

    #[test]
    fn test_strict_policy_fails_fast() {
        let (chars, tags) = vocabs();
        let lines = vec![
            (1, "c a t | c a t s | NN".to_string()),
            (2, "c a z | c a t s | NN".to_string()),
        ];
        assert!(parse_examples(&lines, &chars, &tags, DataPolicy::Strict).is_err());
    }
}
