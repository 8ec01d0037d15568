// ============================================================
// Layer 4 — File Loader
// ============================================================
// Reads the flat files a run starts from:
//
//   vocabulary file → one token per line, 0-based line number = id
//   data file       → one example record per line
//
// Both are read once at startup. A missing or unreadable file is
// a configuration error and aborts the run.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::vocab::Vocabulary;

/// Load a vocabulary file. Line `i` (after trimming surrounding
/// whitespace and a Windows `\r`) becomes the token with id `i`.
pub fn read_vocab(path: impl AsRef<Path>, kind: &str) -> Result<Vocabulary> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {kind} vocabulary '{}'", path.display()))?;

    let vocab = Vocabulary::from_tokens(kind, text.lines().map(|l| l.trim().to_string()))
        .with_context(|| format!("Invalid {kind} vocabulary '{}'", path.display()))?;

    tracing::debug!("Loaded {} {} tokens from '{}'", vocab.len(), kind, path.display());
    Ok(vocab)
}

/// Read a data file into its non-blank lines, keeping 1-based line
/// numbers for diagnostics.
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<(usize, String)>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read data file '{}'", path.display()))?;

    let lines: Vec<(usize, String)> = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| (i + 1, l.to_string()))
        .collect();

    tracing::debug!("Read {} records from '{}'", lines.len(), path.display());
    Ok(lines)
}
