// ============================================================
// Layer 2 — Build LM Use Case
// ============================================================
// Count a character n-gram model from a corpus and save it as the
// JSON document `train` and `decode` load as their base LM.
//
// Corpus lines are space-separated characters. With `from_data`
// the corpus is a `|`-separated data file instead and only the
// target field of each record is counted. `<s>` / `</s>` already
// present in a line are dropped; fitting adds them back.
//
// The fitted model's per-char perplexity on its own corpus is
// reported alongside the sequence count.

use anyhow::Result;
use std::{collections::BTreeSet, path::Path};

use crate::data::loader::read_lines;
use crate::domain::{
    traits::{CharLanguageModel, Persistable},
    vocab::{Vocabulary, BOS, EOS},
};
use crate::ml::{
    base_lm::{NgramCounts, NgramLm},
    numeric::ensure_finite,
};

#[derive(Debug, Clone)]
pub struct BuildLmRequest {
    pub corpus:    String,
    pub output:    String,
    pub order:     usize,
    pub from_data: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildLmSummary {
    pub sequences:  usize,
    /// exp of the mean negative log-probability per predicted char,
    /// `</s>` included; `None` for an empty corpus
    pub perplexity: Option<f32>,
}

pub struct BuildLmUseCase {
    request: BuildLmRequest,
}

impl BuildLmUseCase {
    pub fn new(request: BuildLmRequest) -> Self {
        Self { request }
    }

    pub fn execute(&self) -> Result<BuildLmSummary> {
        let req = &self.request;
        let lines = read_lines(&req.corpus)?;

        let mut sequences: Vec<Vec<&str>> = Vec::with_capacity(lines.len());
        for (line, text) in &lines {
            let field = if req.from_data {
                let fields: Vec<&str> = text.split('|').collect();
                if fields.len() != 3 {
                    tracing::warn!("line {}: expected 3 fields, found {}; skipped", line, fields.len());
                    continue;
                }
                fields[1]
            } else {
                text.as_str()
            };

            let seq: Vec<&str> = field
                .split_whitespace()
                .filter(|t| *t != BOS && *t != EOS)
                .collect();
            if !seq.is_empty() {
                sequences.push(seq);
            }
        }

        let counts = NgramCounts::fit(&sequences, req.order)?;
        counts.save(Path::new(&req.output))?;
        let perplexity = corpus_perplexity(&counts, &sequences)?;
        tracing::info!(
            "Saved order-{} language model over {} sequences to '{}'",
            req.order,
            sequences.len(),
            req.output
        );
        Ok(BuildLmSummary { sequences: sequences.len(), perplexity })
    }
}

/// Perplexity of `counts` on the sequences it was fitted on, scored over
/// a vocabulary of exactly the tokens they contain.
fn corpus_perplexity(counts: &NgramCounts, sequences: &[Vec<&str>]) -> Result<Option<f32>> {
    let tokens: BTreeSet<&str> = sequences.iter().flatten().copied().collect();
    let chars = Vocabulary::from_tokens("character", [BOS, EOS].into_iter().chain(tokens))?;
    let lm = NgramLm::bind(counts, &chars);
    let (bos, eos) = (chars.id(BOS)?, chars.id(EOS)?);

    let mut log_prob  = 0.0f64;
    let mut predicted = 0usize;
    for seq in sequences {
        let mut ids = vec![bos];
        ids.extend(chars.encode(seq.iter().copied())?);
        ids.push(eos);
        log_prob += f64::from(lm.score(&ids));
        predicted += ids.len() - 1;
    }
    if predicted == 0 {
        return Ok(None);
    }

    let perplexity = (-log_prob / predicted as f64).exp() as f32;
    Ok(Some(ensure_finite("corpus perplexity", perplexity)?))
}
