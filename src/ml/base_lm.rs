// ============================================================
// Layer 5 — Base Character Language Model
// ============================================================
// The frozen scorer every tag network borrows its conditioning
// signal from. It is an n-gram model over characters:
//
//   P(c | h) = λ_h · count(h, c) / count(h) + (1 − λ_h) · P(c | h')
//   λ_h      = count(h) / (count(h) + distinct followers of h)
//
// where h' drops the oldest char of h (Witten–Bell interpolation).
// The recursion bottoms out at an add-one unigram, so every char
// gets a strictly positive probability and every log-probability
// is finite.
//
// On disk the model is a JSON document of counts keyed by surface
// tokens (NgramCounts). Loading binds it to the character
// vocabulary of the run, producing NgramLm, which only ever hands
// out copies of its numbers.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use crate::domain::{
    example::CharId,
    traits::{CharLanguageModel, Persistable},
    vocab::{Vocabulary, BOS, EOS},
};

pub const DEFAULT_ORDER: usize = 3;

/// Raw n-gram counts, context (space-joined tokens, "" for none) →
/// next token → count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgramCounts {
    pub order:  usize,
    pub counts: BTreeMap<String, BTreeMap<String, u32>>,
}

impl NgramCounts {
    /// Count every n-gram up to `order` in `sequences`, each wrapped in
    /// `<s> … </s>`.
    pub fn fit<S: AsRef<str>>(sequences: &[Vec<S>], order: usize) -> Result<Self> {
        ensure!(order >= 1, "n-gram order must be at least 1");

        let mut counts: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();
        for seq in sequences {
            let mut tokens = vec![BOS];
            tokens.extend(seq.iter().map(AsRef::as_ref));
            tokens.push(EOS);

            for i in 1..tokens.len() {
                for n in 0..order.min(i + 1) {
                    let context = tokens[i - n..i].join(" ");
                    *counts
                        .entry(context)
                        .or_default()
                        .entry(tokens[i].to_string())
                        .or_insert(0) += 1;
                }
            }
        }

        Ok(Self { order, counts })
    }
}

impl Persistable for NgramCounts {
    fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write language model to '{}'", path.display()))
    }

    fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read language model '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed language model '{}'", path.display()))
    }
}

#[derive(Debug, Clone)]
struct ContextStats {
    counts:   Vec<f32>,
    total:    f32,
    distinct: f32,
}

/// n-gram model bound to a character vocabulary.
#[derive(Debug, Clone)]
pub struct NgramLm {
    order:      usize,
    vocab_size: usize,
    contexts:   HashMap<Vec<CharId>, ContextStats>,
}

impl NgramLm {
    /// Resolve token strings to ids of `chars`. N-grams mentioning a
    /// token the vocabulary does not have are dropped.
    pub fn bind(counts: &NgramCounts, chars: &Vocabulary) -> Self {
        let vocab_size = chars.len();
        let mut contexts: HashMap<Vec<CharId>, ContextStats> = HashMap::new();
        let mut dropped = 0usize;

        for (context, followers) in &counts.counts {
            let ctx: Option<Vec<CharId>> = context
                .split_whitespace()
                .map(|t| chars.id(t).ok())
                .collect();
            let Some(ctx) = ctx else {
                dropped += followers.len();
                continue;
            };

            for (token, &count) in followers {
                let Ok(id) = chars.id(token) else {
                    dropped += 1;
                    continue;
                };
                let stats = contexts.entry(ctx.clone()).or_insert_with(|| ContextStats {
                    counts:   vec![0.0; vocab_size],
                    total:    0.0,
                    distinct: 0.0,
                });
                if stats.counts[id] == 0.0 && count > 0 {
                    stats.distinct += 1.0;
                }
                stats.counts[id] += count as f32;
                stats.total += count as f32;
            }
        }

        if dropped > 0 {
            tracing::warn!("Dropped {} n-grams with tokens outside the character vocabulary", dropped);
        }
        Self { order: counts.order.max(1), vocab_size, contexts }
    }

    /// Read counts from `path` and bind them to `chars`.
    pub fn load(path: &Path, chars: &Vocabulary) -> Result<Self> {
        let counts = NgramCounts::load(path)?;
        let lm = Self::bind(&counts, chars);
        tracing::info!(
            "Loaded order-{} base language model from '{}' ({} contexts)",
            lm.order,
            path.display(),
            lm.contexts.len()
        );
        Ok(lm)
    }
}

impl CharLanguageModel for NgramLm {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn next_log_probs(&self, context: &[CharId]) -> Vec<f32> {
        let v = self.vocab_size as f32;

        // add-one unigram
        let mut probs: Vec<f32> = match self.contexts.get(&[][..]) {
            Some(s) => s.counts.iter().map(|&c| (c + 1.0) / (s.total + v)).collect(),
            None => vec![1.0 / v; self.vocab_size],
        };

        for n in 1..self.order {
            if context.len() < n {
                break;
            }
            let Some(stats) = self.contexts.get(&context[context.len() - n..]) else {
                continue;
            };
            if stats.total <= 0.0 {
                continue;
            }
            let lambda = stats.total / (stats.total + stats.distinct);
            for (p, &c) in probs.iter_mut().zip(&stats.counts) {
                *p = lambda * c / stats.total + (1.0 - lambda) * *p;
            }
        }

        probs.into_iter().map(f32::ln).collect()
    }
}
