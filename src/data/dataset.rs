use rand::{seq::SliceRandom, Rng};

use crate::domain::example::Example;

/// The parsed examples of one data file.
///
/// Training sets are reshuffled in place at the start of every epoch;
/// evaluation sets are never shuffled, so their order is the file order.
#[derive(Debug, Clone, Default)]
pub struct ExampleSet {
    examples: Vec<Example>,
}

impl ExampleSet {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Fisher-Yates shuffle with the caller's RNG.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.examples.shuffle(rng);
    }

    /// Number of examples per tag id, indexed by tag.
    pub fn tag_counts(&self, tag_count: usize) -> Vec<usize> {
        let mut counts = vec![0usize; tag_count];
        for ex in &self.examples {
            if let Some(c) = counts.get_mut(ex.tag()) {
                *c += 1;
            }
        }
        counts
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn set() -> ExampleSet {
        ExampleSet::new(
            (0..20)
                .map(|i| Example::new(vec![i], vec![i + 1], i % 3))
                .collect(),
        )
    }

    #[test]
    fn test_shuffle_preserves_contents() {
        let mut s = set();
        let mut rng = StdRng::seed_from_u64(7);
        s.shuffle(&mut rng);

        let mut inputs: Vec<usize> = s.examples().iter().map(|e| e.input()[0]).collect();
        inputs.sort();
        assert_eq!(inputs, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_is_reproducible_for_a_seed() {
        let mut a = set();
        let mut b = set();
        a.shuffle(&mut StdRng::seed_from_u64(3));
        b.shuffle(&mut StdRng::seed_from_u64(3));
        assert_eq!(a.examples(), b.examples());
    }

    #[test]
    fn test_tag_counts() {
        let s = set();
        assert_eq!(s.tag_counts(4), vec![7, 7, 6, 0]);
    }
}
