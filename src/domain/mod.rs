// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing what the system works
// with: vocabularies, examples, and the contracts of the base
// language model and of decodable models.
//
// Rules for this layer:
//   - NO burn types
//   - NO file I/O
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// Closed token <-> id tables and the sequence markers
pub mod vocab;

/// Parsed (input, target, tag) triples
pub mod example;

/// CharLanguageModel, StepScorer, Persistable
pub mod traits;
