// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From flat files to Examples:
//
//   vocabulary files
//       │
//       ▼
//   loader::read_vocab   → closed Vocabulary tables
//
//   data files
//       │
//       ▼
//   loader::read_lines   → numbered non-blank lines
//       │
//       ▼
//   parser               → (input ids, target ids, tag id)
//       │
//       ▼
//   ExampleSet           → shuffled per epoch (train) / fixed (eval)
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Reads vocabulary and data files
pub mod loader;

/// Parses data lines against closed vocabularies
pub mod parser;

/// Owned example collections
pub mod dataset;
