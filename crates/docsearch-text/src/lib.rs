//! docsearch-text
//!
//! Keyword side of docsearch on tantivy: language analyzers, the sub-index
//! schema and lifecycle, the criteria language, keyword search, passage
//! highlighting and dictionary spell correction.
pub mod analyzer;
pub mod highlight;
pub mod index;
pub mod passage;
pub mod query;
pub mod schema;
pub mod search;
pub mod spell;

pub use analyzer::{normalize_language, AnalyzerRegistry};
pub use index::{OpenMode, SubIndexWriter, TextIndexStore};
pub use search::{SubIndexReader, TextHit};
pub use spell::DictionarySpellCorrector;
