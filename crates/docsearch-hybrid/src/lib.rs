//! Named collections of sub-indexes with hybrid keyword and vector search.
//!
//! An `Engine` owns the collection registry and its persisted metadata. Each
//! collection stores one tantivy sub-index per indexed source plus a single
//! vector table, and a search fuses BM25 scores with embedding similarity
//! according to the collection's mode.
mod collection;
pub mod crawler;
pub mod custom;
mod engine;
mod executor;
pub mod filter;
pub mod metadata;
mod services;
pub mod url;

pub use collection::Collection;
pub use crawler::WebCrawler;
pub use custom::{ColumnMapping, CustomTable};
pub use engine::{Engine, EngineBuilder, NewCollection};
pub use metadata::JsonMetadataStore;
pub use services::VECTOR_DIR;
