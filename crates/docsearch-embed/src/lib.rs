//! docsearch-embed
//!
//! Embedding strategies behind `docsearch_core::traits::Embedder`: TF-IDF
//! over a fixed vocabulary and averaged pre-trained word vectors, each with a
//! per-text cache, plus the registry that builds them on first use.
pub mod cache;
pub mod pool;
pub mod registry;
pub mod tfidf;
pub mod tokenize;
pub mod word2vec;

pub use registry::EmbedderRegistry;
pub use tfidf::{TfIdfEmbedder, Vocabulary};
pub use word2vec::Word2VecEmbedder;
