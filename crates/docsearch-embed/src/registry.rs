use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use docsearch_core::config::{expand_path, EngineSettings, TfIdfSettings, Word2VecSettings};
use docsearch_core::error::Result;
use docsearch_core::traits::Embedder;
use docsearch_core::types::EmbeddingKind;

use crate::tfidf::TfIdfEmbedder;
use crate::word2vec::Word2VecEmbedder;

/// Lazily built embedders, one per (strategy, language).
///
/// Construction can be expensive (word vector files run to gigabytes), so
/// concurrent first use builds once and everybody shares the result.
pub struct EmbedderRegistry {
    tfidf: TfIdfSettings,
    word2vec: Word2VecSettings,
    embedders: RwLock<HashMap<(EmbeddingKind, String), Arc<dyn Embedder>>>,
}

impl EmbedderRegistry {
    pub fn new(tfidf: TfIdfSettings, word2vec: Word2VecSettings) -> Self {
        Self { tfidf, word2vec, embedders: RwLock::new(HashMap::new()) }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.tfidf.clone(), settings.word2vec.clone())
    }

    pub fn get(&self, kind: EmbeddingKind, language: &str) -> Result<Arc<dyn Embedder>> {
        let key = (kind, language.to_string());
        if let Some(found) = self.embedders.read().get(&key) {
            return Ok(Arc::clone(found));
        }
        let mut embedders = self.embedders.write();
        if let Some(found) = embedders.get(&key) {
            return Ok(Arc::clone(found));
        }
        info!(strategy = kind.as_str(), language, "building embedder");
        let embedder: Arc<dyn Embedder> = match kind {
            EmbeddingKind::TfIdf => {
                let path = self.tfidf.path.as_ref().map(|p| expand_path(p.to_string_lossy()));
                Arc::new(TfIdfEmbedder::from_path(path.as_deref(), self.tfidf.dimension))
            }
            EmbeddingKind::Word2Vec => {
                let mut settings = self.word2vec.clone();
                settings.vectors_file = settings.vectors_file.map(|p| expand_path(p.to_string_lossy()));
                settings.dir = settings.dir.map(|p| expand_path(p.to_string_lossy()));
                Arc::new(Word2VecEmbedder::from_settings(&settings)?)
            }
        };
        embedders.insert(key, Arc::clone(&embedder));
        Ok(embedder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedders_are_built_once_per_key() {
        let registry = EmbedderRegistry::new(TfIdfSettings::default(), Word2VecSettings::default());
        let a = registry.get(EmbeddingKind::TfIdf, "english").unwrap();
        let b = registry.get(EmbeddingKind::TfIdf, "english").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = registry.get(EmbeddingKind::TfIdf, "german").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.dimension(), 500);
    }

    #[test]
    fn unavailable_word_vectors_are_reported_and_not_cached() {
        let registry = EmbedderRegistry::new(TfIdfSettings::default(), Word2VecSettings::default());
        assert!(registry.get(EmbeddingKind::Word2Vec, "english").is_err());
        assert!(registry.embedders.read().is_empty());
    }
}
