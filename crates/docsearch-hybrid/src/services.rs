use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Runtime;

use docsearch_core::config::EngineSettings;
use docsearch_core::error::Result;
use docsearch_core::traits::{Crawler, DocumentExtractor, Embedder};
use docsearch_core::types::{EmbeddingKind, SearchSettings};
use docsearch_embed::EmbedderRegistry;
use docsearch_text::query::QueryParser;
use docsearch_text::TextIndexStore;
use docsearch_vector::VectorStore;

/// Directory below a collection holding its vector table.
pub const VECTOR_DIR: &str = "_vectors";

/// Engine-wide collaborators shared by every collection.
pub(crate) struct Services {
	pub settings: EngineSettings,
	pub text: TextIndexStore,
	pub embedders: EmbedderRegistry,
	pub parser: QueryParser,
	pub runtime: Arc<Runtime>,
	pub extractor: Arc<dyn DocumentExtractor>,
	pub crawler: Arc<dyn Crawler>,
}

impl Services {
	pub fn embedder(&self, settings: &SearchSettings, language: &str) -> Result<Arc<dyn Embedder>> {
		self.embedders.get(settings.embedding.unwrap_or(EmbeddingKind::TfIdf), language)
	}

	pub fn vector_store(&self, collection_dir: &Path) -> Result<VectorStore> {
		VectorStore::open(&collection_dir.join(VECTOR_DIR), Arc::clone(&self.runtime))
	}

	/// `None` while nothing has been embedded for the collection.
	pub fn existing_vector_store(&self, collection_dir: &Path) -> Result<Option<VectorStore>> {
		if !collection_dir.join(VECTOR_DIR).is_dir() {
			return Ok(None);
		}
		self.vector_store(collection_dir).map(Some)
	}
}
