//! The search engine: a registry of named collections.
//!
//! Every mutation of a collection runs under a named lock keyed on the
//! collection's storage directory, for the whole operation including the
//! metadata save. Searches take no collection lock.
//!
//! The engine drives async vector and crawler calls on its own tokio runtime
//! and blocks on them, so it must be used from plain threads, not from inside
//! an async task.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use docsearch_core::config::{expand_path, EngineSettings};
use docsearch_core::error::{Error, Result, ResultExt};
use docsearch_core::extract::BasicExtractor;
use docsearch_core::lock::NamedLocks;
use docsearch_core::traits::{Crawler, DocumentExtractor, MetadataStore};
use docsearch_core::types::{
	CategoryInfo, CollectionMeta, CollectionRow, EngineMeta, IndexDescriptor, IndexOptions, IndexResult, SearchRequest,
	SearchResults, SearchSettings, Source, SourceType,
};
use docsearch_embed::EmbedderRegistry;
use docsearch_text::query::QueryParser;
use docsearch_text::{normalize_language, AnalyzerRegistry, TextIndexStore};

use crate::collection::Collection;
use crate::crawler::WebCrawler;
use crate::custom::{ColumnMapping, CustomTable};
use crate::metadata::JsonMetadataStore;
use crate::services::Services;

/// Parameters of `Engine::create_collection`.
#[derive(Debug, Clone)]
pub struct NewCollection {
	pub name: String,
	pub path: std::path::PathBuf,
	pub language: String,
	pub mode: String,
	pub embedding: String,
	pub ratio: f32,
}

impl NewCollection {
	/// Keyword collection in english.
	pub fn new(name: impl Into<String>, path: impl Into<std::path::PathBuf>) -> Self {
		Self {
			name: name.into(),
			path: path.into(),
			language: String::new(),
			mode: String::new(),
			embedding: String::new(),
			ratio: 0.5,
		}
	}

	#[must_use]
	pub fn language(mut self, language: impl Into<String>) -> Self {
		self.language = language.into();
		self
	}

	#[must_use]
	pub fn mode(mut self, mode: impl Into<String>, embedding: impl Into<String>, ratio: f32) -> Self {
		self.mode = mode.into();
		self.embedding = embedding.into();
		self.ratio = ratio;
		self
	}
}

/// Collaborators an engine is built from; anything left unset gets the
/// default implementation.
pub struct EngineBuilder {
	settings: EngineSettings,
	runtime: Option<Arc<Runtime>>,
	store: Option<Arc<dyn MetadataStore>>,
	extractor: Option<Arc<dyn DocumentExtractor>>,
	crawler: Option<Arc<dyn Crawler>>,
}

impl EngineBuilder {
	#[must_use]
	pub fn runtime(mut self, runtime: Arc<Runtime>) -> Self {
		self.runtime = Some(runtime);
		self
	}

	#[must_use]
	pub fn metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
		self.store = Some(store);
		self
	}

	#[must_use]
	pub fn extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
		self.extractor = Some(extractor);
		self
	}

	#[must_use]
	pub fn crawler(mut self, crawler: Arc<dyn Crawler>) -> Self {
		self.crawler = Some(crawler);
		self
	}

	pub fn build(self) -> Result<Engine> {
		let settings = self.settings;
		let runtime = match self.runtime {
			Some(runtime) => runtime,
			None => docsearch_vector::build_runtime()?,
		};
		let crawler: Arc<dyn Crawler> = match self.crawler {
			Some(crawler) => crawler,
			None => Arc::new(WebCrawler::new(Arc::clone(&runtime))?),
		};
		let store: Arc<dyn MetadataStore> = match self.store {
			Some(store) => store,
			None => Arc::new(JsonMetadataStore::new(&expand_path(settings.storage_root.to_string_lossy()))),
		};
		let extractor = self.extractor.unwrap_or_else(|| Arc::new(BasicExtractor::new()));

		let services = Arc::new(Services {
			text: TextIndexStore::new(
				Arc::new(AnalyzerRegistry::new()),
				NamedLocks::new(settings.lock_timeout()),
				settings.writer_heap_bytes,
			),
			embedders: EmbedderRegistry::from_settings(&settings),
			parser: QueryParser::new(),
			runtime,
			extractor,
			crawler,
			settings,
		});

		let loaded = store.load()?.unwrap_or_default();
		let mut collections = BTreeMap::new();
		for meta in loaded.collections {
			let key = meta.name.to_lowercase();
			if collections.contains_key(&key) {
				warn!(collection = %meta.name, "duplicate collection in metadata, keeping the last one");
			}
			collections.insert(key, Arc::new(Collection::new(meta, Arc::clone(&services))));
		}
		info!(collections = collections.len(), "engine opened");

		Ok(Engine {
			collection_locks: NamedLocks::new(services.settings.lock_timeout()),
			services,
			store,
			collections: RwLock::new(collections),
			extra: loaded.extra,
			saving: Mutex::new(()),
		})
	}
}

pub struct Engine {
	services: Arc<Services>,
	store: Arc<dyn MetadataStore>,
	collection_locks: Arc<NamedLocks>,
	/// Keyed by lowercased name.
	collections: RwLock<BTreeMap<String, Arc<Collection>>>,
	/// Engine level fields of the metadata this version does not know.
	extra: serde_json::Map<String, serde_json::Value>,
	saving: Mutex<()>,
}

impl Engine {
	pub fn builder(settings: EngineSettings) -> EngineBuilder {
		EngineBuilder { settings, runtime: None, store: None, extractor: None, crawler: None }
	}

	/// Engine with the default collaborators.
	pub fn open(settings: EngineSettings) -> Result<Self> {
		Self::builder(settings).build()
	}

	pub fn settings(&self) -> &EngineSettings {
		&self.services.settings
	}

	pub fn collection(&self, name: &str) -> Result<Arc<Collection>> {
		self.collections
			.read()
			.get(&name.trim().to_lowercase())
			.cloned()
			.ok_or_else(|| Error::NotFound(format!("collection [{name}] does not exist")))
	}

	pub fn create_collection(&self, new: &NewCollection) -> Result<Arc<Collection>> {
		let name = new.name.trim();
		if name.is_empty() {
			return Err(Error::config("collection name must not be empty"));
		}
		let language = normalize_language(&new.language)?;
		let settings = SearchSettings::parse(&new.mode, &new.embedding, new.ratio)?;
		let key = name.to_lowercase();
		if self.collections.read().contains_key(&key) {
			return Err(Error::AlreadyExists(format!("collection [{name}]")));
		}

		let now = Utc::now();
		let meta = CollectionMeta {
			name: name.to_string(),
			path: expand_path(new.path.to_string_lossy()),
			language,
			mode: settings.mode,
			embedding: settings.embedding,
			ratio: settings.ratio,
			created: now,
			last_update: now,
			indexes: Vec::new(),
			extra: serde_json::Map::new(),
		};
		let collection = Arc::new(Collection::new(meta, Arc::clone(&self.services)));
		let _guard = self.collection_locks.acquire(collection.dir())?;
		{
			let mut collections = self.collections.write();
			if collections.contains_key(&key) {
				return Err(Error::AlreadyExists(format!("collection [{name}]")));
			}
			std::fs::create_dir_all(collection.dir()).storage_context(|| format!("creating {}", collection.dir().display()))?;
			collections.insert(key.clone(), Arc::clone(&collection));
		}
		if let Err(e) = self.save(None) {
			self.collections.write().remove(&key);
			return Err(e);
		}
		info!(collection = name, dir = %collection.dir().display(), mode = %settings.mode, "collection created");
		Ok(collection)
	}

	/// Runs `op` on a working copy of the collection's metadata under the
	/// collection lock; the copy is saved and published only when `op` succeeds.
	fn mutate<T>(&self, name: &str, op: impl FnOnce(&Collection, &mut CollectionMeta) -> Result<T>) -> Result<T> {
		let collection = self.collection(name)?;
		let _guard = self.collection_locks.acquire(collection.dir())?;
		let mut meta = collection.meta();
		let out = op(&collection, &mut meta)?;
		meta.last_update = Utc::now();
		self.save(Some(&meta))?;
		collection.publish(meta);
		Ok(out)
	}

	fn save(&self, changed: Option<&CollectionMeta>) -> Result<()> {
		let _saving = self.saving.lock();
		let collections: Vec<CollectionMeta> = self
			.collections
			.read()
			.values()
			.map(|c| match changed {
				Some(meta) if meta.name.eq_ignore_ascii_case(&c.name()) => meta.clone(),
				_ => c.meta(),
			})
			.collect();
		self.store.save(&EngineMeta { collections, extra: self.extra.clone() })
	}

	pub fn index(&self, name: &str, source: &Source, options: &IndexOptions) -> Result<IndexResult> {
		self.mutate(name, |collection, meta| collection.index_source(meta, source, options))
	}

	pub fn index_file(&self, name: &str, path: &Path, options: &IndexOptions) -> Result<IndexResult> {
		self.index(name, &Source::File { path: path.to_path_buf() }, options)
	}

	pub fn index_path(
		&self,
		name: &str,
		root: &Path,
		extensions: &[String],
		recurse: bool,
		options: &IndexOptions,
	) -> Result<IndexResult> {
		let source = Source::Path { root: root.to_path_buf(), extensions: extensions.to_vec(), recurse };
		self.index(name, &source, options)
	}

	/// `timeout` defaults to the configured crawl timeout.
	pub fn index_url(
		&self,
		name: &str,
		url: &str,
		extensions: &[String],
		recurse: bool,
		timeout: Option<Duration>,
		options: &IndexOptions,
	) -> Result<IndexResult> {
		let source = Source::Url {
			url: url.to_string(),
			extensions: extensions.to_vec(),
			recurse,
			timeout: timeout.unwrap_or_else(|| self.services.settings.crawl_timeout()),
		};
		self.index(name, &source, options)
	}

	pub fn index_custom(
		&self,
		name: &str,
		query: &str,
		table: &CustomTable,
		mapping: &ColumnMapping,
		options: &IndexOptions,
	) -> Result<IndexResult> {
		self.mutate(name, |collection, meta| collection.index_custom(meta, query, table, mapping, options))
	}

	/// Drops the sub-index of `(source_type, key)`. For custom sources a
	/// non-empty key removes that one document instead.
	pub fn delete_index(&self, name: &str, source_type: SourceType, key: &str) -> Result<IndexResult> {
		self.mutate(name, |collection, meta| collection.delete_index(meta, source_type, key))
	}

	pub fn delete_custom(&self, name: &str, keys: &[String]) -> Result<IndexResult> {
		self.mutate(name, |collection, meta| collection.delete_custom(meta, keys))
	}

	pub fn search(&self, name: &str, request: &SearchRequest) -> Result<SearchResults> {
		self.collection(name)?.search(request)
	}

	pub fn purge(&self, name: &str) -> Result<IndexResult> {
		self.mutate(name, Collection::purge)
	}

	pub fn optimize(&self, name: &str) -> Result<()> {
		self.mutate(name, |collection, meta| collection.optimize(meta))
	}

	/// Ids of the sub-indexes that were dropped.
	pub fn repair(&self, name: &str) -> Result<Vec<String>> {
		self.mutate(name, Collection::repair)
	}

	/// Removes the collection's storage and forgets it.
	pub fn delete(&self, name: &str) -> Result<IndexResult> {
		let collection = self.collection(name)?;
		let _guard = self.collection_locks.acquire(collection.dir())?;
		let meta = collection.meta();
		let key = meta.name.to_lowercase();
		// forget the collection on disk before its storage goes
		let removed = self.collections.write().remove(&key);
		if let Err(e) = self.save(None) {
			if let Some(removed) = removed {
				self.collections.write().insert(key, removed);
			}
			return Err(e);
		}
		collection.destroy(&meta)
	}

	pub fn list_collections(&self) -> Result<Vec<CollectionRow>> {
		let collections: Vec<Arc<Collection>> = self.collections.read().values().cloned().collect();
		collections.iter().map(|c| c.row()).collect()
	}

	pub fn list_indexes(&self, name: &str) -> Result<Vec<IndexDescriptor>> {
		Ok(self.collection(name)?.list_indexes())
	}

	pub fn category_info(&self, name: &str) -> Result<CategoryInfo> {
		self.collection(name)?.category_info()
	}
}
