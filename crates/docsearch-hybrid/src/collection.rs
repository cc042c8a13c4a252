//! One collection: its registry of sub-indexes and the operations on them.
//!
//! Mutating operations work on a copy of the metadata handed in by the
//! engine, which holds the collection lock, persists the copy and only then
//! publishes it. Reads use a snapshot and take no lock.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use docsearch_core::error::{Error, Result, ResultExt};
use docsearch_core::extract::{list_files, normalize_extensions};
use docsearch_core::traits::{CrawlRequest, Extracted};
use docsearch_core::types::{
	collection_dir_name, sub_index_id, CategoryInfo, CollectionMeta, CollectionRow, Document, IndexDescriptor,
	IndexOptions, IndexResult, SearchRequest, SearchResults, Source, SourceType, CUSTOM_INDEX_ID,
};
use docsearch_text::index::size_on_disk;
use docsearch_text::{normalize_language, OpenMode, SubIndexWriter};
use docsearch_vector::{VectorRecord, VectorStore};

use crate::custom::{table_documents, ColumnMapping, CustomTable};
use crate::executor;
use crate::services::Services;

pub struct Collection {
	meta: RwLock<CollectionMeta>,
	dir: PathBuf,
	services: Arc<Services>,
}

impl Collection {
	pub(crate) fn new(meta: CollectionMeta, services: Arc<Services>) -> Self {
		let dir = meta.path.join(collection_dir_name(&meta.name));
		Self { meta: RwLock::new(meta), dir, services }
	}

	pub fn name(&self) -> String {
		self.meta.read().name.clone()
	}

	/// Storage directory of the collection.
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Snapshot of the current metadata.
	pub fn meta(&self) -> CollectionMeta {
		self.meta.read().clone()
	}

	pub(crate) fn publish(&self, meta: CollectionMeta) {
		*self.meta.write() = meta;
	}

	fn index_dir(&self, id: &str) -> PathBuf {
		self.dir.join(id)
	}

	fn index_language<'a>(meta: &'a CollectionMeta, index: &'a IndexDescriptor) -> &'a str {
		if index.language.is_empty() { &meta.language } else { &index.language }
	}

	pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
		let meta = self.meta();
		executor::search(&self.services, &meta, &self.dir, request)
	}

	/// Documents per sub-index id, in registry order.
	fn counts(&self, meta: &CollectionMeta) -> Result<Vec<(String, usize)>> {
		meta.indexes
			.iter()
			.map(|index| {
				let n = self.services.text.count_documents(&self.index_dir(&index.id), Self::index_language(meta, index))?;
				Ok((index.id.clone(), usize::try_from(n).unwrap_or(usize::MAX)))
			})
			.collect()
	}

	pub fn doc_count(&self) -> Result<usize> {
		Ok(self.counts(&self.meta())?.into_iter().map(|(_, n)| n).sum())
	}

	pub fn list_indexes(&self) -> Vec<IndexDescriptor> {
		self.meta.read().indexes.clone()
	}

	pub fn row(&self) -> Result<CollectionRow> {
		let meta = self.meta();
		let doc_count = self.counts(&meta)?.into_iter().map(|(_, n)| n).sum();
		Ok(CollectionRow {
			name: meta.name,
			language: meta.language,
			path: meta.path,
			created: meta.created,
			last_modified: meta.last_update,
			size: size_on_disk(&self.dir),
			doc_count,
			mode: meta.mode,
			embedding: meta.embedding,
			ratio: meta.ratio,
		})
	}

	/// Documents per category tree and per category tag.
	pub fn category_info(&self) -> Result<CategoryInfo> {
		let meta = self.meta();
		let mut info = CategoryInfo::default();
		for (index, (_, count)) in meta.indexes.iter().zip(self.counts(&meta)?) {
			if !index.category_tree.is_empty() {
				*info.category_trees.entry(index.category_tree.clone()).or_default() += count;
			}
			for tag in &index.categories {
				*info.categories.entry(tag.clone()).or_default() += count;
			}
		}
		Ok(info)
	}

	fn check_language(meta: &CollectionMeta, options: &IndexOptions) -> Result<()> {
		let Some(requested) = options.language.as_deref().filter(|l| !l.trim().is_empty()) else { return Ok(()) };
		let requested = normalize_language(requested)?;
		if requested != meta.language {
			return Err(Error::config(format!(
				"collection [{}] is {}, index language [{requested}] does not match",
				meta.name, meta.language
			)));
		}
		Ok(())
	}

	/// Rebuilds the sub-index of a file, path or url source.
	pub(crate) fn index_source(&self, meta: &mut CollectionMeta, source: &Source, options: &IndexOptions) -> Result<IndexResult> {
		Self::check_language(meta, options)?;
		let id = source.id();
		let docs = match source {
			Source::File { path } => vec![self.file_document(path, &id)?],
			Source::Path { root, extensions, recurse } => self.path_documents(root, extensions, *recurse, &id)?,
			Source::Url { url, extensions, recurse, timeout } => {
				let request = CrawlRequest { url: url.clone(), extensions: extensions.clone(), recurse: *recurse, timeout: *timeout };
				self.url_documents(&request, &id)?
			}
			Source::Custom { .. } => return Err(Error::config("custom sources are indexed from a table")),
		};

		let dir = self.index_dir(&id);
		let before = self.services.text.count_documents(&dir, &meta.language)?;
		let vectors = self.prepare_vectors(meta, &id, &docs)?;
		self.write_staged(
			&dir,
			&meta.language,
			OpenMode::Create,
			|writer| docs.iter().try_for_each(|doc| writer.add(doc)),
			|| vectors.map_or(Ok(()), |(store, records)| store.replace_index(&id, &records)),
		)?;
		let after = self.services.text.count_documents(&dir, &meta.language)?;

		register(meta, IndexDescriptor::new(source, &meta.language, options));
		let result = IndexResult::from_counts(to_usize(before), to_usize(after));
		info!(collection = %meta.name, index = %id, source = source.source_type().as_str(), ?result, "sub-index rebuilt");
		Ok(result)
	}

	/// Overlays the table rows on the custom sub-index, replacing documents
	/// with the same key.
	pub(crate) fn index_custom(
		&self,
		meta: &mut CollectionMeta,
		query: &str,
		table: &CustomTable,
		mapping: &ColumnMapping,
		options: &IndexOptions,
	) -> Result<IndexResult> {
		Self::check_language(meta, options)?;
		let docs = table_documents(table, mapping)?;
		let dir = self.index_dir(CUSTOM_INDEX_ID);
		let before = to_usize(self.services.text.count_documents(&dir, &meta.language)?);

		let vectors = self.prepare_vectors(meta, CUSTOM_INDEX_ID, &docs)?;
		self.write_staged(
			&dir,
			&meta.language,
			OpenMode::Append,
			|writer| {
				docs.iter().try_for_each(|doc| {
					writer.delete_key(&doc.key);
					writer.add(doc)
				})
			},
			|| vectors.map_or(Ok(()), |(store, records)| store.upsert(&records)),
		)?;
		let after = to_usize(self.services.text.count_documents(&dir, &meta.language)?);

		register(meta, IndexDescriptor::new(&Source::Custom { query: query.to_string() }, &meta.language, options));
		let inserted = after.saturating_sub(before);
		let result = IndexResult { deleted: 0, inserted, unchanged: table.len().saturating_sub(inserted) };
		info!(collection = %meta.name, rows = table.len(), ?result, "custom rows indexed");
		Ok(result)
	}

	/// Removes the given keys from the custom sub-index.
	pub(crate) fn delete_custom(&self, meta: &CollectionMeta, keys: &[String]) -> Result<IndexResult> {
		let dir = self.index_dir(CUSTOM_INDEX_ID);
		let before = to_usize(self.services.text.count_documents(&dir, &meta.language)?);
		if before == 0 || keys.is_empty() {
			return Ok(IndexResult::default());
		}
		let store = self.services.existing_vector_store(&self.dir)?;
		self.write_staged(
			&dir,
			&meta.language,
			OpenMode::Append,
			|writer| {
				keys.iter().for_each(|key| writer.delete_key(key));
				Ok(())
			},
			|| store.map_or(Ok(()), |store| store.delete_keys(CUSTOM_INDEX_ID, keys).map(drop)),
		)?;
		let after = to_usize(self.services.text.count_documents(&dir, &meta.language)?);
		let deleted = before.saturating_sub(after);
		info!(collection = %meta.name, deleted, "custom documents deleted");
		Ok(IndexResult { deleted, inserted: 0, unchanged: 0 })
	}

	/// Drops one sub-index. A custom source with a key deletes that key only.
	pub(crate) fn delete_index(&self, meta: &mut CollectionMeta, source_type: SourceType, key: &str) -> Result<IndexResult> {
		if source_type == SourceType::Custom && !key.trim().is_empty() {
			return self.delete_custom(meta, &[key.trim().to_string()]);
		}
		let id = sub_index_id(source_type, key);
		let Some(pos) = meta.indexes.iter().position(|i| i.id == id) else {
			debug!(collection = %meta.name, index = %id, "no such sub-index");
			return Ok(IndexResult::default());
		};
		let deleted = self.drop_index(meta, pos)?;
		info!(collection = %meta.name, index = %id, deleted, "sub-index deleted");
		Ok(IndexResult { deleted, inserted: 0, unchanged: 0 })
	}

	fn drop_index(&self, meta: &mut CollectionMeta, pos: usize) -> Result<usize> {
		let index = meta.indexes.remove(pos);
		let dir = self.index_dir(&index.id);
		let count = self.services.text.count_documents(&dir, Self::index_language(meta, &index))?;
		self.services.text.delete_subindex(&dir)?;
		if let Some(store) = self.services.existing_vector_store(&self.dir)? {
			store.delete_index(&index.id)?;
		}
		Ok(to_usize(count))
	}

	/// Removes every document and sub-index but keeps the collection.
	pub(crate) fn purge(&self, meta: &mut CollectionMeta) -> Result<IndexResult> {
		let deleted = self.counts(meta)?.into_iter().map(|(_, n)| n).sum();
		for index in &meta.indexes {
			self.services.text.delete_subindex(&self.index_dir(&index.id))?;
		}
		meta.indexes.clear();
		if self.dir.exists() {
			remove_children(&self.dir)?;
		}
		info!(collection = %meta.name, deleted, "collection purged");
		Ok(IndexResult { deleted, inserted: 0, unchanged: 0 })
	}

	/// Removes the collection's storage; the engine forgets it afterwards.
	pub(crate) fn destroy(&self, meta: &CollectionMeta) -> Result<IndexResult> {
		let deleted = self.counts(meta)?.into_iter().map(|(_, n)| n).sum();
		for index in &meta.indexes {
			self.services.text.delete_subindex(&self.index_dir(&index.id))?;
		}
		if self.dir.exists() {
			std::fs::remove_dir_all(&self.dir).storage_context(|| format!("deleting {}", self.dir.display()))?;
		}
		info!(collection = %meta.name, deleted, "collection deleted");
		Ok(IndexResult { deleted, inserted: 0, unchanged: 0 })
	}

	/// Merges every sub-index down to one segment and compacts the vectors.
	pub(crate) fn optimize(&self, meta: &CollectionMeta) -> Result<()> {
		for index in &meta.indexes {
			self.services.text.optimize(&self.index_dir(&index.id), Self::index_language(meta, index))?;
		}
		if let Some(store) = self.services.existing_vector_store(&self.dir)? {
			store.optimize()?;
		}
		info!(collection = %meta.name, indexes = meta.indexes.len(), "collection optimized");
		Ok(())
	}

	/// Drops the descriptors whose storage is missing or unreadable and
	/// returns their ids.
	pub(crate) fn repair(&self, meta: &mut CollectionMeta) -> Result<Vec<String>> {
		let mut dropped = Vec::new();
		let mut pos = 0;
		while pos < meta.indexes.len() {
			let id = meta.indexes[pos].id.clone();
			if self.services.text.is_healthy(&self.index_dir(&id)) {
				pos += 1;
				continue;
			}
			warn!(collection = %meta.name, index = %id, "dropping sub-index without readable storage");
			self.drop_index(meta, pos)?;
			dropped.push(id);
		}
		Ok(dropped)
	}

	fn file_document(&self, path: &Path, index_id: &str) -> Result<Document> {
		if !path.is_file() {
			return Err(Error::resource(format!("value of the attribute key must specify an existing file, [{}] is invalid", path.display())));
		}
		let bytes = std::fs::read(path).map_err(|e| Error::resource_with(format!("reading [{}]", path.display()), e))?;
		let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
		let extracted = self.services.extractor.extract(&bytes, None, &name)?;
		Ok(to_document(extracted, path.to_string_lossy().into_owned(), name, index_id))
	}

	fn path_documents(&self, root: &Path, extensions: &[String], recurse: bool, index_id: &str) -> Result<Vec<Document>> {
		if !root.is_dir() {
			return Err(Error::resource(format!("value of the attribute key must specify an existing directory, [{}] is invalid", root.display())));
		}
		let mut docs = Vec::new();
		for file in list_files(root, &normalize_extensions(extensions), recurse) {
			let bytes = match std::fs::read(&file) {
				Ok(bytes) => bytes,
				Err(e) => {
					warn!(file = %file.display(), error = %e, "skipping unreadable file");
					continue;
				}
			};
			let name = file.to_string_lossy().into_owned();
			let relative = file.strip_prefix(root).unwrap_or(&file).to_string_lossy().replace('\\', "/");
			match self.services.extractor.extract(&bytes, None, &name) {
				Ok(extracted) => docs.push(to_document(extracted, name, format!("/{relative}"), index_id)),
				Err(e) => warn!(file = %file.display(), error = %e, "skipping file that could not be extracted"),
			}
		}
		debug!(root = %root.display(), files = docs.len(), "directory walked");
		Ok(docs)
	}

	fn url_documents(&self, request: &CrawlRequest, index_id: &str) -> Result<Vec<Document>> {
		let pages = self.services.crawler.crawl(request)?;
		let mut docs = Vec::with_capacity(pages.len());
		for page in pages {
			match self.services.extractor.extract(&page.body, page.content_type.as_deref(), &page.url) {
				Ok(extracted) => docs.push(to_document(extracted, page.url.clone(), page.url, index_id)),
				Err(e) => warn!(url = %page.url, error = %e, "skipping page that could not be extracted"),
			}
		}
		Ok(docs)
	}

	/// Writes a sub-index through a staged copy of `dir`. The copy replaces
	/// `dir` only after `vectors` succeeded; on any error `dir` is untouched.
	fn write_staged(
		&self,
		dir: &Path,
		language: &str,
		mode: OpenMode,
		fill: impl FnOnce(&mut SubIndexWriter) -> Result<()>,
		vectors: impl FnOnce() -> Result<()>,
	) -> Result<()> {
		match self.write_staging(dir, language, mode, fill, vectors) {
			Ok(()) => self.services.text.publish(dir),
			Err(e) => {
				if let Err(cleanup) = self.services.text.discard(dir) {
					warn!(dir = %dir.display(), error = %cleanup, "could not remove staged sub-index");
				}
				Err(e)
			}
		}
	}

	fn write_staging(
		&self,
		dir: &Path,
		language: &str,
		mode: OpenMode,
		fill: impl FnOnce(&mut SubIndexWriter) -> Result<()>,
		vectors: impl FnOnce() -> Result<()>,
	) -> Result<()> {
		let mut writer = self.services.text.stage(dir, language, mode)?;
		fill(&mut writer)?;
		writer.commit()?;
		vectors()
	}

	/// Embeddings plus the opened vector table, ready before any text is written.
	fn prepare_vectors(&self, meta: &CollectionMeta, index_id: &str, docs: &[Document]) -> Result<Option<(VectorStore, Vec<VectorRecord>)>> {
		let Some(records) = self.embed(meta, index_id, docs) else { return Ok(None) };
		Ok(Some((self.services.vector_store(&self.dir)?, records)))
	}

	/// `None` for keyword collections and when the embedder cannot be built.
	fn embed(&self, meta: &CollectionMeta, index_id: &str, docs: &[Document]) -> Option<Vec<VectorRecord>> {
		let settings = meta.settings();
		if !settings.mode.uses_vectors() {
			return None;
		}
		let embedder = match self.services.embedder(&settings, &meta.language) {
			Ok(embedder) => embedder,
			Err(e) => {
				warn!(collection = %meta.name, error = %e, "embedder unavailable, indexing without vectors");
				return None;
			}
		};
		let texts: Vec<String> = docs.iter().map(|d| d.contents.clone()).collect();
		let records = docs
			.iter()
			.zip(embedder.generate_batch(&texts))
			.map(|(doc, vector)| VectorRecord { key: doc.key.clone(), index_id: index_id.to_string(), vector })
			.collect();
		Some(records)
	}
}

fn register(meta: &mut CollectionMeta, index: IndexDescriptor) {
	match meta.indexes.iter_mut().find(|i| i.id == index.id) {
		Some(existing) => {
			let extra = std::mem::take(&mut existing.extra);
			*existing = IndexDescriptor { extra, ..index };
		}
		None => meta.indexes.push(index),
	}
}

fn to_document(extracted: Extracted, key: String, url: String, index_id: &str) -> Document {
	Document {
		key,
		url,
		size: extracted.contents.chars().count() as u64,
		title: extracted.title,
		summary: extracted.summary,
		contents: extracted.contents,
		keywords: extracted.keywords,
		author: extracted.author,
		mime_type: extracted.mime_type,
		custom: extracted.custom,
		index_id: index_id.to_string(),
	}
}

fn to_usize(n: u64) -> usize {
	usize::try_from(n).unwrap_or(usize::MAX)
}

fn remove_children(dir: &Path) -> Result<()> {
	for entry in std::fs::read_dir(dir).storage_context(|| format!("listing {}", dir.display()))? {
		let path = entry.storage_context(|| format!("listing {}", dir.display()))?.path();
		let removed = if path.is_dir() { std::fs::remove_dir_all(&path) } else { std::fs::remove_file(&path) };
		removed.storage_context(|| format!("removing {}", path.display()))?;
	}
	debug!(dir = %dir.display(), "collection storage cleared");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn register_replaces_by_id_and_keeps_unknown_fields() {
		let source = Source::File { path: "/data/a.txt".into() };
		let mut first = IndexDescriptor::new(&source, "english", &IndexOptions { title: "A".into(), ..IndexOptions::default() });
		first.extra.insert("legacy".into(), serde_json::json!(1));
		let mut meta = CollectionMeta {
			name: "kb".into(),
			path: "/tmp".into(),
			language: "english".into(),
			mode: docsearch_core::types::SearchMode::Keyword,
			embedding: None,
			ratio: 0.5,
			created: chrono::Utc::now(),
			last_update: chrono::Utc::now(),
			indexes: vec![first],
			extra: serde_json::Map::new(),
		};
		register(&mut meta, IndexDescriptor::new(&source, "english", &IndexOptions { title: "B".into(), ..IndexOptions::default() }));
		assert_eq!(meta.indexes.len(), 1);
		assert_eq!(meta.indexes[0].title, "B");
		assert_eq!(meta.indexes[0].extra.get("legacy"), Some(&serde_json::json!(1)));
	}

	#[test]
	fn documents_carry_extracted_fields() {
		let extracted = Extracted { contents: "héllo".into(), title: "T".into(), mime_type: "text/plain".into(), ..Extracted::default() };
		let doc = to_document(extracted, "/a.txt".into(), "a.txt".into(), "file-1");
		assert_eq!(doc.size, 5);
		assert_eq!(doc.title, "T");
		assert_eq!(doc.index_id, "file-1");
	}
}
