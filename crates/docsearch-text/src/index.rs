//! Sub-index lifecycle on tantivy.
//!
//! Every writer holds the sub-index's token from a shared `NamedLocks` for its
//! whole open → write → merge → close run, so two writers never meet on the
//! same directory. Readers take no token. A directory that tantivy cannot open
//! is removed when nobody is writing to it and then reads as an empty index.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tantivy::{Index, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use docsearch_core::error::{Error, Result, ResultExt};
use docsearch_core::lock::{NamedLockGuard, NamedLocks};
use docsearch_core::types::Document;

use crate::analyzer::AnalyzerRegistry;
use crate::schema::{build_schema, DocFields};
use crate::search::SubIndexReader;

const META_FILE: &str = "meta.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
	/// Discard whatever is stored and start empty.
	Create,
	/// Keep existing documents; creates the index when there is none.
	Append,
}

pub struct TextIndexStore {
	analyzers: Arc<AnalyzerRegistry>,
	writers: Arc<NamedLocks>,
	heap_bytes: usize,
}

impl TextIndexStore {
	pub fn new(analyzers: Arc<AnalyzerRegistry>, writers: Arc<NamedLocks>, heap_bytes: usize) -> Self {
		Self { analyzers, writers, heap_bytes }
	}

	pub fn analyzers(&self) -> &Arc<AnalyzerRegistry> { &self.analyzers }

	/// Opens a writer on `dir`, waiting for any other writer on it to finish.
	pub fn open_writer(&self, dir: &Path, language: &str, mode: OpenMode) -> Result<SubIndexWriter> {
		let guard = self.writers.acquire(dir)?;
		let index = match mode {
			OpenMode::Create => self.create(dir, language)?,
			OpenMode::Append if has_index(dir) => match Index::open_in_dir(dir) {
				Ok(index) => index,
				Err(e) => {
					warn!(dir = %dir.display(), error = %e, "replacing unreadable sub-index");
					self.create(dir, language)?
				}
			},
			OpenMode::Append => self.create(dir, language)?,
		};
		self.analyzers.register(&index, language)?;
		let fields = DocFields::from_schema(&index.schema())?;
		let writer: IndexWriter<TantivyDocument> =
			index.writer(self.heap_bytes).storage_context(|| format!("opening writer on {}", dir.display()))?;
		debug!(dir = %dir.display(), ?mode, "writer opened");
		Ok(SubIndexWriter { index, writer, fields, _guard: guard })
	}

	fn create(&self, dir: &Path, language: &str) -> Result<Index> {
		if dir.exists() {
			std::fs::remove_dir_all(dir).storage_context(|| format!("clearing {}", dir.display()))?;
		}
		std::fs::create_dir_all(dir).storage_context(|| format!("creating {}", dir.display()))?;
		Index::create_in_dir(dir, build_schema(language)).storage_context(|| format!("creating index in {}", dir.display()))
	}

	/// `None` when there is no readable index at `dir`.
	pub fn open_reader(&self, dir: &Path, language: &str) -> Result<Option<SubIndexReader>> {
		if !has_index(dir) {
			if dir.exists() && is_empty_dir(dir) { self.heal(dir, "empty sub-index directory"); }
			return Ok(None);
		}
		let index = match Index::open_in_dir(dir) {
			Ok(index) => index,
			Err(e) => {
				self.heal(dir, &e.to_string());
				return Ok(None);
			}
		};
		self.analyzers.register(&index, language)?;
		let reader = index
			.reader_builder()
			.reload_policy(ReloadPolicy::Manual)
			.try_into()
			.storage_context(|| format!("opening reader on {}", dir.display()))?;
		Ok(Some(SubIndexReader::new(index, &reader, language)?))
	}

	fn heal(&self, dir: &Path, reason: &str) {
		let Some(_guard) = self.writers.try_acquire(dir) else {
			debug!(dir = %dir.display(), "sub-index busy, not healing");
			return;
		};
		warn!(dir = %dir.display(), reason, "removing corrupt sub-index");
		if let Err(e) = std::fs::remove_dir_all(dir) {
			warn!(dir = %dir.display(), error = %e, "could not remove corrupt sub-index");
		}
	}

	/// True when `dir` holds an index tantivy can open.
	pub fn is_healthy(&self, dir: &Path) -> bool {
		has_index(dir) && Index::open_in_dir(dir).is_ok()
	}

	pub fn count_documents(&self, dir: &Path, language: &str) -> Result<u64> {
		Ok(self.open_reader(dir, language)?.map_or(0, |r| r.num_docs()))
	}

	pub fn delete_subindex(&self, dir: &Path) -> Result<()> {
		let _guard = self.writers.acquire(dir)?;
		if dir.exists() {
			std::fs::remove_dir_all(dir).storage_context(|| format!("deleting {}", dir.display()))?;
			info!(dir = %dir.display(), "sub-index deleted");
		}
		Ok(())
	}

	/// Opens a writer on a scratch sub-index next to `dir`. With `Append` the
	/// scratch copy starts from the current contents of `dir`. Nothing at `dir`
	/// changes until `publish`; `discard` drops the scratch copy.
	pub fn stage(&self, dir: &Path, language: &str, mode: OpenMode) -> Result<SubIndexWriter> {
		let staging = staging_dir(dir);
		self.delete_subindex(&staging)?;
		if mode == OpenMode::Append && has_index(dir) {
			let _guard = self.writers.acquire(dir)?;
			copy_files(dir, &staging)?;
		}
		self.open_writer(&staging, language, mode)
	}

	/// Swaps the staged sub-index in for `dir`.
	pub fn publish(&self, dir: &Path) -> Result<()> {
		let staging = staging_dir(dir);
		let _guard = self.writers.acquire(dir)?;
		if dir.exists() {
			std::fs::remove_dir_all(dir).storage_context(|| format!("replacing {}", dir.display()))?;
		}
		std::fs::rename(&staging, dir).storage_context(|| format!("publishing {}", staging.display()))?;
		debug!(dir = %dir.display(), "staged sub-index published");
		Ok(())
	}

	pub fn discard(&self, dir: &Path) -> Result<()> {
		self.delete_subindex(&staging_dir(dir))
	}

	/// Merge the sub-index at `dir` down to one segment.
	pub fn optimize(&self, dir: &Path, language: &str) -> Result<()> {
		if !has_index(dir) { return Ok(()); }
		self.open_writer(dir, language, OpenMode::Append)?.commit()
	}
}

fn has_index(dir: &Path) -> bool { dir.join(META_FILE).is_file() }

/// Scratch location used by `TextIndexStore::stage` for `dir`.
pub fn staging_dir(dir: &Path) -> PathBuf {
	let mut name = dir.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
	name.push(".staging");
	dir.with_file_name(name)
}

// tantivy keeps an index as flat files in one directory
fn copy_files(from: &Path, to: &Path) -> Result<()> {
	std::fs::create_dir_all(to).storage_context(|| format!("creating {}", to.display()))?;
	for entry in std::fs::read_dir(from).storage_context(|| format!("listing {}", from.display()))? {
		let entry = entry.storage_context(|| format!("listing {}", from.display()))?;
		if entry.file_type().is_ok_and(|t| t.is_file()) {
			let target = to.join(entry.file_name());
			std::fs::copy(entry.path(), &target).storage_context(|| format!("copying to {}", target.display()))?;
		}
	}
	Ok(())
}

fn is_empty_dir(dir: &Path) -> bool {
	std::fs::read_dir(dir).map(|mut entries| entries.next().is_none()).unwrap_or(false)
}

/// Bytes used below `dir`.
pub fn size_on_disk(dir: &Path) -> u64 {
	walkdir::WalkDir::new(dir)
		.into_iter()
		.filter_map(std::result::Result::ok)
		.filter(|e| e.file_type().is_file())
		.filter_map(|e| e.metadata().ok())
		.map(|m| m.len())
		.sum()
}

/// Open writer plus the token that keeps other writers away.
pub struct SubIndexWriter {
	index: Index,
	writer: IndexWriter<TantivyDocument>,
	fields: DocFields,
	_guard: NamedLockGuard,
}

impl SubIndexWriter {
	pub fn add(&mut self, doc: &Document) -> Result<()> {
		self.writer.add_document(self.fields.to_tantivy(doc)).storage_context(|| "adding document")?;
		Ok(())
	}

	pub fn delete_key(&mut self, key: &str) {
		self.writer.delete_term(Term::from_field_text(self.fields.key, key));
	}

	pub fn delete_all(&mut self) -> Result<()> {
		self.writer.delete_all_documents().storage_context(|| "deleting all documents")?;
		Ok(())
	}

	/// Commit, merge to a single segment and close.
	pub fn commit(mut self) -> Result<()> {
		self.writer.commit().storage_context(|| "committing sub-index")?;
		let segments = self.index.searchable_segment_ids().storage_context(|| "listing segments")?;
		if segments.len() > 1 {
			self.writer
				.merge(&segments)
				.wait()
				.map_err(|e| Error::storage("merging segments", e))?;
		}
		self.writer.wait_merging_threads().storage_context(|| "closing writer")?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	fn store() -> TextIndexStore {
		TextIndexStore::new(Arc::new(AnalyzerRegistry::new()), NamedLocks::new(Duration::from_secs(5)), 15_000_000)
	}

	fn doc(key: &str, contents: &str) -> Document {
		Document { key: key.into(), contents: contents.into(), index_id: "custom".into(), ..Document::default() }
	}

	#[test]
	fn append_keeps_and_create_discards() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = tmp.path().join("sub");
		let store = store();

		let mut w = store.open_writer(&dir, "english", OpenMode::Create).unwrap();
		w.add(&doc("a", "alpha")).unwrap();
		w.commit().unwrap();
		let mut w = store.open_writer(&dir, "english", OpenMode::Append).unwrap();
		w.add(&doc("b", "beta")).unwrap();
		w.commit().unwrap();
		assert_eq!(store.count_documents(&dir, "english").unwrap(), 2);

		let mut w = store.open_writer(&dir, "english", OpenMode::Create).unwrap();
		w.add(&doc("c", "gamma")).unwrap();
		w.commit().unwrap();
		assert_eq!(store.count_documents(&dir, "english").unwrap(), 1);
	}

	#[test]
	fn delete_by_key() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = tmp.path().join("sub");
		let store = store();
		let mut w = store.open_writer(&dir, "english", OpenMode::Create).unwrap();
		w.add(&doc("k1", "same body")).unwrap();
		w.add(&doc("k2", "same body")).unwrap();
		w.commit().unwrap();
		let mut w = store.open_writer(&dir, "english", OpenMode::Append).unwrap();
		w.delete_key("k1");
		w.commit().unwrap();
		let reader = store.open_reader(&dir, "english").unwrap().unwrap();
		let keys: Vec<String> = reader.all_documents().unwrap().into_iter().map(|d| d.key).collect();
		assert_eq!(keys, vec!["k2"]);
	}

	#[test]
	fn staged_writes_stay_invisible_until_published() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = tmp.path().join("sub");
		let store = store();
		let mut w = store.open_writer(&dir, "english", OpenMode::Create).unwrap();
		w.add(&doc("a", "alpha")).unwrap();
		w.commit().unwrap();

		let mut w = store.stage(&dir, "english", OpenMode::Append).unwrap();
		w.add(&doc("b", "beta")).unwrap();
		w.commit().unwrap();
		assert_eq!(store.count_documents(&dir, "english").unwrap(), 1);
		store.publish(&dir).unwrap();
		assert_eq!(store.count_documents(&dir, "english").unwrap(), 2);
		assert!(!staging_dir(&dir).exists());

		let mut w = store.stage(&dir, "english", OpenMode::Create).unwrap();
		w.add(&doc("c", "gamma")).unwrap();
		w.commit().unwrap();
		store.discard(&dir).unwrap();
		assert_eq!(store.count_documents(&dir, "english").unwrap(), 2);
		assert!(!staging_dir(&dir).exists());
	}

	#[test]
	fn staging_sits_next_to_the_sub_index() {
		assert_eq!(staging_dir(Path::new("/c/file-1a")), Path::new("/c/file-1a.staging"));
	}

	#[test]
	fn missing_and_corrupt_directories_read_as_empty() {
		let tmp = tempfile::tempdir().unwrap();
		let store = store();
		assert!(store.open_reader(&tmp.path().join("nope"), "english").unwrap().is_none());

		let broken = tmp.path().join("broken");
		std::fs::create_dir_all(&broken).unwrap();
		std::fs::write(broken.join(META_FILE), b"").unwrap();
		assert_eq!(store.count_documents(&broken, "english").unwrap(), 0);
		assert!(!broken.exists());
	}

	#[test]
	fn busy_sub_index_is_not_healed() {
		let tmp = tempfile::tempdir().unwrap();
		let store = store();
		let broken = tmp.path().join("broken");
		std::fs::create_dir_all(&broken).unwrap();
		std::fs::write(broken.join(META_FILE), b"").unwrap();
		let _held = store.writers.acquire(&broken).unwrap();
		assert!(store.open_reader(&broken, "english").unwrap().is_none());
		assert!(broken.exists());
	}

	#[test]
	fn writers_on_the_same_directory_are_serialised() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = tmp.path().join("sub");
		let store = TextIndexStore::new(
			Arc::new(AnalyzerRegistry::new()),
			NamedLocks::new(Duration::from_millis(50)),
			15_000_000,
		);
		let _first = store.open_writer(&dir, "english", OpenMode::Create).unwrap();
		let second = store.open_writer(&dir, "english", OpenMode::Append);
		assert!(matches!(second, Err(Error::LockTimeout { .. })));
	}
}
