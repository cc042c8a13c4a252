use std::path::{Path, PathBuf};

use tracing::debug;

use docsearch_core::error::{Result, ResultExt};
use docsearch_core::traits::MetadataStore;
use docsearch_core::types::EngineMeta;

pub const METADATA_FILE: &str = "collections.json";

/// Engine registry kept as pretty-printed JSON below the storage root.
#[derive(Debug, Clone)]
pub struct JsonMetadataStore {
	path: PathBuf,
}

impl JsonMetadataStore {
	pub fn new(root: &Path) -> Self {
		Self { path: root.join(METADATA_FILE) }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl MetadataStore for JsonMetadataStore {
	fn load(&self) -> Result<Option<EngineMeta>> {
		if !self.path.exists() {
			return Ok(None);
		}
		let text = std::fs::read_to_string(&self.path).storage_context(|| format!("reading {}", self.path.display()))?;
		let meta = serde_json::from_str(&text).storage_context(|| format!("parsing {}", self.path.display()))?;
		Ok(Some(meta))
	}

	fn save(&self, meta: &EngineMeta) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			std::fs::create_dir_all(parent).storage_context(|| format!("creating {}", parent.display()))?;
		}
		let json = serde_json::to_string_pretty(meta).storage_context(|| "serializing engine metadata")?;
		let tmp = self.path.with_extension("json.tmp");
		std::fs::write(&tmp, json).storage_context(|| format!("writing {}", tmp.display()))?;
		std::fs::rename(&tmp, &self.path).storage_context(|| format!("replacing {}", self.path.display()))?;
		debug!(path = %self.path.display(), collections = meta.collections.len(), "metadata saved");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use docsearch_core::types::{CollectionMeta, IndexDescriptor, IndexOptions, SearchMode, Source};

	fn collection() -> CollectionMeta {
		let source = Source::File { path: "/data/intro.txt".into() };
		let options = IndexOptions { title: "Intro".into(), category_tree: "/docs".into(), ..IndexOptions::default() };
		CollectionMeta {
			name: "kb".into(),
			path: "/tmp/kb".into(),
			language: "english".into(),
			mode: SearchMode::Hybrid,
			embedding: None,
			ratio: 0.3,
			created: Utc::now(),
			last_update: Utc::now(),
			indexes: vec![IndexDescriptor::new(&source, "english", &options)],
			extra: serde_json::Map::new(),
		}
	}

	#[test]
	fn missing_file_loads_as_none() {
		let tmp = tempfile::tempdir().unwrap();
		assert!(JsonMetadataStore::new(tmp.path()).load().unwrap().is_none());
	}

	#[test]
	fn save_then_load_round_trips() {
		let tmp = tempfile::tempdir().unwrap();
		let store = JsonMetadataStore::new(&tmp.path().join("nested"));
		let meta = EngineMeta { collections: vec![collection()], extra: serde_json::Map::new() };
		store.save(&meta).unwrap();
		assert_eq!(store.load().unwrap(), Some(meta));
		assert!(!store.path().with_extension("json.tmp").exists());
	}

	#[test]
	fn unknown_fields_survive() {
		let tmp = tempfile::tempdir().unwrap();
		let store = JsonMetadataStore::new(tmp.path());
		let mut meta = EngineMeta { collections: vec![collection()], extra: serde_json::Map::new() };
		meta.extra.insert("legacyVersion".into(), serde_json::json!("3.1"));
		meta.collections[0].indexes[0].extra.insert("spellcheck".into(), serde_json::json!(true));
		store.save(&meta).unwrap();

		let raw = std::fs::read_to_string(store.path()).unwrap();
		assert!(raw.contains("legacyVersion"));
		let loaded = store.load().unwrap().unwrap();
		assert_eq!(loaded.extra.get("legacyVersion"), Some(&serde_json::json!("3.1")));
		assert_eq!(loaded.collections[0].indexes[0].extra.get("spellcheck"), Some(&serde_json::json!(true)));
	}
}
