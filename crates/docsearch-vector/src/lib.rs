//! Vector substrate on LanceDB.
//!
//! Each collection keeps one Lance table below its storage directory holding
//! the embedding of every stored document, keyed by `(index_id, key)`.
//! `VectorStore` is a blocking facade: it owns a handle to a shared tokio
//! runtime and drives the async lancedb calls to completion, so it must not
//! be called from inside that runtime.
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lancedb::table::OptimizeAction;
use lancedb::Connection;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use docsearch_core::error::{Result, ResultExt};

pub use search::{similarity_from_distance, VectorHit};
pub use writer::VectorRecord;

use table::{index_filter, keys_filter, open_db, open_table, table_dimension, TABLE_NAME};

/// Multi-threaded runtime shared by every `VectorStore` of an engine.
pub fn build_runtime() -> Result<Arc<Runtime>> {
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.thread_name("docsearch-vector")
		.build()
		.storage_context(|| "starting vector runtime")?;
	Ok(Arc::new(runtime))
}

pub struct VectorStore {
	runtime: Arc<Runtime>,
	db: Connection,
	dir: PathBuf,
}

impl VectorStore {
	pub fn open(dir: &Path, runtime: Arc<Runtime>) -> Result<Self> {
		std::fs::create_dir_all(dir).storage_context(|| format!("creating {}", dir.display()))?;
		let uri = dir.to_string_lossy().into_owned();
		let db = runtime.block_on(open_db(&uri))?;
		Ok(Self { runtime, db, dir: dir.to_path_buf() })
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Insert or replace the given vectors. All must share one dimension; a
	/// table built for another dimension is discarded first.
	pub fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
		let Some(first) = records.first() else { return Ok(()) };
		let dimension = first.vector.len();
		self.runtime.block_on(async {
			let mut table = open_table(&self.db).await?;
			let stored = match &table {
				Some(existing) => table_dimension(existing).await?,
				None => None,
			};
			if let Some(stored) = stored.filter(|&d| d != dimension) {
				warn!(dir = %self.dir.display(), stored, dimension, "vector dimension changed, discarding stored vectors");
				table = None;
				self.discard_table()?;
			}
			writer::upsert(&self.db, table.as_ref(), records, dimension).await
		})
	}

	/// Replace every vector of one sub-index.
	pub fn replace_index(&self, index_id: &str, records: &[VectorRecord]) -> Result<()> {
		self.delete_index(index_id)?;
		self.upsert(records)
	}

	pub fn delete_keys(&self, index_id: &str, keys: &[String]) -> Result<usize> {
		let Some(predicate) = keys_filter(index_id, keys) else { return Ok(0) };
		self.delete_where(&predicate)
	}

	pub fn delete_index(&self, index_id: &str) -> Result<usize> {
		self.delete_where(&index_filter(index_id))
	}

	fn delete_where(&self, predicate: &str) -> Result<usize> {
		self.runtime.block_on(async {
			match open_table(&self.db).await? {
				Some(table) => writer::delete_where(&table, predicate).await,
				None => Ok(0),
			}
		})
	}

	/// `limit` nearest documents across `index_ids` (all sub-indexes when
	/// empty). A query of another dimension than the stored vectors finds
	/// nothing.
	pub fn search(&self, vector: &[f32], index_ids: &[String], limit: usize) -> Result<Vec<VectorHit>> {
		if limit == 0 || vector.is_empty() {
			return Ok(Vec::new());
		}
		self.runtime.block_on(async {
			let Some(table) = open_table(&self.db).await? else { return Ok(Vec::new()) };
			if let Some(stored) = table_dimension(&table).await? {
				if stored != vector.len() {
					warn!(dir = %self.dir.display(), stored, query = vector.len(), "query vector dimension differs from stored vectors");
					return Ok(Vec::new());
				}
			}
			search::knn(&table, vector, index_ids, limit).await
		})
	}

	/// Stored vectors, for one sub-index or all of them.
	pub fn count(&self, index_id: Option<&str>) -> Result<usize> {
		self.runtime.block_on(async {
			let Some(table) = open_table(&self.db).await? else { return Ok(0) };
			table.count_rows(index_id.map(index_filter)).await.storage_context(|| "counting vectors")
		})
	}

	/// Compact fragments and prune old versions.
	pub fn optimize(&self) -> Result<()> {
		self.runtime.block_on(async {
			let Some(table) = open_table(&self.db).await? else { return Ok(()) };
			table.optimize(OptimizeAction::All).await.storage_context(|| "optimizing vector table")?;
			info!(dir = %self.dir.display(), "vector table optimized");
			Ok(())
		})
	}

	fn discard_table(&self) -> Result<()> {
		let path = self.dir.join(format!("{TABLE_NAME}.lance"));
		if path.exists() {
			std::fs::remove_dir_all(&path).storage_context(|| format!("removing {}", path.display()))?;
		}
		Ok(())
	}
}
