//! LanceDB connection and table helpers.
use lancedb::{connect, Connection, Table};

use docsearch_core::error::{Result, ResultExt};

use crate::schema::{vector_dimension, INDEX_ID, KEY};

/// Single table holding the vectors of every sub-index of a collection.
pub const TABLE_NAME: &str = "vectors";

pub async fn open_db(uri: &str) -> Result<Connection> {
	connect(uri).execute().await.storage_context(|| format!("opening vector store {uri}"))
}

/// `None` until the first vector has been written.
pub async fn open_table(conn: &Connection) -> Result<Option<Table>> {
	let names = conn.table_names().execute().await.storage_context(|| "listing vector tables")?;
	if !names.iter().any(|n| n == TABLE_NAME) {
		return Ok(None);
	}
	let table = conn.open_table(TABLE_NAME).execute().await.storage_context(|| "opening vector table")?;
	Ok(Some(table))
}

pub async fn table_dimension(table: &Table) -> Result<Option<usize>> {
	let schema = table.schema().await.storage_context(|| "reading vector table schema")?;
	Ok(vector_dimension(&schema))
}

fn quote(value: &str) -> String {
	format!("'{}'", value.replace('\'', "''"))
}

pub fn index_filter(index_id: &str) -> String {
	format!("{INDEX_ID} = {}", quote(index_id))
}

/// `index_id IN (...)`, or `None` for an empty list.
pub fn index_list_filter(index_ids: &[String]) -> Option<String> {
	if index_ids.is_empty() {
		return None;
	}
	let list = index_ids.iter().map(|id| quote(id)).collect::<Vec<_>>().join(",");
	Some(format!("{INDEX_ID} IN ({list})"))
}

pub fn keys_filter(index_id: &str, keys: &[String]) -> Option<String> {
	if keys.is_empty() {
		return None;
	}
	let list = keys.iter().map(|k| quote(k)).collect::<Vec<_>>().join(",");
	Some(format!("{} AND {KEY} IN ({list})", index_filter(index_id)))
}
