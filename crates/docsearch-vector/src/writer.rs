use std::sync::Arc;

use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::{Connection, Table};
use tracing::debug;

use docsearch_core::error::{Error, Result, ResultExt};

use crate::schema::{build_vector_schema, INDEX_ID, KEY};
use crate::table::TABLE_NAME;

/// Embedding of one stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
	pub key: String,
	pub index_id: String,
	pub vector: Vec<f32>,
}

pub(crate) fn records_to_batch(records: &[VectorRecord], dimension: usize) -> Result<RecordBatch> {
	let width = i32::try_from(dimension).map_err(|_| Error::Embedding(format!("vector dimension {dimension} is too large")))?;
	let mut keys = Vec::with_capacity(records.len());
	let mut index_ids = Vec::with_capacity(records.len());
	let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(records.len());
	for record in records {
		if record.vector.len() != dimension {
			return Err(Error::Embedding(format!(
				"vector for [{}] has {} components, expected {dimension}",
				record.key,
				record.vector.len()
			)));
		}
		keys.push(record.key.clone());
		index_ids.push(record.index_id.clone());
		vectors.push(Some(record.vector.iter().map(|&x| Some(x)).collect()));
	}
	RecordBatch::try_new(build_vector_schema(width), vec![
		Arc::new(StringArray::from(keys)),
		Arc::new(StringArray::from(index_ids)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), width)),
	])
	.storage_context(|| "building vector batch")
}

/// Insert or replace records, matching on (index_id, key).
pub(crate) async fn upsert(conn: &Connection, table: Option<&Table>, records: &[VectorRecord], dimension: usize) -> Result<()> {
	if records.is_empty() {
		return Ok(());
	}
	let batch = records_to_batch(records, dimension)?;
	let schema = batch.schema();
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
	match table {
		Some(table) => {
			let mut merge = table.merge_insert(&[INDEX_ID, KEY]);
			merge.when_matched_update_all(None).when_not_matched_insert_all();
			merge.execute(reader).await.storage_context(|| "upserting vectors")?;
		}
		None => {
			conn.create_table(TABLE_NAME, reader).execute().await.storage_context(|| "creating vector table")?;
		}
	}
	debug!(records = records.len(), "vectors written");
	Ok(())
}

/// Delete rows matching `predicate`, returning how many went away.
pub(crate) async fn delete_where(table: &Table, predicate: &str) -> Result<usize> {
	let before = table.count_rows(None).await.storage_context(|| "counting vectors")?;
	table.delete(predicate).await.storage_context(|| format!("deleting vectors where {predicate}"))?;
	let after = table.count_rows(None).await.storage_context(|| "counting vectors")?;
	Ok(before.saturating_sub(after))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(key: &str, vector: Vec<f32>) -> VectorRecord {
		VectorRecord { key: key.into(), index_id: "custom".into(), vector }
	}

	#[test]
	fn batch_carries_every_record() {
		let batch = records_to_batch(&[record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])], 2).unwrap();
		assert_eq!(batch.num_rows(), 2);
		assert_eq!(batch.num_columns(), 3);
	}

	#[test]
	fn wrong_dimension_is_rejected() {
		let err = records_to_batch(&[record("a", vec![1.0, 0.0, 0.0])], 2).unwrap_err();
		assert!(matches!(err, Error::Embedding(_)));
	}
}
