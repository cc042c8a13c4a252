use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};

use docsearch_core::error::{Error, Result, ResultExt};

use crate::schema::{DISTANCE, INDEX_ID, KEY};
use crate::table::index_list_filter;

/// Nearest-neighbour hit; `score` is a similarity in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
	pub key: String,
	pub index_id: String,
	pub score: f32,
}

/// Cosine distance (0..=2) mapped to `(1 + cos) / 2`.
pub fn similarity_from_distance(distance: f32) -> f32 {
	let score = 1.0 - distance / 2.0;
	if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 }
}

/// `limit` nearest vectors among the given sub-indexes, best first.
pub(crate) async fn knn(table: &Table, vector: &[f32], index_ids: &[String], limit: usize) -> Result<Vec<VectorHit>> {
	let mut query = table
		.vector_search(vector.to_vec())
		.storage_context(|| "building vector query")?
		.distance_type(DistanceType::Cosine)
		.limit(limit);
	if let Some(filter) = index_list_filter(index_ids) {
		query = query.only_if(filter);
	}
	let mut stream = query.execute().await.storage_context(|| "running vector query")?;
	let mut hits = Vec::new();
	while let Some(batch) = stream.try_next().await.storage_context(|| "reading vector results")? {
		read_hits(&batch, &mut hits)?;
	}
	hits.sort_by(|a, b| b.score.total_cmp(&a.score));
	hits.truncate(limit);
	Ok(hits)
}

fn read_hits(batch: &RecordBatch, hits: &mut Vec<VectorHit>) -> Result<()> {
	let keys = string_column(batch, KEY)?;
	let index_ids = string_column(batch, INDEX_ID)?;
	let distances = batch
		.column_by_name(DISTANCE)
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| Error::CorruptIndex(format!("vector results have no {DISTANCE} column")))?;
	for i in 0..batch.num_rows() {
		let score = if distances.is_null(i) { 0.0 } else { similarity_from_distance(distances.value(i)) };
		hits.push(VectorHit { key: keys.value(i).to_string(), index_id: index_ids.value(i).to_string(), score });
	}
	Ok(())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| Error::CorruptIndex(format!("vector table has no {name} column")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn distance_maps_to_similarity() {
		assert!((similarity_from_distance(0.0) - 1.0).abs() < 1e-6);
		assert!((similarity_from_distance(1.0) - 0.5).abs() < 1e-6);
		assert!(similarity_from_distance(2.0).abs() < 1e-6);
		assert_eq!(similarity_from_distance(f32::NAN), 0.0);
	}
}
