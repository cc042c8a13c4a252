use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const KEY: &str = "key";
pub const INDEX_ID: &str = "index_id";
pub const VECTOR: &str = "vector";
/// Column lancedb appends to nearest-neighbour results.
pub const DISTANCE: &str = "_distance";

pub fn build_vector_schema(dimension: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(KEY, DataType::Utf8, false),
		Field::new(INDEX_ID, DataType::Utf8, false),
		Field::new(VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dimension), true),
	]))
}

/// Length of the vector column, if the schema has one.
pub fn vector_dimension(schema: &Schema) -> Option<usize> {
	match schema.field_with_name(VECTOR).ok()?.data_type() {
		DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dimension_is_read_back() {
		let schema = build_vector_schema(64);
		assert_eq!(vector_dimension(&schema), Some(64));
		assert_eq!(schema.fields().len(), 3);
		assert_eq!(vector_dimension(&Schema::empty()), None);
	}
}
