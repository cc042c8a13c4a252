use docsearch_vector::{build_runtime, VectorRecord, VectorStore};
use tempfile::TempDir;

fn record(index_id: &str, key: &str, vector: [f32; 3]) -> VectorRecord {
	VectorRecord { key: key.to_string(), index_id: index_id.to_string(), vector: vector.to_vec() }
}

#[test]
fn vector_store_full_flow() {
	let tmp = TempDir::new().expect("tmp");
	let store = VectorStore::open(&tmp.path().join("vectors"), build_runtime().expect("runtime")).expect("open");
	assert_eq!(store.count(None).expect("count"), 0);
	assert!(store.search(&[1.0, 0.0, 0.0], &[], 5).expect("empty search").is_empty());

	store
		.upsert(&[
			record("file-a", "/docs/fox.txt", [1.0, 0.0, 0.0]),
			record("file-a", "/docs/dog.txt", [0.0, 1.0, 0.0]),
			record("custom", "k1", [0.9, 0.1, 0.0]),
		])
		.expect("upsert");
	assert_eq!(store.count(None).expect("count"), 3);
	assert_eq!(store.count(Some("file-a")).expect("count"), 2);

	let hits = store.search(&[1.0, 0.0, 0.0], &[], 10).expect("search");
	assert_eq!(hits.len(), 3);
	assert_eq!(hits[0].key, "/docs/fox.txt");
	assert!((hits[0].score - 1.0).abs() < 1e-4);
	assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

	let only_custom = store.search(&[1.0, 0.0, 0.0], &["custom".to_string()], 10).expect("filtered");
	assert_eq!(only_custom.len(), 1);
	assert_eq!(only_custom[0].index_id, "custom");

	// same (index_id, key) replaces rather than duplicates
	store.upsert(&[record("custom", "k1", [0.0, 0.0, 1.0])]).expect("re-upsert");
	assert_eq!(store.count(Some("custom")).expect("count"), 1);
	let top = store.search(&[0.0, 0.0, 1.0], &[], 1).expect("search");
	assert_eq!(top[0].key, "k1");

	assert_eq!(store.delete_keys("file-a", &["/docs/dog.txt".to_string()]).expect("delete"), 1);
	assert_eq!(store.delete_index("custom").expect("delete index"), 1);
	assert_eq!(store.count(None).expect("count"), 1);

	store.replace_index("file-a", &[record("file-a", "/docs/cat.txt", [0.0, 1.0, 1.0])]).expect("replace");
	let remaining = store.search(&[1.0, 0.0, 0.0], &[], 10).expect("search");
	assert_eq!(remaining.len(), 1);
	assert_eq!(remaining[0].key, "/docs/cat.txt");
	store.optimize().expect("optimize");
}

#[test]
fn dimension_change_discards_old_vectors() {
	let tmp = TempDir::new().expect("tmp");
	let store = VectorStore::open(tmp.path(), build_runtime().expect("runtime")).expect("open");
	store.upsert(&[record("custom", "k1", [1.0, 0.0, 0.0])]).expect("upsert");
	assert!(store.search(&[1.0, 0.0], &[], 5).expect("mismatched query").is_empty());

	store
		.upsert(&[VectorRecord { key: "k2".into(), index_id: "custom".into(), vector: vec![0.5, 0.5] }])
		.expect("upsert 2d");
	assert_eq!(store.count(None).expect("count"), 1);
	assert_eq!(store.search(&[0.5, 0.5], &[], 5).expect("search")[0].key, "k2");
}
