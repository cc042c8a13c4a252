use std::fs;
use tempfile::TempDir;

use docsearch_core::extract::{list_files, normalize_extensions, BasicExtractor};
use docsearch_core::traits::DocumentExtractor;
use docsearch_core::types::{CollectionMeta, EngineMeta, IndexDescriptor, IndexOptions, SearchMode, Source};

#[test]
fn list_files_honours_filter_and_recursion() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.md"), "charlie").unwrap();
    fs::create_dir(dir.join("sub")).unwrap();
    fs::write(dir.join("sub").join("c.txt"), "delta").unwrap();

    let txt = normalize_extensions(["*.txt"]);
    let flat = list_files(dir, &txt, false);
    assert_eq!(flat, vec![dir.join("a.txt")]);

    let deep = list_files(dir, &txt, true);
    assert_eq!(deep, vec![dir.join("a.txt"), dir.join("sub").join("c.txt")]);

    let everything = list_files(dir, &[], true);
    assert_eq!(everything.len(), 3);
}

#[test]
fn extractor_reads_files_from_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("page.htm");
    fs::write(&path, "<title>Page</title><p>Body text</p>").unwrap();
    let bytes = fs::read(&path).unwrap();
    let out = BasicExtractor::new().extract(&bytes, None, &path.to_string_lossy()).expect("extract");
    assert_eq!(out.title, "Page");
    assert_eq!(out.contents, "Body text");
    assert_eq!(out.summary, "Body text");
}

#[test]
fn metadata_keeps_unknown_fields() {
    let raw = r#"{
        "collections": [{
            "name": "kb", "path": "/tmp/kb", "language": "english",
            "mode": "hybrid", "embedding": "tf-idf", "ratio": 0.3,
            "created": "2024-01-01T00:00:00Z", "lastUpdate": "2024-01-02T00:00:00Z",
            "legacyFlag": true,
            "indexes": [{
                "id": "custom", "type": "custom", "key": "q", "categoryTree": "/docs/api",
                "categories": ["a"], "oldAttr": "keep me"
            }]
        }],
        "version": 3
    }"#;
    let meta: EngineMeta = serde_json::from_str(raw).unwrap();
    let coll: &CollectionMeta = &meta.collections[0];
    assert_eq!(coll.mode, SearchMode::Hybrid);
    assert_eq!(coll.embedding.map(|e| e.as_str()), Some("TF-IDF"));
    assert_eq!(coll.indexes[0].category_tree, "/docs/api");

    let again: serde_json::Value = serde_json::to_value(&meta).unwrap();
    assert_eq!(again["version"], 3);
    assert_eq!(again["collections"][0]["legacyFlag"], true);
    assert_eq!(again["collections"][0]["indexes"][0]["oldAttr"], "keep me");
    assert_eq!(again["collections"][0]["embedding"], "TF-IDF");
}

#[test]
fn descriptor_from_source() {
    let source = Source::Path { root: "/srv/docs".into(), extensions: vec!["txt".into()], recurse: true };
    let options = IndexOptions { title: "Docs".into(), urlpath: "http://x.org/docs".into(), ..IndexOptions::default() };
    let d = IndexDescriptor::new(&source, "english", &options);
    assert_eq!(d.id, source.id());
    assert_eq!(d.key, "/srv/docs");
    assert_eq!(d.extensions, vec!["txt"]);
    assert_eq!(d.title, "Docs");
    assert!(d.query.is_empty());
}
