use std::sync::Arc;
use std::time::Duration;

use docsearch_core::lock::NamedLocks;
use docsearch_core::traits::SpellCorrector;
use docsearch_core::types::{ContextOptions, Document};
use docsearch_text::highlight::QueryHighlighter;
use docsearch_text::passage::build_context;
use docsearch_text::query::{parse, QueryBuilder};
use docsearch_text::{AnalyzerRegistry, DictionarySpellCorrector, OpenMode, TextIndexStore};

fn doc(key: &str, contents: &str) -> Document {
    Document { key: key.into(), title: key.to_uppercase(), contents: contents.into(), index_id: "file-1".into(), ..Document::default() }
}

fn store() -> TextIndexStore {
    TextIndexStore::new(Arc::new(AnalyzerRegistry::new()), NamedLocks::new(Duration::from_secs(5)), 15_000_000)
}

#[test]
fn index_search_and_highlight() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = tmp.path().join("file-1").join("text");
    let store = store();

    let mut writer = store.open_writer(&dir, "english", OpenMode::Create).expect("writer");
    writer.add(&doc("a", "The quick brown fox jumps over the lazy dog.")).expect("add");
    writer.add(&doc("b", "A fox, a fox, a fox. Foxes everywhere.")).expect("add");
    writer.add(&doc("c", "Nothing to see in this one.")).expect("add");
    writer.commit().expect("commit");

    let reader = store.open_reader(&dir, "english").expect("open").expect("index present");
    assert_eq!(reader.num_docs(), 3);
    let analyzers = store.analyzers();

    let expr = parse("fox").expect("parse");
    let query = QueryBuilder::new(analyzers, "english", reader.fields().contents).build(&expr).expect("query");
    let hits = reader.search(query.as_ref(), 10).expect("search");
    assert_eq!(hits.len(), 2);
    assert!(hits[0].score >= hits[1].score);
    let top = reader.document(hits[0].address).expect("doc");
    assert_eq!(top.key, "b");

    let highlighter = QueryHighlighter::new(analyzers, "english", &expr).expect("highlighter");
    let context = build_context(&highlighter, &top.contents, &ContextOptions::default()).expect("context");
    assert!(context.rendered().contains("<B score=\"1.0\">fox</B>"));

    let phrase = parse("\"lazy dog\"").expect("parse");
    let query = QueryBuilder::new(analyzers, "english", reader.fields().contents).build(&phrase).expect("query");
    assert_eq!(reader.search(query.as_ref(), 10).expect("search").len(), 1);

    let negated = parse("not fox").expect("parse");
    let query = QueryBuilder::new(analyzers, "english", reader.fields().contents).build(&negated).expect("query");
    let hits = reader.search(query.as_ref(), 10).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(reader.document(hits[0].address).expect("doc").key, "c");

    let prefix = parse("jump*").expect("parse");
    let query = QueryBuilder::new(analyzers, "english", reader.fields().contents).build(&prefix).expect("query");
    assert_eq!(reader.search(query.as_ref(), 10).expect("search").len(), 1);

    let fuzzy = parse("lazzy~").expect("parse");
    let query = QueryBuilder::new(analyzers, "english", reader.fields().contents).build(&fuzzy).expect("query");
    assert_eq!(reader.search(query.as_ref(), 10).expect("search").len(), 1);

    let empty = parse("").expect("parse");
    let query = QueryBuilder::new(analyzers, "english", reader.fields().contents).build(&empty).expect("query");
    assert!(reader.search(query.as_ref(), 10).expect("search").is_empty());
}

#[test]
fn dictionary_feeds_spell_correction() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = tmp.path().join("sub");
    let store = store();
    let mut writer = store.open_writer(&dir, "english", OpenMode::Create).expect("writer");
    writer.add(&doc("a", "documentation about the search engines")).expect("add");
    writer.commit().expect("commit");

    let reader = store.open_reader(&dir, "english").expect("open").expect("index present");
    let terms = reader.term_dictionary().expect("terms");
    assert!(terms.contains(&"documentation".to_string()));
    assert!(reader.contains_term("search"));
    assert!(!reader.contains_term("the"));

    let corrector = DictionarySpellCorrector::new(terms);
    assert_eq!(corrector.suggest("serch", 3).first().map(String::as_str), Some("search"));
}

#[test]
fn documents_come_back_in_storage_order_and_by_key() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = tmp.path().join("sub");
    let store = store();
    let mut writer = store.open_writer(&dir, "english", OpenMode::Create).expect("writer");
    for key in ["k1", "k2", "k3"] {
        writer.add(&doc(key, "same body")).expect("add");
    }
    writer.commit().expect("commit");
    store.optimize(&dir, "english").expect("optimize");

    let reader = store.open_reader(&dir, "english").expect("open").expect("index present");
    let keys: Vec<String> = reader.all_documents().expect("all").into_iter().map(|d| d.key).collect();
    assert_eq!(keys, vec!["k1", "k2", "k3"]);
    let (_, found) = reader.find_by_key("k2").expect("lookup").expect("present");
    assert_eq!(found.title, "K2");
    assert!(reader.find_by_key("k9").expect("lookup").is_none());
    assert!(docsearch_text::index::size_on_disk(&dir) > 0);

    store.delete_subindex(&dir).expect("delete");
    assert!(store.open_reader(&dir, "english").expect("open").is_none());
}
