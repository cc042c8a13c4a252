use docsearch_core::config::{TfIdfSettings, Word2VecSettings};
use docsearch_core::traits::Embedder;
use docsearch_core::types::EmbeddingKind;
use docsearch_embed::EmbedderRegistry;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (na * nb)
}

#[test]
fn tfidf_from_corpus_separates_topics() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let corpus = tmp.path().join("corpus");
    std::fs::create_dir_all(&corpus).expect("mkdir");
    std::fs::write(corpus.join("1.txt"), "fox den fox hunt").expect("write");
    std::fs::write(corpus.join("2.txt"), "rust compiler borrow checker").expect("write");
    std::fs::write(corpus.join("3.txt"), "fox cubs den").expect("write");

    let registry = EmbedderRegistry::new(TfIdfSettings { path: Some(corpus), dimension: 64 }, Word2VecSettings::default());
    let embedder = registry.get(EmbeddingKind::TfIdf, "english").expect("embedder");
    assert_eq!(embedder.dimension(), 64);

    let query = embedder.generate("fox den");
    let animals = embedder.generate("a fox in its den");
    let code = embedder.generate("the borrow checker");
    assert!(cosine(&query, &animals) > cosine(&query, &code));
}

#[test]
fn word_vectors_from_configured_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let file = tmp.path().join("glove.test.3d.txt");
    std::fs::write(&file, "king 0.9 0.1 0.0\nqueen 0.85 0.15 0.0\napple 0.0 0.1 0.9\n").expect("write");

    let settings = Word2VecSettings { vectors_file: Some(file), ..Word2VecSettings::default() };
    let registry = EmbedderRegistry::new(TfIdfSettings::default(), settings);
    let embedder = registry.get(EmbeddingKind::Word2Vec, "english").expect("embedder");
    assert_eq!(embedder.dimension(), 3);

    let royal = embedder.generate("the King");
    assert!(cosine(&royal, &embedder.generate("queen")) > cosine(&royal, &embedder.generate("apple")));
    let batch = embedder.generate_batch(&["king".to_string(), String::new()]);
    assert_eq!(batch[1], vec![0.0; 3]);
}
