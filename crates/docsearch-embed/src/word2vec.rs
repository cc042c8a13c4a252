//! Averaged pre-trained word vectors (GloVe / word2vec text format).
//!
//! Each line is `word v1 v2 ... vn`; the first vector read fixes the
//! dimension and lines of another length are skipped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use docsearch_core::config::Word2VecSettings;
use docsearch_core::error::{Error, Result, ResultExt};
use docsearch_core::traits::Embedder;

use crate::cache::EmbeddingCache;
use crate::pool::mean_pool;
use crate::tokenize::tokenize;

pub struct Word2VecEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
    cache: EmbeddingCache,
}

impl Word2VecEmbedder {
    /// Loads the configured vectors file, or the largest `*.txt` in the
    /// configured directory.
    pub fn from_settings(settings: &Word2VecSettings) -> Result<Self> {
        let charset = settings.charset.to_ascii_lowercase();
        if charset != "utf-8" && charset != "utf8" {
            return Err(Error::config(format!("unsupported word vector charset [{}]", settings.charset)));
        }
        let file = match (&settings.vectors_file, &settings.dir) {
            (Some(file), _) => file.clone(),
            (None, Some(dir)) => largest_text_file(dir)?,
            (None, None) => {
                return Err(Error::Embedding(
                    "no word vector file configured; set word2vec.vectors_file or word2vec.dir".to_string(),
                ))
            }
        };
        Self::load(&file)
    }

    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "loading word vectors");
        let text = std::fs::read_to_string(path).storage_context(|| format!("reading {}", path.display()))?;
        let embedder = Self::parse(&text)?;
        info!(words = embedder.vocabulary_size(), dimension = embedder.dimension, "word vectors loaded");
        Ok(embedder)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut vectors = HashMap::new();
        let mut dimension = 0;
        let mut skipped = 0usize;
        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else { continue };
            let values: std::result::Result<Vec<f32>, _> = parts.map(str::parse::<f32>).collect();
            let Ok(values) = values else {
                skipped += 1;
                continue;
            };
            if values.is_empty() {
                continue;
            }
            if dimension == 0 {
                dimension = values.len();
            }
            if values.len() != dimension {
                skipped += 1;
                continue;
            }
            vectors.insert(word.to_string(), values);
        }
        if skipped > 0 {
            warn!(skipped, "skipped malformed word vector lines");
        }
        if dimension == 0 {
            return Err(Error::Embedding("word vector file holds no vectors".to_string()));
        }
        Ok(Self { vectors, dimension, cache: EmbeddingCache::default() })
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectors.len()
    }

    fn compute(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        mean_pool(tokens.iter().filter_map(|t| self.vectors.get(t).map(Vec::as_slice)), self.dimension)
    }
}

impl Embedder for Word2VecEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        self.cache.get_or_insert_with(text, || self.compute(text))
    }
}

fn largest_text_file(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::resource_with(format!("word vector dir {}", dir.display()), e))?;
    entries
        .filter_map(std::result::Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "txt"))
        .filter_map(|e| e.metadata().ok().filter(std::fs::Metadata::is_file).map(|m| (m.len(), e.path())))
        .max_by_key(|(len, _)| *len)
        .map(|(_, path)| path)
        .ok_or_else(|| Error::Embedding(format!("no word vector files (*.txt) found in {}", dir.display())))
}
