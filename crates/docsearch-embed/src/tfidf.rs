//! TF-IDF embeddings over a fixed vocabulary.
//!
//! Every vocabulary term owns one slot of the vector. A text's vector holds
//! `tf * idf` in the slots of the terms it contains and is L2 normalized.
//! The vocabulary comes from a saved vocabulary file, from a corpus
//! directory of `.txt`/`.text` files, or from a built-in list of common
//! english words.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

use tracing::{error, info, warn};

use docsearch_core::error::{Error, Result, ResultExt};
use docsearch_core::traits::Embedder;

use crate::cache::EmbeddingCache;
use crate::pool::{l2_normalize, nudge_zero};
use crate::tokenize::tokenize;

pub const DEFAULT_DIMENSION: usize = 500;

const DOCUMENT_COUNT_HEADER: &str = "DOCUMENT_COUNT:";
const DEFAULT_DOCUMENT_COUNT: usize = 1000;

const COMMON_WORDS: &[&str] = &[
    "the", "of", "and", "a", "to", "in", "is", "you", "that", "it", "he", "was", "for", "on", "are", "as", "with",
    "his", "they", "at", "be", "this", "have", "from", "or", "one", "had", "by", "word", "but", "not", "what", "all",
    "were", "we", "when", "your", "can", "said", "there", "use", "an", "each", "which", "she", "do", "how", "their",
    "if", "will", "up", "other", "about", "out", "many", "then", "them", "these", "so", "some", "her", "would",
    "make", "like", "him", "into", "time", "has", "look", "two", "more", "write", "go", "see", "number", "no", "way",
    "could", "people", "my", "than", "first", "water", "been", "call", "who", "oil", "its", "now", "find", "long",
    "down", "day", "did", "get", "come", "made", "may", "part",
];

/// Terms in slot order with their idf weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    terms: Vec<String>,
    idf: Vec<f64>,
    slots: HashMap<String, usize>,
    document_count: usize,
}

impl Vocabulary {
    fn from_entries(entries: Vec<(String, f64)>, document_count: usize) -> Self {
        let mut terms = Vec::with_capacity(entries.len());
        let mut idf = Vec::with_capacity(entries.len());
        let mut slots = HashMap::with_capacity(entries.len());
        for (term, weight) in entries {
            if slots.contains_key(&term) {
                continue;
            }
            slots.insert(term.clone(), terms.len());
            terms.push(term);
            idf.push(weight);
        }
        Self { terms, idf, slots, document_count }
    }

    /// Common english words; earlier words get lower weights.
    pub fn default_english(dimension: usize) -> Self {
        let limit = COMMON_WORDS.len().min(dimension);
        #[allow(clippy::cast_precision_loss)]
        let entries = COMMON_WORDS[..limit]
            .iter()
            .enumerate()
            .map(|(i, w)| ((*w).to_string(), 1.0 + 0.5 * i as f64 / limit as f64))
            .collect();
        Self::from_entries(entries, DEFAULT_DOCUMENT_COUNT)
    }

    /// Vocabulary file (`DOCUMENT_COUNT: n` header, then `term<TAB>idf`
    /// lines) or a corpus directory.
    pub fn load(path: &Path, dimension: usize) -> Result<Self> {
        if path.is_dir() {
            Self::from_corpus(path, dimension)
        } else if path.is_file() {
            Self::from_file(path, dimension)
        } else {
            Err(Error::resource(format!("vocabulary path {} is neither a file nor a directory", path.display())))
        }
    }

    fn from_file(path: &Path, dimension: usize) -> Result<Self> {
        info!(path = %path.display(), "loading tf-idf vocabulary");
        let text = std::fs::read_to_string(path).storage_context(|| format!("reading {}", path.display()))?;
        let mut lines = text.lines().peekable();
        let mut document_count = 1;
        if let Some(header) = lines.peek().and_then(|l| l.strip_prefix(DOCUMENT_COUNT_HEADER)) {
            document_count = header
                .trim()
                .parse()
                .map_err(|_| Error::Embedding(format!("invalid document count [{}] in {}", header.trim(), path.display())))?;
            lines.next();
        }
        let mut entries = Vec::new();
        for line in lines {
            if entries.len() >= dimension {
                break;
            }
            let mut parts = line.split('\t');
            let (Some(term), Some(weight)) = (parts.next(), parts.next()) else {
                continue;
            };
            let weight: f64 = weight
                .trim()
                .parse()
                .map_err(|_| Error::Embedding(format!("invalid idf [{weight}] for [{term}] in {}", path.display())))?;
            entries.push((term.to_string(), weight));
        }
        Ok(Self::from_entries(entries, document_count))
    }

    fn from_corpus(dir: &Path, dimension: usize) -> Result<Self> {
        info!(dir = %dir.display(), "building tf-idf vocabulary from corpus");
        let mut frequencies: HashMap<String, usize> = HashMap::new();
        let mut document_count = 0usize;
        for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(std::result::Result::ok) {
            let path = entry.path();
            let is_text = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e == "txt" || e == "text");
            if !entry.file_type().is_file() || !is_text {
                continue;
            }
            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable corpus file");
                    continue;
                }
            };
            document_count += 1;
            let unique: HashSet<String> = tokenize(&content).into_iter().collect();
            for word in unique {
                *frequencies.entry(word).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = frequencies.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(dimension);
        #[allow(clippy::cast_precision_loss)]
        let entries = ranked
            .into_iter()
            .map(|(term, df)| {
                let idf = (document_count as f64 / df as f64).ln() + 1.0;
                (term, idf)
            })
            .collect();
        Ok(Self::from_entries(entries, document_count))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn slot(&self, term: &str) -> Option<usize> {
        self.slots.get(term).copied()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.slot(term).map(|i| self.idf[i])
    }

    fn to_file_contents(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{DOCUMENT_COUNT_HEADER} {}", self.document_count);
        for (term, idf) in self.terms.iter().zip(&self.idf) {
            let _ = writeln!(out, "{term}\t{idf}");
        }
        out
    }
}

pub struct TfIdfEmbedder {
    vocabulary: Vocabulary,
    dimension: usize,
    cache: EmbeddingCache,
}

impl TfIdfEmbedder {
    pub fn new(vocabulary: Vocabulary, dimension: usize) -> Self {
        Self { vocabulary, dimension: dimension.max(1), cache: EmbeddingCache::default() }
    }

    pub fn with_default_vocabulary(dimension: usize) -> Self {
        Self::new(Vocabulary::default_english(dimension), dimension)
    }

    /// Loads the vocabulary at `path`; falls back to the built-in one when
    /// that fails or no path is given.
    pub fn from_path(path: Option<&Path>, dimension: usize) -> Self {
        let vocabulary = match path {
            Some(p) => Vocabulary::load(p, dimension).unwrap_or_else(|e| {
                error!(path = %p.display(), error = %e, "tf-idf vocabulary failed to load, using the default");
                Vocabulary::default_english(dimension)
            }),
            None => {
                info!("using the default tf-idf vocabulary");
                Vocabulary::default_english(dimension)
            }
        };
        Self::new(vocabulary, dimension)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn save_vocabulary(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.vocabulary.to_file_contents()).storage_context(|| format!("writing {}", path.display()))
    }

    fn compute(&self, text: &str) -> Vec<f32> {
        let mut tf: HashMap<usize, usize> = HashMap::new();
        for token in tokenize(text) {
            if let Some(slot) = self.vocabulary.slot(&token).filter(|s| *s < self.dimension) {
                *tf.entry(slot).or_insert(0) += 1;
            }
        }
        let mut vector = vec![0f32; self.dimension];
        for (slot, count) in tf {
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
            let weight = (count as f64 * self.vocabulary.idf[slot]) as f32;
            vector[slot] = weight;
        }
        l2_normalize(&mut vector);
        nudge_zero(&mut vector);
        vector
    }
}

impl Embedder for TfIdfEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        self.cache.get_or_insert_with(text, || self.compute(text))
    }
}
