//! Domain types shared by the keyword, vector and hybrid layers.

use std::fmt;
use std::hash::Hasher;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::error::{Error, Result};

/// Fixed sub-index id for tabular/custom data.
pub const CUSTOM_INDEX_ID: &str = "custom";

/// How a collection ranks hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Keyword,
    Vector,
    Hybrid,
}

impl SearchMode {
    /// Empty input means keyword.
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "" | "keyword" => Ok(Self::Keyword),
            "vector" => Ok(Self::Vector),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::config(format!(
                "invalid search mode [{other}], valid modes are [keyword, vector, hybrid]"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn uses_vectors(self) -> bool {
        !matches!(self, Self::Keyword)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedding strategy names, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EmbeddingKind {
    TfIdf,
    Word2Vec,
}

impl EmbeddingKind {
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "tf-idf" | "tfidf" => Ok(Self::TfIdf),
            "word2vec" | "glove" => Ok(Self::Word2Vec),
            other => Err(Error::config(format!(
                "unknown embedding strategy [{other}], valid strategies are [TF-IDF, word2vec]"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TfIdf => "TF-IDF",
            Self::Word2Vec => "word2vec",
        }
    }
}

impl TryFrom<String> for EmbeddingKind {
    type Error = Error;
    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EmbeddingKind> for String {
    fn from(value: EmbeddingKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EmbeddingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated mode/embedding/ratio triple of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub mode: SearchMode,
    pub embedding: Option<EmbeddingKind>,
    pub ratio: f32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { mode: SearchMode::Keyword, embedding: None, ratio: 0.5 }
    }
}

impl SearchSettings {
    /// Non-keyword modes without an embedding fall back to TF-IDF.
    pub fn parse(mode: &str, embedding: &str, ratio: f32) -> Result<Self> {
        let mode = SearchMode::parse(mode)?;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(Error::config(format!("ratio [{ratio}] must be between 0 and 1")));
        }
        let embedding = if embedding.trim().is_empty() {
            mode.uses_vectors().then_some(EmbeddingKind::TfIdf)
        } else {
            Some(EmbeddingKind::parse(embedding)?)
        };
        Ok(Self { mode, embedding, ratio })
    }

    /// Weights applied to (keyword, vector) scores.
    pub fn weights(&self) -> (f32, f32) {
        match self.mode {
            SearchMode::Keyword => (1.0, 0.0),
            SearchMode::Vector => (0.0, 1.0),
            SearchMode::Hybrid => (1.0 - self.ratio, self.ratio),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    File,
    Path,
    Url,
    Custom,
}

impl SourceType {
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "path" => Ok(Self::Path),
            "url" => Ok(Self::Url),
            "custom" => Ok(Self::Custom),
            other => Err(Error::config(format!("unknown index type [{other}]"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Path => "path",
            Self::Url => "url",
            Self::Custom => "custom",
        }
    }
}

/// Stable sub-index id for a (type, key) pair.
pub fn sub_index_id(source_type: SourceType, key: &str) -> String {
    if source_type == SourceType::Custom {
        return CUSTOM_INDEX_ID.to_string();
    }
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(key.as_bytes());
    format!("{}-{:x}", source_type.as_str(), hasher.finish())
}

/// Directory name used for a collection below its configured path.
///
/// ASCII letters and digits are kept. Anything else becomes `_`, and a
/// positional checksum of the replaced characters is appended so names that
/// only differ in punctuation do not collide.
pub fn collection_dir_name(name: &str) -> String {
    let mut out = String::from("CF");
    let mut checksum: u64 = 0;
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('_');
            checksum += u64::from(u32::from(c)) * (i as u64 + 1);
        }
    }
    if checksum > 0 {
        out.push_str(&checksum.to_string());
    }
    out
}

/// What a sub-index was built from, with the fields only that kind needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    File { path: PathBuf },
    Path { root: PathBuf, extensions: Vec<String>, recurse: bool },
    Url { url: String, extensions: Vec<String>, recurse: bool, timeout: Duration },
    Custom { query: String },
}

impl Source {
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::File { .. } => SourceType::File,
            Self::Path { .. } => SourceType::Path,
            Self::Url { .. } => SourceType::Url,
            Self::Custom { .. } => SourceType::Custom,
        }
    }

    pub fn key(&self) -> String {
        match self {
            Self::File { path } => path.to_string_lossy().into_owned(),
            Self::Path { root, .. } => root.to_string_lossy().into_owned(),
            Self::Url { url, .. } => url.clone(),
            Self::Custom { query } => query.clone(),
        }
    }

    pub fn id(&self) -> String {
        sub_index_id(self.source_type(), &self.key())
    }
}

/// Caller supplied metadata for an index operation.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    pub title: String,
    pub urlpath: String,
    pub category_tree: String,
    pub categories: Vec<String>,
    pub custom: [String; 4],
    /// Must match the collection language when set.
    pub language: Option<String>,
}

/// Registry entry describing one sub-index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub urlpath: String,
    #[serde(default, rename = "categoryTree")]
    pub category_tree: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub custom1: String,
    #[serde(default)]
    pub custom2: String,
    #[serde(default)]
    pub custom3: String,
    #[serde(default)]
    pub custom4: String,
    #[serde(default)]
    pub query: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl IndexDescriptor {
    pub fn new(source: &Source, language: &str, options: &IndexOptions) -> Self {
        let extensions = match source {
            Source::Path { extensions, .. } | Source::Url { extensions, .. } => extensions.clone(),
            Source::File { .. } | Source::Custom { .. } => Vec::new(),
        };
        let query = match source {
            Source::Custom { query } => query.clone(),
            _ => String::new(),
        };
        let [custom1, custom2, custom3, custom4] = options.custom.clone();
        Self {
            id: source.id(),
            source_type: source.source_type(),
            key: source.key(),
            title: options.title.clone(),
            language: language.to_string(),
            extensions,
            urlpath: options.urlpath.clone(),
            category_tree: options.category_tree.clone(),
            categories: options.categories.clone(),
            custom1,
            custom2,
            custom3,
            custom4,
            query,
            extra: serde_json::Map::new(),
        }
    }

    /// 1-based custom slot.
    pub fn custom(&self, slot: usize) -> &str {
        match slot {
            1 => &self.custom1,
            2 => &self.custom2,
            3 => &self.custom3,
            4 => &self.custom4,
            _ => "",
        }
    }
}

/// Unit handed to the index writer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub key: String,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub contents: String,
    pub keywords: String,
    pub author: String,
    pub mime_type: String,
    pub custom: [String; 4],
    pub size: u64,
    pub index_id: String,
}

/// Counts reported by every index and delete operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResult {
    pub deleted: usize,
    pub inserted: usize,
    pub unchanged: usize,
}

impl IndexResult {
    /// Derive counts from the document totals before and after a rebuild.
    pub fn from_counts(before: usize, after: usize) -> Self {
        let inserted = after.saturating_sub(before);
        Self { deleted: before.saturating_sub(after), inserted, unchanged: after - inserted }
    }
}

/// Per-search rendering of the context summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextOptions {
    pub passages: usize,
    pub passage_length: usize,
    pub bytes: usize,
    pub highlight_begin: String,
    pub highlight_end: String,
    pub delimiter: String,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            passages: 3,
            passage_length: 150,
            bytes: 1000,
            highlight_begin: "<B>".to_string(),
            highlight_end: "</B>".to_string(),
            delimiter: "...\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub criteria: String,
    pub language: Option<String>,
    /// 1-based.
    pub start_row: usize,
    /// `None` means unbounded.
    pub max_rows: Option<usize>,
    pub category_tree: String,
    pub categories: Vec<String>,
    pub context: ContextOptions,
    /// Run spell suggestion when the hit count is at or below this budget.
    pub suggestions: Option<usize>,
}

impl SearchRequest {
    pub fn new(criteria: impl Into<String>) -> Self {
        Self {
            criteria: criteria.into(),
            language: None,
            start_row: 1,
            max_rows: None,
            category_tree: String::new(),
            categories: Vec::new(),
            context: ContextOptions::default(),
            suggestions: None,
        }
    }

    /// `max_rows` below zero means unbounded; `start_row` is clamped to 1.
    #[must_use]
    pub fn window(mut self, start_row: usize, max_rows: i64) -> Self {
        self.start_row = start_row.max(1);
        self.max_rows = usize::try_from(max_rows).ok();
        self
    }

    #[must_use]
    pub fn category_tree(mut self, tree: impl Into<String>) -> Self {
        self.category_tree = tree.into();
        self
    }

    #[must_use]
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn suggestions(mut self, budget: usize) -> Self {
        self.suggestions = Some(budget);
        self
    }

    /// Number of hits each sub-index must deliver before the global window is cut.
    pub fn fetch_limit(&self) -> Option<usize> {
        self.max_rows.map(|max| self.start_row - 1 + max)
    }
}

/// One excerpt of a hit's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub original: String,
    pub highlighted: String,
    /// Byte offsets into the document text.
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

/// Context summary of a hit: the selected passages and their rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    passages: Vec<Passage>,
    rendered: String,
}

impl Context {
    pub fn new(passages: Vec<Passage>, rendered: String) -> Self {
        Self { passages, rendered }
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn rendered(&self) -> &str {
        &self.rendered
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub score: f32,
    pub key: String,
    pub title: String,
    /// Resolved absolute link.
    pub url: String,
    pub summary: String,
    pub custom: [String; 4],
    pub size: u64,
    pub mime_type: String,
    pub author: String,
    pub index_id: String,
    pub source_type: SourceType,
    pub category_tree: String,
    pub categories: Vec<String>,
    pub context: Context,
}

/// Literal term and its ranked alternative spellings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionEntry {
    pub term: String,
    pub alternatives: Vec<String>,
    /// `99 - rank` per alternative.
    pub scores: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub rows: Vec<ResultRow>,
    /// Total documents in the sub-indexes that took part.
    pub records_searched: usize,
    pub suggestions: Vec<SuggestionEntry>,
    pub suggested_query: Option<String>,
}

/// Admin listing row for a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRow {
    pub name: String,
    pub language: String,
    pub path: PathBuf,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Bytes on disk.
    pub size: u64,
    pub doc_count: usize,
    pub mode: SearchMode,
    pub embedding: Option<EmbeddingKind>,
    pub ratio: f32,
}

/// Persisted attributes of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    pub path: PathBuf,
    pub language: String,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub embedding: Option<EmbeddingKind>,
    #[serde(default = "default_ratio")]
    pub ratio: f32,
    pub created: DateTime<Utc>,
    #[serde(rename = "lastUpdate")]
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_ratio() -> f32 {
    0.5
}

impl CollectionMeta {
    pub fn settings(&self) -> SearchSettings {
        SearchSettings { mode: self.mode, embedding: self.embedding, ratio: self.ratio }
    }
}

/// Everything a metadata store persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineMeta {
    #[serde(default)]
    pub collections: Vec<CollectionMeta>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub category_trees: std::collections::BTreeMap<String, usize>,
    pub categories: std::collections::BTreeMap<String, usize>,
}
