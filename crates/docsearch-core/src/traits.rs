use std::time::Duration;

use crate::error::Result;
use crate::types::EngineMeta;

/// Turns text into a fixed-length vector.
///
/// Implementations must accept empty input and never return NaN or infinite
/// components.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    fn generate(&self, text: &str) -> Vec<f32>;

    fn generate_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.generate(t)).collect()
    }
}

/// Alternative spellings for a term, best first.
pub trait SpellCorrector: Send + Sync {
    fn exists(&self, term: &str) -> bool;
    fn suggest(&self, term: &str, max: usize) -> Vec<String>;
}

/// Plain text and metadata pulled out of a raw resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub contents: String,
    pub title: String,
    pub summary: String,
    pub keywords: String,
    pub author: String,
    pub mime_type: String,
    pub custom: [String; 4],
}

pub trait DocumentExtractor: Send + Sync {
    /// `name` is a file name or url used to sniff the type when `mime` is absent.
    fn extract(&self, bytes: &[u8], mime: Option<&str>, name: &str) -> Result<Extracted>;
}

/// Loads and saves the registry of collections and their sub-indexes.
pub trait MetadataStore: Send + Sync {
    fn load(&self) -> Result<Option<EngineMeta>>;
    fn save(&self, meta: &EngineMeta) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub url: String,
    pub extensions: Vec<String>,
    pub recurse: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrawledPage {
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Fetches a page and, when asked to recurse, the same-host pages it links to.
pub trait Crawler: Send + Sync {
    fn crawl(&self, request: &CrawlRequest) -> Result<Vec<CrawledPage>>;
}
