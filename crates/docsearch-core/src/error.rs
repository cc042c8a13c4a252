use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error taxonomy shared by every docsearch crate.
///
/// Substrate failures (io, tantivy, lancedb, json) are wrapped into
/// `Storage` or `Resource` with a short context string so the original
/// cause stays reachable through `source()`.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid mode, ratio, language or option. Raised before any mutation.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A file, directory or url the caller asked to index is not available.
    #[error("Resource not available: {what}")]
    Resource {
        what: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Timed out after {waited:?} waiting for lock on {}", .name.display())]
    LockTimeout { name: PathBuf, waited: Duration },

    #[error("Invalid search criteria: {0}")]
    QuerySyntax(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("{context}")]
    Storage {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Embedding failed: {0}")]
    Embedding(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn resource(what: impl Into<String>) -> Self {
        Self::Resource { what: what.into(), source: None }
    }

    pub fn resource_with<E>(what: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Resource { what: what.into(), source: Some(Box::new(source)) }
    }

    pub fn storage<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage { context: context.into(), source: Box::new(source) }
    }
}

/// Attach a context string to substrate errors while converting them.
pub trait ResultExt<T> {
    fn storage_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn storage_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T> {
        self.map_err(|e| Error::storage(context(), e))
    }
}
