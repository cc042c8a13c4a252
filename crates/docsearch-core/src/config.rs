//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`APP_ENGINE__LOCK_TIMEOUT_SECS=30` sets `engine.lock_timeout_secs`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Built-in defaults only.
    pub fn defaults() -> Self {
        Self::from_figment(Figment::from(Serialized::defaults(ConfigFile::default())))
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::config(format!("Failed to get '{key}': {e}")))
    }

    /// The `engine` table, with defaults for whatever is missing.
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let figment = Figment::from(Serialized::defaults(ConfigFile::default())).merge(self.figment.clone());
        let file: ConfigFile = figment
            .extract()
            .map_err(|e| Error::config(format!("Failed to read engine settings: {e}")))?;
        file.engine.validate()?;
        Ok(file.engine)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    engine: EngineSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub storage_root: PathBuf,
    pub lock_timeout_secs: u64,
    pub writer_heap_bytes: usize,
    pub crawl_timeout_ms: u64,
    pub spell_suggestions: usize,
    pub tfidf: TfIdfSettings,
    pub word2vec: Word2VecSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./searchdata"),
            lock_timeout_secs: 600,
            writer_heap_bytes: 50_000_000,
            crawl_timeout_ms: 50_000,
            spell_suggestions: 5,
            tfidf: TfIdfSettings::default(),
            word2vec: Word2VecSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn crawl_timeout(&self) -> Duration {
        Duration::from_millis(self.crawl_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        // tantivy refuses writer budgets below 15MB
        if self.writer_heap_bytes < 15_000_000 {
            return Err(Error::config(format!(
                "writer_heap_bytes must be at least 15000000, got {}",
                self.writer_heap_bytes
            )));
        }
        if self.tfidf.dimension == 0 {
            return Err(Error::config("tfidf.dimension must be greater than 0"));
        }
        let charset = self.word2vec.charset.to_ascii_lowercase();
        if charset != "utf-8" && charset != "utf8" {
            return Err(Error::config(format!("unsupported word2vec charset [{}]", self.word2vec.charset)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfIdfSettings {
    /// Vocabulary file or corpus directory.
    pub path: Option<PathBuf>,
    pub dimension: usize,
}

impl Default for TfIdfSettings {
    fn default() -> Self {
        Self { path: None, dimension: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Word2VecSettings {
    pub vectors_file: Option<PathBuf>,
    /// Scanned for the largest `*.txt` when `vectors_file` is unset.
    pub dir: Option<PathBuf>,
    pub charset: String,
}

impl Default for Word2VecSettings {
    fn default() -> Self {
        Self { vectors_file: None, dir: None, charset: "utf-8".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Toml;

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let settings = Config::defaults().engine_settings().unwrap();
        assert_eq!(settings.lock_timeout(), Duration::from_secs(600));
        assert_eq!(settings.tfidf.dimension, 500);
        assert_eq!(settings.crawl_timeout_ms, 50_000);
    }

    #[test]
    fn toml_overrides_single_keys() {
        let figment = Figment::new().merge(Toml::string(
            "[engine]\nlock_timeout_secs = 5\n[engine.tfidf]\ndimension = 64\n",
        ));
        let settings = Config::from_figment(figment).engine_settings().unwrap();
        assert_eq!(settings.lock_timeout_secs, 5);
        assert_eq!(settings.tfidf.dimension, 64);
        assert_eq!(settings.writer_heap_bytes, 50_000_000);
    }

    #[test]
    fn rejects_tiny_writer_budget() {
        let figment = Figment::new().merge(Toml::string("[engine]\nwriter_heap_bytes = 1000\n"));
        assert!(Config::from_figment(figment).engine_settings().is_err());
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let base = Path::new("/base");
        assert_eq!(resolve_with_base(base, "rel/dir"), PathBuf::from("/base/rel/dir"));
        assert_eq!(resolve_with_base(base, "/abs"), PathBuf::from("/abs"));
    }
}
