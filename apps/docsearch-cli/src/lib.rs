//! Shared plumbing of the docsearch binaries: argument splitting, logging
//! setup and engine construction.
use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use docsearch_core::config::{Config, EngineSettings};
use docsearch_hybrid::Engine;

/// Command line split into positionals and `--name value` options.
/// Flags without a value are stored as `"true"`.
#[derive(Debug, Default)]
pub struct Args {
    pub positional: Vec<String>,
    options: HashMap<String, String>,
}

impl Args {
    pub fn parse<I: IntoIterator<Item = String>>(args: I, flags: &[&str]) -> Result<Self> {
        let mut out = Self::default();
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            let Some(name) = arg.strip_prefix("--") else {
                out.positional.push(arg);
                continue;
            };
            if let Some((name, value)) = name.split_once('=') {
                out.options.insert(name.to_string(), value.to_string());
            } else if flags.contains(&name) {
                out.options.insert(name.to_string(), "true".to_string());
            } else {
                let Some(value) = iter.next() else { bail!("--{name} requires a value") };
                out.options.insert(name.to_string(), value);
            }
        }
        Ok(out)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| v != "false")
    }

    pub fn parsed<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.get(name).map(|v| v.parse::<T>().with_context(|| format!("invalid value for --{name}: {v}"))).transpose()
    }

    /// Comma separated option as a list.
    pub fn list(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn positional(&self, idx: usize, what: &str) -> Result<&str> {
        self.positional.get(idx).map(String::as_str).with_context(|| format!("missing <{what}>"))
    }
}

/// Logs to stderr; `RUST_LOG` overrides the default level.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

/// Settings from `config.toml` and `APP_*`, with `--storage` taking precedence.
pub fn load_settings(args: &Args) -> Result<EngineSettings> {
    let mut settings = Config::load()?.engine_settings()?;
    if let Some(root) = args.get("storage") {
        settings.storage_root = root.into();
    }
    Ok(settings)
}

pub fn open_engine(args: &Args) -> Result<Engine> {
    let settings = load_settings(args)?;
    Engine::open(settings).context("opening the search engine")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Args {
        Args::parse(line.split_whitespace().map(String::from), &["json", "verbose"]).unwrap()
    }

    #[test]
    fn splits_options_and_positionals() {
        let a = args("search kb fox --max 5 --json --categories a,b, --tree=/docs");
        assert_eq!(a.positional, vec!["search", "kb", "fox"]);
        assert_eq!(a.parsed::<usize>("max").unwrap(), Some(5));
        assert!(a.flag("json"));
        assert!(!a.flag("verbose"));
        assert_eq!(a.list("categories"), vec!["a", "b"]);
        assert_eq!(a.get("tree"), Some("/docs"));
        assert_eq!(a.positional(2, "criteria").unwrap(), "fox");
        assert!(a.positional(3, "extra").is_err());
    }

    #[test]
    fn options_need_values() {
        assert!(Args::parse(["--max".to_string()], &[]).is_err());
        assert!(args("--max five").parsed::<usize>("max").is_err());
    }
}
