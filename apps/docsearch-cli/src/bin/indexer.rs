use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

use docsearch_cli::{init_logging, open_engine, Args};
use docsearch_core::types::{IndexOptions, IndexResult, SourceType};

const USAGE: &str = "Usage: docsearch-indexer <collection> <file|path|url> <key> [options]

  --ext a,b            extensions to pick up (path and url)
  --no-recurse         stay in the top directory / on the start page
  --timeout-ms N       crawl timeout for url sources
  --title T  --urlpath U  --tree /a/b  --categories a,b  --language L
  --storage DIR  --verbose";

fn main() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1), &["no-recurse", "verbose"])?;
    init_logging(args.flag("verbose"));
    if args.positional.len() < 3 {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let name = args.positional(0, "collection")?;
    let source_type = SourceType::parse(args.positional(1, "type")?)?;
    let key = args.positional(2, "key")?;
    let extensions = args.list("ext");
    let recurse = !args.flag("no-recurse");
    let options = IndexOptions {
        title: args.get("title").unwrap_or_default().to_string(),
        urlpath: args.get("urlpath").unwrap_or_default().to_string(),
        category_tree: args.get("tree").unwrap_or_default().to_string(),
        categories: args.list("categories"),
        language: args.get("language").map(String::from),
        ..IndexOptions::default()
    };

    let engine = open_engine(&args)?;
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    progress.set_message(format!("indexing {} {key} into {name}", source_type.as_str()));
    progress.enable_steady_tick(Duration::from_millis(120));

    let started = Instant::now();
    let result = match source_type {
        SourceType::File => engine.index_file(name, Path::new(key), &options),
        SourceType::Path => engine.index_path(name, Path::new(key), &extensions, recurse, &options),
        SourceType::Url => {
            let timeout = args.parsed::<u64>("timeout-ms")?.map(Duration::from_millis);
            engine.index_url(name, key, &extensions, recurse, timeout, &options)
        }
        SourceType::Custom => {
            progress.finish_and_clear();
            bail!("custom sources are indexed through the library API");
        }
    };
    progress.finish_and_clear();
    let IndexResult { inserted, deleted, unchanged } = result?;
    println!(
        "indexed {key} into {name} in {:.1}s: {inserted} inserted, {deleted} deleted, {unchanged} unchanged",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
