use anyhow::{bail, Result};

use docsearch_cli::{init_logging, open_engine, Args};
use docsearch_core::types::{SearchRequest, SearchResults, SourceType};
use docsearch_hybrid::NewCollection;

const USAGE: &str = "Usage: docsearch <command> [args...] [--storage DIR] [--verbose]

  create <name> <path> [--language L] [--mode keyword|vector|hybrid] [--embedding tfidf|word2vec] [--ratio R]
  search <name> <criteria> [--start N] [--max N] [--tree /a/b] [--categories a,b] [--suggest N] [--json]
  list
  indexes <name>
  categories <name>
  delete-index <name> <file|path|url|custom> <key>
  purge <name>
  optimize <name>
  repair <name>
  delete <name>";

fn main() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1), &["json", "verbose"])?;
    init_logging(args.flag("verbose"));
    let Some(command) = args.positional.first() else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };
    let engine = open_engine(&args)?;

    match command.as_str() {
        "create" => {
            let new = NewCollection::new(args.positional(1, "name")?, args.positional(2, "path")?)
                .language(args.get("language").unwrap_or_default())
                .mode(
                    args.get("mode").unwrap_or_default(),
                    args.get("embedding").unwrap_or_default(),
                    args.parsed("ratio")?.unwrap_or(0.5),
                );
            let collection = engine.create_collection(&new)?;
            println!("created {} at {}", collection.name(), collection.dir().display());
        }
        "search" => {
            let name = args.positional(1, "name")?;
            let mut request = SearchRequest::new(args.positional.get(2..).unwrap_or_default().join(" "))
                .window(args.parsed("start")?.unwrap_or(1), args.parsed("max")?.unwrap_or(10))
                .category_tree(args.get("tree").unwrap_or_default())
                .categories(args.list("categories"));
            if let Some(budget) = args.parsed("suggest")? {
                request = request.suggestions(budget);
            }
            let results = engine.search(name, &request)?;
            if args.flag("json") {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&request.criteria, &results);
            }
        }
        "list" => {
            for row in engine.list_collections()? {
                println!(
                    "{:<20} {:<10} {:>6} docs {:>10} bytes  {} {}  {}",
                    row.name,
                    row.language,
                    row.doc_count,
                    row.size,
                    row.mode,
                    row.embedding.map(|e| e.to_string()).unwrap_or_default(),
                    row.path.display()
                );
            }
        }
        "indexes" => {
            for index in engine.list_indexes(args.positional(1, "name")?)? {
                println!("{:<28} {:<7} {}  {}", index.id, index.source_type.as_str(), index.key, index.category_tree);
            }
        }
        "categories" => {
            let info = engine.category_info(args.positional(1, "name")?)?;
            for (tree, count) in &info.category_trees {
                println!("tree {tree}: {count}");
            }
            for (tag, count) in &info.categories {
                println!("category {tag}: {count}");
            }
        }
        "delete-index" => {
            let source_type = SourceType::parse(args.positional(2, "type")?)?;
            let result = engine.delete_index(args.positional(1, "name")?, source_type, args.positional(3, "key")?)?;
            println!("deleted {}", result.deleted);
        }
        "purge" => println!("deleted {}", engine.purge(args.positional(1, "name")?)?.deleted),
        "optimize" => engine.optimize(args.positional(1, "name")?)?,
        "repair" => {
            for id in engine.repair(args.positional(1, "name")?)? {
                println!("dropped {id}");
            }
        }
        "delete" => println!("deleted {}", engine.delete(args.positional(1, "name")?)?.deleted),
        other => bail!("unknown command [{other}]\n{USAGE}"),
    }
    Ok(())
}

fn print_results(criteria: &str, results: &SearchResults) {
    println!("{} results for \"{criteria}\" ({} records searched)", results.rows.len(), results.records_searched);
    for (i, row) in results.rows.iter().enumerate() {
        println!("\n  {}. score={:.4}  {}", i + 1, row.score, row.title);
        println!("     {}", row.url);
        if !row.context.rendered().is_empty() {
            println!("     {}", row.context.rendered().replace('\n', "\n     "));
        }
    }
    if let Some(suggested) = &results.suggested_query {
        println!("\nDid you mean: {suggested}");
    }
}
