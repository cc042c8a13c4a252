//! Result link resolution.
//!
//! Stored documents keep the key they were indexed under (a file path or a
//! crawled url). The link shown for a hit is derived from that key and the
//! url prefix of its sub-index.
use url::Url;

use docsearch_core::types::{Document, IndexDescriptor, SourceType};

/// Join `path` below the url prefix `base`. A path that already starts with
/// the prefix is returned as is.
pub fn to_url(base: &str, path: &str) -> String {
	if base.is_empty() {
		return path.to_string();
	}
	if path.is_empty() {
		return base.to_string();
	}
	let base = base.replace('\\', "/");
	let path = path.replace('\\', "/");
	let base = base.strip_suffix('/').unwrap_or(&base);
	let path = path.strip_prefix('/').unwrap_or(&path);
	if path.to_ascii_lowercase().starts_with(&base.to_ascii_lowercase()) {
		return path.to_string();
	}
	format!("{base}/{path}")
}

/// Directory part of a url: `http://h/docs/index.html` gives `http://h/docs/`.
/// A last segment without a dot counts as a directory.
pub fn get_directory(input: &str) -> Result<String, url::ParseError> {
	let parsed = Url::parse(input)?;
	let path = parsed.path();
	let Some(dot) = path.rfind('.') else {
		if path.ends_with('/') {
			return Ok(parsed.to_string());
		}
		let dir = format!("{path}/");
		return Ok(with_path(&parsed, &dir));
	};
	let mut path = path;
	let mut slash = path.rfind('/').unwrap_or(0);
	if slash > dot {
		path = &path[..dot];
		slash = path.rfind('/').unwrap_or(0);
	}
	Ok(with_path(&parsed, &path[..=slash]))
}

fn with_path(url: &Url, path: &str) -> String {
	let mut out = url.clone();
	out.set_query(None);
	out.set_fragment(None);
	out.set_path(path);
	out.to_string()
}

/// Link for a stored document of the given sub-index.
pub fn resolve_url(index: &IndexDescriptor, doc: &Document) -> String {
	match index.source_type {
		SourceType::Path => {
			let root = to_platform_separators(&index.key);
			let file = to_platform_separators(&doc.key);
			to_url(&index.urlpath, &file.replacen(&root, "", 1))
		}
		SourceType::Url => {
			let root = get_directory(&index.key).unwrap_or_else(|_| index.key.clone());
			let prefix = if index.urlpath.is_empty() { root.as_str() } else { index.urlpath.as_str() };
			to_url(prefix, &doc.key.replacen(&root, "", 1))
		}
		SourceType::Custom => doc.url.clone(),
		SourceType::File => to_url(&index.urlpath, &doc.url),
	}
}

fn to_platform_separators(path: &str) -> String {
	if std::path::MAIN_SEPARATOR == '/' {
		path.replace('\\', "/")
	} else {
		path.replace('/', "\\")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use docsearch_core::types::{IndexOptions, Source};

	fn descriptor(source: &Source, urlpath: &str) -> IndexDescriptor {
		let options = IndexOptions { urlpath: urlpath.into(), ..IndexOptions::default() };
		IndexDescriptor::new(source, "english", &options)
	}

	#[test]
	fn joins_prefix_and_path() {
		assert_eq!(to_url("http://example.com/docs/", "/a/b.html"), "http://example.com/docs/a/b.html");
		assert_eq!(to_url("", "/a/b.html"), "/a/b.html");
		assert_eq!(to_url("http://example.com", ""), "http://example.com");
		assert_eq!(to_url("http://example.com", "HTTP://EXAMPLE.COM/x"), "HTTP://EXAMPLE.COM/x");
		assert_eq!(to_url("http://h\\docs", "a\\b.txt"), "http://h/docs/a/b.txt");
	}

	#[test]
	fn directory_of_urls() {
		assert_eq!(get_directory("http://h.com/docs/index.html").unwrap(), "http://h.com/docs/");
		assert_eq!(get_directory("http://h.com/docs").unwrap(), "http://h.com/docs/");
		assert_eq!(get_directory("http://h.com/docs/").unwrap(), "http://h.com/docs/");
		assert_eq!(get_directory("http://h.com:80/a.b/c").unwrap(), "http://h.com/");
		assert_eq!(get_directory("http://h.com").unwrap(), "http://h.com/");
		assert!(get_directory("not a url").is_err());
	}

	#[test]
	fn path_sources_rewrite_the_root() {
		let source = Source::Path { root: "/data/site".into(), extensions: vec![], recurse: true };
		let doc = Document { key: "/data/site/a/b.html".into(), ..Document::default() };
		assert_eq!(resolve_url(&descriptor(&source, "http://example.com/docs"), &doc), "http://example.com/docs/a/b.html");
		assert_eq!(resolve_url(&descriptor(&source, ""), &doc), "/a/b.html");
	}

	#[test]
	fn url_sources_rewrite_the_crawl_directory() {
		let source = Source::Url {
			url: "http://h.com/docs/index.html".into(),
			extensions: vec![],
			recurse: true,
			timeout: std::time::Duration::from_secs(1),
		};
		let doc = Document { key: "http://h.com/docs/guide/start.html".into(), ..Document::default() };
		assert_eq!(resolve_url(&descriptor(&source, ""), &doc), "http://h.com/docs/guide/start.html");
		assert_eq!(resolve_url(&descriptor(&source, "https://mirror.org"), &doc), "https://mirror.org/guide/start.html");
	}

	#[test]
	fn custom_and_file_sources() {
		let custom = Source::Custom { query: "products".into() };
		let doc = Document { key: "k1".into(), url: "/p/1".into(), ..Document::default() };
		assert_eq!(resolve_url(&descriptor(&custom, "http://ignored"), &doc), "/p/1");

		let file = Source::File { path: "/data/intro.txt".into() };
		let doc = Document { key: "/data/intro.txt".into(), url: "intro.txt".into(), ..Document::default() };
		assert_eq!(resolve_url(&descriptor(&file, "http://h.com/files/"), &doc), "http://h.com/files/intro.txt");
	}
}
