//! Document extraction and directory walking.
//!
//! `BasicExtractor` covers plain text and HTML-like markup; other formats are
//! decoded lossily as text. `list_files` applies the extension filter used by
//! path indexing.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::error::Result;
use crate::traits::{DocumentExtractor, Extracted};

pub const SUMMARY_SIZE: usize = 200;

const HTML_EXTENSIONS: &[&str] = &["htm", "html", "xhtml", "cfm", "cfml", "dbm", "dbml", "xml"];

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)>").expect("static regex"));
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"));
static META_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<meta\s+[^>]*>").expect("static regex"));
static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)([a-z-]+)\s*=\s*("([^"]*)"|'([^']*)')"#).expect("static regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r\f]+").expect("static regex"));

#[derive(Debug, Default, Clone, Copy)]
pub struct BasicExtractor;

impl BasicExtractor {
    pub fn new() -> Self {
        Self
    }

    fn is_html(mime: Option<&str>, name: &str) -> bool {
        if let Some(m) = mime {
            let m = m.to_ascii_lowercase();
            return m.contains("html") || m.contains("xml");
        }
        extension_of(name).is_some_and(|ext| HTML_EXTENSIONS.contains(&ext.as_str()))
    }

    fn extract_html(text: &str) -> Extracted {
        let title = TITLE_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| decode_entities(m.as_str().trim()))
            .unwrap_or_default();

        let mut out = Extracted { title, mime_type: "text/html".to_string(), ..Extracted::default() };
        for meta in META_RE.find_iter(text) {
            let mut name = String::new();
            let mut content = String::new();
            for attr in ATTR_RE.captures_iter(meta.as_str()) {
                let value = attr.get(3).or_else(|| attr.get(4)).map_or("", |m| m.as_str());
                match attr.get(1).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
                    Some("name") => name = value.to_ascii_lowercase(),
                    Some("content") => content = decode_entities(value),
                    _ => {}
                }
            }
            match name.as_str() {
                "description" => out.summary = content,
                "keywords" => out.keywords = content,
                "author" => out.author = content,
                "custom1" => out.custom[0] = content,
                "custom2" => out.custom[1] = content,
                "custom3" => out.custom[2] = content,
                "custom4" => out.custom[3] = content,
                _ => {}
            }
        }

        let body = SCRIPT_RE.replace_all(text, " ");
        let body = COMMENT_RE.replace_all(&body, " ");
        let body = TITLE_RE.replace_all(&body, " ");
        let body = TAG_RE.replace_all(&body, " ");
        let body = decode_entities(&body);
        out.contents = collapse_whitespace(&body);
        out
    }
}

impl DocumentExtractor for BasicExtractor {
    fn extract(&self, bytes: &[u8], mime: Option<&str>, name: &str) -> Result<Extracted> {
        let text = String::from_utf8_lossy(bytes);
        let mut out = if Self::is_html(mime, name) {
            Self::extract_html(&text)
        } else {
            Extracted { contents: text.into_owned(), mime_type: "text/plain".to_string(), ..Extracted::default() }
        };
        if out.summary.trim().is_empty() {
            out.summary = summary_of(&out.contents);
        }
        Ok(out)
    }
}

/// First `SUMMARY_SIZE` characters of the contents.
pub fn summary_of(contents: &str) -> String {
    match contents.char_indices().nth(SUMMARY_SIZE) {
        Some((idx, _)) => contents[..idx].to_string(),
        None => contents.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = SPACE_RE.replace_all(line.trim(), " ");
        if !line.is_empty() {
            lines.push(line.into_owned());
        }
    }
    lines.join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn extension_of(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let last = last.split(['?', '#']).next().unwrap_or(last);
    last.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Normalise `*.txt`, `.txt` and `txt` to `txt`; blanks are dropped.
pub fn normalize_extensions<I, S>(extensions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|e| e.as_ref().trim().trim_start_matches('*').trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// True when `name` carries one of `extensions`; an empty filter accepts everything.
pub fn matches_extension(name: &str, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    extension_of(name).is_some_and(|ext| extensions.iter().any(|e| *e == ext))
}

/// Files below `root` accepted by the extension filter, sorted.
pub fn list_files(root: &Path, extensions: &[String], recurse: bool) -> Vec<PathBuf> {
    let mut walker = walkdir::WalkDir::new(root).follow_links(true);
    if !recurse {
        walker = walker.max_depth(1);
    }
    let mut files = Vec::new();
    for entry in walker.into_iter() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && matches_extension(&entry.path().to_string_lossy(), extensions) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_fields_are_extracted() {
        let html = r#"<html><head><title>Intro &amp; Setup</title>
            <meta name="description" content="How to start">
            <meta name="author" content='Ann'>
            <style>body { color: red }</style></head>
            <body><h1>Hello</h1><p>quick   brown fox</p><script>var x = 1;</script></body></html>"#;
        let out = BasicExtractor::new().extract(html.as_bytes(), None, "intro.html").unwrap();
        assert_eq!(out.title, "Intro & Setup");
        assert_eq!(out.summary, "How to start");
        assert_eq!(out.author, "Ann");
        assert_eq!(out.mime_type, "text/html");
        assert!(out.contents.contains("quick brown fox"));
        assert!(!out.contents.contains("color"));
        assert!(!out.contents.contains("var x"));
    }

    #[test]
    fn plain_text_gets_a_summary() {
        let long = "word ".repeat(100);
        let out = BasicExtractor::new().extract(long.as_bytes(), None, "a.txt").unwrap();
        assert_eq!(out.mime_type, "text/plain");
        assert_eq!(out.summary.chars().count(), SUMMARY_SIZE);
        assert_eq!(out.contents, long);
    }

    #[test]
    fn extension_filters() {
        let exts = normalize_extensions(["*.TXT", ".md", "html", " "]);
        assert_eq!(exts, vec!["txt", "md", "html"]);
        assert!(matches_extension("/a/b/readme.md", &exts));
        assert!(!matches_extension("/a/b/readme.pdf", &exts));
        assert!(matches_extension("anything", &[]));
        assert!(matches_extension("http://x.org/a.html?x=1", &exts));
    }
}
