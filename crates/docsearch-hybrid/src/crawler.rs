//! Same-host web crawler on reqwest.
//!
//! Pages are fetched level by level: the start page first, then every new
//! link it holds, and so on up to the depth limit. The pages of one level are
//! fetched concurrently and the level as a whole gets the per-call timeout;
//! whatever has not arrived by then is logged and left out.
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;
use tokio::runtime::Runtime;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use url::Url;

use docsearch_core::error::{Error, Result};
use docsearch_core::extract::{matches_extension, normalize_extensions};
use docsearch_core::traits::{CrawlRequest, CrawledPage, Crawler};

pub const DEFAULT_EXTENSIONS: &[&str] = &["cfm", "cfml", "htm", "html", "dbm", "dbml"];
pub const DEFAULT_MAX_DEPTH: usize = 5;

const USER_AGENT: &str = concat!("docsearch/", env!("CARGO_PKG_VERSION"));

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"(?is)<(?:a|area|frame|iframe)\b[^>]*?\b(?:href|src)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
		.expect("static regex")
});

pub struct WebCrawler {
	client: reqwest::Client,
	runtime: Arc<Runtime>,
	max_depth: usize,
}

impl WebCrawler {
	pub fn new(runtime: Arc<Runtime>) -> Result<Self> {
		let client = reqwest::Client::builder()
			.user_agent(USER_AGENT)
			.build()
			.map_err(|e| Error::resource_with("building http client", e))?;
		Ok(Self::with_client(client, runtime))
	}

	pub fn with_client(client: reqwest::Client, runtime: Arc<Runtime>) -> Self {
		Self { client, runtime, max_depth: DEFAULT_MAX_DEPTH }
	}

	#[must_use]
	pub fn max_depth(mut self, depth: usize) -> Self {
		self.max_depth = depth;
		self
	}

	async fn crawl_from(&self, start: Url, extensions: &[String], recurse: bool, timeout: Duration) -> Result<Vec<CrawledPage>> {
		let first = fetch(&self.client, start.clone(), timeout)
			.await
			.map_err(|e| Error::Resource { what: format!("url [{start}] is not available"), source: Some(e) })?;
		let mut visited: HashSet<String> = HashSet::from([visit_key(&start)]);
		let mut pages = vec![first];
		if !recurse {
			return Ok(pages);
		}

		let mut level = 0;
		let mut frontier = 0..pages.len();
		while level < self.max_depth && !frontier.is_empty() {
			let mut children = Vec::new();
			for page in &pages[frontier.clone()] {
				let Ok(base) = Url::parse(&page.url) else { continue };
				let html = String::from_utf8_lossy(&page.body);
				for link in extract_links(&html, &base) {
					if is_crawlable(&link, &start, extensions) && visited.insert(visit_key(&link)) {
						children.push(link);
					}
				}
			}
			if children.is_empty() {
				break;
			}
			debug!(level, links = children.len(), "fetching linked pages");
			let deadline = Instant::now() + timeout;
			let fetches = children.into_iter().map(|link| async move {
				let outcome = timeout_at(deadline, fetch(&self.client, link.clone(), timeout)).await;
				(link, outcome)
			});
			let before = pages.len();
			for (link, outcome) in join_all(fetches).await {
				match outcome {
					Ok(Ok(page)) => pages.push(page),
					Ok(Err(e)) => warn!(url = %link, error = %e, "skipping page"),
					Err(_) => warn!(url = %link, ?timeout, "page fetch timed out"),
				}
			}
			frontier = before..pages.len();
			level += 1;
		}
		info!(url = %start, pages = pages.len(), "crawl finished");
		Ok(pages)
	}
}

impl Crawler for WebCrawler {
	fn crawl(&self, request: &CrawlRequest) -> Result<Vec<CrawledPage>> {
		let start = Url::parse(&request.url).map_err(|e| Error::resource_with(format!("invalid url [{}]", request.url), e))?;
		if !matches!(start.scheme(), "http" | "https") {
			return Err(Error::resource(format!("unsupported scheme [{}] in url [{}]", start.scheme(), request.url)));
		}
		let mut extensions = normalize_extensions(&request.extensions);
		if extensions.is_empty() {
			extensions = normalize_extensions(DEFAULT_EXTENSIONS);
		}
		self.runtime.block_on(self.crawl_from(start, &extensions, request.recurse, request.timeout))
	}
}

async fn fetch(
	client: &reqwest::Client,
	url: Url,
	timeout: Duration,
) -> std::result::Result<CrawledPage, Box<dyn std::error::Error + Send + Sync>> {
	let response = client.get(url.clone()).timeout(timeout).send().await?.error_for_status()?;
	let content_type = response
		.headers()
		.get(reqwest::header::CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.map(ToString::to_string);
	let body = response.bytes().await?.to_vec();
	Ok(CrawledPage { url: url.to_string(), content_type, body })
}

/// Absolute targets of the links in `html`, fragments removed.
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
	HREF_RE
		.captures_iter(html)
		.filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
		.map(|m| m.as_str().trim())
		.filter(|href| !href.is_empty() && !href.starts_with('#'))
		.filter_map(|href| base.join(href).ok())
		.map(|mut url| {
			url.set_fragment(None);
			url
		})
		.collect()
}

/// http(s), same host as the start page and an allowed extension.
/// A last path segment without an extension is always allowed.
pub fn is_crawlable(link: &Url, start: &Url, extensions: &[String]) -> bool {
	if !matches!(link.scheme(), "http" | "https") {
		return false;
	}
	let same_host = match (link.host_str(), start.host_str()) {
		(Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
		_ => false,
	};
	if !same_host {
		return false;
	}
	let last = link.path().rsplit('/').next().unwrap_or("");
	!last.contains('.') || matches_extension(last, extensions)
}

fn visit_key(url: &Url) -> String {
	let mut key = url.clone();
	key.set_fragment(None);
	key.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn url(s: &str) -> Url {
		Url::parse(s).unwrap()
	}

	fn defaults() -> Vec<String> {
		normalize_extensions(DEFAULT_EXTENSIONS)
	}

	#[test]
	fn links_are_resolved_against_the_page() {
		let html = r#"<a href="guide.html">Guide</a> <A HREF='/about/'>About</A>
			<a class="x" href=contact.cfm>Contact</a> <a href="#top">Top</a> <a href="b.html#s2">B</a>"#;
		let links: Vec<String> = extract_links(html, &url("http://h.com/docs/index.html")).iter().map(ToString::to_string).collect();
		assert_eq!(links, vec![
			"http://h.com/docs/guide.html",
			"http://h.com/about/",
			"http://h.com/docs/contact.cfm",
			"http://h.com/docs/b.html",
		]);
	}

	#[test]
	fn only_same_host_pages_with_allowed_extensions() {
		let start = url("http://Docs.Example.com/");
		assert!(is_crawlable(&url("http://docs.example.com/a.html"), &start, &defaults()));
		assert!(is_crawlable(&url("https://docs.example.com/guide/"), &start, &defaults()));
		assert!(is_crawlable(&url("http://docs.example.com/guide"), &start, &defaults()));
		assert!(!is_crawlable(&url("http://docs.example.com/logo.png"), &start, &defaults()));
		assert!(!is_crawlable(&url("http://other.com/a.html"), &start, &defaults()));
		assert!(!is_crawlable(&url("mailto:someone@docs.example.com"), &start, &defaults()));
	}

	#[test]
	fn unsupported_schemes_are_resource_errors() {
		let runtime = Arc::new(tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap());
		let crawler = WebCrawler::new(runtime).unwrap();
		let request = CrawlRequest { url: "ftp://h.com/a.txt".into(), extensions: vec![], recurse: false, timeout: Duration::from_secs(1) };
		assert!(matches!(crawler.crawl(&request), Err(Error::Resource { .. })));
		let request = CrawlRequest { url: "::nope".into(), ..request };
		assert!(matches!(crawler.crawl(&request), Err(Error::Resource { .. })));
	}
}
