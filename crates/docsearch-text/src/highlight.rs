//! Match highlighting for context passages.
//!
//! Keyword searches highlight the analyzed tokens the query would match.
//! Vector-only searches have no keyword query, so they highlight the
//! significant words of the raw criteria instead.

use std::collections::HashSet;

use regex::Regex;

use docsearch_core::error::{Error, Result};

use crate::analyzer::AnalyzerRegistry;
use crate::query::{wildcard_pattern, Expression, LiteralKind};

const FUZZY_DISTANCE: usize = 2;
const TOKEN_WEIGHT: f32 = 1.0;

/// Words ignored when picking keywords out of vector criteria.
const KEYWORD_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "is", "in", "on", "at", "to", "for", "with", "by", "about", "as", "of",
    "this", "that",
];

/// Wraps highlighted spans in the caller's tags.
///
/// When the tags are a matching html pair (`<b>`/`</b>`, any case) the
/// opening tag also carries the match score.
#[derive(Debug, Clone)]
pub struct Formatter {
    pre: String,
    post: String,
    element: Option<String>,
}

impl Formatter {
    pub fn new(pre: &str, post: &str) -> Self {
        Self { pre: pre.to_string(), post: post.to_string(), element: html_element(pre, post) }
    }

    fn open(&self, score: f32) -> String {
        match &self.element {
            Some(name) => format!("<{name} score=\"{score:?}\">"),
            None => self.pre.clone(),
        }
    }

    /// `spans` are sorted, non-overlapping byte ranges of `text`.
    pub fn format(&self, text: &str, spans: &[(usize, usize)], score: f32) -> String {
        let mut out = String::with_capacity(text.len() + spans.len() * (self.pre.len() + self.post.len() + 16));
        let mut cursor = 0;
        for &(from, to) in spans {
            if from < cursor || to > text.len() {
                continue;
            }
            out.push_str(&text[cursor..from]);
            out.push_str(&self.open(score));
            out.push_str(&text[from..to]);
            out.push_str(&self.post);
            cursor = to;
        }
        out.push_str(&text[cursor..]);
        out
    }
}

fn html_element(pre: &str, post: &str) -> Option<String> {
    let name = pre.strip_prefix('<')?.strip_suffix('>')?;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    post.eq_ignore_ascii_case(&format!("</{name}>")).then(|| name.to_string())
}

/// Scores a chunk of text and renders it with highlights.
pub trait Highlighter {
    fn highlight(&self, text: &str, formatter: &Formatter) -> Result<(f32, String)>;
}

/// Decides whether an analyzed token is hit by the query.
#[derive(Debug, Default)]
pub struct TermMatcher {
    exact: HashSet<String>,
    prefixes: Vec<String>,
    patterns: Vec<Regex>,
    fuzzy: Vec<String>,
}

impl TermMatcher {
    /// Built from the literals outside any `not`.
    pub fn from_expression(analyzers: &AnalyzerRegistry, language: &str, expr: &Expression) -> Result<Self> {
        let mut matcher = Self::default();
        for lit in expr.positive_literals() {
            match lit.kind() {
                LiteralKind::Term | LiteralKind::Phrase => matcher.exact.extend(analyzers.terms(language, lit.text())?),
                LiteralKind::Prefix => matcher.prefixes.push(lit.text().to_string()),
                LiteralKind::Wildcard => {
                    let pattern = format!("^(?:{})$", wildcard_pattern(lit.text()));
                    let re = Regex::new(&pattern).map_err(|e| Error::QuerySyntax(format!("invalid pattern [{pattern}]: {e}")))?;
                    matcher.patterns.push(re);
                }
                LiteralKind::Fuzzy => matcher.fuzzy.push(lit.text().to_string()),
            }
        }
        Ok(matcher)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty() && self.patterns.is_empty() && self.fuzzy.is_empty()
    }

    pub fn matches(&self, token: &str) -> bool {
        self.exact.contains(token)
            || self.prefixes.iter().any(|p| token.starts_with(p.as_str()))
            || self.patterns.iter().any(|re| re.is_match(token))
            || self.fuzzy.iter().any(|f| strsim::levenshtein(f, token) <= FUZZY_DISTANCE)
    }
}

/// Highlights the tokens a keyword query matches.
pub struct QueryHighlighter<'a> {
    analyzers: &'a AnalyzerRegistry,
    language: &'a str,
    matcher: TermMatcher,
}

impl<'a> QueryHighlighter<'a> {
    pub fn new(analyzers: &'a AnalyzerRegistry, language: &'a str, expr: &Expression) -> Result<Self> {
        let matcher = TermMatcher::from_expression(analyzers, language, expr)?;
        Ok(Self { analyzers, language, matcher })
    }
}

impl Highlighter for QueryHighlighter<'_> {
    fn highlight(&self, text: &str, formatter: &Formatter) -> Result<(f32, String)> {
        if self.matcher.is_empty() {
            return Ok((0.0, text.to_string()));
        }
        let spans: Vec<(usize, usize)> = self
            .analyzers
            .analyze(self.language, text)?
            .into_iter()
            .filter(|t| self.matcher.matches(&t.text))
            .map(|t| (t.offset_from, t.offset_to))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let score = spans.len() as f32 * TOKEN_WEIGHT;
        Ok((score, formatter.format(text, &spans, TOKEN_WEIGHT)))
    }
}

/// Highlights significant criteria words, case-insensitively.
#[derive(Debug)]
pub struct KeywordHighlighter {
    pattern: Option<Regex>,
}

impl KeywordHighlighter {
    pub fn new(criteria: &str) -> Self {
        let mut words = significant_keywords(criteria);
        words.sort_by_key(|w| std::cmp::Reverse(w.len()));
        let pattern = if words.is_empty() {
            None
        } else {
            let alternatives: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
            Regex::new(&format!("(?i)(?:{})", alternatives.join("|"))).ok()
        };
        Self { pattern }
    }
}

impl Highlighter for KeywordHighlighter {
    fn highlight(&self, text: &str, formatter: &Formatter) -> Result<(f32, String)> {
        let Some(pattern) = &self.pattern else {
            return Ok((0.0, text.to_string()));
        };
        let spans: Vec<(usize, usize)> = pattern.find_iter(text).map(|m| (m.start(), m.end())).collect();
        #[allow(clippy::cast_precision_loss)]
        let score = spans.len() as f32;
        Ok((score, formatter.format(text, &spans, TOKEN_WEIGHT)))
    }
}

/// Lowercased criteria words longer than two characters that are not stop words.
pub fn significant_keywords(criteria: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    criteria
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 2 && !KEYWORD_STOP_WORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;

    #[test]
    fn html_pairs_carry_scores() {
        let f = Formatter::new("<B>", "</b>");
        assert_eq!(f.format("a fox", &[(2, 5)], 1.0), "a <B score=\"1.0\">fox</b>");
        let plain = Formatter::new("[", "]");
        assert_eq!(plain.format("a fox", &[(2, 5)], 1.0), "a [fox]");
        let mismatched = Formatter::new("<b>", "</i>");
        assert_eq!(mismatched.format("fox", &[(0, 3)], 1.0), "<b>fox</i>");
    }

    #[test]
    fn query_highlighting_scores_matches() {
        let registry = AnalyzerRegistry::new();
        let expr = parse("fox or jump* and not dog").unwrap();
        let hl = QueryHighlighter::new(&registry, "english", &expr).unwrap();
        let (score, text) = hl.highlight("The Fox jumped over the dog", &Formatter::new("[", "]")).unwrap();
        assert!((score - 2.0).abs() < f32::EPSILON);
        assert_eq!(text, "The [Fox] [jumped] over the dog");
    }

    #[test]
    fn fuzzy_and_wildcard_terms_match() {
        let registry = AnalyzerRegistry::new();
        let expr = parse("foz~ or d?g").unwrap();
        let matcher = TermMatcher::from_expression(&registry, "english", &expr).unwrap();
        assert!(matcher.matches("fox"));
        assert!(matcher.matches("dog"));
        assert!(!matcher.matches("doug"));
    }

    #[test]
    fn vector_keywords_skip_short_and_stop_words() {
        assert_eq!(significant_keywords("The Fox is in a DEN of foxes"), vec!["fox", "den", "foxes"]);
        let hl = KeywordHighlighter::new("the fox");
        let (score, text) = hl.highlight("A FOX and a fox", &Formatter::new("<b>", "</b>")).unwrap();
        assert!((score - 2.0).abs() < f32::EPSILON);
        assert_eq!(text, "A <b score=\"1.0\">FOX</b> and a <b score=\"1.0\">fox</b>");
    }
}
