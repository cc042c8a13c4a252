//! Per-language text analyzers.
//!
//! Analyzers are built lazily, once per language, and shared through an
//! explicit `AnalyzerRegistry` handed to whoever needs tokenization. The same
//! analyzer is registered on every tantivy index of a collection so indexing,
//! query building and passage highlighting agree on tokens.

use std::collections::HashMap;

use parking_lot::RwLock;
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter, TextAnalyzer, Token,
    TokenStream,
};
use tantivy::Index;

use docsearch_core::error::{Error, Result};

pub const DEFAULT_LANGUAGE: &str = "english";

/// Stop words of the classic english standard analyzer.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it", "no", "not", "of",
    "on", "or", "such", "that", "the", "their", "then", "there", "these", "they", "this", "to", "was", "will", "with",
];

const MAX_TOKEN_LEN: usize = 40;

const ALIASES: &[(&str, &str)] = &[
    ("en", "english"),
    ("de", "german"),
    ("fr", "french"),
    ("it", "italian"),
    ("es", "spanish"),
    ("pt", "portuguese"),
    ("nl", "dutch"),
    ("da", "danish"),
    ("sv", "swedish"),
    ("no", "norwegian"),
    ("nb", "norwegian"),
    ("fi", "finnish"),
    ("ru", "russian"),
    ("hu", "hungarian"),
    ("ro", "romanian"),
    ("tr", "turkish"),
    ("el", "greek"),
    ("ar", "arabic"),
    ("ta", "tamil"),
    ("zh", "chinese"),
    ("ja", "japanese"),
    ("ko", "korean"),
    ("th", "thai"),
    ("cs", "czech"),
    ("bg", "bulgarian"),
];

enum Flavor {
    Standard,
    Stemmed(Language),
    Plain,
}

fn flavor(language: &str) -> Option<Flavor> {
    let stemmed = match language {
        "english" => return Some(Flavor::Standard),
        "bulgarian" | "chinese" | "czech" | "japanese" | "korean" | "thai" => return Some(Flavor::Plain),
        "arabic" => Language::Arabic,
        "danish" => Language::Danish,
        "dutch" => Language::Dutch,
        "finnish" => Language::Finnish,
        "french" => Language::French,
        "german" => Language::German,
        "greek" => Language::Greek,
        "hungarian" => Language::Hungarian,
        "italian" => Language::Italian,
        "norwegian" => Language::Norwegian,
        "portuguese" | "brazilian" => Language::Portuguese,
        "romanian" => Language::Romanian,
        "russian" => Language::Russian,
        "spanish" => Language::Spanish,
        "swedish" => Language::Swedish,
        "tamil" => Language::Tamil,
        "turkish" => Language::Turkish,
        _ => return None,
    };
    Some(Flavor::Stemmed(stemmed))
}

/// Trim, lowercase and resolve aliases; fails for languages without an analyzer.
pub fn normalize_language(input: &str) -> Result<String> {
    let lower = input.trim().to_lowercase();
    if lower.is_empty() {
        return Ok(DEFAULT_LANGUAGE.to_string());
    }
    let name = ALIASES.iter().find(|(alias, _)| *alias == lower).map_or(lower.as_str(), |(_, name)| *name);
    if flavor(name).is_none() {
        return Err(Error::config(format!("no language analyzer available for [{input}]")));
    }
    Ok(name.to_string())
}

/// Name under which a language's analyzer is registered on an index.
pub fn tokenizer_name(language: &str) -> String {
    format!("docsearch_{language}")
}

fn build(language: &str) -> Result<TextAnalyzer> {
    let flavor = flavor(language).ok_or_else(|| Error::config(format!("no language analyzer available for [{language}]")))?;
    let analyzer = match flavor {
        Flavor::Standard => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .filter(StopWordFilter::remove(ENGLISH_STOP_WORDS.iter().map(|s| (*s).to_string())))
            .build(),
        Flavor::Stemmed(lang) => match StopWordFilter::new(lang) {
            Some(stop_words) => TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
                .filter(LowerCaser)
                .filter(stop_words)
                .filter(Stemmer::new(lang))
                .build(),
            None => TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
                .filter(LowerCaser)
                .filter(Stemmer::new(lang))
                .build(),
        },
        Flavor::Plain => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .build(),
    };
    Ok(analyzer)
}

/// A token with its byte span in the analyzed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedToken {
    pub text: String,
    pub offset_from: usize,
    pub offset_to: usize,
    pub position: usize,
}

#[derive(Default)]
pub struct AnalyzerRegistry {
    analyzers: RwLock<HashMap<String, TextAnalyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzer for an already normalized language name.
    pub fn get(&self, language: &str) -> Result<TextAnalyzer> {
        if let Some(found) = self.analyzers.read().get(language) {
            return Ok(found.clone());
        }
        let mut analyzers = self.analyzers.write();
        if let Some(found) = analyzers.get(language) {
            return Ok(found.clone());
        }
        let analyzer = build(language)?;
        analyzers.insert(language.to_string(), analyzer.clone());
        Ok(analyzer)
    }

    pub fn register(&self, index: &Index, language: &str) -> Result<()> {
        let analyzer = self.get(language)?;
        index.tokenizers().register(&tokenizer_name(language), analyzer);
        Ok(())
    }

    pub fn analyze(&self, language: &str, text: &str) -> Result<Vec<AnalyzedToken>> {
        let mut analyzer = self.get(language)?;
        let mut tokens = Vec::new();
        let mut stream = analyzer.token_stream(text);
        stream.process(&mut |t: &Token| {
            tokens.push(AnalyzedToken {
                text: t.text.clone(),
                offset_from: t.offset_from,
                offset_to: t.offset_to,
                position: t.position,
            });
        });
        Ok(tokens)
    }

    /// Token texts only.
    pub fn terms(&self, language: &str, text: &str) -> Result<Vec<String>> {
        Ok(self.analyze(language, text)?.into_iter().map(|t| t.text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_names_are_normalized() {
        assert_eq!(normalize_language("").unwrap(), "english");
        assert_eq!(normalize_language(" English ").unwrap(), "english");
        assert_eq!(normalize_language("de").unwrap(), "german");
        assert_eq!(normalize_language("brazilian").unwrap(), "brazilian");
        assert!(normalize_language("klingon").is_err());
    }

    #[test]
    fn english_drops_stop_words_without_stemming() {
        let registry = AnalyzerRegistry::new();
        let tokens = registry.analyze("english", "The Quick foxes, and the dog").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["quick", "foxes", "dog"]);
        assert_eq!(tokens[0].offset_from, 4);
        assert_eq!(tokens[0].offset_to, 9);
    }

    #[test]
    fn stemmed_languages_stem() {
        let registry = AnalyzerRegistry::new();
        let texts = registry.terms("german", "Häuser").unwrap();
        assert_eq!(texts.len(), 1);
        assert_ne!(texts[0], "häuser");
    }

    #[test]
    fn analyzers_are_memoized() {
        let registry = AnalyzerRegistry::new();
        registry.get("english").unwrap();
        registry.get("english").unwrap();
        assert_eq!(registry.analyzers.read().len(), 1);
    }
}
