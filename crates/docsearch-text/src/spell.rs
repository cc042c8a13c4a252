use std::collections::HashSet;

use docsearch_core::traits::SpellCorrector;

const MIN_SIMILARITY: f64 = 0.5;

/// Spell corrector over a fixed word list, usually the term dictionary of a
/// sub-index. Candidates are ranked by normalized Levenshtein similarity.
#[derive(Debug, Default, Clone)]
pub struct DictionarySpellCorrector {
    words: Vec<String>,
    known: HashSet<String>,
}

impl DictionarySpellCorrector {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known = HashSet::new();
        let words = words.into_iter().map(Into::into).filter(|w: &String| known.insert(w.clone())).collect();
        Self { words, known }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl SpellCorrector for DictionarySpellCorrector {
    fn exists(&self, term: &str) -> bool {
        self.known.contains(term)
    }

    /// Nothing is suggested for words the dictionary already knows.
    fn suggest(&self, term: &str, max: usize) -> Vec<String> {
        if max == 0 || term.is_empty() || self.exists(term) {
            return Vec::new();
        }
        let mut scored: Vec<(f64, &String)> = self
            .words
            .iter()
            .map(|w| (strsim::normalized_levenshtein(term, w), w))
            .filter(|(similarity, _)| *similarity >= MIN_SIMILARITY)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored.into_iter().take(max).map(|(_, w)| w.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_words_best_first() {
        let sc = DictionarySpellCorrector::new(["quick", "quirk", "brown", "fox", "quicker"]);
        assert_eq!(sc.suggest("quikc", 5), vec!["quick", "quirk"]);
        assert_eq!(sc.suggest("quikc", 1), vec!["quick"]);
        assert!(sc.suggest("zzzzzz", 3).is_empty());
    }

    #[test]
    fn known_words_get_no_suggestion() {
        let sc = DictionarySpellCorrector::new(["fox", "fox"]);
        assert_eq!(sc.len(), 1);
        assert!(sc.exists("fox"));
        assert!(sc.suggest("fox", 5).is_empty());
    }
}
