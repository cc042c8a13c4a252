//! Criteria parser.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or   := and { ("," | "or") and }
//! and  := not { "and" not }
//! not  := "not" not | clip
//! clip := "(" or ")" | term { term }
//! term := '"' chars '"' | word
//! ```
//!
//! Operator keywords are case-insensitive and only count as operators when
//! followed by a word boundary, so `oregon` and `android` stay words. A run
//! of terms without an operator between them becomes one phrase.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use docsearch_core::error::{Error, Result};

use super::ast::{Expression, Literal, LiteralKind};

const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Parse criteria into an expression; empty criteria give `MatchNone`.
pub fn parse(criteria: &str) -> Result<Expression> {
    let trimmed = criteria.trim().trim_start_matches(['*', '~', '?']).trim();
    if trimmed.is_empty() {
        return Ok(Expression::MatchNone);
    }
    let mut parser = Parser { chars: trimmed.to_lowercase().chars().collect(), pos: 0 };
    let expr = parser.or()?;
    parser.skip_space();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected input"));
    }
    Ok(expr)
}

/// Parser with a small LRU of recently parsed criteria.
pub struct QueryParser {
    cache: Mutex<LruCache<String, Expression>>,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl QueryParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { cache: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn parse(&self, criteria: &str) -> Result<Expression> {
        if let Some(hit) = self.cache.lock().get(criteria) {
            return Ok(hit.clone());
        }
        let expr = parse(criteria)?;
        self.cache.lock().put(criteria.to_string(), expr.clone());
        Ok(expr)
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn error(&self, message: &str) -> Error {
        let source: String = self.chars.iter().collect();
        Error::QuerySyntax(format!("{message} at position {} in [{source}]", self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_space(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn at_keyword(&self, word: &str) -> bool {
        let len = word.chars().count();
        let Some(slice) = self.chars.get(self.pos..self.pos + len) else {
            return false;
        };
        slice.iter().copied().eq(word.chars())
            && self.chars.get(self.pos + len).is_none_or(|c| c.is_whitespace() || matches!(c, '(' | '"'))
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        self.skip_space();
        if self.at_keyword(word) {
            self.pos += word.chars().count();
            true
        } else {
            false
        }
    }

    fn eat_or(&mut self) -> bool {
        self.skip_space();
        if self.peek() == Some(',') {
            self.pos += 1;
            return true;
        }
        self.eat_keyword("or")
    }

    fn or(&mut self) -> Result<Expression> {
        let mut left = self.and()?;
        while self.eat_or() {
            let right = self.and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expression> {
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            let right = self.not()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expression> {
        if self.eat_keyword("not") {
            return Ok(Expression::Not(Box::new(self.not()?)));
        }
        self.clip()
    }

    fn clip(&mut self) -> Result<Expression> {
        self.skip_space();
        match self.peek() {
            None => Err(self.error("expected a term")),
            Some('(') => {
                self.pos += 1;
                self.skip_space();
                if self.peek() == Some(')') {
                    return Err(self.error("empty group"));
                }
                let inner = self.or()?;
                self.skip_space();
                if self.peek() != Some(')') {
                    return Err(self.error("missing ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(')' | ',') => Err(self.error("expected a term")),
            Some(_) => self.literal(),
        }
    }

    fn at_literal_end(&mut self) -> bool {
        self.skip_space();
        match self.peek() {
            None | Some(')' | ',' | '(') => true,
            Some(_) => self.at_keyword("or") || self.at_keyword("and"),
        }
    }

    fn literal(&mut self) -> Result<Expression> {
        let mut terms = Vec::new();
        if let Some(first) = self.term()? {
            terms.push(first);
        }
        while !self.at_literal_end() {
            if let Some(next) = self.term()? {
                terms.push(next);
            }
        }
        Ok(match terms.len() {
            0 => Expression::MatchNone,
            1 => Expression::Literal(terms.remove(0)),
            _ => Expression::Concat(terms),
        })
    }

    fn term(&mut self) -> Result<Option<Literal>> {
        self.skip_space();
        if self.peek() == Some('"') {
            self.pos += 1;
            let start = self.pos;
            while self.peek().is_some_and(|c| c != '"') {
                self.pos += 1;
            }
            if self.peek().is_none() {
                return Err(self.error("unterminated quote"));
            }
            let text: String = self.chars[start..self.pos].iter().collect();
            self.pos += 1;
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            return Ok((!text.is_empty()).then(|| Literal::new(LiteralKind::Phrase, text)));
        }

        let start = self.pos;
        let mut fuzzy = false;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ',' | '(' | ')' | '"') {
                break;
            }
            self.pos += 1;
            if c == '~' {
                fuzzy = true;
                break;
            }
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        if fuzzy {
            // an edit distance after `~` is accepted and ignored
            while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
                self.pos += 1;
            }
            let text = word.trim_end_matches('~');
            return Ok((!text.is_empty()).then(|| Literal::new(LiteralKind::Fuzzy, text)));
        }
        Ok(classify(&word))
    }
}

fn classify(word: &str) -> Option<Literal> {
    let stem = word.trim_end_matches('*');
    if stem.is_empty() {
        return None;
    }
    if stem.contains(['*', '?']) {
        return Some(Literal::new(LiteralKind::Wildcard, word));
    }
    if stem.len() < word.len() {
        return Some(Literal::new(LiteralKind::Prefix, stem));
    }
    Some(Literal::new(LiteralKind::Term, word))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(text: &str) -> Expression {
        Expression::Literal(Literal::new(LiteralKind::Term, text))
    }

    #[test]
    fn empty_and_operator_only_criteria_match_nothing() {
        assert_eq!(parse("").unwrap(), Expression::MatchNone);
        assert_eq!(parse("   ").unwrap(), Expression::MatchNone);
        assert_eq!(parse("*").unwrap(), Expression::MatchNone);
        assert_eq!(parse("~?*").unwrap(), Expression::MatchNone);
    }

    #[test]
    fn leading_operator_characters_are_stripped() {
        assert_eq!(parse("*fox").unwrap(), term("fox"));
    }

    #[test]
    fn or_and_not_bind_as_expected() {
        let expr = parse("a, b and not c").unwrap();
        let expected = Expression::Or(
            Box::new(term("a")),
            Box::new(Expression::And(Box::new(term("b")), Box::new(Expression::Not(Box::new(term("c")))))),
        );
        assert_eq!(expr, expected);
        assert_eq!(parse("a OR b").unwrap(), Expression::Or(Box::new(term("a")), Box::new(term("b"))));
    }

    #[test]
    fn keywords_need_a_word_boundary() {
        assert_eq!(parse("oregon").unwrap(), term("oregon"));
        assert_eq!(parse("android").unwrap(), term("android"));
        assert_eq!(parse("nothing").unwrap(), term("nothing"));
    }

    #[test]
    fn adjacent_words_form_a_phrase() {
        let expr = parse("quick brown fox").unwrap();
        assert_eq!(
            expr,
            Expression::Concat(vec![
                Literal::new(LiteralKind::Term, "quick"),
                Literal::new(LiteralKind::Term, "brown"),
                Literal::new(LiteralKind::Term, "fox"),
            ])
        );
    }

    #[test]
    fn term_kinds_are_classified() {
        let lit = |s: &str| match parse(s).unwrap() {
            Expression::Literal(l) => (l.kind(), l.text().to_string()),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(lit("Fox"), (LiteralKind::Term, "fox".into()));
        assert_eq!(lit("fo*"), (LiteralKind::Prefix, "fo".into()));
        assert_eq!(lit("f?x"), (LiteralKind::Wildcard, "f?x".into()));
        assert_eq!(lit("f*x*"), (LiteralKind::Wildcard, "f*x*".into()));
        assert_eq!(lit("fox~"), (LiteralKind::Fuzzy, "fox".into()));
        assert_eq!(lit("\"the  fox\""), (LiteralKind::Phrase, "the fox".into()));
    }

    #[test]
    fn groups_are_honoured() {
        let expr = parse("(a or b) and c").unwrap();
        assert!(matches!(expr, Expression::And(ref l, _) if matches!(**l, Expression::Or(..))));
    }

    #[test]
    fn malformed_criteria_are_syntax_errors() {
        for bad in ["(fox", "fox)", "\"open", "fox or", "()", "a and , b"] {
            assert!(matches!(parse(bad), Err(Error::QuerySyntax(_))), "{bad}");
        }
    }

    #[test]
    fn display_round_trips() {
        for criteria in ["a or b and c", "(a or b) and not c", "\"quick fox\" or fo*", "fox~ and f?x"] {
            let expr = parse(criteria).unwrap();
            assert_eq!(parse(&expr.to_string()).unwrap(), expr, "{criteria}");
        }
    }

    #[test]
    fn literals_can_be_replaced() {
        let mut expr = parse("quikc and dog").unwrap();
        expr.literals_mut()[0].set("quick");
        assert_eq!(expr.to_string(), "quick and dog");
        let negated = parse("cat and not dog").unwrap();
        let positive: Vec<&str> = negated.positive_literals().iter().map(|l| l.text()).collect();
        assert_eq!(positive, vec!["cat"]);
    }

    #[test]
    fn cache_returns_equal_expressions() {
        let parser = QueryParser::with_capacity(2);
        let first = parser.parse("a or b").unwrap();
        let second = parser.parse("a or b").unwrap();
        assert_eq!(first, second);
    }
}
