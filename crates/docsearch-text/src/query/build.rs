use tantivy::query::{AllQuery, BooleanQuery, EmptyQuery, FuzzyTermQuery, Occur, PhraseQuery, Query, RegexQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::Term;

use docsearch_core::error::{Error, Result};

use super::ast::{Expression, Literal, LiteralKind};
use crate::analyzer::{AnalyzedToken, AnalyzerRegistry};

const FUZZY_DISTANCE: u8 = 2;

/// Turns a parsed expression into a tantivy query over one text field.
pub struct QueryBuilder<'a> {
    analyzers: &'a AnalyzerRegistry,
    language: &'a str,
    field: Field,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(analyzers: &'a AnalyzerRegistry, language: &'a str, field: Field) -> Self {
        Self { analyzers, language, field }
    }

    /// Clauses that analyze to nothing (stop words only) are dropped; an
    /// expression left with no clauses matches nothing.
    pub fn build(&self, expr: &Expression) -> Result<Box<dyn Query>> {
        Ok(self.node(expr)?.unwrap_or_else(|| Box::new(EmptyQuery)))
    }

    fn node(&self, expr: &Expression) -> Result<Option<Box<dyn Query>>> {
        match expr {
            Expression::MatchNone => Ok(Some(Box::new(EmptyQuery))),
            Expression::Literal(lit) => self.literal(lit),
            Expression::Concat(lits) => {
                let joined: Vec<&str> = lits.iter().map(Literal::text).collect();
                self.analyzed(&joined.join(" "))
            }
            Expression::And(..) => {
                let mut parts = Vec::new();
                flatten_and(expr, &mut parts);
                let mut clauses = Vec::new();
                for part in parts {
                    match part {
                        Expression::Not(inner) => {
                            if let Some(q) = self.node(inner)? {
                                clauses.push((Occur::MustNot, q));
                            }
                        }
                        other => {
                            if let Some(q) = self.node(other)? {
                                clauses.push((Occur::Must, q));
                            }
                        }
                    }
                }
                if clauses.is_empty() {
                    return Ok(None);
                }
                if clauses.iter().all(|(occur, _)| *occur == Occur::MustNot) {
                    clauses.push((Occur::Must, Box::new(AllQuery)));
                }
                Ok(Some(Box::new(BooleanQuery::new(clauses))))
            }
            Expression::Or(..) => {
                let mut parts = Vec::new();
                flatten_or(expr, &mut parts);
                let mut clauses = Vec::new();
                for part in parts {
                    if let Some(q) = self.node(part)? {
                        clauses.push((Occur::Should, q));
                    }
                }
                Ok((!clauses.is_empty()).then(|| Box::new(BooleanQuery::new(clauses)) as Box<dyn Query>))
            }
            Expression::Not(inner) => {
                let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, Box::new(AllQuery))];
                if let Some(q) = self.node(inner)? {
                    clauses.push((Occur::MustNot, q));
                }
                Ok(Some(Box::new(BooleanQuery::new(clauses))))
            }
        }
    }

    fn literal(&self, lit: &Literal) -> Result<Option<Box<dyn Query>>> {
        let text = lit.text();
        match lit.kind() {
            LiteralKind::Term | LiteralKind::Phrase => self.analyzed(text),
            LiteralKind::Prefix => self.regex(&format!("{}.*", regex::escape(text))).map(Some),
            LiteralKind::Wildcard => self.regex(&wildcard_pattern(text)).map(Some),
            LiteralKind::Fuzzy => {
                let term = Term::from_field_text(self.field, text);
                Ok(Some(Box::new(FuzzyTermQuery::new(term, FUZZY_DISTANCE, true))))
            }
        }
    }

    fn analyzed(&self, text: &str) -> Result<Option<Box<dyn Query>>> {
        let tokens = self.analyzers.analyze(self.language, text)?;
        Ok(match tokens.as_slice() {
            [] => None,
            [single] => Some(Box::new(self.term_query(single))),
            many => {
                let base = many.iter().map(|t| t.position).min().unwrap_or(0);
                let terms = many
                    .iter()
                    .map(|t| (t.position - base, Term::from_field_text(self.field, &t.text)))
                    .collect();
                Some(Box::new(PhraseQuery::new_with_offset(terms)))
            }
        })
    }

    fn term_query(&self, token: &AnalyzedToken) -> TermQuery {
        TermQuery::new(Term::from_field_text(self.field, &token.text), IndexRecordOption::WithFreqs)
    }

    fn regex(&self, pattern: &str) -> Result<Box<dyn Query>> {
        let query = RegexQuery::from_pattern(pattern, self.field)
            .map_err(|e| Error::QuerySyntax(format!("invalid pattern [{pattern}]: {e}")))?;
        Ok(Box::new(query))
    }
}

/// Regex equivalent of a `*`/`?` wildcard word.
pub fn wildcard_pattern(word: &str) -> String {
    let mut pattern = String::with_capacity(word.len() * 2);
    for c in word.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern
}

fn flatten_and<'e>(expr: &'e Expression, out: &mut Vec<&'e Expression>) {
    if let Expression::And(l, r) = expr {
        flatten_and(l, out);
        flatten_and(r, out);
    } else {
        out.push(expr);
    }
}

fn flatten_or<'e>(expr: &'e Expression, out: &mut Vec<&'e Expression>) {
    if let Expression::Or(l, r) = expr {
        flatten_or(l, out);
        flatten_or(r, out);
    } else {
        out.push(expr);
    }
}
