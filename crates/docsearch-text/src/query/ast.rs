use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    /// Bare word.
    Term,
    /// Double-quoted run.
    Phrase,
    /// Word ending in `*`; the text holds the prefix.
    Prefix,
    /// Word with `*` or `?` elsewhere.
    Wildcard,
    /// Word ending in `~`; the text holds the word.
    Fuzzy,
}

/// Leaf of a parsed criteria string.
///
/// The text can be replaced after parsing, which is how spell suggestions are
/// substituted before the expression is rendered again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    kind: LiteralKind,
    text: String,
}

impl Literal {
    pub fn new(kind: LiteralKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }

    pub fn kind(&self) -> LiteralKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LiteralKind::Term | LiteralKind::Wildcard => f.write_str(&self.text),
            LiteralKind::Phrase => write!(f, "\"{}\"", self.text),
            LiteralKind::Prefix => write!(f, "{}*", self.text),
            LiteralKind::Fuzzy => write!(f, "{}~", self.text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// Matches no document; the result of empty criteria.
    MatchNone,
    Literal(Literal),
    /// Adjacent literals without an operator, searched as one phrase.
    Concat(Vec<Literal>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
}

impl Expression {
    pub fn is_match_none(&self) -> bool {
        matches!(self, Self::MatchNone)
    }

    /// Every literal, in criteria order.
    pub fn literals(&self) -> Vec<&Literal> {
        let mut out = Vec::new();
        self.walk(false, &mut |lit, _| out.push(lit));
        out
    }

    /// Literals outside any `not`; these are the ones worth highlighting.
    pub fn positive_literals(&self) -> Vec<&Literal> {
        let mut out = Vec::new();
        self.walk(false, &mut |lit, negated| {
            if !negated {
                out.push(lit);
            }
        });
        out
    }

    pub fn literals_mut(&mut self) -> Vec<&mut Literal> {
        let mut out = Vec::new();
        Self::collect_mut(self, &mut out);
        out
    }

    fn walk<'a>(&'a self, negated: bool, visit: &mut dyn FnMut(&'a Literal, bool)) {
        match self {
            Self::MatchNone => {}
            Self::Literal(lit) => visit(lit, negated),
            Self::Concat(lits) => lits.iter().for_each(|l| visit(l, negated)),
            Self::And(l, r) | Self::Or(l, r) => {
                l.walk(negated, visit);
                r.walk(negated, visit);
            }
            Self::Not(inner) => inner.walk(!negated, visit),
        }
    }

    fn collect_mut<'a>(expr: &'a mut Self, out: &mut Vec<&'a mut Literal>) {
        match expr {
            Self::MatchNone => {}
            Self::Literal(lit) => out.push(lit),
            Self::Concat(lits) => out.extend(lits.iter_mut()),
            Self::And(l, r) | Self::Or(l, r) => {
                Self::collect_mut(l, out);
                Self::collect_mut(r, out);
            }
            Self::Not(inner) => Self::collect_mut(inner, out),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Or(..) => 1,
            Self::And(..) => 2,
            Self::Not(..) => 3,
            Self::MatchNone | Self::Literal(_) | Self::Concat(_) => 4,
        }
    }

    fn fmt_child(&self, child: &Self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if child.precedence() < self.precedence() {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }
}

/// Renders back into criteria syntax that parses to the same expression.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MatchNone => Ok(()),
            Self::Literal(lit) => write!(f, "{lit}"),
            Self::Concat(lits) => {
                let words: Vec<&str> = lits.iter().map(Literal::text).collect();
                write!(f, "\"{}\"", words.join(" "))
            }
            Self::And(l, r) => {
                self.fmt_child(l, f)?;
                f.write_str(" and ")?;
                self.fmt_child(r, f)
            }
            Self::Or(l, r) => {
                self.fmt_child(l, f)?;
                f.write_str(" or ")?;
                self.fmt_child(r, f)
            }
            Self::Not(inner) => {
                f.write_str("not ")?;
                self.fmt_child(inner, f)
            }
        }
    }
}
