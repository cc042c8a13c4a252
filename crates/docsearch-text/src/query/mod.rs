//! Criteria language: parsing, rendering and translation to tantivy queries.

mod ast;
mod build;
mod parser;

pub use ast::{Expression, Literal, LiteralKind};
pub use build::{wildcard_pattern, QueryBuilder};
pub use parser::{parse, QueryParser};
