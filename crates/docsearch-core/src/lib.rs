//! Shared foundation of the docsearch workspace: error taxonomy, configuration,
//! domain types, collaborator traits and document extraction.

pub mod config;
pub mod error;
pub mod extract;
pub mod lock;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
