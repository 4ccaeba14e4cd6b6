//! Request options: typed option sets per media kind and their checks.

mod schema;
mod types;

pub use schema::{parse_options, parse_options_json, parse_query_options};
pub use types::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptionsError {
    /// No option source produced anything.
    #[error("No options provided")]
    NoOptions,

    /// An option source was not valid JSON.
    #[error("Error while parsing options")]
    Malformed,

    /// A field failed its type or value check.
    #[error("[{path}] {reason}")]
    Invalid { path: String, reason: String },
}

impl OptionsError {
    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
