//! Error taxonomy for the numeric core.
//!
//! Numerically undefined results (empty or degenerate selections) are not
//! errors: they come back as `NaN` or `None`. Undersampling is reported as a
//! warning value, see [`crate::data::filter::UndersamplingWarning`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Structural precondition violated at the entry of an operation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The record source could not be read.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A long-running search was aborted through its cancel flag.
    #[error("Search cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}
