//! Error types for active-surrogate-rs.
//!
//! This module provides error types and result aliases for the library.
//!
//! # Example - Pattern Matching
//!
//! ```rust
//! use active_surrogate_rs::sampler::latin_hypercube;
//! use active_surrogate_rs::SurrogateError;
//!
//! match latin_hypercube(1, &[1.0], &[0.0], 5, 42) {
//!     Ok(_) => unreachable!("inverted bounds are rejected"),
//!     Err(SurrogateError::InvalidArgument(msg)) => {
//!         eprintln!("bad sampling request: {}", msg);
//!     }
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// Result type alias for active-surrogate-rs operations.
pub type Result<T> = std::result::Result<T, SurrogateError>;

/// Errors that can occur in active-surrogate-rs.
///
/// # Example
///
/// ```rust
/// use active_surrogate_rs::{Result, SurrogateError};
///
/// fn check_count(count: usize) -> Result<()> {
///     if count == 0 {
///         return Err(SurrogateError::InvalidArgument("count must be > 0".to_string()));
///     }
///     Ok(())
/// }
///
/// assert!(check_count(0).is_err());
/// assert!(check_count(3).is_ok());
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SurrogateError {
    /// Bad bounds, counts, shapes or ensemble configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The reduced-order model or simulator failed or returned malformed data.
    #[error("collaborator failure: {0}")]
    CollaboratorFailure(String),

    /// Training loss became non-finite.
    #[error("numerical instability in member {member} at epoch {epoch}")]
    NumericalInstability {
        /// Index of the ensemble member that diverged.
        member: usize,
        /// Epoch in which the non-finite loss was observed.
        epoch: usize,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid configuration file.
    #[error("invalid config file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Training error.
    #[error("training error: {0}")]
    Training(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization error.
    #[error("report serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Candle error.
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Progress bar template error.
    #[error("template error: {0}")]
    Template(String),
}

impl From<indicatif::style::TemplateError> for SurrogateError {
    fn from(err: indicatif::style::TemplateError) -> Self {
        SurrogateError::Template(err.to_string())
    }
}
