//! Error types for start-grid operations.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context. The crate's failure model is deliberately forgiving: no error is
//! fatal to the process, every failure path leaves the previously-valid state
//! untouched, and the operator simply corrects the input and repeats the
//! action.
//!
//! ## Error Categories
//!
//! - **Ingestion errors**: malformed roster documents ([`GridError::RosterParse`])
//! - **Reconciliation errors**: re-imported file describes a different race
//!   ([`GridError::RaceMismatch`])
//! - **Input errors**: bad bib numbers ([`GridError::InvalidBib`],
//!   [`GridError::DuplicateBib`], [`GridError::UnknownBib`])
//! - **Command errors**: operation issued without an open project or in the
//!   wrong timer state ([`GridError::NoProject`], [`GridError::Timer`])
//! - **Storage errors**: write failures ([`GridError::Storage`]). Read-side
//!   corruption never surfaces as an error; the store falls back to an empty
//!   default dataset instead.
//! - **Export errors**: report serialization failures ([`GridError::Export`])

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for start-grid operations.
pub type Result<T, E = GridError> = std::result::Result<T, E>;

/// Main error type for start-grid operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GridError {
    #[error("failed to parse roster document: {details}")]
    RosterParse {
        details: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("roster file describes race '{found}', current project tracks race '{expected}'")]
    RaceMismatch { expected: String, found: String },

    #[error("participant with bib {bib} already exists")]
    DuplicateBib { bib: u32 },

    #[error("invalid bib number: '{input}'")]
    InvalidBib { input: String },

    #[error("no participant with bib {bib}")]
    UnknownBib { bib: u32 },

    #[error("no project with id '{id}'")]
    ProjectNotFound { id: String },

    #[error("no project is currently open")]
    NoProject,

    #[error("timer command rejected: {reason}")]
    Timer { reason: String },

    #[error("storage error: {path}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("export failed: {0}")]
    Export(#[from] serde_json::Error),
}

impl GridError {
    /// Returns whether the previously-valid state survives this error.
    ///
    /// Always true in the current taxonomy; kept as an explicit contract so
    /// callers do not have to reason about it per variant.
    pub fn is_recoverable(&self) -> bool {
        match self {
            GridError::RosterParse { .. } => true,
            GridError::RaceMismatch { .. } => true,
            GridError::DuplicateBib { .. } => true,
            GridError::InvalidBib { .. } => true,
            GridError::UnknownBib { .. } => true,
            GridError::ProjectNotFound { .. } => true,
            GridError::NoProject => true,
            GridError::Timer { .. } => true,
            GridError::Storage { .. } => true,
            GridError::Export(_) => true,
        }
    }

    /// Helper constructor for roster parse errors.
    pub fn roster_parse(details: impl Into<String>) -> Self {
        GridError::RosterParse { details: details.into(), source: None }
    }

    /// Helper constructor for roster parse errors with a source.
    pub fn roster_parse_with_source(
        details: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        GridError::RosterParse { details: details.into(), source: Some(source) }
    }

    /// Helper constructor for timer command errors.
    pub fn timer(reason: impl Into<String>) -> Self {
        GridError::Timer { reason: reason.into() }
    }

    /// Helper constructor for storage errors with path context.
    pub fn storage(path: PathBuf, source: std::io::Error) -> Self {
        GridError::Storage { path, source }
    }
}
