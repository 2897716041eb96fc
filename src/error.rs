//! Error types shared across the fitment core and its adapters.

use thiserror::Error;

use crate::selection::Stage;

/// Failure talking to the catalog.
///
/// The fetch layer swallows these after logging them. A failed category shows
/// up as an empty option list with its loading flag cleared.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Database query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP request to a remote catalog failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote catalog URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Remote catalog answered with a non-success status.
    #[error("Catalog returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Remote catalog answered with a body of the wrong shape.
    #[error("Unexpected catalog payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Fixture file could not be read or parsed.
    #[error("Fixture error: {0}")]
    Fixture(String),
}

/// Rejected selection change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// A stage was written before every stage above it was set.
    #[error("Stage '{stage}' cannot be set before the stages above it")]
    StageNotReady {
        /// The stage that was written.
        stage: Stage,
    },
}

/// Failure reaching a session actor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session actor has shut down.
    #[error("Session is closed")]
    Closed,

    /// The selection change was rejected.
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Failure loading a link table file.
#[derive(Error, Debug)]
pub enum LinkTableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
