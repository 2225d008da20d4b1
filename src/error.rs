//! Error taxonomy for indexing and querying.
//!
//! Backend internals (stores, HTTP clients, config) report failures as
//! `anyhow::Error`; component boundaries translate them into [`RagError`]
//! so callers can tell a broken document from a down index from a failed
//! generation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Malformed course document. The loader skips the file and continues.
    #[error("malformed course document: {0}")]
    Format(String),

    /// Storage backend or embedding provider is down. Fatal to the query.
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// Fuzzy course-name resolution found nothing.
    #[error("No course found matching '{0}'")]
    NotFound(String),

    /// A tool failed. The orchestrator substitutes the message as the
    /// tool's result instead of aborting.
    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Reasoning-service failure. Fatal to the query, no partial answer.
    #[error("generation failed: {0}")]
    Generation(String),
}

impl RagError {
    pub fn index(err: impl std::fmt::Display) -> Self {
        RagError::IndexUnavailable(err.to_string())
    }

    pub fn generation(err: impl std::fmt::Display) -> Self {
        RagError::Generation(err.to_string())
    }
}

pub type RagResult<T> = std::result::Result<T, RagError>;
