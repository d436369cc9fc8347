//! Error types for the news consensus analyzer

use crate::models::AnalystRole;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for analyzer operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {

    // =============================
    // Pipeline Errors
    // =============================

    #[error("No opinions available for article {article_id}")]
    NoOpinionsAvailable { article_id: String },

    #[error("Duplicate opinion for role: {0}")]
    DuplicateRole(AnalystRole),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Agent(#[from] AgentFailure),

    #[error("Cannot evaluate an empty batch")]
    EmptyBatch,

    #[error("All {0} article(s) failed to produce a consensus")]
    AllArticlesFailed(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM rate limited: {0}")]
    RateLimited(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A single role invocation that did not yield a valid opinion.
///
/// Recovered locally by the orchestrator: the article proceeds with the
/// remaining roles.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{role} analyst failed: {cause}")]
pub struct AgentFailure {
    pub role: AnalystRole,
    pub cause: FailureCause,
}

impl AgentFailure {
    pub fn new(role: AnalystRole, cause: FailureCause) -> Self {
        Self { role, cause }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureCause {
    #[error("call timed out")]
    Timeout,

    #[error("article deadline exceeded")]
    DeadlineExceeded,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed output: {0}")]
    Malformed(String),

    #[error("contract validation failed: {0}")]
    Validation(String),
}

impl FailureCause {
    /// Whether a bounded retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureCause::Timeout | FailureCause::RateLimited(_) | FailureCause::Transport(_)
        )
    }
}

impl From<AnalysisError> for FailureCause {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::RateLimited(msg) => FailureCause::RateLimited(msg),
            AnalysisError::Validation(msg) => FailureCause::Validation(msg),
            AnalysisError::SerializationError(e) => FailureCause::Malformed(e.to_string()),
            AnalysisError::Agent(failure) => failure.cause,
            other => FailureCause::Transport(other.to_string()),
        }
    }
}
