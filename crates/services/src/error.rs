//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{AttemptError, QuestionError, SessionError};
use storage::repository::StorageError;

/// Errors emitted by question sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionSourceError {
    #[error("question source is not configured")]
    Disabled,
    #[error("question source returned an empty response")]
    EmptyResponse,
    #[error("question source returned malformed output: {0}")]
    MalformedResponse(String),
    #[error("question source returned an invalid question: {0}")]
    InvalidQuestion(#[from] QuestionError),
    #[error("question source request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by the quiz orchestration layer.
///
/// All external-call failures are converted to one of these at this
/// boundary; the session itself signals invalid transitions as no-ops
/// rather than errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("quiz topic is empty")]
    EmptyTopic,
    #[error("question generation failed")]
    Generation(#[source] QuestionSourceError),
    #[error("sign-in is required for this operation")]
    AuthenticationRequired,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
