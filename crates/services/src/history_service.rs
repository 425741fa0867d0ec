use chrono::{DateTime, Utc};
use std::sync::Arc;

use quiz_core::model::AttemptId;
use storage::repository::{AttemptRow, HistoryRepository};

use crate::error::QuizServiceError;
use crate::quiz_service::Identity;

/// Presentation-agnostic list item for a past quiz attempt.
///
/// This is intentionally **not** a UI view-model: no pre-formatted strings,
/// no localization assumptions. The UI may format timestamps and percentages
/// as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptListItem {
    pub id: AttemptId,
    pub topic: String,
    pub score: u32,
    pub total: u32,
    pub percentage: u32,
    pub completed_at: DateTime<Utc>,
}

impl AttemptListItem {
    #[must_use]
    pub fn from_row(row: &AttemptRow) -> Self {
        Self {
            id: row.id,
            topic: row.attempt.topic().to_owned(),
            score: row.attempt.score(),
            total: row.attempt.total(),
            percentage: row.attempt.percentage(),
            completed_at: row.attempt.completed_at(),
        }
    }
}

/// History facade that hides repository access from the presentation layer.
///
/// All reads require a signed-in identity; the storage layer additionally
/// scopes every query to the owning user.
#[derive(Clone)]
pub struct HistoryService {
    history: Arc<dyn HistoryRepository>,
}

impl HistoryService {
    #[must_use]
    pub fn new(history: Arc<dyn HistoryRepository>) -> Self {
        Self { history }
    }

    /// List the user's past attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationRequired` for anonymous callers and
    /// `QuizServiceError::Storage` on repository failures.
    pub async fn list_history(
        &self,
        identity: &Identity,
    ) -> Result<Vec<AttemptListItem>, QuizServiceError> {
        let user_id = identity
            .user_id()
            .ok_or(QuizServiceError::AuthenticationRequired)?;
        let rows = self.history.list_attempts(user_id).await?;
        Ok(rows.iter().map(AttemptListItem::from_row).collect())
    }

    /// Fetch one attempt with its full question and answer record.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationRequired` for anonymous callers,
    /// `StorageError::NotFound` (wrapped) for missing or foreign-owned
    /// attempts, and other storage failures as `QuizServiceError::Storage`.
    pub async fn attempt_detail(
        &self,
        identity: &Identity,
        id: AttemptId,
    ) -> Result<AttemptRow, QuizServiceError> {
        let user_id = identity
            .user_id()
            .ok_or(QuizServiceError::AuthenticationRequired)?;
        Ok(self.history.get_attempt(user_id, id).await?)
    }
}
