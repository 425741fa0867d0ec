use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use quiz_core::model::{AttemptId, Question, QuestionDraft, QuizAttempt, UserAnswer, UserId};

/// Errors surfaced by history storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a single question.
///
/// This mirrors the domain `Question` so repositories can serialize and
/// deserialize the stored document without leaking storage concerns into
/// the domain layer. Field names follow the external document shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuestionRecord {
    #[must_use]
    pub fn from_question(question: &Question) -> Self {
        Self {
            question: question.text().to_owned(),
            options: question.options().to_vec(),
            correct_answer: question.correct_answer().to_owned(),
            explanation: question.explanation().map(str::to_owned),
        }
    }

    /// Convert the record back into a domain `Question`, revalidating it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored question violates
    /// a domain invariant (e.g. its correct answer is not an option).
    pub fn into_question(self) -> Result<Question, StorageError> {
        QuestionDraft {
            question: self.question,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
        }
        .validate()
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// Persisted document shape for a completed quiz attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub user_id: String,
    pub topic: String,
    pub questions: Vec<QuestionRecord>,
    pub user_answers: Vec<UserAnswer>,
    pub score: u32,
    pub total: u32,
    pub completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    #[must_use]
    pub fn from_attempt(attempt: &QuizAttempt) -> Self {
        Self {
            user_id: attempt.user_id().as_str().to_owned(),
            topic: attempt.topic().to_owned(),
            questions: attempt.questions().iter().map(QuestionRecord::from_question).collect(),
            user_answers: attempt.answers().to_vec(),
            score: attempt.score(),
            total: attempt.total(),
            completed_at: attempt.completed_at(),
        }
    }

    /// Convert the record back into a domain `QuizAttempt`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if any stored question is
    /// invalid or the stored score/total disagree with the answer record.
    pub fn into_attempt(self) -> Result<QuizAttempt, StorageError> {
        let user_id = UserId::new(self.user_id)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let questions = self
            .questions
            .into_iter()
            .map(QuestionRecord::into_question)
            .collect::<Result<Vec<_>, _>>()?;

        QuizAttempt::from_persisted(
            user_id,
            self.topic,
            questions,
            self.user_answers,
            self.score,
            self.total,
            self.completed_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// An attempt paired with its store-assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRow {
    pub id: AttemptId,
    pub attempt: QuizAttempt,
}

impl AttemptRow {
    #[must_use]
    pub fn new(id: AttemptId, attempt: QuizAttempt) -> Self {
        Self { id, attempt }
    }
}

/// Repository contract for the per-user quiz history.
///
/// Attempts are append-only: nothing here mutates or deletes. Reads are
/// scoped to the owning user at this layer; asking for another user's
/// attempt id behaves as if the attempt does not exist.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Append a completed attempt and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptId, StorageError>;

    /// List a user's attempts, newest `completed_at` first.
    ///
    /// Ties on `completed_at` are broken by id, descending, so the order is
    /// deterministic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_attempts(&self, user_id: &UserId) -> Result<Vec<AttemptRow>, StorageError>;

    /// Fetch one attempt by id, scoped to its owning user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the attempt is missing or owned
    /// by a different user.
    async fn get_attempt(
        &self,
        user_id: &UserId,
        id: AttemptId,
    ) -> Result<AttemptRow, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    attempts: Arc<Mutex<Vec<(AttemptId, QuizAttempt)>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl HistoryRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptId, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = AttemptId::random();
        guard.push((id, attempt.clone()));
        Ok(id)
    }

    async fn list_attempts(&self, user_id: &UserId) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<AttemptRow> = guard
            .iter()
            .filter(|(_, attempt)| attempt.user_id() == user_id)
            .map(|(id, attempt)| AttemptRow::new(*id, attempt.clone()))
            .collect();
        rows.sort_by(|a, b| {
            b.attempt
                .completed_at()
                .cmp(&a.attempt.completed_at())
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn get_attempt(
        &self,
        user_id: &UserId,
        id: AttemptId,
    ) -> Result<AttemptRow, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|(row_id, attempt)| *row_id == id && attempt.user_id() == user_id)
            .map(|(id, attempt)| AttemptRow::new(*id, attempt.clone()))
            .ok_or(StorageError::NotFound)
    }
}

/// Aggregates history storage behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub attempts: Arc<dyn HistoryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            attempts: Arc::new(InMemoryRepository::new()),
        }
    }
}
