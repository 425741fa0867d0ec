use quiz_core::model::{AttemptId, QuizAttempt, UserId};

use super::{SqliteRepository, mapping};
use crate::repository::{AttemptRow, HistoryRepository, QuestionRecord, StorageError};

#[async_trait::async_trait]
impl HistoryRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &QuizAttempt) -> Result<AttemptId, StorageError> {
        let id = AttemptId::random();
        let questions: Vec<QuestionRecord> = attempt
            .questions()
            .iter()
            .map(QuestionRecord::from_question)
            .collect();
        let questions_json = serde_json::to_string(&questions).map_err(mapping::ser)?;
        let answers_json = serde_json::to_string(attempt.answers()).map_err(mapping::ser)?;

        sqlx::query(
            r"
                INSERT INTO quiz_attempts (
                    id, user_id, topic, questions, user_answers,
                    score, total, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(id.to_string())
        .bind(attempt.user_id().as_str())
        .bind(attempt.topic())
        .bind(questions_json)
        .bind(answers_json)
        .bind(i64::from(attempt.score()))
        .bind(i64::from(attempt.total()))
        .bind(attempt.completed_at())
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(id)
    }

    async fn list_attempts(&self, user_id: &UserId) -> Result<Vec<AttemptRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, user_id, topic, questions, user_answers,
                       score, total, completed_at
                FROM quiz_attempts
                WHERE user_id = ?1
                ORDER BY completed_at DESC, id DESC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(mapping::map_attempt_row(&row)?);
        }
        Ok(out)
    }

    async fn get_attempt(
        &self,
        user_id: &UserId,
        id: AttemptId,
    ) -> Result<AttemptRow, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, user_id, topic, questions, user_answers,
                       score, total, completed_at
                FROM quiz_attempts
                WHERE id = ?1 AND user_id = ?2
            ",
        )
        .bind(id.to_string())
        .bind(user_id.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        mapping::map_attempt_row(&row)
    }
}
