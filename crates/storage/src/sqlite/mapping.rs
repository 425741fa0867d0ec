use sqlx::Row;

use quiz_core::model::{AttemptId, QuizAttempt, UserAnswer, UserId};

use crate::repository::{AttemptRow, QuestionRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn attempt_id_from_str(s: &str) -> Result<AttemptId, StorageError> {
    s.parse::<AttemptId>().map_err(ser)
}

/// Decode a `quiz_attempts` row into a validated domain attempt.
///
/// The questions and answers columns hold JSON arrays; both are revalidated
/// through the domain constructors so a corrupted row is rejected here
/// instead of reaching a reader.
pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<AttemptRow, StorageError> {
    let id = attempt_id_from_str(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let user_id = UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?;
    let topic: String = row.try_get("topic").map_err(ser)?;

    let questions_json: String = row.try_get("questions").map_err(ser)?;
    let question_records: Vec<QuestionRecord> =
        serde_json::from_str(&questions_json).map_err(ser)?;
    let questions = question_records
        .into_iter()
        .map(QuestionRecord::into_question)
        .collect::<Result<Vec<_>, _>>()?;

    let answers_json: String = row.try_get("user_answers").map_err(ser)?;
    let answers: Vec<UserAnswer> = serde_json::from_str(&answers_json).map_err(ser)?;

    let score_i64: i64 = row.try_get("score").map_err(ser)?;
    let score = u32::try_from(score_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid score: {score_i64}")))?;
    let total_i64: i64 = row.try_get("total").map_err(ser)?;
    let total = u32::try_from(total_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid total: {total_i64}")))?;

    let completed_at = row.try_get("completed_at").map_err(ser)?;

    let attempt =
        QuizAttempt::from_persisted(user_id, topic, questions, answers, score, total, completed_at)
            .map_err(ser)?;
    Ok(AttemptRow::new(id, attempt))
}
