use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Question, QuizSession, UserAnswer, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("session is not finished")]
    NotFinished,

    #[error("answers length ({answers}) does not match questions length ({questions})")]
    LengthMismatch { questions: usize, answers: usize },

    #[error("stored total ({total}) does not match question count ({questions})")]
    TotalMismatch { total: u32, questions: usize },

    #[error("stored score ({score}) does not match answer record ({recount})")]
    ScoreMismatch { score: u32, recount: u32 },
}

/// Immutable record of one completed quiz.
///
/// Created exactly once, when a session finishes; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    user_id: UserId,
    topic: String,
    questions: Vec<Question>,
    answers: Vec<UserAnswer>,
    score: u32,
    completed_at: DateTime<Utc>,
}

impl QuizAttempt {
    /// Snapshot a finished session into an attempt owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotFinished` if the session has not reached
    /// its terminal stage.
    pub fn from_session(user_id: UserId, session: &QuizSession) -> Result<Self, AttemptError> {
        let Some(completed_at) = session.completed_at() else {
            return Err(AttemptError::NotFinished);
        };
        Ok(Self {
            user_id,
            topic: session.topic().to_owned(),
            questions: session.questions().to_vec(),
            answers: session.answers().to_vec(),
            score: session.score(),
            completed_at,
        })
    }

    /// Rehydrate an attempt from persisted storage.
    ///
    /// The stored `total` and `score` are cross-checked against the question
    /// and answer arrays so a corrupted document is rejected on read rather
    /// than surfaced to a reader.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if array lengths, total, or score disagree.
    pub fn from_persisted(
        user_id: UserId,
        topic: String,
        questions: Vec<Question>,
        answers: Vec<UserAnswer>,
        score: u32,
        total: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if answers.len() != questions.len() {
            return Err(AttemptError::LengthMismatch {
                questions: questions.len(),
                answers: answers.len(),
            });
        }
        if !usize::try_from(total).is_ok_and(|t| t == questions.len()) {
            return Err(AttemptError::TotalMismatch {
                total,
                questions: questions.len(),
            });
        }

        let attempt = Self {
            user_id,
            topic,
            questions,
            answers,
            score,
            completed_at,
        };
        let recount = attempt.recount_score();
        if recount != score {
            return Err(AttemptError::ScoreMismatch { score, recount });
        }
        Ok(attempt)
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answers(&self) -> &[UserAnswer] {
        &self.answers
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Number of questions in the attempt.
    #[must_use]
    pub fn total(&self) -> u32 {
        u32::try_from(self.questions.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Score as a whole-number percentage, rounded half up (2/3 -> 67).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        (self.score * 100 + total / 2) / total
    }

    fn recount_score(&self) -> u32 {
        let count = self
            .answers
            .iter()
            .zip(&self.questions)
            .filter(|(answer, question)| {
                answer.as_deref().is_some_and(|a| question.is_correct(a))
            })
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionDraft;
    use crate::time::fixed_now;

    fn build_question(id: u64) -> Question {
        QuestionDraft {
            question: format!("Q{id}"),
            options: vec!["A".into(), "B".into()],
            correct_answer: "A".into(),
            explanation: None,
        }
        .validate()
        .unwrap()
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn finished_session(choices: &[&str]) -> QuizSession {
        let questions = (1..=choices.len() as u64).map(build_question).collect();
        let mut session = QuizSession::new("Topic", questions, fixed_now()).unwrap();
        for choice in choices {
            session.select_option(*choice);
            session.submit();
            session.advance(fixed_now());
        }
        session
    }

    #[test]
    fn snapshot_requires_finished_session() {
        let questions = vec![build_question(1)];
        let session = QuizSession::new("Topic", questions, fixed_now()).unwrap();
        let err = QuizAttempt::from_session(user(), &session).unwrap_err();
        assert!(matches!(err, AttemptError::NotFinished));
    }

    #[test]
    fn snapshot_captures_score_and_answers() {
        let session = finished_session(&["A", "B", "A"]);
        let attempt = QuizAttempt::from_session(user(), &session).unwrap();

        assert_eq!(attempt.score(), 2);
        assert_eq!(attempt.total(), 3);
        assert_eq!(attempt.percentage(), 67);
        assert_eq!(attempt.answers()[1].as_deref(), Some("B"));
        assert_eq!(attempt.completed_at(), fixed_now());
    }

    #[test]
    fn percentage_rounds_half_up() {
        let cases = [
            (&["A"][..], 100),
            (&["B"][..], 0),
            (&["A", "B", "B"][..], 33),
            (&["A", "A", "B"][..], 67),
            (&["A", "B"][..], 50),
        ];
        for (choices, expected) in cases {
            let session = finished_session(choices);
            let attempt = QuizAttempt::from_session(user(), &session).unwrap();
            assert_eq!(attempt.percentage(), expected, "choices {choices:?}");
        }
    }

    #[test]
    fn persisted_roundtrip_validates() {
        let session = finished_session(&["A", "B"]);
        let attempt = QuizAttempt::from_session(user(), &session).unwrap();

        let rehydrated = QuizAttempt::from_persisted(
            attempt.user_id().clone(),
            attempt.topic().to_owned(),
            attempt.questions().to_vec(),
            attempt.answers().to_vec(),
            attempt.score(),
            attempt.total(),
            attempt.completed_at(),
        )
        .unwrap();
        assert_eq!(rehydrated, attempt);
    }

    #[test]
    fn persisted_rejects_length_mismatch() {
        let err = QuizAttempt::from_persisted(
            user(),
            "Topic".into(),
            vec![build_question(1), build_question(2)],
            vec![Some("A".into())],
            1,
            2,
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, AttemptError::LengthMismatch { .. }));
    }

    #[test]
    fn persisted_rejects_total_mismatch() {
        let err = QuizAttempt::from_persisted(
            user(),
            "Topic".into(),
            vec![build_question(1)],
            vec![Some("A".into())],
            1,
            5,
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AttemptError::TotalMismatch { total: 5, .. }
        ));
    }

    #[test]
    fn persisted_rejects_score_disagreement() {
        let err = QuizAttempt::from_persisted(
            user(),
            "Topic".into(),
            vec![build_question(1)],
            vec![Some("B".into())],
            1,
            1,
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AttemptError::ScoreMismatch { score: 1, recount: 0 }
        ));
    }
}
