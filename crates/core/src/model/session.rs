use chrono::{DateTime, Utc};
use std::fmt;

use crate::model::{Question, UserAnswer};
use thiserror::Error;

//
// ─── TRANSITION OUTCOMES ───────────────────────────────────────────────────────
//

/// Outcome of selecting an option for the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The tentative choice was recorded (replacing any earlier one).
    Selected,
    /// Not in the answering stage; nothing changed.
    Ignored,
}

/// Outcome of submitting the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The answer was locked in and scored.
    Scored { correct: bool },
    /// No option was selected; nothing changed.
    NoSelection,
    /// Not in the answering stage; nothing changed.
    Ignored,
}

/// Outcome of advancing past a reviewed question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the next question.
    Next { index: usize },
    /// The last question was reviewed; the session is now finished.
    Finished { score: u32, total: usize },
    /// Not in the reviewing stage; nothing changed.
    Ignored,
}

/// Stage of the quiz session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The current question is displayed; an option may be tentatively chosen.
    Answering,
    /// The current question was submitted; correctness and explanation visible.
    Reviewing,
    /// Terminal. Score and full answer record available.
    Finished,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state for one quiz run.
///
/// Steps through a fixed sequence of questions: for each, the caller
/// tentatively selects an option (`select_option`), locks it in (`submit`),
/// reviews the result, and moves on (`advance`). The index never decreases
/// and every transition outside its valid stage is a signalled no-op rather
/// than an error.
pub struct QuizSession {
    topic: String,
    questions: Vec<Question>,
    current: usize,
    answers: Vec<UserAnswer>,
    score: u32,
    tentative: Option<String>,
    stage: Stage,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    /// Create a session over the given questions.
    ///
    /// `started_at` should come from the services layer clock to keep time
    /// deterministic.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions are provided.
    pub fn new(
        topic: impl Into<String>,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        let answers = vec![None; questions.len()];
        Ok(Self {
            topic: topic.into(),
            questions,
            current: 0,
            answers,
            score: 0,
            tentative: None,
            stage: Stage::Answering,
            started_at,
            completed_at: None,
        })
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Index of the question currently being answered or reviewed.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.stage {
            Stage::Answering | Stage::Reviewing => Some(&self.questions[self.current]),
            Stage::Finished => None,
        }
    }

    /// The not-yet-scored choice for the current question, if any.
    #[must_use]
    pub fn tentative_choice(&self) -> Option<&str> {
        self.tentative.as_deref()
    }

    #[must_use]
    pub fn answers(&self) -> &[UserAnswer] {
        &self.answers
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Total number of questions in the session.
    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Finished)
    }

    /// Record a tentative choice for the current question.
    ///
    /// Re-selecting simply replaces the previous tentative choice; nothing
    /// is scored until `submit`. Ignored outside the answering stage.
    pub fn select_option(&mut self, option: impl Into<String>) -> SelectOutcome {
        if self.stage != Stage::Answering {
            return SelectOutcome::Ignored;
        }
        self.tentative = Some(option.into());
        SelectOutcome::Selected
    }

    /// Lock in the tentative choice for the current question and score it.
    ///
    /// Requires a tentative choice; without one this is a signalled no-op.
    /// On success the session moves to the reviewing stage.
    pub fn submit(&mut self) -> SubmitOutcome {
        if self.stage != Stage::Answering {
            return SubmitOutcome::Ignored;
        }
        let Some(choice) = self.tentative.take() else {
            return SubmitOutcome::NoSelection;
        };

        let correct = self.questions[self.current].is_correct(&choice);
        self.answers[self.current] = Some(choice);
        if correct {
            self.score += 1;
        }
        self.stage = Stage::Reviewing;
        SubmitOutcome::Scored { correct }
    }

    /// Move past the reviewed question.
    ///
    /// Advances to the next question with the tentative choice cleared, or
    /// finishes the session if the reviewed question was the last one.
    /// `now` should come from the services layer clock; it is recorded as
    /// the completion timestamp when the session finishes.
    pub fn advance(&mut self, now: DateTime<Utc>) -> AdvanceOutcome {
        if self.stage != Stage::Reviewing {
            return AdvanceOutcome::Ignored;
        }

        if self.current + 1 < self.questions.len() {
            self.current += 1;
            self.tentative = None;
            self.stage = Stage::Answering;
            return AdvanceOutcome::Next {
                index: self.current,
            };
        }

        self.stage = Stage::Finished;
        self.completed_at = Some(now);
        debug_assert_eq!(self.score, self.recount_score());
        AdvanceOutcome::Finished {
            score: self.score,
            total: self.questions.len(),
        }
    }

    /// Recompute the score from the answer record.
    ///
    /// Must always agree with the incrementally maintained `score`.
    #[must_use]
    pub fn recount_score(&self) -> u32 {
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

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("topic", &self.topic)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("score", &self.score)
            .field("stage", &self.stage)
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
