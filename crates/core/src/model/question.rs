use thiserror::Error;

/// A user's answer to a single question. `None` means not yet answered.
pub type UserAnswer = Option<String>;

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// Unvalidated question data, as received from a generator or a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

impl QuestionDraft {
    /// Validate the draft into a `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text is blank, fewer than two options
    /// are present, an option is blank, or the correct answer is not one of
    /// the options.
    pub fn validate(self) -> Result<Question, QuestionError> {
        if self.question.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if self.options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                len: self.options.len(),
            });
        }
        if self.options.iter().any(|opt| opt.trim().is_empty()) {
            return Err(QuestionError::EmptyOption);
        }
        if !self.options.contains(&self.correct_answer) {
            return Err(QuestionError::CorrectAnswerNotAnOption {
                correct_answer: self.correct_answer,
            });
        }

        let explanation = self
            .explanation
            .filter(|text| !text.trim().is_empty());

        Ok(Question {
            question: self.question,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation,
        })
    }
}

/// An immutable multiple-choice question.
///
/// Invariant: `correct_answer` is always one of `options`. Enforced by
/// `QuestionDraft::validate`, the only way to construct a `Question`, so a
/// question that violates it can never reach a session or a reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    question: String,
    options: Vec<String>,
    correct_answer: String,
    explanation: Option<String>,
}

impl Question {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Exact string-equality check against the correct answer.
    ///
    /// No case or whitespace normalization: option text is the identity.
    #[must_use]
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer == answer
    }
}

//
// ─── QUESTION VALIDATION ERRORS ────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text is empty")]
    EmptyText,

    #[error("question needs at least two options, got {len}")]
    TooFewOptions { len: usize },

    #[error("question has an empty option")]
    EmptyOption,

    #[error("correct answer {correct_answer:?} is not one of the options")]
    CorrectAnswerNotAnOption { correct_answer: String },
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
