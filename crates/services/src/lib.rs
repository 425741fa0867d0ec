#![forbid(unsafe_code)]

pub mod error;
pub mod history_service;
pub mod question_source;
pub mod quiz_service;

pub use quiz_core::Clock;

pub use error::{QuestionSourceError, QuizServiceError};
pub use history_service::{AttemptListItem, HistoryService};
pub use question_source::{
    GenerationRequest, OpenAiQuestionSource, QuestionSource, QuestionSourceConfig,
};
pub use quiz_service::{DEFAULT_NUM_QUESTIONS, Identity, QuizService, SessionAdvanceResult};
