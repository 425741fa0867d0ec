mod attempt;
mod ids;
mod question;
mod session;

pub use ids::{AttemptId, ParseIdError, UserId};
pub use question::{Question, QuestionDraft, QuestionError, UserAnswer};

pub use attempt::{AttemptError, QuizAttempt};
pub use session::{AdvanceOutcome, QuizSession, SelectOutcome, SessionError, Stage, SubmitOutcome};
