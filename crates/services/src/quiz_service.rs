use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinHandle;

use quiz_core::Clock;
use quiz_core::model::{AdvanceOutcome, AttemptId, QuizAttempt, QuizSession, UserId};
use storage::repository::{HistoryRepository, StorageError};

use crate::error::{QuestionSourceError, QuizServiceError};
use crate::question_source::{GenerationRequest, QuestionSource};

/// Number of questions requested when the caller does not specify one.
///
/// Ten keeps generation latency tolerable for an interactive flow.
pub const DEFAULT_NUM_QUESTIONS: u32 = 10;

/// Who is taking the quiz.
///
/// Anonymous users may take a quiz; their attempts are not persisted and
/// no history is consulted for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(UserId),
}

impl Identity {
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Identity::Anonymous => None,
            Identity::User(id) => Some(id),
        }
    }
}

/// Result of advancing past a reviewed question through the orchestrator.
#[derive(Debug)]
pub struct SessionAdvanceResult {
    pub outcome: AdvanceOutcome,
    pub is_complete: bool,
    /// The persisted-shape snapshot, present once a signed-in user's
    /// session finishes.
    pub attempt: Option<QuizAttempt>,
    /// Handle to the detached persistence task, when one was spawned.
    ///
    /// The user flow never waits on it; tests and diagnostics can.
    pub persist: Option<JoinHandle<Result<AttemptId, StorageError>>>,
}

/// Orchestrates quiz startup and completion around a `QuizSession`.
///
/// Owns the clock, the question source, and history access; the session's
/// own select/submit transitions stay with whoever owns the session.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    source: Arc<dyn QuestionSource>,
    history: Arc<dyn HistoryRepository>,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        source: Arc<dyn QuestionSource>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        Self {
            clock,
            source,
            history,
        }
    }

    /// Generate questions for a topic and open a session over them.
    ///
    /// For signed-in users, previously seen question texts on the exact
    /// same topic are passed to the source as an exclusion hint. A history
    /// read failure degrades to an empty exclusion set; it never blocks
    /// generation.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::EmptyTopic` for a blank topic and
    /// `QuizServiceError::Generation` when the source fails, produces an
    /// invalid question, or returns no questions at all.
    pub async fn start_quiz(
        &self,
        identity: &Identity,
        topic: &str,
        num_questions: u32,
    ) -> Result<QuizSession, QuizServiceError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(QuizServiceError::EmptyTopic);
        }

        let exclusions = self.seen_questions(identity, topic).await;
        let request = GenerationRequest::new(topic, num_questions).with_exclusions(exclusions);
        let mut questions = self
            .source
            .generate(&request)
            .await
            .map_err(QuizServiceError::Generation)?;
        // The provider may over-deliver; never show more than was asked for.
        questions.truncate(usize::try_from(num_questions).unwrap_or(usize::MAX));
        if questions.is_empty() {
            return Err(QuizServiceError::Generation(
                QuestionSourceError::EmptyResponse,
            ));
        }

        Ok(QuizSession::new(topic, questions, self.clock.now())?)
    }

    /// Collect the set of question texts this user has already seen for the
    /// topic (exact topic string match).
    ///
    /// Best-effort: anonymous users and history read failures both yield an
    /// empty set.
    pub async fn seen_questions(&self, identity: &Identity, topic: &str) -> HashSet<String> {
        let Some(user_id) = identity.user_id() else {
            return HashSet::new();
        };

        match self.history.list_attempts(user_id).await {
            Ok(rows) => rows
                .iter()
                .filter(|row| row.attempt.topic() == topic)
                .flat_map(|row| row.attempt.questions())
                .map(|question| question.text().to_owned())
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read quiz history; proceeding without exclusions");
                HashSet::new()
            }
        }
    }

    /// Advance past the reviewed question, persisting the attempt when the
    /// session finishes.
    ///
    /// This is the single place a `QuizAttempt` is constructed. For a
    /// signed-in user it is handed to the history store on a detached task
    /// so the completion view is never blocked on durability; a failed
    /// append is reported through the `tracing` sink and the returned task
    /// handle. Anonymous sessions finish without persisting.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Attempt` if the finished session cannot
    /// be snapshotted.
    pub fn advance_current(
        &self,
        session: &mut QuizSession,
        identity: &Identity,
    ) -> Result<SessionAdvanceResult, QuizServiceError> {
        let outcome = session.advance(self.clock.now());

        let mut result = SessionAdvanceResult {
            outcome,
            is_complete: session.is_finished(),
            attempt: None,
            persist: None,
        };

        if matches!(outcome, AdvanceOutcome::Finished { .. }) {
            if let Some(user_id) = identity.user_id() {
                let attempt = QuizAttempt::from_session(user_id.clone(), session)?;
                result.persist = Some(self.spawn_persist(attempt.clone()));
                result.attempt = Some(attempt);
            }
        }

        Ok(result)
    }

    fn spawn_persist(&self, attempt: QuizAttempt) -> JoinHandle<Result<AttemptId, StorageError>> {
        let history = Arc::clone(&self.history);
        tokio::spawn(async move {
            let appended = history.append_attempt(&attempt).await;
            if let Err(err) = &appended {
                tracing::warn!(
                    error = %err,
                    topic = attempt.topic(),
                    user = %attempt.user_id(),
                    "failed to persist quiz attempt"
                );
            }
            appended
        })
    }
}
