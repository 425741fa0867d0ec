use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use quiz_core::model::{
    AttemptId, Question, QuestionDraft, QuizAttempt, QuizSession, SubmitOutcome, UserId,
};
use quiz_core::time::{fixed_clock, fixed_now};
use services::error::{QuestionSourceError, QuizServiceError};
use services::{GenerationRequest, HistoryService, Identity, QuestionSource, QuizService};
use storage::repository::{AttemptRow, HistoryRepository, InMemoryRepository, StorageError};

fn build_question(text: &str, correct: &str) -> Question {
    QuestionDraft {
        question: text.into(),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct_answer: correct.into(),
        explanation: None,
    }
    .validate()
    .unwrap()
}

fn user_identity(id: &str) -> Identity {
    Identity::User(UserId::new(id).unwrap())
}

/// Question source returning canned questions and capturing the request.
struct StaticSource {
    questions: Vec<Question>,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl StaticSource {
    fn new(questions: Vec<Question>) -> Arc<Self> {
        Arc::new(Self {
            questions,
            last_request: Mutex::new(None),
        })
    }

    fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionSource for StaticSource {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<Question>, QuestionSourceError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self.questions.clone())
    }
}

/// History store whose every operation fails.
struct FailingHistory;

#[async_trait]
impl HistoryRepository for FailingHistory {
    async fn append_attempt(&self, _attempt: &QuizAttempt) -> Result<AttemptId, StorageError> {
        Err(StorageError::Connection("history unavailable".into()))
    }

    async fn list_attempts(&self, _user_id: &UserId) -> Result<Vec<AttemptRow>, StorageError> {
        Err(StorageError::Connection("history unavailable".into()))
    }

    async fn get_attempt(
        &self,
        _user_id: &UserId,
        _id: AttemptId,
    ) -> Result<AttemptRow, StorageError> {
        Err(StorageError::Connection("history unavailable".into()))
    }
}

/// Drive one question: select the choice, submit, advance through the service.
fn answer_and_advance(
    service: &QuizService,
    session: &mut QuizSession,
    identity: &Identity,
    choice: &str,
) -> services::SessionAdvanceResult {
    session.select_option(choice);
    assert!(matches!(session.submit(), SubmitOutcome::Scored { .. }));
    service.advance_current(session, identity).unwrap()
}

#[tokio::test]
async fn full_quiz_flow_scores_persists_and_lists() {
    let source = StaticSource::new(vec![
        build_question("Q1", "A"),
        build_question("Q2", "A"),
        build_question("Q3", "A"),
    ]);
    let repo = Arc::new(InMemoryRepository::new());
    let service = QuizService::new(fixed_clock(), source, repo.clone());
    let identity = user_identity("u1");

    let mut session = service
        .start_quiz(&identity, "History of Kerala", 3)
        .await
        .unwrap();

    // correct, wrong, correct
    let r1 = answer_and_advance(&service, &mut session, &identity, "A");
    assert!(!r1.is_complete);
    let r2 = answer_and_advance(&service, &mut session, &identity, "B");
    assert!(!r2.is_complete);
    let r3 = answer_and_advance(&service, &mut session, &identity, "A");
    assert!(r3.is_complete);

    let attempt = r3.attempt.expect("signed-in completion snapshots an attempt");
    assert_eq!(attempt.score(), 2);
    assert_eq!(attempt.total(), 3);
    assert_eq!(attempt.percentage(), 67);

    let id = r3
        .persist
        .expect("persistence task spawned")
        .await
        .unwrap()
        .unwrap();

    let history = HistoryService::new(repo);
    let items = history.list_history(&identity).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, id);
    assert_eq!(items[0].topic, "History of Kerala");
    assert_eq!(items[0].percentage, 67);

    let detail = history.attempt_detail(&identity, id).await.unwrap();
    assert_eq!(detail.attempt, attempt);
}

#[tokio::test]
async fn empty_generation_is_a_failure_and_no_session_exists() {
    let source = StaticSource::new(Vec::new());
    let repo = Arc::new(InMemoryRepository::new());
    let service = QuizService::new(fixed_clock(), source, repo);

    let err = service
        .start_quiz(&user_identity("u1"), "Anything", 10)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizServiceError::Generation(QuestionSourceError::EmptyResponse)
    ));
}

#[tokio::test]
async fn blank_topic_is_rejected_before_generation() {
    let source = StaticSource::new(vec![build_question("Q1", "A")]);
    let repo = Arc::new(InMemoryRepository::new());
    let service = QuizService::new(fixed_clock(), source.clone(), repo);

    let err = service
        .start_quiz(&user_identity("u1"), "   ", 10)
        .await
        .unwrap_err();
    assert!(matches!(err, QuizServiceError::EmptyTopic));
    assert!(source.last_request().is_none());
}

async fn complete_attempt(
    repo: &Arc<InMemoryRepository>,
    user: &str,
    topic: &str,
    question_texts: &[&str],
) {
    let questions = question_texts
        .iter()
        .map(|text| build_question(text, "A"))
        .collect();
    let mut session = QuizSession::new(topic, questions, fixed_now()).unwrap();
    while !session.is_finished() {
        session.select_option("A");
        session.submit();
        session.advance(fixed_now());
    }
    let attempt = QuizAttempt::from_session(UserId::new(user).unwrap(), &session).unwrap();
    repo.append_attempt(&attempt).await.unwrap();
}

#[tokio::test]
async fn exclusions_cover_exactly_the_topics_prior_questions() {
    let repo = Arc::new(InMemoryRepository::new());
    // Two prior attempts on T with an overlapping question, one on another topic.
    complete_attempt(&repo, "u1", "T", &["Q1", "Q2"]).await;
    complete_attempt(&repo, "u1", "T", &["Q1"]).await;
    complete_attempt(&repo, "u1", "Other", &["Q9"]).await;

    let source = StaticSource::new(vec![build_question("Q3", "A")]);
    let service = QuizService::new(fixed_clock(), source.clone(), repo);

    service
        .start_quiz(&user_identity("u1"), "T", 5)
        .await
        .unwrap();

    let request = source.last_request().unwrap();
    let expected: HashSet<String> = ["Q1".to_string(), "Q2".to_string()].into_iter().collect();
    assert_eq!(request.exclude_questions, expected);
}

#[tokio::test]
async fn exclusions_match_topics_exactly_not_fuzzily() {
    let repo = Arc::new(InMemoryRepository::new());
    complete_attempt(&repo, "u1", "Kerala History", &["Q1"]).await;

    let source = StaticSource::new(vec![build_question("Q2", "A")]);
    let service = QuizService::new(fixed_clock(), source.clone(), repo);

    service
        .start_quiz(&user_identity("u1"), "History of Kerala", 5)
        .await
        .unwrap();

    assert!(source.last_request().unwrap().exclude_questions.is_empty());
}

#[tokio::test]
async fn history_read_failure_never_blocks_generation() {
    let source = StaticSource::new(vec![build_question("Q1", "A")]);
    let service = QuizService::new(fixed_clock(), source.clone(), Arc::new(FailingHistory));

    let session = service
        .start_quiz(&user_identity("u1"), "T", 5)
        .await
        .expect("generation proceeds with empty exclusion set");
    assert_eq!(session.total(), 1);
    assert!(source.last_request().unwrap().exclude_questions.is_empty());
}

#[tokio::test]
async fn persist_failure_does_not_block_completion() {
    let source = StaticSource::new(vec![build_question("Q1", "A")]);
    let service = QuizService::new(fixed_clock(), source, Arc::new(FailingHistory));
    let identity = user_identity("u1");

    let mut session = service.start_quiz(&identity, "T", 1).await.unwrap();
    let result = answer_and_advance(&service, &mut session, &identity, "A");

    // Completion already happened; the append failure is observable on the
    // detached task, not on the user flow.
    assert!(result.is_complete);
    assert!(result.attempt.is_some());
    let appended = result.persist.unwrap().await.unwrap();
    assert!(matches!(appended, Err(StorageError::Connection(_))));
}

#[tokio::test]
async fn anonymous_users_take_quizzes_without_history() {
    let source = StaticSource::new(vec![build_question("Q1", "A")]);
    let repo = Arc::new(InMemoryRepository::new());
    let service = QuizService::new(fixed_clock(), source.clone(), repo.clone());

    let mut session = service
        .start_quiz(&Identity::Anonymous, "T", 1)
        .await
        .unwrap();
    assert!(source.last_request().unwrap().exclude_questions.is_empty());

    let result = answer_and_advance(&service, &mut session, &Identity::Anonymous, "A");
    assert!(result.is_complete);
    assert!(result.attempt.is_none());
    assert!(result.persist.is_none());

    let history = HistoryService::new(repo);
    let err = history.list_history(&Identity::Anonymous).await.unwrap_err();
    assert!(matches!(err, QuizServiceError::AuthenticationRequired));
}

#[tokio::test]
async fn random_answer_sequences_keep_scores_consistent() {
    use rand::Rng;

    let mut rng = rand::rng();
    for _ in 0..50 {
        let n = rng.random_range(1..=8);
        let questions: Vec<Question> = (0..n)
            .map(|i| {
                let correct = ["A", "B", "C", "D"][rng.random_range(0..4)];
                build_question(&format!("Q{i}"), correct)
            })
            .collect();
        let mut session = QuizSession::new("T", questions.clone(), fixed_now()).unwrap();

        let mut expected = 0;
        for question in &questions {
            let choice = ["A", "B", "C", "D"][rng.random_range(0..4)];
            if question.is_correct(choice) {
                expected += 1;
            }
            session.select_option(choice);
            session.submit();
            session.advance(fixed_now());
        }

        assert!(session.is_finished());
        assert_eq!(session.score(), expected);
        assert_eq!(session.recount_score(), expected);
    }
}
