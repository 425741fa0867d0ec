use std::collections::HashSet;
use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use quiz_core::model::{Question, QuestionDraft};

use crate::error::QuestionSourceError;

/// Parameters for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub topic: String,
    pub num_questions: u32,
    /// Question texts the generator is advised to avoid repeating.
    ///
    /// Best-effort hint only; the provider may ignore it.
    pub exclude_questions: HashSet<String>,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(topic: impl Into<String>, num_questions: u32) -> Self {
        Self {
            topic: topic.into(),
            num_questions,
            exclude_questions: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_exclusions(mut self, exclude_questions: HashSet<String>) -> Self {
        self.exclude_questions = exclude_questions;
        self
    }
}

/// Source of generated multiple-choice questions.
///
/// Implementations may return fewer questions than requested. Every
/// returned question has already passed domain validation; anything the
/// provider produced that violates the options/correct-answer invariant
/// surfaces as an error instead.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Generate up to `num_questions` questions for the topic.
    ///
    /// # Errors
    ///
    /// Returns `QuestionSourceError` on transport failures, malformed
    /// provider output, or invalid questions.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<Question>, QuestionSourceError>;
}

#[derive(Clone, Debug)]
pub struct QuestionSourceConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl QuestionSourceConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUIZ_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("QUIZ_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("QUIZ_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Question source backed by an OpenAI-compatible chat completion endpoint.
#[derive(Clone)]
pub struct OpenAiQuestionSource {
    client: Client,
    config: Option<QuestionSourceConfig>,
}

impl OpenAiQuestionSource {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(QuestionSourceConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<QuestionSourceConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl QuestionSource for OpenAiQuestionSource {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<Question>, QuestionSourceError> {
        let config = self
            .config
            .as_ref()
            .ok_or(QuestionSourceError::Disabled)?;

        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(request),
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QuestionSourceError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(QuestionSourceError::EmptyResponse)?;

        parse_questions(&content)
    }
}

/// Parse the provider's JSON payload into validated questions.
///
/// # Errors
///
/// Returns `MalformedResponse` if the payload is not the expected JSON
/// shape, or `InvalidQuestion` if a question fails domain validation.
pub fn parse_questions(content: &str) -> Result<Vec<Question>, QuestionSourceError> {
    let stripped = strip_code_fences(content);
    let payload: QuestionsPayload = serde_json::from_str(stripped)
        .map_err(|e| QuestionSourceError::MalformedResponse(e.to_string()))?;

    payload
        .questions
        .into_iter()
        .map(|dto| {
            QuestionDraft {
                question: dto.question,
                options: dto.options,
                correct_answer: dto.correct_answer,
                explanation: dto.explanation,
            }
            .validate()
            .map_err(QuestionSourceError::from)
        })
        .collect()
}

fn build_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "You are an expert quiz writer. Generate multiple-choice questions \
         based on the given topic. Each question should have 4 options, one of \
         which is the correct answer. The questions should be diverse and cover \
         different aspects of the topic.\n\n\
         Topic: {topic}\n\
         Number of Questions: {count}\n\n\
         Output the questions as a JSON object with a \"questions\" array, where \
         each element has \"question\", \"options\", \"correctAnswer\", and an \
         optional brief \"explanation\". Make sure that the correct answer is \
         one of the options provided. Respond with the JSON only.\n",
        topic = request.topic,
        count = request.num_questions,
    );

    if !request.exclude_questions.is_empty() {
        // Sorted so the prompt is deterministic for a given exclusion set.
        let mut seen: Vec<&str> = request
            .exclude_questions
            .iter()
            .map(String::as_str)
            .collect();
        seen.sort_unstable();
        prompt.push_str("\nAvoid repeating any of these previously asked questions:\n");
        for question in seen {
            prompt.push_str("- ");
            prompt.push_str(question);
            prompt.push('\n');
        }
    }

    prompt
}

/// Remove a surrounding markdown code fence, if present.
///
/// Chat models often wrap JSON output in ```json fences even when asked
/// not to.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuestionsPayload {
    questions: Vec<QuestionDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionDto {
    question: String,
    options: Vec<String>,
    correct_answer: String,
    #[serde(default)]
    explanation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_PAYLOAD: &str = r#"{
        "questions": [
            {
                "question": "What is the capital of Kerala?",
                "options": ["Thiruvananthapuram", "Kochi", "Kozhikode", "Thrissur"],
                "correctAnswer": "Thiruvananthapuram",
                "explanation": "Thiruvananthapuram is the state capital."
            }
        ]
    }"#;

    #[test]
    fn parses_valid_payload() {
        let questions = parse_questions(VALID_PAYLOAD).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_answer(), "Thiruvananthapuram");
    }

    #[test]
    fn strips_markdown_fences() {
        let fenced = format!("```json\n{VALID_PAYLOAD}\n```");
        let questions = parse_questions(&fenced).unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn rejects_non_json_output() {
        let err = parse_questions("Sorry, I cannot help with that.").unwrap_err();
        assert!(matches!(err, QuestionSourceError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_question_with_missing_correct_answer() {
        let payload = r#"{
            "questions": [
                {
                    "question": "Q",
                    "options": ["A", "B"],
                    "correctAnswer": "C"
                }
            ]
        }"#;
        let err = parse_questions(payload).unwrap_err();
        assert!(matches!(err, QuestionSourceError::InvalidQuestion(_)));
    }

    #[test]
    fn empty_questions_array_parses_to_empty_list() {
        let questions = parse_questions(r#"{"questions": []}"#).unwrap();
        assert!(questions.is_empty());
    }

    #[test]
    fn prompt_embeds_topic_count_and_sorted_exclusions() {
        let request = GenerationRequest::new("History of Kerala", 10).with_exclusions(
            ["Q-b".to_string(), "Q-a".to_string()].into_iter().collect(),
        );
        let prompt = build_prompt(&request);
        assert!(prompt.contains("Topic: History of Kerala"));
        assert!(prompt.contains("Number of Questions: 10"));
        let a = prompt.find("- Q-a").unwrap();
        let b = prompt.find("- Q-b").unwrap();
        assert!(a < b);
    }

    #[test]
    fn prompt_omits_exclusion_block_when_empty() {
        let prompt = build_prompt(&GenerationRequest::new("T", 5));
        assert!(!prompt.contains("Avoid repeating"));
    }

    #[test]
    fn disabled_source_reports_disabled() {
        let source = OpenAiQuestionSource::new(None);
        assert!(!source.enabled());
    }
}
