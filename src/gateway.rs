//! Quest generation gateway: one chat.completions call that returns a small batch
//! of quest candidates.
//!
//! The call is instrumented and logs the model name, latency, token usage and
//! response size (not contents). Failures are reported as `GenerationError`; there
//! is no retry, caching or rate limiting.
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::config::Prompts;
use crate::domain::GeneratedQuestCandidate;
use crate::util::{fill_template, trunc_for_log};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Every way a generation attempt can fail.
#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("generation disabled (no OPENAI_API_KEY)")]
  Disabled,
  #[error("transport error: {0}")]
  Transport(String),
  #[error("provider HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("provider returned an empty completion")]
  EmptyResponse,
  #[error("malformed quest payload: {0}")]
  Malformed(String),
}

impl From<reqwest::Error> for GenerationError {
  fn from(e: reqwest::Error) -> Self {
    GenerationError::Transport(e.to_string())
  }
}

/// Source of fresh quest candidates.
#[async_trait]
pub trait QuestGateway: Send + Sync {
  async fn fetch_daily_quests(&self) -> Result<Vec<GeneratedQuestCandidate>, GenerationError>;
}

/// OpenAI-compatible chat.completions client.
#[derive(Clone)]
pub struct OpenAiGateway {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  prompts: Prompts,
  quest_count: usize,
}

impl OpenAiGateway {
  pub fn new(
    api_key: String,
    base_url: String,
    model: String,
    prompts: Prompts,
    quest_count: usize,
  ) -> Result<Self, GenerationError> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Self { client, api_key, base_url, model, prompts, quest_count })
  }

  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts, quest_count: usize) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    match Self::new(api_key, base_url, model, prompts, quest_count) {
      Ok(gw) => Some(gw),
      Err(e) => {
        error!(target: "homequest_backend", error = %e, "Failed to build HTTP client for generation");
        None
      }
    }
  }

  /// JSON-object chat completion; returns the raw message text.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json_text(&self, system: &str, user: &str, temperature: f32) -> Result<String, GenerationError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "homequest-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(GenerationError::Status { status, message });
    }

    let body: ChatCompletionResponse = res
      .json()
      .await
      .map_err(|e| GenerationError::Malformed(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default();
    if text.trim().is_empty() {
      return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
  }
}

#[async_trait]
impl QuestGateway for OpenAiGateway {
  #[instrument(level = "info", skip(self), fields(model = %self.model, count = self.quest_count))]
  async fn fetch_daily_quests(&self) -> Result<Vec<GeneratedQuestCandidate>, GenerationError> {
    let count = self.quest_count.to_string();
    let user = fill_template(&self.prompts.user_template, &[("count", &count)]);
    let start = std::time::Instant::now();
    let result = self.chat_json_text(&self.prompts.system, &user, 0.9).await;
    let elapsed = start.elapsed();

    let text = match result {
      Ok(t) => {
        info!(?elapsed, response_len = t.len(), "Model response received successfully");
        t
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during quest generation");
        return Err(e);
      }
    };

    let candidates = parse_candidates(&text)?;
    debug!(
      count = candidates.len(),
      labels = ?candidates.iter().map(|c| c.difficulty.as_str()).collect::<Vec<_>>(),
      "Parsed quest candidates"
    );
    Ok(candidates)
  }
}

/// Models answer either `{"quests": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum QuestBatch {
  Wrapped { quests: Vec<GeneratedQuestCandidate> },
  Bare(Vec<GeneratedQuestCandidate>),
}

/// Parse a model completion into candidates.
pub fn parse_candidates(text: &str) -> Result<Vec<GeneratedQuestCandidate>, GenerationError> {
  match serde_json::from_str::<QuestBatch>(text.trim()) {
    Ok(QuestBatch::Wrapped { quests }) | Ok(QuestBatch::Bare(quests)) => Ok(quests),
    Err(e) => Err(GenerationError::Malformed(format!("{} in {}", e, trunc_for_log(text, 120)))),
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn gateway(server: &MockServer) -> OpenAiGateway {
    OpenAiGateway::new("sk-test".into(), format!("{}/v1", server.uri()), "test-model".into(), Prompts::default(), 3)
      .unwrap()
  }

  fn completion(content: &str) -> serde_json::Value {
    json!({
      "choices": [{ "message": { "role": "assistant", "content": content } }],
      "usage": { "prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30 }
    })
  }

  #[tokio::test]
  async fn fetches_and_parses_wrapped_batch() {
    let server = MockServer::start().await;
    let content = json!({ "quests": [
      { "title": "쉬움", "content": "물 한 잔 마시기!", "difficulty": "Easy" },
      { "title": "보통", "content": "방 정리하기!", "difficulty": 2 },
      { "title": "어려움", "content": "요리하기!", "difficulty": "Hard" }
    ]}).to_string();

    Mock::given(method("POST"))
      .and(path("/v1/chat/completions"))
      .and(header("authorization", "Bearer sk-test"))
      .and(body_partial_json(json!({ "model": "test-model", "response_format": { "type": "json_object" } })))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion(&content)))
      .expect(1)
      .mount(&server)
      .await;

    let quests = gateway(&server).fetch_daily_quests().await.unwrap();
    assert_eq!(quests.len(), 3);
    assert_eq!(quests[0].title, "쉬움");
    assert_eq!(quests[1].difficulty, "2");
    assert_eq!(quests[2].content, "요리하기!");
  }

  #[tokio::test]
  async fn prompt_carries_requested_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"quests": []}"#)))
      .mount(&server)
      .await;

    let quests = gateway(&server).fetch_daily_quests().await.unwrap();
    assert!(quests.is_empty());

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert!(user.starts_with("Create 3 daily quests"));
  }

  #[tokio::test]
  async fn non_success_status_extracts_provider_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(429).set_body_json(json!({ "error": { "message": "Rate limit reached" } })))
      .mount(&server)
      .await;

    match gateway(&server).fetch_daily_quests().await {
      Err(GenerationError::Status { status, message }) => {
        assert_eq!(status, 429);
        assert_eq!(message, "Rate limit reached");
      }
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[tokio::test]
  async fn unexpected_shape_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"tasks": "none"}"#)))
      .mount(&server)
      .await;

    let err = gateway(&server).fetch_daily_quests().await.unwrap_err();
    assert!(matches!(err, GenerationError::Malformed(_)));
  }

  #[tokio::test]
  async fn empty_completion_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
      .mount(&server)
      .await;

    let err = gateway(&server).fetch_daily_quests().await.unwrap_err();
    assert!(matches!(err, GenerationError::EmptyResponse));
  }

  #[tokio::test]
  async fn unreachable_host_is_transport_error() {
    let gw = OpenAiGateway::new("k".into(), "http://127.0.0.1:9".into(), "m".into(), Prompts::default(), 3).unwrap();
    let err = gw.fetch_daily_quests().await.unwrap_err();
    assert!(matches!(err, GenerationError::Transport(_)));
  }

  #[test]
  fn parse_candidates_accepts_bare_array() {
    let quests = parse_candidates(r#"[{"title":"a","content":"b","difficulty":"1"}]"#).unwrap();
    assert_eq!(quests.len(), 1);
    assert!(parse_candidates("not json").is_err());
  }
}
