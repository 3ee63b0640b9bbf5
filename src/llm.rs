//! Language-model collaborator used to compose free-text answers.
//!
//! The query boundary only needs `complete(system_prompt, user_prompt)`.
//! [`create_model`] selects an implementation from [`LlmConfig`]:
//!
//! | Provider | Implementation |
//! |----------|----------------|
//! | `disabled` | [`DisabledModel`], every call fails with `NotConfigured` |
//! | `openai` | [`OpenAiChatModel`], any OpenAI-compatible `/chat/completions` endpoint |
//!
//! Calls are never retried. A failure is returned to the caller, which
//! reports it instead of answering.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

/// Persona used when `llm.system_prompt` is not set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Ești asistentul tehnic și comercial al unui magazin de scule. \
Răspunde scurt, practic și în română. Folosește doar informațiile din fragmentele de catalog primite; \
nu inventa prețuri sau coduri. Când ajută, propune câteva opțiuni, fiecare cu denumire, cod (dacă apare \
în surse) și un atribut cheie. Dacă fragmentele nu conțin răspunsul, cere o clarificare.";

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("language model is disabled (llm.provider = \"disabled\")")]
    NotConfigured,
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response contained no choices")]
    EmptyResponse,
}

/// Prompt in, free text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CollaboratorError>;
}

pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::NotConfigured)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions over HTTP.
///
/// The API key is read once at construction from the environment variable
/// named by `llm.api_key_env`; a missing key only fails the calls that need it.
/// Unless `use_system_proxy` is set, proxy environment variables are ignored
/// by this client (the process environment itself is left alone).
pub struct OpenAiChatModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key_env: String,
    api_key: Option<String>,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self, CollaboratorError> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key_env: config.api_key_env.clone(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CollaboratorError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CollaboratorError::MissingApiKey(self.api_key_env.clone()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = response.json().await?;
        first_choice_text(body)
    }
}

fn first_choice_text(body: ChatResponse) -> Result<String, CollaboratorError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or(CollaboratorError::EmptyResponse)?;
    Ok(choice.message.content.unwrap_or_default())
}

/// Build the collaborator named by `config.provider`.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>, CollaboratorError> {
    if !config.is_enabled() {
        tracing::debug!("language model disabled");
        return Ok(Arc::new(DisabledModel));
    }
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChatModel::new(config)?)),
        _ => Ok(Arc::new(DisabledModel)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_model_reports_not_configured() {
        let model = create_model(&LlmConfig::default()).unwrap();
        let err = model.complete("s", "u").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotConfigured));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            api_key_env: "KIOSK_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            base_url: "http://127.0.0.1:9/v1/".to_string(),
            ..LlmConfig::default()
        };
        let model = OpenAiChatModel::new(&config).unwrap();
        assert_eq!(model.endpoint(), "http://127.0.0.1:9/v1/chat/completions");

        let err = model.complete("s", "u").await.unwrap_err();
        match err {
            CollaboratorError::MissingApiKey(var) => {
                assert_eq!(var, "KIOSK_TEST_KEY_THAT_IS_NEVER_SET")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn request_has_system_then_user_message() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "persona",
                },
                ChatMessage {
                    role: "user",
                    content: "Întrebare: ciocan",
                },
            ],
            temperature: 0.2,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Întrebare: ciocan");
    }

    #[test]
    fn response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Ciocan C-100"}}]}"#;
        let body: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(first_choice_text(body).unwrap(), "Ciocan C-100");

        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let body: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(first_choice_text(body).unwrap(), "");

        let body: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_choice_text(body), Err(CollaboratorError::EmptyResponse)));
    }
}
