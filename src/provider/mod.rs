//! Model provider: request composition and the chat-completions client
//!
//! Works with any API implementing the OpenAI chat completions format; the
//! default deployment points at the Hugging Face router. The composer is a
//! pure function so the exact wire shape can be asserted in tests without
//! any network.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, PersonaContract};
use crate::conversation::{PayloadMessage, Role};

/// Sampling parameters, fixed per deployment. Kept tight so replies stay
/// short and predictable enough for the persona contract to hold.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 300,
            temperature: 0.5,
            top_p: 0.9,
        }
    }
}

/// Wire-format chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl From<&PayloadMessage> for ChatMessage {
    fn from(msg: &PayloadMessage) -> Self {
        Self {
            role: match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: msg.content.clone(),
        }
    }
}

/// Chat completion request body.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing credential. Fatal for every exchange until fixed; the
    /// message is deliberately non-technical.
    #[error("API-Schlüssel nicht konfiguriert. Bitte HF_TOKEN setzen.")]
    MissingCredential,

    #[error("Verbindungsfehler: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Fehler ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("Ungültige Antwort: {0}")]
    InvalidResponse(String),
}

/// Build the provider request: exactly one system entry carrying the
/// persona contract, then the projected history in order. Pure, no I/O.
pub fn compose(
    history: &[PayloadMessage],
    persona: &PersonaContract,
    generation: GenerationConfig,
    model: &str,
) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage {
        role: "system",
        content: persona.as_str().to_string(),
    });
    messages.extend(history.iter().map(ChatMessage::from));

    ChatCompletionRequest {
        model: model.to_string(),
        messages,
        max_tokens: generation.max_tokens,
        temperature: generation.temperature,
        top_p: generation.top_p,
    }
}

/// One chat-completion round trip. Implemented by [`HfClient`] and by
/// recording stubs in tests.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Returns the raw text of the first completion choice.
    async fn complete(&self, request: ChatCompletionRequest) -> Result<String, ProviderError>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct HfClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

/// Bound on a single provider round trip, so a hung provider resolves to a
/// failed exchange instead of an indefinite in-flight state.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// How much provider error detail is surfaced into the transcript.
const ERROR_DETAIL_LIMIT: usize = 100;

impl HfClient {
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            base_url: config.provider_base_url.clone(),
            api_key: config.hf_token.clone(),
            client,
        })
    }
}

#[async_trait]
impl CompletionBackend for HfClient {
    async fn complete(&self, request: ChatCompletionRequest) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or(ProviderError::MissingCredential)?;

        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(
            messages = request.messages.len(),
            model = %request.model,
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        // Read the body in full before deciding; error detail comes from it.
        let body = response.text().await?;

        if !status.is_success() {
            let detail: String = body.chars().take(ERROR_DETAIL_LIMIT).collect();
            tracing::error!(status = status.as_u16(), %detail, "provider returned error");
            return Err(ProviderError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("keine choices".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}
