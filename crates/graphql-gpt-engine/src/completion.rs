//! Chat completion requests and the client that sends them

use async_trait::async_trait;
use bon::bon;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::errors::CompletionError;

/// The OpenAI chat completions endpoint
pub const OPENAI_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// The model used when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Stop sequence shared by every request
pub const STOP_SEQUENCE: &str = "###";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single message of a chat prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling options sent with each request
///
/// The defaults decode greedily so identical prompts give identical output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodingParameters {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub stop: Vec<String>,
}

impl Default for DecodingParameters {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 250,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: vec![STOP_SEQUENCE.to_string()],
        }
    }
}

impl DecodingParameters {
    pub fn with_max_tokens(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            ..Default::default()
        }
    }
}

/// A chat completion request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    #[serde(flatten)]
    pub parameters: DecodingParameters,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn into_first_content(self) -> Result<String, CompletionError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or(CompletionError::NoChoices)
    }
}

/// Something that can complete a chat prompt
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Send the request and return the content of the first choice
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

/// Client for an OpenAI compatible chat completions endpoint
pub struct OpenAiClient {
    client: reqwest::Client,
    url: Url,
    api_key: SecretString,
}

#[bon]
impl OpenAiClient {
    #[builder]
    pub fn new(api_key: SecretString, url: Url, client: Option<reqwest::Client>) -> Self {
        Self {
            client: client.unwrap_or_default(),
            url,
            api_key,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CompletionError::Status { status, body });
        }

        serde_json::from_str::<CompletionResponse>(&body)?.into_first_content()
    }
}
