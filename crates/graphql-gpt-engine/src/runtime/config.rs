use std::collections::HashMap;

use graphql_gpt_engine::completion::{DEFAULT_MODEL, OPENAI_COMPLETIONS_URL};
use graphql_gpt_engine::synthesize::{DEFAULT_INSTRUCTION, DEFAULT_MAX_REPROMPTS};
use graphql_gpt_engine::token_counting::DEFAULT_CONTEXT_WINDOW;
use reqwest::header::HeaderMap;
use schemars::JsonSchema;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use super::{endpoint::Endpoint, logging::Logging};

const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// An error in the runtime configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    EnvironmentVariable(String),

    #[error("Invalid completions URL: {0}")]
    CompletionsUrl(#[from] url::ParseError),
}

/// Configuration for the engine
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// The GraphQL endpoint questions are answered from
    #[schemars(schema_with = "Url::json_schema")]
    pub endpoint: Endpoint,

    /// Headers to include in every GraphQL request
    #[serde(deserialize_with = "parsers::map_from_str")]
    #[schemars(schema_with = "header_map")]
    pub headers: HeaderMap,

    /// Completion service options
    pub llm: LlmConfig,

    /// Logging configuration
    pub logging: Logging,

    /// Check synthesized queries against the schema before executing them
    pub validate_queries: bool,
}

/// Completion service options
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LlmConfig {
    /// The model used for both query synthesis and summarization
    pub model: String,

    /// The completion service API key
    #[schemars(with = "Option<String>")]
    api_key: Option<SecretString>,

    /// The chat completions endpoint
    pub completions_url: String,

    /// Upper bound on tokens generated per completion
    pub max_tokens: u32,

    /// Context window of the model, in tokens
    pub context_window: usize,

    /// Number of shorter questions to ask for before giving up, or null to keep asking
    pub max_reprompts: Option<usize>,

    /// Instruction placed between the schema and the question
    pub instruction: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            completions_url: OPENAI_COMPLETIONS_URL.to_string(),
            max_tokens: 250,
            context_window: DEFAULT_CONTEXT_WINDOW,
            max_reprompts: Some(DEFAULT_MAX_REPROMPTS),
            instruction: DEFAULT_INSTRUCTION.to_string(),
        }
    }
}

impl LlmConfig {
    /// Extract the API key from the config or from the current env
    pub fn api_key(&self) -> Result<SecretString, ConfigError> {
        self.api_key
            .clone()
            .ok_or_else(|| ConfigError::EnvironmentVariable(OPENAI_API_KEY_ENV.to_string()))
    }

    pub fn completions_url(&self) -> Result<Url, ConfigError> {
        Ok(Url::parse(&self.completions_url)?)
    }
}

fn header_map(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
    HashMap::<String, String>::json_schema(generator)
}

mod parsers {
    use std::str::FromStr;

    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
    use serde::Deserializer;

    pub(super) fn map_from_str<'de, D>(deserializer: D) -> Result<HeaderMap, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MapFromStrVisitor;
        impl<'de> serde::de::Visitor<'de> for MapFromStrVisitor {
            type Value = HeaderMap;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a map of header names to values")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut parsed = HeaderMap::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    let key = HeaderName::from_str(&key).map_err(serde::de::Error::custom)?;
                    let value = HeaderValue::from_str(&value).map_err(serde::de::Error::custom)?;
                    parsed.insert(key, value);
                }
                Ok(parsed)
            }
        }

        deserializer.deserialize_map(MapFromStrVisitor)
    }
}
