//! Runtime utilities
//!
//! This module is only used by the binaries and provides configuration,
//! logging and console helpers.

mod config;
mod console;
mod endpoint;
mod logging;

use std::path::Path;
use std::sync::Arc;

pub use config::{Config, ConfigError};
pub use console::{Console, QUESTION_PROMPT};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use graphql_gpt_engine::completion::{DecodingParameters, OpenAiClient};
use graphql_gpt_engine::graphql::QueryExecutor;
use graphql_gpt_engine::pipeline::Engine;
use graphql_gpt_engine::schema::SchemaProvider;
use graphql_gpt_engine::summarize::ResultSummarizer;
use graphql_gpt_engine::synthesize::QuerySynthesizer;
use graphql_gpt_engine::token_counting::TokenCounter;
use tracing_appender::non_blocking::WorkerGuard;

/// Prefix of the environment variables read into the config
const ENV_PREFIX: &str = "GQL_GPT_";

/// Separator to use when drilling down into nested options in the env figment
const ENV_NESTED_SEPARATOR: &str = "__";

/// Read configuration from environment variables only (when no config file is provided)
#[allow(clippy::result_large_err)]
pub fn read_config_from_env() -> Result<Config, figment::Error> {
    Figment::new()
        .join(openai_common_env())
        .join(Env::prefixed(ENV_PREFIX).split(ENV_NESTED_SEPARATOR))
        .extract()
}

/// Read in a config from a YAML file, filling in any missing values from the environment
#[allow(clippy::result_large_err)]
pub fn read_config(yaml_path: impl AsRef<Path>) -> Result<Config, figment::Error> {
    Figment::new()
        .join(openai_common_env())
        .join(Env::prefixed(ENV_PREFIX).split(ENV_NESTED_SEPARATOR))
        .join(Yaml::file(yaml_path))
        .extract()
}

/// Install the tracing subscriber described by the config
pub fn setup_logging(config: &Config) -> Result<Option<WorkerGuard>, anyhow::Error> {
    config.logging.init()
}

/// Assemble the pipeline described by the config
///
/// Fails when no API key is configured, before any question is asked.
pub fn build_engine(config: &Config) -> Result<Engine, ConfigError> {
    let client = reqwest::Client::new();
    let endpoint = config.endpoint.clone().into_inner();
    let parameters = DecodingParameters::with_max_tokens(config.llm.max_tokens);
    let counter = TokenCounter::for_model(&config.llm.model);

    let service = Arc::new(
        OpenAiClient::builder()
            .api_key(config.llm.api_key()?)
            .url(config.llm.completions_url()?)
            .client(client.clone())
            .build(),
    );

    Ok(Engine::builder()
        .schema_provider(SchemaProvider::new(client.clone(), endpoint.clone()))
        .synthesizer(
            QuerySynthesizer::builder()
                .service(service.clone())
                .model(config.llm.model.clone())
                .counter(counter.clone())
                .parameters(parameters.clone())
                .ceiling(config.llm.context_window)
                .reprompt_limit(config.llm.max_reprompts.into())
                .build(),
        )
        .executor(QueryExecutor::new(client, endpoint, config.headers.clone()))
        .summarizer(
            ResultSummarizer::builder()
                .service(service)
                .model(config.llm.model.clone())
                .counter(counter)
                .parameters(parameters)
                .ceiling(config.llm.context_window)
                .build(),
        )
        .instruction(config.llm.instruction.clone())
        .validate_queries(config.validate_queries)
        .build())
}

/// Figment provider that maps the common OpenAI environment variables into
/// the nested structure needed by the config
fn openai_common_env() -> Env {
    Env::prefixed("OPENAI_")
        .only(&["api_key", "model"])
        .map(|key| match key.to_string().to_lowercase().as_str() {
            "api_key" => "LLM:API_KEY".into(),
            "model" => "LLM:MODEL".into(),

            // Filtered out by `only`, passed through unchanged
            other => other.to_string().into(),
        })
        .split(":")
}

#[cfg(test)]
mod test {
    use super::{build_engine, read_config, read_config_from_env};
    use secrecy::ExposeSecret;

    #[test]
    fn it_prioritizes_env_vars() {
        let config = r#"
            endpoint: http://from_file:4000/graphql
        "#;

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";
            let endpoint = "https://from_env:4000/graphql";

            jail.create_file(path, config)?;
            jail.set_env("GQL_GPT_ENDPOINT", endpoint);

            let config = read_config(path)?;

            assert_eq!(config.endpoint.as_str(), endpoint);
            Ok(())
        });
    }

    #[test]
    fn it_extracts_nested_env() {
        let config = r#"
            llm:
                context_window: 8192
        "#;

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";

            jail.create_file(path, config)?;
            jail.set_env("GQL_GPT_LLM__CONTEXT_WINDOW", "32768");

            let config = read_config(path)?;

            assert_eq!(config.llm.context_window, 32768);
            Ok(())
        });
    }

    #[test]
    fn it_merges_env_and_file() {
        let config = "
            endpoint: http://from_file:4000/graphql
        ";

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";

            jail.create_file(path, config)?;
            jail.set_env("GQL_GPT_VALIDATE_QUERIES", "true");

            let config = read_config(path)?;

            assert_eq!(config.endpoint.as_str(), "http://from_file:4000/graphql");
            assert!(config.validate_queries);
            Ok(())
        });
    }

    #[test]
    fn it_reads_openai_variables() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("OPENAI_API_KEY", "sk-from-env");
            jail.set_env("OPENAI_MODEL", "gpt-4o");

            let config = read_config_from_env()?;

            assert_eq!(config.llm.model, "gpt-4o");
            assert_eq!(
                config.llm.api_key().map(|key| key.expose_secret().to_string()).ok(),
                Some("sk-from-env".to_string())
            );
            Ok(())
        });
    }

    #[test]
    fn it_requires_an_api_key_to_build() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            let config = read_config_from_env()?;

            assert!(build_engine(&config).is_err());
            Ok(())
        });
    }

    #[test]
    fn it_builds_with_an_api_key() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("OPENAI_API_KEY", "sk-from-env");

            let config = read_config_from_env()?;

            assert!(build_engine(&config).is_ok());
            Ok(())
        });
    }
}
