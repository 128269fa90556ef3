//! Execute synthesized GraphQL queries

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

/// Why a query produced no usable result
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionFailure {
    #[error("Failed to send GraphQL request: {0}")]
    Transport(String),

    #[error("GraphQL endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to read GraphQL response body: {0}")]
    MalformedResponse(String),
}

/// The result of running a query against the endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success(Value),
    Failure(ExecutionFailure),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }
}

/// Posts queries to a GraphQL endpoint
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    client: reqwest::Client,
    endpoint: Url,
    headers: HeaderMap,
}

impl QueryExecutor {
    pub fn new(client: reqwest::Client, endpoint: Url, headers: HeaderMap) -> Self {
        let headers = {
            let mut headers = headers;
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers
        };
        Self {
            client,
            endpoint,
            headers,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Execute `query`, returning the parsed response body on success
    ///
    /// Only a 2xx response with a JSON body counts as success. The body is
    /// returned as sent, including any `errors` entry the endpoint reports
    /// alongside data.
    pub async fn execute(&self, query: &str) -> ExecutionOutcome {
        let outcome = self.send(query).await;
        if let ExecutionOutcome::Failure(failure) = &outcome {
            error!("{failure}");
        }
        outcome
    }

    async fn send(&self, query: &str) -> ExecutionOutcome {
        debug!("Executing GraphQL query against {}", self.endpoint);

        let request_body = serde_json::json!({ "query": query });
        let response = match self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .body(request_body.to_string())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ExecutionOutcome::Failure(ExecutionFailure::Transport(e.to_string())),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return ExecutionOutcome::Failure(ExecutionFailure::MalformedResponse(
                    e.to_string(),
                ));
            }
        };

        if !status.is_success() {
            return ExecutionOutcome::Failure(ExecutionFailure::Status { status, body });
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(json) => ExecutionOutcome::Success(json),
            Err(e) => ExecutionOutcome::Failure(ExecutionFailure::MalformedResponse(e.to_string())),
        }
    }
}
