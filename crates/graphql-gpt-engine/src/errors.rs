use apollo_compiler::{ExecutableDocument, ast::Document, validation::WithErrors};
use reqwest::StatusCode;

/// An error fetching the GraphQL schema
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Failed to fetch GraphQL schema: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("GraphQL schema endpoint returned {status}")]
    Status { status: StatusCode },
}

/// An error from the LLM completion service
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Failed to send completion request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Completion service returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Could not decode completion response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Completion service returned no choices")]
    NoChoices,
}

/// A synthesized query that failed validation
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Query does not match the schema: {0}")]
    Query(Box<WithErrors<ExecutableDocument>>),

    #[error("Could not parse GraphQL query: {0}")]
    Syntax(Box<WithErrors<Document>>),

    #[error("Query defines no operation")]
    NoOperation,
}

/// A fatal error while answering a question
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Question is too long: {total} tokens against a budget of {ceiling}")]
    BudgetExceeded { total: usize, ceiling: usize },

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Synthesized query is not valid GraphQL: {0}")]
    QueryValidation(#[from] ValidationError),

    #[error("Could not read question: {0}")]
    Input(#[from] std::io::Error),
}
