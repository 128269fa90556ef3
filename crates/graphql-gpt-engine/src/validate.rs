//! Check synthesized queries before sending them

use apollo_compiler::ast::{Definition, Document};
use apollo_compiler::{ExecutableDocument, Schema};
use tracing::debug;

use crate::errors::ValidationError;

/// Validates a query against the schema when the schema is usable SDL,
/// or only checks its syntax otherwise
pub fn validate_query(schema: &str, query: &str) -> Result<(), ValidationError> {
    if schema.trim().is_empty() {
        return check_syntax(query);
    }

    match Schema::parse_and_validate(schema, "schema.graphql") {
        Ok(schema) => ExecutableDocument::parse_and_validate(&schema, query, "query.graphql")
            .map(|_| ())
            .map_err(|e| ValidationError::Query(Box::new(e))),
        Err(e) => {
            debug!("Schema is not valid SDL, checking query syntax only: {e}");
            check_syntax(query)
        }
    }
}

fn check_syntax(query: &str) -> Result<(), ValidationError> {
    let document =
        Document::parse(query, "query.graphql").map_err(|e| ValidationError::Syntax(Box::new(e)))?;

    if document
        .definitions
        .iter()
        .any(|definition| matches!(definition, Definition::OperationDefinition(_)))
    {
        Ok(())
    } else {
        Err(ValidationError::NoOperation)
    }
}
