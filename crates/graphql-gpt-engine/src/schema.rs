//! Fetch the GraphQL schema used to ground query synthesis

use tracing::{debug, error};
use url::Url;

use crate::errors::SchemaError;

/// Header placed in front of the schema so the model knows what it is reading
pub const SCHEMA_PREAMBLE: &str = "#Full graphql schema:\n\n";

/// Loads the schema of a GraphQL endpoint from `{endpoint}/schema`
#[derive(Debug, Clone)]
pub struct SchemaProvider {
    client: reqwest::Client,
    endpoint: Url,
}

impl SchemaProvider {
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// The URL the schema is served from
    pub fn schema_url(&self) -> String {
        format!("{}/schema", self.endpoint.as_str().trim_end_matches('/'))
    }

    /// Fetch the schema, returning an error on any transport or HTTP failure
    pub async fn try_fetch(&self) -> Result<String, SchemaError> {
        let url = self.schema_url();
        debug!("Fetching GraphQL schema from {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SchemaError::Status { status });
        }

        let sdl = response.text().await?;
        Ok(format!("{SCHEMA_PREAMBLE}{sdl}"))
    }

    /// Fetch the schema, logging any failure and returning an empty schema instead
    pub async fn fetch(&self) -> String {
        self.try_fetch().await.unwrap_or_else(|e| {
            error!("{e}; continuing without a schema");
            String::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn provider(endpoint: &str) -> SchemaProvider {
        SchemaProvider::new(reqwest::Client::new(), endpoint.parse().unwrap())
    }

    #[test]
    fn schema_url_appends_path() {
        assert_eq!(
            provider("https://api.platform.opentargets.org/api/v4/graphql").schema_url(),
            "https://api.platform.opentargets.org/api/v4/graphql/schema"
        );
        assert_eq!(
            provider("http://localhost:4000/").schema_url(),
            "http://localhost:4000/schema"
        );
    }

    #[tokio::test]
    async fn fetches_schema_with_preamble() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/graphql/schema")
            .with_body("type Query { target(ensemblId: String!): Target }")
            .expect(1)
            .create_async()
            .await;

        let schema = provider(&format!("{}/graphql", server.url()))
            .fetch()
            .await;

        mock.assert_async().await;
        assert_eq!(
            schema,
            "#Full graphql schema:\n\ntype Query { target(ensemblId: String!): Target }"
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn http_error_yields_empty_schema() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/schema")
            .with_status(503)
            .create_async()
            .await;

        let provider = provider(&server.url());

        assert!(matches!(
            provider.try_fetch().await,
            Err(SchemaError::Status { status }) if status.as_u16() == 503
        ));
        assert_eq!(provider.fetch().await, "");
        assert!(logs_contain("continuing without a schema"));
    }

    #[tokio::test]
    #[traced_test]
    async fn transport_error_yields_empty_schema() {
        // Nothing listens on the discard port
        let schema = provider("http://127.0.0.1:9").fetch().await;

        assert_eq!(schema, "");
        assert!(logs_contain("Failed to fetch GraphQL schema"));
    }
}
