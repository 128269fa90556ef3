//! The GraphQL endpoint questions are answered from
//!
//! Both the schema (`{endpoint}/schema`) and query execution are served from
//! this URL, so only `http` and `https` endpoints are accepted.

use std::ops::Deref;

use serde::Deserialize;
use url::Url;

const OPEN_TARGETS_ENDPOINT: &str = "https://api.platform.opentargets.org/api/v4/graphql";

#[derive(Debug, Clone)]
pub struct Endpoint(Url);

impl Endpoint {
    pub fn into_inner(self) -> Url {
        self.0
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        // SAFETY: The default is a constant checked by [test::defaults_to_open_targets]
        #[allow(clippy::unwrap_used)]
        Self(Url::parse(OPEN_TARGETS_ENDPOINT).unwrap())
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let url = Url::deserialize(deserializer)?;
        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            scheme => Err(serde::de::Error::custom(format!(
                "unsupported endpoint scheme '{scheme}', expected http or https"
            ))),
        }
    }
}

impl Deref for Endpoint {
    type Target = Url;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::Endpoint;
    use rstest::rstest;

    #[test]
    fn defaults_to_open_targets() {
        let endpoint = Endpoint::default();

        assert_eq!(endpoint.host_str(), Some("api.platform.opentargets.org"));
        assert_eq!(endpoint.path(), "/api/v4/graphql");
    }

    #[rstest]
    #[case("http://localhost:4000/graphql")]
    #[case("https://api.platform.opentargets.org/api/v4/graphql")]
    fn accepts_http_endpoints(#[case] url: &str) {
        let endpoint: Endpoint = serde_json::from_value(serde_json::json!(url)).unwrap();

        assert_eq!(endpoint.as_str(), url);
    }

    #[rstest]
    #[case("ftp://example.com/graphql")]
    #[case("file:///tmp/schema.graphql")]
    #[case("not a url")]
    fn rejects_other_endpoints(#[case] url: &str) {
        assert!(serde_json::from_value::<Endpoint>(serde_json::json!(url)).is_err());
    }
}
