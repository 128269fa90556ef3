//! Turn a GraphQL response back into a short natural-language answer

use std::sync::Arc;

use bon::bon;
use serde_json::Value;
use tracing::{debug, warn};

use crate::completion::{
    CompletionRequest, CompletionService, DEFAULT_MODEL, DecodingParameters, PromptMessage,
};
use crate::errors::CompletionError;
use crate::token_counting::{DEFAULT_CONTEXT_WINDOW, TokenBudget, TokenCounter};

/// The system prompt framing a response for the question that produced it
pub fn summary_instruction(question: &str) -> String {
    format!(
        "The following text is the response of the request: {question}.\n The final answer should just list the queried entities, no extra paragraphs or text"
    )
}

/// Asks the completion service to summarize query results
pub struct ResultSummarizer {
    service: Arc<dyn CompletionService>,
    model: String,
    parameters: DecodingParameters,
    counter: Option<TokenCounter>,
    ceiling: usize,
}

#[bon]
impl ResultSummarizer {
    #[builder]
    pub fn new(
        service: Arc<dyn CompletionService>,
        #[builder(into, default = DEFAULT_MODEL.to_string())] model: String,
        #[builder(default)] parameters: DecodingParameters,
        counter: Option<TokenCounter>,
        #[builder(default = DEFAULT_CONTEXT_WINDOW)] ceiling: usize,
    ) -> Self {
        Self {
            service,
            model,
            parameters,
            counter,
            ceiling,
        }
    }

    /// The request sent to summarize `result`
    ///
    /// The result is serialized compactly, so equal values always produce
    /// the same prompt.
    pub fn build_request(&self, question: &str, result: &Value) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                PromptMessage::system(summary_instruction(question)),
                PromptMessage::user(result.to_string()),
            ],
            parameters: self.parameters.clone(),
        }
    }

    /// Summarize `result` as an answer to `question`
    ///
    /// The prompt is not held to the token budget. When a counter is
    /// attached, an oversized prompt is reported before it is sent anyway.
    pub async fn summarize(
        &self,
        question: &str,
        result: &Value,
    ) -> Result<String, CompletionError> {
        let request = self.build_request(question, result);

        if let Some(counter) = &self.counter {
            let total: usize = request
                .messages
                .iter()
                .map(|message| counter.count(&message.content))
                .sum();
            let budget = TokenBudget::new(self.ceiling, total);
            if budget.fits() {
                debug!("Summarizing a response of {budget}");
            } else {
                warn!("Summary prompt uses {budget} and may be rejected by the model");
            }
        }

        self.service.complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Role;
    use crate::testing::StubCompletions;
    use serde_json::json;
    use tracing_test::traced_test;

    fn summarizer(service: Arc<StubCompletions>) -> ResultSummarizer {
        ResultSummarizer::builder().service(service).build()
    }

    #[test]
    fn instruction_names_the_question() {
        insta::assert_snapshot!(summary_instruction("list entities"), @r###"
        The following text is the response of the request: list entities.
         The final answer should just list the queried entities, no extra paragraphs or text
        "###);
    }

    #[tokio::test]
    async fn returns_completion_content_unchanged() {
        let service = Arc::new(StubCompletions::replying(&["No entities were found."]));
        let result = json!({"data": {"entities": []}});

        let answer = summarizer(service.clone())
            .summarize("list entities", &result)
            .await
            .unwrap();

        assert_eq!(answer, "No entities were found.");

        let requests = service.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].parameters, DecodingParameters::default());
        assert_eq!(
            requests[0]
                .messages
                .iter()
                .map(|m| (m.role, m.content.as_str()))
                .collect::<Vec<_>>(),
            vec![
                (Role::System, summary_instruction("list entities").as_str()),
                (Role::User, r#"{"data":{"entities":[]}}"#),
            ]
        );
    }

    #[test]
    fn serialization_is_deterministic() {
        let summarizer = summarizer(Arc::new(StubCompletions::replying(&[])));
        let result = json!({
            "data": {"target": {"id": "ENSG00000157764", "approvedSymbol": "BRAF"}}
        });

        assert_eq!(
            summarizer.build_request("What is gene BRAF?", &result),
            summarizer.build_request("What is gene BRAF?", &result.clone())
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn oversized_result_is_reported_but_still_sent() {
        let service = Arc::new(StubCompletions::replying(&["BRAF"]));
        let summarizer = ResultSummarizer::builder()
            .service(service.clone())
            .counter(TokenCounter::approximate())
            .ceiling(10)
            .build();
        let result = json!({"data": {"targets": vec!["ENSG00000157764"; 50]}});

        let answer = summarizer.summarize("list targets", &result).await.unwrap();

        assert_eq!(answer, "BRAF");
        assert_eq!(service.requests().len(), 1);
        assert!(logs_contain("may be rejected by the model"));
    }

    #[tokio::test]
    async fn completion_failure_is_returned() {
        let error = summarizer(Arc::new(StubCompletions::failing()))
            .summarize("list entities", &json!({"data": null}))
            .await
            .unwrap_err();

        assert!(matches!(error, CompletionError::NoChoices));
    }
}
