//! Turn a question into a GraphQL query with a single completion call

use std::sync::Arc;

use async_trait::async_trait;
use bon::bon;
use tracing::{debug, info, warn};

use crate::completion::{
    CompletionRequest, CompletionService, DEFAULT_MODEL, DecodingParameters, PromptMessage,
};
use crate::errors::EngineError;
use crate::token_counting::{DEFAULT_CONTEXT_WINDOW, TokenBudget, TokenCounter};

/// Instruction sent between the schema and the question
pub const DEFAULT_INSTRUCTION: &str =
    "For the following statement, please generate the GraphQL query code ONLY. No explanation.";

/// Default limit on shorter questions
pub const DEFAULT_MAX_REPROMPTS: usize = 5;

/// How many shorter questions may be requested before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepromptLimit {
    Unbounded,
    AtMost(usize),
}

impl Default for RepromptLimit {
    fn default() -> Self {
        RepromptLimit::AtMost(DEFAULT_MAX_REPROMPTS)
    }
}

impl From<Option<usize>> for RepromptLimit {
    fn from(value: Option<usize>) -> Self {
        value.map_or(RepromptLimit::Unbounded, RepromptLimit::AtMost)
    }
}

impl RepromptLimit {
    fn exhausted(&self, reprompts: usize) -> bool {
        match self {
            RepromptLimit::Unbounded => false,
            RepromptLimit::AtMost(max) => reprompts >= *max,
        }
    }
}

/// Source of a replacement question when the prompt does not fit the budget
#[async_trait]
pub trait Reprompter: Send {
    /// Ask for a shorter question, or `None` when no more input is available
    async fn shorter_question(
        &mut self,
        budget: &TokenBudget,
    ) -> Result<Option<String>, std::io::Error>;
}

/// A synthesized query along with the question that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub question: String,
    pub query: String,
    pub budget: TokenBudget,
}

/// Builds schema-grounded prompts and asks the completion service for a query
pub struct QuerySynthesizer {
    service: Arc<dyn CompletionService>,
    counter: TokenCounter,
    model: String,
    parameters: DecodingParameters,
    ceiling: usize,
    reprompt_limit: RepromptLimit,
}

#[bon]
impl QuerySynthesizer {
    #[builder]
    pub fn new(
        service: Arc<dyn CompletionService>,
        #[builder(into, default = DEFAULT_MODEL.to_string())] model: String,
        counter: Option<TokenCounter>,
        #[builder(default)] parameters: DecodingParameters,
        #[builder(default = DEFAULT_CONTEXT_WINDOW)] ceiling: usize,
        #[builder(default)] reprompt_limit: RepromptLimit,
    ) -> Self {
        let counter = counter.unwrap_or_else(|| TokenCounter::for_model(&model));
        Self {
            service,
            counter,
            model,
            parameters,
            ceiling,
            reprompt_limit,
        }
    }

    /// Size of the synthesis prompt for these inputs
    pub fn budget(&self, schema: &str, instruction: &str, question: &str) -> TokenBudget {
        TokenBudget::new(
            self.ceiling,
            self.counter.estimate(schema, instruction, question),
        )
    }

    /// The request sent for these inputs
    pub fn build_request(
        &self,
        schema: &str,
        instruction: &str,
        question: &str,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                PromptMessage::system(schema),
                PromptMessage::system(instruction),
                PromptMessage::user(question),
            ],
            parameters: self.parameters.clone(),
        }
    }

    /// Synthesize a query, failing with [`EngineError::BudgetExceeded`] instead
    /// of asking for a shorter question
    pub async fn try_synthesize(
        &self,
        schema: &str,
        instruction: &str,
        question: &str,
    ) -> Result<Synthesis, EngineError> {
        let budget = self.budget(schema, instruction, question);
        if !budget.fits() {
            return Err(EngineError::BudgetExceeded {
                total: budget.total,
                ceiling: budget.ceiling,
            });
        }
        self.complete(schema, instruction, question, budget).await
    }

    /// Synthesize a query, asking `reprompter` for a shorter question for as
    /// long as the prompt does not fit the budget
    pub async fn synthesize(
        &self,
        schema: &str,
        instruction: &str,
        question: String,
        reprompter: &mut dyn Reprompter,
    ) -> Result<Synthesis, EngineError> {
        let mut question = question;
        let mut budget = self.budget(schema, instruction, &question);
        let mut reprompts = 0;

        while !budget.fits() {
            let exceeded = EngineError::BudgetExceeded {
                total: budget.total,
                ceiling: budget.ceiling,
            };
            if self.reprompt_limit.exhausted(reprompts) {
                warn!("Giving up after {reprompts} shorter questions");
                return Err(exceeded);
            }

            info!("Prompt uses {budget}, asking for a shorter question");
            let Some(shorter) = reprompter.shorter_question(&budget).await? else {
                return Err(exceeded);
            };
            reprompts += 1;
            question = shorter;
            budget = self.budget(schema, instruction, &question);
        }

        self.complete(schema, instruction, &question, budget).await
    }

    async fn complete(
        &self,
        schema: &str,
        instruction: &str,
        question: &str,
        budget: TokenBudget,
    ) -> Result<Synthesis, EngineError> {
        debug!("Synthesizing query with a prompt of {budget}");
        let query = self
            .service
            .complete(self.build_request(schema, instruction, question))
            .await?;

        Ok(Synthesis {
            question: question.to_string(),
            query,
            budget,
        })
    }
}
