//! The question answering pipeline
//!
//! Each stage consumes the record produced by the previous one and returns
//! the next, so no state is shared between stages or between questions:
//!
//! ```text
//! Asked -> Grounded -> Synthesized -> Executed -> Report
//! ```

use bon::bon;
use serde_json::Value;
use tracing::{error, info};

use crate::errors::EngineError;
use crate::graphql::{ExecutionFailure, ExecutionOutcome, QueryExecutor};
use crate::schema::SchemaProvider;
use crate::summarize::ResultSummarizer;
use crate::synthesize::{DEFAULT_INSTRUCTION, QuerySynthesizer, Reprompter, Synthesis};
use crate::validate::validate_query;

/// A question waiting to be answered
#[derive(Debug, Clone, PartialEq)]
pub struct Asked {
    pub question: String,
}

impl Asked {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

/// A question along with the schema that grounds it
#[derive(Debug, Clone, PartialEq)]
pub struct Grounded {
    pub question: String,
    pub schema: String,
}

/// A query synthesized for a question
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    pub question: String,
    pub query: String,
}

/// The outcome of running a synthesized query
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub question: String,
    pub query: String,
    pub outcome: ExecutionOutcome,
}

/// A question answered from the query result
#[derive(Debug, Clone, PartialEq)]
pub struct Answered {
    pub question: String,
    pub query: String,
    pub result: Value,
    pub answer: String,
}

/// The end of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Answered(Answered),

    /// The query could not be executed, so there was nothing to summarize
    ExecutionFailed {
        question: String,
        query: String,
        failure: ExecutionFailure,
    },
}

/// Answers questions by synthesizing, executing and summarizing GraphQL queries
pub struct Engine {
    schema_provider: SchemaProvider,
    synthesizer: QuerySynthesizer,
    executor: QueryExecutor,
    summarizer: ResultSummarizer,
    instruction: String,
    validate_queries: bool,
}

#[bon]
impl Engine {
    #[builder]
    pub fn new(
        schema_provider: SchemaProvider,
        synthesizer: QuerySynthesizer,
        executor: QueryExecutor,
        summarizer: ResultSummarizer,
        #[builder(into, default = DEFAULT_INSTRUCTION.to_string())] instruction: String,
        #[builder(default)] validate_queries: bool,
    ) -> Self {
        Self {
            schema_provider,
            synthesizer,
            executor,
            summarizer,
            instruction,
            validate_queries,
        }
    }

    /// Answer a question, asking `reprompter` for a shorter one while the
    /// prompt does not fit the model's context window
    pub async fn answer(
        &self,
        asked: Asked,
        reprompter: &mut dyn Reprompter,
    ) -> Result<Report, EngineError> {
        let grounded = self.ground(asked).await;
        let synthesized = self.synthesize(grounded, reprompter).await?;
        let executed = self.execute(synthesized).await;
        self.summarize(executed).await
    }

    /// Answer a question without asking for a shorter one
    ///
    /// A question that does not fit fails with [`EngineError::BudgetExceeded`]
    /// and may be resubmitted in a shorter form.
    pub async fn answer_once(&self, asked: Asked) -> Result<Report, EngineError> {
        let grounded = self.ground(asked).await;
        let synthesis = self
            .synthesizer
            .try_synthesize(&grounded.schema, &self.instruction, &grounded.question)
            .await?;
        let synthesized = self.accept(&grounded.schema, synthesis)?;
        let executed = self.execute(synthesized).await;
        self.summarize(executed).await
    }

    /// Load the schema for a question, which is empty if it could not be fetched
    pub async fn ground(&self, asked: Asked) -> Grounded {
        info!("Loading schema");
        Grounded {
            question: asked.question,
            schema: self.schema_provider.fetch().await,
        }
    }

    pub async fn synthesize(
        &self,
        grounded: Grounded,
        reprompter: &mut dyn Reprompter,
    ) -> Result<Synthesized, EngineError> {
        info!("Generating query");
        let synthesis = self
            .synthesizer
            .synthesize(
                &grounded.schema,
                &self.instruction,
                grounded.question,
                reprompter,
            )
            .await?;
        self.accept(&grounded.schema, synthesis)
    }

    fn accept(&self, schema: &str, synthesis: Synthesis) -> Result<Synthesized, EngineError> {
        if self.validate_queries {
            validate_query(schema, &synthesis.query)?;
        }
        Ok(Synthesized {
            question: synthesis.question,
            query: synthesis.query,
        })
    }

    pub async fn execute(&self, synthesized: Synthesized) -> Executed {
        info!("Querying {}", self.executor.endpoint());
        let outcome = self.executor.execute(&synthesized.query).await;
        Executed {
            question: synthesized.question,
            query: synthesized.query,
            outcome,
        }
    }

    /// Summarize a successful execution; failed executions are reported as is
    pub async fn summarize(&self, executed: Executed) -> Result<Report, EngineError> {
        match executed.outcome {
            ExecutionOutcome::Success(result) => {
                info!("Generating answer");
                let answer = self
                    .summarizer
                    .summarize(&executed.question, &result)
                    .await?;
                Ok(Report::Answered(Answered {
                    question: executed.question,
                    query: executed.query,
                    result,
                    answer,
                }))
            }
            ExecutionOutcome::Failure(failure) => {
                error!("Not summarizing the response of a failed query");
                Ok(Report::ExecutionFailed {
                    question: executed.question,
                    query: executed.query,
                    failure,
                })
            }
        }
    }
}
