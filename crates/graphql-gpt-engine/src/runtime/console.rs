//! Console prompts for the question and its shorter replacements

use async_trait::async_trait;
use graphql_gpt_engine::synthesize::Reprompter;
use graphql_gpt_engine::token_counting::TokenBudget;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _, BufReader, Lines, Stdin,
    Stdout,
};
use tracing::debug;

pub const QUESTION_PROMPT: &str = "Please enter your question in English: ";
const REDUCE_NOTICE: &str = "\nReduce the size of your question.";
const REENTER_PROMPT: &str = "Please re-enter your question in English: ";

/// Reads questions line by line, writing prompts before each read
pub struct Console<R, W> {
    lines: Lines<R>,
    output: W,
}

impl Console<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            lines: input.lines(),
            output,
        }
    }

    /// Show `prompt` and read one line, or `None` at end of input
    pub async fn ask(&mut self, prompt: &str) -> std::io::Result<Option<String>> {
        self.output.write_all(prompt.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;

        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    /// Write the final answer
    pub async fn show(&mut self, text: &str) -> std::io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await
    }
}

#[async_trait]
impl<R, W> Reprompter for Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn shorter_question(
        &mut self,
        budget: &TokenBudget,
    ) -> Result<Option<String>, std::io::Error> {
        debug!("Question does not fit: {budget}");
        self.output.write_all(REDUCE_NOTICE.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.ask(REENTER_PROMPT).await
    }
}
