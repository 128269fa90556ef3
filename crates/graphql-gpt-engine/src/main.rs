use std::path::PathBuf;

use anyhow::{anyhow, bail};
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use graphql_gpt_engine::pipeline::{Asked, Report};
use runtime::{Console, QUESTION_PROMPT};
use tracing::{error, info};

mod runtime;

/// Clap styling
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Arguments to the engine
#[derive(Debug, clap::Parser)]
#[command(
    version,
    styles = STYLES,
    about = "GraphQL GPT Engine - answer questions in English from a GraphQL API",
)]
struct Args {
    /// Path to the config file
    config: Option<PathBuf>,

    /// The question to answer; asked for on the console when omitted
    #[arg(long, short = 'q')]
    question: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match args.config {
        Some(path) => runtime::read_config(path)?,
        None => runtime::read_config_from_env()?,
    };

    let _guard = runtime::setup_logging(&config)?;

    info!(
        "GraphQL GPT Engine v{} answering from {}",
        std::env!("CARGO_PKG_VERSION"),
        config.endpoint.as_str()
    );

    let engine = runtime::build_engine(&config)?;
    let mut console = Console::stdio();

    let question = match args.question {
        Some(question) => question,
        None => console
            .ask(QUESTION_PROMPT)
            .await?
            .ok_or_else(|| anyhow!("No question was entered"))?,
    };

    match engine.answer(Asked::new(question), &mut console).await? {
        Report::Answered(answered) => {
            info!("Answered with query {}", answered.query);
            console.show(&answered.answer).await?;
            Ok(())
        }
        Report::ExecutionFailed { query, failure, .. } => {
            error!("Query failed: {query}");
            bail!(failure)
        }
    }
}
