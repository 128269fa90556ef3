//! Logging config and subscriber setup
//!
//! Logs never go to stdout, which carries prompts and the final answer.

mod log_rotation_kind;

use std::path::Path;
use std::str::FromStr;

use log_rotation_kind::LogRotationKind;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logging related options
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Logging {
    /// The log level to use for tracing
    #[serde(deserialize_with = "level_from_str")]
    #[schemars(schema_with = "level")]
    pub level: Level,

    /// Directory to write log files to instead of stderr
    pub path: Option<std::path::PathBuf>,

    /// Log file rotation period to use when a log path is provided
    pub rotation: LogRotationKind,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            path: None,
            rotation: LogRotationKind::Hourly,
        }
    }
}

impl Logging {
    pub fn env_filter(&self) -> Result<EnvFilter, anyhow::Error> {
        let mut env_filter = EnvFilter::from_default_env().add_directive(self.level.into());

        if self.level == Level::INFO {
            env_filter = env_filter
                .add_directive("hyper_util=warn".parse()?)
                .add_directive("reqwest=warn".parse()?);
        }
        Ok(env_filter)
    }

    /// Install the global subscriber
    ///
    /// The returned guard flushes buffered file output when dropped and must
    /// be held for the life of the program.
    pub fn init(&self) -> Result<Option<WorkerGuard>, anyhow::Error> {
        let env_filter = self.env_filter()?;

        let (writer, guard, with_ansi) = match self
            .path
            .as_deref()
            .and_then(|path| self.file_appender(path))
        {
            Some(appender) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                (BoxMakeWriter::new(non_blocking), Some(guard), false)
            }
            None => (BoxMakeWriter::new(std::io::stderr), None, true),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(with_ansi)
                    .with_target(false),
            )
            .try_init()?;

        Ok(guard)
    }

    fn file_appender(&self, path: &Path) -> Option<RollingFileAppender> {
        if let Err(e) = std::fs::create_dir_all(path) {
            eprintln!(
                "Could not create log directory {}: {e} - falling back to stderr",
                path.display()
            );
            return None;
        }

        RollingFileAppender::builder()
            .rotation(self.rotation.clone().into())
            .filename_prefix("graphql_gpt_engine")
            .filename_suffix("log")
            .build(path)
            .inspect_err(|e| eprintln!("Log file setup failed: {e} - falling back to stderr"))
            .ok()
    }
}

fn level_from_str<'de, D>(deserializer: D) -> Result<Level, D::Error>
where
    D: Deserializer<'de>,
{
    let level = String::deserialize(deserializer)?;
    Level::from_str(&level).map_err(serde::de::Error::custom)
}

fn level(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
    /// Log level
    #[derive(JsonSchema)]
    #[schemars(rename_all = "lowercase")]
    #[allow(dead_code)]
    enum Level {
        Trace,
        Debug,
        Info,
        Warn,
        Error,
    }

    Level::json_schema(generator)
}
