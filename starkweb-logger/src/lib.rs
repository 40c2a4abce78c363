//! Process-wide `tracing` setup shared by starkweb binaries.

use anyhow::Result;
use serde::Deserialize;
use std::{fs::File, str::FromStr};
use tracing::Level;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{self, writer::MakeWriterExt},
    prelude::*,
    Registry,
};

#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Plain,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    File,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub output: LogOutput,
    pub file_path: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
        }
    }
}

impl LogConfig {
    /// The configured level; unknown names fall back to `INFO`.
    pub fn level(&self) -> Level {
        Level::from_str(&self.level).unwrap_or(Level::INFO)
    }
}

/// Installs the global subscriber. `RUST_LOG`, when set, narrows the output
/// further by target.
pub fn init(config: &LogConfig) -> Result<()> {
    let log_level = config.level();
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level).into())
        .from_env_lossy();
    let subscriber = Registry::default().with(env_filter);

    match config.output {
        LogOutput::File => {
            let file_path = config
                .file_path
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Log output is 'file' but 'file_path' is not specified"))?;
            let log_file = File::create(file_path)?;
            let file_writer = log_file.with_max_level(log_level);

            match config.format {
                LogFormat::Json => subscriber
                    .with(fmt::layer().with_writer(file_writer).json())
                    .try_init()?,
                LogFormat::Plain => subscriber
                    .with(fmt::layer().with_writer(file_writer).with_ansi(false))
                    .try_init()?,
            }
        }
        LogOutput::Stdout => {
            let stdout_writer = std::io::stdout.with_max_level(log_level);
            match config.format {
                LogFormat::Json => subscriber
                    .with(fmt::layer().with_writer(stdout_writer).json())
                    .try_init()?,
                LogFormat::Plain => subscriber
                    .with(fmt::layer().with_writer(stdout_writer).pretty())
                    .try_init()?,
            }
        }
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_falls_back_to_info() {
        let config = LogConfig {
            level: "chatty".into(),
            ..LogConfig::default()
        };
        assert_eq!(config.level(), Level::INFO);
        assert_eq!(LogConfig::default().level(), Level::INFO);
    }

    #[test]
    fn file_output_requires_a_path() {
        let config = LogConfig {
            output: LogOutput::File,
            ..LogConfig::default()
        };
        let err = init(&config).expect_err("no file path");
        assert!(err.to_string().contains("file_path"));
    }

    #[test]
    fn file_output_creates_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("starkweb.log");
        let config = LogConfig {
            level: "debug".into(),
            format: LogFormat::Json,
            output: LogOutput::File,
            file_path: Some(path.to_string_lossy().into_owned()),
        };
        // Another test may already own the global subscriber; the file is created either way.
        let _ = init(&config);
        assert!(path.exists());
    }
}
