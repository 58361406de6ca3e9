//! # appflow-cli
//!
//! Command-line front end for the appflow upload workflow.
//!
//! ```text
//! appflow --api-key <KEY> --app-id 42 --file ~/builds/Shop.ipa
//! ```
//!
//! ## Configuration
//!
//! - `APPFLOW_API_KEY` - API key, when `--api-key` is not given
//! - `APPFLOW_API_URL` / `APPFLOW_UPLOAD_URL` - endpoint overrides
//! - `--config <FILE>` - JSON file with `http` and `workflow` sections

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use anyhow::{Context, Result};
use appflow::events::{EventSink, LoggingEventSink};
use appflow::transport::{HttpConfig, HttpRemoteApi};
use appflow::workflow::{WorkflowConfig, WorkflowOrchestrator, WorkflowRun};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Upload a new build of an app and trigger its journeys.
#[derive(Debug, Parser)]
#[command(name = "appflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// API key used to authenticate.
    #[arg(long, env = "APPFLOW_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Path of the build to upload. A leading `~` is expanded.
    #[arg(long, short = 'f')]
    pub file: PathBuf,

    /// Id of the app to update.
    #[arg(long)]
    pub app_id: i64,

    /// Log every request and status check.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// JSON configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// API base URL override.
    #[arg(long, env = "APPFLOW_API_URL")]
    pub api_url: Option<String>,

    /// Upload host base URL override.
    #[arg(long, env = "APPFLOW_UPLOAD_URL")]
    pub upload_url: Option<String>,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON.
    Json,
}

/// Contents of the `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transport settings.
    #[serde(default)]
    pub http: HttpConfig,
    /// Workflow tuning.
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl Cli {
    /// The payload path with `~` expanded.
    #[must_use]
    pub fn payload_path(&self) -> PathBuf {
        expand_tilde(&self.file)
    }

    /// File name reported for the payload.
    #[must_use]
    pub fn display_name(&self) -> String {
        display_name(&self.file)
    }

    /// Loads the configuration file, if any, and applies URL overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let path = expand_tilde(path);
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => AppConfig::default(),
        };

        if let Some(url) = &self.api_url {
            config.http.api_base_url.clone_from(url);
        }
        if let Some(url) = &self.upload_url {
            config.http.upload_base_url.clone_from(url);
        }
        Ok(config)
    }
}

/// Replaces a leading `~` component with the home directory.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Last component of `path`, or the whole path when it has none.
#[must_use]
pub fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Runs the workflow described by `cli` and reports the outcome.
///
/// # Errors
///
/// Returns an error when the run cannot be set up. Workflow failures are
/// reported on the output and turned into a failure exit code.
pub async fn execute(cli: &Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    let path = cli.payload_path();
    let payload = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let events: Arc<dyn EventSink> = if cli.verbose {
        Arc::new(LoggingEventSink::debug())
    } else {
        Arc::new(LoggingEventSink::info())
    };
    let api = HttpRemoteApi::new(config.http, &cli.api_key)
        .context("Failed to create HTTP client")?
        .with_event_sink(events.clone());
    let orchestrator = WorkflowOrchestrator::new(Arc::new(api))
        .with_config(config.workflow)
        .with_event_sink(events);

    let token = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling the run");
            token.cancel("interrupted");
        }
    });

    let run = WorkflowRun::new(cli.app_id, payload, cli.display_name());
    match orchestrator.run(run).await {
        Ok(report) => {
            match cli.format {
                OutputFormat::Text => println!("{}", report.summary()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            match cli.format {
                OutputFormat::Text => eprintln!("Error [{}]: {e}", e.kind()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&e.to_dict())?),
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
