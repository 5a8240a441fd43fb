//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// swf-history - summarize SWF workflow execution histories
///
/// Fetches the complete event history of one or more workflow executions
/// and groups activity and child workflow events into one record each.
///
/// Examples:
///   swf-history --domain prod --workflow-id order-42 --run-id 22Ab...
///   swf-history --domain prod --execution order-42:22Ab... --execution order-43:19Fx...
///   swf-history --input history.json --format json
///   swf-history --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Workflow domain
    #[arg(short, long, env = "SWF_DOMAIN")]
    pub domain: Option<String>,

    /// Workflow id of the execution to summarize
    #[arg(short, long, value_name = "ID", requires = "run_id")]
    pub workflow_id: Option<String>,

    /// Run id of the execution to summarize
    #[arg(short, long, value_name = "ID", requires = "workflow_id")]
    pub run_id: Option<String>,

    /// Additional execution as WORKFLOW_ID:RUN_ID (repeatable)
    ///
    /// Executions are fetched concurrently.
    #[arg(short, long, value_name = "WORKFLOW_ID:RUN_ID")]
    pub execution: Vec<String>,

    /// Summarize events from a saved JSON file instead of the service
    ///
    /// Accepts an array of events or a page object with an "events" field.
    #[arg(
        short,
        long,
        value_name = "FILE",
        conflicts_with_all = ["workflow_id", "run_id", "execution"]
    )]
    pub input: Option<PathBuf>,

    /// Write the fetched raw events to a JSON file
    #[arg(long, value_name = "FILE", conflicts_with = "input")]
    pub save_events: Option<PathBuf>,

    /// Workflow service endpoint URL
    #[arg(long, value_name = "URL", env = "SWF_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Events per history page (1-1000)
    #[arg(long, value_name = "COUNT")]
    pub page_size: Option<u32>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file path for the report (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Fail on events of an unrecognized kind
    #[arg(long)]
    pub raise_on_unknown: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .swf-history.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output, including skipped events
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .swf-history.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// One workflow execution to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTarget {
    pub workflow_id: String,
    pub run_id: String,
}

impl std::str::FromStr for ExecutionTarget {
    type Err = String;

    /// Parse `WORKFLOW_ID:RUN_ID`. Workflow ids may contain ':', run ids never do.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((workflow_id, run_id)) if !workflow_id.is_empty() && !run_id.is_empty() => {
                Ok(Self {
                    workflow_id: workflow_id.to_string(),
                    run_id: run_id.to_string(),
                })
            }
            _ => Err(format!(
                "Invalid execution '{}', expected WORKFLOW_ID:RUN_ID",
                s
            )),
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// All executions named on the command line, in order.
    pub fn executions(&self) -> Result<Vec<ExecutionTarget>, String> {
        let mut targets = Vec::new();

        if let (Some(workflow_id), Some(run_id)) = (&self.workflow_id, &self.run_id) {
            targets.push(ExecutionTarget {
                workflow_id: workflow_id.clone(),
                run_id: run_id.clone(),
            });
        }

        for entry in &self.execution {
            targets.push(entry.parse()?);
        }

        Ok(targets)
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.input.is_none() {
            let executions = self.executions()?;
            if executions.is_empty() {
                return Err(
                    "Nothing to summarize: give --workflow-id/--run-id, --execution or --input"
                        .to_string(),
                );
            }
            if self.save_events.is_some() && executions.len() > 1 {
                return Err("--save-events only supports a single execution".to_string());
            }
        }

        if let Some(ref endpoint) = self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Endpoint URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(page_size) = self.page_size {
            if !(1..=1000).contains(&page_size) {
                return Err("Page size must be between 1 and 1000".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
