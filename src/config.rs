//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.swf-history.toml` files.

use crate::analysis::SummaryOptions;
use crate::cli::{Args, OutputFormat};
use crate::history::ClientConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".swf-history.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Workflow service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Summary settings.
    #[serde(default)]
    pub summary: SummaryConfig,
}

/// Workflow service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Default domain for executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Events per history page (service default when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            domain: None,
            timeout_seconds: default_timeout(),
            page_size: None,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u64 {
    60
}

/// Aggregation and output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Fail on events of an unrecognized kind.
    #[serde(default)]
    pub raise_on_unknown: bool,

    /// Log skipped events.
    #[serde(default)]
    pub verbose: bool,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.swf-history.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence, but only where they were given.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref endpoint) = args.endpoint {
            self.service.endpoint = endpoint.clone();
        }
        if let Some(ref domain) = args.domain {
            self.service.domain = Some(domain.clone());
        }
        if let Some(timeout) = args.timeout {
            self.service.timeout_seconds = timeout;
        }
        if let Some(page_size) = args.page_size {
            self.service.page_size = Some(page_size);
        }
        if let Some(format) = args.format {
            self.summary.format = format;
        }

        // Flags only switch on
        if args.raise_on_unknown {
            self.summary.raise_on_unknown = true;
        }
        if args.verbose {
            self.summary.verbose = true;
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.service.endpoint.clone(),
            timeout_seconds: self.service.timeout_seconds,
            page_size: self.service.page_size,
        }
    }

    pub fn summary_options(&self) -> SummaryOptions {
        SummaryOptions {
            raise_on_unknown: self.summary.raise_on_unknown,
            verbose: self.summary.verbose,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
