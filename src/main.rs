//! swf-history - SWF workflow execution history summarizer
//!
//! Fetches the complete event history of workflow executions and groups
//! activity and child workflow lifecycle events into one record each.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (service failure, unsupported event, bad input, etc.)

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::try_join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use swf_history::analysis::{summarize_events, SummaryOptions};
use swf_history::cli::{Args, ExecutionTarget, OutputFormat};
use swf_history::config::{Config, CONFIG_FILE_NAME};
use swf_history::history::{get_all_events_with_progress, SwfClient};
use swf_history::models::{parse_events_json, HistoryPage, RawEvent};
use swf_history::report::{self, ExecutionReport, Report};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("swf-history v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Summary failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .swf-history.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the service endpoint and domain.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let options = config.summary_options();

    let executions = match args.input {
        Some(ref input) => vec![summarize_file(input, options)?],
        None => fetch_and_summarize(&args, &config, options).await?,
    };

    let report = Report {
        generated_at: Utc::now(),
        executions,
    };

    let output = match config.summary.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !args.quiet {
                eprintln!("✅ Report saved to: {}", path.display());
            }
        }
        None => print!("{}", output),
    }

    Ok(())
}

/// Summarize events saved in a local file.
fn summarize_file(path: &Path, options: SummaryOptions) -> Result<ExecutionReport> {
    info!("Reading events from: {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events file: {}", path.display()))?;
    let events = parse_events_json(&content)
        .with_context(|| format!("Failed to parse events file: {}", path.display()))?;

    let records = summarize_events(&events, options)?;

    Ok(ExecutionReport::new(
        path.display().to_string(),
        "-",
        "-",
        events.len(),
        records,
    ))
}

/// Fetch every requested execution concurrently and summarize each one.
async fn fetch_and_summarize(
    args: &Args,
    config: &Config,
    options: SummaryOptions,
) -> Result<Vec<ExecutionReport>> {
    let domain = config
        .service
        .domain
        .clone()
        .context("No domain given: use --domain or set service.domain in the config file")?;
    let targets = args.executions().map_err(anyhow::Error::msg)?;

    let client = SwfClient::new(config.client_config())?;
    info!(
        "Fetching {} execution(s) from {} (domain {})",
        targets.len(),
        client.endpoint(),
        domain
    );

    let progress = MultiProgress::new();
    let fetches = targets.iter().map(|target| {
        let spinner = new_spinner(&progress, target, args.quiet);
        let client = &client;
        let domain = domain.as_str();

        async move {
            let events = get_all_events_with_progress(
                client,
                domain,
                &target.run_id,
                &target.workflow_id,
                |pages, total| spinner.set_message(format!("{} events, {} pages", total, pages)),
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to fetch history of {}/{}",
                    target.workflow_id, target.run_id
                )
            })?;
            spinner.finish_and_clear();
            Ok::<_, anyhow::Error>((target, events))
        }
    });

    let histories = try_join_all(fetches).await?;

    if let Some(ref path) = args.save_events {
        if let Some((_, events)) = histories.first() {
            save_events(path, events)?;
        }
    }

    histories
        .into_iter()
        .map(|(target, events)| -> Result<ExecutionReport> {
            let records = summarize_events(&events, options).with_context(|| {
                format!(
                    "Failed to summarize {}/{}",
                    target.workflow_id, target.run_id
                )
            })?;
            Ok(ExecutionReport::new(
                domain.clone(),
                target.workflow_id.clone(),
                target.run_id.clone(),
                events.len(),
                records,
            ))
        })
        .collect()
}

fn new_spinner(progress: &MultiProgress, target: &ExecutionTarget, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = progress.add(ProgressBar::new_spinner());
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix(format!("{}/{}", target.workflow_id, target.run_id));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Write raw events in the page format `--input` reads back.
fn save_events(path: &Path, events: &[RawEvent]) -> Result<()> {
    let page = HistoryPage {
        events: events.to_vec(),
        next_page_token: None,
    };
    let content = serde_json::to_string_pretty(&page)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write events to {}", path.display()))?;

    info!("Saved {} events to {}", events.len(), path.display());
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
