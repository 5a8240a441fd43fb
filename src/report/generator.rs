//! Report generation.
//!
//! Renders aggregated execution histories as Markdown tables or JSON.

use crate::analysis::SummaryStats;
use crate::models::AggregatedRecord;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Aggregated history of one workflow execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// Domain, or the input file path for offline summaries.
    pub source: String,
    pub workflow_id: String,
    pub run_id: String,
    pub event_count: usize,
    pub stats: SummaryStats,
    pub records: HashMap<i64, AggregatedRecord>,
}

impl ExecutionReport {
    pub fn new(
        source: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
        event_count: usize,
        records: HashMap<i64, AggregatedRecord>,
    ) -> Self {
        Self {
            source: source.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            event_count,
            stats: SummaryStats::from_records(&records),
            records,
        }
    }

    /// Records ordered by schedule time, then id. Unscheduled records go last.
    pub fn sorted_records(&self) -> Vec<(i64, &AggregatedRecord)> {
        let mut records: Vec<_> = self.records.iter().map(|(id, r)| (*id, r)).collect();
        records.sort_by(|(a_id, a), (b_id, b)| {
            match (a.scheduled_at(), b.scheduled_at()) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| a_id.cmp(b_id))
        });
        records
    }
}

/// Complete output of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub executions: Vec<ExecutionReport>,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# SWF History Report\n\n");
    output.push_str(&format!(
        "*Generated {}*\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    for execution in &report.executions {
        output.push_str(&generate_execution_section(execution));
    }

    output
}

fn generate_execution_section(execution: &ExecutionReport) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {} / {}\n\n", execution.workflow_id, execution.run_id));
    section.push_str(&format!("- **Source:** {}\n", execution.source));
    section.push_str(&format!("- **Events:** {}\n\n", execution.event_count));

    section.push_str(&generate_stats_table(&execution.stats));
    section.push_str(&generate_records_table(execution));

    section
}

fn generate_stats_table(stats: &SummaryStats) -> String {
    let mut table = String::new();

    table.push_str("| Activities | Child Workflows | Untyped | Finished | Open | **Total** |\n");
    table.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    table.push_str(&format!(
        "| {} | {} | {} | {} | {} | **{}** |\n\n",
        stats.activities, stats.child_workflows, stats.untyped, stats.finished, stats.open, stats.total
    ));

    table
}

fn generate_records_table(execution: &ExecutionReport) -> String {
    if execution.records.is_empty() {
        return "No activity or child workflow events found.\n\n".to_string();
    }

    let mut table = String::new();
    table.push_str("| Id | Type | Name | Scheduled | Started | Ended | Duration |\n");
    table.push_str("|---:|:---|:---|:---|:---|:---|---:|\n");

    for (id, record) in execution.sorted_records() {
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            id,
            record
                .record_type
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            escape_cell(record.name().unwrap_or("-")),
            format_time(record.scheduled_at()),
            format_time(record.time_start),
            format_time(record.time_end),
            record
                .duration()
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string()),
        ));
    }
    table.push('\n');

    table
}

/// Make free text safe inside a Markdown table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_duration(duration: Duration) -> String {
    format!("{:.3}s", duration.num_milliseconds() as f64 / 1000.0)
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
