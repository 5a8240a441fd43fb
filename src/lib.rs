//! Fetch and summarize workflow execution history.
//!
//! Two operations make up the core:
//!
//! - [`history::get_all_events`] pages through the service's
//!   "get workflow execution history" call and returns every event in order.
//! - [`analysis::summarize_events`] groups the schedule, start and end events
//!   of each activity task and child workflow into one [`models::AggregatedRecord`].

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod report;

pub use analysis::{summarize_events, SummaryOptions};
pub use error::{HistoryError, Result};
pub use history::{get_all_events, HistorySource};
pub use models::{AggregatedRecord, HistoryPage, RawEvent, RecordType};
