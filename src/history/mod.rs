//! Workflow execution history retrieval.
//!
//! [`HistorySource`] is the seam to the workflow service. [`SwfClient`]
//! implements it over HTTP; tests and offline tooling can plug in their own.

pub mod client;
pub mod fetcher;

pub use client::{ClientConfig, SwfClient};
pub use fetcher::{get_all_events, get_all_events_with_progress};

use crate::models::HistoryPage;
use std::future::Future;

/// A remote "get workflow execution history" operation.
pub trait HistorySource {
    /// Error returned by the remote call. Fetching propagates it untouched.
    type Error;

    /// Fetch one page of history. `next_page_token` is `None` for the first page.
    fn get_workflow_execution_history(
        &self,
        domain: &str,
        run_id: &str,
        workflow_id: &str,
        next_page_token: Option<&str>,
    ) -> impl Future<Output = Result<HistoryPage, Self::Error>> + Send;
}
