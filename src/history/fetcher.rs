//! Pagination over the workflow history API.

use super::HistorySource;
use crate::models::RawEvent;
use tracing::{debug, info};

/// Return all events of an execution, following every continuation token.
///
/// Events keep the order the service delivered them in: page order, then
/// order within the page. Errors from the source are returned as-is.
pub async fn get_all_events<S>(
    source: &S,
    domain: &str,
    run_id: &str,
    workflow_id: &str,
) -> Result<Vec<RawEvent>, S::Error>
where
    S: HistorySource + ?Sized,
{
    get_all_events_with_progress(source, domain, run_id, workflow_id, |_, _| {}).await
}

/// Like [`get_all_events`], calling `on_page(pages, events)` after each page.
pub async fn get_all_events_with_progress<S, F>(
    source: &S,
    domain: &str,
    run_id: &str,
    workflow_id: &str,
    mut on_page: F,
) -> Result<Vec<RawEvent>, S::Error>
where
    S: HistorySource + ?Sized,
    F: FnMut(usize, usize),
{
    let mut next_page_token: Option<String> = None;
    let mut events = Vec::new();
    let mut pages = 0usize;

    loop {
        let page = source
            .get_workflow_execution_history(domain, run_id, workflow_id, next_page_token.as_deref())
            .await?;
        pages += 1;

        debug!(
            "Page {} of {}/{}: {} events, more: {}",
            pages,
            workflow_id,
            run_id,
            page.events.len(),
            page.next_page_token.is_some()
        );

        events.extend(page.events);
        on_page(pages, events.len());

        match page.next_page_token {
            Some(token) => next_page_token = Some(token),
            None => break,
        }
    }

    info!(
        "Fetched {} events in {} pages for {}/{}",
        events.len(),
        pages,
        workflow_id,
        run_id
    );

    Ok(events)
}
