//! Event aggregation.
//!
//! Folds a flat history into one record per activity task or child
//! workflow, keyed by the id of the event that scheduled or initiated it.

use crate::error::{HistoryError, Result};
use crate::models::{AggregatedRecord, CorrelationSource, EventKind, Phase, RawEvent, RecordType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

/// Flags controlling how unrecognized or uncorrelated events are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryOptions {
    /// Fail on the first event of an unrecognized kind.
    pub raise_on_unknown: bool,
    /// Emit a warning for skipped events.
    pub verbose: bool,
}

/// Non-fatal diagnostic raised while folding events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notice<'a> {
    /// The event carries none of the known attribute keys.
    Unsupported { event: &'a RawEvent },
    /// The event was classified but its reference id is missing.
    NoRelatedId { event: &'a RawEvent, kind: EventKind },
}

/// Group events relating to the same activity task or child workflow.
///
/// `events` are expected in ascending id order as returned by
/// [`crate::history::get_all_events`]. When several events for one id carry
/// the same attribute, the later one wins. Map order is unspecified.
pub fn summarize_events(
    events: &[RawEvent],
    options: SummaryOptions,
) -> Result<HashMap<i64, AggregatedRecord>> {
    summarize_events_with(events, options, |notice| match notice {
        Notice::Unsupported { event } => {
            warn!("Unsupported event {}: {}", event.event_id, event.fields_json());
        }
        Notice::NoRelatedId { event, kind } => {
            warn!("No related id for {} event {}", kind, event.event_id);
        }
    })
}

/// Like [`summarize_events`], delivering notices to `notify` instead of the log.
///
/// `notify` is only called when `options.verbose` is set.
pub fn summarize_events_with<'a, F>(
    events: &'a [RawEvent],
    options: SummaryOptions,
    mut notify: F,
) -> Result<HashMap<i64, AggregatedRecord>>
where
    F: FnMut(Notice<'a>),
{
    let mut aggregated: HashMap<i64, AggregatedRecord> = HashMap::new();

    for event in events {
        let Some(kind) = event.kind() else {
            if options.raise_on_unknown {
                return Err(HistoryError::UnsupportedEvent(Box::new(event.clone())));
            }
            if options.verbose {
                notify(Notice::Unsupported { event });
            }
            continue;
        };

        let attributes = event.attributes(kind);

        let Some(related_id) = correlation_id(event, kind, attributes) else {
            if options.verbose {
                notify(Notice::NoRelatedId { event, kind });
            }
            continue;
        };

        let record = aggregated.entry(related_id).or_default();
        if let Some(attributes) = attributes {
            merge_attributes(&mut record.attributes, attributes);
        }
        apply_lifecycle(record, kind, event.event_timestamp);
    }

    Ok(aggregated)
}

fn correlation_id(
    event: &RawEvent,
    kind: EventKind,
    attributes: Option<&Map<String, Value>>,
) -> Option<i64> {
    match kind.correlation_source() {
        CorrelationSource::OwnId => Some(event.event_id),
        CorrelationSource::Attribute(key) => attributes?.get(key)?.as_i64(),
    }
}

fn merge_attributes(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

fn apply_lifecycle(record: &mut AggregatedRecord, kind: EventKind, at: DateTime<Utc>) {
    match kind.phase() {
        Phase::Schedule => record.time_schedule = Some(at),
        Phase::Scheduled => record.time_scheduled = Some(at),
        Phase::Start => record.time_start = Some(at),
        Phase::End => record.time_end = Some(at),
    }
    if let Some(record_type) = kind.record_type() {
        record.record_type = Some(record_type);
    }
}

/// Counts over an aggregated history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub total: usize,
    pub activities: usize,
    pub child_workflows: usize,
    /// Records seen only through follow-up events.
    pub untyped: usize,
    pub finished: usize,
    pub open: usize,
}

impl SummaryStats {
    pub fn from_records(records: &HashMap<i64, AggregatedRecord>) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };

        for record in records.values() {
            match record.record_type {
                Some(RecordType::Activity) => stats.activities += 1,
                Some(RecordType::ChildWorkflow) => stats.child_workflows += 1,
                None => stats.untyped += 1,
            }
            if record.is_finished() {
                stats.finished += 1;
            } else {
                stats.open += 1;
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn create_event(id: i64, secs: i64, key: &str, attributes: Value) -> RawEvent {
        let mut fields = Map::new();
        fields.insert(key.to_string(), attributes);
        RawEvent {
            event_id: id,
            event_timestamp: ts(secs),
            fields,
        }
    }

    fn summarize(
        events: &[RawEvent],
        options: SummaryOptions,
    ) -> (HashMap<i64, AggregatedRecord>, Vec<Notice<'_>>) {
        let mut notices = Vec::new();
        let records = summarize_events_with(events, options, |n| notices.push(n)).unwrap();
        (records, notices)
    }

    const VERBOSE: SummaryOptions = SummaryOptions {
        raise_on_unknown: false,
        verbose: true,
    };

    #[test]
    fn test_activity_lifecycle() {
        let events = vec![
            create_event(
                1,
                100,
                "activityTaskScheduledEventAttributes",
                json!({ "activityId": "a1", "activityType": { "name": "resize", "version": "1" } }),
            ),
            create_event(
                2,
                110,
                "activityTaskStartedEventAttributes",
                json!({ "scheduledEventId": 1, "identity": "worker" }),
            ),
            create_event(
                3,
                130,
                "activityTaskCompletedEventAttributes",
                json!({ "scheduledEventId": 1, "startedEventId": 2, "result": "ok" }),
            ),
        ];

        let (records, notices) = summarize(&events, VERBOSE);

        assert!(notices.is_empty());
        assert_eq!(records.len(), 1);

        let record = &records[&1];
        assert_eq!(record.time_schedule, Some(ts(100)));
        assert_eq!(record.time_start, Some(ts(110)));
        assert_eq!(record.time_end, Some(ts(130)));
        assert_eq!(record.time_scheduled, None);
        assert_eq!(record.record_type, Some(RecordType::Activity));
        assert_eq!(record.attributes["activityId"], "a1");
        assert_eq!(record.attributes["identity"], "worker");
        assert_eq!(record.attributes["result"], "ok");
        assert_eq!(record.attributes["scheduledEventId"], 1);
        assert_eq!(record.name(), Some("resize"));
    }

    #[test]
    fn test_activity_failed_and_canceled_end_records() {
        let events = vec![
            create_event(1, 10, "activityTaskScheduledEventAttributes", json!({})),
            create_event(2, 10, "activityTaskScheduledEventAttributes", json!({})),
            create_event(3, 20, "activityTaskFailedEventAttributes", json!({ "scheduledEventId": 1, "reason": "boom" })),
            create_event(4, 25, "activityTaskCanceledEventAttributes", json!({ "scheduledEventId": 2 })),
        ];

        let records = summarize_events(&events, SummaryOptions::default()).unwrap();

        assert_eq!(records[&1].time_end, Some(ts(20)));
        assert_eq!(records[&1].attributes["reason"], "boom");
        assert_eq!(records[&2].time_end, Some(ts(25)));
    }

    #[test]
    fn test_child_workflow_lifecycle() {
        let events = vec![
            create_event(
                5,
                200,
                "startChildWorkflowExecutionInitiatedEventAttributes",
                json!({ "workflowId": "child-1", "workflowType": { "name": "ingest", "version": "2" } }),
            ),
            create_event(
                6,
                205,
                "childWorkflowExecutionStartedEventAttributes",
                json!({ "initiatedEventId": 5, "workflowExecution": { "runId": "r1" } }),
            ),
            create_event(
                9,
                260,
                "childWorkflowExecutionFailedEventAttributes",
                json!({ "initiatedEventId": 5, "reason": "timeout" }),
            ),
        ];

        let records = summarize_events(&events, SummaryOptions::default()).unwrap();

        let record = &records[&5];
        assert_eq!(record.record_type, Some(RecordType::ChildWorkflow));
        assert_eq!(record.time_scheduled, Some(ts(200)));
        assert_eq!(record.time_schedule, None);
        assert_eq!(record.time_start, Some(ts(205)));
        assert_eq!(record.time_end, Some(ts(260)));
        assert_eq!(record.attributes["reason"], "timeout");
        assert_eq!(record.name(), Some("ingest"));
    }

    #[test]
    fn test_child_workflow_completed() {
        let events = vec![
            create_event(2, 1, "startChildWorkflowExecutionInitiatedEventAttributes", json!({})),
            create_event(4, 9, "childWorkflowExecutionCompletedEventAttributes", json!({ "initiatedEventId": 2, "result": "done" })),
        ];

        let records = summarize_events(&events, SummaryOptions::default()).unwrap();

        assert_eq!(records[&2].time_end, Some(ts(9)));
        assert_eq!(records[&2].attributes["result"], "done");
    }

    #[test]
    fn test_later_attributes_win() {
        let events = vec![
            create_event(1, 1, "activityTaskScheduledEventAttributes", json!({ "control": "first", "keep": true })),
            create_event(2, 2, "activityTaskStartedEventAttributes", json!({ "scheduledEventId": 1, "control": "second" })),
        ];

        let records = summarize_events(&events, SummaryOptions::default()).unwrap();

        assert_eq!(records[&1].attributes["control"], "second");
        assert_eq!(records[&1].attributes["keep"], true);
    }

    #[test]
    fn test_lone_follow_up_creates_record() {
        let events = vec![create_event(
            100,
            50,
            "activityTaskStartedEventAttributes",
            json!({ "scheduledEventId": 99, "identity": "w" }),
        )];

        let (records, notices) = summarize(&events, VERBOSE);

        assert!(notices.is_empty());
        assert_eq!(records.len(), 1);

        let record = &records[&99];
        assert_eq!(record.time_start, Some(ts(50)));
        assert_eq!(record.time_schedule, None);
        assert_eq!(record.time_end, None);
        assert_eq!(record.record_type, None);
        assert_eq!(record.attributes["identity"], "w");
    }

    #[test]
    fn test_unknown_event_raises() {
        let events = vec![
            create_event(1, 1, "activityTaskScheduledEventAttributes", json!({})),
            create_event(2, 2, "timerStartedEventAttributes", json!({ "timerId": "t" })),
        ];

        let options = SummaryOptions {
            raise_on_unknown: true,
            verbose: false,
        };
        let err = summarize_events(&events, options).unwrap_err();

        assert_eq!(err.unsupported_event().map(|e| e.event_id), Some(2));
        assert!(err.to_string().contains("Unsupported event 2"));
        assert!(err.to_string().contains("timerStartedEventAttributes"));
    }

    #[test]
    fn test_unknown_event_skipped() {
        let events = vec![create_event(2, 2, "timerStartedEventAttributes", json!({}))];

        let (records, notices) = summarize(&events, SummaryOptions::default());
        assert!(records.is_empty());
        assert!(notices.is_empty());

        let (records, notices) = summarize(&events, VERBOSE);
        assert!(records.is_empty());
        assert_eq!(notices, vec![Notice::Unsupported { event: &events[0] }]);
    }

    #[test]
    fn test_missing_related_id() {
        let events = vec![create_event(
            3,
            3,
            "activityTaskCompletedEventAttributes",
            json!({ "result": "orphan" }),
        )];

        let (records, notices) = summarize(&events, VERBOSE);

        assert!(records.is_empty());
        assert_eq!(
            notices,
            vec![Notice::NoRelatedId {
                event: &events[0],
                kind: EventKind::ActivityTaskCompleted
            }]
        );
    }

    #[test]
    fn test_notice_refers_to_offending_event() {
        // Two events share id 7; only the second one is unsupported.
        let events = vec![
            create_event(7, 1, "activityTaskScheduledEventAttributes", json!({})),
            create_event(7, 2, "timerFiredEventAttributes", json!({ "timerId": "t1" })),
        ];

        let (records, notices) = summarize(&events, VERBOSE);

        assert_eq!(records.len(), 1);
        assert_eq!(notices.len(), 1);
        match notices[0] {
            Notice::Unsupported { event } => assert!(std::ptr::eq(event, &events[1])),
            ref other => panic!("unexpected notice: {:?}", other),
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_verbose_warning_logs_offending_fields() {
        let events = vec![
            create_event(5, 1, "activityTaskScheduledEventAttributes", json!({})),
            create_event(5, 2, "timerFiredEventAttributes", json!({ "timerId": "t-late" })),
            create_event(6, 3, "activityTaskCompletedEventAttributes", json!({})),
        ];

        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let records = tracing::subscriber::with_default(subscriber, || {
            summarize_events(&events, VERBOSE).unwrap()
        });

        let output = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(output.contains("Unsupported event 5"));
        assert!(output.contains("timerFiredEventAttributes"));
        assert!(output.contains("t-late"));
        assert!(!output.contains("activityTaskScheduledEventAttributes"));
        assert!(output.contains("No related id for activityTaskCompleted event 6"));
    }

    #[test]
    fn test_zero_correlation_id_is_kept() {
        let events = vec![
            create_event(0, 1, "activityTaskScheduledEventAttributes", json!({})),
            create_event(1, 2, "activityTaskStartedEventAttributes", json!({ "scheduledEventId": 0 })),
        ];

        let records = summarize_events(&events, SummaryOptions::default()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[&0].time_start, Some(ts(2)));
    }

    #[test]
    fn test_record_count_matches_distinct_ids() {
        let events = vec![
            create_event(1, 1, "activityTaskScheduledEventAttributes", json!({})),
            create_event(2, 1, "startChildWorkflowExecutionInitiatedEventAttributes", json!({})),
            create_event(3, 2, "activityTaskStartedEventAttributes", json!({ "scheduledEventId": 1 })),
            create_event(4, 2, "childWorkflowExecutionStartedEventAttributes", json!({ "initiatedEventId": 2 })),
            create_event(5, 3, "decisionTaskScheduledEventAttributes", json!({})),
            create_event(6, 3, "activityTaskStartedEventAttributes", json!({ "scheduledEventId": 40 })),
            create_event(7, 4, "activityTaskCompletedEventAttributes", json!({})),
        ];

        let records = summarize_events(&events, SummaryOptions::default()).unwrap();

        let mut ids: Vec<i64> = records.keys().copied().collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 40]);

        let stats = SummaryStats::from_records(&records);
        assert_eq!(
            stats,
            SummaryStats {
                total: 3,
                activities: 1,
                child_workflows: 1,
                untyped: 1,
                finished: 0,
                open: 3,
            }
        );
    }

    #[test]
    fn test_input_is_untouched() {
        let events = vec![
            create_event(1, 1, "activityTaskScheduledEventAttributes", json!({ "a": 1 })),
            create_event(2, 2, "activityTaskStartedEventAttributes", json!({ "scheduledEventId": 1, "a": 2 })),
        ];
        let before = events.clone();

        summarize_events(&events, SummaryOptions::default()).unwrap();

        assert_eq!(events, before);
    }
}
