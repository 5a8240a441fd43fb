//! Data models for workflow execution history.
//!
//! This module contains the raw event records returned by the workflow
//! service, the event kind classification, and the aggregated records
//! produced by the summary pass.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single history event as returned by the workflow service.
///
/// Only `eventId` and `eventTimestamp` are interpreted directly. Every other
/// field (`eventType`, the kind-specific `...EventAttributes` object, etc.)
/// is kept verbatim in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event id, unique and increasing within one execution.
    #[serde(rename = "eventId")]
    pub event_id: i64,
    /// When the service recorded the event.
    #[serde(rename = "eventTimestamp", with = "epoch_seconds")]
    pub event_timestamp: DateTime<Utc>,
    /// All remaining fields of the event.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawEvent {
    /// Classify the event by the first known attributes key it carries.
    ///
    /// Returns `None` for events this crate does not aggregate.
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| self.fields.contains_key(kind.attributes_key()))
    }

    /// The attributes object for the given kind, if present.
    pub fn attributes(&self, kind: EventKind) -> Option<&Map<String, Value>> {
        self.fields
            .get(kind.attributes_key())
            .and_then(Value::as_object)
    }

    /// The service's `eventType` string, if present.
    pub fn event_type(&self) -> Option<&str> {
        self.fields.get("eventType").and_then(Value::as_str)
    }

    /// Compact JSON rendering of the non-id fields, for diagnostics.
    pub fn fields_json(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_default()
    }
}

/// Event kinds that take part in aggregation, in classification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskCanceled,
    StartChildWorkflowExecutionInitiated,
    ChildWorkflowExecutionStarted,
    ChildWorkflowExecutionCompleted,
    ChildWorkflowExecutionFailed,
}

/// Where an event kind takes its correlation id from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationSource {
    /// The event's own `eventId`.
    OwnId,
    /// An integer field of the attributes object.
    Attribute(&'static str),
}

/// Which lifecycle timestamp an event kind records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Activity scheduled, stored as `time_schedule`.
    Schedule,
    /// Child workflow initiated, stored as `time_scheduled`.
    Scheduled,
    Start,
    End,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::ActivityTaskScheduled,
        EventKind::ActivityTaskStarted,
        EventKind::ActivityTaskCompleted,
        EventKind::ActivityTaskFailed,
        EventKind::ActivityTaskCanceled,
        EventKind::StartChildWorkflowExecutionInitiated,
        EventKind::ChildWorkflowExecutionStarted,
        EventKind::ChildWorkflowExecutionCompleted,
        EventKind::ChildWorkflowExecutionFailed,
    ];

    /// Name of the event field holding this kind's attributes.
    pub fn attributes_key(&self) -> &'static str {
        match self {
            EventKind::ActivityTaskScheduled => "activityTaskScheduledEventAttributes",
            EventKind::ActivityTaskStarted => "activityTaskStartedEventAttributes",
            EventKind::ActivityTaskCompleted => "activityTaskCompletedEventAttributes",
            EventKind::ActivityTaskFailed => "activityTaskFailedEventAttributes",
            EventKind::ActivityTaskCanceled => "activityTaskCanceledEventAttributes",
            EventKind::StartChildWorkflowExecutionInitiated => {
                "startChildWorkflowExecutionInitiatedEventAttributes"
            }
            EventKind::ChildWorkflowExecutionStarted => {
                "childWorkflowExecutionStartedEventAttributes"
            }
            EventKind::ChildWorkflowExecutionCompleted => {
                "childWorkflowExecutionCompletedEventAttributes"
            }
            EventKind::ChildWorkflowExecutionFailed => {
                "childWorkflowExecutionFailedEventAttributes"
            }
        }
    }

    pub fn correlation_source(&self) -> CorrelationSource {
        match self {
            EventKind::ActivityTaskScheduled | EventKind::StartChildWorkflowExecutionInitiated => {
                CorrelationSource::OwnId
            }
            EventKind::ActivityTaskStarted
            | EventKind::ActivityTaskCompleted
            | EventKind::ActivityTaskFailed
            | EventKind::ActivityTaskCanceled => CorrelationSource::Attribute("scheduledEventId"),
            EventKind::ChildWorkflowExecutionStarted
            | EventKind::ChildWorkflowExecutionCompleted
            | EventKind::ChildWorkflowExecutionFailed => {
                CorrelationSource::Attribute("initiatedEventId")
            }
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            EventKind::ActivityTaskScheduled => Phase::Schedule,
            EventKind::StartChildWorkflowExecutionInitiated => Phase::Scheduled,
            EventKind::ActivityTaskStarted | EventKind::ChildWorkflowExecutionStarted => {
                Phase::Start
            }
            _ => Phase::End,
        }
    }

    /// Record type set by initiating kinds; follow-up kinds set none.
    pub fn record_type(&self) -> Option<RecordType> {
        match self {
            EventKind::ActivityTaskScheduled => Some(RecordType::Activity),
            EventKind::StartChildWorkflowExecutionInitiated => Some(RecordType::ChildWorkflow),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.attributes_key();
        write!(f, "{}", key.trim_end_matches("EventAttributes"))
    }
}

/// Type of an aggregated record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Activity,
    ChildWorkflow,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::Activity => write!(f, "activity"),
            RecordType::ChildWorkflow => write!(f, "child_workflow"),
        }
    }
}

/// One page of a paginated history response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    #[serde(default)]
    pub events: Vec<RawEvent>,
    /// Present while more pages remain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Parse events saved as JSON.
///
/// Accepts either a bare array of events or a page object with an `events`
/// field, as written by `--save-events` or returned by the service.
pub fn parse_events_json(text: &str) -> serde_json::Result<Vec<RawEvent>> {
    let value: Value = serde_json::from_str(text)?;
    if value.is_array() {
        serde_json::from_value(value)
    } else {
        let page: HistoryPage = serde_json::from_value(value)?;
        Ok(page.events)
    }
}

/// Merged view of every event sharing one correlation id.
///
/// Activities record their schedule time in `time_schedule` while child
/// workflows use `time_scheduled`. Both names are kept so the serialized
/// form stays compatible with existing consumers; use
/// [`AggregatedRecord::scheduled_at`] to read either.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    /// Attributes of all folded events, later events overwriting earlier keys.
    pub attributes: Map<String, Value>,
    #[serde(
        default,
        with = "epoch_seconds::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_schedule: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "epoch_seconds::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_scheduled: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "epoch_seconds::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_start: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "epoch_seconds::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_end: Option<DateTime<Utc>>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<RecordType>,
}

impl AggregatedRecord {
    /// Schedule time regardless of which field the record type uses.
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.time_schedule.or(self.time_scheduled)
    }

    /// Time between start and end, when both were seen.
    pub fn duration(&self) -> Option<Duration> {
        match (self.time_start, self.time_end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Activity or workflow type name from the merged attributes.
    pub fn name(&self) -> Option<&str> {
        ["activityType", "workflowType"]
            .iter()
            .find_map(|key| self.attributes.get(*key))
            .and_then(|ty| ty.get("name"))
            .and_then(Value::as_str)
    }

    pub fn is_finished(&self) -> bool {
        self.time_end.is_some()
    }
}

/// Serde adapter for event timestamps.
///
/// The service sends epoch seconds as a JSON number (possibly fractional).
/// RFC 3339 strings are accepted too so hand-written fixtures stay readable.
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Seconds(f64),
        Text(String),
    }

    impl Wire {
        fn into_timestamp<E: Error>(self) -> Result<DateTime<Utc>, E> {
            match self {
                Wire::Seconds(secs) => from_seconds(secs)
                    .ok_or_else(|| E::custom(format!("timestamp out of range: {}", secs))),
                Wire::Text(text) => DateTime::parse_from_rfc3339(&text)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(E::custom),
            }
        }
    }

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(to_seconds(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Wire::deserialize(deserializer)?.into_timestamp()
    }

    /// Same encoding for optional timestamps; `null` reads as `None`.
    pub mod option {
        use super::Wire;
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match ts {
                Some(ts) => serializer.serialize_some(&super::to_seconds(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<Wire>::deserialize(deserializer)?
                .map(Wire::into_timestamp)
                .transpose()
        }
    }

    fn to_seconds(ts: &DateTime<Utc>) -> f64 {
        ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1e9
    }

    pub(super) fn from_seconds(secs: f64) -> Option<DateTime<Utc>> {
        if !secs.is_finite() {
            return None;
        }
        let whole = secs.floor();
        let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
        DateTime::from_timestamp(whole as i64, nanos)
    }
}
