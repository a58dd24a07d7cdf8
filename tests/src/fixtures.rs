//! Test fixtures and builders.

use analytics_core::{EventType, UserEvent};
use chrono::{DateTime, TimeZone, Utc};
use kafka_transport::RawMessage;
use uuid::Uuid;

pub const TEST_TOPIC: &str = "user_events";

/// A fixed, readable base instant for window arithmetic.
pub fn base_time() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
}

pub fn page_view(user_id: Uuid, url: &str, ts: DateTime<Utc>) -> UserEvent {
    UserEvent::new(user_id, EventType::PageView)
        .with_timestamp(ts)
        .with_page_url(url)
}

/// Wraps an event as a raw transport message.
pub fn raw_message(event: &UserEvent, partition: i32, offset: i64) -> RawMessage {
    RawMessage {
        topic: TEST_TOPIC.to_string(),
        partition,
        offset,
        payload: serde_json::to_vec(event).unwrap(),
    }
}

/// A message whose payload can never decode.
pub fn malformed_message(partition: i32, offset: i64) -> RawMessage {
    RawMessage {
        topic: TEST_TOPIC.to_string(),
        partition,
        offset,
        payload: b"{not json".to_vec(),
    }
}

/// Header value as UTF-8, for assertions.
pub fn header_str(record: &kafka_transport::DeadLetterRecord, name: &str) -> String {
    String::from_utf8(record.headers.get(name).cloned().unwrap_or_default()).unwrap()
}
