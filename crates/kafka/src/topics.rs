//! Topic naming helpers.

/// Suffix appended to a topic to derive its dead-letter destination.
pub const DEAD_LETTER_SUFFIX: &str = ".DLT";

/// Dead-letter topic for `topic`, e.g. `user_events` -> `user_events.DLT`.
pub fn dead_letter_topic(topic: &str, suffix: &str) -> String {
    format!("{topic}{suffix}")
}

/// Header names carried on dead-letter records.
pub mod headers {
    pub const ORIGINAL_TOPIC: &str = "x-original-topic";
    pub const ORIGINAL_PARTITION: &str = "x-original-partition";
    pub const ORIGINAL_OFFSET: &str = "x-original-offset";
    pub const EXCEPTION_MESSAGE: &str = "x-exception-message";
}
