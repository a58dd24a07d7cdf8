//! Event type definitions for the analytics pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::Error;

/// Kinds of user-behavior events carried on the ingestion topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    PageView,
    Click,
    AddToCart,
    Checkout,
    Search,
    Purchase,
}

impl EventType {
    /// All event types, for synthetic generation.
    pub const ALL: &'static [EventType] = &[
        EventType::PageView,
        EventType::Click,
        EventType::AddToCart,
        EventType::Checkout,
        EventType::Search,
        EventType::Purchase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageView => "PAGE_VIEW",
            Self::Click => "CLICK",
            Self::AddToCart => "ADD_TO_CART",
            Self::Checkout => "CHECKOUT",
            Self::Search => "SEARCH",
            Self::Purchase => "PURCHASE",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    /// Parses a wire value, tolerating surrounding whitespace and case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PAGE_VIEW" => Ok(Self::PageView),
            "CLICK" => Ok(Self::Click),
            "ADD_TO_CART" => Ok(Self::AddToCart),
            "CHECKOUT" => Ok(Self::Checkout),
            "SEARCH" => Ok(Self::Search),
            "PURCHASE" => Ok(Self::Purchase),
            other => Err(Error::invalid_argument(format!(
                "unknown event type: {other}"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// A single user-behavior event.
///
/// Wire format is UTF-8 JSON with camelCase field names. `userId` is the
/// only required field; an event without it cannot be aggregated and fails
/// decoding.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserEvent {
    /// Opaque unique user identifier
    pub user_id: Uuid,
    /// Event kind
    pub event_type: EventType,
    /// When the event occurred; processing time is substituted when absent
    #[serde(
        default,
        rename = "eventTimestamp",
        alias = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    /// Page the event happened on; may be absent for non-page events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2048))]
    pub page_url: Option<String>,
    /// Producer-supplied session id; derived deterministically when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 128))]
    pub session_id: Option<String>,
}

impl UserEvent {
    /// Creates an event with only the required fields set.
    pub fn new(user_id: Uuid, event_type: EventType) -> Self {
        Self {
            user_id,
            event_type,
            timestamp: None,
            page_url: None,
            session_id: None,
        }
    }

    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }

    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// The page url, or "" when absent.
    pub fn page_url_or_empty(&self) -> &str {
        self.page_url.as_deref().unwrap_or("")
    }
}
