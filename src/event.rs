use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub type Recipient = String;

/// Map key of the event store: `recipient:unix_seconds`.
///
/// Two events for the same recipient firing within the same second share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey(String);

impl EventKey {
    pub fn new(recipient: &str, fire_at: &DateTime<Utc>) -> Self {
        Self(format!("{}:{}", recipient, fire_at.timestamp()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub recipient: Recipient,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

impl Event {
    pub fn new(
        recipient: impl Into<Recipient>,
        fire_at: DateTime<Utc>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            fire_at,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn key(&self) -> EventKey {
        EventKey::new(&self.recipient, &self.fire_at)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.fire_at < now
    }
}
