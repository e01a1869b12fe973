//! Presence status and broadcast events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Channel all presence events are published on.
pub const PRESENCE_CHANNEL: &str = "presence";
/// Event emitted when a heartbeat reaches the durable store.
pub const HEARTBEAT_EVENT: &str = "online";
/// Event emitted on an explicit status transition.
pub const STATUS_CHANGED_EVENT: &str = "status-changed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceStatus::Online => write!(f, "online"),
            PresenceStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Payload published for every presence event.
pub fn event_payload(user_id: &str, status: PresenceStatus, at: DateTime<Utc>) -> Value {
    json!({
        "userId": user_id,
        "status": status,
        "at": at.to_rfc3339(),
    })
}
