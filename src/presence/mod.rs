//! Presence Module
//!
//! Heartbeat throttling and presence broadcasts.

mod status;
mod throttle;

pub use status::{
    event_payload, PresenceStatus, HEARTBEAT_EVENT, PRESENCE_CHANNEL, STATUS_CHANGED_EVENT,
};
pub use throttle::{HeartbeatOutcome, PresenceThrottle};
