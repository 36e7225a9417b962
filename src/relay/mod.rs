//! Cross-process broadcast relay.
//!
//! Turns a local publish into a signal every sibling process of the same
//! deployment can observe. The contract is intentionally narrow: publish an
//! envelope, receive the messages other processes published. Delivery is
//! best-effort and at-most-once per process; the relay never stores anything
//! beyond the instant needed to signal the other side.

pub mod slot;

pub use slot::SlotRelay;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{ContentType, UpdateAction, UpdateEnvelope};

/// Wire value carried through the relay.
///
/// `origin` identifies the publishing relay so a process can drop its own
/// echo; `id` lets receivers collapse duplicate change notifications from the
/// underlying storage into a single delivery. Both are adapter-level details
/// and never reach subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayMessage {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub content: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub origin: Uuid,
    pub id: Uuid,
}

impl From<RelayMessage> for UpdateEnvelope {
    fn from(msg: RelayMessage) -> Self {
        UpdateEnvelope {
            content_type: msg.content_type,
            action: UpdateAction::Updated,
            data: msg.content,
            count: None,
            timestamp: msg.timestamp,
        }
    }
}
