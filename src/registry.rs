//! Subscription registry - ordered fan-out of update envelopes.
//!
//! Maps a routing key (a content type, or the `all` wildcard) to the list of
//! subscriber callbacks registered under it. Delivery order is registration
//! order, wildcard subscribers first. The registry holds no data beyond the
//! mapping itself.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::envelope::{ContentType, UpdateEnvelope};

/// Key a callback is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionKey {
    /// Wildcard: receives every envelope regardless of content type.
    All,
    Type(ContentType),
}

impl From<ContentType> for SubscriptionKey {
    fn from(ct: ContentType) -> Self {
        SubscriptionKey::Type(ct)
    }
}

impl From<&str> for SubscriptionKey {
    fn from(s: &str) -> Self {
        if s == "all" {
            SubscriptionKey::All
        } else {
            SubscriptionKey::Type(ContentType::from(s))
        }
    }
}

/// Opaque handle returned by `subscribe`; required to unsubscribe.
///
/// Closures have no identity in Rust, so the handle stands in for the
/// callback-pair identity of the subscription. Callers that subscribe the
/// same callback twice get two handles and two deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

pub type SubscriberCallback = Arc<dyn Fn(&UpdateEnvelope) -> anyhow::Result<()> + Send + Sync>;

pub struct SubscriptionRegistry {
    entries: DashMap<SubscriptionKey, Vec<(SubscriptionId, SubscriberCallback)>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register `callback` under `key`. No de-duplication: every call adds a
    /// new entry, even for an identical callback.
    pub fn subscribe<F>(&self, key: SubscriptionKey, callback: F) -> SubscriptionId
    where
        F: Fn(&UpdateEnvelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.entries
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(callback)));
        tracing::debug!(?key, ?id, "subscribed to content updates");
        id
    }

    /// Remove the first registration matching `key` + `id`. Silent no-op if
    /// nothing matches.
    pub fn unsubscribe(&self, key: &SubscriptionKey, id: SubscriptionId) {
        if let Some(mut list) = self.entries.get_mut(key) {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                tracing::debug!(?key, ?id, "unsubscribed from content updates");
            }
        }
    }

    /// Invoke all `all` subscribers, then all subscribers of `content_type`,
    /// in registration order. A callback returning `Err` is logged and does
    /// not stop the remaining callbacks, nor surface to the caller.
    pub fn notify(&self, content_type: &ContentType, envelope: &UpdateEnvelope) {
        // Snapshot before invoking so callbacks may re-enter the registry
        // without holding any map guard.
        let mut callbacks: Vec<SubscriberCallback> = Vec::new();
        if let Some(list) = self.entries.get(&SubscriptionKey::All) {
            callbacks.extend(list.iter().map(|(_, cb)| cb.clone()));
        }
        if let Some(list) = self.entries.get(&SubscriptionKey::Type(content_type.clone())) {
            callbacks.extend(list.iter().map(|(_, cb)| cb.clone()));
        }

        for callback in callbacks {
            if let Err(err) = callback(envelope) {
                tracing::warn!(content_type = %content_type, %err, "subscriber callback failed");
            }
        }
    }

    /// Total number of registered callbacks across all keys.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
