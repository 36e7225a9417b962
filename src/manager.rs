//! Content manager - lifecycle owner and public API surface.
//!
//! Wires the update detector, content fetcher, subscription registry, and
//! broadcast relay together. Constructed explicitly by the host application
//! and passed by handle to any code that needs it; there is no ambient
//! global instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::detector::{TickTask, UpdateDetector};
use crate::envelope::{ContentType, UpdateAction, UpdateEnvelope};
use crate::fetcher::ContentFetcher;
use crate::registry::{SubscriptionId, SubscriptionKey, SubscriptionRegistry};
use crate::relay::SlotRelay;

/// Read-only snapshot returned by [`ContentManager::status`].
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub is_active: bool,
    pub subscriber_count: usize,
    pub last_update: Option<DateTime<Utc>>,
}

struct Shared {
    registry: SubscriptionRegistry,
    is_active: AtomicBool,
    visible: AtomicBool,
    last_update: RwLock<Option<DateTime<Utc>>>,
}

impl Shared {
    /// Local delivery path: record the update, then fan out. Runs to
    /// completion (all callbacks) before the caller resumes.
    fn deliver(&self, envelope: UpdateEnvelope) {
        *self.last_update.write() = Some(envelope.timestamp);
        let content_type = envelope.content_type.clone();
        self.registry.notify(&content_type, &envelope);
    }
}

pub struct ContentManager {
    shared: Arc<Shared>,
    relay: Arc<SlotRelay>,
    detector: Arc<UpdateDetector>,
    poll_interval: Duration,
    detector_task: Mutex<Option<TickTask>>,
    forwarder: JoinHandle<()>,
}

impl ContentManager {
    /// Build the manager and open the relay. The relay forwarder starts
    /// immediately: cross-process updates are delivered whether or not
    /// monitoring has been started. Must be called within a tokio runtime.
    pub fn new(config: SyncConfig) -> Result<Self> {
        let http = reqwest::Client::new();

        let shared = Arc::new(Shared {
            registry: SubscriptionRegistry::new(),
            is_active: AtomicBool::new(false),
            visible: AtomicBool::new(true),
            last_update: RwLock::new(None),
        });

        let fetcher = ContentFetcher::new(
            http.clone(),
            config.base_url.clone(),
            config.endpoint_table(),
        );

        let sink = {
            let shared = shared.clone();
            Arc::new(move |envelope: UpdateEnvelope| shared.deliver(envelope))
        };
        let detector = Arc::new(UpdateDetector::new(
            http,
            config.change_feed_url(),
            fetcher,
            sink,
        ));

        let relay = Arc::new(SlotRelay::new(&config.relay_slot)?);

        let forwarder = {
            let shared = shared.clone();
            let mut rx = relay.subscribe();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(msg) => shared.deliver(UpdateEnvelope::from(msg)),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "relay forwarder lagged, updates dropped");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        Ok(Self {
            shared,
            relay,
            detector,
            poll_interval: config.poll_interval(),
            detector_task: Mutex::new(None),
            forwarder,
        })
    }

    /// Start content monitoring. Idempotent: a second call while active logs
    /// and returns. The detection timer is armed once; it keeps firing after
    /// `stop()` (gated to no-ops), so a later restart does not create a
    /// second timer.
    pub fn start(&self) {
        if self.shared.is_active.swap(true, Ordering::SeqCst) {
            tracing::debug!("content monitoring already active");
            return;
        }

        let mut task = self.detector_task.lock();
        if task.is_none() {
            let gate = {
                let shared = self.shared.clone();
                move || {
                    shared.is_active.load(Ordering::SeqCst)
                        && shared.visible.load(Ordering::SeqCst)
                }
            };
            *task = Some(self.detector.clone().arm(self.poll_interval, gate));
        }

        tracing::debug!("started content monitoring");
    }

    /// Stop content monitoring. In-flight work is not cancelled: a fetch
    /// already underway still completes and still notifies.
    pub fn stop(&self) {
        self.shared.is_active.store(false, Ordering::SeqCst);
        tracing::debug!("stopped content monitoring");
    }

    pub fn subscribe<K, F>(&self, key: K, callback: F) -> SubscriptionId
    where
        K: Into<SubscriptionKey>,
        F: Fn(&UpdateEnvelope) -> Result<()> + Send + Sync + 'static,
    {
        self.shared.registry.subscribe(key.into(), callback)
    }

    pub fn unsubscribe<K: Into<SubscriptionKey>>(&self, key: K, id: SubscriptionId) {
        self.shared.registry.unsubscribe(&key.into(), id);
    }

    /// Push a manual update: publish to sibling processes through the relay
    /// and notify local subscribers synchronously. The local path never
    /// round-trips through the relay, and a relay failure never blocks it.
    pub fn trigger_update(&self, content_type: ContentType, content: serde_json::Value) {
        let envelope = UpdateEnvelope::new(content_type, UpdateAction::Updated, content, None);

        if let Err(err) = self.relay.publish(&envelope) {
            tracing::warn!(%err, "failed to publish update to relay");
        }

        self.shared.deliver(envelope);
    }

    /// Record whether the host considers itself foreground. A transition
    /// back to foreground forces one detection pass so updates accrued while
    /// backgrounded are not missed until the next scheduled tick.
    pub fn set_visible(&self, visible: bool) {
        let was = self.shared.visible.swap(visible, Ordering::SeqCst);
        if visible && !was {
            tracing::debug!("foreground regained, forcing a detection pass");
            if let Some(task) = self.detector_task.lock().as_ref() {
                task.kick();
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ManagerStatus {
        ManagerStatus {
            is_active: self.is_active(),
            subscriber_count: self.shared.registry.len(),
            last_update: *self.shared.last_update.read(),
        }
    }
}

impl Drop for ContentManager {
    fn drop(&mut self) {
        self.forwarder.abort();
        // The detector task aborts itself when its TickTask drops.
    }
}
