//! File-slot relay adapter.
//!
//! One well-known JSON file in a shared directory plays the role of the
//! cross-context storage key: publishing writes the file, sibling processes
//! observe the change through a filesystem watcher, and a short moment later
//! the publisher deletes the file again. The write-then-delete dance is a
//! quirk of this adapter, not part of the relay contract.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use dashmap::DashSet;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::RelayMessage;
use crate::envelope::UpdateEnvelope;

/// How long the published value stays in the slot before cleanup. Bridges
/// the change-detection timing of slow watcher backends.
const CLEANUP_DELAY: Duration = Duration::from_millis(100);

const CHANNEL_CAPACITY: usize = 256;

pub struct SlotRelay {
    slot_path: PathBuf,
    origin: Uuid,
    inbound_tx: broadcast::Sender<RelayMessage>,
    // Dropping the watcher stops inbound delivery, so it lives as long as
    // the relay itself.
    _watcher: RecommendedWatcher,
}

impl SlotRelay {
    /// Open a relay on `slot_path`. The parent directory is created if
    /// missing and watched for changes to the slot file.
    pub fn new(slot_path: impl AsRef<Path>) -> Result<Self> {
        let slot_path = slot_path.as_ref().to_path_buf();
        let parent = slot_path
            .parent()
            .context("relay slot path has no parent directory")?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create relay directory: {}", parent.display()))?;

        // Watchers report canonical paths on some platforms; compare against
        // the canonical slot path so filtering is stable.
        let parent = parent
            .canonicalize()
            .with_context(|| format!("failed to resolve relay directory: {}", parent.display()))?;
        let slot_path = parent.join(
            slot_path
                .file_name()
                .context("relay slot path has no file name")?,
        );

        let origin = Uuid::new_v4();
        let (inbound_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let seen: Arc<DashSet<Uuid>> = Arc::new(DashSet::new());

        let tx = inbound_tx.clone();
        let watched_slot = slot_path.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let event = match result {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(%err, "relay watcher error");
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            if !event.paths.iter().any(|p| p == &watched_slot) {
                return;
            }

            // The publisher may have cleaned the slot up already; a vanished
            // value is a tolerated miss, not an error.
            let raw = match std::fs::read_to_string(&watched_slot) {
                Ok(raw) if !raw.is_empty() => raw,
                Ok(_) => return,
                Err(_) => return,
            };

            match serde_json::from_str::<RelayMessage>(&raw) {
                Ok(msg) => {
                    if msg.origin != origin && seen.insert(msg.id) {
                        let _ = tx.send(msg);
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "dropping malformed relay message");
                }
            }
        })?;
        watcher.watch(&parent, RecursiveMode::NonRecursive)?;

        tracing::debug!(slot = %slot_path.display(), %origin, "relay slot open");

        Ok(Self {
            slot_path,
            origin,
            inbound_tx,
            _watcher: watcher,
        })
    }

    /// Publish an envelope to every other process sharing the slot.
    ///
    /// The value is written under the well-known path and removed again
    /// after a short delay. Must be called within a tokio runtime (the
    /// cleanup runs as a spawned task).
    pub fn publish(&self, envelope: &UpdateEnvelope) -> Result<()> {
        let msg = RelayMessage {
            content_type: envelope.content_type.clone(),
            content: envelope.data.clone(),
            timestamp: envelope.timestamp,
            origin: self.origin,
            id: Uuid::new_v4(),
        };

        let raw = serde_json::to_string(&msg)?;
        std::fs::write(&self.slot_path, raw)
            .with_context(|| format!("failed to write relay slot: {}", self.slot_path.display()))?;

        // Cleanup is best-effort; a concurrent publisher may have replaced
        // the value in the meantime and lose it. Tolerated.
        let slot_path = self.slot_path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(CLEANUP_DELAY).await;
            let _ = std::fs::remove_file(&slot_path);
        });

        tracing::debug!(content_type = %msg.content_type, "published relay message");
        Ok(())
    }

    /// Receiver for messages published by *other* processes. The publisher
    /// never observes its own messages here.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayMessage> {
        self.inbound_tx.subscribe()
    }
}
