//! Update detection - polls the change feed and fans fresh content out.
//!
//! Each pass asks the change-feed endpoint what changed since the last check
//! and delegates every reported `(content_type, action)` pair to the content
//! fetcher, one at a time. A failed pass is logged and skipped; the schedule
//! itself is never stopped by a failure.

pub mod scheduler;

pub use scheduler::TickTask;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::envelope::{ContentType, UpdateAction, UpdateEnvelope};
use crate::fetcher::ContentFetcher;

/// Where produced envelopes go (the manager's local delivery path).
pub type DeliverySink = Arc<dyn Fn(UpdateEnvelope) + Send + Sync>;

#[derive(Debug, Deserialize)]
struct ChangeFeed {
    success: bool,
    #[serde(default)]
    updates: Vec<ChangeEntry>,
}

#[derive(Debug, Deserialize)]
struct ChangeEntry {
    content_type: ContentType,
    action: UpdateAction,
}

pub struct UpdateDetector {
    http: reqwest::Client,
    feed_url: String,
    fetcher: ContentFetcher,
    sink: DeliverySink,
}

impl UpdateDetector {
    pub fn new(
        http: reqwest::Client,
        feed_url: String,
        fetcher: ContentFetcher,
        sink: DeliverySink,
    ) -> Self {
        Self {
            http,
            feed_url,
            fetcher,
            sink,
        }
    }

    /// Arm the recurring detection pass. `gate` is evaluated at every pass;
    /// the returned task's `kick()` forces one out-of-band pass.
    pub fn arm<G>(self: Arc<Self>, period: Duration, gate: G) -> TickTask
    where
        G: Fn() -> bool + Send + 'static,
    {
        TickTask::spawn(period, gate, move || {
            let detector = self.clone();
            async move {
                detector.run_once().await;
            }
        })
    }

    /// One detection pass. Never fails: every error path is logged and the
    /// pass abandoned, leaving the next scheduled pass untouched.
    pub async fn run_once(&self) {
        let response = match self
            .http
            .get(&self.feed_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%err, "change-feed request failed, skipping this pass");
                return;
            }
        };

        let feed: ChangeFeed = match response.json().await {
            Ok(feed) => feed,
            Err(err) => {
                tracing::warn!(%err, "malformed change-feed response, skipping this pass");
                return;
            }
        };

        if !feed.success || feed.updates.is_empty() {
            return;
        }

        tracing::debug!(count = feed.updates.len(), "change feed reported updates");

        // Sequential on purpose: bounds the burst load on the origin server.
        for entry in feed.updates {
            if let Some(envelope) = self.fetcher.fetch(&entry.content_type, entry.action).await {
                (self.sink)(envelope);
            }
        }
    }
}
