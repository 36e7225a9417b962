//! Cancellable tick scheduler.
//!
//! Drives a recurring piece of async work on a fixed period, with a gating
//! predicate evaluated at every pass and an explicit kick API for one
//! out-of-band pass. Passes never overlap: the work future is awaited inside
//! the loop, and a kick arriving mid-pass is buffered and runs exactly one
//! extra pass afterwards. The timer itself is never paused for in-flight
//! work, so a slow pass can be followed immediately by the next firing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

pub struct TickTask {
    handle: JoinHandle<()>,
    kick: Arc<Notify>,
}

impl TickTask {
    /// Spawn the tick loop. The first scheduled pass happens one full
    /// `period` after spawning; `gate` is consulted before every pass,
    /// scheduled or kicked.
    pub fn spawn<G, W, F>(period: Duration, gate: G, work: W) -> Self
    where
        G: Fn() -> bool + Send + 'static,
        W: Fn() -> F + Send + 'static,
        F: Future<Output = ()> + Send,
    {
        let kick = Arc::new(Notify::new());
        let kick_rx = kick.clone();

        let handle = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = timer.tick() => {}
                    _ = kick_rx.notified() => {}
                }
                if gate() {
                    work().await;
                }
            }
        });

        Self { handle, kick }
    }

    /// Force one out-of-band pass without touching the timer.
    pub fn kick(&self) {
        self.kick.notify_one();
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for TickTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
