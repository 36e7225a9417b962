//! # ContentSync - Real-Time Content Update Distribution
//!
//! Detects changes to server-held content, fetches the fresh payload, and
//! fans it out to subscribers in-process and across sibling processes of the
//! same deployment.
//!
//! ## Features
//!
//! - **Ordered fan-out**: wildcard subscribers first, then type subscribers,
//!   in registration order, with per-callback error isolation
//! - **Change-feed polling**: fixed-interval detection gated on activity and
//!   foreground visibility, with a forced pass on foreground regain
//! - **Cross-process relay**: best-effort broadcast over a shared slot file,
//!   at-most-once per process, publisher echo suppressed
//! - **Transient-fault tolerant**: no failure stops the schedule; the worst
//!   case is a missed or delayed update
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use contentsync::{ContentManager, ContentType, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = ContentManager::new(SyncConfig::default())?;
//!
//!     manager.subscribe(ContentType::Faq, |envelope| {
//!         println!("faq changed: {} items", envelope.count.unwrap_or(0));
//!         Ok(())
//!     });
//!
//!     manager.start();
//!     tokio::signal::ctrl_c().await?;
//!     manager.stop();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod detector;
pub mod envelope;
pub mod fetcher;
pub mod manager;
pub mod registry;
pub mod relay;

// Re-export main types for library consumers
pub use config::SyncConfig;
pub use envelope::{ContentType, UpdateAction, UpdateEnvelope};
pub use manager::{ContentManager, ManagerStatus};
pub use registry::{SubscriptionId, SubscriptionKey};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
