use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use contentsync::{ContentManager, ContentType, SyncConfig, UpdateAction, UpdateEnvelope};

fn reserve_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

#[derive(Clone)]
struct StubState {
    /// One pending faq update, consumed by the first change-feed poll.
    pending: Arc<AtomicBool>,
    feed_hits: Arc<AtomicU32>,
}

async fn change_feed(State(state): State<StubState>) -> Json<serde_json::Value> {
    state.feed_hits.fetch_add(1, Ordering::SeqCst);
    if state.pending.swap(false, Ordering::SeqCst) {
        Json(serde_json::json!({
            "success": true,
            "updates": [{"content_type": "faq", "action": "updated"}],
        }))
    } else {
        Json(serde_json::json!({"success": true, "updates": []}))
    }
}

async fn faq_data() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "data": [
            {"q": "When is the first scan?", "a": "Around week 12."},
            {"q": "Folic acid?", "a": "Daily."},
            {"q": "Iron supplements?", "a": "As prescribed."},
            {"q": "Caffeine?", "a": "Limit it."},
            {"q": "Travel?", "a": "Ask your doctor."}
        ],
        "count": 5,
    }))
}

async fn start_stub(port: u16, state: StubState) -> Result<()> {
    let app = Router::new()
        .route("/api/content-updates", get(change_feed))
        .route("/api/faq-data", get(faq_data))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    sleep(Duration::from_millis(100)).await;
    Ok(())
}

fn test_config(dir: &TempDir, port: u16, poll_interval_ms: u64) -> SyncConfig {
    SyncConfig {
        base_url: format!("http://127.0.0.1:{}", port),
        poll_interval_ms,
        relay_slot: dir.path().join("content-update.json"),
        ..SyncConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn change_feed_update_reaches_subscriber_exactly_once() -> Result<()> {
    let dir = TempDir::new()?;
    let port = reserve_port()?;
    let state = StubState {
        pending: Arc::new(AtomicBool::new(true)),
        feed_hits: Arc::new(AtomicU32::new(0)),
    };
    start_stub(port, state).await?;

    let manager = ContentManager::new(test_config(&dir, port, 200))?;
    let (tx, mut rx) = mpsc::unbounded_channel::<UpdateEnvelope>();
    manager.subscribe(ContentType::Faq, move |envelope| {
        tx.send(envelope.clone())?;
        Ok(())
    });
    manager.start();

    let envelope = timeout(Duration::from_secs(5), rx.recv())
        .await?
        .expect("subscriber channel closed");

    assert_eq!(envelope.content_type, ContentType::Faq);
    assert_eq!(envelope.action, UpdateAction::Updated);
    assert_eq!(envelope.count, Some(5));
    assert_eq!(envelope.data.as_array().map(|a| a.len()), Some(5));
    assert!((Utc::now() - envelope.timestamp).num_seconds() < 10);
    assert!(manager.status().last_update.is_some());

    // The pending flag was consumed; later polls report nothing and the
    // subscriber hears nothing more.
    sleep(Duration::from_millis(600)).await;
    assert!(rx.try_recv().is_err());

    manager.stop();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unreachable_change_feed_skips_passes_without_failing() -> Result<()> {
    let dir = TempDir::new()?;
    // Reserved but never bound: every poll hits a closed port.
    let port = reserve_port()?;

    let manager = ContentManager::new(test_config(&dir, port, 100))?;
    let (tx, mut rx) = mpsc::unbounded_channel::<UpdateEnvelope>();
    manager.subscribe("all", move |envelope| {
        tx.send(envelope.clone())?;
        Ok(())
    });
    manager.start();

    sleep(Duration::from_millis(600)).await;

    assert!(rx.try_recv().is_err());
    // Failures never stop the schedule or flip the manager off.
    assert!(manager.is_active());

    manager.stop();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stopped_manager_issues_no_requests() -> Result<()> {
    let dir = TempDir::new()?;
    let port = reserve_port()?;
    let state = StubState {
        pending: Arc::new(AtomicBool::new(true)),
        feed_hits: Arc::new(AtomicU32::new(0)),
    };
    let feed_hits = state.feed_hits.clone();
    start_stub(port, state).await?;

    let manager = ContentManager::new(test_config(&dir, port, 100))?;
    manager.start();
    manager.stop();

    // The timer keeps firing after stop(), but every pass is gated off.
    sleep(Duration::from_millis(500)).await;
    assert_eq!(feed_hits.load(Ordering::SeqCst), 0);
    assert!(!manager.is_active());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn foreground_regain_forces_one_extra_pass() -> Result<()> {
    let dir = TempDir::new()?;
    let port = reserve_port()?;
    let state = StubState {
        pending: Arc::new(AtomicBool::new(false)),
        feed_hits: Arc::new(AtomicU32::new(0)),
    };
    let feed_hits = state.feed_hits.clone();
    start_stub(port, state).await?;

    // Period far beyond the test horizon: any poll observed here came from
    // the forced pass, not the timer.
    let manager = ContentManager::new(test_config(&dir, port, 3_600_000))?;
    manager.start();

    manager.set_visible(false);
    manager.set_visible(true);
    sleep(Duration::from_millis(500)).await;
    assert_eq!(feed_hits.load(Ordering::SeqCst), 1);

    // No transition, no extra pass.
    manager.set_visible(true);
    sleep(Duration::from_millis(300)).await;
    assert_eq!(feed_hits.load(Ordering::SeqCst), 1);

    manager.stop();
    Ok(())
}
