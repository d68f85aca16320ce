//! Short-lived session store binding `session_id → customer_id`.
//!
//! Sessions slide: every successful resolution refreshes `last_used_at`,
//! and a background sweeper evicts entries idle past the TTL. The
//! `customer_id` bound at creation is immutable for the session's
//! lifetime. Reads share an `RwLock` read guard and record the refresh
//! through an atomic, so concurrent resolutions never block each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
// tokio's Instant so the sliding clock follows the runtime's (pausable) time
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

struct SessionEntry {
    customer_id: String,
    /// Milliseconds since the store's epoch, updated atomically on use
    last_used_ms: AtomicU64,
}

/// In-memory session store with sliding TTL.
pub struct SessionStore {
    entries: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
    /// Monotonic reference point for `last_used_ms`
    epoch: Instant,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Create a session for an authenticated customer. Returns the opaque
    /// session id handed to the UI.
    pub fn create(&self, customer_id: impl Into<String>) -> String {
        let session_id = Uuid::new_v4().to_string();
        let customer_id = customer_id.into();
        let mut entries = self.entries.write().expect("session lock poisoned");
        entries.insert(
            session_id.clone(),
            SessionEntry {
                customer_id: customer_id.clone(),
                last_used_ms: AtomicU64::new(self.now_ms()),
            },
        );
        info!(
            component = "session",
            event = "created",
            session_id = %session_id,
            customer_id = %customer_id,
            "session created"
        );
        session_id
    }

    /// Resolve a session to its customer id, refreshing the sliding TTL.
    /// Expired sessions resolve to `None` (eviction is the sweeper's job).
    pub fn resolve(&self, session_id: &str) -> Option<String> {
        let entries = self.entries.read().expect("session lock poisoned");
        let entry = entries.get(session_id)?;
        let now = self.now_ms();
        let last_used = entry.last_used_ms.load(Ordering::Acquire);
        if now.saturating_sub(last_used) > self.ttl.as_millis() as u64 {
            return None;
        }
        entry.last_used_ms.store(now, Ordering::Release);
        Some(entry.customer_id.clone())
    }

    /// Explicitly destroy a session. Returns whether it existed.
    pub fn logout(&self, session_id: &str) -> bool {
        let mut entries = self.entries.write().expect("session lock poisoned");
        let existed = entries.remove(session_id).is_some();
        if existed {
            info!(
                component = "session",
                event = "logout",
                session_id = %session_id,
                "session destroyed"
            );
        }
        existed
    }

    /// Remove every entry idle past the TTL. Returns the eviction count.
    pub fn sweep(&self) -> usize {
        let now = self.now_ms();
        let ttl_ms = self.ttl.as_millis() as u64;
        let mut entries = self.entries.write().expect("session lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| {
            now.saturating_sub(entry.last_used_ms.load(Ordering::Acquire)) <= ttl_ms
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(
                component = "session",
                event = "sweep",
                evicted,
                remaining = entries.len(),
                "expired sessions evicted"
            );
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("session lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the sweeper loop. The cadence is a tenth of the TTL, clamped
    /// to [1 s, 60 s].
    pub async fn run_sweeper(self: Arc<Self>) {
        let cadence = (self.ttl / 10).clamp(Duration::from_secs(1), Duration::from_secs(60));
        let mut interval = tokio::time::interval(cadence);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.sweep();
        }
    }
}
