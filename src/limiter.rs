// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter keyed by client identity.
//!
//! Each client gets `max_requests` submissions per window. The window starts
//! at the client's first request and is reset by the first request after it
//! has elapsed. Every write request consumes quota, whatever happens to it
//! afterwards.
//!
//! The table is bounded: expired windows are swept periodically, and when the
//! table is full the client with the oldest window is evicted. Windows are
//! indexed by start time, so both only touch the entries they remove.

use crate::client::ClientIdentity;
use crate::config::RateLimitConfig;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining requests in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// Request count within one client's current window.
#[derive(Debug, Clone, Copy)]
struct WindowState {
    window_start: Instant,
    count: u32,
}

impl WindowState {
    fn expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }

    fn reset_in(&self, now: Instant, window: Duration) -> Duration {
        (self.window_start + window).saturating_duration_since(now)
    }
}

/// Client windows plus an index ordered by window start.
#[derive(Debug, Default)]
struct WindowTable {
    windows: HashMap<ClientIdentity, WindowState>,
    by_start: BTreeSet<(Instant, ClientIdentity)>,
}

impl WindowTable {
    fn len(&self) -> usize {
        self.windows.len()
    }

    fn contains(&self, client: &ClientIdentity) -> bool {
        self.windows.contains_key(client)
    }

    /// The live window for `client`, opening a fresh one if it has none or
    /// the old one has expired.
    fn current(
        &mut self,
        client: &ClientIdentity,
        now: Instant,
        window: Duration,
    ) -> &mut WindowState {
        let by_start = &mut self.by_start;
        let state = self.windows.entry(client.clone()).or_insert_with(|| {
            by_start.insert((now, client.clone()));
            WindowState {
                window_start: now,
                count: 0,
            }
        });

        if state.expired(now, window) {
            by_start.remove(&(state.window_start, client.clone()));
            by_start.insert((now, client.clone()));
            *state = WindowState {
                window_start: now,
                count: 0,
            };
        }
        state
    }

    /// Remove every window that has expired at `now`.
    fn drop_expired(&mut self, now: Instant, window: Duration) -> usize {
        let mut removed = 0;
        while let Some(start) = self.by_start.first().map(|(start, _)| *start) {
            if now.saturating_duration_since(start) < window {
                break;
            }
            if let Some((_, client)) = self.by_start.pop_first() {
                self.windows.remove(&client);
                removed += 1;
            }
        }
        removed
    }

    /// Remove the window that started first.
    fn evict_oldest(&mut self) -> Option<ClientIdentity> {
        let (_, client) = self.by_start.pop_first()?;
        self.windows.remove(&client);
        Some(client)
    }
}

/// Thread-safe rate limiter.
pub struct RateLimiter {
    /// Configuration
    config: RateLimitConfig,
    /// Per-client windows
    windows: Arc<RwLock<WindowTable>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(RwLock::new(WindowTable::default())),
        }
    }

    /// Count a request from `client` at `now` and decide whether to admit it.
    pub async fn admit(&self, client: &ClientIdentity, now: Instant) -> RateLimitResult {
        let window = self.config.window_duration();
        let max = self.config.max_requests;

        let mut windows = self.windows.write().await;

        if !windows.contains(client) && windows.len() >= self.config.max_tracked_clients {
            make_room(&mut windows, now, window, self.config.max_tracked_clients);
        }

        let state = windows.current(client, now, window);
        if state.count >= max {
            let retry_after = state.reset_in(now, window);
            debug!(client = %client, ?retry_after, "Client rate limit exceeded");
            return RateLimitResult::Limited { retry_after };
        }

        state.count += 1;
        RateLimitResult::Allowed {
            remaining: max - state.count,
            reset_in: state.reset_in(now, window),
        }
    }

    /// Drop windows that have expired at `now`. Returns how many were removed.
    pub async fn sweep(&self, now: Instant) -> usize {
        let window = self.config.window_duration();
        self.windows.write().await.drop_expired(now, window)
    }

    /// Number of client identities currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.windows.read().await.len()
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

/// Free one slot in a full table: expired windows first, then the oldest.
fn make_room(table: &mut WindowTable, now: Instant, window: Duration, capacity: usize) {
    table.drop_expired(now, window);
    if table.len() < capacity {
        return;
    }

    if let Some(client) = table.evict_oldest() {
        warn!(client = %client, "Rate limit table full, evicting oldest window");
    }
}
