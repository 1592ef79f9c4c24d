//! Admission control for the upstream proxy.
//!
//! Two gates share one counting rule ([`UsageWindow`]):
//! - [`ProcessQuota`]: a single process-wide window (daily ceiling), guarded by a mutex.
//! - [`ClientRateLimiter`]: one window per client key (hourly ceiling), held in a `DashMap`
//!   whose per-key entry lock makes check-and-increment atomic. A background sweeper
//!   drops expired entries without blocking admission on other keys.
//!
//! State is process-local and resets on restart.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Snapshot reported to callers and rendered as `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitStatus {
    /// Window end in whole epoch seconds, rounded up.
    pub fn reset_epoch_secs(&self) -> i64 {
        (self.reset_at.timestamp_millis() + 999).div_euclid(1000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed(RateLimitStatus),
    Rejected(RateLimitStatus),
    /// Key is whitelisted; nothing was counted.
    Exempt,
}

impl Decision {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Rejected(_))
    }

    pub fn status(&self) -> Option<RateLimitStatus> {
        match self {
            Decision::Allowed(s) | Decision::Rejected(s) => Some(*s),
            Decision::Exempt => None,
        }
    }
}

/// Request count inside a resetting time window.
#[derive(Debug, Clone)]
pub struct UsageWindow {
    count: u32,
    window_start: DateTime<Utc>,
    window_length: Duration,
    limit: u32,
}

impl UsageWindow {
    pub fn new(limit: u32, window_length: Duration, now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
            window_length,
            limit,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.window_start > self.window_length
    }

    /// Resets an expired window and reports whether another call fits, without counting it.
    pub fn check(&mut self, now: DateTime<Utc>) -> Decision {
        self.roll(now);
        if self.count >= self.limit {
            return Decision::Rejected(self.status());
        }
        Decision::Allowed(self.status())
    }

    /// Resets an expired window, then counts the call unless the ceiling is reached.
    /// Rejected calls are not counted.
    pub fn admit(&mut self, now: DateTime<Utc>) -> Decision {
        self.roll(now);
        if self.count >= self.limit {
            return Decision::Rejected(self.status());
        }
        self.count += 1;
        Decision::Allowed(self.status())
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        if self.is_expired(now) {
            self.count = 0;
            self.window_start = now;
        }
    }

    pub fn status(&self) -> RateLimitStatus {
        RateLimitStatus {
            limit: self.limit,
            remaining: self.limit.saturating_sub(self.count),
            reset_at: self.window_start + self.window_length,
        }
    }
}

/// Process-wide ceiling shared by every caller.
#[derive(Debug)]
pub struct ProcessQuota {
    window: Mutex<UsageWindow>,
}

impl ProcessQuota {
    pub fn new(limit: u32, window_length: Duration) -> Self {
        Self {
            window: Mutex::new(UsageWindow::new(limit, window_length, Utc::now())),
        }
    }

    pub fn admit(&self) -> Decision {
        self.admit_at(Utc::now())
    }

    /// Early refusal for an exhausted quota. Counts nothing; [`ProcessQuota::admit`]
    /// still decides once the request is known to be valid.
    pub fn check(&self) -> Decision {
        self.check_at(Utc::now())
    }

    pub fn check_at(&self, now: DateTime<Utc>) -> Decision {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .check(now)
    }

    pub fn admit_at(&self, now: DateTime<Utc>) -> Decision {
        let decision = self
            .window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit(now);
        if decision.is_rejected() {
            warn!(target: "nytechat::admission", "Process quota exhausted; rejecting upstream call");
        }
        decision
    }

    pub fn status(&self) -> RateLimitStatus {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .status()
    }
}

/// Per-client ceiling keyed by client identity (usually the IP address).
#[derive(Debug)]
pub struct ClientRateLimiter {
    entries: DashMap<String, UsageWindow>,
    limit: u32,
    window_length: Duration,
    whitelist: HashSet<String>,
}

impl ClientRateLimiter {
    pub fn new(limit: u32, window_length: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
            window_length,
            whitelist: HashSet::new(),
        }
    }

    pub fn with_whitelist<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn admit(&self, key: &str) -> Decision {
        self.admit_at(key, Utc::now())
    }

    pub fn admit_at(&self, key: &str, now: DateTime<Utc>) -> Decision {
        if self.whitelist.contains(key) {
            return Decision::Exempt;
        }
        let mut window = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| UsageWindow::new(self.limit, self.window_length, now));
        let decision = window.admit(now);
        if decision.is_rejected() {
            warn!(target: "nytechat::admission", "Rate limit exceeded for client {}", key);
        }
        decision
    }

    /// Drops entries whose window has expired. Returns how many were removed.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, window| !window.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(target: "nytechat::admission", "Swept {} expired client windows", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs [`ClientRateLimiter::sweep_at`] on a fixed period in a background task.
pub fn start_sweeper(
    limiter: Arc<ClientRateLimiter>,
    period: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    info!(target: "nytechat::admission", "Client window sweeper started ({:?} period)", period);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            limiter.sweep_at(Utc::now());
        }
    })
}
