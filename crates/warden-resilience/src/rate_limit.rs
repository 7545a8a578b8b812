//! Tiered sliding-window rate limiting.
//!
//! Each caller has one window per tier. An operation class consumes a fixed
//! set of tiers:
//!
//! 1. **Standard**: `global`
//! 2. **Namespace admin**: `global` + `namespace-admin`
//! 3. **Privileged**: `global` + `namespace-admin` + `privileged`
//!
//! A request is admitted only if every applicable window has room, and is
//! then recorded in all of them. A rejected request is recorded in none.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::error::RateLimitRejection;

/// Window a request can be counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateTier {
    Global,
    NamespaceAdmin,
    Privileged,
}

impl RateTier {
    /// Returns a static string label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::NamespaceAdmin => "namespace-admin",
            Self::Privileged => "privileged",
        }
    }
}

impl std::fmt::Display for RateTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cost class of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationClass {
    /// Reader/writer grants, status queries, cluster listing.
    Standard,
    /// Admin grants outside production, namespace removal.
    NamespaceAdmin,
    /// Most-privileged grants in production.
    Privileged,
}

impl OperationClass {
    pub fn tiers(&self) -> &'static [RateTier] {
        match self {
            Self::Standard => &[RateTier::Global],
            Self::NamespaceAdmin => &[RateTier::Global, RateTier::NamespaceAdmin],
            Self::Privileged => &[
                RateTier::Global,
                RateTier::NamespaceAdmin,
                RateTier::Privileged,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::NamespaceAdmin => "namespace-admin",
            Self::Privileged => "privileged",
        }
    }
}

type WindowKey = (String, RateTier);

/// Sliding-window log limiter keyed by caller and tier.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<WindowKey, VecDeque<Instant>>>,
    last_purge: Mutex<Option<Instant>>,
    rejected: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            windows: Mutex::new(HashMap::new()),
            last_purge: Mutex::new(None),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check every window `class` consumes and record the request in all of
    /// them, or reject without recording anything.
    pub fn check(&self, caller: &str, class: OperationClass) -> Result<(), RateLimitRejection> {
        let now = self.clock.now();
        let tiers = class.tiers();
        let mut windows = self.windows.lock();

        let mut exhausted: Option<(RateTier, Duration)> = None;
        for &tier in tiers {
            let limit = self.config.window(tier);
            let key = (caller.to_string(), tier);
            let Some(entries) = windows.get_mut(&key) else {
                if limit.max_requests == 0 {
                    exhausted = Self::longer(exhausted, tier, limit.window);
                }
                continue;
            };

            Self::evict(entries, now, limit.window);
            if entries.len() as u64 >= u64::from(limit.max_requests) {
                let retry_after = entries
                    .front()
                    .map(|oldest| (*oldest + limit.window).saturating_duration_since(now))
                    .unwrap_or(limit.window);
                exhausted = Self::longer(exhausted, tier, retry_after);
            }
        }

        if let Some((tier, retry_after)) = exhausted {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(
                caller = %caller,
                tier = %tier,
                class = class.as_str(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            return Err(RateLimitRejection {
                tier,
                caller: caller.to_string(),
                retry_after,
            });
        }

        for &tier in tiers {
            windows
                .entry((caller.to_string(), tier))
                .or_default()
                .push_back(now);
        }

        if windows.len() > self.config.max_tracked_windows && self.purge_due(now) {
            self.purge_idle(&mut windows, now);
        }

        Ok(())
    }

    /// Requests still counted against `caller` in `tier`.
    pub fn usage(&self, caller: &str, tier: RateTier) -> usize {
        let now = self.clock.now();
        let window = self.config.window(tier).window;
        let mut windows = self.windows.lock();
        match windows.get_mut(&(caller.to_string(), tier)) {
            Some(entries) => {
                Self::evict(entries, now, window);
                entries.len()
            }
            None => 0,
        }
    }

    /// Total requests rejected since creation.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn tracked_windows(&self) -> usize {
        self.windows.lock().len()
    }

    fn evict(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = entries.front() {
            if now.saturating_duration_since(*oldest) >= window {
                entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn longer(
        current: Option<(RateTier, Duration)>,
        tier: RateTier,
        retry_after: Duration,
    ) -> Option<(RateTier, Duration)> {
        match current {
            Some((_, existing)) if existing >= retry_after => current,
            _ => Some((tier, retry_after)),
        }
    }

    /// At most one sweep per shortest window; nothing can go idle faster.
    fn purge_due(&self, now: Instant) -> bool {
        let interval = [RateTier::Global, RateTier::NamespaceAdmin, RateTier::Privileged]
            .into_iter()
            .map(|tier| self.config.window(tier).window)
            .min()
            .unwrap_or_default();

        let mut last = self.last_purge.lock();
        let due = last.map_or(true, |at| now.saturating_duration_since(at) >= interval);
        if due {
            *last = Some(now);
        }
        due
    }

    fn purge_idle(&self, windows: &mut HashMap<WindowKey, VecDeque<Instant>>, now: Instant) {
        let before = windows.len();
        windows.retain(|(_, tier), entries| {
            Self::evict(entries, now, self.config.window(*tier).window);
            !entries.is_empty()
        });
        if windows.len() < before {
            debug!(
                before = before,
                after = windows.len(),
                "Purged idle rate-limit windows"
            );
        }
    }
}
