//! Per-host back-off registry fed by 429 `Retry-After` headers.

use dashmap::DashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock now in epoch milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Parse a `Retry-After` header value into an absolute deadline.
///
/// The delay form is a non-negative integer number of seconds; the date
/// form is an HTTP-date, which RFC 2822 parsing covers. Anything else
/// records no delay, turning the 429 into a terminal result.
pub fn parse_retry_after(value: &str, now: u64) -> Option<u64> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(now.saturating_add(seconds.saturating_mul(1000)));
    }

    chrono::DateTime::parse_from_rfc2822(value)
        .ok()
        .and_then(|date| u64::try_from(date.timestamp_millis()).ok())
}

/// Concurrent map of host -> "do not probe before" deadline.
///
/// Deadlines only move forward: a later 429 proposing an earlier
/// deadline than the stored one loses.
#[derive(Debug, Default)]
pub struct DelayCache {
    hosts: DashMap<String, u64>,
}

impl DelayCache {
    pub fn new() -> Self {
        Self {
            hosts: DashMap::new(),
        }
    }

    /// Remaining wait for a host, if its deadline is still in the
    /// future. Expired entries are evicted on read.
    pub fn remaining(&self, host: &str) -> Option<Duration> {
        let deadline = self.hosts.get(host).map(|entry| *entry)?;

        let now = now_millis();
        if deadline > now {
            return Some(Duration::from_millis(deadline - now));
        }

        self.hosts.remove(host);
        None
    }

    pub fn set(&self, host: &str, not_before: u64) {
        self.hosts
            .entry(host.to_string())
            .and_modify(|deadline| *deadline = (*deadline).max(not_before))
            .or_insert(not_before);
    }

    #[cfg(test)]
    fn deadline(&self, host: &str) -> Option<u64> {
        self.hosts.get(host).map(|entry| *entry)
    }
}
