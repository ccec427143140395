//! Fixed-window rate limiting.
//!
//! Counters live behind the `CounterStore` trait: one atomic
//! increment-and-expire primitive, keyed `scope:identity`. The window is a
//! fixed interval bounded by the key's TTL, so bursts of up to twice the
//! limit across a window boundary are accepted behavior.

use async_trait::async_trait;
use ipnet::IpNet;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Atomic counter storage. `incr` bumps the counter for `key` and returns
/// the post-increment value; a count of 1 starts a fresh window of
/// `window`. Implementations must make increment-and-expire atomic with
/// respect to concurrent callers on the same key.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn incr(&self, key: &str, window: Duration) -> u64;
}

#[derive(Debug)]
struct CounterEntry {
    count: u64,
    window_ends_at: Instant,
}

/// In-process counter store: a map of live windows behind a single lock,
/// which is what makes increment-and-expire atomic here. Entries reset
/// lazily on the first hit after their window ends; `sweep` reclaims keys
/// that stopped getting traffic.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, CounterEntry>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        counters.retain(|_, entry| entry.window_ends_at > now);
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str, window: Duration) -> u64 {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        match counters.get_mut(key) {
            Some(entry) if entry.window_ends_at > now => {
                entry.count += 1;
                entry.count
            }
            _ => {
                counters.insert(
                    key.to_string(),
                    CounterEntry {
                        count: 1,
                        window_ends_at: now + window,
                    },
                );
                1
            }
        }
    }
}

/// Fixed-window limiter over a shared counter store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Returns true iff the post-increment count for `key` is within
    /// `limit`. Every call counts against the window, including rejected
    /// ones.
    pub async fn allow(&self, key: &str, limit: u64, window_seconds: u64) -> bool {
        let count = self
            .store
            .incr(key, Duration::from_secs(window_seconds))
            .await;
        count <= limit
    }
}

/// Resolves the identity a rate-limit counter is keyed by.
///
/// The direct peer address is authoritative unless it belongs to a trusted
/// proxy network, in which case the leftmost X-Forwarded-For hop is used
/// instead. Restricting the substitution to trusted proxies is what stops
/// first-hop spoofing.
pub struct IdentityResolver {
    trusted_networks: Vec<IpNet>,
}

impl IdentityResolver {
    pub fn new(trusted_networks: Vec<IpNet>) -> Self {
        Self { trusted_networks }
    }

    pub fn network_identity(&self, peer: Option<IpAddr>, forwarded_for: Option<&str>) -> String {
        if let (Some(peer), Some(forwarded)) = (peer, forwarded_for) {
            if self.is_trusted_proxy(peer) {
                if let Some(first_hop) = forwarded.split(',').next() {
                    let first_hop = first_hop.trim();
                    if !first_hop.is_empty() {
                        return first_hop.to_string();
                    }
                }
            }
        }
        peer.map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// User-aware identity: an authenticated user id wins over the network
    /// address.
    pub fn user_identity(
        &self,
        user_id: Option<i64>,
        peer: Option<IpAddr>,
        forwarded_for: Option<&str>,
    ) -> String {
        match user_id {
            Some(id) => format!("user:{}", id),
            None => self.network_identity(peer, forwarded_for),
        }
    }

    fn is_trusted_proxy(&self, peer: IpAddr) -> bool {
        self.trusted_networks
            .iter()
            .any(|network| network.contains(&peer))
    }
}
