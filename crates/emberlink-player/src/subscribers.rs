//! Time-boxed subscriber registry.
//!
//! Each entry is live until its own expiry instant. Subscribing again
//! with the same key pushes the expiry out by another TTL, which is how
//! client heartbeats keep a connection subscribed. Nothing sweeps the
//! table in the background: [`notify`](SubscriberRegistry::notify) drops
//! expired entries as it walks past them.
//!
//! A delivery that has not finished within the delivery timeout counts as
//! failed, so one stalled connection cannot hold up the others.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

struct Entry<S> {
    subscriber: S,
    expires_at: Instant,
}

impl<S> Entry<S> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// A table of subscribers, each live for `ttl` after its last subscribe.
pub struct SubscriberRegistry<K, S> {
    ttl: Duration,
    delivery_timeout: Duration,
    entries: Mutex<HashMap<K, Entry<S>>>,
}

impl<K, S> SubscriberRegistry<K, S>
where
    K: Eq + Hash + Clone + Display,
    S: Clone,
{
    /// A registry whose deliveries may take up to one TTL each.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            delivery_timeout: ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Caps how long [`notify`](Self::notify) waits on any one delivery.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    /// Inserts or renews `key`, live until now + TTL.
    ///
    /// Returns `true` if the key was not live before this call.
    pub async fn subscribe(&self, key: K, subscriber: S) -> bool {
        let now = Instant::now();
        let entry = Entry {
            subscriber,
            expires_at: now + self.ttl,
        };
        let previous = self.entries.lock().await.insert(key, entry);
        !previous.is_some_and(|e| e.is_live(now))
    }

    /// Removes `key`. Returns `true` if it was present.
    pub async fn unsubscribe(&self, key: &K) -> bool {
        self.entries.lock().await.remove(key).is_some()
    }

    /// Returns `true` if `key` is present and live.
    pub async fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .get(key)
            .is_some_and(|e| e.is_live(now))
    }

    /// When `key` stops being live, if it is present.
    pub async fn expires_at(&self, key: &K) -> Option<Instant> {
        self.entries.lock().await.get(key).map(|e| e.expires_at)
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Calls `deliver` once for every entry live at call time.
    ///
    /// Expired entries are removed on the way. A failed or timed-out
    /// delivery is logged and skipped; the entry stays until it expires.
    /// Deliveries run after the table lock is released, one at a time.
    ///
    /// Returns the number of successful deliveries.
    pub async fn notify<F, Fut, E>(&self, mut deliver: F) -> usize
    where
        F: FnMut(S) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let live: Vec<(K, S)> = {
            let now = Instant::now();
            let mut entries = self.entries.lock().await;
            entries.retain(|key, entry| {
                let live = entry.is_live(now);
                if !live {
                    tracing::debug!(subscriber = %key, "subscription expired");
                }
                live
            });
            entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.subscriber.clone()))
                .collect()
        };

        let mut delivered = 0;
        for (key, subscriber) in live {
            match tokio::time::timeout(self.delivery_timeout, deliver(subscriber)).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(subscriber = %key, error = %e, "push failed, skipping");
                }
                Err(_) => {
                    tracing::warn!(
                        subscriber = %key,
                        timeout = ?self.delivery_timeout,
                        "push timed out, skipping"
                    );
                }
            }
        }
        delivered
    }
}
