//! Detached cache refreshes, single-flight per query key.
//!
//! A refresh outlives the request that triggered it but not the process:
//! every task is bound to the shutdown token and to a fixed deadline, so a
//! hung remote source can neither pile up tasks nor block shutdown.

use crate::aggregator::Aggregator;
use crate::cache::CacheStore;
use crate::model::Song;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const REFRESH_DEADLINE: Duration = Duration::from_secs(120);

pub struct RefreshRegistry {
    in_flight: Arc<Mutex<HashSet<String>>>,
    shutdown: CancellationToken,
}

impl RefreshRegistry {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            shutdown,
        }
    }

    /// Recompute and rewrite the cache document for `key` on a detached
    /// task. If a refresh for the same key is already in flight this joins
    /// it (does nothing); concurrent stale reads therefore trigger at most
    /// one aggregation.
    pub fn spawn_refresh(
        &self,
        aggregator: Arc<Aggregator>,
        cache: Arc<CacheStore>,
        key: String,
    ) {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(key.clone()) {
                debug!("Refresh for {:?} already in flight, joining", key);
                return;
            }
        }

        let in_flight = self.in_flight.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                // Shutdown wins over a refresh that is ready to run.
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Refresh for {:?} cancelled by shutdown", key);
                }
                outcome = refresh_pass(&aggregator, &cache, &key) => {
                    match outcome {
                        Ok(songs) => {
                            if let Err(err) = cache.write(&key, &songs, Utc::now()) {
                                warn!("Background refresh for {:?} could not write cache: {err:#}", key);
                            } else {
                                debug!("Background refresh for {:?} wrote {} song(s)", key, songs.len());
                            }
                        }
                        Err(_) => warn!("Background refresh for {:?} hit the {:?} deadline", key, REFRESH_DEADLINE),
                    }
                }
            }
            in_flight.lock().unwrap().remove(&key);
        });
    }

    /// Whether a refresh for `key` is currently in flight.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.lock().unwrap().contains(key)
    }
}

/// One background aggregation pass plus the opportunistic sweep that every
/// aggregation sponsors, bounded by the refresh deadline.
async fn refresh_pass(
    aggregator: &Aggregator,
    cache: &Arc<CacheStore>,
    key: &str,
) -> Result<Vec<Song>, Elapsed> {
    let sweep_cache = cache.clone();
    tokio::task::spawn_blocking(move || sweep_cache.sweep());

    tokio::time::timeout(REFRESH_DEADLINE, aggregator.aggregate(key)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{AssetProber, SourceRegistry};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NeverReachable;

    #[async_trait]
    impl AssetProber for NeverReachable {
        async fn exists(&self, _url: &str) -> bool {
            false
        }
    }

    fn fixtures(temp_dir: &TempDir) -> (Arc<Aggregator>, Arc<CacheStore>) {
        let catalog_dir = temp_dir.path().join("catalog");
        std::fs::create_dir_all(&catalog_dir).unwrap();
        let registry = SourceRegistry::new(
            reqwest::Client::new(),
            Arc::new(NeverReachable),
            catalog_dir,
            temp_dir.path().join("sources.json"),
            "http://127.0.0.1:2233".to_owned(),
        );
        (
            Arc::new(Aggregator::new(registry)),
            Arc::new(CacheStore::new(temp_dir.path().join("cache"), 1)),
        )
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn refresh_writes_document_and_clears_key() {
        let temp_dir = TempDir::new().unwrap();
        let (aggregator, cache) = fixtures(&temp_dir);
        let registry = RefreshRegistry::new(CancellationToken::new());

        registry.spawn_refresh(aggregator, cache.clone(), "Song".into());
        wait_until(|| !registry.is_in_flight("Song")).await;

        assert!(cache.lookup("Song").is_some());
    }

    #[tokio::test]
    async fn cancelled_token_suppresses_the_write() {
        let temp_dir = TempDir::new().unwrap();
        let (aggregator, cache) = fixtures(&temp_dir);
        let token = CancellationToken::new();
        token.cancel();
        let registry = RefreshRegistry::new(token);

        registry.spawn_refresh(aggregator, cache.clone(), "Song".into());
        wait_until(|| !registry.is_in_flight("Song")).await;

        assert!(cache.lookup("Song").is_none());
    }

    fn registry() -> RefreshRegistry {
        RefreshRegistry::new(CancellationToken::new())
    }

    #[test]
    fn second_begin_for_same_key_is_rejected() {
        let registry = registry();
        assert!(registry.in_flight.lock().unwrap().insert("Song".into()));
        assert!(!registry.in_flight.lock().unwrap().insert("Song".into()));
        assert!(registry.is_in_flight("Song"));

        registry.in_flight.lock().unwrap().remove("Song");
        assert!(!registry.is_in_flight("Song"));
        assert!(registry.in_flight.lock().unwrap().insert("Song".into()));
    }

    #[test]
    fn keys_are_tracked_independently() {
        let registry = registry();
        assert!(registry.in_flight.lock().unwrap().insert("a".into()));
        assert!(registry.in_flight.lock().unwrap().insert("b".into()));
        registry.in_flight.lock().unwrap().remove("a");
        assert!(!registry.is_in_flight("a"));
        assert!(registry.is_in_flight("b"));
    }
}
