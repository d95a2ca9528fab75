//! Durable per-query cache documents.
//!
//! One JSON document per raw query key, named by percent-encoding the key,
//! holding the aggregated songs and an ISO-8601 creation timestamp.
//! Documents are replaced whole on refresh, never merged. Every I/O or
//! parse failure is logged and degrades to cache-miss semantics; nothing
//! here can fail a request.

use crate::model::Song;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheDocument {
    pub songs: Vec<Song>,
    pub timestamp: String,
}

impl CacheDocument {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

pub struct CacheStore {
    dir: PathBuf,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(dir: PathBuf, ttl_hours: u32) -> Self {
        Self {
            dir,
            ttl: Duration::hours(ttl_hours as i64),
        }
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }

    /// Read the document for `key`, if present and parsable. Freshness is
    /// not enforced here.
    pub fn lookup(&self, key: &str) -> Option<CacheDocument> {
        let path = self.document_path(key);
        if !path.exists() {
            return None;
        }
        match read_document(&path) {
            Ok(document) => Some(document),
            Err(err) => {
                warn!("Treating cache document {:?} as a miss: {err:#}", path);
                None
            }
        }
    }

    /// Whether a document for `key` exists and is younger than the TTL.
    pub fn is_fresh(&self, key: &str) -> bool {
        self.lookup(key)
            .map(|document| self.is_document_fresh(&document))
            .unwrap_or(false)
    }

    pub fn is_document_fresh(&self, document: &CacheDocument) -> bool {
        match document.created_at() {
            Some(created_at) => Utc::now() - created_at < self.ttl,
            None => false,
        }
    }

    /// Create or replace the document for `key`. Creates the cache
    /// directory on first use; writes to a temp file and renames so readers
    /// never observe a half-written document.
    pub fn write(&self, key: &str, songs: &[Song], timestamp: DateTime<Utc>) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Creating cache directory {:?}", self.dir))?;

        let document = CacheDocument {
            songs: songs.to_vec(),
            timestamp: timestamp.to_rfc3339(),
        };
        let path = self.document_path(key);
        let tmp_path = path.with_extension("json.tmp");

        let raw = serde_json::to_vec(&document)?;
        std::fs::write(&tmp_path, raw)
            .with_context(|| format!("Writing cache document {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("Publishing cache document {:?}", path))?;
        Ok(())
    }

    /// Delete every expired document. Documents that cannot be parsed are
    /// deleted too, they can never be served. Runs opportunistically on a
    /// detached task, so all failures are log-only.
    pub fn sweep(&self) {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Cache sweep skipped, {:?} not listable: {err}", self.dir);
                return;
            }
        };

        let mut removed = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let expired = match read_document(&path).ok().and_then(|d| d.created_at()) {
                Some(created_at) => Utc::now() - created_at >= self.ttl,
                None => true,
            };
            if !expired {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => warn!("Could not remove expired cache document {:?}: {err}", path),
            }
        }

        if removed > 0 {
            debug!("Cache sweep removed {} expired document(s)", removed);
        }
    }
}

fn read_document(path: &Path) -> Result<CacheDocument> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Reading cache document {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Parsing cache document {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(ttl_hours: u32) -> (CacheStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        (
            CacheStore::new(temp_dir.path().join("cache"), ttl_hours),
            temp_dir,
        )
    }

    fn some_songs() -> Vec<Song> {
        vec![Song {
            num: 1,
            song: "Song One".into(),
            singer: "Anna".into(),
            ..Song::default()
        }]
    }

    #[test]
    fn lookup_returns_what_was_written() {
        let (store, _temp_dir) = store(1);
        store.write("Song", &some_songs(), Utc::now()).unwrap();

        let document = store.lookup("Song").unwrap();
        assert_eq!(document.songs, some_songs());
        assert!(store.is_fresh("Song"));
    }

    #[test]
    fn missing_key_is_a_miss() {
        let (store, _temp_dir) = store(1);
        assert!(store.lookup("nothing").is_none());
        assert!(!store.is_fresh("nothing"));
    }

    #[test]
    fn keys_with_path_characters_stay_inside_the_cache_dir() {
        let (store, _temp_dir) = store(1);
        let key = "../../etc/passwd?=&#";
        store.write(key, &some_songs(), Utc::now()).unwrap();
        assert!(store.lookup(key).is_some());
        assert!(store.document_path(key).parent().unwrap().ends_with("cache"));
    }

    #[test]
    fn document_older_than_ttl_is_stale_for_any_ttl() {
        for ttl_hours in [1u32, 2, 24] {
            let (store, _temp_dir) = store(ttl_hours);
            let old = Utc::now() - Duration::hours(ttl_hours as i64) - Duration::seconds(1);
            store.write("Song", &some_songs(), old).unwrap();
            assert!(!store.is_fresh("Song"));

            let just_inside = Utc::now() - Duration::hours(ttl_hours as i64) + Duration::minutes(1);
            store.write("Song", &some_songs(), just_inside).unwrap();
            assert!(store.is_fresh("Song"));
        }
    }

    #[test]
    fn corrupt_document_is_a_miss() {
        let (store, _temp_dir) = store(1);
        store.write("Song", &some_songs(), Utc::now()).unwrap();
        std::fs::write(store.document_path("Song"), "not json").unwrap();
        assert!(store.lookup("Song").is_none());
    }

    #[test]
    fn sweep_removes_expired_and_corrupt_documents_only() {
        let (store, _temp_dir) = store(1);
        store
            .write("old", &some_songs(), Utc::now() - Duration::hours(2))
            .unwrap();
        store.write("fresh", &some_songs(), Utc::now()).unwrap();
        store.write("corrupt", &some_songs(), Utc::now()).unwrap();
        std::fs::write(store.document_path("corrupt"), "{broken").unwrap();

        store.sweep();

        assert!(store.lookup("old").is_none());
        assert!(store.lookup("fresh").is_some());
        assert!(!store.document_path("corrupt").exists());
    }

    #[test]
    fn sweep_on_missing_directory_is_a_no_op() {
        let (store, _temp_dir) = store(1);
        store.sweep();
    }
}
