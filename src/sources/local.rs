//! Local filesystem catalog.
//!
//! Song folders live directly under the catalog root and encode their
//! identity in the directory name as `Artist-Title@Album`: the first `-`
//! separates artist from the rest, the last `@` separates title from album,
//! and segments are whitespace-trimmed. The `@Album` part is optional.
//! Folders that do not parse are skipped, never fatal.
//!
//! Asset references are only exposed after a reachability probe against the
//! publicly served file path, so a listed URL is always playable.

use crate::model::{LyricFormat, Quality, Song};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::SongSource;

/// Boolean reachability capability for asset references. File serving
/// itself is an external collaborator; the catalog only asks "would this
/// URL resolve".
#[async_trait]
pub trait AssetProber: Send + Sync {
    async fn exists(&self, url: &str) -> bool;
}

/// Probes with an HTTP HEAD request; any transport error counts as absent.
pub struct HttpAssetProber {
    client: reqwest::Client,
}

impl HttpAssetProber {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetProber for HttpAssetProber {
    async fn exists(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Split a catalog directory name into (artist, title, album).
///
/// Returns `None` when the artist or title segment is missing or empty;
/// such entries are skipped by the scan.
pub fn parse_song_dir_name(name: &str) -> Option<(String, String, String)> {
    let (artist, rest) = name.split_once('-')?;
    let (title, album) = match rest.rsplit_once('@') {
        Some((title, album)) => (title, album),
        None => (rest, ""),
    };

    let artist = artist.trim();
    let title = title.trim();
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some((artist.to_owned(), title.to_owned(), album.trim().to_owned()))
}

pub struct LocalCatalogAdapter {
    catalog_dir: PathBuf,
    public_base_url: String,
    prober: Arc<dyn AssetProber>,
}

impl LocalCatalogAdapter {
    pub fn new(
        catalog_dir: PathBuf,
        public_base_url: String,
        prober: Arc<dyn AssetProber>,
    ) -> Self {
        Self {
            catalog_dir,
            public_base_url,
            prober,
        }
    }

    /// List song directory names under the catalog root, sorted for a
    /// deterministic scan order. Only names returned by the listing itself
    /// ever reach URL construction, so no input can escape the root.
    fn list_song_dirs(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.catalog_dir)
            .with_context(|| format!("Listing catalog directory {:?}", self.catalog_dir))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn asset_url(&self, dir_name: &str, asset_name: &str) -> String {
        format!(
            "{}/file/{}/{}",
            self.public_base_url,
            urlencoding::encode(dir_name),
            asset_name
        )
    }

    async fn probe_song(&self, dir_name: &str, artist: String, title: String, album: String) -> Song {
        let mut song = Song {
            song: title,
            singer: artist,
            album,
            ..Song::default()
        };

        let cover_url = self.asset_url(dir_name, "cover.jpg");
        if self.prober.exists(&cover_url).await {
            song.cover = cover_url;
        }

        for quality in Quality::ALL {
            let url = self.asset_url(dir_name, quality.asset_name());
            if self.prober.exists(&url).await {
                song.set_quality_url(quality, url);
            }
        }

        for format in LyricFormat::ALL {
            let url = self.asset_url(dir_name, format.asset_name());
            if self.prober.exists(&url).await {
                song.set_lyric_url(format, url);
            }
        }

        song
    }
}

#[async_trait]
impl SongSource for LocalCatalogAdapter {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn fetch(&self, _query: &str) -> Result<Vec<Song>> {
        let mut songs = Vec::new();
        for dir_name in self.list_song_dirs()? {
            let Some((artist, title, album)) = parse_song_dir_name(&dir_name) else {
                debug!("Skipping catalog entry with unparsable name {:?}", dir_name);
                continue;
            };
            songs.push(self.probe_song(&dir_name, artist, title, album).await);
        }
        Ok(songs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct FixedProber {
        reachable: HashSet<String>,
    }

    #[async_trait]
    impl AssetProber for FixedProber {
        async fn exists(&self, url: &str) -> bool {
            self.reachable.contains(url)
        }
    }

    #[test]
    fn parses_full_dir_name() {
        assert_eq!(
            parse_song_dir_name("Anna - Song One@AlbumX"),
            Some(("Anna".into(), "Song One".into(), "AlbumX".into()))
        );
    }

    #[test]
    fn parses_name_without_album() {
        assert_eq!(
            parse_song_dir_name("Anna-Song One"),
            Some(("Anna".into(), "Song One".into(), "".into()))
        );
    }

    #[test]
    fn title_may_contain_dashes_and_album_wins_last_at() {
        assert_eq!(
            parse_song_dir_name("AC-DC Cover Band-T.N.T@Live@Wembley"),
            Some((
                "AC".into(),
                "DC Cover Band-T.N.T@Live".into(),
                "Wembley".into()
            ))
        );
    }

    #[test]
    fn rejects_names_missing_segments() {
        assert_eq!(parse_song_dir_name("NoSeparatorHere"), None);
        assert_eq!(parse_song_dir_name("-Title@Album"), None);
        assert_eq!(parse_song_dir_name("Artist- @Album"), None);
    }

    #[tokio::test]
    async fn exposes_only_reachable_assets() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("Anna - Song One@AlbumX")).unwrap();
        std::fs::create_dir(temp_dir.path().join("not a song dir")).unwrap();

        let base = "http://127.0.0.1:2233";
        let dir_encoded = urlencoding::encode("Anna - Song One@AlbumX").into_owned();
        let reachable: HashSet<String> = [format!("{base}/file/{dir_encoded}/standard.mp3")]
            .into_iter()
            .collect();

        let adapter = LocalCatalogAdapter::new(
            temp_dir.path().to_path_buf(),
            base.to_owned(),
            Arc::new(FixedProber { reachable }),
        );

        let songs = adapter.fetch("whatever").await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].singer, "Anna");
        assert_eq!(songs[0].song, "Song One");
        assert_eq!(songs[0].album, "AlbumX");
        assert!(!songs[0].url_standard.is_empty());
        assert_eq!(songs[0].url_lossless, "");
        assert_eq!(songs[0].cover, "");
    }

    #[tokio::test]
    async fn missing_catalog_dir_is_an_error() {
        let adapter = LocalCatalogAdapter::new(
            PathBuf::from("/nonexistent/catalog"),
            "http://127.0.0.1:2233".to_owned(),
            Arc::new(FixedProber {
                reachable: HashSet::new(),
            }),
        );
        assert!(adapter.fetch("x").await.is_err());
    }
}
