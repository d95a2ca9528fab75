//! Third-party search API client.
//!
//! A vendor descriptor carries the API base URL, an access key and a
//! sub-source selector (the upstream catalog the vendor should search,
//! appended as a path segment). One search request lists candidates; one
//! follow-up request per candidate resolves its playable URL, cover and
//! lyric. A failed follow-up leaves that candidate with empty references
//! rather than dropping it.

use crate::model::{LyricFormat, Quality, Song};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ApiDescriptor, SongSource};

const VENDOR_OK: i64 = 200;

#[derive(Debug, Deserialize)]
struct VendorSearchResponse {
    code: i64,
    #[serde(default)]
    data: VendorSearchData,
}

#[derive(Debug, Default, Deserialize)]
struct VendorSearchData {
    #[serde(default)]
    songs: Vec<VendorSong>,
}

#[derive(Debug, Deserialize)]
struct VendorSong {
    n: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    singer: String,
    #[serde(default)]
    album: String,
}

#[derive(Debug, Deserialize)]
struct VendorDetailResponse {
    code: i64,
    #[serde(default)]
    data: VendorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct VendorDetail {
    #[serde(default)]
    music_url: String,
    #[serde(default)]
    cover: String,
    #[serde(default)]
    lyric: String,
    #[serde(default)]
    quality: String,
}

pub struct VendorAdapter {
    client: reqwest::Client,
    descriptor: ApiDescriptor,
}

impl VendorAdapter {
    pub fn new(client: reqwest::Client, descriptor: ApiDescriptor) -> Self {
        Self { client, descriptor }
    }

    fn search_url(&self) -> String {
        let base = self.descriptor.url.trim_end_matches('/');
        if self.descriptor.sources.is_empty() {
            base.to_owned()
        } else {
            format!("{}/{}", base, self.descriptor.sources)
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<VendorSong>> {
        let response = self
            .client
            .get(self.search_url())
            .query(&[("key", self.descriptor.key.as_str()), ("msg", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Vendor search failed with status: {}",
                response.status()
            ));
        }

        let body: VendorSearchResponse = response.json().await?;
        if body.code != VENDOR_OK {
            return Err(anyhow!("Vendor search returned code {}", body.code));
        }
        Ok(body.data.songs)
    }

    async fn resolve_detail(&self, query: &str, n: i64) -> Result<VendorDetail> {
        let response = self
            .client
            .get(self.search_url())
            .query(&[
                ("key", self.descriptor.key.as_str()),
                ("msg", query),
                ("n", &n.to_string()),
                ("type", "json"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Vendor detail lookup failed with status: {}",
                response.status()
            ));
        }

        let body: VendorDetailResponse = response.json().await?;
        if body.code != VENDOR_OK {
            return Err(anyhow!("Vendor detail lookup returned code {}", body.code));
        }
        Ok(body.data)
    }
}

#[async_trait]
impl SongSource for VendorAdapter {
    fn kind(&self) -> &'static str {
        "vendor"
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Song>> {
        let candidates = self.search(query).await?;

        let mut songs = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let mut song = Song {
                song: candidate.name,
                singer: candidate.singer,
                album: candidate.album,
                ..Song::default()
            };

            match self.resolve_detail(query, candidate.n).await {
                Ok(detail) => {
                    song.cover = detail.cover;
                    if !detail.lyric.is_empty() {
                        song.set_lyric_url(LyricFormat::Synced, detail.lyric);
                    }
                    if !detail.music_url.is_empty() {
                        song.set_quality_url(Quality::from_label(&detail.quality), detail.music_url);
                    }
                }
                Err(err) => {
                    debug!(
                        "Vendor detail lookup failed for {:?} (n={}): {err:#}",
                        song.song, candidate.n
                    );
                }
            }

            songs.push(song);
        }
        Ok(songs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(url: &str, sources: &str) -> VendorAdapter {
        VendorAdapter::new(
            reqwest::Client::new(),
            ApiDescriptor {
                url: url.to_owned(),
                kind: "VENDOR".to_owned(),
                key: "secret".to_owned(),
                sources: sources.to_owned(),
            },
        )
    }

    #[test]
    fn search_url_appends_sub_source() {
        assert_eq!(
            adapter("https://api.example.com/music/", "kw").search_url(),
            "https://api.example.com/music/kw"
        );
        assert_eq!(
            adapter("https://api.example.com/music", "").search_url(),
            "https://api.example.com/music"
        );
    }

    #[test]
    fn detail_quality_label_selects_tier() {
        let body = r#"{"code":200,"data":{"music_url":"http://x/a.flac","quality":"lossless"}}"#;
        let parsed: VendorDetailResponse = serde_json::from_str(body).unwrap();
        let mut song = Song::default();
        song.set_quality_url(Quality::from_label(&parsed.data.quality), parsed.data.music_url);
        assert_eq!(song.url_lossless, "http://x/a.flac");
        assert_eq!(song.url_standard, "");
    }

    #[test]
    fn search_response_tolerates_missing_fields() {
        let body = r#"{"code":200,"data":{"songs":[{"n":1,"name":"Foo"}]}}"#;
        let parsed: VendorSearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.songs.len(), 1);
        assert_eq!(parsed.data.songs[0].singer, "");
    }
}
