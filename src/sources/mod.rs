//! Song sources and the registry that instantiates them.
//!
//! Each data source is normalized behind the [`SongSource`] capability
//! trait. Remote sources are declared in an external metadata document that
//! is re-read on every aggregation pass, so edits take effect without a
//! restart.

mod embedded;
mod local;
mod peer;
mod vendor;

pub use embedded::EmbeddedMetadataAdapter;
pub use local::{parse_song_dir_name, AssetProber, HttpAssetProber, LocalCatalogAdapter};
pub use peer::PeerAggregatorAdapter;
pub use vendor::VendorAdapter;

use crate::model::Song;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// One data source of song records.
///
/// A call returns the source's best-effort records for the query; the
/// aggregator applies the match predicate and numbering. Implementations
/// return `Err` on any network/decode failure and the caller degrades that
/// to an empty contribution.
#[async_trait]
pub trait SongSource: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn fetch(&self, query: &str) -> Result<Vec<Song>>;
}

/// A remote API declared in the metadata document.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiDescriptor {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub sources: String,
}

/// The metadata document: remote API descriptors plus pre-resolved songs
/// served by the embedded adapter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesDocument {
    #[serde(default)]
    pub apis: Vec<ApiDescriptor>,
    #[serde(default)]
    pub songs: Vec<Song>,
}

impl SourcesDocument {
    pub fn load(path: &std::path::Path) -> Result<SourcesDocument> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Reading sources document {:?}", path))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Parsing sources document {:?}", path))
    }
}

/// Builds the adapter set for one aggregation pass.
///
/// Declaration order, which fixes result numbering, is: local catalog,
/// embedded songs, then remote descriptors in document order.
pub struct SourceRegistry {
    http: reqwest::Client,
    prober: Arc<dyn AssetProber>,
    catalog_dir: PathBuf,
    sources_file: PathBuf,
    public_base_url: String,
}

impl SourceRegistry {
    pub fn new(
        http: reqwest::Client,
        prober: Arc<dyn AssetProber>,
        catalog_dir: PathBuf,
        sources_file: PathBuf,
        public_base_url: String,
    ) -> Self {
        Self {
            http,
            prober,
            catalog_dir,
            sources_file,
            public_base_url,
        }
    }

    /// Read the metadata document and instantiate every configured source.
    /// A missing or corrupt document still yields the local catalog source.
    pub fn build_sources(&self) -> Vec<Box<dyn SongSource>> {
        let document = match SourcesDocument::load(&self.sources_file) {
            Ok(document) => document,
            Err(err) => {
                warn!("Sources document unavailable, using local catalog only: {err:#}");
                SourcesDocument::default()
            }
        };

        let mut sources: Vec<Box<dyn SongSource>> = vec![Box::new(LocalCatalogAdapter::new(
            self.catalog_dir.clone(),
            self.public_base_url.clone(),
            self.prober.clone(),
        ))];

        if !document.songs.is_empty() {
            sources.push(Box::new(EmbeddedMetadataAdapter::new(document.songs)));
        }

        for descriptor in document.apis {
            match self.build_remote(&descriptor) {
                Some(source) => sources.push(source),
                None => warn!(
                    "Skipping source with unsupported type {:?} ({})",
                    descriptor.kind, descriptor.url
                ),
            }
        }

        sources
    }

    /// Remote adapter selection, keyed on the descriptor's declared kind.
    fn build_remote(&self, descriptor: &ApiDescriptor) -> Option<Box<dyn SongSource>> {
        match descriptor.kind.as_str() {
            "PEER" => Some(Box::new(PeerAggregatorAdapter::new(
                self.http.clone(),
                descriptor.url.clone(),
            ))),
            "VENDOR" => Some(Box::new(VendorAdapter::new(
                self.http.clone(),
                descriptor.clone(),
            ))),
            _ => None,
        }
    }
}
