use crate::model::ApiResponse;
use crate::model::Song;
use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::SongSource;

/// Another instance of this service, queried over its own `/api` endpoint.
pub struct PeerAggregatorAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl PeerAggregatorAdapter {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_owned();
        Self { client, base_url }
    }
}

#[async_trait]
impl SongSource for PeerAggregatorAdapter {
    fn kind(&self) -> &'static str {
        "peer"
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Song>> {
        let url = format!("{}/api", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("msg", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Peer {} request failed with status: {}",
                self.base_url,
                response.status()
            ));
        }

        let envelope: ApiResponse = response.json().await?;
        Ok(envelope.data)
    }
}
