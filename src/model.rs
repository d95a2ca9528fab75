use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single search result as it appears on the wire and in cache documents.
///
/// `num` is assigned per aggregation pass, it is not a persistent identity.
/// An empty URL field means the asset was probed and is unavailable, not
/// that it is unknown; tiers are probed independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub num: usize,
    pub song: String,
    pub singer: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub url_audition: String,
    #[serde(default)]
    pub url_standard: String,
    #[serde(default)]
    pub url_highquality: String,
    #[serde(default)]
    pub url_superquality: String,
    #[serde(default)]
    pub url_lossless: String,
    #[serde(default)]
    pub url_hires: String,
    #[serde(default)]
    pub url_lyric: String,
    #[serde(default)]
    pub url_lyric_txt: String,
}

/// Playable asset quality tiers, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Audition,
    Standard,
    HighQuality,
    SuperQuality,
    Lossless,
    HiRes,
}

impl Quality {
    pub const ALL: [Quality; 6] = [
        Quality::Audition,
        Quality::Standard,
        Quality::HighQuality,
        Quality::SuperQuality,
        Quality::Lossless,
        Quality::HiRes,
    ];

    /// File name convention for this tier inside a catalog song directory.
    pub fn asset_name(&self) -> &'static str {
        match self {
            Quality::Audition => "audition.mp3",
            Quality::Standard => "standard.mp3",
            Quality::HighQuality => "high.mp3",
            Quality::SuperQuality => "super.mp3",
            Quality::Lossless => "lossless.flac",
            Quality::HiRes => "hires.flac",
        }
    }

    /// Map a vendor quality label to a tier. Unknown labels resolve to
    /// `Standard` so a playable URL is never silently dropped.
    pub fn from_label(label: &str) -> Quality {
        match label {
            "audition" => Quality::Audition,
            "high" | "highquality" => Quality::HighQuality,
            "super" | "superquality" => Quality::SuperQuality,
            "lossless" => Quality::Lossless,
            "hires" | "hi-res" => Quality::HiRes,
            _ => Quality::Standard,
        }
    }
}

/// Lyric document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LyricFormat {
    Synced,
    Plain,
}

impl LyricFormat {
    pub const ALL: [LyricFormat; 2] = [LyricFormat::Synced, LyricFormat::Plain];

    pub fn asset_name(&self) -> &'static str {
        match self {
            LyricFormat::Synced => "lyric.lrc",
            LyricFormat::Plain => "lyric.txt",
        }
    }
}

impl Song {
    pub fn set_quality_url(&mut self, quality: Quality, url: String) {
        let field = match quality {
            Quality::Audition => &mut self.url_audition,
            Quality::Standard => &mut self.url_standard,
            Quality::HighQuality => &mut self.url_highquality,
            Quality::SuperQuality => &mut self.url_superquality,
            Quality::Lossless => &mut self.url_lossless,
            Quality::HiRes => &mut self.url_hires,
        };
        *field = url;
    }

    pub fn set_lyric_url(&mut self, format: LyricFormat, url: String) {
        let field = match format {
            LyricFormat::Synced => &mut self.url_lyric,
            LyricFormat::Plain => &mut self.url_lyric_txt,
        };
        *field = url;
    }
}

/// The standard response envelope of the `/api` endpoint. Peer instances
/// decode this same shape when aggregating from each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: i32,
    pub msg: String,
    pub data: Vec<Song>,
    #[serde(default)]
    pub tips: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub cache: String,
    #[serde(default)]
    pub cache_updating: bool,
}

pub const CODE_OK: i32 = 0;
pub const CODE_MISSING_QUERY: i32 = 1;
pub const CODE_BAD_NUM: i32 = 2;
pub const CODE_EMPTY: i32 = 3;

pub const MSG_OK: &str = "API Operation successful.";
pub const MSG_EMPTY: &str = "No resources available.";

/// Cache label for responses that were not served from a durable document.
pub const NO_CACHE: &str = "no-cache";

/// Rejected request parameters. These map to wire codes and are never
/// retried; everything else in the pipeline degrades instead of failing.
#[derive(Debug, Error, PartialEq)]
pub enum UserInputError {
    #[error("Missing required parameter: msg.")]
    MissingQuery,
    #[error("Parameter num must be an integer: {0}")]
    MalformedNum(String),
}

impl UserInputError {
    pub fn code(&self) -> i32 {
        match self {
            UserInputError::MissingQuery => CODE_MISSING_QUERY,
            UserInputError::MalformedNum(_) => CODE_BAD_NUM,
        }
    }
}
