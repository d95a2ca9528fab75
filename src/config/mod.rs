use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

/// CLI arguments, each with an environment variable fallback so the server
/// can be configured entirely from the environment in deployments.
#[derive(Parser, Debug, Clone)]
pub struct CliArgs {
    /// The port to listen on.
    #[clap(short, long, env = "PORT", default_value_t = 2233)]
    pub port: u16,

    /// Path to the local catalog directory scanned for song folders.
    #[clap(long, env = "CATALOG_DIR", default_value = "./music-uploads")]
    pub catalog_dir: PathBuf,

    /// Directory holding per-query cache documents.
    #[clap(long, env = "CACHE_DIR", default_value = "./search-cache")]
    pub cache_dir: PathBuf,

    /// Path to the source metadata document, re-read on every aggregation.
    #[clap(long, env = "SOURCES_FILE", default_value = "./sources.json")]
    pub sources_file: PathBuf,

    /// Maximum age of a cache document, in hours, before it is stale.
    #[clap(long, env = "CACHE_TTL_HOURS", default_value_t = 24)]
    pub cache_ttl_hours: u32,

    /// Public base URL used to build asset references and probe them.
    #[clap(long, env = "HOME_URL", default_value = "http://127.0.0.1:2233")]
    pub public_base_url: String,

    /// Branding string echoed in the `tips` field of every response.
    #[clap(long, env = "WEBSITE_NAME", default_value = "MeowRippleMusic")]
    pub website_name: String,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub catalog_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub sources_file: PathBuf,
    pub cache_ttl_hours: u32,
    pub public_base_url: String,
    pub website_name: String,
}

impl AppConfig {
    pub fn resolve(cli: CliArgs) -> Result<Self> {
        if cli.cache_ttl_hours == 0 {
            bail!("cache_ttl_hours must be at least 1");
        }
        if cli.public_base_url.is_empty() {
            bail!("public_base_url must not be empty");
        }

        // Trailing slash would double up when joining asset paths.
        let public_base_url = cli.public_base_url.trim_end_matches('/').to_owned();

        Ok(AppConfig {
            port: cli.port,
            catalog_dir: cli.catalog_dir,
            cache_dir: cli.cache_dir,
            sources_file: cli.sources_file,
            cache_ttl_hours: cli.cache_ttl_hours,
            public_base_url,
            website_name: cli.website_name,
        })
    }
}
