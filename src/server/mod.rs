mod api;
mod refresh;

pub use refresh::RefreshRegistry;

use crate::aggregator::Aggregator;
use crate::cache::CacheStore;
use crate::config::AppConfig;
use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderValue},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

/// Fixed identifier sent in the `Server` header of every response.
pub const SERVER_TAG: &str = "MeowMusicServer";

#[derive(Clone)]
pub struct ServerState {
    pub start_time: Instant,
    pub config: Arc<AppConfig>,
    pub cache: Arc<CacheStore>,
    pub aggregator: Arc<Aggregator>,
    pub refreshes: Arc<RefreshRegistry>,
}

#[derive(Serialize)]
struct ServerInfo {
    name: String,
    uptime: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> Json<ServerInfo> {
    Json(ServerInfo {
        name: state.config.website_name.clone(),
        uptime: format_uptime(state.start_time.elapsed()),
    })
}

fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api", get(api::api_handler))
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static(SERVER_TAG),
        ))
        .with_state(state)
}

pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("{} listening on port {}", SERVER_TAG, port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;
    Ok(())
}
