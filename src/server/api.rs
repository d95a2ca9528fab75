//! The `/api` search endpoint.
//!
//! Control flow per request: reject bad parameters, then serve
//! stale-while-revalidate: a fresh document answers directly, a stale or
//! empty-after-filtering document answers immediately too but also launches
//! a single-flight background refresh, and only a cold key pays the full
//! source fan-out synchronously. Every aggregation pass additionally
//! sponsors one detached sweep of expired cache documents.

use axum::extract::{ConnectInfo, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::warn;

use crate::aggregator::{apply_cached_filters, apply_filters};
use crate::cache::CacheDocument;
use crate::model::{
    ApiResponse, Song, UserInputError, CODE_EMPTY, CODE_OK, MSG_EMPTY, MSG_OK, NO_CACHE,
};

use super::ServerState;

#[derive(Debug, Deserialize)]
pub struct ApiParams {
    msg: Option<String>,
    num: Option<String>,
    singer: Option<String>,
}

pub async fn api_handler(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<ApiParams>,
) -> Json<ApiResponse> {
    let ip = addr.ip().to_string();

    let msg = match params.msg.filter(|m| !m.is_empty()) {
        Some(msg) => msg,
        None => return Json(user_error(&state, UserInputError::MissingQuery, ip)),
    };

    let num = match params.num.filter(|n| !n.is_empty()) {
        None => None,
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) => Some(n),
            Err(_) => return Json(user_error(&state, UserInputError::MalformedNum(raw), ip)),
        },
    };
    let singer = params.singer.filter(|s| !s.is_empty());

    let response = match state.cache.lookup(&msg) {
        Some(document) => serve_cached(&state, msg, num, singer.as_deref(), ip, document),
        None => serve_uncached(&state, msg, num, singer.as_deref(), ip).await,
    };
    Json(response)
}

/// A usable cache document exists: answer from it without waiting on any
/// source. Stale documents (past TTL, or empty after filtering for reasons
/// other than the `num` filter) additionally launch a detached refresh.
fn serve_cached(
    state: &ServerState,
    msg: String,
    num: Option<usize>,
    singer: Option<&str>,
    ip: String,
    document: CacheDocument,
) -> ApiResponse {
    let fresh = state.cache.is_document_fresh(&document);
    let filtered = apply_cached_filters(&document.songs, num, singer);

    // An empty result produced solely by the num filter leaves the cache
    // alone; the document itself is not suspect.
    let num_only_exclusion = filtered.is_empty() && num.is_some() && singer.is_none();
    let updating = !fresh || (filtered.is_empty() && !num_only_exclusion);
    if updating {
        state.refreshes.spawn_refresh(
            state.aggregator.clone(),
            state.cache.clone(),
            msg.clone(),
        );
    }

    respond(state, filtered, ip, document.timestamp, updating)
}

/// Cold key: run the full fan-out synchronously, persist the result, then
/// answer. The cache label reports the new timestamp only if the write
/// made it to disk before the response.
async fn serve_uncached(
    state: &ServerState,
    msg: String,
    num: Option<usize>,
    singer: Option<&str>,
    ip: String,
) -> ApiResponse {
    // Lazy housekeeping: every aggregation pass sponsors one detached sweep
    // of expired documents. Cache-hit reads deliberately do not sweep, the
    // stale path serves exactly the documents a sweep would delete.
    let cache = state.cache.clone();
    tokio::task::spawn_blocking(move || cache.sweep());

    let songs = state.aggregator.aggregate(&msg).await;
    let now = Utc::now();
    let cache_label = match state.cache.write(&msg, &songs, now) {
        Ok(()) => now.to_rfc3339(),
        Err(err) => {
            warn!("Cache write for {:?} failed, responding anyway: {err:#}", msg);
            NO_CACHE.to_owned()
        }
    };

    // No source produced anything: schedule a detached population attempt
    // so a transient outage does not pin an empty document until its TTL.
    let updating = songs.is_empty();
    if updating {
        state.refreshes.spawn_refresh(
            state.aggregator.clone(),
            state.cache.clone(),
            msg.clone(),
        );
    }

    let filtered = apply_filters(&songs, num, singer);
    respond(state, filtered, ip, cache_label, updating)
}

fn respond(
    state: &ServerState,
    data: Vec<Song>,
    ip: String,
    cache: String,
    cache_updating: bool,
) -> ApiResponse {
    let (code, msg) = if data.is_empty() {
        (CODE_EMPTY, MSG_EMPTY)
    } else {
        (CODE_OK, MSG_OK)
    };
    ApiResponse {
        code,
        msg: msg.to_owned(),
        data,
        tips: state.config.website_name.clone(),
        ip,
        cache,
        cache_updating,
    }
}

fn user_error(state: &ServerState, error: UserInputError, ip: String) -> ApiResponse {
    ApiResponse {
        code: error.code(),
        msg: error.to_string(),
        data: Vec::new(),
        tips: state.config.website_name.clone(),
        ip,
        cache: NO_CACHE.to_owned(),
        cache_updating: false,
    }
}
