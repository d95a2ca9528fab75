//! Merges the output of every configured source into one numbered result.

use crate::model::Song;
use crate::sources::{SongSource, SourceRegistry};
use tracing::warn;

/// The match predicate: case-sensitive substring containment of the query
/// in title, singer or album. Any one match qualifies.
pub fn matches_query(song: &Song, query: &str) -> bool {
    song.song.contains(query) || song.singer.contains(query) || song.album.contains(query)
}

/// Secondary narrowing filters for a freshly aggregated result. `num` is an
/// equality match on the assigned sequence number, `singer` a substring
/// match; both compose.
pub fn apply_filters(songs: &[Song], num: Option<usize>, singer: Option<&str>) -> Vec<Song> {
    songs
        .iter()
        .filter(|song| num.map_or(true, |n| song.num == n))
        .filter(|song| singer.map_or(true, |s| song.singer.contains(s)))
        .cloned()
        .collect()
}

/// Narrowing filters as applied to a cached document.
///
/// Quirk kept from observed behavior: when both `num` and `singer` are
/// supplied, only `singer` is honored against the cache. Callers that need
/// composed semantics must not rely on this path.
pub fn apply_cached_filters(songs: &[Song], num: Option<usize>, singer: Option<&str>) -> Vec<Song> {
    match (num, singer) {
        (_, Some(singer)) => apply_filters(songs, None, Some(singer)),
        (num, None) => apply_filters(songs, num, None),
    }
}

pub struct Aggregator {
    registry: SourceRegistry,
}

impl Aggregator {
    pub fn new(registry: SourceRegistry) -> Self {
        Self { registry }
    }

    /// One full aggregation pass: consult every configured source in
    /// declaration order, keep the records matching the query, and number
    /// them 1..N. A failing source contributes nothing and the pass
    /// continues; for fixed source outputs the result is deterministic.
    pub async fn aggregate(&self, query: &str) -> Vec<Song> {
        merge_sources(&self.registry.build_sources(), query).await
    }
}

async fn merge_sources(sources: &[Box<dyn SongSource>], query: &str) -> Vec<Song> {
    let mut merged = Vec::new();
    for source in sources {
        let records = match source.fetch(query).await {
            Ok(records) => records,
            Err(err) => {
                warn!("Source {} failed, continuing without it: {err:#}", source.kind());
                Vec::new()
            }
        };

        for mut song in records {
            if matches_query(&song, query) {
                song.num = merged.len() + 1;
                merged.push(song);
            }
        }
    }
    merged
}
