//! Flat merged-list format.
//!
//! One object per cluster with `{service}_id` fields. Ids are integers except
//! for Anime-Planet slugs; an id that does not coerce (IMDB `tt` ids included)
//! is dropped on its own and the entry survives while it keeps one id field.

use crate::ids::value_to_id;
use crate::merge::MergedCluster;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{MediaType, Service};
use std::collections::BTreeMap;
use tracing::debug;

/// Season values that carry no season number
const SEASON_SENTINELS: &[&str] = &["a", "0", "movie", "ova", ""];

/// Services that get a field in the merged list
pub fn list_services(media_type: MediaType) -> &'static [Service] {
    match media_type {
        MediaType::Anime => &Service::ALL,
        MediaType::Manga => &[Service::AniList, Service::Mal, Service::Kitsu],
    }
}

/// Service whose id orders the list
pub fn sort_service(media_type: MediaType) -> Service {
    match media_type {
        MediaType::Anime => Service::AniDb,
        MediaType::Manga => Service::AniList,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListId {
    Numeric(u64),
    Text(String),
}

impl ListId {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ListId::Numeric(n) => Some(*n),
            ListId::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<u32>,
}

impl Season {
    pub fn is_empty(&self) -> bool {
        self.tvdb.is_none() && self.tmdb.is_none()
    }
}

/// One entry of the merged list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedEntry {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(flatten)]
    pub ids: BTreeMap<String, ListId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<Season>,
}

impl MappedEntry {
    pub fn id(&self, service: Service) -> Option<&ListId> {
        self.ids.get(service.list_field())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListStats {
    pub entries: usize,
    pub fields_dropped: usize,
    pub entries_without_ids: usize,
}

/// Build one list entry, or `None` when no id field survives coercion
pub fn build_entry(merged: &MergedCluster, stats: &mut ListStats) -> Option<MappedEntry> {
    let mut ids = BTreeMap::new();

    for &service in list_services(merged.media_type) {
        let Some(raw) = merged.ids.get(&service) else {
            continue;
        };
        let value = if service.has_numeric_list_field() {
            match raw.parse::<u64>() {
                Ok(n) => ListId::Numeric(n),
                Err(_) => {
                    debug!(
                        primary_key = %merged.primary,
                        field = service.list_field(),
                        value = %raw,
                        "Dropping non-numeric id field"
                    );
                    stats.fields_dropped += 1;
                    continue;
                }
            }
        } else {
            ListId::Text(raw.clone())
        };
        ids.insert(service.list_field().to_string(), value);
    }

    if ids.is_empty() {
        stats.entries_without_ids += 1;
        return None;
    }

    let season = match merged.media_type {
        MediaType::Anime => extract_season(merged),
        MediaType::Manga => None,
    };

    Some(MappedEntry {
        item_type: merged.item_type.clone(),
        ids,
        season,
    })
}

/// Build the sorted merged list
///
/// Entries are ordered by the media type's sort field; entries without it go
/// last and ties keep cluster order.
pub fn build_mapped_list(merged: &[MergedCluster], media_type: MediaType) -> (Vec<MappedEntry>, ListStats) {
    let mut stats = ListStats::default();
    let mut entries: Vec<MappedEntry> = merged
        .iter()
        .filter_map(|cluster| build_entry(cluster, &mut stats))
        .collect();

    let key_service = sort_service(media_type);
    entries.sort_by_key(|entry| match entry.id(key_service).and_then(ListId::as_u64) {
        Some(n) => (false, n),
        None => (true, 0),
    });

    stats.entries = entries.len();
    (entries, stats)
}

fn extract_season(merged: &MergedCluster) -> Option<Season> {
    let anidb = merged.sources.get(&Service::AniDb)?;
    let season = Season {
        tvdb: anidb.get("default_tvdb_season").and_then(season_number),
        tmdb: anidb.get("tmdb_season").and_then(season_number),
    };
    (!season.is_empty()).then_some(season)
}

fn season_number(value: &Value) -> Option<u32> {
    let raw = value_to_id(value)?;
    let raw = raw.trim();
    if SEASON_SENTINELS.contains(&raw.to_lowercase().as_str()) {
        return None;
    }
    raw.parse().ok()
}
