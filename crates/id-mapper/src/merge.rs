//! Canonical key selection and cluster merging.
//!
//! Every cluster gets a primary key from a fixed service priority, one id per
//! service (the smallest on conflict), a resolved type and a first-non-empty
//! merge of its members' metadata.

use crate::cluster::Cluster;
use crate::ingest::RecordSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{IdNode, MediaType, Metadata, Service, SourceRecord};
use std::collections::BTreeMap;
use tracing::debug;

/// Services eligible for the primary key, highest priority first
pub fn primary_priority(media_type: MediaType) -> &'static [Service] {
    match media_type {
        MediaType::Anime => &[
            Service::AniDb,
            Service::AniList,
            Service::Mal,
            Service::Kitsu,
            Service::Simkl,
        ],
        MediaType::Manga => &[Service::AniList, Service::Mal, Service::Kitsu],
    }
}

/// Services consulted for the item type, highest priority first
pub fn type_priority(_media_type: MediaType) -> &'static [Service] {
    &[Service::AniList, Service::Mal, Service::Kitsu]
}

/// Services always present in a cross-reference entry, empty when unknown
///
/// The same set for both media types so every table has one shape.
pub fn baseline_services(_media_type: MediaType) -> &'static [Service] {
    &[
        Service::AniDb,
        Service::AniList,
        Service::Mal,
        Service::Kitsu,
        Service::Simkl,
        Service::Tmdb,
        Service::Imdb,
    ]
}

/// One entry of the cross-reference table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReferenceRecord {
    pub primary_key: String,
    pub ids: BTreeMap<Service, String>,
}

/// Per-title record with merged metadata and every source payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedMetadataRecord {
    pub primary_key: String,
    pub media_type: MediaType,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub title: Option<String>,
    pub ids: BTreeMap<Service, String>,
    pub metadata: Metadata,
    pub sources: BTreeMap<Service, Metadata>,
    pub last_updated: DateTime<Utc>,
}

/// Result of merging one cluster
#[derive(Debug, Clone)]
pub struct MergedCluster {
    pub media_type: MediaType,
    pub primary: IdNode,
    /// Every member id, including conflict losers
    pub members: Vec<IdNode>,
    /// Winning id per service
    pub ids: BTreeMap<Service, String>,
    pub item_type: Option<String>,
    pub title: Option<String>,
    pub metadata: Metadata,
    pub sources: BTreeMap<Service, Metadata>,
    /// Ids discarded by same-service conflict resolution
    pub conflicts: usize,
}

impl MergedCluster {
    pub fn primary_key(&self) -> String {
        self.primary.to_string()
    }

    pub fn cross_reference(&self) -> CrossReferenceRecord {
        let mut ids: BTreeMap<Service, String> = baseline_services(self.media_type)
            .iter()
            .map(|&service| (service, String::new()))
            .collect();
        for (service, id) in &self.ids {
            ids.insert(*service, id.clone());
        }
        CrossReferenceRecord {
            primary_key: self.primary_key(),
            ids,
        }
    }

    pub fn metadata_record(&self, last_updated: DateTime<Utc>) -> MergedMetadataRecord {
        MergedMetadataRecord {
            primary_key: self.primary_key(),
            media_type: self.media_type,
            item_type: self.item_type.clone(),
            title: self.title.clone(),
            ids: self.ids.clone(),
            metadata: self.metadata.clone(),
            sources: self.sources.clone(),
            last_updated,
        }
    }
}

/// Merge a cluster, or `None` when no member can serve as primary key
pub fn merge_cluster(
    cluster: &Cluster,
    records: &RecordSet,
    media_type: MediaType,
) -> Option<MergedCluster> {
    let primary = primary_priority(media_type)
        .iter()
        .find_map(|&service| cluster.first_of(service))?
        .clone();

    let mut ids = BTreeMap::new();
    for node in cluster.members() {
        ids.entry(node.service).or_insert_with(|| node.id.clone());
    }

    let conflicts = cluster.conflict_count();
    if conflicts > 0 {
        for service in cluster.services() {
            let losers: Vec<&str> = cluster
                .all_of(service)
                .skip(1)
                .map(|node| node.id.as_str())
                .collect();
            if losers.is_empty() {
                continue;
            }
            if let Some(kept) = ids.get(&service) {
                debug!(
                    primary_key = %primary,
                    service = %service,
                    kept = %kept,
                    discarded = ?losers,
                    "Resolved same-service id conflict"
                );
            }
        }
    }

    // Per-service data comes from the winning id only; conflict losers name
    // other titles.
    let winner_records: Vec<&SourceRecord> = cluster
        .services()
        .into_iter()
        .filter_map(|service| cluster.first_of(service))
        .filter_map(|node| records.get(node))
        .collect();

    let item_type = type_priority(media_type).iter().find_map(|&service| {
        cluster
            .first_of(service)
            .and_then(|node| records.get(node))
            .and_then(|record| record.item_type.clone())
    });

    let title = winner_records
        .iter()
        .find_map(|record| record.title.clone());

    let mut metadata = Metadata::new();
    let mut sources = BTreeMap::new();
    for record in &winner_records {
        merge_first_non_empty(&mut metadata, &record.metadata);
        sources.insert(record.service, without_nulls(&record.metadata));
    }

    Some(MergedCluster {
        media_type,
        primary,
        members: cluster.members().to_vec(),
        ids,
        item_type,
        title,
        metadata,
        sources,
        conflicts,
    })
}

/// Copy every field of `incoming` whose value is non-empty and not yet set
pub fn merge_first_non_empty(target: &mut Metadata, incoming: &Metadata) {
    for (key, value) in incoming {
        if is_empty_value(value) {
            continue;
        }
        let occupied = target.get(key).is_some_and(|existing| !is_empty_value(existing));
        if !occupied {
            target.insert(key.clone(), value.clone());
        }
    }
}

pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn without_nulls(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
