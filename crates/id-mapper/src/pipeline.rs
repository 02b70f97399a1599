//! Mapping pipeline orchestration.
//!
//! Ingestion, graph building, clustering, merging and materialization for a
//! single media type. [`map_records`] is the pure core; [`Mapper`] wraps it
//! with file input and output.

use crate::cluster::resolve_clusters;
use crate::graph::IdGraph;
use crate::ingest::{ingest, IngestStats, RecordSet};
use crate::list::{build_mapped_list, ListStats, MappedEntry};
use crate::merge::{merge_cluster, MergedCluster, MergedMetadataRecord};
use crate::output::OutputWriter;
use crate::xref::CrossReferenceTable;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{DataPaths, MapperConfig, MediaType, Service};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Counters for graph, cluster and list stages
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingStats {
    pub nodes: usize,
    pub edges: usize,
    pub clusters: usize,
    pub singleton_clusters: usize,
    pub dropped_clusters: usize,
    pub conflicts_resolved: usize,
    pub list: ListStats,
}

/// Everything one media type's run produces
#[derive(Debug, Clone)]
pub struct MappingOutput {
    pub media_type: MediaType,
    pub merged: Vec<MergedCluster>,
    pub cross_reference: CrossReferenceTable,
    pub list: Vec<MappedEntry>,
    pub stats: MappingStats,
}

impl MappingOutput {
    pub fn merged_metadata(&self, last_updated: DateTime<Utc>) -> Vec<MergedMetadataRecord> {
        self.merged
            .iter()
            .map(|cluster| cluster.metadata_record(last_updated))
            .collect()
    }
}

/// Run summary written next to the outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSummary {
    pub timestamp: DateTime<Utc>,
    pub media_type: MediaType,
    pub dry_run: bool,
    pub records_by_service: BTreeMap<Service, usize>,
    pub ingest: IngestStats,
    pub mapping: MappingStats,
}

/// Cluster and merge an ingested record set
pub fn map_records(records: &RecordSet) -> MappingOutput {
    let media_type = records.media_type();
    let mut stats = MappingStats::default();

    let graph = IdGraph::from_records(records.records());
    stats.nodes = graph.node_count();
    stats.edges = graph.edge_count();
    info!(
        media_type = %media_type,
        nodes = stats.nodes,
        edges = stats.edges,
        "Built cross-reference graph"
    );

    let clusters = resolve_clusters(&graph);
    stats.clusters = clusters.len();
    stats.singleton_clusters = clusters.iter().filter(|c| c.is_singleton()).count();

    let mut merged = Vec::with_capacity(clusters.len());
    for cluster in &clusters {
        match merge_cluster(cluster, records, media_type) {
            Some(result) => {
                stats.conflicts_resolved += result.conflicts;
                merged.push(result);
            }
            None => {
                let members: Vec<String> =
                    cluster.members().iter().map(ToString::to_string).collect();
                debug!(
                    media_type = %media_type,
                    members = ?members,
                    "Dropping cluster without an eligible primary key"
                );
                stats.dropped_clusters += 1;
            }
        }
    }

    if stats.dropped_clusters > 0 {
        warn!(
            media_type = %media_type,
            dropped = stats.dropped_clusters,
            "Clusters dropped for lack of an eligible primary key"
        );
    }

    let cross_reference = CrossReferenceTable::from_clusters(&merged);
    let (list, list_stats) = build_mapped_list(&merged, media_type);
    stats.list = list_stats;

    info!(
        media_type = %media_type,
        clusters = stats.clusters,
        singletons = stats.singleton_clusters,
        dropped = stats.dropped_clusters,
        conflicts = stats.conflicts_resolved,
        entries = stats.list.entries,
        fields_dropped = stats.list.fields_dropped,
        "Merged clusters"
    );

    MappingOutput {
        media_type,
        merged,
        cross_reference,
        list,
        stats,
    }
}

/// File-backed mapping runner
#[derive(Debug, Clone)]
pub struct Mapper {
    paths: DataPaths,
    settings: MapperConfig,
    writer: OutputWriter,
}

impl Mapper {
    pub fn new(paths: DataPaths, settings: MapperConfig, dry_run: bool) -> Self {
        let writer = OutputWriter::new(settings.pretty_output, dry_run);
        Self {
            paths,
            settings,
            writer,
        }
    }

    /// Map one media type and write its outputs
    pub fn run(&self, media_type: MediaType) -> Result<MappingSummary> {
        let timestamp = Utc::now();
        info!(media_type = %media_type, "Starting mapping run");

        info!("Phase 1: Loading source records");
        let (records, ingest_stats) = ingest(&self.paths, media_type, self.settings.input_layout);
        if records.is_empty() {
            warn!(media_type = %media_type, "No source records found");
        }

        info!("Phase 2: Clustering and merging");
        let output = map_records(&records);

        info!("Phase 3: Writing outputs");
        self.write_outputs(&output, timestamp)?;

        let summary = MappingSummary {
            timestamp,
            media_type,
            dry_run: self.writer.is_dry_run(),
            records_by_service: records.count_by_service(),
            ingest: ingest_stats,
            mapping: output.stats,
        };

        if self.settings.write_summary {
            let path = self.paths.mapping_summary(media_type);
            self.writer
                .write(&path, &summary)
                .context("Failed to write mapping summary")?;
        }

        info!(media_type = %media_type, "Mapping run complete");
        Ok(summary)
    }

    fn write_outputs(&self, output: &MappingOutput, timestamp: DateTime<Utc>) -> Result<()> {
        let media_type = output.media_type;

        let path = self.paths.cross_reference(media_type);
        self.writer
            .write(&path, &output.cross_reference)
            .context("Failed to write cross-reference table")?;
        info!(path = %path.display(), entries = output.cross_reference.len(), "Wrote cross-reference table");

        let path = self.paths.mapped_list(media_type);
        self.writer
            .write(&path, &output.list)
            .context("Failed to write merged list")?;
        info!(path = %path.display(), entries = output.list.len(), "Wrote merged list");

        if self.settings.write_merged_metadata {
            let path = self.paths.merged_metadata(media_type);
            let records = output.merged_metadata(timestamp);
            self.writer
                .write(&path, &records)
                .context("Failed to write merged metadata")?;
            info!(path = %path.display(), entries = records.len(), "Wrote merged metadata");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::ListId;
    use crate::output::read_json;
    use serde_json::{json, Value};
    use shared::IdNode;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_json(path: &Path, value: &Value) -> Result<()> {
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(path, serde_json::to_string(value)?)?;
        Ok(())
    }

    fn anime_fixture(paths: &DataPaths) -> Result<()> {
        write_json(
            &paths.service_file(MediaType::Anime, Service::AniList),
            &json!([
                {"id": "1", "type": "TV", "title": "Cowboy Bebop",
                 "external_ids": {"mal": "10"}, "metadata": {"episodes": 26}},
                {"id": "2", "type": "MOVIE", "external_ids": {"mal": "abc"}}
            ]),
        )?;
        write_json(
            &paths.service_file(MediaType::Anime, Service::Mal),
            &json!([
                {"id": "10", "type": "TV", "external_ids": {"kitsu": "100"}},
                {"id": "77"}
            ]),
        )?;
        write_json(
            &paths.service_file(MediaType::Anime, Service::Tmdb),
            &json!([{"id": "500", "external_ids": {"imdb": "tt0000001"}}]),
        )?;
        Ok(())
    }

    fn settings() -> MapperConfig {
        MapperConfig {
            pretty_output: false,
            ..MapperConfig::default()
        }
    }

    #[test]
    fn test_end_to_end_anime() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let paths = DataPaths::new(temp_dir.path());
        anime_fixture(&paths)?;

        let summary = Mapper::new(paths.clone(), settings(), false).run(MediaType::Anime)?;
        assert_eq!(summary.mapping.clusters, 4);
        assert_eq!(summary.mapping.dropped_clusters, 1);
        assert_eq!(summary.mapping.list.fields_dropped, 1);
        assert_eq!(summary.records_by_service[&Service::AniList], 2);

        let xref: Value = read_json(&paths.cross_reference(MediaType::Anime))?;
        assert_eq!(
            xref["anilist:1"],
            json!({"anidb": "", "anilist": "1", "mal": "10", "kitsu": "100",
                   "simkl": "", "tmdb": "", "imdb": ""})
        );
        assert_eq!(xref["anilist:2"]["mal"], json!("abc"));
        assert_eq!(xref["mal:77"]["anilist"], json!(""));
        assert!(xref.get("tmdb:500").is_none());

        let list: Vec<Value> = read_json(&paths.mapped_list(MediaType::Anime))?;
        assert_eq!(list.len(), 3);
        let movie = list.iter().find(|e| e["anilist_id"] == json!(2)).unwrap();
        assert_eq!(movie["type"], json!("MOVIE"));
        assert!(movie.get("mal_id").is_none());

        let merged: Vec<Value> = read_json(&paths.merged_metadata(MediaType::Anime))?;
        let bebop = merged.iter().find(|r| r["primary_key"] == json!("anilist:1")).unwrap();
        assert_eq!(bebop["title"], json!("Cowboy Bebop"));
        assert_eq!(bebop["metadata"]["episodes"], json!(26));

        let written: MappingSummary = read_json(&paths.mapping_summary(MediaType::Anime))?;
        assert_eq!(written.mapping, summary.mapping);

        Ok(())
    }

    #[test]
    fn test_run_is_idempotent() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let paths = DataPaths::new(temp_dir.path());
        anime_fixture(&paths)?;
        let mapper = Mapper::new(paths.clone(), settings(), false);

        mapper.run(MediaType::Anime)?;
        let first_xref = std::fs::read(paths.cross_reference(MediaType::Anime))?;
        let first_list = std::fs::read(paths.mapped_list(MediaType::Anime))?;

        mapper.run(MediaType::Anime)?;
        assert_eq!(first_xref, std::fs::read(paths.cross_reference(MediaType::Anime))?);
        assert_eq!(first_list, std::fs::read(paths.mapped_list(MediaType::Anime))?);

        Ok(())
    }

    #[test]
    fn test_dry_run_and_disabled_outputs() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let paths = DataPaths::new(temp_dir.path());
        anime_fixture(&paths)?;

        let summary = Mapper::new(paths.clone(), settings(), true).run(MediaType::Anime)?;
        assert!(summary.dry_run);
        assert!(!paths.cross_reference(MediaType::Anime).exists());
        assert!(!paths.mapping_summary(MediaType::Anime).exists());

        let minimal = MapperConfig {
            write_merged_metadata: false,
            write_summary: false,
            ..settings()
        };
        Mapper::new(paths.clone(), minimal, false).run(MediaType::Anime)?;
        assert!(paths.cross_reference(MediaType::Anime).exists());
        assert!(!paths.merged_metadata(MediaType::Anime).exists());
        assert!(!paths.mapping_summary(MediaType::Anime).exists());

        Ok(())
    }

    #[test]
    fn test_empty_input_writes_empty_outputs() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let paths = DataPaths::new(temp_dir.path());

        let summary = Mapper::new(paths.clone(), settings(), false).run(MediaType::Manga)?;
        assert_eq!(summary.ingest.sources_missing, 3);
        assert_eq!(summary.mapping.clusters, 0);

        let xref: Value = read_json(&paths.cross_reference(MediaType::Manga))?;
        assert_eq!(xref, json!({}));
        let list: Value = read_json(&paths.mapped_list(MediaType::Manga))?;
        assert_eq!(list, json!([]));

        Ok(())
    }

    #[test]
    fn test_conflicting_ids_resolve_to_smallest() {
        let mut records = RecordSet::new(MediaType::Manga);
        for (service, id, external) in [
            (Service::AniList, "1", vec![(Service::Mal, "11")]),
            (Service::Kitsu, "3", vec![(Service::Mal, "10"), (Service::AniList, "1")]),
        ] {
            records.insert(shared::SourceRecord {
                service,
                media_type: MediaType::Manga,
                local_id: id.to_string(),
                known_external_ids: external
                    .into_iter()
                    .map(|(s, id)| (s, id.to_string()))
                    .collect(),
                title: None,
                item_type: None,
                metadata: Default::default(),
            });
        }

        let output = map_records(&records);
        assert_eq!(output.stats.conflicts_resolved, 1);
        let entry = output.cross_reference.get("anilist:1").unwrap();
        assert_eq!(entry.ids[&Service::Mal], "10");
        assert_eq!(
            output.cross_reference.primary_key_for(&IdNode::new(Service::Mal, "11")),
            Some("anilist:1")
        );
        assert_eq!(output.list[0].id(Service::Mal), Some(&ListId::Numeric(10)));
    }

    #[test]
    fn test_season_taken_from_winning_anidb_id() {
        let mut records = RecordSet::new(MediaType::Anime);
        for (service, id, external, metadata) in [
            (Service::AniList, "1", vec![(Service::AniDb, "5")], json!({})),
            (Service::Kitsu, "2", vec![(Service::AniDb, "9"), (Service::AniList, "1")], json!({})),
            (Service::AniDb, "9", vec![], json!({"default_tvdb_season": "3"})),
        ] {
            records.insert(shared::SourceRecord {
                service,
                media_type: MediaType::Anime,
                local_id: id.to_string(),
                known_external_ids: external
                    .into_iter()
                    .map(|(s, id)| (s, id.to_string()))
                    .collect(),
                title: None,
                item_type: None,
                metadata: metadata.as_object().cloned().unwrap_or_default(),
            });
        }

        let output = map_records(&records);
        assert_eq!(output.list.len(), 1);
        assert_eq!(output.list[0].id(Service::AniDb), Some(&ListId::Numeric(5)));
        assert_eq!(output.list[0].season, None);
    }
}
