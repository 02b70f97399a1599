//! Record ingestion.
//!
//! Reads scraper output into [`SourceRecord`]s for one media type. A missing
//! service is skipped, a corrupt file or item is logged and counted, and the
//! run always continues with whatever could be read.

use crate::error::IngestError;
use crate::ids::{normalize_value, value_to_id};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::{DataPaths, IdNode, InputLayout, MediaType, Metadata, Service, SourceRecord};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// Services whose scraper output is read, in load order
pub fn ingest_services(media_type: MediaType) -> &'static [Service] {
    match media_type {
        MediaType::Anime => &[
            Service::AniDb,
            Service::AniList,
            Service::Mal,
            Service::Ann,
            Service::AnimePlanet,
            Service::Kitsu,
            Service::Livechart,
            Service::Simkl,
            Service::Tmdb,
            Service::Tvdb,
            Service::Imdb,
        ],
        MediaType::Manga => &[Service::AniList, Service::Mal, Service::Kitsu],
    }
}

/// All source records of one media type, unique per `(service, local_id)`
#[derive(Debug, Clone)]
pub struct RecordSet {
    media_type: MediaType,
    records: Vec<SourceRecord>,
    index: HashMap<IdNode, usize>,
}

impl RecordSet {
    pub fn new(media_type: MediaType) -> Self {
        Self {
            media_type,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Insert a record; a later record with the same key replaces the earlier
    /// one in place. Returns `true` when a record was replaced.
    pub fn insert(&mut self, record: SourceRecord) -> bool {
        let key = record.node();
        match self.index.get(&key) {
            Some(&position) => {
                self.records[position] = record;
                true
            }
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
                false
            }
        }
    }

    /// Look up the record a service published under `node.id`
    pub fn get(&self, node: &IdNode) -> Option<&SourceRecord> {
        self.index.get(node).map(|&position| &self.records[position])
    }

    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count_by_service(&self) -> BTreeMap<Service, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.service).or_insert(0) += 1;
        }
        counts
    }
}

/// Counters for one ingestion pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestStats {
    pub files_loaded: usize,
    pub sources_missing: usize,
    pub files_failed: usize,
    pub items_loaded: usize,
    pub items_skipped: usize,
    pub duplicates: usize,
    pub unknown_services: usize,
}

/// Item shape of the per-service array files
#[derive(Debug, Deserialize)]
struct ScrapedItem {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default, rename = "type")]
    item_type: Option<Value>,
    #[serde(default)]
    external_ids: Option<Map<String, Value>>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

/// Item shape of the per-item media database files
#[derive(Debug, Deserialize)]
struct MediaDatabaseItem {
    #[serde(default)]
    media_id: Option<Value>,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default, rename = "type")]
    item_type: Option<Value>,
    #[serde(default)]
    id_mappings: Option<Map<String, Value>>,
    #[serde(default)]
    full_metadata: Option<Metadata>,
    #[serde(default)]
    data: Option<Metadata>,
    #[serde(default)]
    metadata_from_all_services: Option<Map<String, Value>>,
}

/// Stateful ingester scoped to one media type
pub struct Ingester<'a> {
    paths: &'a DataPaths,
    media_type: MediaType,
    records: RecordSet,
    stats: IngestStats,
}

impl<'a> Ingester<'a> {
    pub fn new(paths: &'a DataPaths, media_type: MediaType) -> Self {
        Self {
            paths,
            media_type,
            records: RecordSet::new(media_type),
            stats: IngestStats::default(),
        }
    }

    /// Ingest every service of the media type using the given layout
    pub fn run(mut self, layout: InputLayout) -> (RecordSet, IngestStats) {
        info!(
            media_type = %self.media_type,
            layout = ?layout,
            "Loading data from all services"
        );

        for &service in ingest_services(self.media_type) {
            let before = self.stats.items_loaded;
            match layout {
                InputLayout::ServiceFiles => self.ingest_service_file(service),
                InputLayout::MediaDatabase => self.ingest_media_database(service),
            }
            let loaded = self.stats.items_loaded - before;
            if loaded > 0 {
                info!(service = %service, items = loaded, "Loaded service data");
            }
        }

        info!(
            media_type = %self.media_type,
            records = self.records.len(),
            items_loaded = self.stats.items_loaded,
            items_skipped = self.stats.items_skipped,
            duplicates = self.stats.duplicates,
            files_failed = self.stats.files_failed,
            sources_missing = self.stats.sources_missing,
            "Ingestion complete"
        );

        (self.records, self.stats)
    }

    fn ingest_service_file(&mut self, service: Service) {
        let path = self.paths.service_file(self.media_type, service);
        if !path.exists() {
            info!(service = %service, path = %path.display(), "Service file not found, skipping");
            self.stats.sources_missing += 1;
            return;
        }

        let items = match load_array(&path) {
            Ok(items) => items,
            Err(e) => {
                warn!(service = %service, error = %e, "Failed to load service file");
                self.stats.files_failed += 1;
                return;
            }
        };
        self.stats.files_loaded += 1;

        for (position, item) in items.into_iter().enumerate() {
            let result = serde_json::from_value::<ScrapedItem>(item)
                .map_err(IngestError::from)
                .and_then(|item| {
                    self.build_record(
                        service,
                        item.id.as_ref(),
                        item.external_ids.as_ref(),
                        item.title.as_ref(),
                        item.item_type.as_ref(),
                        item.metadata.unwrap_or_default(),
                    )
                });
            self.accept(service, result, || format!("{}[{}]", path.display(), position));
        }
    }

    fn ingest_media_database(&mut self, service: Service) {
        let dir = self.paths.media_database_service_dir(service, self.media_type);
        if !dir.is_dir() {
            info!(service = %service, dir = %dir.display(), "Media database directory not found, skipping");
            self.stats.sources_missing += 1;
            return;
        }

        let mut files = match list_json_files(&dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(service = %service, error = %e, "Failed to list media database directory");
                self.stats.files_failed += 1;
                return;
            }
        };
        files.sort();

        for path in files {
            let object = match load_object(&path) {
                Ok(object) => object,
                Err(e) => {
                    warn!(service = %service, error = %e, "Failed to load media database file");
                    self.stats.files_failed += 1;
                    continue;
                }
            };
            self.stats.files_loaded += 1;

            let result = serde_json::from_value::<MediaDatabaseItem>(Value::Object(object))
                .map_err(IngestError::from)
                .and_then(|item| {
                    let metadata = item
                        .full_metadata
                        .or(item.data)
                        .or_else(|| {
                            item.metadata_from_all_services
                                .and_then(|mut all| all.remove(service.as_str()))
                                .and_then(|v| match v {
                                    Value::Object(map) => Some(map),
                                    _ => None,
                                })
                        })
                        .unwrap_or_default();
                    let title = item.title.or_else(|| metadata.get("title").cloned());
                    let item_type = item.item_type.or_else(|| metadata.get("type").cloned());
                    self.build_record(
                        service,
                        item.media_id.as_ref(),
                        item.id_mappings.as_ref(),
                        title.as_ref(),
                        item_type.as_ref(),
                        metadata,
                    )
                });
            self.accept(service, result, || path.display().to_string());
        }
    }

    fn accept(
        &mut self,
        service: Service,
        result: Result<SourceRecord, IngestError>,
        location: impl FnOnce() -> String,
    ) {
        match result {
            Ok(record) => {
                self.stats.items_loaded += 1;
                let local_id = record.local_id.clone();
                if self.records.insert(record) {
                    debug!(service = %service, local_id = %local_id, "Duplicate record replaced earlier one");
                    self.stats.duplicates += 1;
                }
            }
            Err(e) => {
                warn!(service = %service, item = %location(), error = %e, "Skipping item");
                self.stats.items_skipped += 1;
            }
        }
    }

    fn build_record(
        &mut self,
        service: Service,
        raw_id: Option<&Value>,
        external: Option<&Map<String, Value>>,
        title: Option<&Value>,
        item_type: Option<&Value>,
        metadata: Metadata,
    ) -> Result<SourceRecord, IngestError> {
        let local_id = raw_id
            .and_then(|v| normalize_value(service, v))
            .ok_or(IngestError::MissingId)?;

        let mut known_external_ids = BTreeMap::new();
        for (key, value) in external.into_iter().flatten() {
            let Ok(external_service) = key.parse::<Service>() else {
                debug!(service = %service, key = %key, "Ignoring unknown external service");
                self.stats.unknown_services += 1;
                continue;
            };
            if let Some(id) = normalize_value(external_service, value) {
                known_external_ids.entry(external_service).or_insert(id);
            }
        }

        Ok(SourceRecord {
            service,
            media_type: self.media_type,
            local_id,
            known_external_ids,
            title: non_empty_text(title),
            item_type: non_empty_text(item_type),
            metadata,
        })
    }
}

/// Ingest one media type with the given layout
pub fn ingest(
    paths: &DataPaths,
    media_type: MediaType,
    layout: InputLayout,
) -> (RecordSet, IngestStats) {
    Ingester::new(paths, media_type).run(layout)
}

fn non_empty_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(value_to_id)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn load_array(path: &Path) -> Result<Vec<Value>, IngestError> {
    match load_json(path)? {
        Value::Array(items) => Ok(items),
        _ => Err(IngestError::UnexpectedShape {
            path: path.to_path_buf(),
            expected: "array",
        }),
    }
}

fn load_object(path: &Path) -> Result<Map<String, Value>, IngestError> {
    match load_json(path)? {
        Value::Object(object) => Ok(object),
        _ => Err(IngestError::UnexpectedShape {
            path: path.to_path_buf(),
            expected: "object",
        }),
    }
}

fn load_json(path: &Path) -> Result<Value, IngestError> {
    let content = std::fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| IngestError::json(path, e))
}

fn list_json_files(dir: &Path) -> Result<Vec<std::path::PathBuf>, IngestError> {
    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| IngestError::io(dir, e))?.path();
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let is_stats = path.file_name().is_some_and(|name| name == "stats.json");
        if path.is_file() && is_json && !is_stats {
            files.push(path);
        }
    }
    Ok(files)
}
