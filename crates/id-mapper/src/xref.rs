//! Cross-reference table.
//!
//! Serialized as a JSON object keyed by primary key, each value a flat
//! service-to-id mapping. In memory it also indexes every cluster member so
//! any `(service, id)` can be resolved to its title.

use crate::merge::{CrossReferenceRecord, MergedCluster};
use crate::output::read_json;
use anyhow::Result;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use shared::{IdNode, Service};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct CrossReferenceTable {
    entries: Vec<CrossReferenceRecord>,
    by_key: HashMap<String, usize>,
    by_node: HashMap<IdNode, usize>,
}

impl CrossReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_clusters<'a>(clusters: impl IntoIterator<Item = &'a MergedCluster>) -> Self {
        let mut table = Self::new();
        for cluster in clusters {
            let position = table.push(cluster.cross_reference());
            for member in &cluster.members {
                table.by_node.insert(member.clone(), position);
            }
        }
        table
    }

    /// Load a table written by a previous run
    ///
    /// Only the ids kept in the file are indexed, so ids discarded by conflict
    /// resolution no longer resolve.
    pub fn from_file(path: &Path) -> Result<Self> {
        read_json(path)
    }

    fn push(&mut self, record: CrossReferenceRecord) -> usize {
        let position = self.entries.len();
        self.by_key.insert(record.primary_key.clone(), position);
        for (service, id) in &record.ids {
            if !id.is_empty() {
                self.by_node.insert(IdNode::new(*service, id.clone()), position);
            }
        }
        self.entries.push(record);
        position
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CrossReferenceRecord] {
        &self.entries
    }

    pub fn get(&self, primary_key: &str) -> Option<&CrossReferenceRecord> {
        self.by_key.get(primary_key).map(|&i| &self.entries[i])
    }

    /// Entry of the cluster that contains `node`
    pub fn lookup(&self, node: &IdNode) -> Option<&CrossReferenceRecord> {
        self.by_node.get(node).map(|&i| &self.entries[i])
    }

    pub fn primary_key_for(&self, node: &IdNode) -> Option<&str> {
        self.lookup(node).map(|record| record.primary_key.as_str())
    }
}

impl Serialize for CrossReferenceTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for record in &self.entries {
            map.serialize_entry(&record.primary_key, &record.ids)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CrossReferenceTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, BTreeMap<Service, String>>::deserialize(deserializer)?;
        let mut table = Self::new();
        for (primary_key, ids) in raw {
            table.push(CrossReferenceRecord { primary_key, ids });
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputWriter;
    use shared::MediaType;
    use tempfile::TempDir;

    fn cluster(members: &[(Service, &str)]) -> MergedCluster {
        let members: Vec<IdNode> = members.iter().map(|(s, id)| IdNode::new(*s, *id)).collect();
        let mut ids = BTreeMap::new();
        for node in &members {
            ids.entry(node.service).or_insert_with(|| node.id.clone());
        }
        MergedCluster {
            media_type: MediaType::Manga,
            primary: members[0].clone(),
            members,
            ids,
            item_type: None,
            title: None,
            metadata: Default::default(),
            sources: BTreeMap::new(),
            conflicts: 0,
        }
    }

    #[test]
    fn test_lookup_any_member() {
        let table = CrossReferenceTable::from_clusters(&[
            cluster(&[(Service::AniList, "1"), (Service::Mal, "10"), (Service::Mal, "11")]),
            cluster(&[(Service::Kitsu, "7")]),
        ]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.primary_key_for(&IdNode::new(Service::Mal, "11")), Some("anilist:1"));
        assert_eq!(table.primary_key_for(&IdNode::new(Service::Kitsu, "7")), Some("kitsu:7"));
        assert_eq!(table.primary_key_for(&IdNode::new(Service::Kitsu, "8")), None);
        assert_eq!(table.get("anilist:1").unwrap().ids[&Service::Kitsu], "");
    }

    #[test]
    fn test_file_format() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("manga-cross-reference.json");
        let table = CrossReferenceTable::from_clusters(&[
            cluster(&[(Service::AniList, "2"), (Service::Mal, "20")]),
        ]);

        OutputWriter::new(false, false).write(&path, &table)?;
        let value: serde_json::Value = read_json(&path)?;
        assert_eq!(
            value,
            serde_json::json!({"anilist:2": {
                "anidb": "", "anilist": "2", "mal": "20", "kitsu": "",
                "simkl": "", "tmdb": "", "imdb": ""
            }})
        );

        let loaded = CrossReferenceTable::from_file(&path)?;
        assert_eq!(loaded.primary_key_for(&IdNode::new(Service::Mal, "20")), Some("anilist:2"));
        assert_eq!(loaded.entries(), table.entries());

        Ok(())
    }
}
