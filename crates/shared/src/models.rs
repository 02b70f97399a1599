//! Data models for the mapping pipeline.
//!
//! This module defines the identity types shared by every stage: the catalog
//! services, the media type partition, graph vertices and the per-service
//! source records produced by ingestion.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Opaque per-service metadata payload
pub type Metadata = Map<String, Value>;

/// Catalog service an identifier belongs to
///
/// Variant order is the global service rank: it matches the anime primary-key
/// priority and decides member order inside a cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    AniDb,
    AniList,
    #[serde(alias = "myanimelist")]
    Mal,
    Kitsu,
    Simkl,
    #[serde(alias = "themoviedb")]
    Tmdb,
    #[serde(alias = "thetvdb")]
    Tvdb,
    Imdb,
    #[serde(alias = "anime-planet")]
    AnimePlanet,
    #[serde(alias = "animenewsnetwork")]
    Ann,
    Livechart,
}

/// How a service spells its identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFormat {
    /// Plain decimal integer
    Numeric,
    /// Decimal integer, occasionally a slug
    NumericOrSlug,
    /// Lowercase hyphenated slug
    Slug,
    /// `tt` followed by digits
    Imdb,
}

impl Service {
    pub const ALL: [Service; 11] = [
        Service::AniDb,
        Service::AniList,
        Service::Mal,
        Service::Kitsu,
        Service::Simkl,
        Service::Tmdb,
        Service::Tvdb,
        Service::Imdb,
        Service::AnimePlanet,
        Service::Ann,
        Service::Livechart,
    ];

    /// Canonical service name used in keys and output maps
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::AniDb => "anidb",
            Service::AniList => "anilist",
            Service::Mal => "mal",
            Service::Kitsu => "kitsu",
            Service::Simkl => "simkl",
            Service::Tmdb => "tmdb",
            Service::Tvdb => "tvdb",
            Service::Imdb => "imdb",
            Service::AnimePlanet => "animeplanet",
            Service::Ann => "ann",
            Service::Livechart => "livechart",
        }
    }

    /// Name the scrapers use for this service's output file
    pub fn file_stem(&self) -> &'static str {
        match self {
            Service::AniDb => "anidb",
            Service::AniList => "anilist",
            Service::Mal => "myanimelist",
            Service::Kitsu => "kitsu",
            Service::Simkl => "simkl",
            Service::Tmdb => "themoviedb",
            Service::Tvdb => "tvdb",
            Service::Imdb => "imdb",
            Service::AnimePlanet => "animeplanet",
            Service::Ann => "animenewsnetwork",
            Service::Livechart => "livechart",
        }
    }

    /// Field name in the flat merged list
    pub fn list_field(&self) -> &'static str {
        match self {
            Service::AniDb => "anidb_id",
            Service::AniList => "anilist_id",
            Service::Mal => "mal_id",
            Service::Kitsu => "kitsu_id",
            Service::Simkl => "simkl_id",
            Service::Tmdb => "themoviedb_id",
            Service::Tvdb => "tvdb_id",
            Service::Imdb => "imdb_id",
            Service::AnimePlanet => "anime-planet_id",
            Service::Ann => "animenewsnetwork_id",
            Service::Livechart => "livechart_id",
        }
    }

    pub fn id_format(&self) -> IdFormat {
        match self {
            Service::Kitsu => IdFormat::NumericOrSlug,
            Service::AnimePlanet => IdFormat::Slug,
            Service::Imdb => IdFormat::Imdb,
            _ => IdFormat::Numeric,
        }
    }

    /// Whether the merged list stores this service's ID as an integer
    ///
    /// Only slug ids are exempt; IMDB `tt` ids never coerce and are dropped.
    pub fn has_numeric_list_field(&self) -> bool {
        !matches!(self, Service::AnimePlanet)
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Service {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anidb" => Ok(Service::AniDb),
            "anilist" => Ok(Service::AniList),
            "mal" | "myanimelist" => Ok(Service::Mal),
            "kitsu" => Ok(Service::Kitsu),
            "simkl" => Ok(Service::Simkl),
            "tmdb" | "themoviedb" => Ok(Service::Tmdb),
            "tvdb" | "thetvdb" => Ok(Service::Tvdb),
            "imdb" => Ok(Service::Imdb),
            "animeplanet" | "anime-planet" => Ok(Service::AnimePlanet),
            "ann" | "animenewsnetwork" => Ok(Service::Ann),
            "livechart" => Ok(Service::Livechart),
            _ => Err(anyhow::anyhow!("Unknown service: {}", s)),
        }
    }
}

/// Media type partition; anime and manga never link to each other
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Anime,
    Manga,
}

impl MediaType {
    pub const ALL: [MediaType; 2] = [MediaType::Anime, MediaType::Manga];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Anime => "anime",
            MediaType::Manga => "manga",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anime" => Ok(MediaType::Anime),
            "manga" => Ok(MediaType::Manga),
            _ => Err(anyhow::anyhow!("Invalid media type: {}", s)),
        }
    }
}

/// A `(service, id)` identity pair, the vertex of the cross-reference graph
///
/// Ordering is by service rank first, then by id with numeric ids compared by
/// value and placed before non-numeric ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdNode {
    pub service: Service,
    pub id: String,
}

impl IdNode {
    pub fn new(service: Service, id: impl Into<String>) -> Self {
        Self {
            service,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for IdNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.service, self.id)
    }
}

impl Ord for IdNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.service
            .cmp(&other.service)
            .then_with(|| compare_ids(&self.id, &other.id))
    }
}

impl PartialOrd for IdNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Numeric-aware identifier comparison
///
/// Digit-only ids compare by value and sort before anything else; the raw
/// strings break remaining ties so the order stays total.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    let a_numeric = is_digits(a);
    let b_numeric = is_digits(b);

    match (a_numeric, b_numeric) {
        (true, true) => {
            let a_trim = a.trim_start_matches('0');
            let b_trim = b.trim_start_matches('0');
            a_trim
                .len()
                .cmp(&b_trim.len())
                .then_with(|| a_trim.cmp(b_trim))
                .then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// One title as reported by one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub service: Service,
    pub media_type: MediaType,
    /// Normalized local identifier
    pub local_id: String,
    /// Normalized identifiers this record claims on other services
    pub known_external_ids: BTreeMap<Service, String>,
    pub title: Option<String>,
    pub item_type: Option<String>,
    pub metadata: Metadata,
}

impl SourceRecord {
    /// The record's own graph vertex
    pub fn node(&self) -> IdNode {
        IdNode::new(self.service, self.local_id.clone())
    }

    /// Own node plus every non-empty claimed external node
    pub fn linked_nodes(&self) -> Vec<IdNode> {
        let own = self.node();
        let mut nodes = vec![own.clone()];
        for (service, id) in &self.known_external_ids {
            if id.is_empty() {
                continue;
            }
            let node = IdNode::new(*service, id.clone());
            if !nodes.contains(&node) {
                nodes.push(node);
            }
        }
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_aliases() {
        assert_eq!("myanimelist".parse::<Service>().unwrap(), Service::Mal);
        assert_eq!("Anime-Planet".parse::<Service>().unwrap(), Service::AnimePlanet);
        assert_eq!("themoviedb".parse::<Service>().unwrap(), Service::Tmdb);
        assert_eq!("animenewsnetwork".parse::<Service>().unwrap(), Service::Ann);
        assert!("crunchyroll".parse::<Service>().is_err());
    }

    #[test]
    fn test_service_serde_names() {
        let json = serde_json::to_string(&Service::AnimePlanet).unwrap();
        assert_eq!(json, "\"animeplanet\"");

        let parsed: Service = serde_json::from_str("\"myanimelist\"").unwrap();
        assert_eq!(parsed, Service::Mal);

        let mut map = BTreeMap::new();
        map.insert(Service::Kitsu, "1".to_string());
        map.insert(Service::AniDb, "2".to_string());
        assert_eq!(
            serde_json::to_string(&map).unwrap(),
            r#"{"anidb":"2","kitsu":"1"}"#
        );
    }

    #[test]
    fn test_compare_ids_numeric_aware() {
        assert_eq!(compare_ids("9", "10"), Ordering::Less);
        assert_eq!(compare_ids("10", "abc"), Ordering::Less);
        assert_eq!(compare_ids("abc", "abd"), Ordering::Less);
        assert_eq!(compare_ids("010", "10"), Ordering::Less);
        assert_eq!(compare_ids("10", "10"), Ordering::Equal);
    }

    #[test]
    fn test_node_order_by_service_rank() {
        let mut nodes = vec![
            IdNode::new(Service::Kitsu, "1"),
            IdNode::new(Service::Mal, "11"),
            IdNode::new(Service::AniDb, "500"),
            IdNode::new(Service::Mal, "9"),
        ];
        nodes.sort();
        let rendered: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
        assert_eq!(rendered, vec!["anidb:500", "mal:9", "mal:11", "kitsu:1"]);
    }

    #[test]
    fn test_linked_nodes_skip_empty_and_self() {
        let mut external = BTreeMap::new();
        external.insert(Service::AniList, "1".to_string());
        external.insert(Service::Mal, "10".to_string());
        external.insert(Service::Kitsu, String::new());

        let record = SourceRecord {
            service: Service::AniList,
            media_type: MediaType::Anime,
            local_id: "1".to_string(),
            known_external_ids: external,
            title: None,
            item_type: None,
            metadata: Metadata::new(),
        };

        let nodes = record.linked_nodes();
        assert_eq!(
            nodes,
            vec![IdNode::new(Service::AniList, "1"), IdNode::new(Service::Mal, "10")]
        );
    }

    #[test]
    fn test_media_type_round_trip() {
        assert_eq!("Manga".parse::<MediaType>().unwrap(), MediaType::Manga);
        assert_eq!(MediaType::Anime.to_string(), "anime");
        assert!("novel".parse::<MediaType>().is_err());
    }
}
