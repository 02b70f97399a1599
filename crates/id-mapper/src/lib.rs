//! Anime/manga identifier cross-reference mapper.
//!
//! This library reads scraped per-service records, links identifiers that
//! refer to the same title into clusters and writes a cross-reference table,
//! a flat merged list and merged metadata records.

pub mod cluster;
pub mod error;
pub mod graph;
pub mod ids;
pub mod ingest;
pub mod list;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod xref;

pub use cluster::{resolve_clusters, Cluster};
pub use error::IngestError;
pub use graph::IdGraph;
pub use ingest::{ingest, IngestStats, RecordSet};
pub use list::{build_mapped_list, ListId, MappedEntry, Season};
pub use merge::{merge_cluster, CrossReferenceRecord, MergedCluster, MergedMetadataRecord};
pub use output::OutputWriter;
pub use pipeline::{map_records, Mapper, MappingOutput, MappingStats, MappingSummary};
pub use xref::CrossReferenceTable;
