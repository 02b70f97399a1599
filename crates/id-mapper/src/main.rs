//! ID Mapper CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use id_mapper::{ids::parse_node, CrossReferenceTable, Mapper};
use shared::{Config, DataPaths, LogConfig, MediaType};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Map only this media type (default: all configured)
    #[arg(short, long)]
    media_type: Option<MediaType>,

    /// Override the data root directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Compute everything but write no output files
    #[arg(long)]
    dry_run: bool,

    /// Resolve a service:id reference against the existing cross-reference table
    #[arg(long, value_name = "SERVICE:ID")]
    lookup: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(data_dir) = &args.data_dir {
        config.data.root_dir = data_dir.to_string_lossy().to_string();
    }

    // Initialize logging
    let mut log_config = LogConfig::from_settings(&config.logging, &config.log_dir(), "id-mapper")?;
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!("ID Mapper starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    let data_paths = DataPaths::new(config.data_dir());

    let media_types = match args.media_type {
        Some(media_type) => vec![media_type],
        None => config.mapper.media_types.clone(),
    };

    if let Some(reference) = &args.lookup {
        return lookup(&data_paths, &media_types, reference);
    }

    if !args.dry_run {
        data_paths
            .create_dirs()
            .context("Failed to create data directories")?;
    }

    let mapper = Mapper::new(data_paths, config.mapper.clone(), args.dry_run);

    // Media types share no state, map them side by side
    let mut handles = Vec::new();
    for media_type in media_types {
        let mapper = mapper.clone();
        let handle = tokio::task::spawn_blocking(move || mapper.run(media_type));
        handles.push((media_type, handle));
    }

    let mut failed = 0;
    for (media_type, handle) in handles {
        let result = handle
            .await
            .with_context(|| format!("Mapping task for {} panicked", media_type))?;

        match result {
            Ok(summary) => {
                info!("=== {} Mapping Complete ===", media_type);
                info!("Records loaded: {}", summary.ingest.items_loaded);
                info!("Items skipped: {}", summary.ingest.items_skipped);
                info!("Duplicate records: {}", summary.ingest.duplicates);
                info!("Graph nodes: {}", summary.mapping.nodes);
                info!("Graph edges: {}", summary.mapping.edges);
                info!("Clusters: {}", summary.mapping.clusters);
                info!("Dropped clusters: {}", summary.mapping.dropped_clusters);
                info!("Conflicts resolved: {}", summary.mapping.conflicts_resolved);
                info!("List entries: {}", summary.mapping.list.entries);
                info!("ID fields dropped: {}", summary.mapping.list.fields_dropped);
            }
            Err(e) => {
                error!(media_type = %media_type, error = ?e, "Mapping failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} mapping run(s) failed", failed);
    }

    info!("ID Mapper finished successfully");

    Ok(())
}

/// Print the cross-reference entry containing `reference`
fn lookup(paths: &DataPaths, media_types: &[MediaType], reference: &str) -> Result<()> {
    let node = parse_node(reference)?;

    for &media_type in media_types {
        let path = paths.cross_reference(media_type);
        if !path.exists() {
            warn!(media_type = %media_type, path = %path.display(), "Cross-reference table not found");
            continue;
        }

        let table = CrossReferenceTable::from_file(&path)?;
        if let Some(record) = table.lookup(&node) {
            info!(node = %node, media_type = %media_type, primary_key = %record.primary_key, "Found cluster");
            println!("{}", serde_json::to_string_pretty(record)?);
            return Ok(());
        }
    }

    anyhow::bail!("No cluster contains {}", node)
}
