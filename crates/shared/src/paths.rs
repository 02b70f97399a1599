//! File path utilities for organizing data files.
//!
//! This module provides a centralized way to manage file paths for scraper
//! output (per-service files and the per-item media database) and for the
//! mapped outputs (cross-reference table, merged list, merged metadata, summary).

use crate::models::{MediaType, Service};
use std::path::{Path, PathBuf};

/// File path manager for data files
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Create a new DataPaths with the given root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root data directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Scraper output (input to the mapper) ==========

    /// Get the scraped data directory for a media type
    pub fn scraped_dir(&self, media_type: MediaType) -> PathBuf {
        self.root.join("scraped-data").join(media_type.as_str())
    }

    /// Get a service's scraped array file, e.g. `myanimelist-anime.json`
    pub fn service_file(&self, media_type: MediaType, service: Service) -> PathBuf {
        self.scraped_dir(media_type)
            .join(format!("{}-{}.json", service.file_stem(), media_type))
    }

    /// Get the per-item media database root
    pub fn media_database_dir(&self) -> PathBuf {
        self.root.join("media_database")
    }

    /// Get the per-item directory of one service and media type
    pub fn media_database_service_dir(&self, service: Service, media_type: MediaType) -> PathBuf {
        self.media_database_dir()
            .join(service.as_str())
            .join(media_type.as_str())
    }

    // ========== Mapper output ==========

    /// Get the mapped output directory
    pub fn mapped_dir(&self) -> PathBuf {
        self.root.join("mapped-data")
    }

    /// Get the flat merged list path
    pub fn mapped_list(&self, media_type: MediaType) -> PathBuf {
        self.mapped_dir()
            .join(format!("{}-list-full-mapped.json", media_type))
    }

    /// Get the cross-reference table path
    pub fn cross_reference(&self, media_type: MediaType) -> PathBuf {
        self.mapped_dir()
            .join(format!("{}-cross-reference.json", media_type))
    }

    /// Get the merged metadata records path
    pub fn merged_metadata(&self, media_type: MediaType) -> PathBuf {
        self.mapped_dir()
            .join(format!("{}-merged-metadata.json", media_type))
    }

    /// Get the run summary path
    pub fn mapping_summary(&self, media_type: MediaType) -> PathBuf {
        self.mapped_dir()
            .join(format!("{}-mapping-summary.json", media_type))
    }

    // ========== Utility Methods ==========

    /// Create the output directories the mapper writes into
    ///
    /// The log directory is configured separately and created by logging init.
    pub fn create_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.mapped_dir())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let paths = DataPaths::new("/data");

        assert_eq!(
            paths.service_file(MediaType::Anime, Service::Mal),
            PathBuf::from("/data/scraped-data/anime/myanimelist-anime.json")
        );

        assert_eq!(
            paths.service_file(MediaType::Manga, Service::AniList),
            PathBuf::from("/data/scraped-data/manga/anilist-manga.json")
        );

        assert_eq!(
            paths.media_database_service_dir(Service::Kitsu, MediaType::Anime),
            PathBuf::from("/data/media_database/kitsu/anime")
        );

        assert_eq!(
            paths.mapped_list(MediaType::Anime),
            PathBuf::from("/data/mapped-data/anime-list-full-mapped.json")
        );

        assert_eq!(
            paths.cross_reference(MediaType::Manga),
            PathBuf::from("/data/mapped-data/manga-cross-reference.json")
        );
    }

    #[test]
    fn test_create_dirs() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let paths = DataPaths::new(temp_dir.path());

        paths.create_dirs()?;

        assert!(paths.mapped_dir().is_dir());
        assert!(!temp_dir.path().join("logs").exists());
        assert!(!paths.scraped_dir(MediaType::Anime).exists());

        Ok(())
    }
}
