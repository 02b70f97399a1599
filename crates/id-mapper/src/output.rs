//! Output materialization.
//!
//! Every file is written whole: serialized to a sibling temp file first and
//! then renamed over the target, so readers never see a partial file.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Writes pipeline outputs as JSON
#[derive(Debug, Clone)]
pub struct OutputWriter {
    /// Pretty-print JSON
    pretty: bool,
    /// Compute only, never touch the filesystem
    dry_run: bool,
}

impl OutputWriter {
    pub fn new(pretty: bool, dry_run: bool) -> Self {
        Self { pretty, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Serialize `data` and replace `path` with it
    pub fn write<T: Serialize + ?Sized>(&self, path: &Path, data: &T) -> Result<()> {
        if self.dry_run {
            info!(path = %path.display(), "Dry run, not writing");
            return Ok(());
        }

        let content = if self.pretty {
            serde_json::to_vec_pretty(data)
        } else {
            serde_json::to_vec(data)
        }
        .with_context(|| format!("Failed to serialize {}", path.display()))?;

        write_atomic(path, &content)?;
        debug!(path = %path.display(), bytes = content.len(), "Output written");
        Ok(())
    }
}

/// Replace `path` with `content` through a temp file and rename
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let tmp_path = temp_path(path);
    let result = write_and_rename(&tmp_path, path, content);
    if result.is_err() && tmp_path.exists() {
        if let Err(e) = std::fs::remove_file(&tmp_path) {
            warn!(path = %tmp_path.display(), error = %e, "Failed to remove temp file");
        }
    }
    result
}

fn write_and_rename(tmp_path: &Path, path: &Path, content: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(tmp_path)
        .with_context(|| format!("Failed to create temp file: {}", tmp_path.display()))?;
    file.write_all(content)
        .and_then(|_| file.sync_all())
        .with_context(|| format!("Failed to write temp file: {}", tmp_path.display()))?;
    drop(file);

    std::fs::rename(tmp_path, path).with_context(|| {
        format!(
            "Failed to move {} into place at {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Read a JSON file written by [`OutputWriter`]
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn test_write_replaces_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("mapped-data").join("out.json");
        let writer = OutputWriter::new(false, false);

        writer.write(&path, &json!({"a": 1}))?;
        writer.write(&path, &json!([1, 2]))?;

        let value: Value = read_json(&path)?;
        assert_eq!(value, json!([1, 2]));
        assert!(!temp_path(&path).exists());

        Ok(())
    }

    #[test]
    fn test_pretty_output() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("out.json");

        OutputWriter::new(true, false).write(&path, &json!({"a": 1}))?;
        let content = std::fs::read_to_string(&path)?;
        assert!(content.contains('\n'));

        Ok(())
    }

    #[test]
    fn test_failed_rename_removes_temp_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("out.json");
        std::fs::create_dir_all(path.join("occupied"))?;

        let result = write_atomic(&path, b"{}");
        assert!(result.is_err());
        assert!(!temp_path(&path).exists());
        assert!(path.is_dir());

        Ok(())
    }

    #[test]
    fn test_dry_run_writes_nothing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("out.json");
        let writer = OutputWriter::new(false, true);

        writer.write(&path, &json!({}))?;
        assert!(!path.exists());
        assert!(writer.is_dry_run());

        Ok(())
    }
}
