use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// Data-directory file that replaces the bundled base configuration.
pub const BASE_CONFIG_FILE: &str = "config.ttl";
/// Data-directory file appended after the base configuration.
pub const EXTENSION_CONFIG_FILE: &str = "config-ext.ttl";

/// The downstream Skosmos configuration file, built up one fragment at a time.
#[derive(Debug, Clone)]
pub struct ConfigAccumulator {
    path: PathBuf,
}

impl ConfigAccumulator {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start the output from `{data_dir}/config.ttl`, or `fallback_base` when the
    /// data directory has none, then append `{data_dir}/config-ext.ttl` if present.
    pub fn initialize(&self, data_dir: &Path, fallback_base: &Path) -> Result<(), SyncError> {
        let custom_base = data_dir.join(BASE_CONFIG_FILE);
        let base = if custom_base.is_file() {
            custom_base
        } else if fallback_base.is_file() {
            fallback_base.to_path_buf()
        } else {
            return Err(SyncError::Environment(format!(
                "No base configuration: neither {} nor {} exists",
                custom_base.display(),
                fallback_base.display()
            )));
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.output_error(e))?;
        }
        fs::copy(&base, &self.path).map_err(|e| self.output_error(e))?;
        tracing::info!("Copied {} to {}", base.display(), self.path.display());

        let extension = data_dir.join(EXTENSION_CONFIG_FILE);
        if extension.is_file() {
            let content = fs::read(&extension)?;
            self.append(&content)?;
            tracing::info!("Appended {}", extension.display());
        }
        Ok(())
    }

    pub fn append(&self, fragment: &[u8]) -> Result<(), SyncError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.output_error(e))?;
        file.write_all(fragment).map_err(|e| self.output_error(e))
    }

    fn output_error(&self, source: std::io::Error) -> SyncError {
        SyncError::Output {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_fragments_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let out = ConfigAccumulator::new(dir.path().join("out.ttl"));
        out.append(b"first\n").unwrap();
        out.append(b"second\n").unwrap();
        assert_eq!(fs::read_to_string(out.path()).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn data_dir_base_wins_over_fallback() {
        let data = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        fs::write(data.path().join(BASE_CONFIG_FILE), "custom\n").unwrap();
        fs::write(data.path().join(EXTENSION_CONFIG_FILE), "ext\n").unwrap();
        let fallback = out_dir.path().join("bundled.ttl");
        fs::write(&fallback, "bundled\n").unwrap();

        let out = ConfigAccumulator::new(out_dir.path().join("config/out.ttl"));
        out.initialize(data.path(), &fallback).unwrap();
        assert_eq!(fs::read_to_string(out.path()).unwrap(), "custom\next\n");
    }

    #[test]
    fn falls_back_to_bundled_base() {
        let data = tempfile::tempdir().unwrap();
        let fallback = data.path().join("bundled.ttl");
        fs::write(&fallback, "bundled\n").unwrap();

        let out = ConfigAccumulator::new(data.path().join("out.ttl"));
        out.initialize(data.path(), &fallback).unwrap();
        assert_eq!(fs::read_to_string(out.path()).unwrap(), "bundled\n");
    }

    #[test]
    fn missing_base_is_fatal() {
        let data = tempfile::tempdir().unwrap();
        let out = ConfigAccumulator::new(data.path().join("out.ttl"));
        let err = out
            .initialize(data.path(), Path::new("/nonexistent/base.ttl"))
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
