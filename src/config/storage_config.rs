use super::{ConfigError, non_empty};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const WRITE_PROBE_FILENAME: &str = "write-test.txt";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

impl StorageConfig {
    /// Create and remove a probe file so an unwritable directory fails at
    /// startup instead of on the first upload.
    pub fn probe_writable(&self) -> Result<(), ConfigError> {
        let probe = self.dir.join(WRITE_PROBE_FILENAME);
        let not_writable = |err: std::io::Error| ConfigError::StorageNotWritable {
            path: self.dir.clone(),
            reason: err.to_string(),
        };
        std::fs::File::create(&probe).map_err(not_writable)?;
        std::fs::remove_file(&probe).map_err(not_writable)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub(super) struct RawStorageConfig {
    path: Option<String>,
}

impl RawStorageConfig {
    pub(super) fn overlay_env<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("STORAGE_PATH") {
            self.path = Some(value);
        }
    }

    pub(super) fn resolve(self, working_dir: &Path) -> Result<StorageConfig, ConfigError> {
        let path = non_empty(self.path).ok_or(ConfigError::MissingStoragePath)?;
        let path = Path::new(&path);
        let dir = if path.is_absolute() {
            path.to_path_buf()
        } else {
            working_dir.join(path)
        };
        Ok(StorageConfig { dir })
    }
}
