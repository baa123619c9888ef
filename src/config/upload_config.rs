use super::{ConfigError, Setting, non_empty};
use serde::Deserialize;

const DEFAULT_KEY: &str = "DEFAULT_KEY";
const BYTES_PER_MB: u64 = 1 << 20;

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Shared secret every upload must present in its `key` field.
    pub key: String,
    /// Prefix prepended to stored names in responses.
    pub public_root: String,
    /// Number of random bytes in a generated name.
    pub filename_length: usize,
    pub max_upload_size_mb: u64,
}

impl UploadConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(BYTES_PER_MB)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub(super) struct RawUploadConfig {
    key: Option<String>,
    public_root: Option<String>,
    filename_length: Option<Setting<u32>>,
    max_upload_size_mb: Option<Setting<u64>>,
}

impl RawUploadConfig {
    pub(super) fn overlay_env<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("UPLOAD_KEY") {
            self.key = Some(value);
        }
        if let Some(value) = lookup("PUBLIC_ROOT") {
            self.public_root = Some(value);
        }
        if let Some(value) = lookup("FILENAME_LENGTH") {
            self.filename_length = Some(Setting::Text(value));
        }
        if let Some(value) = lookup("MAX_UPLOAD_SIZE_IN_MB") {
            self.max_upload_size_mb = Some(Setting::Text(value));
        }
    }

    pub(super) fn resolve_key(&self) -> Result<String, ConfigError> {
        non_empty(self.key.clone())
            .filter(|it| it != DEFAULT_KEY)
            .ok_or(ConfigError::MissingKey)
    }

    pub(super) fn resolve(self, key: String) -> Result<UploadConfig, ConfigError> {
        let public_root = non_empty(self.public_root).ok_or(ConfigError::MissingPublicRoot)?;
        let filename_length = self
            .filename_length
            .and_then(Setting::parse)
            .filter(|it| *it > 0)
            .ok_or(ConfigError::InvalidFilenameLength)?;
        let max_upload_size_mb = self
            .max_upload_size_mb
            .and_then(Setting::parse)
            .filter(|it: &u64| it.checked_mul(BYTES_PER_MB).is_some())
            .ok_or(ConfigError::InvalidMaxUploadSize)?;
        Ok(UploadConfig {
            key,
            public_root,
            filename_length: filename_length as usize,
            max_upload_size_mb,
        })
    }
}
