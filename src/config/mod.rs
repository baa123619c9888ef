use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod logs_config;
mod server_config;
mod storage_config;
mod upload_config;

pub use logs_config::LogsConfig;
pub use server_config::ServerConfig;
pub use storage_config::StorageConfig;
pub use upload_config::UploadConfig;

use logs_config::RawLogsConfig;
use server_config::RawServerConfig;
use storage_config::RawStorageConfig;
use upload_config::RawUploadConfig;

/// Startup failures. Each one maps to its own process exit code so that
/// supervisors can tell which setting is wrong.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("UPLOAD_KEY can't be 'DEFAULT_KEY' or empty")]
    MissingKey,
    #[error("STORAGE_PATH wasn't set")]
    MissingStoragePath,
    #[error("STORAGE_PATH = {path:?} is not writeable: {reason}")]
    StorageNotWritable { path: PathBuf, reason: String },
    #[error("PUBLIC_ROOT wasn't set")]
    MissingPublicRoot,
    #[error("FILENAME_LENGTH wasn't set or is not a positive integer")]
    InvalidFilenameLength,
    #[error("MAX_UPLOAD_SIZE_IN_MB wasn't set or is not an integer")]
    InvalidMaxUploadSize,
    #[error("LISTEN_ADDRESS wasn't set")]
    MissingListenAddress,
    #[error("{name} has an unsupported value '{value}'")]
    InvalidOption { name: &'static str, value: String },
    #[error("Failed to load configuration file {path:?}: {reason}")]
    File { path: PathBuf, reason: String },
}

impl ConfigError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::MissingKey => 1,
            ConfigError::MissingStoragePath => 2,
            ConfigError::StorageNotWritable { .. } => 3,
            ConfigError::MissingPublicRoot => 4,
            ConfigError::InvalidFilenameLength => 5,
            ConfigError::InvalidMaxUploadSize => 6,
            ConfigError::MissingListenAddress => 7,
            ConfigError::InvalidOption { .. } => 8,
            ConfigError::File { .. } => 9,
        }
    }
}

/// Immutable process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub storage: StorageConfig,
    pub logs: LogsConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawConfig {
    server: RawServerConfig,
    upload: RawUploadConfig,
    storage: RawStorageConfig,
    logs: RawLogsConfig,
}

impl RawConfig {
    fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::File {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    /// Environment variables win over values from the configuration file.
    fn overlay_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.upload.overlay_env(&lookup);
        self.storage.overlay_env(&lookup);
        self.server.overlay_env(&lookup);
        self.logs.overlay_env(&lookup);
    }
}

impl Config {
    /// Validates every setting in the order the exit codes are numbered,
    /// so the first missing variable decides the exit code.
    fn resolve(raw: RawConfig, working_dir: &Path) -> Result<Self, ConfigError> {
        let RawConfig {
            server,
            upload,
            storage,
            logs,
        } = raw;
        let key = upload.resolve_key()?;
        let storage = storage.resolve(working_dir)?;
        let upload = upload.resolve(key)?;
        let server = server.resolve()?;
        let logs = logs.resolve(working_dir)?;
        Ok(Self {
            server,
            upload,
            storage,
            logs,
        })
    }
}

fn parse_config_path() -> Option<PathBuf> {
    let mut args = std::env::args();
    args.next();
    while let Some(arg) = args.next() {
        if arg == "-c" || arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|it| !it.trim().is_empty())
}

/// A setting that is either typed in the TOML file or a raw string taken
/// from the environment, parsed when the configuration is resolved.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum Setting<T> {
    Value(T),
    Text(String),
}

impl<T: std::str::FromStr> Setting<T> {
    fn parse(self) -> Option<T> {
        match self {
            Setting::Value(value) => Some(value),
            Setting::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Load configuration from an optional TOML file (`-c <path>`) overlaid
/// with environment variables, then probe the storage directory.
pub fn load() -> Result<Config, ConfigError> {
    let mut raw = match parse_config_path() {
        Some(path) => {
            let content = std::fs::read_to_string(&path).map_err(|err| ConfigError::File {
                path: path.clone(),
                reason: err.to_string(),
            })?;
            RawConfig::from_toml(&content, &path)?
        }
        None => RawConfig::default(),
    };
    raw.overlay_env(|name| std::env::var(name).ok());
    let working_dir = std::env::current_dir().map_err(|err| ConfigError::StorageNotWritable {
        path: PathBuf::from("."),
        reason: err.to_string(),
    })?;
    let config = Config::resolve(raw, &working_dir)?;
    config.storage.probe_writable()?;
    Ok(config)
}
