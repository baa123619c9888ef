use super::{ConfigError, non_empty};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Debug, Clone)]
pub struct LogsConfig {
    pub level: Level,
    /// When set, application logs go to this file instead of stdout.
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub(super) struct RawLogsConfig {
    level: Option<String>,
    path: Option<String>,
}

impl RawLogsConfig {
    pub(super) fn overlay_env<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("LOG_LEVEL") {
            self.level = Some(value);
        }
        if let Some(value) = lookup("LOG_PATH") {
            self.path = Some(value);
        }
    }

    pub(super) fn resolve(self, working_dir: &Path) -> Result<LogsConfig, ConfigError> {
        let level = match non_empty(self.level) {
            Some(level) => parse_level(&level).ok_or(ConfigError::InvalidOption {
                name: "LOG_LEVEL",
                value: level,
            })?,
            None => Level::INFO,
        };
        let path = non_empty(self.path).map(|path| {
            let path = Path::new(&path);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                working_dir.join(path)
            }
        });
        Ok(LogsConfig { level, path })
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
