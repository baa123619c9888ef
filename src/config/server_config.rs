use super::{ConfigError, Setting, non_empty};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_address: String,
    pub enable_webform: bool,
    pub request_timeout: Duration,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub(super) struct RawServerConfig {
    listen_address: Option<String>,
    enable_webform: Option<Setting<bool>>,
    request_timeout_secs: Option<Setting<u64>>,
}

impl RawServerConfig {
    pub(super) fn overlay_env<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("LISTEN_ADDRESS") {
            self.listen_address = Some(value);
        }
        if let Some(value) = lookup("ENABLE_WEBFORM") {
            self.enable_webform = Some(Setting::Text(value));
        }
        if let Some(value) = lookup("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = Some(Setting::Text(value));
        }
    }

    pub(super) fn resolve(self) -> Result<ServerConfig, ConfigError> {
        let listen_address =
            non_empty(self.listen_address).ok_or(ConfigError::MissingListenAddress)?;
        // only the literal "true" turns the form on
        let enable_webform = match self.enable_webform {
            Some(Setting::Value(value)) => value,
            Some(Setting::Text(text)) => text == "true",
            None => false,
        };
        let request_timeout = match self.request_timeout_secs {
            Some(Setting::Value(secs)) => secs,
            Some(Setting::Text(text)) => {
                text.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidOption {
                        name: "REQUEST_TIMEOUT_SECS",
                        value: text,
                    })?
            }
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        Ok(ServerConfig {
            listen_address,
            enable_webform,
            request_timeout: Duration::from_secs(request_timeout),
        })
    }
}
