//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use transcribe_core::state::VolcengineConfig;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to (0 = auto-allocate).
    /// Override: `TRANSCRIBE_BIND_PORT`
    pub bind_port: u16,

    /// Upstream Volcengine ASR / Ark correction credentials.
    pub volcengine: VolcengineConfig,

    /// Default idle timeout (seconds) applied when a client omits
    /// `idle_timeout_sec` on `/transcribe/stream`.
    /// Override: `TRANSCRIBE_WS_IDLE_TIMEOUT_SEC`
    pub transcribe_ws_idle_timeout_sec: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: 0,
            volcengine: VolcengineConfig::default(),
            transcribe_ws_idle_timeout_sec: 5.0,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TRANSCRIBE_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("TRANSCRIBE_WS_IDLE_TIMEOUT_SEC") {
            if let Ok(sec) = val.parse() {
                self.transcribe_ws_idle_timeout_sec = sec;
            }
        }

        if let Ok(val) = std::env::var("VOLCENGINE_APP_KEY") {
            self.volcengine.app_key = val;
        }
        if let Ok(val) = std::env::var("VOLCENGINE_ACCESS_KEY") {
            self.volcengine.access_key = val;
        }
        if let Ok(val) = std::env::var("VOLCENGINE_RESOURCE_ID") {
            self.volcengine.resource_id = val;
        }
        if let Ok(val) = std::env::var("VOLCENGINE_ARK_API_KEY") {
            self.volcengine.ark_api_key = val;
        }
        if let Ok(val) = std::env::var("VOLCENGINE_ARK_MODEL_ID") {
            self.volcengine.ark_model_id = val;
        }
    }

    /// Converts to transcribe-core's `Config` type.
    pub fn to_core_config(&self) -> transcribe_core::Config {
        transcribe_core::Config {
            preferred_port: self.bind_port,
            volcengine: self.volcengine.clone(),
            transcribe_ws_idle_timeout_sec: self.transcribe_ws_idle_timeout_sec,
        }
    }
}
