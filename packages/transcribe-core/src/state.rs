//! Core application configuration types.
//!
//! Provides [`Config`] (the gateway's read-only settings value) and the nested
//! [`VolcengineConfig`] credential block.

use serde::{Deserialize, Serialize};

/// Upstream Volcengine (Doubao) ASR / Ark correction credentials.
///
/// All fields default to empty; [`VolcengineConfig::asr_valid`] and
/// [`VolcengineConfig::ark_valid`] gate whether the corresponding upstream call is
/// attempted at all.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct VolcengineConfig {
    /// `X-Api-App-Key` header value.
    pub app_key: String,
    /// `X-Api-Access-Key` header value.
    pub access_key: String,
    /// `X-Api-Resource-Id` header value.
    pub resource_id: String,
    /// Ark API key for the LLM correction call.
    pub ark_api_key: String,
    /// Ark model identifier for the LLM correction call.
    pub ark_model_id: String,
}

impl Default for VolcengineConfig {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            access_key: String::new(),
            resource_id: "volc.seedasr.sauc.duration".to_string(),
            ark_api_key: String::new(),
            ark_model_id: String::new(),
        }
    }
}

impl VolcengineConfig {
    /// Whether ASR credentials are complete enough to attempt an upstream connection.
    #[must_use]
    pub fn asr_valid(&self) -> bool {
        !self.app_key.is_empty() && !self.access_key.is_empty() && !self.resource_id.is_empty()
    }

    /// Whether Ark correction credentials are complete enough to attempt a rewrite call.
    #[must_use]
    pub fn ark_valid(&self) -> bool {
        !self.ark_api_key.is_empty() && !self.ark_model_id.is_empty()
    }
}

/// Configuration for the transcribe gateway.
///
/// All fields have sensible defaults except the Volcengine credentials, which must be
/// supplied for the upstream ASR client to function.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Preferred port for the HTTP/WS server (0 = auto-allocate).
    pub preferred_port: u16,

    /// Upstream ASR and LLM correction credentials.
    pub volcengine: VolcengineConfig,

    /// Default idle timeout (seconds) for a transcribe session when the client does not
    /// supply `idle_timeout_sec` as a query parameter. Clamped to `[1, 600]` at use.
    pub transcribe_ws_idle_timeout_sec: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 0,
            volcengine: VolcengineConfig::default(),
            transcribe_ws_idle_timeout_sec: 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_is_sensible() {
        let config = Config::default();
        assert_eq!(config.preferred_port, 0);
        assert!((config.transcribe_ws_idle_timeout_sec - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.volcengine.resource_id, "volc.seedasr.sauc.duration");
    }

    #[test]
    fn volcengine_valid_requires_all_asr_fields() {
        let mut volc = VolcengineConfig::default();
        assert!(!volc.asr_valid());
        volc.app_key = "key".into();
        volc.access_key = "secret".into();
        assert!(volc.asr_valid());
    }

    #[test]
    fn ark_valid_requires_api_key_and_model() {
        let mut volc = VolcengineConfig::default();
        assert!(!volc.ark_valid());
        volc.ark_api_key = "key".into();
        volc.ark_model_id = "model".into();
        assert!(volc.ark_valid());
    }
}
