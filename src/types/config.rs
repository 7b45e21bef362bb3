use serde::{Deserialize, Serialize};

/// Top-level host configuration, stored as JSON in the platform config directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// SQLite file for personas and settings. `None` means `<data dir>/unslop.db`.
    pub database_path: Option<String>,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub gemini: EndpointConfig,
    pub openrouter: EndpointConfig,
    pub mock: MockConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_filter: "info".to_string(),
            gemini: EndpointConfig {
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.5-flash-lite".to_string(),
            },
            openrouter: EndpointConfig {
                base_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
                model: "openrouter/free".to_string(),
            },
            mock: MockConfig::default(),
        }
    }
}

/// Where and which model an upstream is called with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
    pub base_url: String,
    pub model: String,
}

/// Pacing of the offline mock provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MockConfig {
    /// Multiplier applied to every simulated delay; `0.0` streams instantly.
    pub delay_scale: f64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self { delay_scale: 1.0 }
    }
}
