use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Upstream used to generate rewrites.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    OpenRouter,
    /// Offline canned responses, no network and no API key.
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Mock => "mock",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "Gemini",
            ProviderKind::OpenRouter => "OpenRouter",
            ProviderKind::Mock => "Test Mode",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Which provider is active and the credentials for each upstream.
///
/// Read fresh for every generation request; keys are wiped from memory on drop.
#[derive(Clone, Serialize, Deserialize, PartialEq, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[zeroize(skip)]
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default)]
    pub gemini_api_key_valid: bool,
    #[serde(default)]
    pub openrouter_api_key: String,
    #[serde(default)]
    pub openrouter_api_key_valid: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            gemini_api_key: String::new(),
            gemini_api_key_valid: false,
            openrouter_api_key: String::new(),
            openrouter_api_key_valid: false,
        }
    }
}

impl ProviderSettings {
    /// Returns the non-blank key configured for `kind`. The mock provider never has one.
    pub fn api_key_for(&self, kind: ProviderKind) -> Option<&str> {
        let key = match kind {
            ProviderKind::Gemini => self.gemini_api_key.as_str(),
            ProviderKind::OpenRouter => self.openrouter_api_key.as_str(),
            ProviderKind::Mock => return None,
        };
        if key.trim().is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

// Keys stay out of debug output and therefore out of logs.
impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("provider", &self.provider)
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("gemini_api_key_valid", &self.gemini_api_key_valid)
            .field("openrouter_api_key", &redact(&self.openrouter_api_key))
            .field("openrouter_api_key_valid", &self.openrouter_api_key_valid)
            .finish()
    }
}

fn redact(key: &str) -> &'static str {
    if key.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}
