//! Wire shapes exchanged between the content side and the relay.
//!
//! Port traffic (`PortRequest` in, `StreamMessage` out) carries one streamed
//! generation; `RuntimeMessage`/`RuntimeResponse` are one-shot request/response pairs.

use serde::{Deserialize, Serialize};

use super::persona::{NewPersona, Persona, PersonaUpdate};
use super::settings::{ProviderKind, ProviderSettings};

/// Name of the long-lived port that carries the generation protocol.
pub const STREAM_PORT_NAME: &str = "unslop-stream";

/// Source text plus the persona shaping its rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub text: String,
    pub persona_id: String,
}

impl GenerationRequest {
    /// Builds a request from raw selected text. Returns `None` when nothing remains after trimming.
    pub fn new(text: &str, persona_id: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            persona_id: persona_id.to_string(),
        })
    }
}

/// Messages posted by the content side onto the stream port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PortRequest {
    #[serde(rename = "UNSLOP", rename_all = "camelCase")]
    Unslop { text: String, persona_id: String },
}

impl From<&GenerationRequest> for PortRequest {
    fn from(req: &GenerationRequest) -> Self {
        PortRequest::Unslop {
            text: req.text.clone(),
            persona_id: req.persona_id.clone(),
        }
    }
}

/// Normalized stream events relayed back to the content side.
///
/// A request produces zero or more `StreamChunk` followed by exactly one
/// `StreamDone` or `StreamError`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum StreamMessage {
    #[serde(rename = "STREAM_CHUNK")]
    StreamChunk { text: String },
    #[serde(rename = "STREAM_DONE")]
    StreamDone,
    #[serde(rename = "STREAM_ERROR")]
    StreamError { error: String },
}

impl StreamMessage {
    pub fn chunk(text: impl Into<String>) -> Self {
        StreamMessage::StreamChunk { text: text.into() }
    }

    pub fn error(error: impl Into<String>) -> Self {
        StreamMessage::StreamError {
            error: error.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamMessage::StreamChunk { .. })
    }
}

/// Result of a credential check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeyValidation {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// One-shot messages answered with a single `RuntimeResponse`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeMessage {
    #[serde(rename_all = "camelCase")]
    ValidateKey {
        api_key: String,
        #[serde(default)]
        provider: ProviderKind,
    },
    GetPersonas,
    AddPersona {
        persona: NewPersona,
    },
    UpdatePersona {
        id: String,
        updates: PersonaUpdate,
    },
    DeletePersona {
        id: String,
    },
    GetSettings,
    SetSettings {
        settings: ProviderSettings,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeResponse {
    ValidateKeyResponse {
        valid: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Personas {
        personas: Vec<Persona>,
    },
    Persona {
        persona: Persona,
    },
    Settings {
        settings: ProviderSettings,
    },
    Ok,
    Error {
        error: String,
    },
}

impl From<KeyValidation> for RuntimeResponse {
    fn from(v: KeyValidation) -> Self {
        RuntimeResponse::ValidateKeyResponse {
            valid: v.valid,
            error: v.error,
        }
    }
}
