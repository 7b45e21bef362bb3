//! Provider clients: one per upstream plus the offline mock.
//!
//! Every client exposes the same contract: `validate_key` and
//! `stream_generate`, the latter reporting through a [`StreamSink`].
//! The relay picks a client by [`ProviderKind`] via [`resolve_provider`].

pub mod gemini;
pub mod mock;
pub mod openrouter;
pub mod sse;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;

use crate::services::prompt_builder::PromptPayload;
use crate::types::config::HostConfig;
use crate::types::errors::ProviderError;
use crate::types::messages::KeyValidation;
use crate::types::settings::ProviderKind;

use self::sse::{data_payload, SseLineDecoder};

pub use gemini::GeminiClient;
pub use mock::MockProvider;
pub use openrouter::OpenRouterClient;

/// Receiver of normalized stream callbacks.
pub trait StreamSink {
    fn on_chunk(&mut self, text: &str);
    fn on_done(&mut self);
    fn on_error(&mut self, error: &str);

    /// `false` once nobody is listening any more; producers may stop early.
    fn is_active(&self) -> bool {
        true
    }
}

/// Wraps a sink and enforces the event order: chunks, then exactly one terminal.
///
/// Anything emitted after `done` or `error` is dropped.
pub struct StreamEmitter<'a> {
    sink: &'a mut (dyn StreamSink + Send),
    finished: bool,
}

impl<'a> StreamEmitter<'a> {
    pub fn new(sink: &'a mut (dyn StreamSink + Send)) -> Self {
        Self {
            sink,
            finished: false,
        }
    }

    pub fn chunk(&mut self, text: &str) {
        if !self.finished && !text.is_empty() {
            self.sink.on_chunk(text);
        }
    }

    pub fn done(&mut self) {
        if !self.finished {
            self.finished = true;
            self.sink.on_done();
        }
    }

    pub fn error(&mut self, error: &str) {
        if !self.finished {
            self.finished = true;
            self.sink.on_error(error);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.finished && self.sink.is_active()
    }
}

/// Uniform contract over every upstream.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Checks a credential with a minimal-cost request. Never fails; problems are
    /// reported as `valid: false` with a readable message.
    async fn validate_key(&self, api_key: &str) -> KeyValidation;

    /// Streams one generation into `sink`: zero or more chunks, then exactly one
    /// `on_done` or `on_error`.
    async fn stream_generate(
        &self,
        api_key: &str,
        prompt: &PromptPayload,
        sink: &mut (dyn StreamSink + Send),
    );
}

/// Builds the shared HTTP client used by the network providers.
pub fn build_http_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(concat!("unslop/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::HttpClient(e.to_string()))
}

/// Creates the client for `kind` using the endpoints in `config`.
pub fn resolve_provider(
    kind: ProviderKind,
    config: &HostConfig,
    http: reqwest::Client,
) -> Box<dyn ProviderClient> {
    match kind {
        ProviderKind::Gemini => Box::new(GeminiClient::new(http, &config.gemini)),
        ProviderKind::OpenRouter => Box::new(OpenRouterClient::new(http, &config.openrouter)),
        ProviderKind::Mock => Box::new(MockProvider::new(config.mock.delay_scale)),
    }
}

/// Transport failure text without the request URL, which can hold the Gemini key.
pub(crate) fn network_error(err: reqwest::Error) -> String {
    format!("Network error: {}", err.without_url())
}

/// Human-readable message for a non-success response: `error.message` from a
/// JSON body when present, otherwise `HTTP {status}`.
pub(crate) async fn error_message(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    let body: Option<Value> = response.json().await.ok();
    body.as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

/// Sends a validation request and interprets the outcome.
pub(crate) async fn validate_with(request: reqwest::RequestBuilder) -> KeyValidation {
    match request.send().await {
        Ok(response) if response.status().is_success() => KeyValidation::valid(),
        Ok(response) => KeyValidation::invalid(error_message(response).await),
        Err(e) => KeyValidation::invalid(network_error(e)),
    }
}

/// Sends a streaming request and relays each decoded record's text.
///
/// `extract` pulls the text out of one parsed record. Records that are not JSON
/// or lack the field are skipped without ending the stream.
pub(crate) async fn stream_with(
    provider: ProviderKind,
    request: reqwest::RequestBuilder,
    extract: fn(&Value) -> Option<&str>,
    emitter: &mut StreamEmitter<'_>,
) {
    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            emitter.error(&network_error(e));
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let message = error_message(response).await;
        tracing::warn!(%provider, %status, "upstream rejected stream request");
        emitter.error(&message);
        return;
    }

    let mut decoder = SseLineDecoder::new();
    let mut received = 0usize;
    let mut body = response.bytes_stream();

    while let Some(next) = body.next().await {
        let bytes = match next {
            Ok(b) => b,
            Err(e) => {
                emitter.error(&network_error(e));
                return;
            }
        };
        received += bytes.len();

        for line in decoder.push(&bytes) {
            emit_record(&line, extract, emitter);
        }

        if !emitter.is_active() {
            tracing::debug!(%provider, "sink inactive, abandoning upstream body");
            return;
        }
    }

    if let Some(line) = decoder.finish() {
        emit_record(&line, extract, emitter);
    }

    if received == 0 {
        emitter.error("No response body");
    } else {
        emitter.done();
    }
}

fn emit_record(line: &str, extract: fn(&Value) -> Option<&str>, emitter: &mut StreamEmitter<'_>) {
    let Some(payload) = data_payload(line) else {
        return;
    };
    match serde_json::from_str::<Value>(payload) {
        Ok(record) => {
            if let Some(text) = extract(&record) {
                emitter.chunk(text);
            }
        }
        Err(e) => tracing::trace!(error = %e, "skipping malformed stream record"),
    }
}
