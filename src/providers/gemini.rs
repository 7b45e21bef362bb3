use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::{stream_with, validate_with, ProviderClient, StreamEmitter, StreamSink};
use crate::services::prompt_builder::PromptPayload;
use crate::types::config::EndpointConfig;
use crate::types::messages::KeyValidation;
use crate::types::settings::ProviderKind;

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

impl<'a> GeminiRequest<'a> {
    fn new(prompt: &'a str, temperature: Option<f32>, max_output_tokens: u32) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens,
            },
        }
    }
}

/// Google Gemini client. The key travels as a query parameter and the prompt
/// is sent as one combined text.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(client: Client, endpoint: &EndpointConfig) -> Self {
        Self {
            client,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            model: endpoint.model.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    /// Text of one streamed record: `candidates[0].content.parts[0].text`.
    pub fn extract_text(record: &Value) -> Option<&str> {
        record
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn validate_key(&self, api_key: &str) -> KeyValidation {
        let request = self
            .client
            .post(self.method_url("generateContent"))
            .query(&[("key", api_key)])
            .json(&GeminiRequest::new("Hi", None, 5));
        validate_with(request).await
    }

    async fn stream_generate(
        &self,
        api_key: &str,
        prompt: &PromptPayload,
        sink: &mut (dyn StreamSink + Send),
    ) {
        let combined = prompt.combined();
        let request = self
            .client
            .post(self.method_url("streamGenerateContent"))
            .query(&[("alt", "sse"), ("key", api_key)])
            .json(&GeminiRequest::new(&combined, Some(1.0), 2048));

        let mut emitter = StreamEmitter::new(sink);
        stream_with(ProviderKind::Gemini, request, Self::extract_text, &mut emitter).await;
    }
}
