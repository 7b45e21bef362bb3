use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::{stream_with, validate_with, ProviderClient, StreamEmitter, StreamSink};
use crate::services::prompt_builder::PromptPayload;
use crate::types::config::EndpointConfig;
use crate::types::messages::KeyValidation;
use crate::types::settings::ProviderKind;

const REFERER: &str = "https://unslop.me";
const TITLE: &str = "Unslop";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

/// OpenRouter chat-completions client. Bearer credential, system/user message pair.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    url: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(client: Client, endpoint: &EndpointConfig) -> Self {
        Self {
            client,
            url: endpoint.base_url.clone(),
            model: endpoint.model.clone(),
        }
    }

    fn post(&self, api_key: &str) -> reqwest::RequestBuilder {
        self.client
            .post(&self.url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
    }

    /// Text of one streamed record: `choices[0].delta.content`.
    pub fn extract_text(record: &Value) -> Option<&str> {
        record
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
    }
}

#[async_trait]
impl ProviderClient for OpenRouterClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    async fn validate_key(&self, api_key: &str) -> KeyValidation {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: "Hi",
            }],
            max_tokens: Some(5),
            stream: false,
        };
        validate_with(self.post(api_key).json(&body)).await
    }

    async fn stream_generate(
        &self,
        api_key: &str,
        prompt: &PromptPayload,
        sink: &mut (dyn StreamSink + Send),
    ) {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: None,
            stream: true,
        };

        let mut emitter = StreamEmitter::new(sink);
        stream_with(
            ProviderKind::OpenRouter,
            self.post(api_key).json(&body),
            Self::extract_text,
            &mut emitter,
        )
        .await;
    }
}
