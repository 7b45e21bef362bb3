//! Provider clients against a local mock upstream: framing, extraction and error paths.

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unslop::providers::{build_http_client, GeminiClient, OpenRouterClient, ProviderClient, StreamSink};
use unslop::services::prompt_builder::PromptPayload;
use unslop::types::config::EndpointConfig;

#[derive(Default)]
struct Recorder {
    chunks: Vec<String>,
    done: usize,
    errors: Vec<String>,
}

impl StreamSink for Recorder {
    fn on_chunk(&mut self, text: &str) {
        assert!(self.done == 0 && self.errors.is_empty(), "chunk after terminal");
        self.chunks.push(text.to_string());
    }

    fn on_done(&mut self) {
        self.done += 1;
    }

    fn on_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }
}

impl Recorder {
    fn text(&self) -> String {
        self.chunks.concat()
    }

    fn terminals(&self) -> usize {
        self.done + self.errors.len()
    }
}

fn prompt() -> PromptPayload {
    PromptPayload {
        system: "rules".to_string(),
        user: "Text to rewrite:\n\"\"\"\nhi\n\"\"\"".to_string(),
    }
}

fn gemini(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        build_http_client().unwrap(),
        &EndpointConfig {
            base_url: server.uri(),
            model: "test-model".to_string(),
        },
    )
}

fn openrouter(server: &MockServer) -> OpenRouterClient {
    OpenRouterClient::new(
        build_http_client().unwrap(),
        &EndpointConfig {
            base_url: format!("{}/chat/completions", server.uri()),
            model: "test/model".to_string(),
        },
    )
}

fn gemini_record(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"candidates":[{"content":{"parts":[{"text": text}]}}]})
    )
}

fn openrouter_record(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"choices":[{"delta":{"content": text}}]})
    )
}

fn sse(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

// ─── Gemini ───

#[tokio::test]
async fn test_gemini_streams_chunks_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(query_param("key", "g-key"))
        .and(body_partial_json(json!({"generationConfig": {"maxOutputTokens": 2048}})))
        .respond_with(sse(format!(
            "{}{}{}",
            gemini_record("Hey, "),
            gemini_record("just "),
            gemini_record("checking.")
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut sink = Recorder::default();
    gemini(&server).stream_generate("g-key", &prompt(), &mut sink).await;

    assert_eq!(sink.chunks, vec!["Hey, ", "just ", "checking."]);
    assert_eq!(sink.done, 1);
    assert!(sink.errors.is_empty());
}

#[tokio::test]
async fn test_gemini_sends_combined_prompt() {
    let server = MockServer::start().await;
    let combined = prompt().combined();
    Mock::given(method("POST"))
        .and(path("/models/test-model:streamGenerateContent"))
        .and(body_partial_json(json!({"contents": [{"parts": [{"text": combined}]}]})))
        .respond_with(sse(gemini_record("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let mut sink = Recorder::default();
    gemini(&server).stream_generate("k", &prompt(), &mut sink).await;
    assert_eq!(sink.text(), "ok");
}

#[tokio::test]
async fn test_gemini_flushes_residual_line() {
    let server = MockServer::start().await;
    let tail = gemini_record("tail");
    let body = format!("{}{}", gemini_record("head "), tail.trim_end());
    Mock::given(method("POST"))
        .respond_with(sse(body))
        .mount(&server)
        .await;

    let mut sink = Recorder::default();
    gemini(&server).stream_generate("k", &prompt(), &mut sink).await;
    assert_eq!(sink.text(), "head tail");
    assert_eq!(sink.done, 1);
}

#[tokio::test]
async fn test_gemini_http_error_uses_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"code": 400, "message": "API key not valid."}})),
        )
        .mount(&server)
        .await;

    let mut sink = Recorder::default();
    gemini(&server).stream_generate("bad", &prompt(), &mut sink).await;
    assert!(sink.chunks.is_empty());
    assert_eq!(sink.errors, vec!["API key not valid."]);
    assert_eq!(sink.done, 0);
}

#[tokio::test]
async fn test_gemini_validate_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .and(query_param("key", "good"))
        .and(body_partial_json(json!({"generationConfig": {"maxOutputTokens": 5}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .and(query_param("key", "bad"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"error": {"message": "Forbidden key"}})),
        )
        .mount(&server)
        .await;

    let client = gemini(&server);
    let ok = client.validate_key("good").await;
    assert!(ok.valid);
    assert!(ok.error.is_none());

    let bad = client.validate_key("bad").await;
    assert!(!bad.valid);
    assert_eq!(bad.error.as_deref(), Some("Forbidden key"));
}

// ─── OpenRouter ───

#[tokio::test]
async fn test_openrouter_streams_and_ignores_done_sentinel() {
    let server = MockServer::start().await;
    let body = format!(
        ": OPENROUTER PROCESSING\n\n{}{}data: [DONE]\n\n",
        openrouter_record("Real "),
        openrouter_record("talk")
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer or-key"))
        .and(header("http-referer", "https://unslop.me"))
        .and(header("x-title", "Unslop"))
        .and(body_partial_json(json!({"model": "test/model", "stream": true})))
        .respond_with(sse(body))
        .expect(1)
        .mount(&server)
        .await;

    let mut sink = Recorder::default();
    openrouter(&server)
        .stream_generate("or-key", &prompt(), &mut sink)
        .await;

    assert_eq!(sink.chunks, vec!["Real ", "talk"]);
    assert_eq!(sink.done, 1);
}

#[tokio::test]
async fn test_openrouter_sends_system_and_user_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"messages": [
            {"role": "system", "content": "rules"},
            {"role": "user", "content": prompt().user},
        ]})))
        .respond_with(sse(openrouter_record("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let mut sink = Recorder::default();
    openrouter(&server).stream_generate("k", &prompt(), &mut sink).await;
    assert_eq!(sink.text(), "ok");
}

#[tokio::test]
async fn test_openrouter_skips_malformed_records() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {{not json\n\n{}data: {}\n\n{}",
        openrouter_record("one "),
        json!({"choices": [{"delta": {}}]}),
        openrouter_record("two")
    );
    Mock::given(method("POST"))
        .respond_with(sse(body))
        .mount(&server)
        .await;

    let mut sink = Recorder::default();
    openrouter(&server).stream_generate("k", &prompt(), &mut sink).await;
    assert_eq!(sink.chunks, vec!["one ", "two"]);
    assert_eq!(sink.terminals(), 1);
    assert_eq!(sink.done, 1);
}

#[tokio::test]
async fn test_openrouter_error_without_json_body_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let mut sink = Recorder::default();
    openrouter(&server).stream_generate("k", &prompt(), &mut sink).await;
    assert!(sink.chunks.is_empty());
    assert_eq!(sink.errors, vec!["HTTP 502"]);
}

#[tokio::test]
async fn test_empty_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(String::new()))
        .mount(&server)
        .await;

    let mut sink = Recorder::default();
    openrouter(&server).stream_generate("k", &prompt(), &mut sink).await;
    assert_eq!(sink.errors, vec!["No response body"]);
    assert_eq!(sink.done, 0);
}

#[tokio::test]
async fn test_unreachable_upstream_is_network_error() {
    let client = OpenRouterClient::new(
        build_http_client().unwrap(),
        &EndpointConfig {
            base_url: "http://127.0.0.1:1/chat/completions".to_string(),
            model: "m".to_string(),
        },
    );

    let mut sink = Recorder::default();
    client.stream_generate("k", &prompt(), &mut sink).await;
    assert_eq!(sink.terminals(), 1);
    assert!(sink.errors[0].starts_with("Network error: "));

    let validation = client.validate_key("k").await;
    assert!(!validation.valid);
    assert!(validation.error.unwrap().starts_with("Network error: "));
}

#[tokio::test]
async fn test_gemini_network_errors_never_contain_the_key() {
    let client = GeminiClient::new(
        build_http_client().unwrap(),
        &EndpointConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            model: "m".to_string(),
        },
    );

    let mut sink = Recorder::default();
    client.stream_generate("SECRETKEY123", &prompt(), &mut sink).await;
    assert_eq!(sink.errors.len(), 1);
    assert!(sink.errors[0].starts_with("Network error: "));
    assert!(!sink.errors[0].contains("SECRETKEY123"), "{}", sink.errors[0]);

    let error = client.validate_key("SECRETKEY123").await.error.unwrap();
    assert!(error.starts_with("Network error: "));
    assert!(!error.contains("SECRETKEY123"), "{}", error);
}

/// Reads one HTTP request, headers and `content-length` body, off `socket`.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a full request");
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
        let body_len = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + body_len {
            return;
        }
    }
}

#[tokio::test]
async fn test_connection_dropped_mid_stream_is_one_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let upstream = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        let record = openrouter_record("hi");
        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: 1000\r\n\r\n";
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(record.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        // Closing here leaves the declared body short.
    });

    let client = OpenRouterClient::new(
        build_http_client().unwrap(),
        &EndpointConfig {
            base_url: format!("http://{}/chat/completions", addr),
            model: "m".to_string(),
        },
    );
    let mut sink = Recorder::default();
    client.stream_generate("k", &prompt(), &mut sink).await;
    upstream.await.unwrap();

    assert_eq!(sink.chunks, vec!["hi"]);
    assert_eq!(sink.done, 0);
    assert_eq!(sink.errors.len(), 1);
    assert!(sink.errors[0].starts_with("Network error: "), "{}", sink.errors[0]);
}

#[tokio::test]
async fn test_openrouter_validate_key_uses_tiny_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer good"))
        .and(body_partial_json(json!({"max_tokens": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(openrouter(&server).validate_key("good").await.valid);
}
