//! Relay Channel Handler: request resolution order, relayed streams and fault containment.

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unslop::app::App;
use unslop::channel::relay_handler::{missing_key_message, PERSONA_NOT_FOUND};
use unslop::channel::{connect, ChannelSink, ClientPort, PortEvent, RelayHandler};
use unslop::database::Database;
use unslop::providers::mock::MOCK_RESPONSES;
use unslop::providers::StreamSink;
use unslop::services::storage::{Storage, StorageTrait};
use unslop::types::config::HostConfig;
use unslop::types::errors::StorageError;
use unslop::types::messages::{PortRequest, StreamMessage, STREAM_PORT_NAME};
use unslop::types::persona::{NewPersona, Persona, PersonaUpdate};
use unslop::types::settings::{ProviderKind, ProviderSettings};

fn instant_config() -> HostConfig {
    let mut config = HostConfig::default();
    config.mock.delay_scale = 0.0;
    config
}

fn app_with(config: HostConfig, settings: ProviderSettings) -> Arc<App> {
    let app = App::in_memory(config).unwrap();
    app.storage.set_settings(&settings).unwrap();
    Arc::new(app)
}

fn settings_for(provider: ProviderKind) -> ProviderSettings {
    let mut settings = ProviderSettings::default();
    settings.provider = provider;
    settings
}

fn open(app: &Arc<App>) -> ClientPort {
    let (client, relay) = connect(STREAM_PORT_NAME);
    assert!(RelayHandler::new(app.clone()).on_connect(relay));
    client
}

fn unslop(text: &str, persona_id: &str) -> PortRequest {
    PortRequest::Unslop {
        text: text.to_string(),
        persona_id: persona_id.to_string(),
    }
}

/// Reads events up to and including the first terminal one.
async fn collect(port: &mut ClientPort) -> Vec<StreamMessage> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(30), port.recv())
            .await
            .expect("timed out waiting for relay");
        match event {
            Some(PortEvent::Message(message)) => {
                let terminal = message.is_terminal();
                events.push(message);
                if terminal {
                    return events;
                }
            }
            other => panic!("unexpected port event: {:?}", other),
        }
    }
}

fn streamed_text(events: &[StreamMessage]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamMessage::StreamChunk { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

// ─── Mock provider ───

#[tokio::test]
async fn test_mock_stream_ends_with_done() {
    let app = app_with(instant_config(), settings_for(ProviderKind::Mock));
    let mut port = open(&app);
    port.post_message(unslop("Please leverage synergies", "default"))
        .unwrap();

    let events = collect(&mut port).await;
    assert_eq!(events.last(), Some(&StreamMessage::StreamDone));
    assert!(MOCK_RESPONSES.contains(&streamed_text(&events).as_str()));
}

#[tokio::test]
async fn test_mock_ignores_unknown_persona_and_missing_key() {
    let app = app_with(instant_config(), settings_for(ProviderKind::Mock));
    let mut port = open(&app);
    port.post_message(unslop("text", "no-such-persona")).unwrap();

    let events = collect(&mut port).await;
    assert_eq!(events.last(), Some(&StreamMessage::StreamDone));
}

// ─── Resolution errors ───

#[tokio::test]
async fn test_unknown_persona_is_reported_before_key_check() {
    let app = app_with(instant_config(), settings_for(ProviderKind::Gemini));
    let mut port = open(&app);
    port.post_message(unslop("text", "ghost")).unwrap();

    assert_eq!(
        collect(&mut port).await,
        vec![StreamMessage::error(PERSONA_NOT_FOUND)]
    );
}

#[rstest]
#[case(ProviderKind::Gemini, "No Gemini API key configured. Click the Unslop extension icon to set one up.")]
#[case(ProviderKind::OpenRouter, "No OpenRouter API key configured. Click the Unslop extension icon to set one up.")]
#[tokio::test]
async fn test_missing_key_names_provider(#[case] provider: ProviderKind, #[case] expected: &str) {
    let mut settings = settings_for(provider);
    // A key for the other provider does not count.
    settings.gemini_api_key = if provider == ProviderKind::OpenRouter {
        "g-key".to_string()
    } else {
        String::new()
    };
    settings.openrouter_api_key = "   ".to_string();
    let app = app_with(instant_config(), settings);
    let mut port = open(&app);
    port.post_message(unslop("text", "default")).unwrap();

    assert_eq!(missing_key_message(provider), expected);
    assert_eq!(
        collect(&mut port).await,
        vec![StreamMessage::error(expected)]
    );
}

// ─── Network providers ───

#[tokio::test]
async fn test_gemini_stream_is_relayed_verbatim() {
    let server = MockServer::start().await;
    let body = [
        json!({"candidates":[{"content":{"parts":[{"text":"Hey, "}]}}]}),
        json!({"candidates":[{"content":{"parts":[{"text":"quick one."}]}}]}),
    ]
    .iter()
    .map(|r| format!("data: {}\r\n\r\n", r))
    .collect::<String>();
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash-lite:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = instant_config();
    config.gemini.base_url = server.uri();
    let mut settings = settings_for(ProviderKind::Gemini);
    settings.gemini_api_key = "g-key".to_string();
    let app = app_with(config, settings);

    let mut port = open(&app);
    port.post_message(unslop("Per my last email", "default"))
        .unwrap();

    assert_eq!(
        collect(&mut port).await,
        vec![
            StreamMessage::chunk("Hey, "),
            StreamMessage::chunk("quick one."),
            StreamMessage::StreamDone,
        ]
    );
}

#[tokio::test]
async fn test_upstream_rejection_becomes_stream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "No auth credentials found"}})),
        )
        .mount(&server)
        .await;

    let mut config = instant_config();
    config.openrouter.base_url = server.uri();
    let mut settings = settings_for(ProviderKind::OpenRouter);
    settings.openrouter_api_key = "or-key".to_string();
    let app = app_with(config, settings);

    let mut port = open(&app);
    port.post_message(unslop("text", "default")).unwrap();
    assert_eq!(
        collect(&mut port).await,
        vec![StreamMessage::error("No auth credentials found")]
    );
}

#[tokio::test]
async fn test_settings_are_read_fresh_per_request() {
    let app = app_with(instant_config(), settings_for(ProviderKind::Gemini));
    let mut port = open(&app);

    port.post_message(unslop("text", "default")).unwrap();
    assert!(matches!(
        collect(&mut port).await.as_slice(),
        [StreamMessage::StreamError { .. }]
    ));

    app.storage
        .set_settings(&settings_for(ProviderKind::Mock))
        .unwrap();
    port.post_message(unslop("text", "default")).unwrap();
    assert_eq!(
        collect(&mut port).await.last(),
        Some(&StreamMessage::StreamDone)
    );
}

// ─── Channel lifecycle ───

#[tokio::test]
async fn test_other_port_names_are_ignored() {
    let app = app_with(instant_config(), settings_for(ProviderKind::Mock));
    let (mut client, relay) = connect::<PortRequest, StreamMessage>("something-else");
    assert!(!RelayHandler::new(app).on_connect(relay));
    assert_eq!(client.recv().await, Some(PortEvent::Disconnected));
}

#[tokio::test(start_paused = true)]
async fn test_client_disconnect_mid_stream_leaves_relay_healthy() {
    let mut config = HostConfig::default();
    config.mock.delay_scale = 1.0;
    let app = app_with(config, settings_for(ProviderKind::Mock));

    let mut port = open(&app);
    port.post_message(unslop("text", "default")).unwrap();
    for _ in 0..3 {
        match port.recv().await {
            Some(PortEvent::Message(StreamMessage::StreamChunk { .. })) => {}
            other => panic!("expected chunk, got {:?}", other),
        }
    }
    port.disconnect();
    assert_eq!(port.recv().await, None);

    let mut fresh = open(&app);
    fresh.post_message(unslop("again", "default")).unwrap();
    assert_eq!(
        collect(&mut fresh).await.last(),
        Some(&StreamMessage::StreamDone)
    );
}

// ─── Fault containment ───

struct BrokenStorage {
    panic: bool,
}

impl StorageTrait for BrokenStorage {
    fn get_personas(&self) -> Result<Vec<Persona>, StorageError> {
        Ok(vec![Persona::default_persona()])
    }
    fn set_personas(&self, _personas: &[Persona]) -> Result<(), StorageError> {
        Ok(())
    }
    fn add_persona(&self, _persona: NewPersona) -> Result<Persona, StorageError> {
        Err(StorageError::DatabaseError("read-only".to_string()))
    }
    fn update_persona(&self, _id: &str, _updates: &PersonaUpdate) -> Result<(), StorageError> {
        Ok(())
    }
    fn delete_persona(&self, _id: &str) -> Result<(), StorageError> {
        Ok(())
    }
    fn get_persona_by_id(&self, _id: &str) -> Result<Option<Persona>, StorageError> {
        Ok(Some(Persona::default_persona()))
    }
    fn get_settings(&self) -> Result<ProviderSettings, StorageError> {
        if self.panic {
            panic!("settings table vanished");
        }
        Err(StorageError::DatabaseError("disk I/O error".to_string()))
    }
    fn set_settings(&self, _settings: &ProviderSettings) -> Result<(), StorageError> {
        Ok(())
    }
}

fn broken_app(panic: bool) -> Arc<App> {
    Arc::new(App::with_storage(instant_config(), Arc::new(BrokenStorage { panic })).unwrap())
}

#[tokio::test]
async fn test_storage_error_becomes_unexpected_error() {
    let app = broken_app(false);
    let mut port = open(&app);
    port.post_message(unslop("text", "default")).unwrap();
    assert_eq!(
        collect(&mut port).await,
        vec![StreamMessage::error(
            "Unexpected error: Storage database error: disk I/O error"
        )]
    );
}

#[tokio::test]
async fn test_panic_in_dispatch_becomes_unexpected_error() {
    let app = broken_app(true);
    let mut port = open(&app);
    port.post_message(unslop("text", "default")).unwrap();
    assert_eq!(
        collect(&mut port).await,
        vec![StreamMessage::error("Unexpected error: settings table vanished")]
    );

    // The channel keeps serving after a fault.
    port.post_message(unslop("text", "default")).unwrap();
    assert_eq!(collect(&mut port).await.len(), 1);
}

/// Real storage whose settings read holds the calling thread.
struct SlowSettings {
    inner: Storage,
    delay: Duration,
}

impl StorageTrait for SlowSettings {
    fn get_personas(&self) -> Result<Vec<Persona>, StorageError> {
        self.inner.get_personas()
    }
    fn set_personas(&self, personas: &[Persona]) -> Result<(), StorageError> {
        self.inner.set_personas(personas)
    }
    fn add_persona(&self, persona: NewPersona) -> Result<Persona, StorageError> {
        self.inner.add_persona(persona)
    }
    fn update_persona(&self, id: &str, updates: &PersonaUpdate) -> Result<(), StorageError> {
        self.inner.update_persona(id, updates)
    }
    fn delete_persona(&self, id: &str) -> Result<(), StorageError> {
        self.inner.delete_persona(id)
    }
    fn get_persona_by_id(&self, id: &str) -> Result<Option<Persona>, StorageError> {
        self.inner.get_persona_by_id(id)
    }
    fn get_settings(&self) -> Result<ProviderSettings, StorageError> {
        std::thread::sleep(self.delay);
        self.inner.get_settings()
    }
    fn set_settings(&self, settings: &ProviderSettings) -> Result<(), StorageError> {
        self.inner.set_settings(settings)
    }
}

#[tokio::test]
async fn test_slow_storage_does_not_stall_the_runtime() {
    let inner = Storage::new(Arc::new(Database::open_in_memory().unwrap()));
    inner.set_settings(&settings_for(ProviderKind::Mock)).unwrap();
    let storage = SlowSettings {
        inner,
        delay: Duration::from_millis(400),
    };
    let app = Arc::new(App::with_storage(instant_config(), Arc::new(storage)).unwrap());

    let mut port = open(&app);
    port.post_message(unslop("text", "default")).unwrap();

    // Single-threaded runtime: this timer only fires on time if the read is off-thread.
    let started = std::time::Instant::now();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(
        started.elapsed() < Duration::from_millis(300),
        "runtime blocked for {:?}",
        started.elapsed()
    );

    assert_eq!(
        collect(&mut port).await.last(),
        Some(&StreamMessage::StreamDone)
    );
}

// ─── ChannelSink ───

#[tokio::test]
async fn test_sink_drops_everything_after_terminal() {
    let (mut client, relay) = connect::<PortRequest, StreamMessage>(STREAM_PORT_NAME);
    let (sender, _receiver) = relay.split();
    let mut sink = ChannelSink::new(sender);

    sink.on_chunk("a");
    sink.on_done();
    sink.on_chunk("late");
    sink.on_error("late error");
    assert!(sink.is_terminated());
    assert!(!sink.is_active());
    drop(sink);

    assert_eq!(
        client.recv().await,
        Some(PortEvent::Message(StreamMessage::chunk("a")))
    );
    assert_eq!(
        client.recv().await,
        Some(PortEvent::Message(StreamMessage::StreamDone))
    );
    assert_eq!(client.recv().await, Some(PortEvent::Disconnected));
}

#[tokio::test]
async fn test_sink_cancels_on_first_failed_delivery() {
    let (client, relay) = connect::<PortRequest, StreamMessage>(STREAM_PORT_NAME);
    let (sender, _receiver) = relay.split();
    let mut sink = ChannelSink::new(sender);
    let token = sink.cancellation();

    drop(client);
    assert!(!token.is_cancelled());
    sink.on_chunk("nobody listening");
    assert!(token.is_cancelled());
    assert!(!sink.is_active());

    // Later callbacks are no-ops, including the terminal one.
    sink.on_done();
    assert!(!sink.is_terminated());
}
