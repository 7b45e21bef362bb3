//! Relay Channel Handler.
//!
//! Accepts `unslop-stream` ports, answers each `UNSLOP` request by resolving
//! settings, persona and credential from storage, then relays the chosen
//! provider's stream back over the same port. Every request ends in exactly
//! one `STREAM_DONE` or `STREAM_ERROR` while the port is alive; faults inside a
//! dispatch are reported as `Unexpected error: …` instead of tearing down the
//! relay.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::port::{self, PortEvent, PortSender};
use super::stream_client::Connector;
use super::{ClientPort, RelayPort};
use crate::app::App;
use crate::providers::StreamSink;
use crate::services::prompt_builder::{build_user_message, PromptPayload};
use crate::types::errors::StorageError;
use crate::types::messages::{PortRequest, StreamMessage, STREAM_PORT_NAME};
use crate::types::settings::ProviderKind;

pub const PERSONA_NOT_FOUND: &str = "Persona not found.";

/// Error text for a provider with no usable key.
pub fn missing_key_message(kind: ProviderKind) -> String {
    format!(
        "No {} API key configured. Click the Unslop extension icon to set one up.",
        kind.display_name()
    )
}

/// Lifecycle of one request on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    SettingsResolved,
    Dispatched,
    Terminated,
}

/// Delivers stream callbacks onto a port.
///
/// The first failed delivery cancels the sink: later callbacks become no-ops
/// and providers see `is_active() == false`.
#[derive(Clone)]
pub struct ChannelSink {
    sender: PortSender<StreamMessage>,
    cancel: CancellationToken,
    terminated: Arc<AtomicBool>,
}

impl ChannelSink {
    pub fn new(sender: PortSender<StreamMessage>) -> Self {
        Self {
            sender,
            cancel: CancellationToken::new(),
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether a terminal event has been handed to the port.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn deliver(&self, message: StreamMessage) {
        if self.cancel.is_cancelled() {
            return;
        }
        if message.is_terminal() {
            if self.terminated.swap(true, Ordering::SeqCst) {
                return;
            }
        } else if self.is_terminated() {
            return;
        }
        if let Err(e) = self.sender.post_message(message) {
            tracing::warn!(error = %e, "listener gone, dropping stream delivery");
            self.cancel.cancel();
        }
    }
}

impl StreamSink for ChannelSink {
    fn on_chunk(&mut self, text: &str) {
        self.deliver(StreamMessage::chunk(text));
    }

    fn on_done(&mut self) {
        tracing::info!("stream done");
        self.deliver(StreamMessage::StreamDone);
    }

    fn on_error(&mut self, error: &str) {
        tracing::info!(%error, "stream failed");
        self.deliver(StreamMessage::error(error));
    }

    fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.is_terminated() && self.sender.is_connected()
    }
}

/// Background-side handler for stream ports.
#[derive(Clone)]
pub struct RelayHandler {
    app: Arc<App>,
}

impl RelayHandler {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    /// Takes ownership of a newly opened port.
    ///
    /// Ports with another name are ignored and `false` is returned; otherwise a
    /// listener task is spawned for the port and `true` is returned. Must be
    /// called inside a tokio runtime.
    pub fn on_connect(&self, port: RelayPort) -> bool {
        if port.name() != STREAM_PORT_NAME {
            tracing::debug!(name = port.name(), "ignoring port");
            return false;
        }

        let channel = Uuid::new_v4();
        let span = tracing::info_span!("relay", %channel);
        let app = self.app.clone();
        let (sender, mut receiver) = port.split();

        tokio::spawn(
            async move {
                tracing::debug!("channel opened");
                while let Some(PortEvent::Message(request)) = receiver.recv().await {
                    let PortRequest::Unslop { text, persona_id } = request;
                    let sink = ChannelSink::new(sender.clone());
                    relay_request(app.clone(), text, persona_id, sink).await;
                }
                tracing::debug!("channel closed");
            }
            .instrument(span),
        );
        true
    }
}

/// Runs one request in its own task so that a panic still yields a terminal event.
async fn relay_request(app: Arc<App>, text: String, persona_id: String, sink: ChannelSink) {
    let task_sink = sink.clone();
    let handle = tokio::spawn(
        async move {
            let mut sink = task_sink;
            dispatch(&app, text, persona_id, &mut sink).await
        }
        .in_current_span(),
    );

    let fault = match handle.await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(e) => Some(join_error_message(e)),
    };

    let mut sink = sink;
    if let Some(fault) = fault {
        tracing::warn!(%fault, "dispatch failed");
        sink.on_error(&format!("Unexpected error: {}", fault));
    } else if !sink.is_terminated() && sink.is_active() {
        sink.on_error("Unexpected error: stream ended without a result");
    }
}

async fn dispatch(
    app: &App,
    text: String,
    persona_id: String,
    sink: &mut ChannelSink,
) -> Result<(), StorageError> {
    let mut state = RelayState::Idle;

    let settings = app.storage_call(|s| s.get_settings()).await?;
    let kind = settings.provider;
    advance(&mut state, RelayState::SettingsResolved);

    if kind == ProviderKind::Mock {
        drop(settings);
        let prompt = PromptPayload {
            system: String::new(),
            user: build_user_message(&text),
        };
        advance(&mut state, RelayState::Dispatched);
        app.provider(kind).stream_generate("", &prompt, sink).await;
        advance(&mut state, RelayState::Terminated);
        return Ok(());
    }

    let lookup = persona_id.clone();
    let Some(persona) = app
        .storage_call(move |s| s.get_persona_by_id(&lookup))
        .await?
    else {
        tracing::debug!(%persona_id, "unknown persona");
        sink.on_error(PERSONA_NOT_FOUND);
        advance(&mut state, RelayState::Terminated);
        return Ok(());
    };

    let Some(api_key) = settings.api_key_for(kind).map(|k| Zeroizing::new(k.to_string())) else {
        sink.on_error(&missing_key_message(kind));
        advance(&mut state, RelayState::Terminated);
        return Ok(());
    };
    drop(settings);

    let prompt = PromptPayload::for_persona(&persona, &text);
    advance(&mut state, RelayState::Dispatched);
    tracing::debug!(provider = %kind, persona = %persona.id, "dispatching");
    app.provider(kind).stream_generate(&api_key, &prompt, sink).await;
    advance(&mut state, RelayState::Terminated);
    Ok(())
}

fn advance(state: &mut RelayState, next: RelayState) {
    tracing::trace!(from = ?*state, to = ?next, "relay state");
    *state = next;
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        "request cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in dispatch".to_string()
    }
}

/// Opens in-process ports straight into a [`RelayHandler`].
#[derive(Clone)]
pub struct RelayConnector {
    handler: RelayHandler,
}

impl RelayConnector {
    pub fn new(handler: RelayHandler) -> Self {
        Self { handler }
    }
}

impl Connector for RelayConnector {
    fn connect(&self, name: &str) -> ClientPort {
        let (client, relay) = port::connect(name);
        self.handler.on_connect(relay);
        client
    }
}

