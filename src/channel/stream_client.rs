//! Channel Client: the content-side controller for one on-page rewrite.
//!
//! Owns a single [`StreamView`] state object, opens a fresh port per request,
//! and folds relay events into the view. Each opened channel captures the
//! generation counter current at its creation; events from an older
//! generation are discarded so a superseded stream can never write into the
//! current view.

use super::port::{PortEvent, PortReceiver, PortSender};
use super::ClientPort;
use crate::types::messages::{GenerationRequest, PortRequest, StreamMessage, STREAM_PORT_NAME};
use crate::types::persona::Persona;

pub const CONNECTION_LOST: &str = "Connection lost. Please try again.";

/// Opens ports to the relay.
pub trait Connector {
    fn connect(&self, name: &str) -> ClientPort;
}

/// Everything the popup renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamView {
    pub persona: Option<Persona>,
    pub source_text: String,
    pub accumulated_text: String,
    pub done: bool,
    pub error: Option<String>,
    pub visible: bool,
}

impl StreamView {
    pub fn is_streaming(&self) -> bool {
        self.visible && !self.done
    }
}

/// What one call to [`StreamClient::next_event`] applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    Chunk(String),
    Done,
    Error(String),
    /// The relay went away before a terminal event; `soft_done` when partial text was kept.
    Disconnected { soft_done: bool },
}

struct ActiveChannel {
    generation: u64,
    sender: PortSender<PortRequest>,
    receiver: PortReceiver<StreamMessage>,
}

type RenderHook = Box<dyn FnMut(&StreamView) + Send>;

pub struct StreamClient<C: Connector> {
    connector: C,
    view: StreamView,
    active: Option<ActiveChannel>,
    generation: u64,
    render: Option<RenderHook>,
}

impl<C: Connector> StreamClient<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            view: StreamView::default(),
            active: None,
            generation: 0,
            render: None,
        }
    }

    /// Installs a hook called after every state change.
    pub fn with_render_hook(mut self, hook: impl FnMut(&StreamView) + Send + 'static) -> Self {
        self.render = Some(Box::new(hook));
        self
    }

    pub fn view(&self) -> &StreamView {
        &self.view
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_channel(&self) -> bool {
        self.active.is_some()
    }

    /// Starts a rewrite of `text` in the style of `persona`.
    ///
    /// Any previous channel is torn down first. Returns `false` and leaves the
    /// view untouched when `text` is blank.
    pub fn start_streaming(&mut self, persona: &Persona, text: &str) -> bool {
        let Some(request) = GenerationRequest::new(text, &persona.id) else {
            return false;
        };

        self.teardown();
        self.generation += 1;
        self.view = StreamView {
            persona: Some(persona.clone()),
            source_text: request.text.clone(),
            visible: true,
            ..StreamView::default()
        };

        let (sender, receiver) = self.connector.connect(STREAM_PORT_NAME).split();
        if let Err(e) = sender.post_message(PortRequest::from(&request)) {
            // Surfaces as a disconnect on the next event.
            tracing::debug!(error = %e, "request not delivered");
        }
        self.active = Some(ActiveChannel {
            generation: self.generation,
            sender,
            receiver,
        });
        self.emit();
        true
    }

    /// Restarts with the last persona and text, if there was a request.
    pub fn retry(&mut self) -> bool {
        let Some(persona) = self.view.persona.clone() else {
            return false;
        };
        let text = self.view.source_text.clone();
        self.start_streaming(&persona, &text)
    }

    /// Hides the view and drops the channel without treating it as a lost connection.
    pub fn close(&mut self) {
        self.teardown();
        self.view = StreamView::default();
        self.emit();
    }

    /// Waits for one event on the active channel and applies it.
    ///
    /// Returns `None` when there is no channel or the event belonged to a
    /// superseded generation.
    pub async fn next_event(&mut self) -> Option<StreamUpdate> {
        let channel = self.active.as_mut()?;
        let generation = channel.generation;
        let event = channel.receiver.recv().await;

        if generation != self.generation {
            return None;
        }

        let update = match event {
            Some(PortEvent::Message(message)) => self.apply_message(message)?,
            Some(PortEvent::Disconnected) | None => {
                self.active = None;
                self.apply_disconnect()?
            }
        };
        self.emit();
        Some(update)
    }

    /// Applies events until the view reaches a terminal state or the channel is gone.
    pub async fn run_to_completion(&mut self) {
        while self.active.is_some() && !self.view.done {
            self.next_event().await;
        }
    }

    fn apply_message(&mut self, message: StreamMessage) -> Option<StreamUpdate> {
        if self.view.done {
            return None;
        }
        match message {
            StreamMessage::StreamChunk { text } => {
                self.view.accumulated_text.push_str(&text);
                Some(StreamUpdate::Chunk(text))
            }
            StreamMessage::StreamDone => {
                self.view.done = true;
                Some(StreamUpdate::Done)
            }
            StreamMessage::StreamError { error } => {
                self.view.error = Some(error.clone());
                self.view.done = true;
                Some(StreamUpdate::Error(error))
            }
        }
    }

    fn apply_disconnect(&mut self) -> Option<StreamUpdate> {
        if self.view.done {
            return None;
        }
        self.view.done = true;
        let soft_done = !self.view.accumulated_text.is_empty();
        if !soft_done {
            self.view.error = Some(CONNECTION_LOST.to_string());
        }
        tracing::debug!(soft_done, "stream channel lost");
        Some(StreamUpdate::Disconnected { soft_done })
    }

    /// Clears the channel reference before disconnecting it.
    fn teardown(&mut self) {
        if let Some(channel) = self.active.take() {
            channel.sender.disconnect();
        }
    }

    fn emit(&mut self) {
        if let Some(render) = self.render.as_mut() {
            render(&self.view);
        }
    }
}
