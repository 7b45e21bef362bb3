//! In-process duplex ports.
//!
//! A port pair is an ordered, reliable link between the content side and the
//! relay, named so the relay can ignore links meant for other features.
//! Either end may `disconnect()`; the peer then observes
//! [`PortEvent::Disconnected`] after every message already queued, and all
//! further posts from both ends fail. Dropping an end counts as an implicit
//! disconnect for the peer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::errors::ChannelError;

enum Frame<T> {
    Message(T),
    Disconnect,
}

/// Something observed on a port by its receiving end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent<T> {
    Message(T),
    /// The peer disconnected or went away.
    Disconnected,
}

/// Shared between both ends: once closed, nobody can post.
#[derive(Default)]
struct Link {
    closed: AtomicBool,
}

impl Link {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns `true` if this call closed the link.
    fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }
}

/// Sending half of one end. Cheap to clone.
pub struct PortSender<T> {
    tx: mpsc::UnboundedSender<Frame<T>>,
    link: Arc<Link>,
    local: CancellationToken,
}

impl<T> Clone for PortSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            link: self.link.clone(),
            local: self.local.clone(),
        }
    }
}

impl<T> PortSender<T> {
    /// Queues `message` for the peer.
    ///
    /// # Errors
    /// `ChannelError::Disconnected` once either end disconnected or the peer was dropped.
    pub fn post_message(&self, message: T) -> Result<(), ChannelError> {
        if self.link.is_closed() {
            return Err(ChannelError::Disconnected);
        }
        self.tx.send(Frame::Message(message)).map_err(|_| {
            self.link.close();
            ChannelError::Disconnected
        })
    }

    /// Disconnects this end. Idempotent; the peer is notified once.
    pub fn disconnect(&self) {
        self.local.cancel();
        if self.link.close() {
            let _ = self.tx.send(Frame::Disconnect);
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.link.is_closed() && !self.tx.is_closed()
    }
}

/// Receiving half of one end.
pub struct PortReceiver<T> {
    rx: mpsc::UnboundedReceiver<Frame<T>>,
    link: Arc<Link>,
    local: CancellationToken,
}

impl<T> PortReceiver<T> {
    /// Waits for the next event.
    ///
    /// Returns `None` once this end disconnected itself: a port does not hear
    /// about its own disconnect.
    pub async fn recv(&mut self) -> Option<PortEvent<T>> {
        if self.local.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.local.cancelled() => None,
            frame = self.rx.recv() => match frame {
                Some(Frame::Message(m)) => Some(PortEvent::Message(m)),
                Some(Frame::Disconnect) | None => {
                    self.link.close();
                    Some(PortEvent::Disconnected)
                }
            },
        }
    }
}

/// One end of a named port pair: posts `Out`, receives `In`.
pub struct Port<Out, In> {
    name: String,
    sender: PortSender<Out>,
    receiver: PortReceiver<In>,
}

impl<Out, In> Port<Out, In> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn post_message(&self, message: Out) -> Result<(), ChannelError> {
        self.sender.post_message(message)
    }

    pub fn disconnect(&self) {
        self.sender.disconnect();
    }

    pub async fn recv(&mut self) -> Option<PortEvent<In>> {
        self.receiver.recv().await
    }

    pub fn split(self) -> (PortSender<Out>, PortReceiver<In>) {
        (self.sender, self.receiver)
    }
}

/// Opens a port pair named `name`. The first end posts `A` and receives `B`.
pub fn connect<A, B>(name: &str) -> (Port<A, B>, Port<B, A>) {
    let (a_tx, a_rx) = mpsc::unbounded_channel::<Frame<A>>();
    let (b_tx, b_rx) = mpsc::unbounded_channel::<Frame<B>>();
    let link = Arc::new(Link::default());
    let first = CancellationToken::new();
    let second = CancellationToken::new();

    let near = Port {
        name: name.to_string(),
        sender: PortSender {
            tx: a_tx,
            link: link.clone(),
            local: first.clone(),
        },
        receiver: PortReceiver {
            rx: b_rx,
            link: link.clone(),
            local: first,
        },
    };
    let far = Port {
        name: name.to_string(),
        sender: PortSender {
            tx: b_tx,
            link: link.clone(),
            local: second.clone(),
        },
        receiver: PortReceiver {
            rx: a_rx,
            link,
            local: second,
        },
    };
    (near, far)
}
