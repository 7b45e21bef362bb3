//! Line-delimited JSON host transport.
//!
//! Carries stream ports and one-shot messages between an external front end
//! and the relay over one reader/writer pair (stdin/stdout for the
//! `unslop-host` binary). One JSON object per line.
//!
//! Inbound:
//! `{"type":"CONNECT","port":1,"name":"unslop-stream"}`,
//! `{"type":"POST","port":1,"message":{"type":"UNSLOP",…}}`,
//! `{"type":"DISCONNECT","port":1}`,
//! `{"type":"SEND","id":7,"message":{"type":"VALIDATE_KEY",…}}`.
//!
//! Outbound:
//! `{"event":"ready","version":"…"}` once at startup,
//! `{"port":1,"message":{"type":"STREAM_CHUNK",…}}`,
//! `{"port":1,"event":"DISCONNECT"}`,
//! `{"id":7,"response":{…}}` and `{"error":"…"}` for frames that cannot be handled.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::app::App;
use crate::channel::{self, PortEvent, PortReceiver, PortSender, RelayHandler};
use crate::rpc_handler::handle_message;
use crate::types::errors::HostError;
use crate::types::messages::{PortRequest, RuntimeMessage, RuntimeResponse, StreamMessage};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum InboundFrame {
    Connect {
        port: Value,
        #[serde(default)]
        name: String,
    },
    Post {
        port: Value,
        message: Value,
    },
    Disconnect {
        port: Value,
    },
    Send {
        id: Value,
        message: Value,
    },
}

struct OpenPort {
    id: Value,
    serial: u64,
    sender: PortSender<PortRequest>,
}

/// A port whose relay end went away, reported by its forwarder.
struct ClosedPort {
    key: String,
    serial: u64,
}

pub struct Host {
    app: Arc<App>,
    relay: RelayHandler,
    ports: HashMap<String, OpenPort>,
    next_serial: u64,
    closed_tx: UnboundedSender<ClosedPort>,
    closed_rx: UnboundedReceiver<ClosedPort>,
}

impl Host {
    pub fn new(app: Arc<App>) -> Self {
        let relay = RelayHandler::new(app.clone());
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        Self {
            app,
            relay,
            ports: HashMap::new(),
            next_serial: 0,
            closed_tx,
            closed_rx,
        }
    }

    /// Serves frames from `reader` until end of input, writing replies to `writer`.
    ///
    /// Open ports are disconnected at end of input; the call returns once every
    /// pending outbound frame has been written.
    pub async fn run<R, W>(mut self, reader: R, writer: W) -> Result<(), HostError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out, out_rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_frames(writer, out_rx));

        let _ = out.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));
        tracing::info!("host ready");

        let mut lines = reader.lines();
        loop {
            tokio::select! {
                biased;
                Some(closed) = self.closed_rx.recv() => self.forget_port(closed),
                line = lines.next_line() => match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => self.handle_line(&line, &out),
                    None => break,
                },
            }
        }

        tracing::info!(open_ports = self.ports.len(), "input closed, shutting down");
        for (_, port) in self.ports.drain() {
            port.sender.disconnect();
        }
        drop(out);

        writer_task
            .await
            .map_err(|e| HostError::Io(std::io::Error::other(e.to_string())))?
    }

    fn handle_line(&mut self, line: &str, out: &UnboundedSender<Value>) {
        let frame: InboundFrame = match serde_json::from_str(line) {
            Ok(f) => f,
            Err(e) => {
                send_error(out, format!("parse error: {}", e));
                return;
            }
        };

        match frame {
            InboundFrame::Connect { port, name } => self.open_port(port, &name, out),
            InboundFrame::Post { port, message } => self.post(port, message, out),
            InboundFrame::Disconnect { port } => {
                if let Some(open) = self.ports.remove(&port_key(&port)) {
                    tracing::debug!(port = %open.id, "front end disconnected port");
                    open.sender.disconnect();
                }
            }
            InboundFrame::Send { id, message } => {
                let app = self.app.clone();
                let out = out.clone();
                tokio::spawn(async move {
                    let response = match serde_json::from_value::<RuntimeMessage>(message) {
                        Ok(message) => handle_message(&app, message).await,
                        Err(e) => RuntimeResponse::Error {
                            error: format!("invalid message: {}", e),
                        },
                    };
                    let _ = out.send(json!({"id": id, "response": response}));
                });
            }
        }
    }

    fn open_port(&mut self, id: Value, name: &str, out: &UnboundedSender<Value>) {
        let key = port_key(&id);
        if self.ports.contains_key(&key) {
            send_error(out, format!("port {} already open", key));
            return;
        }

        let (client, relay) = channel::connect::<PortRequest, StreamMessage>(name);
        if !self.relay.on_connect(relay) {
            tracing::debug!(port = %key, name, "no listener for port");
        }

        self.next_serial += 1;
        let serial = self.next_serial;
        let closed = ClosedPort {
            key: key.clone(),
            serial,
        };
        let (sender, receiver) = client.split();
        tokio::spawn(forward_port(
            id.clone(),
            receiver,
            out.clone(),
            closed,
            self.closed_tx.clone(),
        ));
        self.ports.insert(key, OpenPort { id, serial, sender });
    }

    /// Drops the entry of a port whose relay end disconnected, unless the id was reopened since.
    fn forget_port(&mut self, closed: ClosedPort) {
        if self
            .ports
            .get(&closed.key)
            .is_some_and(|open| open.serial == closed.serial)
        {
            self.ports.remove(&closed.key);
            tracing::debug!(port = %closed.key, "relay closed port");
        }
    }

    fn post(&mut self, id: Value, message: Value, out: &UnboundedSender<Value>) {
        let key = port_key(&id);
        let Some(open) = self.ports.get(&key) else {
            send_error(out, format!("unknown port {}", key));
            return;
        };
        let request = match serde_json::from_value::<PortRequest>(message) {
            Ok(r) => r,
            Err(e) => {
                send_error(out, format!("invalid port message: {}", e));
                return;
            }
        };
        if let Err(e) = open.sender.post_message(request) {
            send_error(out, format!("port {}: {}", key, e));
        }
    }
}

fn port_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn send_error(out: &UnboundedSender<Value>, error: String) {
    tracing::warn!(%error, "rejected host frame");
    let _ = out.send(json!({"error": error}));
}

async fn forward_port(
    id: Value,
    mut receiver: PortReceiver<StreamMessage>,
    out: UnboundedSender<Value>,
    closed: ClosedPort,
    closed_tx: UnboundedSender<ClosedPort>,
) {
    while let Some(event) = receiver.recv().await {
        match event {
            PortEvent::Message(message) => {
                if out.send(json!({"port": id, "message": message})).is_err() {
                    break;
                }
            }
            PortEvent::Disconnected => {
                // Ordered before the event: a CONNECT reusing the id must find the entry gone.
                let _ = closed_tx.send(closed);
                let _ = out.send(json!({"port": id, "event": "DISCONNECT"}));
                break;
            }
        }
    }
}

async fn write_frames<W>(mut writer: W, mut frames: UnboundedReceiver<Value>) -> Result<(), HostError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        let mut line = serde_json::to_vec(&frame)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
