//! Stream channels between the content side and the relay.
//!
//! [`port`] is the duplex transport, [`relay_handler`] answers generation
//! requests arriving on it, and [`stream_client`] drives one on-page
//! streaming session from the content side.

pub mod port;
pub mod relay_handler;
pub mod stream_client;

use crate::types::messages::{PortRequest, StreamMessage};

pub use port::{connect, Port, PortEvent, PortReceiver, PortSender};
pub use relay_handler::{ChannelSink, RelayConnector, RelayHandler, RelayState};
pub use stream_client::{Connector, StreamClient, StreamUpdate, StreamView};

/// Content-side end of a stream port.
pub type ClientPort = Port<PortRequest, StreamMessage>;

/// Relay-side end of a stream port.
pub type RelayPort = Port<StreamMessage, PortRequest>;
