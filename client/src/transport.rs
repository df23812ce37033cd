//! Outbound side of the client connection

use serde_json::Value;
use shared::{Frame, ProtocolError};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Fire-and-forget emission of a payload on a named channel
pub trait Transport {
    fn emit(&mut self, channel: &str, payload: Value) -> Result<(), TransportError>;
}

/// Queues frames for a writer task that owns the socket
///
/// Emitting never blocks; delivery failures after the frame left the queue
/// belong to the writer task.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Frame>,
}

impl ChannelTransport {
    pub fn new(outbound: mpsc::UnboundedSender<Frame>) -> Self {
        Self { outbound }
    }
}

impl Transport for ChannelTransport {
    fn emit(&mut self, channel: &str, payload: Value) -> Result<(), TransportError> {
        let frame = Frame {
            channel: channel.to_string(),
            payload,
        };
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }
}
