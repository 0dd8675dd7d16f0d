//! Transport adapter boundary.
//!
//! A [`Transport`] opens one duplex [`Connection`] per attempt. The session
//! writes whole [`FilterSet`] requests through the connection's writer and
//! consumes its event stream until the stream ends (`None`) or fails (`Err`).
//! Adapters hold no session state; a fresh connection is opened for every
//! reconnection attempt.

pub mod memory;

use crate::config::TransportOptions;
use crate::error::TransportError;
use crate::protocol::{FeedEvent, FilterSet};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Ordered inbound events of one connection.
pub type EventStream = BoxStream<'static, Result<FeedEvent, TransportError>>;

/// Opens connections to the feed.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(
        &self,
        endpoint: &str,
        credential: &str,
        options: &TransportOptions,
    ) -> Result<Connection, TransportError>;
}

/// Outgoing half of a connection.
#[async_trait]
pub trait RequestWriter: Send {
    /// Resolves once the request has been acknowledged by the transport.
    async fn write(&mut self, request: &FilterSet) -> Result<(), TransportError>;

    async fn close(&mut self);
}

/// One open duplex stream.
pub struct Connection {
    pub writer: Box<dyn RequestWriter>,
    /// Must be cancel-safe: the session polls it inside `select!`.
    pub events: EventStream,
}

impl Connection {
    pub fn new(writer: Box<dyn RequestWriter>, events: EventStream) -> Self {
        Self { writer, events }
    }

    /// Closes the writer and drops any events still in flight.
    pub async fn shutdown(mut self) {
        self.writer.close().await;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}
