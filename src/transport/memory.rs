//! In-process transport backed by tokio channels.
//!
//! [`MemoryTransport`] is handed to the session; the paired [`MemoryServer`]
//! stays with the caller (usually a test) and plays the feed: it accepts each
//! opened connection as a [`MemoryPeer`], reads the requests written to it,
//! pushes events, and ends or fails streams on demand. Opens and write
//! acknowledgements can be held so a test can park the client mid-call.

use super::{Connection, RequestWriter, Transport};
use crate::config::TransportOptions;
use crate::error::TransportError;
use crate::protocol::{FeedEvent, FilterSet};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch, Semaphore};

#[derive(Default)]
struct OpenScript {
    opens: usize,
    fail_next: VecDeque<TransportError>,
    fail_all: Option<TransportError>,
    last_endpoint: Option<String>,
    last_credential: Option<String>,
}

/// Write acknowledgements handed out one at a time while held.
struct AckGate {
    held: AtomicBool,
    released: Semaphore,
}

struct Shared {
    script: Mutex<OpenScript>,
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    /// True while opens are held.
    open_gate: watch::Sender<bool>,
    acks: Arc<AckGate>,
}

impl Shared {
    fn script(&self) -> MutexGuard<'_, OpenScript> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Client side of the in-memory feed.
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Feed side: accepts the connections opened through the paired transport.
pub struct MemoryServer {
    shared: Arc<Shared>,
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// Creates a connected transport/server pair.
pub fn pair() -> (MemoryTransport, MemoryServer) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    let (open_gate, _) = watch::channel(false);
    let shared = Arc::new(Shared {
        script: Mutex::new(OpenScript::default()),
        accept_tx,
        open_gate,
        acks: Arc::new(AckGate {
            held: AtomicBool::new(false),
            released: Semaphore::new(0),
        }),
    });
    (
        MemoryTransport {
            shared: shared.clone(),
        },
        MemoryServer { shared, accept_rx },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(
        &self,
        endpoint: &str,
        credential: &str,
        _options: &TransportOptions,
    ) -> Result<Connection, TransportError> {
        let id = {
            let mut script = self.shared.script();
            script.opens += 1;
            script.last_endpoint = Some(endpoint.to_string());
            script.last_credential = Some(credential.to_string());
            if let Some(err) = script.fail_next.pop_front() {
                return Err(err);
            }
            if let Some(err) = &script.fail_all {
                return Err(err.clone());
            }
            script.opens
        };

        let mut gate = self.shared.open_gate.subscribe();
        let released = gate.wait_for(|held| !*held).await.is_ok();
        if !released {
            return Err(TransportError::connect("memory server is gone"));
        }

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let reject_writes = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));

        let peer = MemoryPeer {
            id,
            requests: request_rx,
            events: event_tx,
            reject_writes: reject_writes.clone(),
            closed: closed.clone(),
        };
        self.shared
            .accept_tx
            .send(peer)
            .map_err(|_| TransportError::connect("memory server is gone"))?;

        let events = futures::stream::unfold(event_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();

        let writer = MemoryWriter {
            requests: request_tx,
            reject_writes,
            closed,
            acks: self.shared.acks.clone(),
        };
        Ok(Connection::new(Box::new(writer), events))
    }
}

struct MemoryWriter {
    requests: mpsc::UnboundedSender<FilterSet>,
    reject_writes: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    acks: Arc<AckGate>,
}

#[async_trait]
impl RequestWriter for MemoryWriter {
    async fn write(&mut self, request: &FilterSet) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(TransportError::write("rejected by peer"));
        }
        self.requests
            .send(request.clone())
            .map_err(|_| TransportError::write("peer hung up"))?;

        // The peer already sees the request; only the ack waits.
        if self.acks.held.load(Ordering::SeqCst) {
            let permit = self
                .acks
                .released
                .acquire()
                .await
                .map_err(|_| TransportError::Closed)?;
            permit.forget();
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl MemoryServer {
    /// Waits for the next connection opened through the transport.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Returns an already opened connection without waiting.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.try_recv().ok()
    }

    /// Number of `open` calls seen so far, failed ones included.
    pub fn open_count(&self) -> usize {
        self.shared.script().opens
    }

    /// Makes the next `open` call fail with `err`. Queued failures are used in order.
    pub fn fail_next_open(&self, err: TransportError) {
        self.shared.script().fail_next.push_back(err);
    }

    /// Makes every `open` call fail until [`allow_opens`](Self::allow_opens).
    pub fn fail_all_opens(&self, err: TransportError) {
        self.shared.script().fail_all = Some(err);
    }

    pub fn allow_opens(&self) {
        self.shared.script().fail_all = None;
    }

    /// Parks every `open` call (counted, but not yet connected) until
    /// [`release_opens`](Self::release_opens).
    pub fn hold_opens(&self) {
        self.shared.open_gate.send_replace(true);
    }

    pub fn release_opens(&self) {
        self.shared.open_gate.send_replace(false);
    }

    /// Delivers further writes to their peers but withholds the acknowledgement
    /// until [`release_ack`](Self::release_ack) is called once per write.
    pub fn hold_acks(&self) {
        self.shared.acks.held.store(true, Ordering::SeqCst);
    }

    /// Acknowledges one held write.
    pub fn release_ack(&self) {
        self.shared.acks.released.add_permits(1);
    }

    pub fn last_endpoint(&self) -> Option<String> {
        self.shared.script().last_endpoint.clone()
    }

    pub fn last_credential(&self) -> Option<String> {
        self.shared.script().last_credential.clone()
    }
}

/// Feed side of one opened connection.
///
/// Dropping the peer ends the event stream gracefully.
pub struct MemoryPeer {
    id: usize,
    requests: mpsc::UnboundedReceiver<FilterSet>,
    events: mpsc::UnboundedSender<Result<FeedEvent, TransportError>>,
    reject_writes: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MemoryPeer {
    /// 1-based index of the `open` call that produced this connection.
    pub fn id(&self) -> usize {
        self.id
    }

    pub async fn next_request(&mut self) -> Option<FilterSet> {
        self.requests.recv().await
    }

    pub fn try_request(&mut self) -> Option<FilterSet> {
        self.requests.try_recv().ok()
    }

    /// Pushes an event; returns false once the client dropped the stream.
    pub fn send(&self, event: FeedEvent) -> bool {
        self.events.send(Ok(event)).is_ok()
    }

    /// Fails the stream with `err`.
    pub fn fail(self, err: TransportError) {
        let _ = self.events.send(Err(err));
    }

    /// Ends the stream gracefully.
    pub fn end(self) {}

    /// Makes every further write on this connection fail.
    pub fn reject_writes(&self) {
        self.reject_writes.store(true, Ordering::SeqCst);
    }

    /// True once the client closed its writer.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
