//! Session orchestration: subscribe, run, reconnect, cancel.
//!
//! Each subscription runs as one tokio task that owns the session state, the
//! live filter set, the current connection and both callbacks. Callers talk
//! to it only through a [`SessionHandle`]: amendments go through a mailbox,
//! cancellation through a watch flag, and state comes back as snapshots.

use super::gate::{self, SessionCommand};
use super::injector::{self, SessionKey};
use super::observer;
use super::reconnector::{ReconnectDecision, Reconnector};
use super::state::{SessionPhase, SessionSnapshot, SessionState};
use crate::config::SessionConfig;
use crate::error::{Disconnect, SessionError, TransportError};
use crate::protocol::{FeedEvent, FilterSet};
use crate::transport::{Connection, Transport};
use futures::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::Instrument;

/// Amendments waiting for the session task.
const COMMAND_BUFFER: usize = 16;

type DataCallback = Box<dyn FnMut(FeedEvent) + Send>;
type ErrorCallback = Box<dyn FnOnce(SessionError) + Send>;

/// Entry point: validated configuration plus the transport to open connections with.
#[derive(Clone)]
pub struct StreamClient {
    config: Arc<SessionConfig>,
    transport: Arc<dyn Transport>,
}

impl StreamClient {
    /// Fails with [`SessionError::Config`] before any connection is attempted.
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens the first connection, writes the subscription and spawns the session.
    ///
    /// Failures before the first write is acknowledged are returned as
    /// [`SessionError::InitialConnect`] and never retried here; `on_error` is
    /// then dropped without being called. Afterwards `on_data` receives every
    /// event in arrival order and `on_error` is called at most once, when the
    /// reconnect budget is exhausted. Cancellation calls neither.
    pub async fn subscribe<D, E>(
        &self,
        filters: FilterSet,
        on_data: D,
        on_error: E,
    ) -> Result<SessionHandle, SessionError>
    where
        D: FnMut(FeedEvent) + Send + 'static,
        E: FnOnce(SessionError) + Send + 'static,
    {
        let key = SessionKey::generate();
        let span = tracing::info_span!("session", key = %key);
        let mut filters = filters;

        let connection = self
            .open_initial(&key, &mut filters)
            .instrument(span.clone())
            .await?;

        let state = SessionState::new(key.clone());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel_tx = Arc::new(cancel_tx);
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot(SessionPhase::Active));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

        let session = Session {
            config: self.config.clone(),
            transport: self.transport.clone(),
            reconnector: Reconnector::new(self.config.reconnect_policy()),
            state,
            filters,
            on_data: Box::new(on_data),
            on_error: Some(Box::new(on_error)),
            commands: command_rx,
            commands_open: true,
            cancel: cancel_rx,
            _cancel_keepalive: cancel_tx.clone(),
            snapshots: snapshot_tx,
        };
        tokio::spawn(session.run(connection).instrument(span));

        Ok(SessionHandle {
            key,
            commands: command_tx,
            cancel: cancel_tx,
            snapshots: snapshot_rx,
        })
    }

    /// Like [`subscribe`](Self::subscribe), but delivers the session as a stream.
    ///
    /// The terminal error, if any, is the last item; the stream ends after it
    /// or after cancellation.
    pub async fn subscribe_stream(
        &self,
        filters: FilterSet,
    ) -> Result<(SessionHandle, SubscriptionStream), SessionError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let data_tx = tx.clone();
        let handle = self
            .subscribe(
                filters,
                move |event| {
                    let _ = data_tx.send(Ok(event));
                },
                move |err| {
                    let _ = tx.send(Err(err));
                },
            )
            .await?;
        Ok((handle, SubscriptionStream { rx }))
    }

    async fn open_initial(
        &self,
        key: &SessionKey,
        filters: &mut FilterSet,
    ) -> Result<Connection, SessionError> {
        tracing::debug!(endpoint = %self.config.endpoint, "opening initial connection");
        let mut connection = self
            .transport
            .open(
                &self.config.endpoint,
                &self.config.credential,
                &self.config.transport,
            )
            .await
            .map_err(|source| SessionError::InitialConnect { source })?;

        injector::inject(filters, key);
        if let Err(source) = connection.writer.write(filters).await {
            connection.shutdown().await;
            return Err(SessionError::InitialConnect { source });
        }

        tracing::info!(filters = filters.len(), "subscription active");
        Ok(connection)
    }
}

/// Caller-side control of one running session. Cheap to clone.
///
/// Dropping every handle leaves the session running; only [`cancel`](Self::cancel)
/// stops it.
#[derive(Clone)]
pub struct SessionHandle {
    key: SessionKey,
    commands: mpsc::Sender<SessionCommand>,
    cancel: Arc<watch::Sender<bool>>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn session_key(&self) -> &SessionKey {
        &self.key
    }

    /// Amends the live filters without restarting the session.
    ///
    /// Fails with [`SessionError::Amendment`] while no connection is current
    /// and with [`SessionError::SessionEnded`] once the session is over. The
    /// session keeps running either way.
    pub async fn amend(&self, amendment: FilterSet) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Amend { amendment, reply })
            .await
            .map_err(|_| SessionError::SessionEnded)?;
        response.await.map_err(|_| SessionError::SessionEnded)?
    }

    /// Stops the session, interrupting any pending reconnect wait.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshots.borrow()
    }

    pub fn phase(&self) -> SessionPhase {
        self.snapshots.borrow().phase
    }

    /// Receiver that observes every published snapshot.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Waits until the session is closed or failed.
    pub async fn closed(&self) -> SessionPhase {
        let mut snapshots = self.snapshots.clone();
        let result = snapshots
            .wait_for(|snapshot| snapshot.phase.is_terminal())
            .await
            .map(|snapshot| snapshot.phase);
        match result {
            Ok(phase) => phase,
            Err(_) => self.phase(),
        }
    }
}

/// Events of a session created with [`StreamClient::subscribe_stream`].
pub struct SubscriptionStream {
    rx: mpsc::UnboundedReceiver<Result<FeedEvent, SessionError>>,
}

impl SubscriptionStream {
    pub async fn recv(&mut self) -> Option<Result<FeedEvent, SessionError>> {
        self.rx.recv().await
    }
}

impl futures::Stream for SubscriptionStream {
    type Item = Result<FeedEvent, SessionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Why the event loop of one connection returned.
enum Flow {
    Cancelled,
    Disconnected(Disconnect),
}

/// Result of opening and subscribing one replacement connection.
enum Attempt {
    Connected(Connection),
    Cancelled,
    Failed(TransportError),
}

enum Inbound {
    Command(Option<SessionCommand>),
    Event(Option<Result<FeedEvent, TransportError>>),
}

struct Session {
    config: Arc<SessionConfig>,
    transport: Arc<dyn Transport>,
    reconnector: Reconnector,
    state: SessionState,
    filters: FilterSet,
    on_data: DataCallback,
    on_error: Option<ErrorCallback>,
    commands: mpsc::Receiver<SessionCommand>,
    commands_open: bool,
    cancel: watch::Receiver<bool>,
    /// Keeps the cancel channel open after every handle is gone.
    _cancel_keepalive: Arc<watch::Sender<bool>>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl Session {
    async fn run(mut self, initial: Connection) -> SessionPhase {
        let mut connection = initial;
        loop {
            self.publish(SessionPhase::Active);
            let disconnect = match self.stream(&mut connection).await {
                Flow::Cancelled => {
                    connection.shutdown().await;
                    return self.close();
                }
                Flow::Disconnected(disconnect) => disconnect,
            };
            tracing::warn!(cause = %disconnect, "stream terminated");
            connection.shutdown().await;

            connection = match self.reconnect(disconnect).await {
                Ok(next) => next,
                Err(phase) => return phase,
            };
        }
    }

    /// Pumps events from the current connection until it terminates.
    async fn stream(&mut self, connection: &mut Connection) -> Flow {
        loop {
            let inbound = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => return Flow::Cancelled,
                command = self.commands.recv(), if self.commands_open => Inbound::Command(command),
                item = connection.events.next() => Inbound::Event(item),
            };

            match inbound {
                Inbound::Command(None) => self.commands_open = false,
                Inbound::Command(Some(SessionCommand::Amend { amendment, reply })) => {
                    let result = tokio::select! {
                        biased;
                        _ = cancelled(&mut self.cancel) => return Flow::Cancelled,
                        result = gate::apply(
                            Some(&mut *connection),
                            &mut self.filters,
                            &self.state.key,
                            amendment,
                        ) => result,
                    };
                    if let Err(err) = &result {
                        tracing::warn!(error = %err, "amendment rejected");
                    }
                    let _ = reply.send(result);
                }
                Inbound::Event(Some(Ok(event))) => self.deliver(event),
                Inbound::Event(Some(Err(err))) => {
                    return Flow::Disconnected(Disconnect::Error(err))
                }
                Inbound::Event(None) => return Flow::Disconnected(Disconnect::End),
            }
        }
    }

    fn deliver(&mut self, event: FeedEvent) {
        let previous = self.state.reconnect_attempts;
        observer::observe(&mut self.state, &event);
        if previous > 0 {
            tracing::info!(after_attempts = previous, "stream recovered");
        }
        (self.on_data)(event);
        self.publish(SessionPhase::Active);
    }

    /// Runs the reconnect loop until a connection is current again.
    ///
    /// `Err` carries the terminal phase the session ended in.
    async fn reconnect(&mut self, mut cause: Disconnect) -> Result<Connection, SessionPhase> {
        loop {
            match self.reconnector.on_disconnect(&mut self.state, &mut self.filters) {
                ReconnectDecision::GiveUp { limit } => {
                    tracing::error!(limit, cause = %cause, "reconnect attempts exhausted");
                    if let Some(on_error) = self.on_error.take() {
                        on_error(SessionError::ReconnectLimitExceeded {
                            attempts: limit,
                            last: cause,
                        });
                    }
                    self.publish(SessionPhase::Failed);
                    return Err(SessionPhase::Failed);
                }
                ReconnectDecision::Retry {
                    attempt,
                    resume_from,
                } => {
                    if attempt == 1 || attempt.is_multiple_of(12) {
                        tracing::info!(
                            attempt,
                            limit = self.reconnector.limit(),
                            ?resume_from,
                            cause = %cause,
                            "reconnecting"
                        );
                    } else {
                        tracing::debug!(attempt, ?resume_from, cause = %cause, "reconnecting");
                    }
                }
            }

            self.publish(SessionPhase::Reconnecting);
            if !self.pause().await {
                return Err(self.close());
            }

            self.publish(SessionPhase::Connecting);
            match self.connect().await {
                Attempt::Connected(connection) => return Ok(connection),
                Attempt::Cancelled => return Err(self.close()),
                Attempt::Failed(err) => cause = Disconnect::Error(err),
            }
        }
    }

    /// Waits one reconnect interval. Returns false if cancelled meanwhile.
    async fn pause(&mut self) -> bool {
        let delay = tokio::time::sleep(self.reconnector.interval());
        tokio::pin!(delay);
        loop {
            let command = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => return false,
                _ = &mut delay => return true,
                command = self.commands.recv(), if self.commands_open => command,
            };
            self.reject_offline(command);
        }
    }

    /// Opens a replacement connection and resends the augmented filters.
    async fn connect(&mut self) -> Attempt {
        let transport = self.transport.clone();
        let config = self.config.clone();
        let mut open = transport.open(&config.endpoint, &config.credential, &config.transport);

        let opened = loop {
            let command = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => return Attempt::Cancelled,
                result = &mut open => break result,
                command = self.commands.recv(), if self.commands_open => command,
            };
            self.reject_offline(command);
        };

        let mut connection = match opened {
            Ok(connection) => connection,
            Err(err) => return Attempt::Failed(err),
        };
        let cancelled_while_opening = *self.cancel.borrow();
        if cancelled_while_opening {
            connection.shutdown().await;
            return Attempt::Cancelled;
        }

        injector::inject(&mut self.filters, &self.state.key);
        let written = tokio::select! {
            biased;
            _ = cancelled(&mut self.cancel) => None,
            result = connection.writer.write(&self.filters) => Some(result),
        };

        match written {
            Some(Ok(())) => {
                tracing::info!(from_position = ?self.filters.from_position, "resubscribed");
                Attempt::Connected(connection)
            }
            Some(Err(err)) => {
                connection.shutdown().await;
                Attempt::Failed(err)
            }
            None => {
                connection.shutdown().await;
                Attempt::Cancelled
            }
        }
    }

    fn reject_offline(&mut self, command: Option<SessionCommand>) {
        match command {
            Some(SessionCommand::Amend { reply, .. }) => {
                let _ = reply.send(Err(gate::not_connected()));
            }
            None => self.commands_open = false,
        }
    }

    fn close(&mut self) -> SessionPhase {
        tracing::info!("session cancelled");
        self.publish(SessionPhase::Closed);
        SessionPhase::Closed
    }

    fn publish(&self, phase: SessionPhase) {
        self.snapshots.send_replace(self.state.snapshot(phase));
    }
}

/// Resolves once the cancel flag is set.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
#[path = "tests/manager_tests.rs"]
mod tests;
