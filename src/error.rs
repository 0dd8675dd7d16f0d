//! Error types for subscription sessions and the transports they run on.

use std::fmt::{Display, Formatter};

/// Errors raised by a transport adapter while opening, writing to, or reading
/// from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    Connect { message: String },
    /// A request write was rejected or never acknowledged.
    Write { message: String },
    /// The inbound event stream failed.
    Stream { message: String },
    /// The connection was closed locally.
    Closed,
}

impl TransportError {
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect { message } => write!(f, "connect failed: {}", message),
            Self::Write { message } => write!(f, "write failed: {}", message),
            Self::Stream { message } => write!(f, "stream error: {}", message),
            Self::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Why a connection stopped delivering events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// The transport reported an error.
    Error(TransportError),
    /// The server ended the stream gracefully.
    End,
}

impl Display for Disconnect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(err) => write!(f, "{}", err),
            Self::End => write!(f, "stream ended by server"),
        }
    }
}

/// Errors that cross the session boundary to the caller.
///
/// Transient transport failures on an active session never show up here
/// directly; they are absorbed by reconnecting and only surface wrapped in
/// [`SessionError::ReconnectLimitExceeded`] once the attempt budget is spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Configuration rejected before any connection attempt.
    Config { message: String },
    /// The very first connection or request write failed.
    InitialConnect { source: TransportError },
    /// Every reconnection attempt allowed by the policy failed.
    ReconnectLimitExceeded { attempts: u32, last: Disconnect },
    /// A filter amendment could not be written.
    Amendment { message: String },
    /// The session already reached a terminal state.
    SessionEnded,
}

impl SessionError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the session is gone after this error.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Amendment { .. })
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config { message } => write!(f, "invalid configuration: {}", message),
            Self::InitialConnect { source } => {
                write!(f, "initial connection failed: {}", source)
            }
            Self::ReconnectLimitExceeded { attempts, last } => write!(
                f,
                "connection lost after {} reconnect attempts (limit reached): {}",
                attempts, last
            ),
            Self::Amendment { message } => write!(f, "amendment failed: {}", message),
            Self::SessionEnded => write!(f, "session has ended"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InitialConnect { source } => Some(source),
            Self::ReconnectLimitExceeded {
                last: Disconnect::Error(err),
                ..
            } => Some(err),
            _ => None,
        }
    }
}
