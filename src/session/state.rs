//! Per-session bookkeeping and the snapshot published to handles.

use super::injector::SessionKey;

/// Lifecycle of one logical session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Opening a connection and writing the subscription.
    Connecting,
    /// Events are flowing; amendments are accepted.
    Active,
    /// Waiting out the fixed delay before the next attempt.
    Reconnecting,
    /// Cancelled by the caller.
    Closed,
    /// Attempt budget exhausted.
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Closed | SessionPhase::Failed)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Reconnecting => write!(f, "RECONNECTING"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Mutable state carried across every connection attempt of a session.
///
/// Owned by the session task; nothing else mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub key: SessionKey,
    /// Last position seen on any event.
    pub tracked_position: u64,
    /// Last position reported as confirmed or finalized.
    pub confirmed_position: u64,
    /// Consecutive reconnection attempts since the last event.
    pub reconnect_attempts: u32,
}

impl SessionState {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            tracked_position: 0,
            confirmed_position: 0,
            reconnect_attempts: 0,
        }
    }

    /// Where a new connection should resume from, if anything was observed.
    pub fn resume_position(&self) -> Option<u64> {
        let position = if self.confirmed_position > 0 {
            self.confirmed_position
        } else {
            self.tracked_position
        };
        (position > 0).then_some(position)
    }

    pub fn snapshot(&self, phase: SessionPhase) -> SessionSnapshot {
        SessionSnapshot {
            phase,
            tracked_position: self.tracked_position,
            confirmed_position: self.confirmed_position,
            reconnect_attempts: self.reconnect_attempts,
        }
    }
}

/// Point-in-time view of a session, readable from any handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub tracked_position: u64,
    pub confirmed_position: u64,
    pub reconnect_attempts: u32,
}
