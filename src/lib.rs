//! Long-lived, resumable subscriptions to a streaming data feed.
//!
//! [`StreamClient::subscribe`] opens a duplex connection through a
//! [`Transport`], writes the caller's [`FilterSet`] and keeps delivering
//! [`FeedEvent`]s in order. When the connection drops, the session reconnects
//! at a fixed interval and resumes from the last confirmed position, until the
//! attempt budget derived from the server's replay window runs out.

pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::{ReconnectPolicy, SessionConfig, TransportOptions};
pub use error::{Disconnect, SessionError, TransportError};
pub use protocol::{Commitment, FeedEvent, FilterSet, PositionFilter, RawStatus};
pub use session::{SessionHandle, SessionPhase, SessionSnapshot, StreamClient, SubscriptionStream};
pub use transport::{Connection, RequestWriter, Transport};
