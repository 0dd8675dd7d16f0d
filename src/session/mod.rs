//! Resilient subscription sessions.
//!
//! A session survives any number of dropped connections within the server's
//! replay window:
//!
//! - **Injector (`injector.rs`)**: adds the reserved position-tracking filter,
//!   keyed by a per-session [`SessionKey`], to every outgoing request.
//! - **Observer (`observer.rs`)**: tracks the latest seen and latest confirmed
//!   position from inbound events and resets the attempt counter.
//! - **Reconnector (`reconnector.rs`)**: fixed-interval retry budget and the
//!   position to resume from.
//! - **Write gate (`gate.rs`)**: filter amendments on a live connection.
//! - **Manager (`manager.rs`)**: [`StreamClient`] and [`SessionHandle`], and the
//!   session task that ties the pieces together.

pub mod gate;
pub mod injector;
pub mod manager;
pub mod observer;
pub mod reconnector;
pub mod state;

pub use injector::{SessionKey, RESERVED_FILTER_PREFIX};
pub use manager::{SessionHandle, StreamClient, SubscriptionStream};
pub use reconnector::{ReconnectDecision, Reconnector};
pub use state::{SessionPhase, SessionSnapshot, SessionState};
