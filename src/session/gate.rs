//! Live filter amendments.
//!
//! Amendments reach the session task through its mailbox one at a time, so a
//! second amendment is only written after the first was acknowledged or failed.

use super::injector::{self, SessionKey};
use crate::error::SessionError;
use crate::protocol::FilterSet;
use crate::transport::Connection;
use tokio::sync::oneshot;

/// Messages handled by the session task.
pub(crate) enum SessionCommand {
    Amend {
        amendment: FilterSet,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
}

/// Merges an amendment into the live filter set.
///
/// Named entries are inserted or replaced per category and a commitment
/// override replaces the current one. The amendment's starting position is
/// ignored; resume positions are owned by the session.
pub fn merge(live: &FilterSet, amendment: FilterSet) -> FilterSet {
    let mut merged = live.clone();
    merged.positions.extend(amendment.positions);
    merged.objects.extend(amendment.objects);
    merged.contents.extend(amendment.contents);
    if amendment.commitment.is_some() {
        merged.commitment = amendment.commitment;
    }
    merged
}

pub fn not_connected() -> SessionError {
    SessionError::Amendment {
        message: "not connected".to_string(),
    }
}

/// Writes the merged, augmented filter set through the current connection.
///
/// The request goes out without a starting position so the live stream is not
/// rewound; the live set keeps its own for resends. The live set only changes
/// once the write is acknowledged. Positions and attempt counters are never
/// touched here.
pub async fn apply(
    connection: Option<&mut Connection>,
    live: &mut FilterSet,
    key: &SessionKey,
    amendment: FilterSet,
) -> Result<(), SessionError> {
    let Some(connection) = connection else {
        return Err(not_connected());
    };

    let mut merged = merge(live, amendment);
    injector::inject(&mut merged, key);
    let request = FilterSet {
        from_position: None,
        ..merged.clone()
    };

    connection
        .writer
        .write(&request)
        .await
        .map_err(|err| SessionError::Amendment {
            message: err.to_string(),
        })?;

    *live = merged;
    Ok(())
}

#[cfg(test)]
#[path = "tests/gate_tests.rs"]
mod tests;
