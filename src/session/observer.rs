//! Position bookkeeping for inbound events.

use super::state::SessionState;
use crate::protocol::{Commitment, FeedEvent};

/// Updates positions from one event and resets the attempt counter.
///
/// Non-monotonic positions overwrite rather than fail. Returns the event's
/// normalized commitment, if it carried a recognizable one.
pub fn observe(state: &mut SessionState, event: &FeedEvent) -> Option<Commitment> {
    state.reconnect_attempts = 0;

    let position = event.position?;
    state.tracked_position = position;

    let commitment = event.status.as_ref().and_then(|status| status.normalize());
    if commitment.is_some_and(Commitment::is_confirmed) {
        state.confirmed_position = position;
    }

    tracing::trace!(
        position,
        ?commitment,
        confirmed = state.confirmed_position,
        "observed position"
    );
    commitment
}

#[cfg(test)]
#[path = "tests/observer_tests.rs"]
mod tests;
