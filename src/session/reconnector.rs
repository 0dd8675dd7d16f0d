//! Attempt budget and resume position for reconnection.

use super::state::SessionState;
use crate::config::ReconnectPolicy;
use crate::protocol::FilterSet;
use std::time::Duration;

/// Outcome of a stream termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Wait one interval, then open a new connection.
    Retry {
        attempt: u32,
        resume_from: Option<u64>,
    },
    /// The budget is spent; the session fails.
    GiveUp { limit: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct Reconnector {
    policy: ReconnectPolicy,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy }
    }

    /// Constant delay before every attempt.
    pub fn interval(&self) -> Duration {
        self.policy.interval
    }

    pub fn limit(&self) -> u32 {
        self.policy.effective_max()
    }

    /// Consumes one attempt and points the request at the resume position.
    ///
    /// The starting position is only overwritten once something was observed,
    /// so a session that never saw an event resends the caller's original one.
    pub fn on_disconnect(
        &self,
        state: &mut SessionState,
        filters: &mut FilterSet,
    ) -> ReconnectDecision {
        let limit = self.limit();
        if state.reconnect_attempts >= limit {
            return ReconnectDecision::GiveUp { limit };
        }

        state.reconnect_attempts += 1;
        let resume_from = state.resume_position();
        if let Some(position) = resume_from {
            filters.from_position = Some(position);
        }

        ReconnectDecision::Retry {
            attempt: state.reconnect_attempts,
            resume_from,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::injector::SessionKey;

    fn policy(max: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: Some(max),
            ..ReconnectPolicy::default()
        }
    }

    #[test]
    fn test_retry_resumes_from_confirmed() {
        let reconnector = Reconnector::new(policy(5));
        let mut state = SessionState::new(SessionKey::generate());
        state.tracked_position = 110;
        state.confirmed_position = 105;
        let mut filters = FilterSet::new();

        let decision = reconnector.on_disconnect(&mut state, &mut filters);

        assert_eq!(
            decision,
            ReconnectDecision::Retry {
                attempt: 1,
                resume_from: Some(105)
            }
        );
        assert_eq!(filters.from_position, Some(105));
        assert_eq!(state.reconnect_attempts, 1);
    }

    #[test]
    fn test_nothing_observed_keeps_caller_start() {
        let reconnector = Reconnector::new(policy(5));
        let mut state = SessionState::new(SessionKey::generate());
        let mut filters = FilterSet::new().with_from_position(42);

        reconnector.on_disconnect(&mut state, &mut filters);

        assert_eq!(filters.from_position, Some(42));
    }

    #[test]
    fn test_gives_up_at_limit_without_consuming() {
        let reconnector = Reconnector::new(policy(2));
        let mut state = SessionState::new(SessionKey::generate());
        let mut filters = FilterSet::new();

        assert!(matches!(
            reconnector.on_disconnect(&mut state, &mut filters),
            ReconnectDecision::Retry { attempt: 1, .. }
        ));
        assert!(matches!(
            reconnector.on_disconnect(&mut state, &mut filters),
            ReconnectDecision::Retry { attempt: 2, .. }
        ));
        assert_eq!(
            reconnector.on_disconnect(&mut state, &mut filters),
            ReconnectDecision::GiveUp { limit: 2 }
        );
        assert_eq!(state.reconnect_attempts, 2);
    }

    #[test]
    fn test_zero_budget_gives_up_immediately() {
        let reconnector = Reconnector::new(policy(0));
        let mut state = SessionState::new(SessionKey::generate());
        assert_eq!(
            reconnector.on_disconnect(&mut state, &mut FilterSet::new()),
            ReconnectDecision::GiveUp { limit: 0 }
        );
    }

    #[test]
    fn test_interval_is_fixed() {
        let reconnector = Reconnector::new(ReconnectPolicy::default());
        assert_eq!(reconnector.interval(), Duration::from_secs(5));
        assert_eq!(reconnector.limit(), 240);
    }
}
