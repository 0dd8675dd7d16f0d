//! Reserved position-tracking filter injected into every outgoing request.

use crate::protocol::{FilterSet, PositionFilter};
use uuid::Uuid;

/// Prefix of the reserved filter name; never used for caller filters.
pub const RESERVED_FILTER_PREFIX: &str = "__internal_position_tracker_";

/// Identifies one logical session and names its reserved filter.
///
/// Generated once per subscription and reused on every resend, so the reserved
/// entry is replaced in place instead of piling up across reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn generate() -> Self {
        Self(format!("{}{}", RESERVED_FILTER_PREFIX, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reports every position transition regardless of the request's commitment.
pub fn tracking_filter() -> PositionFilter {
    PositionFilter {
        filter_by_commitment: Some(false),
        include_transitions: Some(true),
    }
}

/// Adds or refreshes the reserved filter; caller filters are left untouched.
pub fn inject(filters: &mut FilterSet, key: &SessionKey) {
    filters
        .positions
        .insert(key.as_str().to_string(), tracking_filter());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_adds_single_reserved_entry() {
        let key = SessionKey::generate();
        let mut filters = FilterSet::new()
            .with_position_filter("mine", PositionFilter::default())
            .with_object_filter("acct", serde_json::json!({"owner": "x"}));

        inject(&mut filters, &key);

        assert_eq!(filters.positions.len(), 2);
        assert_eq!(filters.positions[key.as_str()], tracking_filter());
        assert_eq!(filters.positions["mine"], PositionFilter::default());
        assert_eq!(filters.objects.len(), 1);
    }

    #[test]
    fn test_reinjecting_same_key_replaces() {
        let key = SessionKey::generate();
        let mut filters = FilterSet::new();
        for _ in 0..5 {
            inject(&mut filters, &key);
        }
        let reserved = filters
            .positions
            .keys()
            .filter(|name| name.starts_with(RESERVED_FILTER_PREFIX))
            .count();
        assert_eq!(reserved, 1);
    }

    #[test]
    fn test_keys_are_unique_and_prefixed() {
        let a = SessionKey::generate();
        let b = SessionKey::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(RESERVED_FILTER_PREFIX));
        assert_eq!(a.to_string(), a.as_str());
    }
}
