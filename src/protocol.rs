//! Request and event types exchanged with the feed.
//!
//! Payloads are opaque to the session: it only reads the position marker and
//! status tag of inbound events, and only writes the starting position and the
//! reserved position filter of outgoing requests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How final a position's data is, from least to most final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    /// Confirmed and finalized positions are safe to resume from.
    pub fn is_confirmed(self) -> bool {
        matches!(self, Commitment::Confirmed | Commitment::Finalized)
    }
}

/// Status tag as it appears on the wire: either a numeric code or a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawStatus {
    Code(i64),
    Label(String),
}

impl RawStatus {
    /// Maps the wire representation onto [`Commitment`].
    ///
    /// Codes and labels outside the three commitment levels (intermediate
    /// position transitions, for instance) carry no commitment and yield `None`.
    pub fn normalize(&self) -> Option<Commitment> {
        match self {
            RawStatus::Code(0) => Some(Commitment::Processed),
            RawStatus::Code(1) => Some(Commitment::Confirmed),
            RawStatus::Code(2) => Some(Commitment::Finalized),
            RawStatus::Code(_) => None,
            RawStatus::Label(label) => {
                let label = label.trim();
                if label.eq_ignore_ascii_case("processed") {
                    Some(Commitment::Processed)
                } else if label.eq_ignore_ascii_case("confirmed") {
                    Some(Commitment::Confirmed)
                } else if label.eq_ignore_ascii_case("finalized") {
                    Some(Commitment::Finalized)
                } else {
                    None
                }
            }
        }
    }
}

impl From<i64> for RawStatus {
    fn from(code: i64) -> Self {
        RawStatus::Code(code)
    }
}

impl From<i32> for RawStatus {
    fn from(code: i32) -> Self {
        RawStatus::Code(i64::from(code))
    }
}

impl From<&str> for RawStatus {
    fn from(label: &str) -> Self {
        RawStatus::Label(label.to_string())
    }
}

/// Criteria for a position-stream filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionFilter {
    /// Only report positions that reached the request's commitment level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_by_commitment: Option<bool>,
    /// Report every status transition of a position, not just the final one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_transitions: Option<bool>,
}

/// Named subscription criteria sent in every outgoing request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default)]
    pub positions: HashMap<String, PositionFilter>,
    #[serde(default)]
    pub objects: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub contents: HashMap<String, serde_json::Value>,
    /// Position the server should start (or resume) streaming from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_position: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<Commitment>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position_filter(
        mut self,
        name: impl Into<String>,
        filter: PositionFilter,
    ) -> Self {
        self.positions.insert(name.into(), filter);
        self
    }

    pub fn with_object_filter(
        mut self,
        name: impl Into<String>,
        criteria: serde_json::Value,
    ) -> Self {
        self.objects.insert(name.into(), criteria);
        self
    }

    pub fn with_content_filter(
        mut self,
        name: impl Into<String>,
        criteria: serde_json::Value,
    ) -> Self {
        self.contents.insert(name.into(), criteria);
        self
    }

    pub fn with_from_position(mut self, position: u64) -> Self {
        self.from_position = Some(position);
        self
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = Some(commitment);
        self
    }

    /// Total number of named filters across all categories.
    pub fn len(&self) -> usize {
        self.positions.len() + self.objects.len() + self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One inbound message from the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    /// Names of the filters this event matched.
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RawStatus>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl FeedEvent {
    /// An event reporting a position and its status.
    pub fn position(position: u64, status: impl Into<RawStatus>) -> Self {
        Self {
            position: Some(position),
            status: Some(status.into()),
            ..Self::default()
        }
    }

    /// An event with a payload and no position marker.
    pub fn payload(payload: serde_json::Value) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
