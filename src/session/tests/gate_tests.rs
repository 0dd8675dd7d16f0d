use super::*;
use crate::config::TransportOptions;
use crate::protocol::{Commitment, PositionFilter};
use crate::session::injector::tracking_filter;
use crate::transport::{memory, Transport};

fn live_set(key: &SessionKey) -> FilterSet {
    let mut live = FilterSet::new()
        .with_object_filter("acct", serde_json::json!({"owner": "a"}))
        .with_from_position(500)
        .with_commitment(Commitment::Processed);
    injector::inject(&mut live, key);
    live
}

#[test]
fn test_merge_adds_and_replaces_by_name() {
    let key = SessionKey::generate();
    let live = live_set(&key);
    let amendment = FilterSet::new()
        .with_object_filter("acct", serde_json::json!({"owner": "b"}))
        .with_content_filter("tx", serde_json::json!({"vote": false}))
        .with_from_position(1);

    let merged = merge(&live, amendment);

    assert_eq!(merged.objects["acct"]["owner"], "b");
    assert_eq!(merged.contents["tx"]["vote"], false);
    // The live starting position survives for resends; the amendment's is dropped.
    assert_eq!(merged.from_position, Some(500));
    assert_eq!(merged.commitment, Some(Commitment::Processed));
    assert_eq!(merged.positions[key.as_str()], tracking_filter());
}

#[test]
fn test_merge_commitment_override() {
    let key = SessionKey::generate();
    let merged = merge(
        &live_set(&key),
        FilterSet::new().with_commitment(Commitment::Finalized),
    );
    assert_eq!(merged.commitment, Some(Commitment::Finalized));
}

#[tokio::test]
async fn test_apply_without_connection_fails() {
    let key = SessionKey::generate();
    let mut live = live_set(&key);
    let before = live.clone();

    let amendment = FilterSet::new().with_content_filter("tx", serde_json::json!({}));
    let err = apply(None, &mut live, &key, amendment).await.unwrap_err();

    assert_eq!(err, not_connected());
    assert!(!err.is_terminal());
    assert_eq!(live, before);
}

#[tokio::test]
async fn test_apply_writes_merged_request() {
    let (transport, mut server) = memory::pair();
    let mut conn = transport
        .open("mem://feed", "token", &TransportOptions::default())
        .await
        .unwrap();
    let mut peer = server.accept().await.unwrap();
    let key = SessionKey::generate();
    let mut live = live_set(&key);

    let amendment = FilterSet::new().with_position_filter("mine", PositionFilter::default());
    apply(Some(&mut conn), &mut live, &key, amendment).await.unwrap();

    let written = peer.next_request().await.unwrap();
    assert_eq!(written.from_position, None);
    assert_eq!(live.from_position, Some(500));
    assert_eq!(written, FilterSet { from_position: None, ..live.clone() });
    assert_eq!(written.positions.len(), 2);
    assert!(written.positions.contains_key("mine"));
    assert!(written.positions.contains_key(key.as_str()));
    assert_eq!(written.objects["acct"]["owner"], "a");
}

#[tokio::test]
async fn test_rejected_write_leaves_live_set() {
    let (transport, mut server) = memory::pair();
    let mut conn = transport
        .open("mem://feed", "token", &TransportOptions::default())
        .await
        .unwrap();
    let peer = server.accept().await.unwrap();
    peer.reject_writes();
    let key = SessionKey::generate();
    let mut live = live_set(&key);
    let before = live.clone();

    let err = apply(
        Some(&mut conn),
        &mut live,
        &key,
        FilterSet::new().with_content_filter("tx", serde_json::json!({})),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SessionError::Amendment { .. }));
    assert_eq!(live, before);
}
