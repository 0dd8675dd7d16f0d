use super::*;
use proptest::prelude::*;

#[test]
fn test_numeric_codes_normalize() {
    assert_eq!(RawStatus::Code(0).normalize(), Some(Commitment::Processed));
    assert_eq!(RawStatus::Code(1).normalize(), Some(Commitment::Confirmed));
    assert_eq!(RawStatus::Code(2).normalize(), Some(Commitment::Finalized));
}

#[test]
fn test_labels_normalize_case_insensitively() {
    assert_eq!(
        RawStatus::from("CONFIRMED").normalize(),
        Some(Commitment::Confirmed)
    );
    assert_eq!(
        RawStatus::from("finalized").normalize(),
        Some(Commitment::Finalized)
    );
    assert_eq!(
        RawStatus::from("Processed").normalize(),
        Some(Commitment::Processed)
    );
}

#[test]
fn test_intermediate_transitions_carry_no_commitment() {
    assert_eq!(RawStatus::Code(3).normalize(), None);
    assert_eq!(RawStatus::Code(-1).normalize(), None);
    assert_eq!(RawStatus::from("CREATED_BANK").normalize(), None);
}

#[test]
fn test_only_confirmed_and_finalized_are_confirmed() {
    assert!(!Commitment::Processed.is_confirmed());
    assert!(Commitment::Confirmed.is_confirmed());
    assert!(Commitment::Finalized.is_confirmed());
    assert!(Commitment::Processed < Commitment::Finalized);
}

#[test]
fn test_event_decodes_numeric_and_textual_status() {
    let numeric: FeedEvent =
        serde_json::from_str(r#"{"filters":["a"],"position":7,"status":1}"#).unwrap();
    assert_eq!(numeric.status, Some(RawStatus::Code(1)));

    let textual: FeedEvent =
        serde_json::from_str(r#"{"position":8,"status":"FINALIZED","payload":{"k":1}}"#).unwrap();
    assert_eq!(textual.status, Some(RawStatus::Label("FINALIZED".to_string())));
    assert_eq!(textual.payload["k"], 1);
    assert!(textual.filters.is_empty());
}

#[test]
fn test_filter_set_omits_unset_fields() {
    let filters = FilterSet::new().with_object_filter("acct", serde_json::json!({"owner": "x"}));
    let json = serde_json::to_value(&filters).unwrap();
    assert!(json.get("from_position").is_none());
    assert!(json.get("commitment").is_none());
    assert_eq!(json["objects"]["acct"]["owner"], "x");
    assert_eq!(filters.len(), 1);
}

proptest! {
    #[test]
    fn prop_codes_outside_known_range_never_normalize(code in prop::num::i64::ANY) {
        prop_assume!(!(0..=2).contains(&code));
        prop_assert_eq!(RawStatus::Code(code).normalize(), None);
    }

    #[test]
    fn prop_label_case_does_not_matter(idx in 0usize..3, upper in any::<bool>()) {
        let labels = ["processed", "confirmed", "finalized"];
        let expected = [Commitment::Processed, Commitment::Confirmed, Commitment::Finalized];
        let label = if upper {
            labels[idx].to_ascii_uppercase()
        } else {
            labels[idx].to_string()
        };
        prop_assert_eq!(RawStatus::Label(label).normalize(), Some(expected[idx]));
    }
}
