use classifieds_suite::{
    fixtures::{Fixture, sample_payload},
    model::ErrorBody,
};

#[test]
fn sample_payload_matches_fixture() {
    let expected = Fixture::load_json("inputs/create_item.json").expect("fixture");
    assert_eq!(sample_payload(500_000), expected);
}

#[test]
fn error_envelope_fixture_decodes() {
    let raw = Fixture::load_json("inputs/error_envelope.json").expect("fixture");
    let envelope: ErrorBody = serde_json::from_value(raw).expect("envelope");
    assert_eq!(envelope.status, "400");
    assert!(envelope.result["message"].is_string());
}
