//! The client and normalizer against every create-response shape the stub can produce.

use anyhow::{Result, ensure};
use classifieds_suite::{
    ApiClient, Normalized,
    fixtures::{sample_payload, unique_seller_id},
    harness::{CreateShape, StubServer, init_test_tracing},
    model::{Item, NewItem},
    config::SellerRange,
};

fn start(shape: CreateShape) -> Result<(StubServer, ApiClient)> {
    init_test_tracing();
    let server = StubServer::start(shape)?;
    let client = ApiClient::new(&server.api_config());
    Ok((server, client))
}

#[test]
fn status_shape_is_resolved_with_one_lookup() -> Result<()> {
    let (server, client) = start(CreateShape::Status)?;
    let seller_id = unique_seller_id(&SellerRange::default());

    let normalized = client.create_and_normalize(&sample_payload(seller_id))?;

    ensure!(
        matches!(normalized, Normalized::Fetched(_)),
        "expected a fetched record, got {normalized:?}"
    );
    let item = normalized.canonical();
    ensure!(
        item.as_ref().is_some_and(|item| item.matches(&NewItem::sample(seller_id))),
        "record should echo the request: {item:?}"
    );
    ensure!(server.state().hits("create") == 1, "one create call");
    ensure!(server.state().hits("get_item") == 1, "exactly one lookup");
    Ok(())
}

#[test]
fn record_and_listed_shapes_need_no_lookup() -> Result<()> {
    for shape in [CreateShape::Record, CreateShape::Listed] {
        let (server, client) = start(shape)?;
        let normalized = client.create_and_normalize(&sample_payload(123_456))?;

        ensure!(
            matches!(normalized, Normalized::Direct(_)),
            "{shape:?}: expected a direct record, got {normalized:?}"
        );
        let item = normalized.into_value();
        let item = Item::from_value(&item)?;
        ensure!(item.seller_id == 123_456, "{shape:?}: sellerId should match");
        ensure!(
            server.state().hits("get_item") == 0,
            "{shape:?}: no lookup expected"
        );
    }
    Ok(())
}

#[test]
fn rejected_create_is_an_error_not_a_fallback() -> Result<()> {
    let (server, client) = start(CreateShape::Status)?;
    let err = client
        .create_and_normalize(&serde_json::json!({"name": "testItem"}))
        .expect_err("create without seller should fail");

    ensure!(err.status() == Some(400), "expected HTTP 400, got {err}");
    ensure!(server.state().hits("get_item") == 0, "no lookup after a failed create");
    ensure!(server.state().item_count() == 0, "nothing stored");
    Ok(())
}

#[test]
fn unreachable_api_reports_transport_error() -> Result<()> {
    let (server, _) = start(CreateShape::Status)?;
    let config = server.api_config();
    drop(server);

    let client = ApiClient::new(&config);
    let err = client
        .get_item("abc")
        .expect_err("stopped server should be unreachable");
    ensure!(
        matches!(err, classifieds_suite::ApiError::Transport { .. }),
        "expected transport error, got {err:?}"
    );
    Ok(())
}

#[test]
fn client_sends_json_headers_on_create() -> Result<()> {
    let (server, client) = start(CreateShape::Status)?;
    let payload = sample_payload(123_456);

    let response = client.create_item(&payload)?;
    ensure!(
        response.is_success(),
        "client create should satisfy the header checks: {} {}",
        response.status,
        response.text
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into();
    let bare = agent
        .post(&format!("{}/item", client.api_root()))
        .send(payload.to_string())?;
    ensure!(
        bare.status().as_u16() == 415,
        "create without Content-Type should be refused, got {}",
        bare.status()
    );
    ensure!(server.state().item_count() == 1, "only the client's item is stored");
    Ok(())
}
