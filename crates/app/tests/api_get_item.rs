//! GET /api/1/item/{id}

use anyhow::{Result, ensure};
use classifieds_suite::{
    error::is_not_found_tolerant,
    fixtures::sample_payload,
    harness::for_each_target,
    model::{REQUIRED_ITEM_FIELDS, missing_fields},
};

#[test]
fn get_item_success() -> Result<()> {
    for_each_target(|target| {
        let created = target.created_item(&sample_payload(target.seller_id()))?;
        let id = created["id"].as_str().unwrap_or_default();

        let response = target.client().get_item(id)?;
        ensure!(
            response.status == 200,
            "expected 200, got {}. Response: {}",
            response.status,
            response.text
        );
        let data = response.json()?;
        ensure!(data.is_array(), "response should be an array: {data}");
        let item = data
            .as_array()
            .and_then(|items| items.first())
            .cloned()
            .unwrap_or_default();
        ensure!(!item.is_null(), "response array should not be empty");

        let missing = missing_fields(&item, &REQUIRED_ITEM_FIELDS);
        ensure!(missing.is_empty(), "fields {missing:?} are missing in response");
        for field in ["id", "sellerId", "name", "price", "statistics"] {
            ensure!(
                item[field] == created[field],
                "{field} should match: {} vs {}",
                item[field],
                created[field]
            );
        }
        Ok(())
    })
}

#[test]
fn get_nonexistent_item() -> Result<()> {
    for_each_target(|target| {
        let response = target.client().get_item("nonexistent-id-12345")?;
        // The service answers 400 rather than 404 for ids it cannot parse.
        ensure!(
            is_not_found_tolerant(response.status),
            "expected 400 or 404, got {}. Response: {}",
            response.status,
            response.text
        );
        let envelope = response.error_body()?;
        ensure!(!envelope.result.is_null(), "response should contain 'result'");
        ensure!(!envelope.status.is_null(), "response should contain 'status'");
        Ok(())
    })
}

#[test]
fn get_item_with_invalid_id_format() -> Result<()> {
    for_each_target(|target| {
        let response = target.client().get_item("!@#$%^&*()")?;
        ensure!(
            is_not_found_tolerant(response.status),
            "unexpected status code {}",
            response.status
        );
        Ok(())
    })
}
