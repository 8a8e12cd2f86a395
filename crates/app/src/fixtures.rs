use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

use crate::config::{SellerRange, workspace_root};
use crate::model::NewItem;

pub struct Fixture;

impl Fixture {
    /// Load a JSON fixture relative to `fixtures/`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Value> {
        let full = workspace_root().join("fixtures").into_std_path_buf().join(path);
        let data = fs::read_to_string(&full)
            .with_context(|| format!("failed to read fixture {}", full.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid JSON in fixture {}", full.display()))
    }
}

/// Fresh seller id drawn uniformly from `range`, so repeated runs against the
/// shared deployment do not see each other's items.
pub fn unique_seller_id(range: &SellerRange) -> i64 {
    fastrand::i64(range.min..=range.max)
}

/// JSON form of [`NewItem::sample`], ready to be mutated for negative cases.
pub fn sample_payload(seller_id: i64) -> Value {
    json!(NewItem::sample(seller_id))
}

/// Copy of `value` with the dotted `path` removed (`"statistics.likes"`).
pub fn without_field(value: &Value, path: &str) -> Value {
    let mut out = value.clone();
    let (parent, leaf) = split_path(path);
    if let Some(map) = walk_mut(&mut out, parent) {
        map.remove(leaf);
    }
    out
}

/// Copy of `value` with the dotted `path` set to `replacement`. Missing
/// intermediate objects are not created.
pub fn with_field(value: &Value, path: &str, replacement: Value) -> Value {
    let mut out = value.clone();
    let (parent, leaf) = split_path(path);
    if let Some(map) = walk_mut(&mut out, parent) {
        map.insert(leaf.to_string(), replacement);
    }
    out
}

fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    }
}

fn walk_mut<'a>(value: &'a mut Value, parent: Option<&str>) -> Option<&'a mut Map<String, Value>> {
    let mut current = value;
    if let Some(parent) = parent {
        for key in parent.split('.') {
            current = current.get_mut(key)?;
        }
    }
    current.as_object_mut()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seller_ids_stay_in_range() {
        let range = SellerRange { min: 111_111, max: 111_113 };
        for _ in 0..200 {
            let id = unique_seller_id(&range);
            assert!((111_111..=111_113).contains(&id), "{id} out of range");
        }
    }

    #[test]
    fn sample_payload_carries_every_required_field() {
        let payload = sample_payload(654_321);
        assert_eq!(payload["sellerID"], 654_321);
        assert_eq!(payload["name"], "testItem");
        assert_eq!(payload["price"], 9900);
        assert_eq!(
            payload["statistics"],
            json!({"likes": 21, "viewCount": 11, "contacts": 43})
        );
    }

    #[test]
    fn without_field_removes_nested_keys() {
        let payload = sample_payload(123_456);
        let trimmed = without_field(&payload, "statistics.likes");
        assert_eq!(trimmed["statistics"], json!({"viewCount": 11, "contacts": 43}));
        assert_eq!(payload["statistics"]["likes"], 21, "source untouched");

        let no_seller = without_field(&payload, "sellerID");
        assert!(no_seller.get("sellerID").is_none());
        assert_eq!(no_seller["name"], "testItem");
    }

    #[test]
    fn with_field_replaces_values() {
        let payload = sample_payload(123_456);
        let bad = with_field(&payload, "price", json!("not_a_number"));
        assert_eq!(bad["price"], "not_a_number");

        let unchanged = with_field(&payload, "missing.leaf", json!(1));
        assert_eq!(unchanged, payload);
    }
}
