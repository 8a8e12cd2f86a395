//! Reconciles the shapes the create-item endpoint answers with into one item record.
//!
//! The service has been seen to answer a create call with any of:
//! - `{"status": "Сохранили объявление - <id>"}`: only the id, the record must be fetched;
//! - `{"id": ..., ...}`: the record itself;
//! - `[{"id": ..., ...}]`: the record wrapped in an array.
//!
//! [`normalize`] turns whichever arrived into the record, issuing at most one
//! follow-up lookup. It never fails: when nothing can be resolved the original
//! body comes back as [`Normalized::Fallback`] and the caller decides what that
//! means for the test.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::model::Item;

/// Separator between the human-readable message and the id in a create status.
pub const STATUS_SEPARATOR: &str = " - ";

/// Id embedded in a create status string.
///
/// Names may themselves contain `" - "`, so the id is always the suffix after the
/// last separator. An empty suffix is not an id.
pub fn extract_status_id(status: &str) -> Option<&str> {
    let (_, id) = status.rsplit_once(STATUS_SEPARATOR)?;
    (!id.is_empty()).then_some(id)
}

/// A create response decoded once into the shapes the service is known to use.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateResponse {
    /// Status string carrying an id; the record has to be looked up.
    Acknowledged { id: String, raw: Value },
    /// Object that already carries `id`.
    Record(Value),
    /// Array whose first element carries `id`.
    Listed { head: Value, raw: Value },
    Unrecognized(Value),
}

impl CreateResponse {
    pub fn classify(raw: Value) -> Self {
        match &raw {
            Value::Object(map) => {
                let status_id = map
                    .get("status")
                    .and_then(Value::as_str)
                    .and_then(extract_status_id)
                    .map(str::to_owned);
                let has_id = map.contains_key("id");
                if let Some(id) = status_id {
                    CreateResponse::Acknowledged { id, raw }
                } else if has_id {
                    CreateResponse::Record(raw)
                } else {
                    CreateResponse::Unrecognized(raw)
                }
            }
            Value::Array(items) => {
                let head = items
                    .first()
                    .filter(|first| first.get("id").is_some())
                    .cloned();
                match head {
                    Some(head) => CreateResponse::Listed { head, raw },
                    None => CreateResponse::Unrecognized(raw),
                }
            }
            _ => CreateResponse::Unrecognized(raw),
        }
    }
}

/// Fetch-by-id capability handed to [`normalize`].
///
/// `Ok` means the service answered 200 and carries the decoded body; anything
/// else is an error.
pub trait ItemLookup {
    fn lookup(&self, id: &str) -> Result<Value, ApiError>;
}

impl<F> ItemLookup for F
where
    F: Fn(&str) -> Result<Value, ApiError>,
{
    fn lookup(&self, id: &str) -> Result<Value, ApiError> {
        self(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    Unrecognized,
    LookupFailed { id: String, error: ApiError },
    /// Lookup answered 200 but without a non-empty array.
    EmptyLookup { id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Record obtained through the follow-up lookup.
    Fetched(Value),
    /// Record that was already present in the create response.
    Direct(Value),
    /// Nothing resolved; `raw` is the create response exactly as received.
    Fallback { raw: Value, reason: FallbackReason },
}

impl Normalized {
    /// The resolved record, if any.
    pub fn item(&self) -> Option<&Value> {
        match self {
            Normalized::Fetched(item) | Normalized::Direct(item) => Some(item),
            Normalized::Fallback { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Normalized::Fallback { .. })
    }

    /// The resolved record, or the original response when nothing resolved.
    pub fn into_value(self) -> Value {
        match self {
            Normalized::Fetched(item) | Normalized::Direct(item) => item,
            Normalized::Fallback { raw, .. } => raw,
        }
    }

    /// The resolved record parsed as a fully populated [`Item`].
    pub fn canonical(&self) -> Option<Item> {
        self.item().and_then(|value| Item::from_value(value).ok())
    }
}

/// Resolve a create response into an item record.
///
/// Performs zero lookups for records already present and exactly one for a
/// status-with-id answer. Lookups are never retried.
pub fn normalize(raw: Value, lookup: &impl ItemLookup) -> Normalized {
    match CreateResponse::classify(raw) {
        CreateResponse::Record(record) => {
            debug!("create response already carries the record");
            Normalized::Direct(record)
        }
        CreateResponse::Listed { head, .. } => {
            debug!("create response carries the record as first array element");
            Normalized::Direct(head)
        }
        CreateResponse::Unrecognized(raw) => {
            warn!(%raw, "unrecognized create response shape");
            Normalized::Fallback {
                raw,
                reason: FallbackReason::Unrecognized,
            }
        }
        CreateResponse::Acknowledged { id, raw } => match lookup.lookup(&id) {
            Ok(Value::Array(mut items)) if !items.is_empty() => {
                debug!(%id, "resolved created item by lookup");
                Normalized::Fetched(items.swap_remove(0))
            }
            Ok(body) => {
                warn!(%id, %body, "lookup returned no item");
                Normalized::Fallback {
                    raw,
                    reason: FallbackReason::EmptyLookup { id },
                }
            }
            Err(error) => {
                warn!(%id, %error, "lookup of created item failed");
                Normalized::Fallback {
                    raw,
                    reason: FallbackReason::LookupFailed { id, error },
                }
            }
        },
    }
}
