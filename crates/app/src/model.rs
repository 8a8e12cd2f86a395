use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const REQUIRED_ITEM_FIELDS: [&str; 6] =
    ["id", "sellerId", "name", "price", "statistics", "createdAt"];
pub const REQUIRED_STATISTIC_FIELDS: [&str; 3] = ["likes", "viewCount", "contacts"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub likes: i64,
    pub view_count: i64,
    pub contacts: i64,
}

/// Body of `POST /api/{version}/item`. Note the request spells the seller key
/// `sellerID` while records come back with `sellerId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    #[serde(rename = "sellerID")]
    pub seller_id: i64,
    pub name: String,
    pub price: i64,
    pub statistics: Statistics,
}

impl NewItem {
    /// The payload every regression case starts from.
    pub fn sample(seller_id: i64) -> Self {
        Self {
            seller_id,
            name: "testItem".into(),
            price: 9900,
            statistics: Statistics {
                likes: 21,
                view_count: 11,
                contacts: 43,
            },
        }
    }
}

/// A fully populated item record as returned by the get-item endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub seller_id: i64,
    pub name: String,
    pub price: i64,
    pub statistics: Statistics,
    pub created_at: String,
}

impl Item {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Item::deserialize(value)
    }

    /// True when this record carries exactly what `new` asked for.
    pub fn matches(&self, new: &NewItem) -> bool {
        self.seller_id == new.seller_id
            && self.name == new.name
            && self.price == new.price
            && self.statistics == new.statistics
    }
}

/// Error envelope the service uses for 4xx answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub result: Value,
    pub status: Value,
}

/// Required keys absent from `record`. A non-object reports every key.
pub fn missing_fields<'a>(record: &Value, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|key| record.get(*key).is_none())
        .collect()
}
