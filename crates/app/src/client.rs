use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;
use tracing::{debug, info};
use ureq::Agent;

use crate::config::ApiConfig;
use crate::error::{ApiError, StatusClass};
use crate::model::ErrorBody;
use crate::normalize::{ItemLookup, Normalized, normalize};

/// Characters left as-is inside a path segment (RFC 3986 unreserved).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const JSON: &str = "application/json";

/// Status and raw body of one request. Non-2xx answers are returned here
/// rather than as errors so tests can assert on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub method: &'static str,
    pub url: String,
    pub status: u16,
    pub text: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn class(&self) -> StatusClass {
        StatusClass::of(self.status)
    }

    pub fn json(&self) -> Result<Value, ApiError> {
        serde_json::from_str(&self.text).map_err(|err| ApiError::Decode {
            url: self.url.clone(),
            message: err.to_string(),
        })
    }

    pub fn error_body(&self) -> Result<ErrorBody, ApiError> {
        serde_json::from_str(&self.text).map_err(|err| ApiError::Decode {
            url: self.url.clone(),
            message: format!("not an error envelope: {err}"),
        })
    }

    /// Turn anything but a 200 into [`ApiError::Status`].
    pub fn require_success(self) -> Result<Self, ApiError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(ApiError::Status {
            method: self.method,
            url: self.url,
            status: self.status,
            body: self.text,
        })
    }
}

/// Blocking client for the four classifieds endpoints. Each call is attempted
/// exactly once.
#[derive(Clone)]
pub struct ApiClient {
    agent: Agent,
    api_root: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout())
            .build()
            .into();
        Self {
            agent,
            api_root: config.api_root(),
        }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// `POST /api/{version}/item`
    pub fn create_item(&self, payload: &Value) -> Result<ApiResponse, ApiError> {
        let url = format!("{}/item", self.api_root);
        let body = serde_json::to_string(payload).map_err(|err| ApiError::Decode {
            url: url.clone(),
            message: format!("unserializable payload: {err}"),
        })?;
        let result = self
            .agent
            .post(&url)
            .header("Content-Type", JSON)
            .header("Accept", JSON)
            .send(body);
        finish("POST", url, result)
    }

    /// `GET /api/{version}/item/{id}`
    pub fn get_item(&self, id: &str) -> Result<ApiResponse, ApiError> {
        self.get(format!("{}/item/{}", self.api_root, encode_segment(id)))
    }

    /// `GET /api/{version}/{seller}/item`. The seller is sent verbatim (encoded)
    /// so malformed ids can be exercised.
    pub fn seller_items(&self, seller: &str) -> Result<ApiResponse, ApiError> {
        self.get(format!("{}/{}/item", self.api_root, encode_segment(seller)))
    }

    /// `GET /api/{version}/statistic/{id}`
    pub fn statistic(&self, id: &str) -> Result<ApiResponse, ApiError> {
        self.get(format!("{}/statistic/{}", self.api_root, encode_segment(id)))
    }

    /// Create an item and resolve the response into its record.
    ///
    /// Errors only when the create call itself does not answer 200 with JSON;
    /// an unresolvable body comes back as [`Normalized::Fallback`].
    pub fn create_and_normalize(&self, payload: &Value) -> Result<Normalized, ApiError> {
        let response = self.create_item(payload)?.require_success()?;
        let raw = response.json()?;
        let normalized = normalize(raw, self);
        info!(
            fallback = normalized.is_fallback(),
            "created item normalized"
        );
        Ok(normalized)
    }

    fn get(&self, url: String) -> Result<ApiResponse, ApiError> {
        let result = self.agent.get(&url).header("Accept", JSON).call();
        finish("GET", url, result)
    }
}

impl ItemLookup for ApiClient {
    fn lookup(&self, id: &str) -> Result<Value, ApiError> {
        self.get_item(id)?.require_success()?.json()
    }
}

fn finish(
    method: &'static str,
    url: String,
    result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
) -> Result<ApiResponse, ApiError> {
    let mut response = result.map_err(|err| ApiError::Transport {
        method,
        url: url.clone(),
        message: err.to_string(),
    })?;
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|err| ApiError::Transport {
            method,
            url: url.clone(),
            message: format!("failed to read body: {err}"),
        })?;
    debug!(method, %url, status, "request finished");
    Ok(ApiResponse {
        method,
        url,
        status,
        text,
    })
}

pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_percent_encoded() {
        assert_eq!(encode_segment("abc-123_x.y~z"), "abc-123_x.y~z");
        assert_eq!(
            encode_segment("!@#$%^&*()"),
            "%21%40%23%24%25%5E%26%2A%28%29"
        );
        assert_eq!(encode_segment("a/b"), "a%2Fb");
    }

    #[test]
    fn require_success_keeps_status_and_body() {
        let response = ApiResponse {
            method: "GET",
            url: "http://stub/api/1/item/x".into(),
            status: 400,
            text: r#"{"result":{},"status":"400"}"#.into(),
        };
        assert_eq!(response.class(), StatusClass::ValidationError);
        let body = response.error_body().unwrap();
        assert_eq!(body.status, "400");

        let err = response.require_success().unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn json_reports_decode_errors() {
        let response = ApiResponse {
            method: "GET",
            url: "http://stub/api/1/item/x".into(),
            status: 200,
            text: "<html>".into(),
        };
        assert!(matches!(response.json(), Err(ApiError::Decode { .. })));
    }
}
