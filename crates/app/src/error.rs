use thiserror::Error;

/// Failure talking to the classifieds API.
///
/// Non-2xx statuses only become errors where a caller demanded success
/// (`create_and_normalize`, item lookups); the raw request methods hand the
/// status back instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{method} {url} failed: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },
    #[error("invalid JSON from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// How the service answered, as far as the suite can tell from the status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    ValidationError,
    /// 404, or a 400 for an id the service could not parse. The service does not
    /// reliably tell the two apart.
    NotFoundOrMalformed,
    Other,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            200 => StatusClass::Success,
            400 => StatusClass::ValidationError,
            404 => StatusClass::NotFoundOrMalformed,
            _ => StatusClass::Other,
        }
    }
}

/// Lookups of unknown or malformed ids answer with either 400 or 404.
pub fn is_not_found_tolerant(status: u16) -> bool {
    matches!(status, 400 | 404)
}
