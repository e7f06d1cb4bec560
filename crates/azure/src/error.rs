use serde_json::Value as Json;
use thiserror::Error;

use crate::transport::Method;

#[derive(Error, Debug)]
pub enum ArmError {
    #[error("unexpected status {status} for {method} {url}: {code}: {message}")]
    Status { method: Method, url: String, status: u16, code: String, message: String },

    #[error("sending {method} {url}: {message}")]
    Transport { method: Method, url: String, message: String },

    #[error("decoding response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("obtaining an access token: {0}")]
    Auth(String),

    #[error("long-running operation {url} finished with status {status}: {code}: {message}")]
    OperationFailed { url: String, status: String, code: String, message: String },
}

impl ArmError {
    pub(crate) fn from_response(method: Method, url: &str, status: u16, body: &Json) -> Self {
        let (code, message) = error_details(body);
        ArmError::Status { method, url: url.to_string(), status, code, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ArmError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn was_status(&self, expected: u16) -> bool { self.status() == Some(expected) }

    pub fn was_not_found(&self) -> bool { self.was_status(404) }
}

/// `{"error": {"code", "message"}}`, or the same fields at the top level.
pub(crate) fn error_details(body: &Json) -> (String, String) {
    let inner = body.get("error").unwrap_or(body);
    let field = |k: &str| inner.get(k).and_then(Json::as_str).unwrap_or_default().to_string();
    let message = match body {
        Json::String(s) if inner.get("message").is_none() => s.clone(),
        _ => field("message"),
    };
    (field("code"), message)
}
