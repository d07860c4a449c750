//! Classified errors returned by gateway calls.

use reqwest::StatusCode;
use thiserror::Error;

/// How a response status is interpreted by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Any 2xx response.
    Success,
    /// 404: the addressed resource does not exist.
    Absent,
    /// Everything else.
    Unexpected,
}

/// Classify a raw HTTP status.
///
/// The gateway never decides whether an absent resource is acceptable; it
/// reports 404 as [`GatewayError::Status`] and leaves the policy to callers.
pub fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        StatusClass::Success
    } else if status == StatusCode::NOT_FOUND {
        StatusClass::Absent
    } else {
        StatusClass::Unexpected
    }
}

/// Failure of a single gateway call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
}

impl GatewayError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    /// Create a decoding error.
    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an error carrying the observed response status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for a 404 response.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::status(StatusCode::NOT_FOUND.as_u16(), message)
    }

    /// Observed HTTP status, when the request reached the server.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

/// Return a user-friendly hint for common HTTP status codes.
pub fn status_hint(status_code: u16) -> Option<&'static str> {
    match status_code {
        401 => Some("Unauthorized (401). Hint: set FOUNDRY_API_TOKEN=..."),
        403 => Some("Forbidden (403). Hint: check org/space roles for the current token"),
        _ => None,
    }
}
