//! Client error types.

use serde::Deserialize;
use thiserror::Error;

/// Message shown when a failed response carries nothing readable.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure: no response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error code from server.
        code: String,
        /// Error message from server.
        message: String,
    },

    /// The access token was rejected and could not be recovered.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request payload was rejected by server-side validation.
    #[error("Validation failed: {}", messages.join(", "))]
    Validation {
        /// HTTP status code (400 or 422).
        status: u16,
        /// One entry per rejected field or rule.
        messages: Vec<String>,
    },

    /// Token renewal failed; the session has been cleared.
    #[error("Session renewal failed: {message}")]
    Renewal {
        /// Status returned by the refresh endpoint, if one was received.
        status: Option<u16>,
        /// Reason for the failure.
        message: String,
    },

    /// Persisted session storage could not be read or written.
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The recovery controller reached a state it cannot leave.
    #[error("Invalid client state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_)) || matches!(self, Error::Api { status: 404, .. })
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_)) || matches!(self, Error::Api { status: 401, .. })
    }

    /// Check if the session was lost because renewal failed.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::Renewal { .. })
    }

    /// Check if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status >= 500)
    }

    /// Message suitable for a user-visible notification.
    pub fn user_message(&self) -> String {
        match self {
            Error::Http(e) if e.is_timeout() => "The server took too long to respond.".to_string(),
            Error::Http(_) => "Unable to reach the server. Check your connection.".to_string(),
            Error::Api { message, .. } | Error::Auth(message) | Error::NotFound(message) => {
                message.clone()
            }
            Error::Validation { messages, .. } => messages.join(", "),
            Error::Renewal { .. } => "Your session has expired. Please sign in again.".to_string(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// HTTP status associated with this error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            Error::Api { status, .. } | Error::Validation { status, .. } => Some(*status),
            Error::Auth(_) => Some(401),
            Error::NotFound(_) => Some(404),
            Error::Renewal { status, .. } => *status,
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error body returned by the backend.
///
/// `message` is either a single string or, for validation failures, a list
/// of strings.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<ErrorMessage>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ErrorResponse {
    /// Parse an error body, tolerating empty or non-JSON payloads.
    pub(crate) fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// All messages carried by the body, most specific first.
    pub(crate) fn messages(&self) -> Vec<String> {
        match &self.message {
            Some(ErrorMessage::One(m)) if !m.trim().is_empty() => vec![m.clone()],
            Some(ErrorMessage::Many(ms)) if !ms.is_empty() => ms.clone(),
            _ => self.error.iter().filter(|e| !e.trim().is_empty()).cloned().collect(),
        }
    }

    /// Human-readable summary, falling back to [`GENERIC_ERROR_MESSAGE`].
    pub(crate) fn summary(&self) -> String {
        let messages = self.messages();
        if messages.is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            messages.join(", ")
        }
    }

    /// Map a failed response into the matching [`Error`] variant.
    pub(crate) fn into_error(self, status: u16) -> Error {
        let message = self.summary();
        match status {
            401 => Error::Auth(message),
            404 => Error::NotFound(message),
            400 | 422 if matches!(self.message, Some(ErrorMessage::Many(_))) || status == 422 => {
                Error::Validation {
                    status,
                    messages: self.messages_or_generic(),
                }
            }
            _ => Error::Api {
                status,
                code: self.code.unwrap_or_else(|| "unknown".to_string()),
                message,
            },
        }
    }

    fn messages_or_generic(&self) -> Vec<String> {
        let messages = self.messages();
        if messages.is_empty() {
            vec![GENERIC_ERROR_MESSAGE.to_string()]
        } else {
            messages
        }
    }
}
