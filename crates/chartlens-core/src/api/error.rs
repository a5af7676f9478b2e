use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The provider answered with a non-success status. `message` is the
    /// provider's own text and is displayed verbatim.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Transport failure. The request URL is stripped since it carries the
    /// API key.
    #[error("Network error: {0}")]
    NetworkError(#[source] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::NetworkError(err.without_url())
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build an error from a non-success response.
    ///
    /// The provider reports failures as `{"error": {"message": "..."}}`.
    /// When the body has that shape the message is kept as-is, otherwise the
    /// raw body (or the status line for an empty body) stands in for it.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(ErrorEnvelope {
                error: ErrorBody { message: Some(message) },
            }) => message,
            _ if body.trim().is_empty() => format!("Request failed with status {}", status),
            _ => Self::truncate_body(body),
        };
        ApiError::Rejected {
            status: status.as_u16(),
            message,
        }
    }

    /// The provider's message for a rejection, if this is one.
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { message, .. } => Some(message),
            _ => None,
        }
    }
}
