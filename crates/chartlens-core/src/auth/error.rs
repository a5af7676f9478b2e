use thiserror::Error;

use crate::api::ApiError;

/// Message shown when Google sign-in is requested
pub const GOOGLE_NOT_IMPLEMENTED: &str =
    "Google Sign-In not implemented yet. Please use email/password.";

#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity provider refused the request. The message is the
    /// provider's own and is meant to be shown to the user unchanged.
    #[error("{0}")]
    Rejected(String),

    #[error("Could not reach the identity provider: {0}")]
    Transport(String),

    #[error("{0}")]
    NotImplemented(&'static str),

    #[error("Session manager is not running")]
    Closed,
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected { message, .. } => AuthError::Rejected(message),
            ApiError::NetworkError(e) => AuthError::Transport(e.to_string()),
            ApiError::InvalidResponse(msg) => AuthError::Transport(msg),
        }
    }
}
