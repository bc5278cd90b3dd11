use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unified error type for the agent
#[derive(Error, Debug)]
pub enum YasspError {
    // Panel errors
    #[error("Panel rejected credentials")]
    Authentication,

    #[error("Unexpected panel response: {0}")]
    UnexpectedResponse(String),

    #[error("Panel request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid payload: {0}")]
    Payload(String),

    // Server manager errors
    #[error("Server manager error: {0}")]
    Manager(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Push listener
    #[error("Invalid push token")]
    Unauthorized,

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, YasspError>;

impl YasspError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            YasspError::Payload(_) | YasspError::InvalidConfig(_) => StatusCode::BAD_REQUEST,

            YasspError::Unauthorized => StatusCode::UNAUTHORIZED,

            // Upstream failures surface as a bad gateway to push callers
            YasspError::Authentication
            | YasspError::UnexpectedResponse(_)
            | YasspError::Transport(_)
            | YasspError::Manager(_) => StatusCode::BAD_GATEWAY,

            YasspError::MissingEnvVar(_) | YasspError::Io(_) | YasspError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for YasspError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for YasspError {
    fn from(err: serde_json::Error) -> Self {
        YasspError::Payload(err.to_string())
    }
}

impl From<url::ParseError> for YasspError {
    fn from(err: url::ParseError) -> Self {
        YasspError::InvalidConfig(err.to_string())
    }
}
