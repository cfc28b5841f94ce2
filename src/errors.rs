//! Error types for the relay and the static file service.
//!
//! Both enums render straight into HTTP responses. The bodies are plain text and
//! must stay byte-for-byte stable since browser clients display them verbatim.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failures on the `POST /api/summary` path.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// One of `apikey`, `prompt` or `text` was absent or empty.
    #[error("必須情報が不足しています")]
    MissingFields,
    /// The upstream completion API answered with a non-success status. Holds its body.
    #[error("OpenAI APIエラー: {0}")]
    Upstream(String),
    /// Anything else: malformed request JSON, transport failure, undecodable upstream reply.
    #[error("サーバーエラー: {0}")]
    Server(String),
}

impl RelayError {
    pub fn server(e: impl std::fmt::Display) -> Self {
        Self::Server(e.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingFields => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) | RelayError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Failures while serving a file from the static root.
#[derive(Debug, thiserror::Error)]
pub enum StaticError {
    #[error("Not Found")]
    NotFound,
    #[error("Internal Server Error")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for StaticError {
    fn into_response(self) -> Response {
        let status = match self {
            StaticError::NotFound => StatusCode::NOT_FOUND,
            StaticError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
