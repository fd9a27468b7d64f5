use std::num::{ParseFloatError, ParseIntError};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Every way a submission can be rejected.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Only POST allowed")]
    MethodNotAllowed,

    #[error("No token")]
    MissingToken,

    #[error("Wrong token")]
    WrongToken,

    #[error("No {0} given")]
    MissingParam(&'static str),

    #[error("Malformed query string: {0}")]
    MalformedQuery(String),

    #[error("Invalid time: {0}")]
    InvalidTime(#[source] ParseIntError),

    #[error("Time {0} is out of range")]
    TimeOutOfRange(i64),

    #[error("Invalid temp: {0}")]
    InvalidTemp(#[source] ParseFloatError),

    #[error("Temp must be a finite number")]
    NonFiniteTemp,

    #[error("Storage error")]
    Storage(#[from] sqlx::Error),
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::WrongToken => StatusCode::FORBIDDEN,
            Self::MissingParam(_)
            | Self::MalformedQuery(_)
            | Self::InvalidTime(_)
            | Self::TimeOutOfRange(_)
            | Self::InvalidTemp(_)
            | Self::NonFiniteTemp => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            // Driver messages stay in the log.
            Self::Storage(e) => tracing::error!(error = %e, "Storage failure"),
            other => tracing::warn!(status = status.as_u16(), reason = %other, "Rejected submission"),
        }
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
