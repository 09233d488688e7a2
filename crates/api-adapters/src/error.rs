//! HTTP error mapping. Failures are answered with short plain-text bodies;
//! handlers that owe the client an HTML page build it themselves.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domains::{DomainError, StorageError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0}")]
    BadRequest(String),

    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Domain(e) => match e {
                DomainError::Validation(_) => StatusCode::BAD_REQUEST,
                DomainError::NotFound(..) | DomainError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
                DomainError::Verification { .. }
                | DomainError::Encoding(_)
                | DomainError::StorageUnavailable
                | DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let status = |e: DomainError| ApiError::from(e).status();
        assert_eq!(status(DomainError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(DomainError::NotFound("thread", "1".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(StorageError::NotFound("/a".into()).into()), StatusCode::NOT_FOUND);
        assert_eq!(status(StorageError::Io("gone".into()).into()), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status(DomainError::Verification { path: "/a".into(), reason: "short".into() }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::BadRequest("no".into()).status(), StatusCode::BAD_REQUEST);
    }
}
