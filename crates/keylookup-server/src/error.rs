//! Server error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keylookup_core::Error as LookupError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("No keys found for search {0:?}")]
    NoMatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Lookup(LookupError::InvalidSearch(_)) => StatusCode::BAD_REQUEST,
            ServerError::Lookup(LookupError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Lookup(LookupError::UnknownOperation(_)) => StatusCode::NOT_IMPLEMENTED,
            ServerError::Lookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::NoMatch(_) => StatusCode::NOT_FOUND,
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "Lookup failed");
        }
        (status, self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
