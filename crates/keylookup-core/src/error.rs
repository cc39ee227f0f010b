//! Error types for keylookup-core

use std::any::Any;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error("{message}")]
    Opaque {
        message: String,
        fields: Map<String, Value>,
    },

    #[error("Invalid search: {0}")]
    InvalidSearch(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Sequence closed by consumer")]
    Closed,

    #[error("Panicked: {0}")]
    Panicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an error from a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    /// Convert a caught panic payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Error::Panicked(message)
    }

    /// Extra fields carried over from an opaque cause, if any
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        match self {
            Error::Opaque { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Whether the failure came from the caller's input rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidSearch(_) | Error::NotFound(_) | Error::UnknownOperation(_)
        )
    }
}
