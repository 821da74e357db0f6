use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Why a relay task lost its connection.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("remote closed the connection")]
    RemoteClosed,

    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("not found")]
    NotFound,

    #[error("template missing: {0}")]
    TemplateMissing(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let GatewayError::TemplateMissing(path) = &self {
            tracing::warn!(%path, "template not readable");
        }

        (StatusCode::NOT_FOUND, "404 Not Found").into_response()
    }
}
