//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use huddle_core::{Error, ErrorKind};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or unknown acting user")]
  Unauthenticated,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Engine(#[from] Error),
}

/// The HTTP status an engine error maps to.
pub fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::Validation => StatusCode::BAD_REQUEST,
    ErrorKind::Authorization => StatusCode::FORBIDDEN,
    ErrorKind::Timing => StatusCode::UNPROCESSABLE_ENTITY,
    ErrorKind::Conflict => StatusCode::CONFLICT,
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::TransientDelivery | ErrorKind::PermanentDelivery => StatusCode::BAD_GATEWAY,
    ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::Unauthenticated => {
        (StatusCode::UNAUTHORIZED, Json(json!({ "error": self.to_string() }))).into_response()
      }
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response()
      }
      ApiError::Engine(e) => {
        let kind = e.kind();
        if !e.is_rejection() {
          tracing::error!(error = %e, "request failed");
        }
        (status_for(kind), Json(json!({ "error": e.to_string(), "kind": kind }))).into_response()
      }
    }
  }
}
