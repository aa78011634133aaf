use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Database(#[from] sea_orm::DbErr),

  /// Store did not answer in time or is otherwise unreachable.
  #[error("Store unavailable: {0}")]
  StoreUnavailable(String),

  #[error("Key not found")]
  KeyNotFound,

  #[error("Key is already bound to a device")]
  AlreadyBound,

  #[error("Invalid seed data: {0}")]
  Seed(String),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] json::Error),
}

impl Error {
  /// Whether the failure comes from the backing store rather than the caller.
  pub fn is_unavailable(&self) -> bool {
    matches!(self, Error::Database(_) | Error::StoreUnavailable(_))
  }

  /// Machine-readable code sent alongside `valid: false`.
  pub fn reason(&self) -> &'static str {
    match self {
      Error::Database(_) | Error::StoreUnavailable(_) => "store_unavailable",
      Error::KeyNotFound => "key_not_found",
      Error::AlreadyBound => "already_bound",
      Error::Seed(_) => "invalid_seed",
      Error::Json(_) => "malformed_request",
      Error::Io(_) => "internal_error",
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Database(_) | Error::StoreUnavailable(_) => {
        StatusCode::SERVICE_UNAVAILABLE
      }
      Error::KeyNotFound => StatusCode::NOT_FOUND,
      Error::AlreadyBound => StatusCode::CONFLICT,
      Error::Seed(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
      Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = json::json!({
      "valid": false,
      "reason": self.reason(),
      "message": self.to_string(),
    });

    (status, axum::Json(body)).into_response()
  }
}

pub type Result<T> = std::result::Result<T, Error>;
