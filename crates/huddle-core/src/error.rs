//! Error types for `huddle-core`.
//!
//! The `Display` output of every variant except [`Error::Storage`] is a
//! user-facing message and is surfaced verbatim by the API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Bad or missing input.
  #[error("{0}")]
  Validation(String),

  /// The actor lacks the role or ownership required for the action.
  #[error("{0}")]
  Authorization(String),

  /// A time gate rejected the action; carries the remaining-time message.
  #[error("{0}")]
  Timing(String),

  /// Already deleted, already finalized, or a duplicate record.
  #[error("{0}")]
  Conflict(String),

  #[error("{0}")]
  NotFound(String),

  /// A send failure that the retry policy considers transient.
  #[error("{0}")]
  TransientDelivery(String),

  /// A send failure that will not succeed on retry.
  #[error("{0}")]
  PermanentDelivery(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap any backend error as [`Error::Storage`].
  pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }

  /// Convert a [`crate::store::Backend`] error, keeping its domain meaning.
  pub fn from_backend(e: impl Into<Error>) -> Self { e.into() }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) => ErrorKind::Validation,
      Self::Authorization(_) => ErrorKind::Authorization,
      Self::Timing(_) => ErrorKind::Timing,
      Self::Conflict(_) => ErrorKind::Conflict,
      Self::NotFound(_) => ErrorKind::NotFound,
      Self::TransientDelivery(_) => ErrorKind::TransientDelivery,
      Self::PermanentDelivery(_) => ErrorKind::PermanentDelivery,
      Self::Storage(_) => ErrorKind::Storage,
    }
  }

  /// Expected outcomes that are reported to the caller rather than logged as
  /// faults.
  pub fn is_rejection(&self) -> bool {
    matches!(
      self,
      Self::Validation(_)
        | Self::Authorization(_)
        | Self::Timing(_)
        | Self::Conflict(_)
        | Self::NotFound(_)
    )
  }
}

/// Field-less mirror of [`Error`], used where the error itself cannot be
/// cloned or serialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Validation,
  Authorization,
  Timing,
  Conflict,
  NotFound,
  TransientDelivery,
  PermanentDelivery,
  Storage,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
