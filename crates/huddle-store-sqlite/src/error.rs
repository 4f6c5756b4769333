//! Error type for `huddle-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum column held a value no variant maps to.
  #[error("unknown {column} value: {value:?}")]
  UnknownValue { column: &'static str, value: String },

  #[error("event not found: {0}")]
  EventNotFound(Uuid),

  #[error("event {0} is already deleted")]
  EventAlreadyDeleted(Uuid),

  #[error("registration for user {user_id} on event {event_id} already exists")]
  DuplicateRegistration { event_id: Uuid, user_id: Uuid },
}

impl From<Error> for huddle_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::EventNotFound(_) => huddle_core::Error::NotFound("训练不存在".into()),
      Error::EventAlreadyDeleted(_) => {
        huddle_core::Error::Conflict("训练已被删除".into())
      }
      Error::DuplicateRegistration { .. } => {
        huddle_core::Error::Conflict("报名记录已存在".into())
      }
      other => huddle_core::Error::storage(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
