//! The acting-user extractor.
//!
//! Identity is issued upstream; by the time a request reaches this router
//! the caller's user id travels in the `x-huddle-user` header. Unknown ids
//! are rejected like missing ones.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use huddle_cascade::{Engine, Sender};
use huddle_core::{Error, store::Store, user::User};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_HEADER: &str = "x-huddle-user";

/// The user on whose behalf the request runs.
pub struct Actor(pub User);

/// Reject non-admins with the standard permission message.
pub fn require_admin(user: &User) -> Result<(), ApiError> {
  if user.is_admin() {
    Ok(())
  } else {
    Err(Error::Authorization("权限不足，只有管理员可以执行此操作".into()).into())
  }
}

impl<S, T> FromRequestParts<Arc<Engine<S, T>>> for Actor
where
  S: Store,
  T: Sender,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    engine: &Arc<Engine<S, T>>,
  ) -> Result<Self, Self::Rejection> {
    let raw = parts
      .headers
      .get(ACTOR_HEADER)
      .and_then(|v| v.to_str().ok())
      .ok_or(ApiError::Unauthenticated)?;
    let user_id = Uuid::parse_str(raw.trim()).map_err(|_| ApiError::Unauthenticated)?;

    match engine.actor(user_id).await {
      Ok(user) => Ok(Actor(user)),
      Err(Error::NotFound(_)) => Err(ApiError::Unauthenticated),
      Err(e) => Err(e.into()),
    }
  }
}
