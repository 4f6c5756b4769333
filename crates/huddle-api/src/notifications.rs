//! Handlers for the caller's own notifications.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/notifications` | `?status=&limit=&offset=`, newest first |
//! | `POST` | `/notifications/{id}/read` | Owner only |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use huddle_cascade::{Engine, Sender};
use huddle_core::{
  notification::{DeliveryStatus, NotificationAttempt},
  store::Store,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{actor::Actor, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct InboxParams {
  pub status: Option<DeliveryStatus>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /notifications`
pub async fn inbox<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  Query(params): Query<InboxParams>,
) -> Result<Json<Vec<NotificationAttempt>>, ApiError> {
  let records = engine
    .delivery()
    .list_for_user(actor.user_id, params.status, params.limit, params.offset)
    .await?;
  Ok(Json(records))
}

/// `POST /notifications/{id}/read`
pub async fn mark_read<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<NotificationAttempt>, ApiError> {
  Ok(Json(engine.delivery().mark_read(&actor, id).await?))
}
