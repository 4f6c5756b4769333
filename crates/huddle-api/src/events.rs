//! Handlers for `/events` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/events` | Non-deleted events, latest first |
//! | `POST` | `/events` | Admin only. Body: [`EventDraft`] |
//! | `GET`  | `/events/{id}` | 404 if missing or deleted |
//! | `POST` | `/events/{id}/cancel` | Body: `{"reason":"..."}` (optional) |
//! | `GET`  | `/events/{id}/logs` | Admin only |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use huddle_cascade::{CancelResult, Engine, Sender, events::EventDraft};
use huddle_core::{
  Error,
  audit::AuditEntry,
  event::Event,
  store::{AuditLog, Store},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  actor::{Actor, require_admin},
  error::{ApiError, status_for},
};

// ─── List / get ──────────────────────────────────────────────────────────────

/// `GET /events`
pub async fn list<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
) -> Result<Json<Vec<Event>>, ApiError> {
  Ok(Json(engine.events().list_active().await?))
}

/// `GET /events/{id}`
pub async fn get_one<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Event>, ApiError> {
  Ok(Json(engine.events().get_active(id).await?))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /events`, returns 201 and the stored event.
pub async fn create<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  Json(draft): Json<EventDraft>,
) -> Result<impl IntoResponse, ApiError> {
  let event = engine.events().create(&actor, draft).await?;
  Ok((StatusCode::CREATED, Json(event)))
}

// ─── Cancel ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CancelBody {
  pub reason: Option<String>,
}

/// `POST /events/{id}/cancel`
///
/// Always answers with a [`CancelResult`]; the status code follows the
/// rejection kind when the cancellation did not go through.
pub async fn cancel<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
  body: Option<Json<CancelBody>>,
) -> impl IntoResponse {
  let reason = body.and_then(|Json(b)| b.reason);
  let result: CancelResult = engine
    .cascade()
    .cancel_event(id, actor.user_id, reason)
    .await
    .into();
  let status = result.error_kind.map(status_for).unwrap_or(StatusCode::OK);
  (status, Json(result))
}

// ─── Audit log ───────────────────────────────────────────────────────────────

/// `GET /events/{id}/logs`
pub async fn logs<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
  require_admin(&actor)?;
  let entries = engine
    .store()
    .list_audit(id)
    .await
    .map_err(Error::from_backend)?;
  Ok(Json(entries))
}
