//! Handlers for registration endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/events/{id}/registrations` | Records plus per-status counts |
//! | `POST` | `/events/{id}/registration` | Body: `{"choice":"sign_up"\|"leave"}` |
//! | `POST` | `/registrations/{id}/attendance` | Admin only. Body: `{"status":"present"\|"absent"}` |
//! | `POST` | `/registrations/{id}/check-in` | The registrant only |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use huddle_cascade::{Engine, Sender, ledger::MemberChoice};
use huddle_core::{
  registration::{Registration, RegistrationStats, RegistrationStatus},
  store::Store,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{actor::Actor, error::ApiError};

#[derive(Debug, Serialize)]
pub struct RegistrationList {
  pub stats:         RegistrationStats,
  pub registrations: Vec<Registration>,
}

/// `GET /events/{id}/registrations`
pub async fn list<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Path(event_id): Path<Uuid>,
) -> Result<Json<RegistrationList>, ApiError> {
  let event = engine.events().get_active(event_id).await?;
  let registrations = engine.ledger().list_by_event(event.event_id).await?;
  Ok(Json(RegistrationList {
    stats: RegistrationStats::tally(&registrations),
    registrations,
  }))
}

#[derive(Debug, Deserialize)]
pub struct ChoiceBody {
  pub choice: MemberChoice,
}

/// `POST /events/{id}/registration`
pub async fn register<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  Path(event_id): Path<Uuid>,
  Json(body): Json<ChoiceBody>,
) -> Result<Json<Registration>, ApiError> {
  let registration = engine
    .ledger()
    .register(&actor, event_id, body.choice)
    .await?;
  Ok(Json(registration))
}

#[derive(Debug, Deserialize)]
pub struct AttendanceBody {
  pub status: RegistrationStatus,
}

/// `POST /registrations/{id}/attendance`
pub async fn attendance<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  Path(registration_id): Path<Uuid>,
  Json(body): Json<AttendanceBody>,
) -> Result<Json<Registration>, ApiError> {
  let registration = engine
    .ledger()
    .update_attendance(&actor, registration_id, body.status)
    .await?;
  Ok(Json(registration))
}

/// `POST /registrations/{id}/check-in`
pub async fn check_in<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  Path(registration_id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
  Ok(Json(engine.ledger().check_in(&actor, registration_id).await?))
}
