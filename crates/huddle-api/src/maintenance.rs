//! Admin-only delivery maintenance.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/maintenance/reprocess` | Body: `{"max_age_hours":24,"max_retries":3}` (both optional) |
//! | `POST` | `/events/{id}/notifications/retry` | Body: `{"max_retries":3}` (optional) |
//! | `GET`  | `/maintenance/failed` | `?event_id=&limit=&max_age_hours=` |
//! | `GET`  | `/maintenance/failures` | Breakdown of failed notices |
//! | `GET`  | `/maintenance/stats` | `?days=7` |
//! | `POST` | `/maintenance/cleanup` | Body: `{"retention_days":30}` (optional) |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::Duration;
use huddle_cascade::{
  Engine, Sender,
  delivery::{self, FailedFilter, FailureAnalysis, ProcessResult},
};
use huddle_core::{
  notification::{DeliveryStats, NotificationAttempt},
  store::Store,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  actor::{Actor, require_admin},
  error::ApiError,
};

const DEFAULT_STATS_DAYS: u32 = 7;

fn hours(h: Option<i64>, default: Duration) -> Result<Duration, ApiError> {
  match h {
    None => Ok(default),
    Some(h) if h > 0 => Duration::try_hours(h)
      .ok_or_else(|| ApiError::BadRequest(format!("window too large: {h} hours"))),
    Some(h) => Err(ApiError::BadRequest(format!("window must be positive, got {h}"))),
  }
}

// ─── Reprocess ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReprocessBody {
  pub max_age_hours: Option<i64>,
  pub max_retries:   Option<u32>,
}

/// `POST /maintenance/reprocess`
pub async fn reprocess<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  body: Option<Json<ReprocessBody>>,
) -> Result<Json<ProcessResult>, ApiError> {
  require_admin(&actor)?;
  let body = body.map(|Json(b)| b).unwrap_or_default();
  let max_age = hours(body.max_age_hours, delivery::default_reprocess_age())?;
  let max_retries = body
    .max_retries
    .unwrap_or(engine.config().dispatch.retry.max_retries);
  Ok(Json(engine.delivery().reprocess(max_age, max_retries).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RetryBody {
  pub max_retries: Option<u32>,
}

/// `POST /events/{id}/notifications/retry`
pub async fn retry_event<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  Path(event_id): Path<Uuid>,
  body: Option<Json<RetryBody>>,
) -> Result<Json<ProcessResult>, ApiError> {
  require_admin(&actor)?;
  let body = body.map(|Json(b)| b).unwrap_or_default();
  let max_retries = body
    .max_retries
    .unwrap_or(engine.config().dispatch.retry.max_retries);
  Ok(Json(
    engine.delivery().retry_for_event(event_id, max_retries).await?,
  ))
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FailedParams {
  pub event_id:      Option<Uuid>,
  pub limit:         Option<usize>,
  pub max_age_hours: Option<i64>,
}

/// `GET /maintenance/failed`
pub async fn failed<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  Query(params): Query<FailedParams>,
) -> Result<Json<Vec<NotificationAttempt>>, ApiError> {
  require_admin(&actor)?;
  let max_age = match params.max_age_hours {
    Some(h) => Some(hours(Some(h), delivery::default_reprocess_age())?),
    None => None,
  };
  let filter = FailedFilter { event_id: params.event_id, max_age, limit: params.limit };
  Ok(Json(engine.delivery().list_failed(&filter).await?))
}

/// `GET /maintenance/failures`
pub async fn failures<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
) -> Result<Json<FailureAnalysis>, ApiError> {
  require_admin(&actor)?;
  Ok(Json(engine.delivery().analyze_failures().await?))
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
  pub days: Option<u32>,
}

/// `GET /maintenance/stats`
pub async fn stats<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  Query(params): Query<StatsParams>,
) -> Result<Json<DeliveryStats>, ApiError> {
  require_admin(&actor)?;
  let days = params.days.unwrap_or(DEFAULT_STATS_DAYS);
  Ok(Json(engine.delivery().stats(days).await?))
}

// ─── Cleanup ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CleanupBody {
  pub retention_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResult {
  pub removed: usize,
}

/// `POST /maintenance/cleanup`
pub async fn cleanup<S: Store, T: Sender>(
  State(engine): State<Arc<Engine<S, T>>>,
  Actor(actor): Actor,
  body: Option<Json<CleanupBody>>,
) -> Result<Json<CleanupResult>, ApiError> {
  require_admin(&actor)?;
  let body = body.map(|Json(b)| b).unwrap_or_default();
  let retention = match body.retention_days {
    None => delivery::default_retention(),
    Some(d) if d > 0 => Duration::try_days(d)
      .ok_or_else(|| ApiError::BadRequest(format!("retention too large: {d} days")))?,
    Some(d) => {
      return Err(ApiError::BadRequest(format!(
        "retention must be positive, got {d}"
      )));
    }
  };
  let removed = engine.delivery().cleanup(retention).await?;
  Ok(Json(CleanupResult { removed }))
}
