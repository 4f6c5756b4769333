//! Training events and their lifecycle flags.
//!
//! An event's status only ever moves forward (registering, ongoing,
//! finished). Deletion is orthogonal and terminal: a soft-deleted event keeps
//! its row so registrations and notifications can still refer to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Ordered so that `max` never moves an event backwards.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
  Registering,
  Ongoing,
  Finished,
}

impl EventStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Registering => "registering",
      Self::Ongoing => "ongoing",
      Self::Finished => "finished",
    }
  }
}

// ─── Event ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
  pub event_id:      Uuid,
  pub creator_id:    Uuid,
  pub title:         String,
  pub location:      Option<String>,
  pub content:       Option<String>,
  pub notes:         Option<String>,
  pub scheduled_at:  DateTime<Utc>,
  pub status:        EventStatus,
  pub is_deleted:    bool,
  pub delete_time:   Option<DateTime<Utc>>,
  pub deleted_by:    Option<Uuid>,
  pub delete_reason: Option<String>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

/// Input to [`crate::store::EventStore::insert_event`]. Status and the
/// deletion fields are assigned by the store; `updated_at` starts at
/// `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
  pub creator_id:   Uuid,
  pub title:        String,
  pub location:     Option<String>,
  pub content:      Option<String>,
  pub notes:        Option<String>,
  pub scheduled_at: DateTime<Utc>,
  pub created_at:   DateTime<Utc>,
}

/// The audit fields written by a soft delete.
#[derive(Debug, Clone)]
pub struct SoftDelete {
  pub deleted_by: Uuid,
  pub reason:     String,
  pub at:         DateTime<Utc>,
}

/// The status an event should have at `now`.
///
/// Only the registering → finished edge is time-driven; an explicitly stored
/// `Ongoing` or `Finished` is never demoted.
pub fn derive_status(event: &Event, now: DateTime<Utc>) -> EventStatus {
  if event.scheduled_at < now {
    event.status.max(EventStatus::Finished)
  } else {
    event.status
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  fn event_at(scheduled_at: DateTime<Utc>, status: EventStatus) -> Event {
    let now = Utc::now();
    Event {
      event_id: Uuid::new_v4(),
      creator_id: Uuid::new_v4(),
      title: "Tuesday pull drills".into(),
      location: None,
      content: None,
      notes: None,
      scheduled_at,
      status,
      is_deleted: false,
      delete_time: None,
      deleted_by: None,
      delete_reason: None,
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn future_event_keeps_registering() {
    let now = Utc::now();
    let e = event_at(now + Duration::hours(1), EventStatus::Registering);
    assert_eq!(derive_status(&e, now), EventStatus::Registering);
  }

  #[test]
  fn past_event_becomes_finished() {
    let now = Utc::now();
    let e = event_at(now - Duration::minutes(1), EventStatus::Registering);
    assert_eq!(derive_status(&e, now), EventStatus::Finished);
  }

  #[test]
  fn status_never_moves_backwards() {
    let now = Utc::now();
    let e = event_at(now + Duration::hours(5), EventStatus::Finished);
    assert_eq!(derive_status(&e, now), EventStatus::Finished);
  }
}
