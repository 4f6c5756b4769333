//! Append-only operation log for event lifecycle changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{registration::RegistrationStats, user::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
  Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
  pub log_id:         Uuid,
  pub event_id:       Uuid,
  pub action:         AuditAction,
  pub operator_id:    Uuid,
  pub operator_role:  Role,
  pub event_title:    String,
  pub event_time:     DateTime<Utc>,
  pub reason:         String,
  /// Registration counts before the cascade touched them.
  pub before:         RegistrationStats,
  /// Registration counts after the bulk cancel; `None` if it failed.
  pub after:          Option<RegistrationStats>,
  pub operation_time: DateTime<Utc>,
}

/// Input to [`crate::store::AuditLog::append_audit`].
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
  pub event_id:       Uuid,
  pub action:         AuditAction,
  pub operator_id:    Uuid,
  pub operator_role:  Role,
  pub event_title:    String,
  pub event_time:     DateTime<Utc>,
  pub reason:         String,
  pub before:         RegistrationStats,
  pub after:          Option<RegistrationStats>,
  pub operation_time: DateTime<Utc>,
}
