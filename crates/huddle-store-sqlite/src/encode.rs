//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order matches chronological order.
//! Structured fields (notification metadata, registration stats) are stored as
//! compact JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use huddle_core::{
  audit::{AuditAction, AuditEntry},
  event::{Event, EventStatus},
  notification::{DeliveryStatus, NotificationAttempt, NotificationKind},
  registration::{Registration, RegistrationStatus},
  user::{Role, User},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

fn unknown(column: &'static str, value: &str) -> Error {
  Error::UnknownValue { column, value: value.to_owned() }
}

pub fn encode_role(r: Role) -> &'static str {
  match r {
    Role::Admin => "admin",
    Role::Member => "member",
  }
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "admin" => Ok(Role::Admin),
    "member" => Ok(Role::Member),
    other => Err(unknown("role", other)),
  }
}

pub fn decode_event_status(s: &str) -> Result<EventStatus> {
  match s {
    "registering" => Ok(EventStatus::Registering),
    "ongoing" => Ok(EventStatus::Ongoing),
    "finished" => Ok(EventStatus::Finished),
    other => Err(unknown("event status", other)),
  }
}

pub fn decode_registration_status(s: &str) -> Result<RegistrationStatus> {
  RegistrationStatus::ALL
    .into_iter()
    .find(|st| st.as_str() == s)
    .ok_or_else(|| unknown("registration status", s))
}

pub fn decode_delivery_status(s: &str) -> Result<DeliveryStatus> {
  DeliveryStatus::ALL
    .into_iter()
    .find(|st| st.as_str() == s)
    .ok_or_else(|| unknown("delivery status", s))
}

pub fn decode_kind(s: &str) -> Result<NotificationKind> {
  match s {
    "event_deleted" => Ok(NotificationKind::EventDeleted),
    "batch_summary" => Ok(NotificationKind::BatchSummary),
    other => Err(unknown("notification kind", other)),
  }
}

pub fn encode_audit_action(a: AuditAction) -> &'static str {
  match a {
    AuditAction::Delete => "delete",
  }
}

pub fn decode_audit_action(s: &str) -> Result<AuditAction> {
  match s {
    "delete" => Ok(AuditAction::Delete),
    other => Err(unknown("audit action", other)),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, display_name, real_name, role, created_at";

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:      String,
  pub display_name: Option<String>,
  pub real_name:    Option<String>,
  pub role:         String,
  pub created_at:   String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:      row.get(0)?,
      display_name: row.get(1)?,
      real_name:    row.get(2)?,
      role:         row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:      decode_uuid(&self.user_id)?,
      display_name: self.display_name,
      real_name:    self.real_name,
      role:         decode_role(&self.role)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const EVENT_COLUMNS: &str = "event_id, creator_id, title, location, content, \
                                 notes, scheduled_at, status, is_deleted, \
                                 delete_time, deleted_by, delete_reason, \
                                 created_at, updated_at";

/// Raw strings read directly from an `events` row.
pub struct RawEvent {
  pub event_id:      String,
  pub creator_id:    String,
  pub title:         String,
  pub location:      Option<String>,
  pub content:       Option<String>,
  pub notes:         Option<String>,
  pub scheduled_at:  String,
  pub status:        String,
  pub is_deleted:    bool,
  pub delete_time:   Option<String>,
  pub deleted_by:    Option<String>,
  pub delete_reason: Option<String>,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:      row.get(0)?,
      creator_id:    row.get(1)?,
      title:         row.get(2)?,
      location:      row.get(3)?,
      content:       row.get(4)?,
      notes:         row.get(5)?,
      scheduled_at:  row.get(6)?,
      status:        row.get(7)?,
      is_deleted:    row.get(8)?,
      delete_time:   row.get(9)?,
      deleted_by:    row.get(10)?,
      delete_reason: row.get(11)?,
      created_at:    row.get(12)?,
      updated_at:    row.get(13)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      event_id:      decode_uuid(&self.event_id)?,
      creator_id:    decode_uuid(&self.creator_id)?,
      title:         self.title,
      location:      self.location,
      content:       self.content,
      notes:         self.notes,
      scheduled_at:  decode_dt(&self.scheduled_at)?,
      status:        decode_event_status(&self.status)?,
      is_deleted:    self.is_deleted,
      delete_time:   decode_opt_dt(self.delete_time)?,
      deleted_by:    decode_opt_uuid(self.deleted_by)?,
      delete_reason: self.delete_reason,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub const REGISTRATION_COLUMNS: &str = "registration_id, event_id, user_id, status, \
                                        created_at, updated_at, cancel_reason, \
                                        cancel_time";

/// Raw strings read directly from a `registrations` row.
pub struct RawRegistration {
  pub registration_id: String,
  pub event_id:        String,
  pub user_id:         String,
  pub status:          String,
  pub created_at:      String,
  pub updated_at:      String,
  pub cancel_reason:   Option<String>,
  pub cancel_time:     Option<String>,
}

impl RawRegistration {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      registration_id: row.get(0)?,
      event_id:        row.get(1)?,
      user_id:         row.get(2)?,
      status:          row.get(3)?,
      created_at:      row.get(4)?,
      updated_at:      row.get(5)?,
      cancel_reason:   row.get(6)?,
      cancel_time:     row.get(7)?,
    })
  }

  pub fn into_registration(self) -> Result<Registration> {
    Ok(Registration {
      registration_id: decode_uuid(&self.registration_id)?,
      event_id:        decode_uuid(&self.event_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      status:          decode_registration_status(&self.status)?,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
      cancel_reason:   self.cancel_reason,
      cancel_time:     decode_opt_dt(self.cancel_time)?,
    })
  }
}

pub const NOTIFICATION_COLUMNS: &str = "notification_id, event_id, user_id, \
                                        operator_id, kind, status, title, \
                                        content, retry_count, last_retry_time, \
                                        error, created_at, send_time, \
                                        read_time, metadata";

/// Raw strings read directly from a `notifications` row.
pub struct RawNotification {
  pub notification_id: String,
  pub event_id:        String,
  pub user_id:         String,
  pub operator_id:     String,
  pub kind:            String,
  pub status:          String,
  pub title:           String,
  pub content:         String,
  pub retry_count:     u32,
  pub last_retry_time: Option<String>,
  pub error:           Option<String>,
  pub created_at:      String,
  pub send_time:       Option<String>,
  pub read_time:       Option<String>,
  pub metadata:        String,
}

impl RawNotification {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      event_id:        row.get(1)?,
      user_id:         row.get(2)?,
      operator_id:     row.get(3)?,
      kind:            row.get(4)?,
      status:          row.get(5)?,
      title:           row.get(6)?,
      content:         row.get(7)?,
      retry_count:     row.get(8)?,
      last_retry_time: row.get(9)?,
      error:           row.get(10)?,
      created_at:      row.get(11)?,
      send_time:       row.get(12)?,
      read_time:       row.get(13)?,
      metadata:        row.get(14)?,
    })
  }

  pub fn into_notification(self) -> Result<NotificationAttempt> {
    Ok(NotificationAttempt {
      notification_id: decode_uuid(&self.notification_id)?,
      event_id:        decode_uuid(&self.event_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      operator_id:     decode_uuid(&self.operator_id)?,
      kind:            decode_kind(&self.kind)?,
      status:          decode_delivery_status(&self.status)?,
      title:           self.title,
      content:         self.content,
      retry_count:     self.retry_count,
      last_retry_time: decode_opt_dt(self.last_retry_time)?,
      error:           self.error,
      created_at:      decode_dt(&self.created_at)?,
      send_time:       decode_opt_dt(self.send_time)?,
      read_time:       decode_opt_dt(self.read_time)?,
      metadata:        serde_json::from_str(&self.metadata)?,
    })
  }
}

pub const AUDIT_COLUMNS: &str = "log_id, event_id, action, operator_id, \
                                 operator_role, event_title, event_time, \
                                 reason, before_stats, after_stats, \
                                 operation_time";

/// Raw strings read directly from an `event_logs` row.
pub struct RawAudit {
  pub log_id:         String,
  pub event_id:       String,
  pub action:         String,
  pub operator_id:    String,
  pub operator_role:  String,
  pub event_title:    String,
  pub event_time:     String,
  pub reason:         String,
  pub before_stats:   String,
  pub after_stats:    Option<String>,
  pub operation_time: String,
}

impl RawAudit {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      log_id:         row.get(0)?,
      event_id:       row.get(1)?,
      action:         row.get(2)?,
      operator_id:    row.get(3)?,
      operator_role:  row.get(4)?,
      event_title:    row.get(5)?,
      event_time:     row.get(6)?,
      reason:         row.get(7)?,
      before_stats:   row.get(8)?,
      after_stats:    row.get(9)?,
      operation_time: row.get(10)?,
    })
  }

  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      log_id:         decode_uuid(&self.log_id)?,
      event_id:       decode_uuid(&self.event_id)?,
      action:         decode_audit_action(&self.action)?,
      operator_id:    decode_uuid(&self.operator_id)?,
      operator_role:  decode_role(&self.operator_role)?,
      event_title:    self.event_title,
      event_time:     decode_dt(&self.event_time)?,
      reason:         self.reason,
      before:         serde_json::from_str(&self.before_stats)?,
      after:          self
        .after_stats
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?,
      operation_time: decode_dt(&self.operation_time)?,
    })
  }
}
