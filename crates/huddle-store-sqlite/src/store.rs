//! [`SqliteStore`]: the SQLite implementation of the Huddle storage traits.

use std::path::Path;

use chrono::{DateTime, Utc};
use huddle_core::{
  audit::{AuditEntry, NewAuditEntry},
  event::{Event, EventStatus, NewEvent, SoftDelete},
  notification::{DeliveryStatus, NewNotification, NotificationAttempt},
  registration::{Registration, RegistrationStatus},
  store::{
    AuditLog, Backend, Directory, EventStore, NotificationQuery, NotificationStore,
    RegistrationStore,
  },
  user::{NewUser, User},
};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    AUDIT_COLUMNS, EVENT_COLUMNS, NOTIFICATION_COLUMNS, REGISTRATION_COLUMNS,
    RawAudit, RawEvent, RawNotification, RawRegistration, RawUser, USER_COLUMNS,
    encode_audit_action, encode_dt, encode_role, encode_uuid,
  },
  schema::SCHEMA,
};

/// Outcome of a write whose precondition is checked inside the connection
/// thread, so the check and the write cannot interleave with other callers.
enum Guarded<T> {
  Done(T),
  Missing,
  Conflict,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Huddle store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "sqlite store opened");
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn fetch_event(&self, id: Uuid) -> Result<Option<Event>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = ?1"),
              rusqlite::params![id_str],
              RawEvent::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawEvent::into_event).transpose()
  }

  async fn fetch_registration(&self, id: Uuid) -> Result<Option<Registration>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawRegistration> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE \
                 registration_id = ?1"
              ),
              rusqlite::params![id_str],
              RawRegistration::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawRegistration::into_registration).transpose()
  }

  async fn fetch_notification(&self, id: Uuid) -> Result<Option<NotificationAttempt>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawNotification> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE \
                 notification_id = ?1"
              ),
              rusqlite::params![id_str],
              RawNotification::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawNotification::into_notification).transpose()
  }

  /// Run a single-row `UPDATE` and report how many rows it touched.
  async fn execute(&self, sql: &'static str, values: Vec<Value>) -> Result<usize> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(sql, rusqlite::params_from_iter(values.iter()))?)
      })
      .await?;
    Ok(changed)
  }
}

fn text(s: String) -> Value { Value::Text(s) }

fn opt_text(s: Option<String>) -> Value { s.map_or(Value::Null, Value::Text) }

/// `WHERE` fragments and their bound values for a notification query.
fn filter_clauses(query: &NotificationQuery) -> (Vec<String>, Vec<Value>) {
  let mut conds: Vec<String> = vec![];
  let mut values: Vec<Value> = vec![];

  let mut push = |cond: &str, value: Value| {
    values.push(value);
    conds.push(format!("{cond} ?{}", values.len()));
  };
  if let Some(id) = query.user_id {
    push("user_id =", text(encode_uuid(id)));
  }
  if let Some(id) = query.event_id {
    push("event_id =", text(encode_uuid(id)));
  }
  if let Some(status) = query.status {
    push("status =", text(status.as_str().to_owned()));
  }
  if let Some(kind) = query.kind {
    push("kind =", text(kind.as_str().to_owned()));
  }
  if let Some(after) = query.created_after {
    push("created_at >=", text(encode_dt(after)));
  }
  if let Some(before) = query.created_before {
    push("created_at <", text(encode_dt(before)));
  }
  if let Some(n) = query.retry_count_below {
    push("retry_count <", Value::Integer(i64::from(n)));
  }

  (conds, values)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

// ─── Backend ─────────────────────────────────────────────────────────────────

impl Backend for SqliteStore {
  type Error = Error;
}

// ─── Events ──────────────────────────────────────────────────────────────────

impl EventStore for SqliteStore {
  async fn insert_event(&self, input: NewEvent) -> Result<Event> {
    let now = input.created_at;
    let event = Event {
      event_id:      Uuid::new_v4(),
      creator_id:    input.creator_id,
      title:         input.title,
      location:      input.location,
      content:       input.content,
      notes:         input.notes,
      scheduled_at:  input.scheduled_at,
      status:        EventStatus::Registering,
      is_deleted:    false,
      delete_time:   None,
      deleted_by:    None,
      delete_reason: None,
      created_at:    now,
      updated_at:    now,
    };

    let values = vec![
      text(encode_uuid(event.event_id)),
      text(encode_uuid(event.creator_id)),
      text(event.title.clone()),
      opt_text(event.location.clone()),
      opt_text(event.content.clone()),
      opt_text(event.notes.clone()),
      text(encode_dt(event.scheduled_at)),
      text(event.status.as_str().to_owned()),
      text(encode_dt(now)),
    ];

    self
      .execute(
        "INSERT INTO events (
           event_id, creator_id, title, location, content, notes,
           scheduled_at, status, is_deleted, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)",
        values,
      )
      .await?;

    Ok(event)
  }

  async fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
    self.fetch_event(id).await
  }

  async fn list_events(&self, include_deleted: bool) -> Result<Vec<Event>> {
    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let filter = if include_deleted { "" } else { "WHERE is_deleted = 0" };
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_COLUMNS} FROM events {filter} ORDER BY scheduled_at DESC"
        ))?;
        let rows = stmt
          .query_map([], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn set_event_status(
    &self,
    id:     Uuid,
    status: EventStatus,
    at:     DateTime<Utc>,
  ) -> Result<()> {
    let changed = self
      .execute(
        "UPDATE events SET status = ?1, updated_at = ?2 WHERE event_id = ?3",
        vec![
          text(status.as_str().to_owned()),
          text(encode_dt(at)),
          text(encode_uuid(id)),
        ],
      )
      .await?;
    if changed == 0 {
      return Err(Error::EventNotFound(id));
    }
    Ok(())
  }

  async fn soft_delete_event(&self, id: Uuid, deletion: SoftDelete) -> Result<Event> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(deletion.at);
    let by_str = encode_uuid(deletion.deleted_by);
    let reason = deletion.reason;

    let outcome: Guarded<RawEvent> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let deleted: Option<bool> = tx
          .query_row(
            "SELECT is_deleted FROM events WHERE event_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;

        match deleted {
          None => return Ok(Guarded::Missing),
          Some(true) => return Ok(Guarded::Conflict),
          Some(false) => {}
        }

        let changed = tx.execute(
          "UPDATE events
           SET is_deleted = 1, delete_time = ?1, deleted_by = ?2,
               delete_reason = ?3, updated_at = ?1
           WHERE event_id = ?4 AND is_deleted = 0",
          rusqlite::params![at_str, by_str, reason, id_str],
        )?;
        if changed == 0 {
          return Ok(Guarded::Conflict);
        }

        let raw = tx.query_row(
          &format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = ?1"),
          rusqlite::params![id_str],
          RawEvent::from_row,
        )?;
        tx.commit()?;
        Ok(Guarded::Done(raw))
      })
      .await?;

    match outcome {
      Guarded::Done(raw) => raw.into_event(),
      Guarded::Missing => Err(Error::EventNotFound(id)),
      Guarded::Conflict => Err(Error::EventAlreadyDeleted(id)),
    }
  }
}

// ─── Registrations ───────────────────────────────────────────────────────────

impl RegistrationStore for SqliteStore {
  async fn get_registration(&self, id: Uuid) -> Result<Option<Registration>> {
    self.fetch_registration(id).await
  }

  async fn find_registration(
    &self,
    event_id: Uuid,
    user_id:  Uuid,
  ) -> Result<Option<Registration>> {
    let event_str = encode_uuid(event_id);
    let user_str  = encode_uuid(user_id);

    let raw: Option<RawRegistration> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {REGISTRATION_COLUMNS} FROM registrations
                 WHERE event_id = ?1 AND user_id = ?2"
              ),
              rusqlite::params![event_str, user_str],
              RawRegistration::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRegistration::into_registration).transpose()
  }

  async fn insert_registration(
    &self,
    event_id: Uuid,
    user_id:  Uuid,
    status:   RegistrationStatus,
    at:       DateTime<Utc>,
  ) -> Result<Registration> {
    let registration = Registration {
      registration_id: Uuid::new_v4(),
      event_id,
      user_id,
      status,
      created_at: at,
      updated_at: at,
      cancel_reason: None,
      cancel_time: None,
    };

    let id_str     = encode_uuid(registration.registration_id);
    let event_str  = encode_uuid(event_id);
    let user_str   = encode_uuid(user_id);
    let status_str = status.as_str();
    let at_str     = encode_dt(at);

    let outcome: Guarded<()> = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO registrations (
             registration_id, event_id, user_id, status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![id_str, event_str, user_str, status_str, at_str],
        );
        match res {
          Ok(_) => Ok(Guarded::Done(())),
          Err(e) if is_unique_violation(&e) => Ok(Guarded::Conflict),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    match outcome {
      Guarded::Done(()) => Ok(registration),
      Guarded::Missing | Guarded::Conflict => {
        Err(Error::DuplicateRegistration { event_id, user_id })
      }
    }
  }

  async fn update_registration_status(
    &self,
    id:       Uuid,
    expected: RegistrationStatus,
    next:     RegistrationStatus,
    at:       DateTime<Utc>,
  ) -> Result<Option<Registration>> {
    let changed = self
      .execute(
        "UPDATE registrations SET status = ?1, updated_at = ?2
         WHERE registration_id = ?3 AND status = ?4",
        vec![
          text(next.as_str().to_owned()),
          text(encode_dt(at)),
          text(encode_uuid(id)),
          text(expected.as_str().to_owned()),
        ],
      )
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.fetch_registration(id).await
  }

  async fn cancel_registrations(
    &self,
    event_id: Uuid,
    reason:   String,
    at:       DateTime<Utc>,
  ) -> Result<Vec<Registration>> {
    let event_str = encode_uuid(event_id);
    let at_str    = encode_dt(at);

    let raws: Vec<RawRegistration> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE registrations
           SET status = 'cancelled', cancel_reason = ?1, cancel_time = ?2,
               updated_at = ?2
           WHERE event_id = ?3 AND status IN ('signed_up', 'leave_requested')",
          rusqlite::params![reason, at_str, event_str],
        )?;
        let rows = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations
             WHERE event_id = ?1 ORDER BY created_at"
          ))?;
          stmt
            .query_map(rusqlite::params![event_str], RawRegistration::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawRegistration::into_registration)
      .collect()
  }

  async fn list_registrations(&self, event_id: Uuid) -> Result<Vec<Registration>> {
    let event_str = encode_uuid(event_id);

    let raws: Vec<RawRegistration> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {REGISTRATION_COLUMNS} FROM registrations
           WHERE event_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![event_str], RawRegistration::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawRegistration::into_registration)
      .collect()
  }
}

// ─── Notifications ───────────────────────────────────────────────────────────

impl NotificationStore for SqliteStore {
  async fn insert_notification(&self, input: NewNotification) -> Result<NotificationAttempt> {
    let attempt = NotificationAttempt {
      notification_id: Uuid::new_v4(),
      event_id:        input.event_id,
      user_id:         input.user_id,
      operator_id:     input.operator_id,
      kind:            input.kind,
      status:          input.status,
      title:           input.title,
      content:         input.content,
      retry_count:     input.retry_count,
      last_retry_time: (input.retry_count > 0).then_some(input.created_at),
      error:           None,
      created_at:      input.created_at,
      send_time:       (input.status == DeliveryStatus::Sent).then_some(input.created_at),
      read_time:       None,
      metadata:        input.metadata,
    };

    let values = vec![
      text(encode_uuid(attempt.notification_id)),
      text(encode_uuid(attempt.event_id)),
      text(encode_uuid(attempt.user_id)),
      text(encode_uuid(attempt.operator_id)),
      text(attempt.kind.as_str().to_owned()),
      text(attempt.status.as_str().to_owned()),
      text(attempt.title.clone()),
      text(attempt.content.clone()),
      Value::Integer(i64::from(attempt.retry_count)),
      opt_text(attempt.last_retry_time.map(encode_dt)),
      text(encode_dt(attempt.created_at)),
      opt_text(attempt.send_time.map(encode_dt)),
      text(serde_json::to_string(&attempt.metadata)?),
    ];

    self
      .execute(
        "INSERT INTO notifications (
           notification_id, event_id, user_id, operator_id, kind, status,
           title, content, retry_count, last_retry_time, created_at,
           send_time, metadata
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        values,
      )
      .await?;

    Ok(attempt)
  }

  async fn get_notification(&self, id: Uuid) -> Result<Option<NotificationAttempt>> {
    self.fetch_notification(id).await
  }

  async fn record_retry(
    &self,
    id:          Uuid,
    retry_count: u32,
    error:       String,
    at:          DateTime<Utc>,
  ) -> Result<()> {
    self
      .execute(
        "UPDATE notifications
         SET status = 'pending', retry_count = ?1, last_retry_time = ?2, error = ?3
         WHERE notification_id = ?4",
        vec![
          Value::Integer(i64::from(retry_count)),
          text(encode_dt(at)),
          text(error),
          text(encode_uuid(id)),
        ],
      )
      .await?;
    Ok(())
  }

  async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
    self
      .execute(
        "UPDATE notifications SET status = 'sent', send_time = ?1, error = NULL
         WHERE notification_id = ?2",
        vec![text(encode_dt(at)), text(encode_uuid(id))],
      )
      .await?;
    Ok(())
  }

  async fn mark_failed(
    &self,
    id:          Uuid,
    retry_count: u32,
    error:       String,
    at:          DateTime<Utc>,
  ) -> Result<()> {
    self
      .execute(
        "UPDATE notifications
         SET status = 'failed', retry_count = ?1, error = ?2, last_retry_time = ?3
         WHERE notification_id = ?4",
        vec![
          Value::Integer(i64::from(retry_count)),
          text(error),
          text(encode_dt(at)),
          text(encode_uuid(id)),
        ],
      )
      .await?;
    Ok(())
  }

  async fn mark_read(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<NotificationAttempt>> {
    let changed = self
      .execute(
        "UPDATE notifications SET status = 'read', read_time = ?1
         WHERE notification_id = ?2 AND status = 'sent'",
        vec![text(encode_dt(at)), text(encode_uuid(id))],
      )
      .await?;
    if changed == 0 {
      return Ok(None);
    }
    self.fetch_notification(id).await
  }

  async fn claim_failed(&self, id: Uuid, retry_count: u32) -> Result<bool> {
    let changed = self
      .execute(
        "UPDATE notifications SET status = 'pending'
         WHERE notification_id = ?1 AND status = 'failed' AND retry_count = ?2",
        vec![text(encode_uuid(id)), Value::Integer(i64::from(retry_count))],
      )
      .await?;
    Ok(changed == 1)
  }

  async fn release_failed(
    &self,
    id:          Uuid,
    retry_count: u32,
    error:       Option<String>,
  ) -> Result<()> {
    self
      .execute(
        "UPDATE notifications
         SET status = 'failed', retry_count = ?1, error = COALESCE(?2, error)
         WHERE notification_id = ?3",
        vec![
          Value::Integer(i64::from(retry_count)),
          opt_text(error),
          text(encode_uuid(id)),
        ],
      )
      .await?;
    Ok(())
  }

  async fn delete_notification(&self, id: Uuid) -> Result<bool> {
    let changed = self
      .execute(
        "DELETE FROM notifications WHERE notification_id = ?1",
        vec![text(encode_uuid(id))],
      )
      .await?;
    Ok(changed > 0)
  }

  async fn query_notifications(
    &self,
    query: &NotificationQuery,
  ) -> Result<Vec<NotificationAttempt>> {
    let (conds, values) = filter_clauses(query);

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };
    let limit  = query.limit.map_or(-1, |l| l as i64);
    let offset = query.offset.unwrap_or(0) as i64;
    let sql = format!(
      "SELECT {NOTIFICATION_COLUMNS} FROM notifications {where_clause}
       ORDER BY created_at DESC LIMIT {limit} OFFSET {offset}"
    );

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(values.iter()),
            RawNotification::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawNotification::into_notification)
      .collect()
  }

  async fn count_notifications(
    &self,
    status:        DeliveryStatus,
    created_after: DateTime<Utc>,
  ) -> Result<usize> {
    let status_str = status.as_str();
    let after_str  = encode_dt(created_after);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM notifications WHERE status = ?1 AND created_at >= ?2",
          rusqlite::params![status_str, after_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as usize)
  }

  async fn delete_notifications_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
    self
      .execute(
        "DELETE FROM notifications WHERE created_at < ?1",
        vec![text(encode_dt(cutoff))],
      )
      .await
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

impl Directory for SqliteStore {
  async fn add_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:      Uuid::new_v4(),
      display_name: input.display_name,
      real_name:    input.real_name,
      role:         input.role,
      created_at:   input.created_at,
    };

    self
      .execute(
        "INSERT INTO users (user_id, display_name, real_name, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        vec![
          text(encode_uuid(user.user_id)),
          opt_text(user.display_name.clone()),
          opt_text(user.real_name.clone()),
          text(encode_role(user.role).to_owned()),
          text(encode_dt(user.created_at)),
        ],
      )
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              rusqlite::params![id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn get_users(&self, ids: &[Uuid]) -> Result<Vec<User>> {
    if ids.is_empty() {
      return Ok(vec![]);
    }
    let values: Vec<Value> = ids.iter().map(|id| text(encode_uuid(*id))).collect();
    let placeholders = (1..=values.len())
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    let sql =
      format!("SELECT {USER_COLUMNS} FROM users WHERE user_id IN ({placeholders})");

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(values.iter()), RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    let raws: Vec<RawUser> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map([], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }
}

// ─── Event logs ──────────────────────────────────────────────────────────────

impl AuditLog for SqliteStore {
  async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry> {
    let entry = AuditEntry {
      log_id:         Uuid::new_v4(),
      event_id:       entry.event_id,
      action:         entry.action,
      operator_id:    entry.operator_id,
      operator_role:  entry.operator_role,
      event_title:    entry.event_title,
      event_time:     entry.event_time,
      reason:         entry.reason,
      before:         entry.before,
      after:          entry.after,
      operation_time: entry.operation_time,
    };

    let values = vec![
      text(encode_uuid(entry.log_id)),
      text(encode_uuid(entry.event_id)),
      text(encode_audit_action(entry.action).to_owned()),
      text(encode_uuid(entry.operator_id)),
      text(encode_role(entry.operator_role).to_owned()),
      text(entry.event_title.clone()),
      text(encode_dt(entry.event_time)),
      text(entry.reason.clone()),
      text(serde_json::to_string(&entry.before)?),
      opt_text(entry.after.as_ref().map(serde_json::to_string).transpose()?),
      text(encode_dt(entry.operation_time)),
    ];

    self
      .execute(
        "INSERT INTO event_logs (
           log_id, event_id, action, operator_id, operator_role, event_title,
           event_time, reason, before_stats, after_stats, operation_time
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        values,
      )
      .await?;

    Ok(entry)
  }

  async fn list_audit(&self, event_id: Uuid) -> Result<Vec<AuditEntry>> {
    let event_str = encode_uuid(event_id);

    let raws: Vec<RawAudit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {AUDIT_COLUMNS} FROM event_logs
           WHERE event_id = ?1 ORDER BY operation_time"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![event_str], RawAudit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAudit::into_entry).collect()
  }
}
