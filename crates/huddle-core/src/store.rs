//! Storage traits and supporting query types.
//!
//! The backing store is a document store without cross-document
//! transactions. Each trait covers one collection; the engine layers its
//! rules (time gates, ledgers, the cancellation cascade) on top.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  audit::{AuditEntry, NewAuditEntry},
  event::{Event, EventStatus, NewEvent, SoftDelete},
  notification::{DeliveryStatus, NewNotification, NotificationAttempt, NotificationKind},
  registration::{Registration, RegistrationStatus},
  user::{NewUser, User},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`NotificationStore::query_notifications`]. Results are
/// ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct NotificationQuery {
  pub user_id:           Option<Uuid>,
  pub event_id:          Option<Uuid>,
  pub status:            Option<DeliveryStatus>,
  pub kind:              Option<NotificationKind>,
  pub created_after:     Option<DateTime<Utc>>,
  pub created_before:    Option<DateTime<Utc>>,
  /// Only records with `retry_count` strictly below this value.
  pub retry_count_below: Option<u32>,
  pub limit:             Option<usize>,
  pub offset:            Option<usize>,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Shared error plumbing for every collection trait.
///
/// Backend errors convert into [`crate::Error`] so that domain conflicts
/// raised inside the store (already deleted, duplicate registration) keep
/// their meaning once they leave it.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;
}

pub trait EventStore: Backend {
  /// Persist a new event in the `registering` state.
  fn insert_event(
    &self,
    input: NewEvent,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  /// Retrieve an event by id, deleted or not. Returns `None` if not found.
  fn get_event(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// List events ordered by `scheduled_at` descending.
  fn list_events(
    &self,
    include_deleted: bool,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  /// Overwrite the stored status. Used to persist lazily derived statuses.
  fn set_event_status(
    &self,
    id: Uuid,
    status: EventStatus,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Mark the event deleted and record who, why, and when.
  ///
  /// Conditional on the event not being deleted yet; returns a conflict
  /// error otherwise, and a not-found error for an unknown id.
  fn soft_delete_event(
    &self,
    id: Uuid,
    deletion: SoftDelete,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;
}

pub trait RegistrationStore: Backend {
  fn get_registration(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Registration>, Self::Error>> + Send + '_;

  /// The unique registration for `(event_id, user_id)`, if any.
  fn find_registration(
    &self,
    event_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Registration>, Self::Error>> + Send + '_;

  /// Create a registration. Fails with a conflict error if one already
  /// exists for the pair. `at` stamps both `created_at` and `updated_at`.
  fn insert_registration(
    &self,
    event_id: Uuid,
    user_id: Uuid,
    status: RegistrationStatus,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Registration, Self::Error>> + Send + '_;

  /// Compare-and-set on the status column.
  ///
  /// Returns `None` (and writes nothing) when the stored status is not
  /// `expected`, so concurrent writers on the same key serialise.
  fn update_registration_status(
    &self,
    id: Uuid,
    expected: RegistrationStatus,
    next: RegistrationStatus,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Registration>, Self::Error>> + Send + '_;

  /// Move every non-terminal registration of the event to `cancelled`,
  /// recording the reason and time. Returns all registrations of the event,
  /// including those left untouched.
  fn cancel_registrations(
    &self,
    event_id: Uuid,
    reason: String,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Registration>, Self::Error>> + Send + '_;

  fn list_registrations(
    &self,
    event_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Registration>, Self::Error>> + Send + '_;
}

pub trait NotificationStore: Backend {
  fn insert_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<NotificationAttempt, Self::Error>> + Send + '_;

  fn get_notification(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<NotificationAttempt>, Self::Error>> + Send + '_;

  /// Record a failed attempt that will be retried: the record stays
  /// `pending`, `retry_count` and `last_retry_time` advance.
  fn record_retry(
    &self,
    id: Uuid,
    retry_count: u32,
    error: String,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn mark_sent(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn mark_failed(
    &self,
    id: Uuid,
    retry_count: u32,
    error: String,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// `sent → read`. Returns `None` if the record was not in `sent`.
  fn mark_read(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<NotificationAttempt>, Self::Error>> + Send + '_;

  /// Claim a failed record for reprocessing: `failed → pending`, only if the
  /// stored `retry_count` still equals `retry_count`. Returns whether the
  /// claim succeeded.
  fn claim_failed(
    &self,
    id: Uuid,
    retry_count: u32,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Put a claimed record back to `failed`, optionally pinning its retry
  /// count and replacing its error.
  fn release_failed(
    &self,
    id: Uuid,
    retry_count: u32,
    error: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Physically remove a record. Returns whether it existed.
  fn delete_notification(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn query_notifications<'a>(
    &'a self,
    query: &'a NotificationQuery,
  ) -> impl Future<Output = Result<Vec<NotificationAttempt>, Self::Error>> + Send + 'a;

  fn count_notifications(
    &self,
    status: DeliveryStatus,
    created_after: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Delete every record created before `cutoff`. Returns the count.
  fn delete_notifications_before(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

/// Read access to user snapshots, plus seeding.
pub trait Directory: Backend {
  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Users matching `ids`; unknown ids are silently absent from the result.
  fn get_users<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  fn list_users(&self) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;
}

pub trait AuditLog: Backend {
  fn append_audit(
    &self,
    entry: NewAuditEntry,
  ) -> impl Future<Output = Result<AuditEntry, Self::Error>> + Send + '_;

  /// Entries for an event, oldest first.
  fn list_audit(
    &self,
    event_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AuditEntry>, Self::Error>> + Send + '_;
}

/// Everything the engine needs from a backend. Blanket-implemented.
pub trait Store:
  EventStore + RegistrationStore + NotificationStore + Directory + AuditLog + Clone + 'static
{
}

impl<T> Store for T where
  T: EventStore + RegistrationStore + NotificationStore + Directory + AuditLog + Clone + 'static
{
}
