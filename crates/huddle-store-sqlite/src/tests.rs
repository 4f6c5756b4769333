//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, Duration, Utc};
use huddle_core::{
  audit::{AuditAction, NewAuditEntry},
  event::{EventStatus, NewEvent, SoftDelete},
  notification::{
    DeliveryStatus, NewNotification, NotificationKind, NotificationMetadata,
  },
  registration::{RegistrationStats, RegistrationStatus},
  store::{
    AuditLog, Directory, EventStore, NotificationQuery, NotificationStore,
    RegistrationStore,
  },
  user::{NewUser, Role},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_event(creator_id: Uuid) -> NewEvent {
  NewEvent {
    creator_id,
    title: "周末训练".into(),
    location: Some("体育馆".into()),
    content: None,
    notes: None,
    scheduled_at: Utc::now() + Duration::days(1),
    created_at: Utc::now(),
  }
}

fn pending_notification(event_id: Uuid, user_id: Uuid) -> NewNotification {
  NewNotification {
    event_id,
    user_id,
    operator_id: Uuid::new_v4(),
    kind: NotificationKind::EventDeleted,
    status: DeliveryStatus::Pending,
    title: "训练取消通知".into(),
    content: "body".into(),
    retry_count: 0,
    created_at: Utc::now(),
    metadata: NotificationMetadata {
      event_title: Some("周末训练".into()),
      ..Default::default()
    },
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_user() {
  let s = store().await;
  let user = s
    .add_user(NewUser {
      display_name: Some("阿明".into()),
      real_name:    None,
      role:         Role::Admin,
      created_at:   Utc::now(),
    })
    .await
    .unwrap();

  let fetched = s.get_user(user.user_id).await.unwrap().unwrap();
  assert_eq!(fetched.display_name.as_deref(), Some("阿明"));
  assert_eq!(fetched.role, Role::Admin);
}

#[tokio::test]
async fn inserts_keep_caller_timestamps() {
  let s = store().await;
  let at = DateTime::from_timestamp(1_900_000_000, 0).unwrap();

  let user = s
    .add_user(NewUser {
      display_name: None,
      real_name:    None,
      role:         Role::Member,
      created_at:   at,
    })
    .await
    .unwrap();
  let event = s
    .insert_event(NewEvent { created_at: at, ..new_event(user.user_id) })
    .await
    .unwrap();
  let reg = s
    .insert_registration(event.event_id, user.user_id, RegistrationStatus::SignedUp, at)
    .await
    .unwrap();

  let user = s.get_user(user.user_id).await.unwrap().unwrap();
  let event = s.get_event(event.event_id).await.unwrap().unwrap();
  let reg = s.get_registration(reg.registration_id).await.unwrap().unwrap();
  assert_eq!(user.created_at, at);
  assert_eq!((event.created_at, event.updated_at), (at, at));
  assert_eq!((reg.created_at, reg.updated_at), (at, at));
}

#[tokio::test]
async fn get_users_skips_unknown_ids() {
  let s = store().await;
  let a = s
    .add_user(NewUser {
      display_name: None,
      real_name:    None,
      role:         Role::Member,
      created_at:   Utc::now(),
    })
    .await
    .unwrap();

  let found = s.get_users(&[a.user_id, Uuid::new_v4()]).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].user_id, a.user_id);

  assert!(s.get_users(&[]).await.unwrap().is_empty());
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_event() {
  let s = store().await;
  let event = s.insert_event(new_event(Uuid::new_v4())).await.unwrap();
  assert_eq!(event.status, EventStatus::Registering);

  let fetched = s.get_event(event.event_id).await.unwrap().unwrap();
  assert_eq!(fetched.title, "周末训练");
  assert!(!fetched.is_deleted);
}

#[tokio::test]
async fn get_event_missing_returns_none() {
  let s = store().await;
  assert!(s.get_event(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn soft_delete_sets_audit_fields() {
  let s = store().await;
  let event = s.insert_event(new_event(Uuid::new_v4())).await.unwrap();
  let admin = Uuid::new_v4();
  let at = Utc::now();

  let deleted = s
    .soft_delete_event(event.event_id, SoftDelete {
      deleted_by: admin,
      reason:     "场地维修".into(),
      at,
    })
    .await
    .unwrap();

  assert!(deleted.is_deleted);
  assert_eq!(deleted.deleted_by, Some(admin));
  assert_eq!(deleted.delete_reason.as_deref(), Some("场地维修"));
  assert!(deleted.delete_time.is_some());
}

#[tokio::test]
async fn soft_delete_twice_conflicts() {
  let s = store().await;
  let event = s.insert_event(new_event(Uuid::new_v4())).await.unwrap();
  let deletion = SoftDelete {
    deleted_by: Uuid::new_v4(),
    reason:     "x".into(),
    at:         Utc::now(),
  };

  s.soft_delete_event(event.event_id, deletion.clone()).await.unwrap();
  let err = s
    .soft_delete_event(event.event_id, deletion)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::EventAlreadyDeleted(_)));
}

#[tokio::test]
async fn soft_delete_unknown_event_not_found() {
  let s = store().await;
  let err = s
    .soft_delete_event(Uuid::new_v4(), SoftDelete {
      deleted_by: Uuid::new_v4(),
      reason:     "x".into(),
      at:         Utc::now(),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::EventNotFound(_)));
}

#[tokio::test]
async fn list_events_hides_deleted_by_default() {
  let s = store().await;
  let creator = Uuid::new_v4();
  let kept = s.insert_event(new_event(creator)).await.unwrap();
  let gone = s.insert_event(new_event(creator)).await.unwrap();
  s.soft_delete_event(gone.event_id, SoftDelete {
    deleted_by: creator,
    reason:     "x".into(),
    at:         Utc::now(),
  })
  .await
  .unwrap();

  let active = s.list_events(false).await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].event_id, kept.event_id);
  assert_eq!(s.list_events(true).await.unwrap().len(), 2);
}

#[tokio::test]
async fn set_event_status_persists() {
  let s = store().await;
  let event = s.insert_event(new_event(Uuid::new_v4())).await.unwrap();
  s.set_event_status(event.event_id, EventStatus::Finished, Utc::now())
    .await
    .unwrap();
  let fetched = s.get_event(event.event_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, EventStatus::Finished);
}

// ─── Registrations ───────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_registration_rejected() {
  let s = store().await;
  let event = s.insert_event(new_event(Uuid::new_v4())).await.unwrap();
  let user = Uuid::new_v4();

  s.insert_registration(event.event_id, user, RegistrationStatus::SignedUp, Utc::now())
    .await
    .unwrap();
  let err = s
    .insert_registration(event.event_id, user, RegistrationStatus::LeaveRequested, Utc::now())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateRegistration { .. }));
}

#[tokio::test]
async fn status_update_is_compare_and_set() {
  let s = store().await;
  let event = s.insert_event(new_event(Uuid::new_v4())).await.unwrap();
  let reg = s
    .insert_registration(event.event_id, Uuid::new_v4(), RegistrationStatus::SignedUp, Utc::now())
    .await
    .unwrap();

  let moved = s
    .update_registration_status(
      reg.registration_id,
      RegistrationStatus::SignedUp,
      RegistrationStatus::LeaveRequested,
      Utc::now(),
    )
    .await
    .unwrap();
  assert_eq!(moved.unwrap().status, RegistrationStatus::LeaveRequested);

  // Stale expectation: nothing is written.
  let stale = s
    .update_registration_status(
      reg.registration_id,
      RegistrationStatus::SignedUp,
      RegistrationStatus::Present,
      Utc::now(),
    )
    .await
    .unwrap();
  assert!(stale.is_none());

  let fetched = s.get_registration(reg.registration_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, RegistrationStatus::LeaveRequested);
}

#[tokio::test]
async fn cancel_registrations_skips_terminal_records() {
  let s = store().await;
  let event = s.insert_event(new_event(Uuid::new_v4())).await.unwrap();
  let e = event.event_id;
  s.insert_registration(e, Uuid::new_v4(), RegistrationStatus::SignedUp, Utc::now())
    .await
    .unwrap();
  s.insert_registration(e, Uuid::new_v4(), RegistrationStatus::LeaveRequested, Utc::now())
    .await
    .unwrap();
  s.insert_registration(e, Uuid::new_v4(), RegistrationStatus::Absent, Utc::now())
    .await
    .unwrap();

  let all = s
    .cancel_registrations(e, "训练已被删除".into(), Utc::now())
    .await
    .unwrap();
  assert_eq!(all.len(), 3);

  let cancelled: Vec<_> = all
    .iter()
    .filter(|r| r.status == RegistrationStatus::Cancelled)
    .collect();
  assert_eq!(cancelled.len(), 2);
  assert!(
    cancelled
      .iter()
      .all(|r| r.cancel_reason.as_deref() == Some("训练已被删除") && r.cancel_time.is_some())
  );
  assert!(all.iter().any(|r| r.status == RegistrationStatus::Absent));
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn notification_lifecycle() {
  let s = store().await;
  let n = s
    .insert_notification(pending_notification(Uuid::new_v4(), Uuid::new_v4()))
    .await
    .unwrap();
  assert_eq!(n.status, DeliveryStatus::Pending);

  s.record_retry(n.notification_id, 1, "network down".into(), Utc::now())
    .await
    .unwrap();
  let retried = s.get_notification(n.notification_id).await.unwrap().unwrap();
  assert_eq!(retried.status, DeliveryStatus::Pending);
  assert_eq!(retried.retry_count, 1);
  assert!(retried.last_retry_time.is_some());

  // Read only applies to sent records.
  assert!(s.mark_read(n.notification_id, Utc::now()).await.unwrap().is_none());

  s.mark_sent(n.notification_id, Utc::now()).await.unwrap();
  let read = s
    .mark_read(n.notification_id, Utc::now())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(read.status, DeliveryStatus::Read);
  assert!(read.read_time.is_some());
  assert_eq!(read.metadata.event_title.as_deref(), Some("周末训练"));
}

#[tokio::test]
async fn claim_failed_is_exclusive() {
  let s = store().await;
  let n = s
    .insert_notification(pending_notification(Uuid::new_v4(), Uuid::new_v4()))
    .await
    .unwrap();
  s.mark_failed(n.notification_id, 2, "timeout".into(), Utc::now())
    .await
    .unwrap();

  assert!(!s.claim_failed(n.notification_id, 1).await.unwrap());
  assert!(s.claim_failed(n.notification_id, 2).await.unwrap());
  assert!(!s.claim_failed(n.notification_id, 2).await.unwrap());

  s.release_failed(n.notification_id, 3, Some("related data missing".into()))
    .await
    .unwrap();
  let released = s.get_notification(n.notification_id).await.unwrap().unwrap();
  assert_eq!(released.status, DeliveryStatus::Failed);
  assert_eq!(released.retry_count, 3);
  assert_eq!(released.error.as_deref(), Some("related data missing"));
}

#[tokio::test]
async fn query_filters_and_orders_newest_first() {
  let s = store().await;
  let event = Uuid::new_v4();
  let user = Uuid::new_v4();
  let now = Utc::now();

  let mut older = pending_notification(event, user);
  older.created_at = now - Duration::hours(2);
  let older = s.insert_notification(older).await.unwrap();
  let newer = s.insert_notification(pending_notification(event, user)).await.unwrap();
  s.insert_notification(pending_notification(Uuid::new_v4(), user))
    .await
    .unwrap();

  let rows = s
    .query_notifications(&NotificationQuery {
      event_id: Some(event),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].notification_id, newer.notification_id);
  assert_eq!(rows[1].notification_id, older.notification_id);

  let recent = s
    .query_notifications(&NotificationQuery {
      user_id: Some(user),
      created_after: Some(now - Duration::hours(1)),
      limit: Some(1),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(recent.len(), 1);
}

#[tokio::test]
async fn count_and_cleanup() {
  let s = store().await;
  let now = Utc::now();

  let mut stale = pending_notification(Uuid::new_v4(), Uuid::new_v4());
  stale.created_at = now - Duration::days(40);
  s.insert_notification(stale).await.unwrap();
  s.insert_notification(pending_notification(Uuid::new_v4(), Uuid::new_v4()))
    .await
    .unwrap();

  let recent = s
    .count_notifications(DeliveryStatus::Pending, now - Duration::days(7))
    .await
    .unwrap();
  assert_eq!(recent, 1);

  let removed = s
    .delete_notifications_before(now - Duration::days(30))
    .await
    .unwrap();
  assert_eq!(removed, 1);
  assert_eq!(
    s.query_notifications(&NotificationQuery::default())
      .await
      .unwrap()
      .len(),
    1
  );
}

// ─── Event logs ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_entries_roundtrip() {
  let s = store().await;
  let event_id = Uuid::new_v4();
  let before = RegistrationStats { total: 2, signed_up: 2, ..Default::default() };

  s.append_audit(NewAuditEntry {
    event_id,
    action: AuditAction::Delete,
    operator_id: Uuid::new_v4(),
    operator_role: Role::Admin,
    event_title: "周末训练".into(),
    event_time: Utc::now(),
    reason: "管理员删除".into(),
    before,
    after: None,
    operation_time: Utc::now(),
  })
  .await
  .unwrap();

  let entries = s.list_audit(event_id).await.unwrap();
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0].before, before);
  assert!(entries[0].after.is_none());
  assert_eq!(entries[0].operator_role, Role::Admin);
}
