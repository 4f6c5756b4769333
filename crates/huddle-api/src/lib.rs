//! JSON REST API for Huddle.
//!
//! Exposes an axum [`Router`] over a shared [`Engine`]. The acting user is
//! named by the `x-huddle-user` header; authentication, TLS and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", huddle_api::api_router(Arc::new(engine)))
//! ```

pub mod actor;
pub mod error;
pub mod events;
pub mod maintenance;
pub mod notifications;
pub mod registrations;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use huddle_cascade::{Engine, Sender};
use huddle_core::store::Store;

pub use actor::{ACTOR_HEADER, Actor};
pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, T>(engine: Arc<Engine<S, T>>) -> Router<()>
where
  S: Store,
  T: Sender,
{
  Router::new()
    // Events
    .route("/events", get(events::list::<S, T>).post(events::create::<S, T>))
    .route("/events/{id}", get(events::get_one::<S, T>))
    .route("/events/{id}/cancel", post(events::cancel::<S, T>))
    .route("/events/{id}/logs", get(events::logs::<S, T>))
    // Registrations
    .route("/events/{id}/registrations", get(registrations::list::<S, T>))
    .route("/events/{id}/registration", post(registrations::register::<S, T>))
    .route("/registrations/{id}/attendance", post(registrations::attendance::<S, T>))
    .route("/registrations/{id}/check-in", post(registrations::check_in::<S, T>))
    // Notifications
    .route("/notifications", get(notifications::inbox::<S, T>))
    .route("/notifications/{id}/read", post(notifications::mark_read::<S, T>))
    // Maintenance
    .route("/events/{id}/notifications/retry", post(maintenance::retry_event::<S, T>))
    .route("/maintenance/reprocess", post(maintenance::reprocess::<S, T>))
    .route("/maintenance/failed", get(maintenance::failed::<S, T>))
    .route("/maintenance/failures", get(maintenance::failures::<S, T>))
    .route("/maintenance/stats", get(maintenance::stats::<S, T>))
    .route("/maintenance/cleanup", post(maintenance::cleanup::<S, T>))
    .with_state(engine)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use chrono::{Duration, Utc};
  use huddle_cascade::{EngineConfig, LogSender};
  use huddle_core::{
    clock::SystemClock,
    store::Directory,
    user::{NewUser, Role, User},
  };
  use huddle_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  type TestEngine = Arc<Engine<SqliteStore, LogSender>>;

  async fn make_engine() -> TestEngine {
    let store = SqliteStore::open_in_memory().await.unwrap();
    Arc::new(Engine::new(
      store,
      LogSender,
      Arc::new(SystemClock),
      EngineConfig::default(),
    ))
  }

  async fn add_user(engine: &TestEngine, name: &str, role: Role) -> User {
    engine
      .store()
      .add_user(NewUser {
        display_name: Some(name.to_string()),
        real_name:    None,
        role,
        created_at:   Utc::now(),
      })
      .await
      .unwrap()
  }

  async fn call(
    engine: &TestEngine,
    method: &str,
    uri:    &str,
    actor:  Option<Uuid>,
    body:   Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = actor {
      builder = builder.header(ACTOR_HEADER, id.to_string());
    }
    let req = match body {
      Some(b) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(b.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp   = api_router(engine.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes  = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value  = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  async fn create_event(engine: &TestEngine, admin: &User, hours_ahead: i64) -> Uuid {
    let (status, body) = call(
      engine,
      "POST",
      "/events",
      Some(admin.user_id),
      Some(json!({
        "title": "周二传接训练",
        "location": "东区球场",
        "scheduled_at": (Utc::now() + Duration::hours(hours_ahead)).to_rfc3339(),
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["event_id"].as_str().unwrap().parse().unwrap()
  }

  // ── Actor ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn missing_or_unknown_actor_is_401() {
    let engine = make_engine().await;
    let (status, _) = call(&engine, "GET", "/notifications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) =
      call(&engine, "GET", "/notifications", Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  // ── Events ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn members_cannot_create_events() {
    let engine = make_engine().await;
    let member = add_user(&engine, "小王", Role::Member).await;
    let (status, body) = call(
      &engine,
      "POST",
      "/events",
      Some(member.user_id),
      Some(json!({ "title": "x", "scheduled_at": Utc::now().to_rfc3339() })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "authorization");
  }

  #[tokio::test]
  async fn created_event_is_listed_and_fetchable() {
    let engine = make_engine().await;
    let admin = add_user(&engine, "教练", Role::Admin).await;
    let id = create_event(&engine, &admin, 24).await;

    let (status, body) = call(&engine, "GET", "/events", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call(&engine, "GET", &format!("/events/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "registering");

    let (status, _) =
      call(&engine, "GET", &format!("/events/{}", Uuid::new_v4()), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Registration ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn register_then_list() {
    let engine = make_engine().await;
    let admin = add_user(&engine, "教练", Role::Admin).await;
    let member = add_user(&engine, "小王", Role::Member).await;
    let id = create_event(&engine, &admin, 24).await;

    let (status, body) = call(
      &engine,
      "POST",
      &format!("/events/{id}/registration"),
      Some(member.user_id),
      Some(json!({ "choice": "sign_up" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "signed_up");

    let (status, body) = call(
      &engine,
      "GET",
      &format!("/events/{id}/registrations"),
      None,
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["signed_up"], 1);
    assert_eq!(body["registrations"].as_array().unwrap().len(), 1);
  }

  // ── Cancellation ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn cancel_notifies_registrants() {
    let engine = make_engine().await;
    let admin = add_user(&engine, "教练", Role::Admin).await;
    let member = add_user(&engine, "小王", Role::Member).await;
    let id = create_event(&engine, &admin, 5).await;
    call(
      &engine,
      "POST",
      &format!("/events/{id}/registration"),
      Some(member.user_id),
      Some(json!({ "choice": "sign_up" })),
    )
    .await;

    let (status, body) = call(
      &engine,
      "POST",
      &format!("/events/{id}/cancel"),
      Some(admin.user_id),
      Some(json!({ "reason": "场地维修" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["affected_users"], 1);
    assert_eq!(body["delete_reason"], "场地维修");
    assert_eq!(body["notification_result"]["success"], 1);

    let (status, body) = call(&engine, "GET", "/notifications", Some(member.user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let inbox = body.as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["status"], "sent");
    let notification_id = inbox[0]["notification_id"].as_str().unwrap().to_string();

    let (status, body) = call(
      &engine,
      "POST",
      &format!("/notifications/{notification_id}/read"),
      Some(member.user_id),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "read");

    let (status, body) =
      call(&engine, "GET", &format!("/events/{id}/logs"), Some(admin.user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // The event is gone from member-facing reads.
    let (status, _) = call(&engine, "GET", &format!("/events/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn cancel_rejections_carry_status_and_message() {
    let engine = make_engine().await;
    let admin = add_user(&engine, "教练", Role::Admin).await;
    let soon = create_event(&engine, &admin, 1).await;
    let later = create_event(&engine, &admin, 48).await;

    let (status, body) = call(
      &engine,
      "POST",
      &format!("/events/{soon}/cancel"),
      Some(admin.user_id),
      Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_kind"], "timing");

    let uri = format!("/events/{later}/cancel");
    let (status, _) = call(&engine, "POST", &uri, Some(admin.user_id), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&engine, "POST", &uri, Some(admin.user_id), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "训练已被删除");
  }

  #[tokio::test]
  async fn cancel_without_body_uses_default_reason() {
    let engine = make_engine().await;
    let admin = add_user(&engine, "教练", Role::Admin).await;
    let id = create_event(&engine, &admin, 48).await;

    let (status, body) =
      call(&engine, "POST", &format!("/events/{id}/cancel"), Some(admin.user_id), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["delete_reason"], "管理员删除");
  }

  // ── Maintenance ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn maintenance_is_admin_only() {
    let engine = make_engine().await;
    let admin = add_user(&engine, "教练", Role::Admin).await;
    let member = add_user(&engine, "小王", Role::Member).await;

    let (status, _) =
      call(&engine, "GET", "/maintenance/stats", Some(member.user_id), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
      call(&engine, "GET", "/maintenance/stats?days=3", Some(admin.user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["time_range_days"], 3);
    assert_eq!(body["total"], 0);

    let (status, body) = call(
      &engine,
      "POST",
      "/maintenance/reprocess",
      Some(admin.user_id),
      Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, _) = call(
      &engine,
      "POST",
      "/maintenance/cleanup",
      Some(admin.user_id),
      Some(json!({ "retention_days": -1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn maintenance_bodies_are_optional() {
    let engine = make_engine().await;
    let admin = add_user(&engine, "教练", Role::Admin).await;
    let id = create_event(&engine, &admin, 48).await;

    for uri in [
      "/maintenance/reprocess".to_string(),
      "/maintenance/cleanup".to_string(),
      format!("/events/{id}/notifications/retry"),
    ] {
      let (status, body) = call(&engine, "POST", &uri, Some(admin.user_id), None).await;
      assert_eq!(status, StatusCode::OK, "{uri}: {body}");
    }
  }

  #[tokio::test]
  async fn oversized_windows_are_bad_requests() {
    let engine = make_engine().await;
    let admin = add_user(&engine, "教练", Role::Admin).await;
    let actor = Some(admin.user_id);

    let (status, body) =
      call(&engine, "GET", &format!("/maintenance/stats?days={}", u32::MAX), actor, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = call(
      &engine,
      "GET",
      &format!("/maintenance/failed?max_age_hours={}", i64::MAX),
      actor,
      None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
      &engine,
      "POST",
      "/maintenance/reprocess",
      actor,
      Some(json!({ "max_age_hours": i64::MAX })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
      &engine,
      "POST",
      "/maintenance/cleanup",
      actor,
      Some(json!({ "retention_days": i64::MAX })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A window that fits the duration type but reaches past the calendar.
    let (status, body) = call(
      &engine,
      "POST",
      "/maintenance/cleanup",
      actor,
      Some(json!({ "retention_days": 1_000_000_000i64 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
  }
}
