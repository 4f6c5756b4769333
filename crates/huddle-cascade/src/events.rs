//! Event records and their lazily derived status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use huddle_core::{
  Error, Result,
  clock::Clock,
  event::{Event, NewEvent, SoftDelete, derive_status},
  guard,
  store::EventStore,
  user::User,
};
use serde::Deserialize;
use uuid::Uuid;

pub const EVENT_NOT_FOUND: &str = "训练不存在";

/// What a caller supplies to schedule an event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventDraft {
  pub title:        String,
  #[serde(default)]
  pub location:     Option<String>,
  #[serde(default)]
  pub content:      Option<String>,
  #[serde(default)]
  pub notes:        Option<String>,
  pub scheduled_at: DateTime<Utc>,
}

pub struct EventService<S> {
  store: S,
  clock: Arc<dyn Clock>,
}

impl<S: Clone> Clone for EventService<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), clock: Arc::clone(&self.clock) }
  }
}

impl<S: EventStore> EventService<S> {
  pub fn new(store: S, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  pub async fn create(&self, actor: &User, draft: EventDraft) -> Result<Event> {
    if !guard::can_create_event(actor) {
      return Err(Error::Authorization("权限不足，只有管理员可以创建训练".into()));
    }
    let title = draft.title.trim();
    if title.is_empty() {
      return Err(Error::Validation("训练标题不能为空".into()));
    }

    let event = self
      .store
      .insert_event(NewEvent {
        creator_id:   actor.user_id,
        title:        title.to_owned(),
        location:     draft.location,
        content:      draft.content,
        notes:        draft.notes,
        scheduled_at: draft.scheduled_at,
        created_at:   self.clock.now(),
      })
      .await
      .map_err(Error::from_backend)?;

    tracing::info!(event_id = %event.event_id, creator_id = %actor.user_id, "event created");
    Ok(event)
  }

  /// Fetch an event, deleted or not, with its status brought up to date.
  pub async fn get(&self, id: Uuid) -> Result<Event> {
    let event = self
      .store
      .get_event(id)
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::NotFound(EVENT_NOT_FOUND.into()))?;
    Ok(self.refresh(event).await)
  }

  /// Like [`Self::get`], but a deleted event counts as missing.
  pub async fn get_active(&self, id: Uuid) -> Result<Event> {
    let event = self.get(id).await?;
    if event.is_deleted {
      return Err(Error::NotFound(EVENT_NOT_FOUND.into()));
    }
    Ok(event)
  }

  /// Non-deleted events, latest first.
  pub async fn list_active(&self) -> Result<Vec<Event>> {
    let events = self.store.list_events(false).await.map_err(Error::from_backend)?;
    let mut out = Vec::with_capacity(events.len());
    for event in events {
      out.push(self.refresh(event).await);
    }
    Ok(out)
  }

  pub async fn soft_delete(
    &self,
    id: Uuid,
    deleted_by: Uuid,
    reason: String,
    at: DateTime<Utc>,
  ) -> Result<Event> {
    self
      .store
      .soft_delete_event(id, SoftDelete { deleted_by, reason, at })
      .await
      .map_err(Error::from_backend)
  }

  /// Apply [`derive_status`]. A changed status is written back, but a failed
  /// write only logs; the derived value is returned either way.
  pub async fn refresh(&self, mut event: Event) -> Event {
    let now = self.clock.now();
    let status = derive_status(&event, now);
    if status == event.status || event.is_deleted {
      return event;
    }

    if let Err(e) = self.store.set_event_status(event.event_id, status, now).await {
      tracing::warn!(
        event_id = %event.event_id,
        status = status.as_str(),
        error = %e,
        "could not persist derived event status",
      );
    } else {
      event.updated_at = now;
    }
    event.status = status;
    event
  }
}
