//! The registration ledger.
//!
//! One record per (event, user). Members toggle between `signed_up` and
//! `leave_requested`; admins and self check-in finalise a record as
//! `present` or `absent`; the cancellation cascade finalises the rest as
//! `cancelled`. Every status write is a compare-and-set on the status the
//! ledger last read, retried once when another writer got there first.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use huddle_core::{
  Error, Result,
  clock::Clock,
  guard,
  registration::{self, Registration, RegistrationStatus},
  store::{EventStore, RegistrationStore},
  timegate,
  user::User,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::EVENT_NOT_FOUND;

const FINALIZED: &str = "报名状态已确定，不能修改";
pub(crate) const CONTENDED: &str = "报名状态正在变更，请稍后重试";
const REGISTRATION_NOT_FOUND: &str = "报名记录不存在";

/// A member's own choice for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberChoice {
  SignUp,
  Leave,
}

impl MemberChoice {
  pub fn status(self) -> RegistrationStatus {
    match self {
      Self::SignUp => RegistrationStatus::SignedUp,
      Self::Leave => RegistrationStatus::LeaveRequested,
    }
  }

  fn closed_message(self) -> &'static str {
    match self {
      Self::SignUp => "训练开始啦，下次记得提前报名哦",
      Self::Leave => "训练已经开始啦！",
    }
  }
}

pub struct RegistrationLedger<S> {
  store: S,
  clock: Arc<dyn Clock>,
}

impl<S: Clone> Clone for RegistrationLedger<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), clock: Arc::clone(&self.clock) }
  }
}

impl<S> RegistrationLedger<S>
where
  S: EventStore + RegistrationStore,
{
  pub fn new(store: S, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  /// Create the record, or toggle an existing one that is not yet final.
  pub async fn upsert_status(
    &self,
    event_id: Uuid,
    user_id: Uuid,
    status: RegistrationStatus,
  ) -> Result<Registration> {
    for _ in 0..2 {
      let existing = self
        .store
        .find_registration(event_id, user_id)
        .await
        .map_err(Error::from_backend)?;

      let Some(current) = existing else {
        let inserted = self
          .store
          .insert_registration(event_id, user_id, status, self.clock.now())
          .await;
        match inserted {
          Ok(created) => return Ok(created),
          // Lost the race to create; re-read and toggle instead.
          Err(e) => match Error::from_backend(e) {
            Error::Conflict(_) => continue,
            other => return Err(other),
          },
        }
      };

      if current.status.is_terminal() {
        return Err(Error::Conflict(FINALIZED.into()));
      }
      if current.status == status {
        return Ok(current);
      }

      let updated = self
        .store
        .update_registration_status(
          current.registration_id,
          current.status,
          status,
          self.clock.now(),
        )
        .await
        .map_err(Error::from_backend)?;
      if let Some(r) = updated {
        return Ok(r);
      }
    }

    tracing::debug!(%event_id, %user_id, "registration write contended twice");
    Err(Error::Conflict(CONTENDED.into()))
  }

  /// Sign up for or request leave from an event that has not started.
  pub async fn register(
    &self,
    actor: &User,
    event_id: Uuid,
    choice: MemberChoice,
  ) -> Result<Registration> {
    let event = self
      .store
      .get_event(event_id)
      .await
      .map_err(Error::from_backend)?
      .filter(|e| !e.is_deleted)
      .ok_or_else(|| Error::NotFound(EVENT_NOT_FOUND.into()))?;

    if !timegate::can_register_or_leave(&event, self.clock.now()) {
      return Err(Error::Timing(choice.closed_message().into()));
    }

    let registration = self
      .upsert_status(event_id, actor.user_id, choice.status())
      .await?;
    tracing::debug!(
      %event_id,
      user_id = %actor.user_id,
      status = registration.status.as_str(),
      "registration updated",
    );
    Ok(registration)
  }

  /// Admin marks a participant `present` or `absent`.
  pub async fn update_attendance(
    &self,
    actor: &User,
    registration_id: Uuid,
    status: RegistrationStatus,
  ) -> Result<Registration> {
    if !guard::can_mutate_attendance(actor) {
      return Err(Error::Authorization(
        "权限不足，只有管理员可以更新出勤状态".into(),
      ));
    }
    if !matches!(status, RegistrationStatus::Present | RegistrationStatus::Absent) {
      return Err(Error::Validation("出勤状态只能是 present 或 absent".into()));
    }

    let current = self.load(registration_id).await?;
    if !current.status.is_member_choice() {
      return Err(Error::Conflict(FINALIZED.into()));
    }
    self.finalize(&current, status).await
  }

  /// A member confirms their own attendance once the session has run for an
  /// hour.
  pub async fn check_in(&self, actor: &User, registration_id: Uuid) -> Result<Registration> {
    let current = self.load(registration_id).await?;
    if current.user_id != actor.user_id {
      return Err(Error::Authorization("无权限操作此记录".into()));
    }
    if current.status != RegistrationStatus::SignedUp {
      return Err(Error::Conflict("只有已报名状态才能打卡".into()));
    }

    let event = self
      .store
      .get_event(current.event_id)
      .await
      .map_err(Error::from_backend)?
      .filter(|e| !e.is_deleted)
      .ok_or_else(|| Error::NotFound(EVENT_NOT_FOUND.into()))?;
    if !timegate::can_check_in(&event, self.clock.now()) {
      return Err(Error::Timing("训练结束1小时后才能打卡".into()));
    }

    self.finalize(&current, RegistrationStatus::Present).await
  }

  /// Cancel every non-final registration of the event. Returns all of them.
  pub async fn bulk_cancel(
    &self,
    event_id: Uuid,
    reason: String,
    at: DateTime<Utc>,
  ) -> Result<Vec<Registration>> {
    self
      .store
      .cancel_registrations(event_id, reason, at)
      .await
      .map_err(Error::from_backend)
  }

  pub async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<Registration>> {
    self
      .store
      .list_registrations(event_id)
      .await
      .map_err(Error::from_backend)
  }

  pub async fn count_by_status(
    &self,
    event_id: Uuid,
  ) -> Result<BTreeMap<RegistrationStatus, usize>> {
    let registrations = self.list_by_event(event_id).await?;
    Ok(registration::count_by_status(&registrations))
  }

  async fn load(&self, registration_id: Uuid) -> Result<Registration> {
    self
      .store
      .get_registration(registration_id)
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::NotFound(REGISTRATION_NOT_FOUND.into()))
  }

  async fn finalize(
    &self,
    current: &Registration,
    status: RegistrationStatus,
  ) -> Result<Registration> {
    self
      .store
      .update_registration_status(
        current.registration_id,
        current.status,
        status,
        self.clock.now(),
      )
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::Conflict(CONTENDED.into()))
  }
}
