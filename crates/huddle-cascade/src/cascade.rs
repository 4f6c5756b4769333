//! The cancellation cascade.
//!
//! A cancellation walks `Requested → Validated → EventMarkedDeleted →
//! RegistrationsCancelled → NotificationsDispatched → Completed`. Everything
//! before the soft delete only reads, so a rejection leaves no trace. The
//! soft delete is the commit point and the only write whose failure aborts
//! the request. The steps after it are best-effort: their failures are
//! logged and reported as warnings, and never turn a committed cancellation
//! into a failed one.

use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use huddle_core::{
  Error, ErrorKind, Result,
  audit::{AuditAction, NewAuditEntry},
  clock::Clock,
  event::derive_status,
  guard,
  notification::BatchOutcome,
  registration::{Registration, RegistrationStats},
  store::Store,
  timegate,
  user::{Role, User},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  config::CascadeConfig,
  dispatch::{Dispatcher, Notice},
  events::{EVENT_NOT_FOUND, EventService},
  ledger::RegistrationLedger,
  sender::Sender,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStage {
  Requested,
  Validated,
  Rejected,
  EventMarkedDeleted,
  RegistrationsCancelled,
  NotificationsDispatched,
  Completed,
}

impl fmt::Display for CascadeStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Requested => "requested",
      Self::Validated => "validated",
      Self::Rejected => "rejected",
      Self::EventMarkedDeleted => "event_marked_deleted",
      Self::RegistrationsCancelled => "registrations_cancelled",
      Self::NotificationsDispatched => "notifications_dispatched",
      Self::Completed => "completed",
    };
    f.write_str(s)
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// What a committed cancellation did.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeReport {
  pub event_id:              Uuid,
  pub event_title:           String,
  pub delete_time:           DateTime<Utc>,
  pub deleted_by:            Uuid,
  pub delete_reason:         String,
  pub affected_users:        usize,
  /// Counts taken before the registrations were cancelled.
  pub registration_stats:    RegistrationStats,
  pub notification_required: bool,
  /// `None` when nobody needed notifying, or the fan-out outlived the
  /// notification deadline and is still running.
  pub notification_result:   Option<BatchOutcome>,
  /// Post-commit steps that failed.
  pub warnings:              Vec<String>,
}

/// The caller-facing verdict on a cancellation.
#[derive(Debug, Clone, Serialize)]
pub struct CancelResult {
  pub success:    bool,
  pub message:    String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_kind: Option<ErrorKind>,
  #[serde(flatten)]
  pub report:     Option<CascadeReport>,
}

impl From<Result<CascadeReport>> for CancelResult {
  fn from(result: Result<CascadeReport>) -> Self {
    match result {
      Ok(report) => Self {
        success:    true,
        message:    "训练删除成功".into(),
        error_kind: None,
        report:     Some(report),
      },
      Err(e) => Self {
        success:    false,
        message:    e.to_string(),
        error_kind: Some(e.kind()),
        report:     None,
      },
    }
  }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct Cascade<S, T> {
  store:      S,
  events:     EventService<S>,
  ledger:     RegistrationLedger<S>,
  dispatcher: Dispatcher<S, T>,
  clock:      Arc<dyn Clock>,
  config:     CascadeConfig,
}

impl<S: Store, T: Sender> Cascade<S, T> {
  pub fn new(
    store: S,
    events: EventService<S>,
    ledger: RegistrationLedger<S>,
    dispatcher: Dispatcher<S, T>,
    clock: Arc<dyn Clock>,
    config: CascadeConfig,
  ) -> Self {
    Self { store, events, ledger, dispatcher, clock, config }
  }

  /// Cancel an event on behalf of `operator_id`.
  ///
  /// Rejections (unknown operator or event, already deleted, not permitted,
  /// too late, attendance already confirmed) return before any write.
  pub async fn cancel_event(
    &self,
    event_id: Uuid,
    operator_id: Uuid,
    reason: Option<String>,
  ) -> Result<CascadeReport> {
    stage(event_id, CascadeStage::Requested);

    let validated = self.validate(event_id, operator_id).await;
    let (operator, registrations, before) = match validated {
      Ok(v) => v,
      Err(e) => {
        stage(event_id, CascadeStage::Rejected);
        tracing::info!(%event_id, %operator_id, reason = %e, "event cancellation rejected");
        return Err(e);
      }
    };
    stage(event_id, CascadeStage::Validated);

    let reason = reason
      .map(|r| r.trim().to_owned())
      .filter(|r| !r.is_empty())
      .unwrap_or_else(|| self.config.default_reason.clone());
    let now = self.clock.now();

    let deleted = match self
      .events
      .soft_delete(event_id, operator.user_id, reason.clone(), now)
      .await
    {
      Ok(e) => e,
      Err(e) => {
        if !e.is_rejection() {
          tracing::error!(%event_id, error = %e, "could not soft-delete event");
        }
        return Err(e);
      }
    };
    stage(event_id, CascadeStage::EventMarkedDeleted);
    tracing::info!(%event_id, operator_id = %operator.user_id, %reason, "event soft-deleted");

    let mut warnings = Vec::new();

    let after = match self
      .ledger
      .bulk_cancel(event_id, self.config.registration_cancel_reason.clone(), now)
      .await
    {
      Ok(all) => {
        let after = RegistrationStats::tally(&all);
        tracing::info!(
          %event_id,
          cancelled = before.signed_up + before.leave_requested,
          "registrations cancelled",
        );
        Some(after)
      }
      Err(e) => {
        tracing::warn!(%event_id, error = %e, "could not cancel registrations");
        warnings.push(format!("registration cancel failed: {e}"));
        None
      }
    };
    stage(event_id, CascadeStage::RegistrationsCancelled);

    let entry = NewAuditEntry {
      event_id,
      action: AuditAction::Delete,
      operator_id: operator.user_id,
      operator_role: operator.role,
      event_title: deleted.title.clone(),
      event_time: deleted.scheduled_at,
      reason: reason.clone(),
      before,
      after,
      operation_time: now,
    };
    if let Err(e) = self.store.append_audit(entry).await {
      tracing::warn!(%event_id, error = %e, "could not write event log");
      warnings.push(format!("audit log failed: {e}"));
    }

    let notification_required = before.total > 0;
    let notification_result = if notification_required {
      let notice = Notice {
        event:    deleted.clone(),
        operator: operator.clone(),
        reason:   reason.clone(),
      };
      let outcome = self.dispatch(&registrations, notice, &mut warnings).await;
      stage(event_id, CascadeStage::NotificationsDispatched);
      outcome
    } else {
      None
    };

    stage(event_id, CascadeStage::Completed);
    Ok(CascadeReport {
      event_id,
      event_title: deleted.title,
      delete_time: deleted.delete_time.unwrap_or(now),
      deleted_by: operator.user_id,
      delete_reason: reason,
      affected_users: before.total,
      registration_stats: before,
      notification_required,
      notification_result,
      warnings,
    })
  }

  async fn validate(
    &self,
    event_id: Uuid,
    operator_id: Uuid,
  ) -> Result<(User, Vec<Registration>, RegistrationStats)> {
    let operator = self
      .store
      .get_user(operator_id)
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::NotFound("用户不存在".into()))?;

    let mut event = self
      .store
      .get_event(event_id)
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::NotFound(EVENT_NOT_FOUND.into()))?;
    if event.is_deleted {
      return Err(Error::Conflict("训练已被删除".into()));
    }

    let now = self.clock.now();
    event.status = derive_status(&event, now);

    if !guard::can_cancel(&operator, &event) {
      return Err(Error::Authorization(
        "权限不足，只有管理员或创建者可以删除训练".into(),
      ));
    }
    timegate::can_cancel(&event, now)?;

    let registrations = self.ledger.list_by_event(event_id).await?;
    let stats = RegistrationStats::tally(&registrations);
    if stats.present > 0 {
      return Err(Error::Conflict(format!(
        "已有{}人确认出勤，不能删除训练",
        stats.present
      )));
    }

    Ok((operator, registrations, stats))
  }

  /// Run the fan-out on its own task and wait for it up to the notification
  /// deadline. Past the deadline the task keeps going unobserved.
  async fn dispatch(
    &self,
    registrations: &[Registration],
    notice: Notice,
    warnings: &mut Vec<String>,
  ) -> Option<BatchOutcome> {
    let event_id = notice.event.event_id;
    let recipients = self.recipients(registrations).await;
    let dispatcher = self.dispatcher.clone();

    let mut handle =
      tokio::spawn(async move { dispatcher.send_batch(&recipients, &notice).await });

    match tokio::time::timeout(self.config.notification_deadline(), &mut handle).await {
      Ok(Ok(outcome)) => Some(outcome),
      Ok(Err(e)) => {
        tracing::warn!(%event_id, error = %e, "notification task failed");
        warnings.push(format!("notification dispatch failed: {e}"));
        None
      }
      Err(_) => {
        tracing::info!(%event_id, "notification fan-out continues in the background");
        warnings.push("notification dispatch still running".into());
        None
      }
    }
  }

  /// User snapshots for every registrant. Users missing from the directory
  /// are still notified, under the fallback name.
  async fn recipients(&self, registrations: &[Registration]) -> Vec<User> {
    let ids: Vec<Uuid> = registrations.iter().map(|r| r.user_id).collect();
    let known: HashMap<Uuid, User> = match self.store.get_users(&ids).await {
      Ok(users) => users.into_iter().map(|u| (u.user_id, u)).collect(),
      Err(e) => {
        tracing::warn!(error = %e, "could not load recipients; using fallback names");
        HashMap::new()
      }
    };

    let now = self.clock.now();
    registrations
      .iter()
      .map(|r| {
        known.get(&r.user_id).cloned().unwrap_or(User {
          user_id:      r.user_id,
          display_name: None,
          real_name:    None,
          role:         Role::Member,
          created_at:   now,
        })
      })
      .collect()
  }
}

fn stage(event_id: Uuid, stage: CascadeStage) {
  tracing::debug!(%event_id, %stage, "cancellation stage");
}
