//! The delivery ledger: queries over notification attempts, failure
//! reprocessing, and housekeeping.
//!
//! Reprocessing claims a failed record (`failed → pending`, conditional on
//! its retry count) before touching it, so overlapping runs never send the
//! same record twice. A claimed record is either superseded by a fresh
//! attempt and deleted, or released back to `failed`.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use huddle_core::{
  Error, Result,
  clock::Clock,
  notification::{
    DeliveryStats, DeliveryStatus, NotificationAttempt, NotificationKind,
  },
  store::{NotificationQuery, Store},
  user::User,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  dispatch::{Dispatcher, Notice},
  sender::Sender,
};

/// Records handled per reprocessing run.
pub const REPROCESS_LIMIT: usize = 50;

/// Error pinned on a record whose user, event or operator no longer exists.
pub const MISSING_DATA_ERROR: &str = "related data missing";

/// Default inbox page size.
pub const INBOX_PAGE: usize = 20;

/// Failures newer than this count as recent in [`FailureAnalysis`].
const RECENT_HOURS: i64 = 1;

#[derive(Debug, Clone, Default)]
pub struct FailedFilter {
  pub event_id: Option<Uuid>,
  /// Only records created within this window.
  pub max_age:  Option<Duration>,
  pub limit:    Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOutcome {
  Sent,
  Failed,
  /// Pinned as exhausted because a snapshot is gone.
  MissingData,
  NotRetryable,
  /// Another run holds the record.
  AlreadyClaimed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessDetail {
  pub notification_id: Uuid,
  pub user_id:         Uuid,
  pub outcome:         ProcessOutcome,
  /// The superseding attempt, if one was written.
  pub replacement_id:  Option<Uuid>,
  pub retry_count:     u32,
  pub error:           Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessResult {
  pub total:   usize,
  pub success: usize,
  pub failed:  usize,
  pub skipped: usize,
  pub details: Vec<ProcessDetail>,
}

impl ProcessResult {
  fn push(&mut self, detail: ProcessDetail) {
    match detail.outcome {
      ProcessOutcome::Sent => self.success += 1,
      ProcessOutcome::Failed => self.failed += 1,
      _ => self.skipped += 1,
    }
    self.details.push(detail);
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureAnalysis {
  pub total:         usize,
  pub retryable:     usize,
  pub non_retryable: usize,
  pub recent:        usize,
  pub older:         usize,
  /// Count per recorded error message.
  pub by_reason:     BTreeMap<String, usize>,
}

pub struct DeliveryLedger<S, T> {
  store:          S,
  dispatcher:     Dispatcher<S, T>,
  clock:          Arc<dyn Clock>,
  default_reason: String,
}

impl<S: Store, T: Sender> DeliveryLedger<S, T> {
  pub fn new(
    store: S,
    dispatcher: Dispatcher<S, T>,
    clock: Arc<dyn Clock>,
    default_reason: String,
  ) -> Self {
    Self { store, dispatcher, clock, default_reason }
  }

  /// `now - age`, or a validation error when that falls off the calendar.
  fn window_start(&self, age: Duration) -> Result<DateTime<Utc>> {
    self
      .clock
      .now()
      .checked_sub_signed(age)
      .ok_or_else(window_too_large)
  }

  // ─── Queries ─────────────────────────────────────────────────────────────

  pub async fn list_failed(&self, filter: &FailedFilter) -> Result<Vec<NotificationAttempt>> {
    let query = NotificationQuery {
      event_id: filter.event_id,
      status: Some(DeliveryStatus::Failed),
      kind: Some(NotificationKind::EventDeleted),
      created_after: filter.max_age.map(|age| self.window_start(age)).transpose()?,
      limit: filter.limit,
      ..Default::default()
    };
    self
      .store
      .query_notifications(&query)
      .await
      .map_err(Error::from_backend)
  }

  /// A user's inbox, newest first.
  pub async fn list_for_user(
    &self,
    user_id: Uuid,
    status: Option<DeliveryStatus>,
    limit: Option<usize>,
    offset: Option<usize>,
  ) -> Result<Vec<NotificationAttempt>> {
    let query = NotificationQuery {
      user_id: Some(user_id),
      status,
      limit: Some(limit.unwrap_or(INBOX_PAGE)),
      offset,
      ..Default::default()
    };
    self
      .store
      .query_notifications(&query)
      .await
      .map_err(Error::from_backend)
  }

  /// `sent → read` on the actor's own notification. Marking an already read
  /// notification again returns it unchanged.
  pub async fn mark_read(&self, actor: &User, id: Uuid) -> Result<NotificationAttempt> {
    let record = self
      .store
      .get_notification(id)
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::NotFound("通知不存在".into()))?;
    if record.user_id != actor.user_id {
      return Err(Error::Authorization("无权限操作此通知".into()));
    }
    if record.status == DeliveryStatus::Read {
      return Ok(record);
    }

    self
      .store
      .mark_read(id, self.clock.now())
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::Conflict("通知尚未发送成功，不能标记为已读".into()))
  }

  pub async fn stats(&self, time_range_days: u32) -> Result<DeliveryStats> {
    let since = Duration::try_days(i64::from(time_range_days))
      .ok_or_else(window_too_large)
      .and_then(|range| self.window_start(range))?;
    let count = |status| self.store.count_notifications(status, since);

    let (sent, failed, pending, read) = futures::try_join!(
      count(DeliveryStatus::Sent),
      count(DeliveryStatus::Failed),
      count(DeliveryStatus::Pending),
      count(DeliveryStatus::Read),
    )
    .map_err(Error::from_backend)?;

    Ok(DeliveryStats::from_counts(time_range_days, sent, failed, pending, read))
  }

  /// Break failed cancellation notices down by cause and age.
  pub async fn analyze_failures(&self) -> Result<FailureAnalysis> {
    let failed = self.list_failed(&FailedFilter::default()).await?;
    let policy = &self.dispatcher.config().retry;
    let recent_cutoff = self.clock.now() - Duration::hours(RECENT_HOURS);

    let mut analysis = FailureAnalysis { total: failed.len(), ..Default::default() };
    for record in &failed {
      let reason = record.error.clone().unwrap_or_else(|| "unknown".into());
      if policy.is_retryable(&reason) {
        analysis.retryable += 1;
      } else {
        analysis.non_retryable += 1;
      }
      if record.created_at >= recent_cutoff {
        analysis.recent += 1;
      } else {
        analysis.older += 1;
      }
      *analysis.by_reason.entry(reason).or_default() += 1;
    }
    Ok(analysis)
  }

  /// Delete every record older than `max_age`. Returns how many went.
  pub async fn cleanup(&self, max_age: Duration) -> Result<usize> {
    let cutoff = self.window_start(max_age)?;
    let removed = self
      .store
      .delete_notifications_before(cutoff)
      .await
      .map_err(Error::from_backend)?;
    tracing::info!(removed, %cutoff, "old notifications removed");
    Ok(removed)
  }

  // ─── Reprocessing ────────────────────────────────────────────────────────

  /// Retry recent failed notices whose errors look transient.
  pub async fn reprocess(&self, max_age: Duration, max_retries: u32) -> Result<ProcessResult> {
    let query = NotificationQuery {
      status: Some(DeliveryStatus::Failed),
      kind: Some(NotificationKind::EventDeleted),
      created_after: Some(self.window_start(max_age)?),
      retry_count_below: Some(max_retries),
      limit: Some(REPROCESS_LIMIT),
      ..Default::default()
    };
    let candidates = self
      .store
      .query_notifications(&query)
      .await
      .map_err(Error::from_backend)?;

    let policy = &self.dispatcher.config().retry;
    let mut result = ProcessResult { total: candidates.len(), ..Default::default() };
    for record in candidates {
      let error = record.error.as_deref().unwrap_or_default();
      if !policy.is_retryable(error) {
        result.push(detail(&record, ProcessOutcome::NotRetryable));
        continue;
      }
      result.push(self.retry_record(&record, max_retries).await?);
    }

    tracing::info!(
      total = result.total,
      success = result.success,
      failed = result.failed,
      skipped = result.skipped,
      "failed notifications reprocessed",
    );
    Ok(result)
  }

  /// Retry every failed notice of one event that still has retries left,
  /// whatever its error.
  pub async fn retry_for_event(&self, event_id: Uuid, max_retries: u32) -> Result<ProcessResult> {
    let query = NotificationQuery {
      event_id: Some(event_id),
      status: Some(DeliveryStatus::Failed),
      kind: Some(NotificationKind::EventDeleted),
      retry_count_below: Some(max_retries),
      ..Default::default()
    };
    let candidates = self
      .store
      .query_notifications(&query)
      .await
      .map_err(Error::from_backend)?;

    let mut result = ProcessResult { total: candidates.len(), ..Default::default() };
    for record in candidates {
      result.push(self.retry_record(&record, max_retries).await?);
    }
    tracing::info!(%event_id, total = result.total, success = result.success, "event notifications retried");
    Ok(result)
  }

  async fn retry_record(
    &self,
    record: &NotificationAttempt,
    max_retries: u32,
  ) -> Result<ProcessDetail> {
    let id = record.notification_id;
    let claimed = self
      .store
      .claim_failed(id, record.retry_count)
      .await
      .map_err(Error::from_backend)?;
    if !claimed {
      return Ok(detail(record, ProcessOutcome::AlreadyClaimed));
    }

    let snapshots = futures::try_join!(
      self.store.get_user(record.user_id),
      self.store.get_event(record.event_id),
      self.store.get_user(record.operator_id),
    );
    let (user, event, operator) = match snapshots {
      Ok(s) => s,
      Err(e) => {
        self.release(id, record.retry_count, None).await;
        return Err(Error::from_backend(e));
      }
    };

    let (Some(user), Some(event), Some(operator)) = (user, event, operator) else {
      tracing::warn!(notification_id = %id, "snapshot missing; notification will not be retried");
      self
        .release(id, max_retries, Some(MISSING_DATA_ERROR.to_owned()))
        .await;
      let mut d = detail(record, ProcessOutcome::MissingData);
      d.retry_count = max_retries;
      d.error = Some(MISSING_DATA_ERROR.to_owned());
      return Ok(d);
    };

    let notice = Notice {
      event,
      operator,
      reason: record
        .metadata
        .delete_reason
        .clone()
        .unwrap_or_else(|| self.default_reason.clone()),
    };
    let outcome = self
      .dispatcher
      .send_from(&user, &notice, record.retry_count)
      .await;

    match outcome.notification_id {
      // The new attempt carries the history forward; the original goes.
      Some(replacement) => {
        if let Err(e) = self.store.delete_notification(id).await {
          tracing::warn!(notification_id = %id, error = %e, "could not remove superseded notification");
        }
        Ok(ProcessDetail {
          notification_id: id,
          user_id:         record.user_id,
          outcome:         if outcome.success {
            ProcessOutcome::Sent
          } else {
            ProcessOutcome::Failed
          },
          replacement_id:  Some(replacement),
          retry_count:     outcome.retry_count,
          error:           outcome.error,
        })
      }
      None => {
        self.release(id, record.retry_count, None).await;
        let mut d = detail(record, ProcessOutcome::Failed);
        d.error = outcome.error;
        Ok(d)
      }
    }
  }

  async fn release(&self, id: Uuid, retry_count: u32, error: Option<String>) {
    if let Err(e) = self.store.release_failed(id, retry_count, error).await {
      tracing::warn!(notification_id = %id, error = %e, "could not release claimed notification");
    }
  }
}

fn window_too_large() -> Error { Error::Validation("时间范围过大".into()) }

fn detail(record: &NotificationAttempt, outcome: ProcessOutcome) -> ProcessDetail {
  ProcessDetail {
    notification_id: record.notification_id,
    user_id: record.user_id,
    outcome,
    replacement_id: None,
    retry_count: record.retry_count,
    error: record.error.clone(),
  }
}

/// Default reprocessing window.
pub fn default_reprocess_age() -> Duration { Duration::hours(24) }

/// Default retention for [`DeliveryLedger::cleanup`].
pub fn default_retention() -> Duration { Duration::days(30) }
