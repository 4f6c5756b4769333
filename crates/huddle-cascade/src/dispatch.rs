//! The notification dispatcher.
//!
//! [`Dispatcher::send_one`] owns one recipient's delivery: it writes a single
//! `pending` record, retries transient failures in place with exponential
//! backoff, and leaves the record `sent` or `failed`. [`Dispatcher::send_batch`]
//! fans out over a recipient list in fixed-width chunks and files a
//! `batch_summary` record for the operator.

use std::sync::Arc;

use futures::future::join_all;
use huddle_core::{
  Error,
  clock::Clock,
  event::Event,
  notification::{
    BatchOutcome, DeliveryStatus, NewNotification, NotificationKind,
    NotificationMetadata, SendOutcome,
  },
  store::NotificationStore,
  user::User,
};
use tokio::time::{Instant, sleep, timeout_at};
use uuid::Uuid;

use crate::{
  config::{DispatchConfig, DisplayConfig},
  sender::{OutboundMessage, Sender},
  template,
};

/// Error recorded when a delivery runs out its deadline. Contains a
/// retryable keyword so the reprocessor picks it up again.
pub const DEADLINE_ERROR: &str = "delivery deadline exceeded (timeout)";

/// Everything a cancellation notice needs besides the recipient.
#[derive(Debug, Clone)]
pub struct Notice {
  pub event:    Event,
  pub operator: User,
  pub reason:   String,
}

pub struct Dispatcher<S, T> {
  store:   S,
  sender:  Arc<T>,
  clock:   Arc<dyn Clock>,
  config:  DispatchConfig,
  display: DisplayConfig,
}

impl<S: Clone, T> Clone for Dispatcher<S, T> {
  fn clone(&self) -> Self {
    Self {
      store:   self.store.clone(),
      sender:  Arc::clone(&self.sender),
      clock:   Arc::clone(&self.clock),
      config:  self.config.clone(),
      display: self.display,
    }
  }
}

impl<S, T> Dispatcher<S, T>
where
  S: NotificationStore + Clone + 'static,
  T: Sender,
{
  pub fn new(
    store: S,
    sender: Arc<T>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    display: DisplayConfig,
  ) -> Self {
    Self { store, sender, clock, config, display }
  }

  pub fn config(&self) -> &DispatchConfig { &self.config }

  /// Deliver one cancellation notice, starting from a fresh retry count.
  pub async fn send_one(&self, recipient: &User, notice: &Notice) -> SendOutcome {
    self.send_from(recipient, notice, 0).await
  }

  /// Deliver one cancellation notice whose earlier attempts already used
  /// `retry_count` retries. Used by reprocessing.
  pub async fn send_from(
    &self,
    recipient: &User,
    notice: &Notice,
    retry_count: u32,
  ) -> SendOutcome {
    let rendered = template::event_deleted(
      recipient,
      &notice.event,
      &notice.operator,
      &notice.reason,
      self.display,
    );

    let record = NewNotification {
      event_id:    notice.event.event_id,
      user_id:     recipient.user_id,
      operator_id: notice.operator.user_id,
      kind:        NotificationKind::EventDeleted,
      status:      DeliveryStatus::Pending,
      title:       rendered.title,
      content:     rendered.content,
      retry_count,
      created_at:  self.clock.now(),
      metadata:    NotificationMetadata {
        event_title:   Some(notice.event.title.clone()),
        event_time:    Some(notice.event.scheduled_at),
        delete_reason: Some(notice.reason.clone()),
        batch:         None,
      },
    };

    let attempt = match self.store.insert_notification(record).await {
      Ok(a) => a,
      Err(e) => {
        tracing::warn!(
          user_id = %recipient.user_id,
          event_id = %notice.event.event_id,
          error = %e,
          "could not record notification attempt",
        );
        return SendOutcome {
          success: false,
          notification_id: None,
          error: Some(e.to_string()),
          retry_count,
        };
      }
    };

    let message = OutboundMessage {
      notification_id: attempt.notification_id,
      user_id:         attempt.user_id,
      event_id:        attempt.event_id,
      kind:            attempt.kind,
      title:           attempt.title,
      content:         attempt.content,
    };
    self.deliver(message, retry_count).await
  }

  async fn deliver(&self, message: OutboundMessage, mut retry_count: u32) -> SendOutcome {
    let id = message.notification_id;
    let policy = &self.config.retry;
    let deadline = Instant::now() + self.config.send_deadline();

    loop {
      let error = match timeout_at(deadline, self.sender.send(&message)).await {
        Ok(Ok(())) => {
          if let Err(e) = self.store.mark_sent(id, self.clock.now()).await {
            tracing::warn!(notification_id = %id, error = %e, "could not mark notification sent");
          }
          tracing::debug!(notification_id = %id, user_id = %message.user_id, retry_count, "notification sent");
          return SendOutcome {
            success: true,
            notification_id: Some(id),
            error: None,
            retry_count,
          };
        }
        Ok(Err(e)) => policy.classify(e),
        Err(_) => return self.fail(&message, retry_count, DEADLINE_ERROR.to_owned()).await,
      };

      tracing::warn!(
        notification_id = %id,
        user_id = %message.user_id,
        retry_count,
        kind = ?error.kind(),
        error = %error,
        "notification send failed",
      );

      let error = match error {
        Error::TransientDelivery(reason) if retry_count < policy.max_retries => reason,
        other => return self.fail(&message, retry_count, other.to_string()).await,
      };

      let delay = policy.delay_for(retry_count);
      retry_count += 1;
      if let Err(e) = self
        .store
        .record_retry(id, retry_count, error, self.clock.now())
        .await
      {
        tracing::warn!(notification_id = %id, error = %e, "could not record retry");
      }

      if timeout_at(deadline, sleep(delay)).await.is_err() {
        return self.fail(&message, retry_count, DEADLINE_ERROR.to_owned()).await;
      }
    }
  }

  async fn fail(
    &self,
    message: &OutboundMessage,
    retry_count: u32,
    error: String,
  ) -> SendOutcome {
    let id = message.notification_id;
    if let Err(e) = self
      .store
      .mark_failed(id, retry_count, error.clone(), self.clock.now())
      .await
    {
      tracing::warn!(notification_id = %id, error = %e, "could not mark notification failed");
    }
    SendOutcome {
      success: false,
      notification_id: Some(id),
      error: Some(error),
      retry_count,
    }
  }

  /// Notify every recipient, at most `chunk_size` at a time. Never fails:
  /// per-recipient problems land in the returned outcome.
  pub async fn send_batch(&self, recipients: &[User], notice: &Notice) -> BatchOutcome {
    let mut outcome = BatchOutcome::new(recipients.len());

    for (i, chunk) in recipients.chunks(self.config.chunk_size.max(1)).enumerate() {
      if i > 0 {
        sleep(self.config.chunk_pause()).await;
      }
      let results =
        join_all(chunk.iter().map(|r| self.send_one(r, notice))).await;
      for (recipient, result) in chunk.iter().zip(results) {
        outcome.record(recipient.user_id, template::recipient_name(recipient), &result);
      }
    }

    tracing::info!(
      event_id = %notice.event.event_id,
      total = outcome.total,
      success = outcome.success,
      failed = outcome.failed,
      "notification batch complete",
    );

    if let Err(e) = self.write_summary(notice, &outcome).await {
      tracing::warn!(
        event_id = %notice.event.event_id,
        error = %e,
        "could not record batch summary",
      );
    }
    outcome
  }

  async fn write_summary(&self, notice: &Notice, outcome: &BatchOutcome) -> Result<Uuid, S::Error> {
    let now = self.clock.now();
    let rendered =
      template::batch_summary(&notice.event, &notice.operator, outcome, now, self.display);
    let record = NewNotification {
      event_id:    notice.event.event_id,
      user_id:     notice.operator.user_id,
      operator_id: notice.operator.user_id,
      kind:        NotificationKind::BatchSummary,
      status:      DeliveryStatus::Sent,
      title:       rendered.title,
      content:     rendered.content,
      retry_count: 0,
      created_at:  now,
      metadata:    NotificationMetadata {
        event_title:   Some(notice.event.title.clone()),
        event_time:    Some(notice.event.scheduled_at),
        delete_reason: Some(notice.reason.clone()),
        batch:         Some(outcome.clone()),
      },
    };
    let summary = self.store.insert_notification(record).await?;
    Ok(summary.notification_id)
  }
}
