//! Notification attempts and delivery outcomes.
//!
//! One [`NotificationAttempt`] is written per (event, recipient) send. Retries
//! update the same record in place; a batch additionally writes one
//! `batch_summary` record addressed to the operator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Enums ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  EventDeleted,
  BatchSummary,
}

impl NotificationKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::EventDeleted => "event_deleted",
      Self::BatchSummary => "batch_summary",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
  Pending,
  Sent,
  Failed,
  Read,
}

impl DeliveryStatus {
  pub const ALL: [Self; 4] = [Self::Pending, Self::Sent, Self::Failed, Self::Read];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Sent => "sent",
      Self::Failed => "failed",
      Self::Read => "read",
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Snapshot of the event as it was when the notification was produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationMetadata {
  pub event_title:   Option<String>,
  pub event_time:    Option<DateTime<Utc>>,
  pub delete_reason: Option<String>,
  /// Present only on `batch_summary` records.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub batch:         Option<BatchOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAttempt {
  pub notification_id: Uuid,
  pub event_id:        Uuid,
  /// The recipient.
  pub user_id:         Uuid,
  pub operator_id:     Uuid,
  pub kind:            NotificationKind,
  pub status:          DeliveryStatus,
  pub title:           String,
  pub content:         String,
  pub retry_count:     u32,
  pub last_retry_time: Option<DateTime<Utc>>,
  pub error:           Option<String>,
  pub created_at:      DateTime<Utc>,
  pub send_time:       Option<DateTime<Utc>>,
  pub read_time:       Option<DateTime<Utc>>,
  pub metadata:        NotificationMetadata,
}

/// Input to [`crate::store::NotificationStore::insert_notification`].
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub event_id:    Uuid,
  pub user_id:     Uuid,
  pub operator_id: Uuid,
  pub kind:        NotificationKind,
  pub status:      DeliveryStatus,
  pub title:       String,
  pub content:     String,
  pub retry_count: u32,
  pub created_at:  DateTime<Utc>,
  pub metadata:    NotificationMetadata,
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of delivering to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
  pub success:         bool,
  pub notification_id: Option<Uuid>,
  pub error:           Option<String>,
  pub retry_count:     u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
  Success,
  Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientOutcome {
  pub user_id:         Uuid,
  pub user_name:       String,
  pub status:          RecipientStatus,
  pub notification_id: Option<Uuid>,
  pub error:           Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecipient {
  pub user_id:   Uuid,
  pub user_name: String,
  pub reason:    String,
}

/// Aggregate result of a fan-out. `success + failed == total` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
  pub total:        usize,
  pub success:      usize,
  pub failed:       usize,
  pub details:      Vec<RecipientOutcome>,
  pub failed_users: Vec<FailedRecipient>,
}

impl BatchOutcome {
  pub fn new(total: usize) -> Self { Self { total, ..Self::default() } }

  pub fn record(&mut self, user_id: Uuid, user_name: &str, outcome: &SendOutcome) {
    if outcome.success {
      self.success += 1;
      self.details.push(RecipientOutcome {
        user_id,
        user_name: user_name.to_owned(),
        status: RecipientStatus::Success,
        notification_id: outcome.notification_id,
        error: None,
      });
    } else {
      let reason = outcome.error.clone().unwrap_or_default();
      self.failed += 1;
      self.details.push(RecipientOutcome {
        user_id,
        user_name: user_name.to_owned(),
        status: RecipientStatus::Failed,
        notification_id: outcome.notification_id,
        error: Some(reason.clone()),
      });
      self.failed_users.push(FailedRecipient {
        user_id,
        user_name: user_name.to_owned(),
        reason,
      });
    }
  }
}

// ─── Stats ───────────────────────────────────────────────────────────────────

/// Delivery health over a trailing window. Rates are percentages rounded to
/// two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryStats {
  pub time_range_days: u32,
  pub total:           usize,
  pub sent:            usize,
  pub failed:          usize,
  pub pending:         usize,
  pub read:            usize,
  pub success_rate:    f64,
  pub read_rate:       f64,
}

impl DeliveryStats {
  pub fn from_counts(
    time_range_days: u32,
    sent: usize,
    failed: usize,
    pending: usize,
    read: usize,
  ) -> Self {
    let delivered = sent + read;
    let success_rate = if delivered > 0 {
      percent(delivered, delivered + failed)
    } else {
      0.0
    };
    let read_rate = if delivered > 0 { percent(read, delivered) } else { 0.0 };
    Self {
      time_range_days,
      total: sent + failed + pending + read,
      sent,
      failed,
      pending,
      read,
      success_rate,
      read_rate,
    }
  }
}

fn percent(part: usize, whole: usize) -> f64 {
  (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stats_rates() {
    let stats = DeliveryStats::from_counts(7, 6, 2, 1, 2);
    assert_eq!(stats.total, 11);
    assert_eq!(stats.success_rate, 80.0);
    assert_eq!(stats.read_rate, 25.0);
  }

  #[test]
  fn stats_rates_are_zero_without_deliveries() {
    let stats = DeliveryStats::from_counts(7, 0, 3, 0, 0);
    assert_eq!(stats.success_rate, 0.0);
    assert_eq!(stats.read_rate, 0.0);
  }

  #[test]
  fn batch_record_conserves_counts() {
    let mut batch = BatchOutcome::new(2);
    batch.record(Uuid::new_v4(), "a", &SendOutcome {
      success:         true,
      notification_id: Some(Uuid::new_v4()),
      error:           None,
      retry_count:     0,
    });
    batch.record(Uuid::new_v4(), "b", &SendOutcome {
      success:         false,
      notification_id: None,
      error:           Some("invalid recipient".into()),
      retry_count:     0,
    });
    assert_eq!(batch.success + batch.failed, batch.total);
    assert_eq!(batch.failed_users.len(), 1);
    assert_eq!(batch.failed_users[0].reason, "invalid recipient");
  }
}
