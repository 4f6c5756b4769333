//! Engine configuration.
//!
//! Every field has a serde default so a partial `[engine]` table (or none at
//! all) deserialises into a working configuration.

use std::time::Duration;

use huddle_core::Error;
use serde::{Deserialize, Serialize};

use crate::sender::SendError;

// ─── Retry ───────────────────────────────────────────────────────────────────

/// How a single recipient's delivery is retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  pub max_retries:        u32,
  /// Delay before retry `k` is `base_delay_ms * 2^k`.
  pub base_delay_ms:      u64,
  /// Case-insensitive substrings that mark a send error as transient.
  pub retryable_keywords: Vec<String>,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries:        3,
      base_delay_ms:      1000,
      retryable_keywords: [
        "网络连接超时",
        "服务暂时不可用",
        "请求超时",
        "timeout",
        "network",
        "connection",
        "temporarily unavailable",
      ]
      .into_iter()
      .map(str::to_owned)
      .collect(),
    }
  }
}

impl RetryPolicy {
  pub fn is_retryable(&self, message: &str) -> bool {
    let haystack = message.to_lowercase();
    self
      .retryable_keywords
      .iter()
      .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
  }

  /// Sort a transport error into a transient or a permanent delivery
  /// failure.
  pub fn classify(&self, error: SendError) -> Error {
    if self.is_retryable(&error.0) {
      Error::TransientDelivery(error.0)
    } else {
      Error::PermanentDelivery(error.0)
    }
  }

  /// Backoff before the retry that follows `retry_count` failed attempts.
  pub fn delay_for(&self, retry_count: u32) -> Duration {
    let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
    Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
  }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
  /// Recipients sent to concurrently; chunks run one after another.
  pub chunk_size:       usize,
  pub chunk_pause_ms:   u64,
  /// Upper bound on one recipient's delivery, retries and backoff included.
  pub send_deadline_ms: u64,
  pub retry:            RetryPolicy,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      chunk_size:       5,
      chunk_pause_ms:   100,
      send_deadline_ms: 30_000,
      retry:            RetryPolicy::default(),
    }
  }
}

impl DispatchConfig {
  pub fn chunk_pause(&self) -> Duration { Duration::from_millis(self.chunk_pause_ms) }

  pub fn send_deadline(&self) -> Duration { Duration::from_millis(self.send_deadline_ms) }
}

// ─── Cascade ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
  /// How long a cancellation waits for the notification fan-out before
  /// answering without a notification result.
  pub notification_deadline_ms:   u64,
  /// Reason recorded when the operator gives none.
  pub default_reason:             String,
  /// `cancel_reason` written on each cancelled registration.
  pub registration_cancel_reason: String,
}

impl Default for CascadeConfig {
  fn default() -> Self {
    Self {
      notification_deadline_ms:   10_000,
      default_reason:             "管理员删除".into(),
      registration_cancel_reason: "训练已被删除".into(),
    }
  }
}

impl CascadeConfig {
  pub fn notification_deadline(&self) -> Duration {
    Duration::from_millis(self.notification_deadline_ms)
  }
}

// ─── Display ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
  /// Offset applied to event times shown in notification content.
  pub utc_offset_hours: i32,
}

impl Default for DisplayConfig {
  fn default() -> Self { Self { utc_offset_hours: 8 } }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub dispatch: DispatchConfig,
  pub cascade:  CascadeConfig,
  pub display:  DisplayConfig,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_doubles_from_base() {
    let policy = RetryPolicy::default();
    let delays: Vec<_> = (0..3).map(|k| policy.delay_for(k).as_millis()).collect();
    assert_eq!(delays, vec![1000, 2000, 4000]);
  }

  #[test]
  fn backoff_saturates() {
    let policy = RetryPolicy { base_delay_ms: u64::MAX / 2, ..Default::default() };
    assert_eq!(policy.delay_for(70), Duration::from_millis(u64::MAX));
  }

  #[test]
  fn classifier_matches_keywords_case_insensitively() {
    let policy = RetryPolicy::default();
    assert!(policy.is_retryable("Connection reset by peer"));
    assert!(policy.is_retryable("upstream TIMEOUT"));
    assert!(policy.is_retryable("服务暂时不可用，请稍后再试"));
    assert!(!policy.is_retryable("invalid recipient"));
    assert!(!policy.is_retryable(""));
  }

  #[test]
  fn send_errors_classify_into_delivery_kinds() {
    let policy = RetryPolicy::default();
    let transient = policy.classify(SendError::new("network unreachable"));
    assert!(matches!(&transient, Error::TransientDelivery(m) if m == "network unreachable"));
    assert_eq!(transient.kind(), huddle_core::ErrorKind::TransientDelivery);

    let permanent = policy.classify(SendError::new("invalid recipient"));
    assert!(matches!(&permanent, Error::PermanentDelivery(m) if m == "invalid recipient"));
    assert!(!permanent.is_rejection());
  }

  #[test]
  fn classifier_uses_configured_list() {
    let policy = RetryPolicy {
      retryable_keywords: vec!["busy".into()],
      ..Default::default()
    };
    assert!(policy.is_retryable("server busy"));
    assert!(!policy.is_retryable("network unreachable"));
  }

  #[test]
  fn partial_config_fills_defaults() {
    let cfg: EngineConfig =
      serde_json::from_str(r#"{"dispatch": {"chunk_size": 2}}"#).unwrap();
    assert_eq!(cfg.dispatch.chunk_size, 2);
    assert_eq!(cfg.dispatch.retry.max_retries, 3);
    assert_eq!(cfg.cascade.default_reason, "管理员删除");
    assert_eq!(cfg.display.utc_offset_hours, 8);
  }
}
