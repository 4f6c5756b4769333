//! Outbound transports.
//!
//! The dispatcher does not care how a message reaches a user; it only needs
//! a [`Sender`] that either accepts the message or returns an error whose
//! text the [`crate::config::RetryPolicy`] can classify.

use std::future::Future;

use thiserror::Error;
use uuid::Uuid;

use huddle_core::notification::NotificationKind;

/// One message on its way to one user.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
  pub notification_id: Uuid,
  pub user_id:         Uuid,
  pub event_id:        Uuid,
  pub kind:            NotificationKind,
  pub title:           String,
  pub content:         String,
}

/// A transport failure. The message is matched against the retryable
/// keyword list, so it should describe the failure as the transport saw it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SendError(pub String);

impl SendError {
  pub fn new(message: impl Into<String>) -> Self { Self(message.into()) }
}

pub trait Sender: Send + Sync + 'static {
  fn send<'a>(
    &'a self,
    message: &'a OutboundMessage,
  ) -> impl Future<Output = Result<(), SendError>> + Send + 'a;
}

/// Accepts every message and logs it. The in-app inbox is the delivery
/// channel; binding to a push service is left to other transports.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

impl Sender for LogSender {
  async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
    tracing::debug!(
      notification_id = %message.notification_id,
      user_id = %message.user_id,
      event_id = %message.event_id,
      title = %message.title,
      "notification delivered to inbox",
    );
    Ok(())
  }
}
