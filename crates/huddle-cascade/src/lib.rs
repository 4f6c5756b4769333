//! The Huddle engine: event records, the registration ledger, the
//! cancellation cascade, notification dispatch and the delivery ledger.
//!
//! Everything is generic over a [`huddle_core::store::Store`] and a
//! [`sender::Sender`]. [`Engine`] wires the pieces together so callers (the
//! API, the server's maintenance commands) hold a single handle.
//!
//! ```rust,ignore
//! let engine = Engine::new(store, LogSender, Arc::new(SystemClock), EngineConfig::default());
//! let report = engine.cascade().cancel_event(event_id, operator_id, None).await?;
//! ```

pub mod cascade;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod events;
pub mod ledger;
pub mod sender;
pub mod template;


use std::sync::Arc;

use huddle_core::{Error, Result, clock::Clock, store::Store, user::User};
use uuid::Uuid;

pub use cascade::{CancelResult, Cascade, CascadeReport};
pub use config::EngineConfig;
pub use delivery::DeliveryLedger;
pub use dispatch::Dispatcher;
pub use events::EventService;
pub use ledger::RegistrationLedger;
pub use sender::{LogSender, Sender};

pub struct Engine<S, T = LogSender> {
  store:      S,
  events:     EventService<S>,
  ledger:     RegistrationLedger<S>,
  dispatcher: Dispatcher<S, T>,
  cascade:    Cascade<S, T>,
  delivery:   DeliveryLedger<S, T>,
  config:     EngineConfig,
}

impl<S: Store, T: Sender> Engine<S, T> {
  pub fn new(store: S, sender: T, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
    let sender = Arc::new(sender);
    let events = EventService::new(store.clone(), Arc::clone(&clock));
    let ledger = RegistrationLedger::new(store.clone(), Arc::clone(&clock));
    let dispatcher = Dispatcher::new(
      store.clone(),
      sender,
      Arc::clone(&clock),
      config.dispatch.clone(),
      config.display,
    );
    let cascade = Cascade::new(
      store.clone(),
      events.clone(),
      ledger.clone(),
      dispatcher.clone(),
      Arc::clone(&clock),
      config.cascade.clone(),
    );
    let delivery = DeliveryLedger::new(
      store.clone(),
      dispatcher.clone(),
      clock,
      config.cascade.default_reason.clone(),
    );
    Self { store, events, ledger, dispatcher, cascade, delivery, config }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn events(&self) -> &EventService<S> { &self.events }

  pub fn ledger(&self) -> &RegistrationLedger<S> { &self.ledger }

  pub fn dispatcher(&self) -> &Dispatcher<S, T> { &self.dispatcher }

  pub fn cascade(&self) -> &Cascade<S, T> { &self.cascade }

  pub fn delivery(&self) -> &DeliveryLedger<S, T> { &self.delivery }

  pub fn config(&self) -> &EngineConfig { &self.config }

  /// Resolve the acting user. Unknown ids are rejected as not found.
  pub async fn actor(&self, user_id: Uuid) -> Result<User> {
    self
      .store
      .get_user(user_id)
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::NotFound("用户不存在".into()))
  }
}
