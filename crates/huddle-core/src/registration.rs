//! Per-(event, user) registration records.
//!
//! A member toggles freely between `signed_up` and `leave_requested` until
//! the event starts. `present`, `absent` and `cancelled` are terminal.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
  SignedUp,
  LeaveRequested,
  Present,
  Absent,
  Cancelled,
}

impl RegistrationStatus {
  pub const ALL: [Self; 5] = [
    Self::SignedUp,
    Self::LeaveRequested,
    Self::Present,
    Self::Absent,
    Self::Cancelled,
  ];

  /// `present`, `absent` and `cancelled` admit no further transition.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Present | Self::Absent | Self::Cancelled)
  }

  /// Statuses a member may choose for themselves.
  pub fn is_member_choice(self) -> bool {
    matches!(self, Self::SignedUp | Self::LeaveRequested)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::SignedUp => "signed_up",
      Self::LeaveRequested => "leave_requested",
      Self::Present => "present",
      Self::Absent => "absent",
      Self::Cancelled => "cancelled",
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
  pub registration_id: Uuid,
  pub event_id:        Uuid,
  pub user_id:         Uuid,
  pub status:          RegistrationStatus,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
  pub cancel_reason:   Option<String>,
  pub cancel_time:     Option<DateTime<Utc>>,
}

/// Registration counts reported by the cancellation cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationStats {
  pub total:           usize,
  pub signed_up:       usize,
  pub leave_requested: usize,
  pub present:         usize,
  pub absent:          usize,
}

impl RegistrationStats {
  pub fn tally(registrations: &[Registration]) -> Self {
    registrations.iter().fold(Self::default(), |mut acc, r| {
      acc.total += 1;
      match r.status {
        RegistrationStatus::SignedUp => acc.signed_up += 1,
        RegistrationStatus::LeaveRequested => acc.leave_requested += 1,
        RegistrationStatus::Present => acc.present += 1,
        RegistrationStatus::Absent => acc.absent += 1,
        RegistrationStatus::Cancelled => {}
      }
      acc
    })
  }
}

/// Count of registrations per status; every status is present, zero or not.
pub fn count_by_status(
  registrations: &[Registration],
) -> BTreeMap<RegistrationStatus, usize> {
  let mut counts: BTreeMap<_, _> =
    RegistrationStatus::ALL.iter().map(|s| (*s, 0)).collect();
  for r in registrations {
    *counts.entry(r.status).or_default() += 1;
  }
  counts
}
