//! Team members as seen by the coordinator.
//!
//! Identity issuance and profile editing live elsewhere; this crate only
//! needs a snapshot of who is acting and what to call them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Member,
}

/// A user snapshot. Also serves as the acting principal for every mutating
/// operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:      Uuid,
  /// Team nickname, preferred over the real name wherever a name is shown.
  pub display_name: Option<String>,
  pub real_name:    Option<String>,
  pub role:         Role,
  pub created_at:   DateTime<Utc>,
}

impl User {
  pub fn is_admin(&self) -> bool { self.role == Role::Admin }

  /// Display name, then real name, then `fallback`. Blank names are skipped.
  pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
    [self.display_name.as_deref(), self.real_name.as_deref()]
      .into_iter()
      .flatten()
      .find(|n| !n.trim().is_empty())
      .unwrap_or(fallback)
  }
}

/// Input to [`crate::store::Directory::add_user`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
  pub display_name: Option<String>,
  pub real_name:    Option<String>,
  pub role:         Role,
  pub created_at:   DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user(display: Option<&str>, real: Option<&str>) -> User {
    User {
      user_id:      Uuid::new_v4(),
      display_name: display.map(str::to_owned),
      real_name:    real.map(str::to_owned),
      role:         Role::Member,
      created_at:   Utc::now(),
    }
  }

  #[test]
  fn name_prefers_display_name() {
    assert_eq!(user(Some("Disc"), Some("Real")).name_or("用户"), "Disc");
    assert_eq!(user(Some("  "), Some("Real")).name_or("用户"), "Real");
    assert_eq!(user(None, None).name_or("用户"), "用户");
  }
}
