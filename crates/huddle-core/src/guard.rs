//! Role and ownership checks against supplied snapshots.

use crate::{event::Event, user::User};

/// Admins may cancel any event; members only the ones they created.
pub fn can_cancel(actor: &User, event: &Event) -> bool {
  actor.is_admin() || actor.user_id == event.creator_id
}

pub fn can_mutate_attendance(actor: &User) -> bool { actor.is_admin() }

pub fn can_create_event(actor: &User) -> bool { actor.is_admin() }
