//! Time-gated permission checks.
//!
//! Every function here is a pure function of an event snapshot and an
//! instant; callers supply `now` from a [`crate::clock::Clock`].

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
  Error,
  event::{Event, EventStatus},
};

/// Events cannot be cancelled this many hours before their start.
pub const CANCEL_CUTOFF_HOURS: i64 = 2;

/// How long a session runs; sign-up and leave are frozen for this window.
pub const SESSION_HOURS: i64 = 3;

/// Self-service attendance confirmation opens this long after the start.
pub const CHECK_IN_DELAY_HOURS: i64 = 1;

/// Why [`can_cancel`] refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancelDenial {
  #[error("训练已经开始或结束，不能删除")]
  AlreadyStarted,

  #[error("距离训练开始仅剩{remaining}，不能删除训练")]
  TooCloseToStart { remaining: String },

  #[error("训练已结束，不能删除")]
  AlreadyFinished,
}

impl From<CancelDenial> for Error {
  fn from(d: CancelDenial) -> Self { Error::Timing(d.to_string()) }
}

/// Rules, in order: already started, inside the two-hour cutoff, already
/// finished.
pub fn can_cancel(event: &Event, now: DateTime<Utc>) -> Result<(), CancelDenial> {
  if event.scheduled_at <= now {
    return Err(CancelDenial::AlreadyStarted);
  }
  let until_start = event.scheduled_at - now;
  if until_start <= Duration::hours(CANCEL_CUTOFF_HOURS) {
    return Err(CancelDenial::TooCloseToStart {
      remaining: format_remaining(until_start),
    });
  }
  if event.status == EventStatus::Finished {
    return Err(CancelDenial::AlreadyFinished);
  }
  Ok(())
}

/// Sign-up and leave are blocked while the session is running.
pub fn can_register_or_leave(event: &Event, now: DateTime<Utc>) -> bool {
  let running =
    event.scheduled_at <= now && now < event.scheduled_at + Duration::hours(SESSION_HOURS);
  !(event.status == EventStatus::Ongoing || running)
}

pub fn can_check_in(event: &Event, now: DateTime<Utc>) -> bool {
  now >= event.scheduled_at + Duration::hours(CHECK_IN_DELAY_HOURS)
}

/// `1小时30分钟` above one hour, `45分钟` otherwise. Both parts are floored.
pub fn format_remaining(remaining: Duration) -> String {
  let millis = remaining.num_milliseconds().max(0);
  let total_minutes = millis / 60_000;
  if millis > 3_600_000 {
    format!("{}小时{}分钟", total_minutes / 60, total_minutes % 60)
  } else {
    format!("{total_minutes}分钟")
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  fn event(scheduled_at: DateTime<Utc>, status: EventStatus) -> Event {
    Event {
      event_id: Uuid::new_v4(),
      creator_id: Uuid::new_v4(),
      title: "Zone defense".into(),
      location: Some("East field".into()),
      content: None,
      notes: None,
      scheduled_at,
      status,
      is_deleted: false,
      delete_time: None,
      deleted_by: None,
      delete_reason: None,
      created_at: scheduled_at - Duration::days(3),
      updated_at: scheduled_at - Duration::days(3),
    }
  }

  #[test]
  fn started_events_cannot_be_cancelled() {
    let now = Utc::now();
    for offset in [Duration::zero(), Duration::minutes(1), Duration::days(2)] {
      let e = event(now - offset, EventStatus::Registering);
      assert_eq!(can_cancel(&e, now), Err(CancelDenial::AlreadyStarted));
    }
  }

  #[test]
  fn inside_cutoff_reports_remaining_time() {
    let now = Utc::now();
    let e = event(now + Duration::minutes(90), EventStatus::Registering);
    let denial = can_cancel(&e, now).unwrap_err();
    assert_eq!(denial, CancelDenial::TooCloseToStart {
      remaining: "1小时30分钟".into(),
    });
    assert_eq!(denial.to_string(), "距离训练开始仅剩1小时30分钟，不能删除训练");
  }

  #[test]
  fn exactly_two_hours_is_still_too_close() {
    let now = Utc::now();
    let e = event(now + Duration::hours(2), EventStatus::Registering);
    assert_eq!(can_cancel(&e, now), Err(CancelDenial::TooCloseToStart {
      remaining: "2小时0分钟".into(),
    }));
  }

  #[test]
  fn under_an_hour_is_minutes_only() {
    let now = Utc::now();
    let e = event(now + Duration::seconds(45 * 60 + 30), EventStatus::Registering);
    assert_eq!(can_cancel(&e, now), Err(CancelDenial::TooCloseToStart {
      remaining: "45分钟".into(),
    }));
  }

  #[test]
  fn finished_status_blocks_cancel() {
    let now = Utc::now();
    let e = event(now + Duration::hours(5), EventStatus::Finished);
    assert_eq!(can_cancel(&e, now), Err(CancelDenial::AlreadyFinished));
  }

  #[test]
  fn far_future_event_can_be_cancelled() {
    let now = Utc::now();
    let e = event(now + Duration::hours(5), EventStatus::Registering);
    assert_eq!(can_cancel(&e, now), Ok(()));
  }

  #[test]
  fn registration_frozen_during_session() {
    let start = Utc::now();
    let e = event(start, EventStatus::Registering);
    assert!(can_register_or_leave(&e, start - Duration::minutes(1)));
    assert!(!can_register_or_leave(&e, start));
    assert!(!can_register_or_leave(&e, start + Duration::minutes(179)));
    assert!(can_register_or_leave(&e, start + Duration::hours(SESSION_HOURS)));

    let ongoing = event(start + Duration::days(1), EventStatus::Ongoing);
    assert!(!can_register_or_leave(&ongoing, start));
  }

  #[test]
  fn check_in_opens_an_hour_after_start() {
    let start = Utc::now();
    let e = event(start, EventStatus::Finished);
    assert!(!can_check_in(&e, start + Duration::minutes(59)));
    assert!(can_check_in(&e, start + Duration::hours(CHECK_IN_DELAY_HOURS)));
  }
}
