//! Notification titles and bodies.

use std::fmt::Write as _;

use chrono::{DateTime, Datelike, FixedOffset, Offset as _, Utc, Weekday};
use huddle_core::{event::Event, notification::BatchOutcome, user::User};

use crate::config::DisplayConfig;

pub const EVENT_DELETED_TITLE: &str = "训练活动取消通知";
pub const BATCH_SUMMARY_TITLE: &str = "训练删除通知发送摘要";

const SIGNATURE: &str = "飞盘队训练助手";
const RECIPIENT_FALLBACK: &str = "用户";
const OPERATOR_FALLBACK: &str = "管理员";
const LOCATION_FALLBACK: &str = "待定";

/// A rendered message, ready to persist and hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
  pub title:   String,
  pub content: String,
}

/// `2025年01月05日 周日 18:30` in the configured display offset.
pub fn format_event_time(at: DateTime<Utc>, display: DisplayConfig) -> String {
  let offset = FixedOffset::east_opt(display.utc_offset_hours * 3600)
    .unwrap_or_else(|| Utc.fix());
  let local = at.with_timezone(&offset);
  let weekday = match local.weekday() {
    Weekday::Sun => "周日",
    Weekday::Mon => "周一",
    Weekday::Tue => "周二",
    Weekday::Wed => "周三",
    Weekday::Thu => "周四",
    Weekday::Fri => "周五",
    Weekday::Sat => "周六",
  };
  format!("{} {weekday} {}", local.format("%Y年%m月%d日"), local.format("%H:%M"))
}

/// The per-recipient cancellation notice.
pub fn event_deleted(
  recipient: &User,
  event: &Event,
  operator: &User,
  reason: &str,
  display: DisplayConfig,
) -> Rendered {
  let location = event
    .location
    .as_deref()
    .filter(|l| !l.trim().is_empty())
    .unwrap_or(LOCATION_FALLBACK);

  let content = format!(
    "亲爱的{user}：\n\n很抱歉通知您，您报名的训练活动已被取消：\n\n\
     📅 训练名称：{title}\n🕐 原定时间：{time}\n📍 训练地点：{location}\n\
     👤 操作人员：{operator}\n\n🔍 取消原因：{reason}\n\n\
     如有疑问，请联系管理员。感谢您的理解！\n\n{SIGNATURE}",
    user = recipient.name_or(RECIPIENT_FALLBACK),
    title = event.title,
    time = format_event_time(event.scheduled_at, display),
    operator = operator.name_or(OPERATOR_FALLBACK),
  );

  Rendered { title: EVENT_DELETED_TITLE.to_owned(), content }
}

/// The operator's report on a finished fan-out.
pub fn batch_summary(
  event: &Event,
  operator: &User,
  outcome: &BatchOutcome,
  sent_at: DateTime<Utc>,
  display: DisplayConfig,
) -> Rendered {
  let mut failed_section = String::new();
  if !outcome.failed_users.is_empty() {
    failed_section.push_str("\n❌ 发送失败用户：\n");
    for (i, f) in outcome.failed_users.iter().enumerate() {
      let reason = if f.reason.is_empty() { "未知错误" } else { &f.reason };
      let _ = writeln!(failed_section, "{}. {} ({reason})", i + 1, f.user_name);
    }
  }

  let content = format!(
    "管理员您好：\n\n训练删除通知已发送完成：\n\n\
     📅 训练名称：{title}\n🕐 训练时间：{time}\n👤 删除操作：{operator}\n\n\
     📊 通知统计：\n✅ 发送成功：{success} 人\n❌ 发送失败：{failed} 人\n\
     📱 总计用户：{total} 人\n\n{failed_section}\n\n发送时间：{sent}\n\n{SIGNATURE}",
    title = event.title,
    time = format_event_time(event.scheduled_at, display),
    operator = operator.name_or(OPERATOR_FALLBACK),
    success = outcome.success,
    failed = outcome.failed,
    total = outcome.total,
    sent = format_event_time(sent_at, display),
  );

  Rendered { title: BATCH_SUMMARY_TITLE.to_owned(), content }
}

/// Name shown for a recipient in outcomes and summaries.
pub fn recipient_name(user: &User) -> &str { user.name_or(RECIPIENT_FALLBACK) }

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use huddle_core::{
    event::EventStatus,
    notification::SendOutcome,
    user::Role,
  };
  use uuid::Uuid;

  use super::*;

  fn user(display: Option<&str>, role: Role) -> User {
    User {
      user_id: Uuid::new_v4(),
      display_name: display.map(str::to_owned),
      real_name: None,
      role,
      created_at: Utc::now(),
    }
  }

  fn event() -> Event {
    // 2025-01-05 10:30 UTC is 18:30 on a Sunday in UTC+8.
    let at = Utc.with_ymd_and_hms(2025, 1, 5, 10, 30, 0).unwrap();
    Event {
      event_id: Uuid::new_v4(),
      creator_id: Uuid::new_v4(),
      title: "周末训练".into(),
      location: None,
      content: None,
      notes: None,
      scheduled_at: at,
      status: EventStatus::Registering,
      is_deleted: false,
      delete_time: None,
      deleted_by: None,
      delete_reason: None,
      created_at: at,
      updated_at: at,
    }
  }

  #[test]
  fn event_time_uses_display_offset() {
    let e = event();
    assert_eq!(
      format_event_time(e.scheduled_at, DisplayConfig::default()),
      "2025年01月05日 周日 18:30"
    );
    assert_eq!(
      format_event_time(e.scheduled_at, DisplayConfig { utc_offset_hours: 0 }),
      "2025年01月05日 周日 10:30"
    );
  }

  #[test]
  fn deleted_notice_falls_back_on_missing_names() {
    let rendered = event_deleted(
      &user(None, Role::Member),
      &event(),
      &user(Some("  "), Role::Admin),
      "场地维修",
      DisplayConfig::default(),
    );
    assert_eq!(rendered.title, EVENT_DELETED_TITLE);
    assert!(rendered.content.starts_with("亲爱的用户："));
    assert!(rendered.content.contains("👤 操作人员：管理员"));
    assert!(rendered.content.contains("📍 训练地点：待定"));
    assert!(rendered.content.contains("🔍 取消原因：场地维修"));
    assert!(rendered.content.contains("2025年01月05日 周日 18:30"));
  }

  #[test]
  fn summary_lists_failed_users() {
    let mut outcome = BatchOutcome::new(2);
    outcome.record(Uuid::new_v4(), "小王", &SendOutcome {
      success:         true,
      notification_id: Some(Uuid::new_v4()),
      error:           None,
      retry_count:     0,
    });
    outcome.record(Uuid::new_v4(), "小李", &SendOutcome {
      success:         false,
      notification_id: None,
      error:           Some("invalid recipient".into()),
      retry_count:     0,
    });

    let rendered = batch_summary(
      &event(),
      &user(Some("教练"), Role::Admin),
      &outcome,
      Utc::now(),
      DisplayConfig::default(),
    );
    assert!(rendered.content.contains("✅ 发送成功：1 人"));
    assert!(rendered.content.contains("❌ 发送失败：1 人"));
    assert!(rendered.content.contains("📱 总计用户：2 人"));
    assert!(rendered.content.contains("1. 小李 (invalid recipient)"));
    assert!(rendered.content.contains("👤 删除操作：教练"));
  }
}
