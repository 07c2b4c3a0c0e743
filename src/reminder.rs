use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::config::TZ;
use crate::store::SharedStore;
use crate::types::{EventKind, EventRecord};

/// One reminder ready to be delivered to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub chat_id: i64,
    pub text: String,
}

/// Sweep all stored records and collect J-7 / J-1 reminders relative to
/// `today`. Records without a computable next occurrence are skipped.
pub fn due_reminders(events: &[EventRecord], today: NaiveDate) -> Vec<Reminder> {
    let mut out = Vec::new();
    for record in events {
        let Some(next) = crate::dates::next_occurrence(record, today) else {
            continue;
        };
        let delta = (next - today).num_days();
        if delta != 7 && delta != 1 {
            continue;
        }
        out.push(Reminder {
            chat_id: record.chat_id,
            text: reminder_text(record, next, delta),
        });
    }
    out
}

fn reminder_text(record: &EventRecord, next: NaiveDate, delta: i64) -> String {
    use chrono::Datelike;
    match record.kind {
        EventKind::Birthday => {
            let label = record.label();
            if delta == 7 {
                format!(
                    "🎂 One week until {}'s birthday ({:02}-{:02})!",
                    label,
                    next.day(),
                    next.month()
                )
            } else {
                format!(
                    "🎂 Tomorrow is {}'s birthday ({:02}-{:02})!",
                    label,
                    next.day(),
                    next.month()
                )
            }
        }
        EventKind::Event => {
            if delta == 7 {
                format!(
                    "📅 One week until: {} ({:02}-{:02}-{})",
                    record.title,
                    next.day(),
                    next.month(),
                    next.year()
                )
            } else {
                format!(
                    "📅 Tomorrow: {} ({:02}-{:02}-{})",
                    record.title,
                    next.day(),
                    next.month(),
                    next.year()
                )
            }
        }
    }
}

/// Next 09:00 in the configured zone, strictly after `now`. Falls back to
/// now + 24h if the local time cannot be resolved (DST gap on every
/// candidate day, which does not happen in practice).
pub fn next_sweep_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&TZ);
    for offset in 0..3 {
        let date = local.date_naive() + Duration::days(offset);
        let Some(naive) = date.and_hms_opt(9, 0, 0) else {
            continue;
        };
        if let Some(target) = TZ.from_local_datetime(&naive).earliest() {
            let target_utc = target.with_timezone(&Utc);
            if target_utc > now {
                return target_utc;
            }
        }
    }
    now + Duration::hours(24)
}

/// Daily reminder sweep. Wired only when `REMINDERS_ENABLED` is set; the
/// sweep logic itself stays reachable for manual wiring and tests.
pub struct ReminderJob {
    store: SharedStore,
    bot: Bot,
}

impl ReminderJob {
    pub fn new(store: SharedStore, bot: Bot) -> Self {
        Self { store, bot }
    }

    /// Spawn the daily loop: sleep until the next 09:00 in the configured
    /// zone, sweep, repeat.
    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let target = next_sweep_utc(now);
                let wait = (target - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                self.sweep().await;
            }
        });
        info!("Reminder job spawned");
    }

    /// One pass over the store. Delivery failures are logged and swallowed
    /// per event; the sweep continues.
    pub async fn sweep(&self) {
        let today = Utc::now().with_timezone(&TZ).date_naive();
        let reminders = {
            let store = self.store.lock().await;
            due_reminders(store.events(), today)
        };

        for reminder in reminders {
            if let Err(e) = self
                .bot
                .send_message(ChatId(reminder.chat_id), reminder.text.clone())
                .await
            {
                warn!(chat_id = reminder.chat_id, "Reminder delivery failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn birthday(chat_id: i64, name: &str, day: u32, month: u32) -> EventRecord {
        EventRecord {
            chat_id,
            kind: EventKind::Birthday,
            user_id: None,
            username: Some(name.to_string()),
            display_name: String::new(),
            title: String::new(),
            day,
            month,
            year: None,
        }
    }

    fn event(chat_id: i64, title: &str, day: u32, month: u32, year: i32) -> EventRecord {
        EventRecord {
            chat_id,
            kind: EventKind::Event,
            user_id: None,
            username: None,
            display_name: String::new(),
            title: title.to_string(),
            day,
            month,
            year: Some(year),
        }
    }

    #[test]
    fn test_sweep_at_exactly_seven_days_emits_one_reminder() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 7).unwrap();
        let events = vec![
            event(-1, "Dinner", 14, 2, 2026),  // delta 7
            event(-1, "Picnic", 20, 2, 2026),  // delta 13
            event(-2, "Old", 1, 1, 2026),      // past
        ];
        let due = due_reminders(&events, today);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].chat_id, -1);
        assert_eq!(due[0].text, "📅 One week until: Dinner (14-02-2026)");
    }

    #[test]
    fn test_sweep_at_one_day() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 13).unwrap();
        let events = vec![event(-1, "Dinner", 14, 2, 2026)];
        let due = due_reminders(&events, today);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].text, "📅 Tomorrow: Dinner (14-02-2026)");
    }

    #[test]
    fn test_birthday_rolls_over_year_end() {
        // Birthday on Jan 3, sweep on Dec 27: next occurrence is next year,
        // delta exactly 7.
        let today = NaiveDate::from_ymd_opt(2026, 12, 27).unwrap();
        let events = vec![birthday(-1, "dana", 3, 1)];
        let due = due_reminders(&events, today);
        assert_eq!(due.len(), 1);
        assert!(due[0].text.contains("@dana"));
        assert!(due[0].text.contains("03-01"));
    }

    #[test]
    fn test_event_without_year_is_skipped() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 7).unwrap();
        let mut record = event(-1, "Undated", 14, 2, 2026);
        record.year = None;
        assert!(due_reminders(&[record], today).is_empty());
    }

    #[test]
    fn test_no_reminder_outside_window() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap(); // delta 2
        let events = vec![event(-1, "Dinner", 14, 2, 2026)];
        assert!(due_reminders(&events, today).is_empty());
    }

    #[test]
    fn test_next_sweep_is_strictly_in_the_future() {
        let now = Utc::now();
        let target = next_sweep_utc(now);
        assert!(target > now);
        assert!(target - now <= Duration::hours(25));
        assert_eq!(target.with_timezone(&TZ).time().to_string(), "09:00:00");
    }
}
