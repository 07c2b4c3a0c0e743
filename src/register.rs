use chrono::NaiveDate;

use crate::dates::{parse_day_month, parse_full_date};
use crate::store::EventStore;
use crate::types::{EventKind, EventRecord};

/// A structured mention carried by the invoking message: either a
/// platform-resolved user (clickable reference) or a plain @handle.
#[derive(Debug, Clone, Default)]
pub struct Mention {
    pub user_id: Option<u64>,
    pub username: Option<String>,
    pub display_name: String,
}

/// `/add_bday <name-or-mention> <DD-MM>` — the last whitespace token is
/// the date, everything before it is the candidate name. A structured
/// mention overrides the free-text name. User input problems come back as
/// `Ok(reply)`; only a store write failure is an `Err`.
pub fn add_birthday(
    store: &mut EventStore,
    chat_id: i64,
    args: &str,
    mention: Option<Mention>,
) -> anyhow::Result<String> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    if tokens.len() < 2 && !(tokens.len() == 1 && mention.is_some()) {
        return Ok("Usage: /add_bday @handle 25-03".to_string());
    }

    let date_raw = tokens[tokens.len() - 1];
    let Some((day, month)) = parse_day_month(date_raw) else {
        return Ok("Invalid date format. Use DD-MM (e.g. 25-03).".to_string());
    };

    let free_text = tokens[..tokens.len() - 1].join(" ");
    let (user_id, username, display_name) = match mention {
        Some(m) => (m.user_id, m.username, m.display_name),
        None => match free_text.strip_prefix('@') {
            Some(handle) => (None, Some(handle.to_string()), String::new()),
            None => (None, None, free_text),
        },
    };

    let mut record = EventRecord {
        chat_id,
        kind: EventKind::Birthday,
        user_id,
        username,
        display_name,
        title: String::new(),
        day,
        month,
        year: None,
    };
    record.title = format!("Birthday of {}", record.label());
    let label = record.label();
    store.append(record)?;

    Ok(format!(
        "🎂 Birthday for {} registered on {:02}-{:02}.",
        label, day, month
    ))
}

/// `/list_bday` — birthdays of one chat, ascending by (month, day, name).
pub fn list_birthdays(store: &EventStore, chat_id: i64) -> String {
    let mut records = store.for_chat_and_kind(chat_id, EventKind::Birthday);
    if records.is_empty() {
        return "No birthdays registered for this chat.".to_string();
    }

    records.sort_by(|a, b| {
        (a.month, a.day)
            .cmp(&(b.month, b.day))
            .then_with(|| a.name_key().cmp(b.name_key()))
    });

    let mut out = String::from("🎂 Registered birthdays:");
    for r in &records {
        out.push_str(&format!("\n{:02}-{:02} : {}", r.day, r.month, r.label()));
    }
    out
}

/// `/add_event <DD-MM-YYYY> <title…>` — strict three-part date, validated
/// as a real calendar date; the remaining tokens form the title.
pub fn add_event(
    store: &mut EventStore,
    chat_id: i64,
    args: &str,
    mention: Option<Mention>,
) -> anyhow::Result<String> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    if tokens.len() < 2 {
        return Ok("Usage: /add_event 14-02-2026 Event title".to_string());
    }

    let Some(date) = parse_full_date(tokens[0]) else {
        return Ok("Invalid date format. Use DD-MM-YYYY (e.g. 14-02-2026).".to_string());
    };
    let title = tokens[1..].join(" ");

    use chrono::Datelike;
    let (user_id, username, display_name) = match mention {
        Some(m) => (m.user_id, m.username, m.display_name),
        None => (None, None, String::new()),
    };
    let record = EventRecord {
        chat_id,
        kind: EventKind::Event,
        user_id,
        username,
        display_name,
        title: title.clone(),
        day: date.day(),
        month: date.month(),
        year: Some(date.year()),
    };
    store.append(record)?;

    Ok(format!(
        "📅 Event registered on {:02}-{:02}-{}: {}",
        date.day(),
        date.month(),
        date.year(),
        title
    ))
}

/// `/list_events` — dated events of one chat, ascending by full date, each
/// annotated past or upcoming relative to `today` in the configured zone.
pub fn list_events(store: &EventStore, chat_id: i64, today: NaiveDate) -> String {
    let mut records = store.for_chat_and_kind(chat_id, EventKind::Event);
    if records.is_empty() {
        return "No events registered for this chat.".to_string();
    }

    records.sort_by_key(|r| (r.year.unwrap_or(0), r.month, r.day));

    let mut out = String::from("📅 Chat events:");
    for r in &records {
        let year = r.year.unwrap_or(0);
        let status = match NaiveDate::from_ymd_opt(year, r.month, r.day) {
            Some(d) if d > today => "upcoming",
            _ => "past",
        };
        out.push_str(&format!(
            "\n{:02}-{:02}-{} : {} ({})",
            r.day, r.month, year, r.title, status
        ));
    }
    out
}
