use chrono::NaiveDate;

use crate::types::{EventKind, EventRecord};

/// Parse a `DD-MM` day/month pair. Every non-digit character is treated as
/// a separator, so "25-03", "25/03", "25.03" and "25 03" all parse alike;
/// anything that does not split into exactly two numeric parts is rejected.
pub fn parse_day_month(raw: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = raw
        .split(|c: char| !c.is_ascii_digit())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 2 {
        return None;
    }
    let day: u32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    Some((day, month))
}

/// Parse a strict `DD-MM-YYYY` date: exactly three dash-separated numeric
/// parts, validated as a real calendar date.
pub fn parse_full_date(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let day: u32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let year: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Next occurrence of a record relative to `today`. Birthdays roll to the
/// current year, or the next one when already past; dated events use their
/// fixed year and yield `None` when the year is absent. Day/month pairs
/// that do not form a valid date in the target year (Feb 29 off leap
/// years) also yield `None`.
pub fn next_occurrence(record: &EventRecord, today: NaiveDate) -> Option<NaiveDate> {
    match record.kind {
        EventKind::Birthday => {
            use chrono::Datelike;
            let this_year = NaiveDate::from_ymd_opt(today.year(), record.month, record.day)?;
            if this_year < today {
                NaiveDate::from_ymd_opt(today.year() + 1, record.month, record.day)
            } else {
                Some(this_year)
            }
        }
        EventKind::Event => {
            let year = record.year?;
            NaiveDate::from_ymd_opt(year, record.month, record.day)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: EventKind, day: u32, month: u32, year: Option<i32>) -> EventRecord {
        EventRecord {
            chat_id: -1,
            kind,
            user_id: None,
            username: None,
            display_name: String::new(),
            title: String::new(),
            day,
            month,
            year,
        }
    }

    #[test]
    fn test_parse_day_month_separators() {
        for raw in ["3-7", "3/7", "3.7", "3 7", "3--7", "3 / 7"] {
            assert_eq!(parse_day_month(raw), Some((3, 7)), "raw = {:?}", raw);
        }
        assert_eq!(parse_day_month("25-03"), Some((25, 3)));
    }

    #[test]
    fn test_parse_day_month_rejects_bad_splits() {
        assert_eq!(parse_day_month("25"), None);
        assert_eq!(parse_day_month("25-03-2026"), None);
        assert_eq!(parse_day_month("abc"), None);
        assert_eq!(parse_day_month(""), None);
        assert_eq!(parse_day_month("--"), None);
    }

    #[test]
    fn test_parse_full_date_valid() {
        assert_eq!(
            parse_full_date("14-02-2026"),
            NaiveDate::from_ymd_opt(2026, 2, 14)
        );
        assert_eq!(
            parse_full_date("29-02-2028"),
            NaiveDate::from_ymd_opt(2028, 2, 29)
        );
    }

    #[test]
    fn test_parse_full_date_rejects_invalid() {
        // Wrong part count, wrong separator, impossible dates.
        assert_eq!(parse_full_date("14-02"), None);
        assert_eq!(parse_full_date("14/02/2026"), None);
        assert_eq!(parse_full_date("31-02-2026"), None);
        assert_eq!(parse_full_date("29-02-2027"), None);
        assert_eq!(parse_full_date("00-01-2026"), None);
    }

    #[test]
    fn test_birthday_rolls_to_next_year_when_past() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let r = record(EventKind::Birthday, 25, 3, None);
        assert_eq!(
            next_occurrence(&r, today),
            NaiveDate::from_ymd_opt(2027, 3, 25)
        );
    }

    #[test]
    fn test_birthday_stays_in_current_year_on_the_day() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 25).unwrap();
        let r = record(EventKind::Birthday, 25, 3, None);
        assert_eq!(
            next_occurrence(&r, today),
            NaiveDate::from_ymd_opt(2026, 3, 25)
        );
    }

    #[test]
    fn test_event_uses_fixed_year() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let r = record(EventKind::Event, 14, 2, Some(2026));
        assert_eq!(
            next_occurrence(&r, today),
            NaiveDate::from_ymd_opt(2026, 2, 14)
        );
    }

    #[test]
    fn test_event_without_year_is_skipped() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let r = record(EventKind::Event, 14, 2, None);
        assert_eq!(next_occurrence(&r, today), None);
    }

    #[test]
    fn test_feb_29_birthday_skipped_off_leap_years() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let r = record(EventKind::Birthday, 29, 2, None);
        assert_eq!(next_occurrence(&r, today), None);
    }
}
