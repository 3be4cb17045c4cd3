//! Timezone-aware "next fire time" computation for a [`Schedule`].
//!
//! DST handling follows the local-wall-clock rule: a local time that falls in
//! a spring-forward gap is skipped, and the earlier (pre-transition) mapping
//! is chosen for a fall-back ambiguity.

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Timelike, Utc};
use hub_store::types::{Schedule, Weekday};

pub(crate) fn parse_tz(tz: &str) -> chrono_tz::Tz {
    tz.parse::<chrono_tz::Tz>().unwrap_or(chrono_tz::UTC)
}

fn weekday_matches(weekdays: &[Weekday], dt: &NaiveDateTime) -> bool {
    let today = match dt.weekday() {
        chrono::Weekday::Mon => Weekday::Mon,
        chrono::Weekday::Tue => Weekday::Tue,
        chrono::Weekday::Wed => Weekday::Wed,
        chrono::Weekday::Thu => Weekday::Thu,
        chrono::Weekday::Fri => Weekday::Fri,
        chrono::Weekday::Sat => Weekday::Sat,
        chrono::Weekday::Sun => Weekday::Sun,
    };
    weekdays.contains(&today)
}

fn matches_local(schedule: &Schedule, dt: &NaiveDateTime) -> bool {
    match schedule {
        Schedule::Weekly { weekdays, hour, minute } => {
            weekday_matches(weekdays, dt) && dt.hour() == *hour as u32 && dt.minute() == *minute as u32
        }
        Schedule::OneShot { .. } => false,
        Schedule::Cron { expr } => cron_matches_naive(expr, dt),
    }
}

fn cron_field_matches(field: &str, value: u32) -> bool {
    if field == "*" {
        return true;
    }
    if let Some(step) = field.strip_prefix("*/") {
        if let Ok(n) = step.parse::<u32>() {
            return n > 0 && value % n == 0;
        }
    }
    for part in field.split(',') {
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.parse::<u32>(), end.parse::<u32>()) {
                if value >= start && value <= end {
                    return true;
                }
            }
        } else if let Ok(n) = part.parse::<u32>() {
            if value == n {
                return true;
            }
        }
    }
    false
}

fn cron_matches_naive(expr: &str, dt: &NaiveDateTime) -> bool {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return false;
    }
    cron_field_matches(fields[0], dt.minute())
        && cron_field_matches(fields[1], dt.hour())
        && cron_field_matches(fields[2], dt.day())
        && cron_field_matches(fields[3], dt.month())
        && cron_field_matches(fields[4], dt.weekday().num_days_from_sunday())
}

/// Next occurrence strictly after `after`, evaluated in `schedule`'s own
/// timezone. `OneShot` fires exactly once, at `at`, and only if still ahead
/// of `after`.
pub fn next_occurrence(schedule: &Schedule, timezone: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Schedule::OneShot { at } = schedule {
        return if *at > after { Some(*at) } else { None };
    }

    let tz = parse_tz(timezone);
    let local_after = after.with_timezone(&tz).naive_local();
    let next_min_secs = 60 - (local_after.second() as i64);
    let mut candidate = local_after + chrono::Duration::seconds(next_min_secs);
    candidate = candidate.with_second(0).unwrap_or(candidate);

    let max_checks = 366 * 24 * 60;
    for _ in 0..max_checks {
        if matches_local(schedule, &candidate) {
            match tz.from_local_datetime(&candidate) {
                chrono::LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
                chrono::LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
                chrono::LocalResult::None => {}
            }
        }
        candidate += chrono::Duration::minutes(1);
    }
    None
}

/// Every occurrence in `(after, horizon]`, used by the expander to
/// materialize jobs up to `now + 48h` in one pass.
pub fn occurrences_within(schedule: &Schedule, timezone: &str, after: DateTime<Utc>, horizon: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut out = Vec::new();
    let mut cursor = after;
    loop {
        match next_occurrence(schedule, timezone, cursor) {
            Some(next) if next <= horizon => {
                out.push(next);
                cursor = next;
            }
            _ => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hub_store::types::Weekday as W;

    #[test]
    fn weekly_finds_next_matching_weekday() {
        let schedule = Schedule::Weekly {
            weekdays: vec![W::Mon, W::Wed],
            hour: 7,
            minute: 30,
        };
        // Sunday 2024-06-16 12:00 UTC -> next should be Monday 7:30 local (UTC here).
        let after = Utc.with_ymd_and_hms(2024, 6, 16, 12, 0, 0).unwrap();
        let next = next_occurrence(&schedule, "UTC", after).unwrap();
        assert_eq!(next.weekday(), chrono::Weekday::Mon);
        assert_eq!(next.hour(), 7);
        assert_eq!(next.minute(), 30);
    }

    #[test]
    fn one_shot_fires_once_then_never_again() {
        let at = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
        let schedule = Schedule::OneShot { at };
        let before = at - chrono::Duration::hours(1);
        assert_eq!(next_occurrence(&schedule, "UTC", before), Some(at));
        assert_eq!(next_occurrence(&schedule, "UTC", at), None);
    }

    #[test]
    fn occurrences_within_horizon_enumerates_daily_cron() {
        let schedule = Schedule::Cron { expr: "0 9 * * *".into() };
        let after = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let horizon = after + chrono::Duration::hours(48);
        let occs = occurrences_within(&schedule, "UTC", after, horizon);
        assert_eq!(occs.len(), 2);
        assert_eq!(occs[0].day(), 15);
        assert_eq!(occs[1].day(), 16);
    }

    #[test]
    fn dst_gap_is_skipped() {
        // US/Eastern springs forward 2024-03-10 02:00 -> 03:00; 02:30 never happens.
        let schedule = Schedule::Cron { expr: "30 2 * * *".into() };
        let after = Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap();
        let next = next_occurrence(&schedule, "US/Eastern", after).unwrap();
        assert_eq!(next.day(), 11);
    }
}
