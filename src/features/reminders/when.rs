//! Parsing and formatting of user-entered reminder times.

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};

/// Parse a reminder time relative to `now`.
///
/// Accepts `+30m` / `+1h30m` offsets, `HH:MM` (today, or tomorrow when
/// already past), or an RFC 3339 timestamp.
pub fn parse_when(input: &str, now: DateTime<Local>) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Some(offset) = input.strip_prefix('+') {
        let seconds = parse_duration(offset)?;
        let at = now.checked_add_signed(Duration::try_seconds(seconds)?)?;
        return Some(at.with_timezone(&Utc));
    }

    if let Ok(time) = NaiveTime::parse_from_str(input, "%H:%M") {
        let today = now.date_naive().and_time(time);
        let mut at = Local.from_local_datetime(&today).earliest()?;
        if at <= now {
            at = Local
                .from_local_datetime(&(today + Duration::days(1)))
                .earliest()?;
        }
        return Some(at.with_timezone(&Utc));
    }

    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a duration string like "30m", "2h", "1d", "1h30m" into seconds
pub fn parse_duration(time_str: &str) -> Option<i64> {
    let time_str = time_str.trim().to_lowercase();
    let mut total_seconds: i64 = 0;
    let mut current_number = String::new();

    for c in time_str.chars() {
        if c.is_ascii_digit() {
            current_number.push(c);
        } else if !current_number.is_empty() {
            let value: i64 = current_number.parse().ok()?;
            current_number.clear();

            let unit: i64 = match c {
                's' => 1,
                'm' => 60,
                'h' => 60 * 60,
                'd' => 60 * 60 * 24,
                'w' => 60 * 60 * 24 * 7,
                _ => return None,
            };
            total_seconds = total_seconds.checked_add(value.checked_mul(unit)?)?;
        } else {
            return None;
        }
    }

    if !current_number.is_empty() {
        return None;
    }

    if total_seconds > 0 {
        Some(total_seconds)
    } else {
        None
    }
}

/// Format a duration in seconds into a human-readable string
pub fn format_duration(seconds: i64) -> String {
    let plural = |n: i64| if n == 1 { "" } else { "s" };
    if seconds < 60 {
        format!("{} second{}", seconds, plural(seconds))
    } else if seconds < 3600 {
        let mins = seconds / 60;
        format!("{} minute{}", mins, plural(mins))
    } else if seconds < 86400 {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        if mins > 0 {
            format!("{} hour{} {} minute{}", hours, plural(hours), mins, plural(mins))
        } else {
            format!("{} hour{}", hours, plural(hours))
        }
    } else {
        let days = seconds / 86400;
        let hours = (seconds % 86400) / 3600;
        if hours > 0 {
            format!("{} day{} {} hour{}", days, plural(days), hours, plural(hours))
        } else {
            format!("{} day{}", days, plural(days))
        }
    }
}

/// "in 5 minutes" or "any moment now" for a fire instant
pub fn describe_until(when: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = when.signed_duration_since(now).num_seconds();
    if diff > 0 {
        format!("in {}", format_duration(diff))
    } else {
        "any moment now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(h: u32, m: u32) -> DateTime<Local> {
        Local
            .from_local_datetime(
                &chrono::NaiveDate::from_ymd_opt(2026, 6, 15)
                    .unwrap()
                    .and_hms_opt(h, m, 0)
                    .unwrap(),
            )
            .earliest()
            .unwrap()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(30));
        assert_eq!(parse_duration("30m"), Some(1800));
        assert_eq!(parse_duration("2h"), Some(7200));
        assert_eq!(parse_duration("1d"), Some(86400));
        assert_eq!(parse_duration("1w"), Some(604800));
        assert_eq!(parse_duration("1h30m"), Some(5400));
        assert_eq!(parse_duration("invalid"), None);
        assert_eq!(parse_duration("15"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_oversized_input_is_rejected() {
        assert_eq!(parse_duration("99999999999999w"), None);
        assert_eq!(parse_duration("9223372036854775807s1s"), None);
        assert_eq!(parse_duration("99999999999999999999s"), None);

        let now = local(9, 0);
        assert!(parse_when("+9000000000000s", now).is_none());
        assert!(parse_when("+99999999999999w", now).is_none());
        assert!(parse_when("+2h", now).is_some());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30 seconds");
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(3660), "1 hour 1 minute");
        assert_eq!(format_duration(86400), "1 day");
        assert_eq!(format_duration(90000), "1 day 1 hour");
    }

    #[test]
    fn test_parse_relative_offset() {
        let now = local(9, 0);
        let at = parse_when("+1h30m", now).unwrap();
        assert_eq!(at, (now + Duration::minutes(90)).with_timezone(&Utc));
    }

    #[test]
    fn test_parse_clock_time_rolls_to_tomorrow() {
        let now = local(9, 0);
        let later = parse_when("17:45", now).unwrap();
        assert_eq!(later, local(17, 45).with_timezone(&Utc));

        let earlier = parse_when("08:00", now).unwrap();
        assert_eq!(earlier, (local(8, 0) + Duration::days(1)).with_timezone(&Utc));
    }

    #[test]
    fn test_parse_rfc3339() {
        let at = parse_when("2026-06-15T10:00:00+02:00", local(9, 0)).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 6, 15, 8, 0, 0).unwrap());
        assert!(parse_when("tomorrow-ish", local(9, 0)).is_none());
    }

    #[test]
    fn test_describe_until() {
        let now = Utc::now();
        assert_eq!(describe_until(now + Duration::seconds(120), now), "in 2 minutes");
        assert_eq!(describe_until(now - Duration::seconds(5), now), "any moment now");
    }
}
