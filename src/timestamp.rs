use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;

/// Formats `[MM-DD-YYYY] HH:MM:SS.ffffff`.
pub fn format_timestamp<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!(
        "{}.{:06}",
        time.format("[%m-%d-%Y] %H:%M:%S"),
        time.timestamp_subsec_micros().min(999_999)
    )
}

pub fn now() -> String {
    format_timestamp(&Local::now())
}

/// Checks that `line` starts with a timestamp produced by [`format_timestamp`].
#[cfg(test)]
pub(crate) fn has_timestamp_prefix(line: &str) -> bool {
    let bytes = line.as_bytes();
    // [MM-DD-YYYY] HH:MM:SS.ffffff
    let layout = b"[00-00-0000] 00:00:00.000000";
    if bytes.len() < layout.len() {
        return false;
    }
    layout.iter().zip(bytes).all(|(expected, actual)| match expected {
        b'0' => actual.is_ascii_digit(),
        other => other == actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_timestamp() {
        let time = NaiveDate::from_ymd_opt(2020, 3, 4)
            .unwrap()
            .and_hms_micro_opt(5, 6, 7, 42)
            .unwrap()
            .and_utc();
        assert_eq!(format_timestamp(&time), "[03-04-2020] 05:06:07.000042");
    }

    #[test]
    fn test_now_layout() {
        let stamp = now();
        assert!(has_timestamp_prefix(&stamp), "{stamp}");
        assert_eq!(stamp.len(), "[00-00-0000] 00:00:00.000000".len());
    }

    #[test]
    fn test_prefix_rejects_other_layouts() {
        assert!(!has_timestamp_prefix("[2020-03-04] 05:06:07.000042"));
        assert!(!has_timestamp_prefix("[03-04-2020] 05:06:07.42"));
    }
}
