use std::fmt;

use chrono::{NaiveTime, Timelike};

/// Wall-clock time at minute granularity, as recorded on an attendance row.
///
/// The empty value stands for "not recorded yet" and sorts before every
/// non-empty time. Two empty values compare equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TrainingTime(Option<u16>);

impl TrainingTime {
    pub fn empty() -> Self {
        TrainingTime(None)
    }

    /// Parses "HH:MM" or the compact "HHMM" flavor. Empty or malformed
    /// input yields the empty value, never an error: an empty column means
    /// the punch has not happened yet.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return TrainingTime(None);
        }
        let (hour, minute) = if let Some((h, m)) = value.split_once(':') {
            (h, m)
        } else if value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit()) {
            value.split_at(2)
        } else {
            return TrainingTime(None);
        };
        match (hour.parse::<u16>(), minute.parse::<u16>()) {
            (Ok(h), Ok(m)) if h < 24 && m < 60 => TrainingTime(Some(h * 60 + m)),
            _ => TrainingTime(None),
        }
    }

    /// Joins the hour/minute pair captured as separate form fields. Either
    /// side missing yields the empty value.
    pub fn from_parts(hour: Option<u32>, minute: Option<u32>) -> Self {
        match (hour, minute) {
            (Some(h), Some(m)) if h < 24 && m < 60 => TrainingTime(Some((h * 60 + m) as u16)),
            _ => TrainingTime(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn hour(&self) -> Option<u32> {
        self.0.map(|m| (m / 60) as u32)
    }

    pub fn minute(&self) -> Option<u32> {
        self.0.map(|m| (m % 60) as u32)
    }

    /// "HHMM" without the separator, used where the legacy storage joined
    /// the padded hour and minute directly.
    pub fn format_compact(&self) -> String {
        match self.0 {
            Some(m) => format!("{:02}{:02}", m / 60, m % 60),
            None => String::new(),
        }
    }
}

impl From<NaiveTime> for TrainingTime {
    /// Truncates to minute granularity.
    fn from(time: NaiveTime) -> Self {
        TrainingTime(Some((time.hour() * 60 + time.minute()) as u16))
    }
}

impl fmt::Display for TrainingTime {
    /// Zero-padded "HH:MM"; the empty value renders as "".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(m) => write!(f, "{:02}:{:02}", m / 60, m % 60),
            None => Ok(()),
        }
    }
}

/// Left-pads a one-digit numeric string to width 2.
pub fn pad2(value: &str) -> String {
    if value.len() == 1 {
        format!("0{}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn parse_and_format_round_trip() {
        for s in ["00:00", "09:05", "18:30", "23:59"] {
            assert_eq!(TrainingTime::parse(s).to_string(), s);
        }
    }

    #[test]
    fn parse_compact_flavor() {
        let t = TrainingTime::parse("0905");
        assert_eq!(t.to_string(), "09:05");
        assert_eq!(t.format_compact(), "0905");
    }

    #[test]
    fn malformed_input_is_empty() {
        for s in ["", "  ", "9", "ab:cd", "24:00", "12:60", "123", "12345"] {
            assert!(TrainingTime::parse(s).is_empty(), "expected empty for {s:?}");
        }
        assert_eq!(TrainingTime::parse("oops").to_string(), "");
    }

    #[test]
    fn empty_sorts_before_any_time_and_equals_empty() {
        let empty = TrainingTime::empty();
        let midnight = TrainingTime::parse("00:00");
        assert!(empty < midnight);
        assert_eq!(empty, TrainingTime::parse(""));
    }

    #[test]
    fn ordering_is_minutes_since_midnight() {
        assert!(TrainingTime::parse("08:59") < TrainingTime::parse("09:00"));
        assert!(TrainingTime::parse("18:00") > TrainingTime::parse("09:30"));
        assert_eq!(TrainingTime::parse("09:00"), TrainingTime::parse("0900"));
    }

    #[test]
    fn from_parts_requires_both_fields() {
        assert_eq!(TrainingTime::from_parts(Some(9), Some(5)).to_string(), "09:05");
        assert!(TrainingTime::from_parts(Some(9), None).is_empty());
        assert!(TrainingTime::from_parts(None, Some(5)).is_empty());
        assert!(TrainingTime::from_parts(None, None).is_empty());
    }

    #[test]
    fn now_truncates_to_minute() {
        let t = NaiveTime::from_hms_opt(9, 15, 42).unwrap();
        assert_eq!(TrainingTime::from(t).to_string(), "09:15");
    }

    #[test]
    fn pad2_pads_single_digit_and_is_idempotent() {
        assert_eq!(pad2("7"), "07");
        assert_eq!(pad2("07"), "07");
        assert_eq!(pad2(&pad2("7")), "07");
        assert_eq!(pad2("12"), "12");
    }

    #[test]
    fn hour_and_minute_split() {
        let t = TrainingTime::parse("09:05");
        assert_eq!(t.hour(), Some(9));
        assert_eq!(t.minute(), Some(5));
        assert_eq!(TrainingTime::empty().hour(), None);
    }
}
