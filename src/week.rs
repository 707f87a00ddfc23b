use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::Clock;
use crate::error::JournalError;

const DATE_FORMAT: &str = "%Y-%m-%d";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%d.%m.%Y", "%Y/%m/%d", "%m/%d/%Y"];

/// Canonical `<monday>_<sunday>` identifier of an ISO week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeekKey {
    start: NaiveDate,
}

impl WeekKey {
    /// Week containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            start: week_start(date),
        }
    }

    pub fn current(clock: &dyn Clock) -> Self {
        Self::containing(clock.today())
    }

    /// Parse a key string, rejecting keys whose start is not a Monday
    /// or whose end is not six days later.
    pub fn parse(key: &str) -> Result<Self, JournalError> {
        let (start, end) = key
            .trim()
            .split_once('_')
            .ok_or_else(|| JournalError::ValidationError(format!("Invalid week key: {}", key)))?;

        let start = NaiveDate::parse_from_str(start, DATE_FORMAT)
            .map_err(|e| JournalError::ValidationError(format!("Invalid week key {}: {}", key, e)))?;
        let end = NaiveDate::parse_from_str(end, DATE_FORMAT)
            .map_err(|e| JournalError::ValidationError(format!("Invalid week key {}: {}", key, e)))?;

        if week_start(start) != start || week_end(start) != end {
            return Err(JournalError::ValidationError(format!(
                "Week key {} does not span Monday to Sunday",
                key
            )));
        }

        Ok(Self { start })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        week_end(self.start)
    }

    pub fn previous(&self) -> Self {
        Self::containing(self.start.checked_sub_days(Days::new(7)).unwrap_or(self.start))
    }

    pub fn next(&self) -> Self {
        Self::containing(self.start.checked_add_days(Days::new(7)).unwrap_or(self.start))
    }

    /// Inclusive bounds: Monday 00:00:00.000 through Sunday 23:59:59.999
    pub fn bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        let from = NaiveDateTime::new(self.start, NaiveTime::MIN);
        let to = from + TimeDelta::days(7) - TimeDelta::milliseconds(1);
        (from, to)
    }

    pub fn contains(&self, time: NaiveDateTime) -> bool {
        let (from, to) = self.bounds();
        time >= from && time <= to
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", format_date(self.start), format_date(self.end()))
    }
}

impl From<WeekKey> for String {
    fn from(key: WeekKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for WeekKey {
    type Error = JournalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WeekKey::parse(&value)
    }
}

/// Anything a caller may hand in as "the date"
#[derive(Debug, Clone, Copy)]
pub enum DateInput<'a> {
    Text(&'a str),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(s: &'a str) -> Self {
        DateInput::Text(s)
    }
}

impl From<NaiveDate> for DateInput<'_> {
    fn from(d: NaiveDate) -> Self {
        DateInput::Date(d)
    }
}

impl From<NaiveDateTime> for DateInput<'_> {
    fn from(dt: NaiveDateTime) -> Self {
        DateInput::DateTime(dt)
    }
}

/// Local calendar date of the input. Unparseable text falls back to today.
pub fn normalize_date<'a>(input: impl Into<DateInput<'a>>, clock: &dyn Clock) -> NaiveDate {
    match input.into() {
        DateInput::Date(d) => d,
        DateInput::DateTime(dt) => dt.date(),
        DateInput::Text(s) => parse_date_like(s).unwrap_or_else(|| {
            log::debug!("Unrecognized date {:?}, using today", s);
            clock.today()
        }),
    }
}

pub fn week_key_for<'a>(input: impl Into<DateInput<'a>>, clock: &dyn Clock) -> WeekKey {
    WeekKey::containing(normalize_date(input, clock))
}

/// Monday on or before `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

pub fn week_end(date: NaiveDate) -> NaiveDate {
    let start = week_start(date);
    start.checked_add_days(Days::new(6)).unwrap_or(start)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Lenient date parse: week keys, RFC 3339, ISO and common broker forms
pub fn parse_date_like(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(key) = WeekKey::parse(s) {
        return Some(key.start());
    }
    parse_datetime_like(s).map(|dt| dt.date())
}

/// Generic date-time parse. Offsets are converted to local time,
/// date-only inputs land on local midnight.
pub fn parse_datetime_like(input: &str) -> Option<NaiveDateTime> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .map(|d| NaiveDateTime::new(d, NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn clock_at(y: i32, m: u32, d: u32) -> ManualClock {
        // Noon UTC keeps the local date stable across realistic timezones
        ManualClock::new(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_week_bounds_hold_for_a_full_year() {
        let mut d = date(2025, 12, 20);
        while d < date(2027, 1, 10) {
            let start = week_start(d);
            let end = week_end(d);
            assert_eq!(start.weekday(), Weekday::Mon, "start of {}", d);
            assert!(start <= d && d <= end, "{} not within {}..{}", d, start, end);
            assert_eq!(end - start, TimeDelta::days(6));
            d = d.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_monday_maps_to_itself() {
        let monday = date(2026, 10, 12);
        assert_eq!(week_start(monday), monday);
        assert_eq!(WeekKey::containing(monday).to_string(), "2026-10-12_2026-10-18");
    }

    #[test]
    fn test_every_day_of_a_week_shares_a_key() {
        let key = WeekKey::containing(date(2026, 10, 12));
        for day in 12..=18 {
            assert_eq!(WeekKey::containing(date(2026, 10, day)), key);
        }
        assert_ne!(WeekKey::containing(date(2026, 10, 19)), key);
    }

    #[test]
    fn test_year_boundary_rolls_over() {
        let key = WeekKey::containing(date(2027, 1, 1));
        assert_eq!(key.to_string(), "2026-12-28_2027-01-03");
    }

    #[test]
    fn test_text_inputs_normalize_to_the_same_week() {
        let clock = clock_at(2020, 1, 1);
        let expected = WeekKey::containing(date(2026, 3, 4));

        for input in [
            "2026-03-04",
            "2026-03-04T23:10:00",
            "2026.03.04",
            "04.03.2026",
            "03/04/2026",
            "2026-03-02_2026-03-08",
        ] {
            assert_eq!(week_key_for(input, &clock), expected, "input {}", input);
        }
    }

    #[test]
    fn test_garbage_falls_back_to_today() {
        let clock = clock_at(2026, 10, 14);
        let key = week_key_for("not a date", &clock);
        assert_eq!(key, WeekKey::containing(clock.today()));
        assert_eq!(week_key_for("", &clock), key);
    }

    #[test]
    fn test_parse_rejects_misaligned_keys() {
        assert!(WeekKey::parse("2026-10-12_2026-10-18").is_ok());
        assert!(WeekKey::parse("2026-10-13_2026-10-19").is_err());
        assert!(WeekKey::parse("2026-10-12_2026-10-17").is_err());
        assert!(WeekKey::parse("2026-10-12").is_err());
    }

    #[test]
    fn test_previous_and_next_step_whole_weeks() {
        let key = WeekKey::parse("2026-03-02_2026-03-08").unwrap();
        assert_eq!(key.previous().to_string(), "2026-02-23_2026-03-01");
        assert_eq!(key.next().to_string(), "2026-03-09_2026-03-15");
    }

    #[test]
    fn test_contains_is_inclusive_on_both_ends() {
        let key = WeekKey::parse("2026-10-12_2026-10-18").unwrap();
        let at = |d: u32, h: u32, m: u32, s: u32| date(2026, 10, d).and_hms_opt(h, m, s).unwrap();

        assert!(key.contains(at(12, 0, 0, 0)));
        assert!(key.contains(at(18, 23, 59, 59)));
        assert!(!key.contains(at(19, 0, 0, 0)));
        assert!(!key.contains(at(11, 23, 59, 59)));
    }

    #[test]
    fn test_week_key_serializes_as_string() {
        let key = WeekKey::parse("2026-10-12_2026-10-18").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"2026-10-12_2026-10-18\"");

        let back: WeekKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<WeekKey>("\"2026-10-13_2026-10-19\"").is_err());
    }
}
