use std::fmt::{Display, Formatter};

use arcdata_warehouse::DateBounds;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, Month, OffsetDateTime};

use crate::ValidationError;

/// Inclusive calendar range. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    start: Option<Date>,
    end: Option<Date>,
}

impl DateRange {
    pub fn new(start: Option<Date>, end: Option<Date>) -> Result<Self, ValidationError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ValidationError::InvalidRange {
                    start: iso_date(start),
                    end: iso_date(end),
                });
            }
        }
        Ok(Self { start, end })
    }

    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Parse optional textual bounds with [`parse_date`].
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ValidationError> {
        let start = start.map(parse_date).transpose()?;
        let end = end.map(parse_date).transpose()?;
        Self::new(start, end)
    }

    /// The `days` days ending at `end`, both ends included.
    pub fn trailing_days(end: Date, days: u32) -> Self {
        let start = end
            .checked_sub(Duration::days(i64::from(days.saturating_sub(1))))
            .unwrap_or(Date::MIN);
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub const fn start(&self) -> Option<Date> {
        self.start
    }

    pub const fn end(&self) -> Option<Date> {
        self.end
    }

    pub fn contains(&self, date: Date) -> bool {
        self.to_bounds().contains(date)
    }

    pub const fn to_bounds(self) -> DateBounds {
        DateBounds::new(self.start, self.end)
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let start = self.start.map(iso_date).unwrap_or_else(|| String::from(".."));
        let end = self.end.map(iso_date).unwrap_or_else(|| String::from(".."));
        write!(f, "[{start}, {end}]")
    }
}

/// Parse the date forms providers send: `YYYY-MM-DD`, a date-time whose date
/// part is kept, `YYYY-MM` (first of the month) or `YYYY` (1 January).
pub fn parse_date(value: &str) -> Result<Date, ValidationError> {
    let trimmed = value.trim();
    let invalid = || ValidationError::InvalidDate {
        value: trimmed.to_owned(),
    };

    let date_part = match trimmed.find(&['T', ' '][..]) {
        Some(index) => &trimmed[..index],
        None => trimmed,
    };

    let mut parts = date_part.split('-');
    let year = parts
        .next()
        .filter(|part| part.len() == 4 && part.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|part| part.parse::<i32>().ok())
        .ok_or_else(invalid)?;
    let month = match parts.next() {
        Some(part) => parse_component(part).ok_or_else(invalid)?,
        None => 1,
    };
    let day = match parts.next() {
        Some(part) => parse_component(part).ok_or_else(invalid)?,
        None => 1,
    };
    if parts.next().is_some() {
        return Err(invalid());
    }

    let month = Month::try_from(month).map_err(|_| invalid())?;
    Date::from_calendar_date(year, month, day).map_err(|_| invalid())
}

fn parse_component(part: &str) -> Option<u8> {
    if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Calendar date of a Unix timestamp shifted by a UTC offset in seconds.
pub fn date_from_unix(seconds: i64, utc_offset_seconds: i64) -> Result<Date, ValidationError> {
    let shifted = seconds.saturating_add(utc_offset_seconds);
    OffsetDateTime::from_unix_timestamp(shifted)
        .map(|moment| moment.date())
        .map_err(|_| ValidationError::InvalidDate {
            value: seconds.to_string(),
        })
}

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// `YYYY-MM-DD` rendering used in URLs, logs and output.
pub fn iso_date(date: Date) -> String {
    // Every component of the description is present on a `Date`.
    date.format(ISO_DATE).unwrap_or_else(|_| date.to_string())
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn accepts_every_provider_date_form() {
        assert_eq!(parse_date("2024-01-15"), Ok(date!(2024 - 01 - 15)));
        assert_eq!(parse_date("2024-01"), Ok(date!(2024 - 01 - 01)));
        assert_eq!(parse_date("2024"), Ok(date!(2024 - 01 - 01)));
        assert_eq!(parse_date("2024-01-15T09:30:00Z"), Ok(date!(2024 - 01 - 15)));
        assert_eq!(parse_date("2024-01-15 00:00:00"), Ok(date!(2024 - 01 - 15)));
        assert_eq!(parse_date(" 2024-1-5 "), Ok(date!(2024 - 01 - 05)));
    }

    #[test]
    fn rejects_malformed_dates() {
        for value in ["", "24-01-01", "2024-13", "2024-02-30", "2024-01-01-01", "Jan 2024"] {
            assert!(parse_date(value).is_err(), "{value} should be rejected");
        }
    }

    #[test]
    fn unix_timestamps_honor_the_utc_offset() {
        // 2024-01-02 04:00:00 UTC is still 2024-01-01 in New York (-05:00).
        let seconds = 1_704_168_000;
        assert_eq!(date_from_unix(seconds, 0), Ok(date!(2024 - 01 - 02)));
        assert_eq!(date_from_unix(seconds, -18_000), Ok(date!(2024 - 01 - 01)));
    }

    #[test]
    fn range_rejects_inverted_bounds_and_is_inclusive() {
        assert!(DateRange::parse(Some("2024-02-01"), Some("2024-01-01")).is_err());

        let range = DateRange::parse(Some("2024-01-01"), Some("2024-01-31")).expect("range");
        assert!(range.contains(date!(2024 - 01 - 01)));
        assert!(range.contains(date!(2024 - 01 - 31)));
        assert!(!range.contains(date!(2024 - 02 - 01)));
    }

    #[test]
    fn trailing_days_counts_the_end_day() {
        let range = DateRange::trailing_days(date!(2024 - 01 - 31), 31);
        assert_eq!(range.start(), Some(date!(2024 - 01 - 01)));
        assert_eq!(range.to_string(), "[2024-01-01, 2024-01-31]");
    }

    #[test]
    fn iso_dates_are_zero_padded() {
        assert_eq!(iso_date(date!(2024 - 03 - 07)), "2024-03-07");
        assert_eq!(iso_date(date!(0999 - 01 - 05)), "0999-01-05");
    }
}
