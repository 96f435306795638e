//! Wall-clock scheduling timestamps.
//!
//! A scheduled task stores `YYYY-MM-DD HH:MM:SS` with no zone. Everything in
//! this module works on the naive calendar components so a stored hour is
//! never reinterpreted through an offset. Legacy values carrying `Z` or an
//! explicit offset keep their written wall-clock time; the suffix is dropped,
//! not applied.

use crate::domain::error::{ParseError, ValidationError};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTimestamp {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl LocalTimestamp {
    pub fn date(&self) -> NaiveDate {
        // Components are range-checked in `decode`.
        NaiveDate::from_ymd_opt(self.year, self.month, self.day).unwrap_or_default()
    }
}

/// One (calendar date, hour-of-day) cell of the calendar grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub hour: u32,
}

impl Slot {
    pub fn new(date: NaiveDate, hour: u32) -> Result<Self, ValidationError> {
        if hour > 23 {
            return Err(ValidationError::InvalidHour(hour));
        }
        if !(0..=9999).contains(&date.year()) {
            return Err(ValidationError::InvalidDate(date.to_string()));
        }
        Ok(Self { date, hour })
    }

    pub fn encode(&self) -> String {
        format!(
            "{:04}-{:02}-{:02} {:02}:00:00",
            self.date.year(),
            self.date.month(),
            self.date.day(),
            self.hour
        )
    }

    pub fn key(&self) -> String {
        format!(
            "{:04}-{:02}-{:02}-{}",
            self.date.year(),
            self.date.month(),
            self.date.day(),
            self.hour
        )
    }

    pub fn parse_key(key: &str) -> Result<Self, ValidationError> {
        let malformed = || ValidationError::MalformedSlotKey(key.to_string());
        let (date_part, hour_part) = key.trim().rsplit_once('-').ok_or_else(malformed)?;
        let hour = hour_part.parse::<u32>().map_err(|_| malformed())?;
        let date = parse_date_components(date_part).ok_or_else(malformed)?;
        Self::new(date, hour)
    }
}

pub fn encode(date: NaiveDate, hour: u32) -> Result<String, ValidationError> {
    Slot::new(date, hour).map(|slot| slot.encode())
}

pub fn slot_key(date: NaiveDate, hour: u32) -> Result<String, ValidationError> {
    Slot::new(date, hour).map(|slot| slot.key())
}

pub fn parse_slot_key(key: &str) -> Result<Slot, ValidationError> {
    Slot::parse_key(key)
}

pub fn decode(raw: &str) -> Result<LocalTimestamp, ParseError> {
    let malformed = || ParseError::MalformedTimestamp(raw.to_string());
    let trimmed = raw.trim();
    let (date_part, time_part) = trimmed
        .split_once([' ', 'T'])
        .ok_or_else(malformed)?;
    let time_part = strip_zone_suffix(time_part.trim());

    let mut date_fields = date_part.split('-');
    let (Some(year), Some(month), Some(day), None) = (
        date_fields.next(),
        date_fields.next(),
        date_fields.next(),
        date_fields.next(),
    ) else {
        return Err(malformed());
    };

    let mut time_fields = time_part.split(':');
    let (Some(hour), Some(minute), second, None) = (
        time_fields.next(),
        time_fields.next(),
        time_fields.next(),
        time_fields.next(),
    ) else {
        return Err(malformed());
    };
    let second = second
        .map(|value| value.split_once('.').map_or(value, |(whole, _)| whole))
        .unwrap_or("0");

    let year = parse_component::<i32>(year, "year")?;
    let month = parse_component::<u32>(month, "month")?;
    let day = parse_component::<u32>(day, "day")?;
    let hour = parse_component::<u32>(hour, "hour")?;
    let minute = parse_component::<u32>(minute, "minute")?;
    let second = parse_component::<u32>(second, "second")?;

    if NaiveDate::from_ymd_opt(year, month, day).is_none() {
        return Err(ParseError::InvalidComponent {
            field: "date",
            value: date_part.to_string(),
        });
    }
    if hour > 23 {
        return Err(ParseError::InvalidComponent {
            field: "hour",
            value: hour.to_string(),
        });
    }
    if minute > 59 || second > 59 {
        return Err(ParseError::InvalidComponent {
            field: "time",
            value: time_part.to_string(),
        });
    }

    Ok(LocalTimestamp {
        year,
        month,
        day,
        hour,
        minute,
        second,
    })
}

/// The seven dates of the Sunday-started week containing `date`.
pub fn week_dates(date: NaiveDate) -> [NaiveDate; 7] {
    let offset = i64::from(date.weekday().num_days_from_sunday());
    let start = date - Duration::days(offset);
    std::array::from_fn(|index| start + Duration::days(index as i64))
}

pub fn falls_on_any(start_time: &str, dates: &[NaiveDate]) -> bool {
    decode(start_time)
        .map(|stamp| dates.contains(&stamp.date()))
        .unwrap_or(false)
}

/// Calendar day the user is living in right now.
pub fn today_in(time_zone: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&time_zone).date_naive()
}

fn strip_zone_suffix(time_part: &str) -> &str {
    match time_part.find(['Z', 'z', '+', '-']) {
        Some(index) => &time_part[..index],
        None => time_part,
    }
}

fn parse_component<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<T, ParseError> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ParseError::InvalidComponent {
            field,
            value: value.to_string(),
        });
    }
    value.parse::<T>().map_err(|_| ParseError::InvalidComponent {
        field,
        value: value.to_string(),
    })
}

fn parse_date_components(value: &str) -> Option<NaiveDate> {
    let mut fields = value.split('-');
    let (Some(year), Some(month), Some(day), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return None;
    };
    let year = parse_component::<i32>(year, "year").ok()?;
    let month = parse_component::<u32>(month, "month").ok()?;
    let day = parse_component::<u32>(day, "day").ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn encodes_zero_padded_wall_clock_hour() {
        assert_eq!(
            encode(date(2024, 3, 10), 14).expect("valid slot"),
            "2024-03-10 14:00:00"
        );
        assert_eq!(
            encode(date(2024, 1, 5), 7).expect("valid slot"),
            "2024-01-05 07:00:00"
        );
    }

    #[test]
    fn encode_rejects_hour_outside_day() {
        assert_eq!(
            encode(date(2024, 3, 10), 24),
            Err(ValidationError::InvalidHour(24))
        );
    }

    #[test]
    fn decode_handles_year_and_leap_boundaries() {
        let new_year_eve = decode(&encode(date(2023, 12, 31), 23).expect("encode")).expect("decode");
        assert_eq!(new_year_eve.date(), date(2023, 12, 31));
        assert_eq!(new_year_eve.hour, 23);

        let leap_day = decode("2024-02-29 00:00:00").expect("decode");
        assert_eq!(leap_day.date(), date(2024, 2, 29));
        assert!(decode("2023-02-29 00:00:00").is_err());
    }

    #[test]
    fn legacy_zone_suffix_is_stripped_not_applied() {
        for raw in [
            "2024-03-10T14:00:00Z",
            "2024-03-10T14:00:00.000Z",
            "2024-03-10T14:00:00+05:30",
            "2024-03-10 14:00:00-05",
        ] {
            let stamp = decode(raw).expect("legacy timestamp decodes");
            assert_eq!(stamp.date(), date(2024, 3, 10), "{raw}");
            assert_eq!(stamp.hour, 14, "{raw}");
            assert_eq!(stamp.minute, 0, "{raw}");
        }
    }

    #[test]
    fn decode_rejects_malformed_values() {
        for raw in ["", "2024-03-10", "2024-03 14:00:00", "2024-03-10 25:00:00", "2024-13-01 10:00:00", "abcd-ef-gh 10:00:00"] {
            assert!(decode(raw).is_err(), "expected failure for {raw:?}");
        }
    }

    #[test]
    fn slot_keys_use_unpadded_hour_and_parse_back() {
        let key = slot_key(date(2024, 3, 10), 9).expect("key");
        assert_eq!(key, "2024-03-10-9");
        assert_eq!(
            parse_slot_key(&key).expect("parse"),
            Slot {
                date: date(2024, 3, 10),
                hour: 9
            }
        );
        assert!(parse_slot_key("2024-03-10").is_err());
        assert!(parse_slot_key("2024-03-10-x").is_err());
        assert_eq!(
            parse_slot_key("2024-03-10-30"),
            Err(ValidationError::InvalidHour(30))
        );
    }

    #[test]
    fn week_dates_start_on_sunday() {
        // 2024-03-13 is a Wednesday.
        let week = week_dates(date(2024, 3, 13));
        assert_eq!(week[0], date(2024, 3, 10));
        assert_eq!(week[6], date(2024, 3, 16));
        assert!(falls_on_any("2024-03-16 23:00:00", &week));
        assert!(!falls_on_any("2024-03-17 00:00:00", &week));
        assert!(!falls_on_any("not a time", &week));
    }

    #[test]
    fn today_follows_the_configured_zone() {
        let now = DateTime::parse_from_rfc3339("2024-03-10T02:30:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc);
        assert_eq!(today_in(chrono_tz::UTC, now), date(2024, 3, 10));
        assert_eq!(today_in(chrono_tz::America::New_York, now), date(2024, 3, 9));
        assert_eq!(today_in(chrono_tz::Asia::Tokyo, now), date(2024, 3, 10));
    }

    proptest! {
        #[test]
        fn encode_decode_roundtrip_preserves_date_and_hour(
            days_from_origin in 0i64..(366 * 400),
            hour in 0u32..24u32
        ) {
            let day = date(1900, 1, 1) + Duration::days(days_from_origin);
            let stamp = decode(&encode(day, hour).expect("encode")).expect("decode");
            prop_assert_eq!(stamp.date(), day);
            prop_assert_eq!(stamp.hour, hour);
            prop_assert_eq!(stamp.minute, 0);
            prop_assert_eq!(stamp.second, 0);

            let slot = parse_slot_key(&slot_key(day, hour).expect("key")).expect("parse key");
            prop_assert_eq!(slot, Slot { date: day, hour });
        }
    }
}
