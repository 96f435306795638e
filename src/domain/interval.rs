//! Text intervals as the store renders them: `"HH:MM:SS"`, `"1 day HH:MM:SS"`,
//! `"N days HH:MM:SS"`. Fractional seconds are accepted and discarded.

use crate::domain::error::ParseError;
use chrono::Duration;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Interval {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let malformed = || ParseError::MalformedInterval(raw.to_string());
        let tokens = raw.split_whitespace().collect::<Vec<_>>();

        let (days, clock) = match tokens.as_slice() {
            [clock] => (0, Some(*clock)),
            [count, unit] if is_day_unit(unit) => (parse_days(count, raw)?, None),
            [count, unit, clock] if is_day_unit(unit) => (parse_days(count, raw)?, Some(*clock)),
            _ => return Err(malformed()),
        };

        let Some(clock) = clock else {
            return Ok(Self {
                days,
                ..Self::default()
            });
        };

        let mut parts = clock.split(':');
        let (Some(hours), Some(minutes), Some(seconds), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        let seconds = seconds.split_once('.').map_or(seconds, |(whole, _)| whole);

        let hours = parse_digits(hours, 1, "hours").map_err(|_| malformed())?;
        let minutes = parse_digits(minutes, 2, "minutes").map_err(|_| malformed())?;
        let seconds = parse_digits(seconds, 2, "seconds").map_err(|_| malformed())?;
        if minutes > 59 || seconds > 59 {
            return Err(malformed());
        }

        Ok(Self {
            days,
            hours,
            minutes,
            seconds,
        })
    }

    /// Negative spans clamp to zero; hours are normalized below 24.
    pub fn from_duration(duration: Duration) -> Self {
        let total_seconds = duration.num_seconds().max(0);
        let days = total_seconds / 86_400;
        let remainder = total_seconds % 86_400;
        Self {
            days: u32::try_from(days).unwrap_or(u32::MAX),
            hours: (remainder / 3_600) as u32,
            minutes: ((remainder % 3_600) / 60) as u32,
            seconds: (remainder % 60) as u32,
        }
    }

    /// `days*24 + hours + minutes/60`; seconds do not contribute.
    pub fn total_hours(&self) -> f64 {
        f64::from(self.days) * 24.0 + f64::from(self.hours) + f64::from(self.minutes) / 60.0
    }

    pub fn to_duration(&self) -> Duration {
        Duration::days(i64::from(self.days))
            + Duration::hours(i64::from(self.hours))
            + Duration::minutes(i64::from(self.minutes))
            + Duration::seconds(i64::from(self.seconds))
    }

    /// Short label for timelines: `"2d 3h"`, `"3h 15m"`, `"45m"`.
    pub fn compact_label(&self) -> String {
        if self.days > 0 {
            format!("{}d {}h", self.days, self.hours)
        } else if self.hours > 0 {
            format!("{}h {}m", self.hours, self.minutes)
        } else {
            format!("{}m", self.minutes)
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.days {
            0 => {}
            1 => f.write_str("1 day ")?,
            days => write!(f, "{days} days ")?,
        }
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds
        )
    }
}

impl FromStr for Interval {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

pub fn parse_hours(raw: &str) -> Result<f64, ParseError> {
    Interval::parse(raw).map(|interval| interval.total_hours())
}

fn is_day_unit(token: &str) -> bool {
    matches!(token, "day" | "days")
}

fn parse_days(token: &str, raw: &str) -> Result<u32, ParseError> {
    parse_digits(token, 1, "days").map_err(|_| ParseError::MalformedInterval(raw.to_string()))
}

fn parse_digits(token: &str, min_len: usize, field: &'static str) -> Result<u32, ParseError> {
    if token.len() < min_len || !token.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ParseError::InvalidComponent {
            field,
            value: token.to_string(),
        });
    }
    token.parse::<u32>().map_err(|_| ParseError::InvalidComponent {
        field,
        value: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx_eq(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    #[test]
    fn parses_days_and_clock() {
        assert!(approx_eq(parse_hours("2 days 03:30:00").expect("valid"), 51.5));
        assert!(approx_eq(parse_hours("1 day 00:15:59").expect("valid"), 24.25));
    }

    #[test]
    fn missing_day_component_counts_as_zero_days() {
        assert!(approx_eq(parse_hours("02:00:00").expect("valid"), 2.0));
        assert!(approx_eq(parse_hours("00:45:30.250311").expect("valid"), 0.75));
    }

    #[test]
    fn day_only_interval_is_accepted() {
        let interval = Interval::parse("3 days").expect("valid");
        assert_eq!(interval.days, 3);
        assert!(approx_eq(interval.total_hours(), 72.0));
    }

    #[test]
    fn malformed_intervals_report_parse_error() {
        for raw in ["", "soon", "2 weeks 01:00:00", "1:2:3", "01:61:00", "-01:00:00", "1 day 01:00"] {
            assert!(
                matches!(Interval::parse(raw), Err(ParseError::MalformedInterval(_))),
                "expected failure for {raw:?}"
            );
        }
        assert!(parse_hours("garbage").is_err());
    }

    #[test]
    fn formats_like_the_store() {
        let under_a_day = Interval::from_duration(Duration::hours(2));
        let one_day = Interval::from_duration(Duration::hours(26) + Duration::seconds(5));
        let many_days = Interval::from_duration(Duration::days(3) + Duration::minutes(90));

        assert_eq!(under_a_day.to_string(), "02:00:00");
        assert_eq!(one_day.to_string(), "1 day 02:00:05");
        assert_eq!(many_days.to_string(), "3 days 01:30:00");
        assert_eq!(Interval::from_duration(Duration::seconds(-30)), Interval::default());
    }

    #[test]
    fn compact_labels_pick_the_two_largest_units() {
        assert_eq!(Interval::parse("2 days 03:30:00").expect("valid").compact_label(), "2d 3h");
        assert_eq!(Interval::parse("03:15:00").expect("valid").compact_label(), "3h 15m");
        assert_eq!(Interval::parse("00:45:10").expect("valid").compact_label(), "45m");
    }

    proptest! {
        #[test]
        fn hours_follow_day_hour_minute_arithmetic(
            days in 0u32..2_000u32,
            hours in 0u32..24u32,
            minutes in 0u32..60u32,
            seconds in 0u32..60u32
        ) {
            let raw = format!("{days} days {hours:02}:{minutes:02}:{seconds:02}");
            let parsed = parse_hours(&raw).expect("valid interval");
            let expected = f64::from(days) * 24.0 + f64::from(hours) + f64::from(minutes) / 60.0;
            prop_assert!(approx_eq(parsed, expected));
        }

        #[test]
        fn rendered_durations_parse_back(total_seconds in 0i64..10_000_000i64) {
            let interval = Interval::from_duration(Duration::seconds(total_seconds));
            let reparsed = Interval::parse(&interval.to_string()).expect("rendered interval parses");
            prop_assert_eq!(reparsed, interval);
            prop_assert_eq!(reparsed.to_duration().num_seconds(), total_seconds);
        }
    }
}
