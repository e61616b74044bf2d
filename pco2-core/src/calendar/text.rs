//! ISO-8601 text profiles for calendar values.
//!
//! Two renderings exist on the wire: the full `YYYY-MM-DDThh:mm:ssZ` form
//! (with optional `.hh` hundredths) and the bare `hh:mm:ss[.hh]` time-of-day
//! form used for daily schedule offsets. Parsing is strict; out-of-range
//! fields are rejected, never clamped.

use core::fmt::Write;

use heapless::String;
use winnow::combinator::{opt, preceded};
use winnow::prelude::*;
use winnow::token::take_while;

use super::{CalDuration, Timestamp, ValidationError};

/// Longest full timestamp rendering (`YYYY-MM-DDThh:mm:ss.hhZ`).
pub const MAX_TIMESTAMP_TEXT: usize = 24;
/// Longest bare time rendering (`hh:mm:ss.hh`).
pub const MAX_TIME_TEXT: usize = 12;

/// Renders the full ISO-8601 profile; hundredths appear only when non-zero.
#[must_use]
pub fn format_timestamp(stamp: &Timestamp) -> String<MAX_TIMESTAMP_TEXT> {
    let mut out = String::new();
    // Capacity covers the longest rendering.
    let _ = write!(
        out,
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        stamp.year(),
        stamp.month(),
        stamp.day(),
        stamp.hour(),
        stamp.minute(),
        stamp.second()
    );
    if stamp.hundredths() > 0 {
        let _ = write!(out, ".{:02}", stamp.hundredths());
    }
    let _ = out.push('Z');
    out
}

/// Renders the bare time-of-day profile; hundredths appear only when non-zero.
#[must_use]
pub fn format_time_of_day(stamp: &Timestamp) -> String<MAX_TIME_TEXT> {
    let mut out = String::new();
    let _ = write!(
        out,
        "{:02}:{:02}:{:02}",
        stamp.hour(),
        stamp.minute(),
        stamp.second()
    );
    if stamp.hundredths() > 0 {
        let _ = write!(out, ".{:02}", stamp.hundredths());
    }
    out
}

/// Parses the full `YYYY-MM-DDThh:mm:ss[.hh]Z` profile.
///
/// # Errors
/// `Malformed` for structural problems, otherwise the field-specific
/// [`ValidationError`] from [`Timestamp::with_hundredths`].
pub fn parse_timestamp(input: &str) -> Result<Timestamp, ValidationError> {
    let raw = timestamp_body
        .parse(input)
        .map_err(|_| ValidationError::Malformed)?;

    Timestamp::with_hundredths(
        narrow16(raw.year, ValidationError::YearOutOfRange)?,
        narrow8(raw.month, ValidationError::MonthOutOfRange)?,
        narrow8(raw.day, ValidationError::DayOutOfRange)?,
        narrow8(raw.time.hour, ValidationError::HourOutOfRange)?,
        narrow8(raw.time.minute, ValidationError::MinuteOutOfRange)?,
        narrow8(raw.time.second, ValidationError::SecondOutOfRange)?,
        narrow8(raw.time.hundredths, ValidationError::SubSecondOutOfRange)?,
    )
}

/// Parses the bare `hh:mm:ss[.hh]` profile as an offset from midnight.
///
/// # Errors
/// `Malformed` for structural problems, otherwise the field-specific
/// [`ValidationError`].
pub fn parse_time_of_day(input: &str) -> Result<CalDuration, ValidationError> {
    let raw = time_body
        .parse(input)
        .map_err(|_| ValidationError::Malformed)?;

    if raw.hour > 23 {
        return Err(ValidationError::HourOutOfRange);
    }
    if raw.minute > 59 {
        return Err(ValidationError::MinuteOutOfRange);
    }
    if raw.second > 59 {
        return Err(ValidationError::SecondOutOfRange);
    }
    if raw.hundredths > 99 {
        return Err(ValidationError::SubSecondOutOfRange);
    }

    Ok(CalDuration {
        hours: raw.hour,
        minutes: raw.minute,
        seconds: raw.second,
        hundredths: raw.hundredths,
        ..CalDuration::ZERO
    })
}

struct RawTime {
    hour: u32,
    minute: u32,
    second: u32,
    hundredths: u32,
}

struct RawTimestamp {
    year: u32,
    month: u32,
    day: u32,
    time: RawTime,
}

fn timestamp_body(input: &mut &str) -> ModalResult<RawTimestamp> {
    let year = digits::<4>(input)?;
    '-'.parse_next(input)?;
    let month = digits::<2>(input)?;
    '-'.parse_next(input)?;
    let day = digits::<2>(input)?;
    'T'.parse_next(input)?;
    let time = time_body(input)?;
    'Z'.parse_next(input)?;

    Ok(RawTimestamp {
        year,
        month,
        day,
        time,
    })
}

fn time_body(input: &mut &str) -> ModalResult<RawTime> {
    let hour = digits::<2>(input)?;
    ':'.parse_next(input)?;
    let minute = digits::<2>(input)?;
    ':'.parse_next(input)?;
    let second = digits::<2>(input)?;
    let hundredths = opt(preceded('.', digits::<2>)).parse_next(input)?;

    Ok(RawTime {
        hour,
        minute,
        second,
        hundredths: hundredths.unwrap_or(0),
    })
}

fn digits<const WIDTH: usize>(input: &mut &str) -> ModalResult<u32> {
    take_while(WIDTH..=WIDTH, |c: char| c.is_ascii_digit())
        .map(|text: &str| {
            text.bytes()
                .fold(0_u32, |acc, digit| acc * 10 + u32::from(digit - b'0'))
        })
        .parse_next(input)
}

fn narrow8(value: u32, error: ValidationError) -> Result<u8, ValidationError> {
    u8::try_from(value).map_err(|_| error)
}

fn narrow16(value: u32, error: ValidationError) -> Result<u16, ValidationError> {
    u16::try_from(value).map_err(|_| error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_profile_round_trips() {
        let stamp = Timestamp::new(2024, 11, 5, 13, 45, 9).expect("valid timestamp");
        let text = format_timestamp(&stamp);
        assert_eq!(text.as_str(), "2024-11-05T13:45:09Z");
        assert_eq!(parse_timestamp(text.as_str()), Ok(stamp));
    }

    #[test]
    fn full_profile_carries_hundredths() {
        let stamp =
            Timestamp::with_hundredths(2024, 1, 2, 3, 4, 5, 60).expect("valid timestamp");
        let text = format_timestamp(&stamp);
        assert_eq!(text.as_str(), "2024-01-02T03:04:05.60Z");
        assert_eq!(parse_timestamp(text.as_str()), Ok(stamp));
    }

    #[test]
    fn bare_time_parses_as_midnight_offset() {
        let offset = parse_time_of_day("06:30:00").expect("valid time");
        assert_eq!(offset.hours, 6);
        assert_eq!(offset.minutes, 30);
        assert_eq!(offset.seconds, 0);

        let with_sub = parse_time_of_day("23:59:59.25").expect("valid time");
        assert_eq!(with_sub.hundredths, 25);
    }

    #[test]
    fn bare_time_formatting_matches_device_output() {
        let stamp = Timestamp::new(2024, 3, 9, 7, 5, 3).expect("valid timestamp");
        assert_eq!(format_time_of_day(&stamp).as_str(), "07:05:03");
    }

    #[test]
    fn out_of_range_fields_are_rejected_not_clamped() {
        assert_eq!(
            parse_timestamp("2024-13-01T00:00:00Z"),
            Err(ValidationError::MonthOutOfRange)
        );
        assert_eq!(
            parse_timestamp("2023-02-29T00:00:00Z"),
            Err(ValidationError::DayOutOfRange)
        );
        assert_eq!(
            parse_time_of_day("24:00:00"),
            Err(ValidationError::HourOutOfRange)
        );
    }

    #[test]
    fn structural_problems_are_malformed() {
        assert_eq!(
            parse_timestamp("2024-01-02 03:04:05Z"),
            Err(ValidationError::Malformed)
        );
        assert_eq!(
            parse_timestamp("2024-01-02T03:04:05"),
            Err(ValidationError::Malformed)
        );
        assert_eq!(parse_time_of_day("6:30:00"), Err(ValidationError::Malformed));
        assert_eq!(parse_time_of_day(""), Err(ValidationError::Malformed));
    }
}
