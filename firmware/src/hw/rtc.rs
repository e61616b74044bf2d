//! Calendar register codec for the external I2C RTC.
//!
//! The chip stores every calendar field as packed BCD and only keeps a
//! two-digit year. The century rides in an otherwise unused bit of the
//! weekday register, which gives the clock a 2000..=2199 window; the codec
//! rejects anything outside it so a corrupted register read can never
//! produce a plausible-looking wrong century.

#![allow(dead_code)]

use pco2_core::calendar::{Timestamp, ValidationError};

/// First year of the RTC century window.
pub const CENTURY_BASE_YEAR: u16 = 2000;

/// Century flag bit in the weekday register (0 = 20xx, 1 = 21xx).
pub const CENTURY_BIT: u8 = 0b0000_1000;

const WEEKDAY_MASK: u8 = 0b0000_0111;

/// Packs a two-digit value as BCD. Values above 99 do not fit.
#[must_use]
pub const fn encode_bcd(value: u8) -> Option<u8> {
    if value > 99 {
        return None;
    }
    Some((value / 10) << 4 | (value % 10))
}

/// Unpacks a BCD byte, rejecting nibbles above 9.
#[must_use]
pub const fn decode_bcd(raw: u8) -> Option<u8> {
    let tens = raw >> 4;
    let ones = raw & 0x0F;
    if tens > 9 || ones > 9 {
        return None;
    }
    Some(tens * 10 + ones)
}

/// Raw bytes of the RTC counter register block, in register order.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CalendarRegs {
    pub hundredths: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub date: u8,
    pub month: u8,
    pub year: u8,
    pub weekday: u8,
}

/// Raw bytes of the RTC alarm register block. The alarm matches on
/// month/date/time, so the year never appears here.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AlarmRegs {
    pub hundredths: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub date: u8,
    pub month: u8,
    pub weekday: u8,
}

/// Encodes a timestamp into the counter register block.
///
/// # Errors
/// `YearOutOfRange` when the year falls outside the century window.
pub fn encode_calendar(stamp: &Timestamp) -> Result<CalendarRegs, ValidationError> {
    let (century, two_digit_year) = split_year(stamp.year())?;
    let weekday = stamp.weekday().as_index() & WEEKDAY_MASK;

    Ok(CalendarRegs {
        hundredths: bcd(stamp.hundredths()),
        seconds: bcd(stamp.second()),
        minutes: bcd(stamp.minute()),
        hours: bcd(stamp.hour()),
        date: bcd(stamp.day()),
        month: bcd(stamp.month()),
        year: bcd(two_digit_year),
        weekday: weekday | if century == 1 { CENTURY_BIT } else { 0 },
    })
}

/// Decodes the counter register block back into a timestamp.
///
/// # Errors
/// `Malformed` for non-BCD bytes, otherwise the field-specific error from
/// [`Timestamp::with_hundredths`].
pub fn decode_calendar(regs: &CalendarRegs) -> Result<Timestamp, ValidationError> {
    let century = u16::from(regs.weekday & CENTURY_BIT != 0);
    let year = CENTURY_BASE_YEAR + century * 100 + u16::from(unbcd(regs.year)?);

    Timestamp::with_hundredths(
        year,
        unbcd(regs.month)?,
        unbcd(regs.date)?,
        unbcd(regs.hours)?,
        unbcd(regs.minutes)?,
        unbcd(regs.seconds)?,
        unbcd(regs.hundredths)?,
    )
}

/// Encodes a wake-up time into the alarm register block.
///
/// # Errors
/// `YearOutOfRange` when the year falls outside the century window; the
/// alarm itself carries no year but the timestamp must still be one the
/// counter can reach.
pub fn encode_alarm(at: &Timestamp) -> Result<AlarmRegs, ValidationError> {
    let _ = split_year(at.year())?;

    Ok(AlarmRegs {
        hundredths: bcd(at.hundredths()),
        seconds: bcd(at.second()),
        minutes: bcd(at.minute()),
        hours: bcd(at.hour()),
        date: bcd(at.day()),
        month: bcd(at.month()),
        weekday: at.weekday().as_index() & WEEKDAY_MASK,
    })
}

fn split_year(year: u16) -> Result<(u16, u8), ValidationError> {
    if !(CENTURY_BASE_YEAR..CENTURY_BASE_YEAR + 200).contains(&year) {
        return Err(ValidationError::YearOutOfRange);
    }
    let offset = year - CENTURY_BASE_YEAR;
    #[allow(clippy::cast_possible_truncation)]
    Ok((offset / 100, (offset % 100) as u8))
}

// Timestamp fields are already range-checked, so the packing cannot fail.
fn bcd(value: u8) -> u8 {
    encode_bcd(value).unwrap_or(0)
}

fn unbcd(raw: u8) -> Result<u8, ValidationError> {
    decode_bcd(raw).ok_or(ValidationError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_packing_round_trips() {
        for value in 0..=99 {
            let packed = encode_bcd(value).expect("packable");
            assert_eq!(decode_bcd(packed), Some(value));
        }
        assert_eq!(encode_bcd(100), None);
        assert_eq!(decode_bcd(0x1A), None);
        assert_eq!(decode_bcd(0xA1), None);
    }

    #[test]
    fn calendar_round_trips_in_the_current_century() {
        let stamp = Timestamp::new(2024, 6, 10, 9, 5, 42).expect("valid timestamp");
        let regs = encode_calendar(&stamp).expect("encodable");
        assert_eq!(regs.year, 0x24);
        assert_eq!(regs.month, 0x06);
        assert_eq!(regs.weekday & CENTURY_BIT, 0);
        assert_eq!(decode_calendar(&regs).expect("decodable"), stamp);
    }

    #[test]
    fn century_bit_extends_the_window_past_2099() {
        let stamp = Timestamp::new(2105, 1, 15, 0, 0, 0).expect("valid timestamp");
        let regs = encode_calendar(&stamp).expect("encodable");
        assert_eq!(regs.year, 0x05);
        assert_ne!(regs.weekday & CENTURY_BIT, 0);
        assert_eq!(decode_calendar(&regs).expect("decodable"), stamp);
    }

    #[test]
    fn years_before_the_window_are_rejected() {
        let stamp = Timestamp::new(1999, 12, 31, 23, 59, 59).expect("valid timestamp");
        assert_eq!(
            encode_calendar(&stamp).unwrap_err(),
            ValidationError::YearOutOfRange
        );
    }

    #[test]
    fn corrupt_registers_are_rejected() {
        let stamp = Timestamp::new(2024, 6, 10, 9, 5, 42).expect("valid timestamp");
        let mut regs = encode_calendar(&stamp).expect("encodable");
        regs.minutes = 0x7A;
        assert_eq!(
            decode_calendar(&regs).unwrap_err(),
            ValidationError::Malformed
        );

        let mut regs = encode_calendar(&stamp).expect("encodable");
        regs.month = 0x13;
        assert_eq!(
            decode_calendar(&regs).unwrap_err(),
            ValidationError::MonthOutOfRange
        );
    }

    #[test]
    fn alarm_block_drops_the_year() {
        let at = Timestamp::new(2024, 6, 10, 10, 0, 0).expect("valid timestamp");
        let regs = encode_alarm(&at).expect("encodable");
        assert_eq!(regs.hours, 0x10);
        assert_eq!(regs.date, 0x10);
        assert_eq!(regs.month, 0x06);
    }
}
