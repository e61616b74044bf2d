//! Civil date-time values and the duration arithmetic the scheduler and
//! cycle controller share.
//!
//! [`Timestamp`] is always a valid calendar date; out-of-range fields are
//! rejected at construction, never clamped. [`CalDuration`] is a plain
//! offset and carries no such invariant, so "+48 hours" is legal standalone.
//! Ordering is defined through an unambiguous epoch-seconds conversion,
//! which removes any century ambiguity at the comparison site.

pub mod text;

/// Error returned when a calendar value or its textual form is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidationError {
    YearOutOfRange,
    MonthOutOfRange,
    DayOutOfRange,
    HourOutOfRange,
    MinuteOutOfRange,
    SecondOutOfRange,
    SubSecondOutOfRange,
    Malformed,
}

/// Earliest year a [`Timestamp`] may carry.
pub const MIN_YEAR: u16 = 1970;
/// Latest year a [`Timestamp`] may carry (RTC century window upper bound).
pub const MAX_YEAR: u16 = 2199;

/// Gregorian leap year rule.
#[must_use]
pub const fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in the given month, honoring the leap rule.
#[must_use]
pub const fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Day of the week derived from the civil date; never stored independently.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    /// Index with Sunday = 0, matching the RTC chip convention.
    #[must_use]
    pub const fn as_index(self) -> u8 {
        match self {
            Weekday::Sunday => 0,
            Weekday::Monday => 1,
            Weekday::Tuesday => 2,
            Weekday::Wednesday => 3,
            Weekday::Thursday => 4,
            Weekday::Friday => 5,
            Weekday::Saturday => 6,
        }
    }

    const fn from_index(index: i64) -> Self {
        match index {
            1 => Weekday::Monday,
            2 => Weekday::Tuesday,
            3 => Weekday::Wednesday,
            4 => Weekday::Thursday,
            5 => Weekday::Friday,
            6 => Weekday::Saturday,
            _ => Weekday::Sunday,
        }
    }
}

/// Validated civil date-time with hundredths-of-a-second resolution.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    hundredths: u8,
}

impl Timestamp {
    /// Constructs a timestamp at whole-second resolution.
    ///
    /// # Errors
    /// Returns the first field found out of range.
    pub const fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, ValidationError> {
        Self::with_hundredths(year, month, day, hour, minute, second, 0)
    }

    /// Constructs a timestamp including hundredths of a second.
    ///
    /// # Errors
    /// Returns the first field found out of range.
    pub const fn with_hundredths(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        hundredths: u8,
    ) -> Result<Self, ValidationError> {
        if year < MIN_YEAR || year > MAX_YEAR {
            return Err(ValidationError::YearOutOfRange);
        }
        if month < 1 || month > 12 {
            return Err(ValidationError::MonthOutOfRange);
        }
        if day < 1 || day > days_in_month(year, month) {
            return Err(ValidationError::DayOutOfRange);
        }
        if hour > 23 {
            return Err(ValidationError::HourOutOfRange);
        }
        if minute > 59 {
            return Err(ValidationError::MinuteOutOfRange);
        }
        if second > 59 {
            return Err(ValidationError::SecondOutOfRange);
        }
        if hundredths > 99 {
            return Err(ValidationError::SubSecondOutOfRange);
        }
        Ok(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            hundredths,
        })
    }

    #[must_use]
    pub const fn year(self) -> u16 {
        self.year
    }

    #[must_use]
    pub const fn month(self) -> u8 {
        self.month
    }

    #[must_use]
    pub const fn day(self) -> u8 {
        self.day
    }

    #[must_use]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    #[must_use]
    pub const fn minute(self) -> u8 {
        self.minute
    }

    #[must_use]
    pub const fn second(self) -> u8 {
        self.second
    }

    #[must_use]
    pub const fn hundredths(self) -> u8 {
        self.hundredths
    }

    /// Days since 1970-01-01 for this civil date.
    #[must_use]
    pub const fn days_since_epoch(self) -> i64 {
        days_from_civil(self.year as i64, self.month as i64, self.day as i64)
    }

    /// Seconds since 1970-01-01T00:00:00, ignoring sub-second resolution.
    #[must_use]
    pub const fn epoch_seconds(self) -> i64 {
        self.days_since_epoch() * 86_400
            + self.hour as i64 * 3_600
            + self.minute as i64 * 60
            + self.second as i64
    }

    /// Derived day of the week.
    #[must_use]
    pub const fn weekday(self) -> Weekday {
        // 1970-01-01 was a Thursday (index 4, Sunday = 0).
        let index = (self.days_since_epoch() + 4).rem_euclid(7);
        Weekday::from_index(index)
    }

    /// The top of the next hour, used when re-basing past-due work.
    #[must_use]
    pub fn next_whole_hour(self) -> Self {
        let trimmed = Self {
            minute: 0,
            second: 0,
            hundredths: 0,
            ..self
        };
        trimmed.add_duration(CalDuration::hours(1))
    }

    /// Field-wise addition with carry, sub-second through year.
    ///
    /// Month and year offsets are applied first with the day clamped to the
    /// target month's length; the remaining day offset then walks across
    /// real month boundaries so the result is always a valid date.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_duration(self, duration: CalDuration) -> Self {
        let mut hundredths = u32::from(self.hundredths) + duration.hundredths;
        let mut seconds = u32::from(self.second) + duration.seconds + hundredths / 100;
        hundredths %= 100;
        let mut minutes = u32::from(self.minute) + duration.minutes + seconds / 60;
        seconds %= 60;
        let mut hours = u32::from(self.hour) + duration.hours + minutes / 60;
        minutes %= 60;
        let carried_days = hours / 24;
        hours %= 24;

        let total_months = u32::from(self.month - 1) + u32::from(duration.months);
        let mut year = u32::from(self.year) + u32::from(duration.years) + total_months / 12;
        let mut month = total_months % 12 + 1;
        let mut day = u32::from(self.day);
        let month_len = u32::from(days_in_month(year as u16, month as u8));
        if day > month_len {
            day = month_len;
        }

        let mut remaining = u32::from(duration.days) + carried_days;
        loop {
            let month_len = u32::from(days_in_month(year as u16, month as u8));
            if day + remaining <= month_len {
                day += remaining;
                break;
            }
            remaining -= month_len - day + 1;
            day = 1;
            month += 1;
            if month > 12 {
                month = 1;
                year += 1;
            }
        }

        Self {
            year: year as u16,
            month: month as u8,
            day: day as u8,
            hour: hours as u8,
            minute: minutes as u8,
            second: seconds as u8,
            hundredths: hundredths as u8,
        }
    }
}

impl core::ops::Add<CalDuration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: CalDuration) -> Self::Output {
        self.add_duration(rhs)
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.epoch_seconds(), self.hundredths).cmp(&(other.epoch_seconds(), other.hundredths))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Calendar offset with the same six fields as [`Timestamp`].
///
/// Fields are unbounded; carries are resolved when the duration is applied.
/// `total_seconds` covers the fixed-length fields (days and below) only,
/// since a bare month or year has no well-defined length.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalDuration {
    pub years: u16,
    pub months: u16,
    pub days: u16,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub hundredths: u32,
}

impl CalDuration {
    /// The additive identity.
    pub const ZERO: Self = Self::new(0, 0, 0, 0, 0, 0);

    #[must_use]
    pub const fn new(
        years: u16,
        months: u16,
        days: u16,
        hours: u32,
        minutes: u32,
        seconds: u32,
    ) -> Self {
        Self {
            years,
            months,
            days,
            hours,
            minutes,
            seconds,
            hundredths: 0,
        }
    }

    #[must_use]
    pub const fn seconds(seconds: u32) -> Self {
        Self::new(0, 0, 0, 0, 0, seconds)
    }

    #[must_use]
    pub const fn minutes(minutes: u32) -> Self {
        Self::new(0, 0, 0, 0, minutes, 0)
    }

    #[must_use]
    pub const fn hours(hours: u32) -> Self {
        Self::new(0, 0, 0, hours, 0, 0)
    }

    #[must_use]
    pub const fn days(days: u16) -> Self {
        Self::new(0, 0, days, 0, 0, 0)
    }

    /// Splits an elapsed-seconds count into hour/minute/second fields.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_total_seconds(total: u64) -> Self {
        Self::new(
            0,
            0,
            0,
            (total / 3_600) as u32,
            (total % 3_600 / 60) as u32,
            (total % 60) as u32,
        )
    }

    /// Total seconds represented by the fixed-length fields (days and below).
    #[must_use]
    pub const fn total_seconds(&self) -> u64 {
        self.days as u64 * 86_400
            + self.hours as u64 * 3_600
            + self.minutes as u64 * 60
            + self.seconds as u64
    }

    /// Returns `true` when every field is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.years == 0
            && self.months == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0
            && self.hundredths == 0
    }
}

impl core::ops::Add for CalDuration {
    type Output = CalDuration;

    /// Field-wise addition with carry through the fixed-length fields.
    /// Months carry into years; a month never carries into days because a
    /// bare offset has no anchor month to measure against.
    fn add(self, rhs: Self) -> Self::Output {
        let hundredths = self.hundredths + rhs.hundredths;
        let seconds = self.seconds + rhs.seconds + hundredths / 100;
        let minutes = self.minutes + rhs.minutes + seconds / 60;
        let hours = self.hours + rhs.hours + minutes / 60;
        let days = u32::from(self.days) + u32::from(rhs.days) + hours / 24;
        let months = u32::from(self.months) + u32::from(rhs.months);
        let years = u32::from(self.years) + u32::from(rhs.years) + months / 12;

        #[allow(clippy::cast_possible_truncation)]
        Self {
            years: years as u16,
            months: (months % 12) as u16,
            days: days as u16,
            hours: hours % 24,
            minutes: minutes % 60,
            seconds: seconds % 60,
            hundredths: hundredths % 100,
        }
    }
}

// Howard Hinnant's days-from-civil algorithm, restricted to the validated
// year window so all intermediate terms stay in range.
const fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = if month > 2 { month - 3 } else { month + 9 };
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Timestamp {
        Timestamp::new(year, month, day, hour, minute, second).expect("valid timestamp")
    }

    #[test]
    fn leap_rule_matches_gregorian_calendar() {
        assert!(is_leap_year(2020));
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(2100));
        assert!(!is_leap_year(2019));
        assert_eq!(days_in_month(2020, 2), 29);
        assert_eq!(days_in_month(2019, 2), 28);
        assert_eq!(days_in_month(2021, 4), 30);
        assert_eq!(days_in_month(2021, 12), 31);
    }

    #[test]
    fn construction_rejects_out_of_range_fields() {
        assert_eq!(
            Timestamp::new(2021, 13, 1, 0, 0, 0),
            Err(ValidationError::MonthOutOfRange)
        );
        assert_eq!(
            Timestamp::new(2021, 2, 29, 0, 0, 0),
            Err(ValidationError::DayOutOfRange)
        );
        assert_eq!(
            Timestamp::new(2021, 6, 15, 24, 0, 0),
            Err(ValidationError::HourOutOfRange)
        );
        assert_eq!(
            Timestamp::new(1969, 1, 1, 0, 0, 0),
            Err(ValidationError::YearOutOfRange)
        );
        assert_eq!(
            Timestamp::with_hundredths(2021, 1, 1, 0, 0, 0, 100),
            Err(ValidationError::SubSecondOutOfRange)
        );
    }

    #[test]
    fn epoch_seconds_is_monotonic_over_field_order() {
        let earlier = ts(2021, 6, 30, 23, 59, 59);
        let later = ts(2021, 7, 1, 0, 0, 0);
        assert!(earlier < later);
        assert_eq!(later.epoch_seconds() - earlier.epoch_seconds(), 1);
    }

    #[test]
    fn epoch_origin_is_zero() {
        assert_eq!(ts(1970, 1, 1, 0, 0, 0).epoch_seconds(), 0);
        assert_eq!(ts(1970, 1, 2, 0, 0, 0).epoch_seconds(), 86_400);
    }

    #[test]
    fn weekday_is_derived_from_the_date() {
        assert_eq!(ts(1970, 1, 1, 0, 0, 0).weekday(), Weekday::Thursday);
        assert_eq!(ts(2020, 2, 29, 12, 0, 0).weekday(), Weekday::Saturday);
        assert_eq!(ts(2026, 8, 30, 0, 0, 0).weekday(), Weekday::Sunday);
    }

    #[test]
    fn addition_carries_through_every_field() {
        let start = ts(2021, 12, 31, 23, 59, 59);
        let result = start + CalDuration::seconds(1);
        assert_eq!(result, ts(2022, 1, 1, 0, 0, 0));
    }

    #[test]
    fn addition_crosses_leap_day() {
        let leap = ts(2020, 2, 28, 23, 0, 0) + CalDuration::hours(48);
        assert_eq!(leap, ts(2020, 3, 1, 23, 0, 0));

        let common = ts(2019, 2, 28, 23, 0, 0) + CalDuration::hours(24);
        assert_eq!(common, ts(2019, 3, 1, 23, 0, 0));
    }

    #[test]
    fn month_addition_clamps_to_target_month_length() {
        let clamped = ts(2020, 1, 31, 8, 0, 0) + CalDuration::new(0, 1, 0, 0, 0, 0);
        assert_eq!(clamped, ts(2020, 2, 29, 8, 0, 0));

        let common = ts(2021, 1, 31, 8, 0, 0) + CalDuration::new(0, 1, 0, 0, 0, 0);
        assert_eq!(common, ts(2021, 2, 28, 8, 0, 0));
    }

    #[test]
    fn zero_duration_is_the_identity() {
        let stamp = ts(2023, 7, 14, 6, 30, 15);
        assert_eq!(stamp + CalDuration::ZERO, stamp);
        assert!(CalDuration::ZERO.is_zero());
    }

    #[test]
    fn duration_addition_carries_sub_day_fields() {
        let sum = CalDuration::new(0, 0, 0, 23, 59, 59) + CalDuration::seconds(2);
        assert_eq!(sum, CalDuration::new(0, 0, 1, 0, 0, 1));

        let months = CalDuration::new(0, 7, 0, 0, 0, 0) + CalDuration::new(0, 6, 0, 0, 0, 0);
        assert_eq!(months.years, 1);
        assert_eq!(months.months, 1);
    }

    #[test]
    fn seconds_round_trip_at_hms_granularity() {
        let duration = CalDuration::from_total_seconds(7_384);
        assert_eq!(duration, CalDuration::new(0, 0, 0, 2, 3, 4));
        assert_eq!(duration.total_seconds(), 7_384);
    }

    #[test]
    fn next_whole_hour_discards_sub_hour_fields() {
        assert_eq!(
            ts(2021, 5, 4, 10, 17, 42).next_whole_hour(),
            ts(2021, 5, 4, 11, 0, 0)
        );
        assert_eq!(
            ts(2021, 5, 4, 23, 59, 0).next_whole_hour(),
            ts(2021, 5, 5, 0, 0, 0)
        );
    }
}
