use pco2_core::calendar::text::{
    format_time_of_day, format_timestamp, parse_time_of_day, parse_timestamp,
};
use pco2_core::calendar::{CalDuration, Timestamp, ValidationError, Weekday};

fn ts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Timestamp {
    Timestamp::new(year, month, day, hour, minute, second).expect("valid timestamp")
}

#[test]
fn fixed_length_duration_addition_is_associative() {
    let start = ts(2023, 11, 5, 22, 45, 30);
    let a = CalDuration::hours(7);
    let b = CalDuration::minutes(150);
    let c = CalDuration::days(3);

    assert_eq!((start + a) + b, start + (a + b));
    assert_eq!((start + b) + c, start + (b + c));
    assert_eq!(((start + a) + b) + c, start + ((a + b) + c));
}

#[test]
fn ordering_follows_the_calendar() {
    let earlier = ts(2024, 2, 29, 23, 59, 59);
    let later = ts(2024, 3, 1, 0, 0, 0);
    assert!(earlier < later);
    assert!(later > earlier);
    assert_eq!(earlier.cmp(&earlier), core::cmp::Ordering::Equal);

    let sub_second = Timestamp::with_hundredths(2024, 2, 29, 23, 59, 59, 50)
        .expect("valid timestamp");
    assert!(earlier < sub_second);
    assert!(sub_second < later);
}

#[test]
fn leap_day_boundaries_carry_correctly() {
    assert_eq!(
        ts(2024, 2, 28, 12, 0, 0) + CalDuration::days(1),
        ts(2024, 2, 29, 12, 0, 0)
    );
    assert_eq!(
        ts(2023, 2, 28, 12, 0, 0) + CalDuration::days(1),
        ts(2023, 3, 1, 12, 0, 0)
    );
    // 2100 is not a leap year, 2000 was.
    assert_eq!(
        ts(2100, 2, 28, 0, 0, 0) + CalDuration::days(1),
        ts(2100, 3, 1, 0, 0, 0)
    );
    assert_eq!(
        ts(2000, 2, 28, 0, 0, 0) + CalDuration::days(1),
        ts(2000, 2, 29, 0, 0, 0)
    );
}

#[test]
fn year_end_rollover_carries_through_every_field() {
    let end = ts(2023, 12, 31, 23, 59, 59);
    assert_eq!(end + CalDuration::seconds(1), ts(2024, 1, 1, 0, 0, 0));
}

#[test]
fn month_addition_clamps_to_the_target_month_length() {
    let month = CalDuration::new(0, 1, 0, 0, 0, 0);
    assert_eq!(ts(2020, 1, 31, 8, 0, 0) + month, ts(2020, 2, 29, 8, 0, 0));
    assert_eq!(ts(2021, 1, 31, 8, 0, 0) + month, ts(2021, 2, 28, 8, 0, 0));
    assert_eq!(ts(2021, 3, 31, 8, 0, 0) + month, ts(2021, 4, 30, 8, 0, 0));
}

#[test]
fn weekday_is_derived_not_stored() {
    assert_eq!(ts(2024, 6, 10, 0, 0, 0).weekday(), Weekday::Monday);
    assert_eq!(ts(2000, 1, 1, 0, 0, 0).weekday(), Weekday::Saturday);
    assert_eq!(ts(1970, 1, 1, 0, 0, 0).weekday(), Weekday::Thursday);
}

#[test]
fn timestamp_text_round_trips() {
    let stamp = ts(2024, 6, 10, 9, 5, 0);
    let text = format_timestamp(&stamp);
    assert_eq!(text.as_str(), "2024-06-10T09:05:00Z");
    assert_eq!(parse_timestamp(text.as_str()).expect("parse"), stamp);

    let precise = Timestamp::with_hundredths(2024, 6, 10, 9, 5, 0, 25).expect("valid timestamp");
    let text = format_timestamp(&precise);
    assert_eq!(text.as_str(), "2024-06-10T09:05:00.25Z");
    assert_eq!(parse_timestamp(text.as_str()).expect("parse"), precise);
}

#[test]
fn time_of_day_text_round_trips() {
    let offset = parse_time_of_day("13:30:05").expect("parse");
    assert_eq!(offset, CalDuration::new(0, 0, 0, 13, 30, 5));

    let rendered = format_time_of_day(&ts(2024, 6, 10, 13, 30, 5));
    assert_eq!(rendered.as_str(), "13:30:05");
}

#[test]
fn out_of_range_fields_are_rejected_not_clamped() {
    assert_eq!(
        Timestamp::new(2024, 13, 1, 0, 0, 0).unwrap_err(),
        ValidationError::MonthOutOfRange
    );
    assert_eq!(
        Timestamp::new(2023, 2, 29, 0, 0, 0).unwrap_err(),
        ValidationError::DayOutOfRange
    );
    assert_eq!(
        parse_timestamp("2024-06-10T24:00:00Z").unwrap_err(),
        ValidationError::HourOutOfRange
    );
    assert_eq!(
        parse_timestamp("2024-06-10 09:05:00Z").unwrap_err(),
        ValidationError::Malformed
    );
}

#[test]
fn next_whole_hour_truncates_and_advances() {
    assert_eq!(
        ts(2024, 6, 10, 8, 17, 42).next_whole_hour(),
        ts(2024, 6, 10, 9, 0, 0)
    );
    assert_eq!(
        ts(2024, 6, 10, 23, 59, 59).next_whole_hour(),
        ts(2024, 6, 11, 0, 0, 0)
    );
    assert_eq!(
        ts(2024, 6, 10, 9, 0, 0).next_whole_hour(),
        ts(2024, 6, 10, 10, 0, 0)
    );
}
