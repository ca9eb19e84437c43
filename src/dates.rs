//! Calendar-day helpers for attendance.
//!
//! Attendance is a day-granularity concept, so labels (`YYYY-MM-DD`) are kept
//! as [`NaiveDate`] values and only ever converted through the zone of the
//! value being labelled. Nothing here serializes through UTC.

use chrono::{
    DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveTime, TimeZone, Weekday,
};

const WEEKDAY_NAMES: [&str; 7] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
];
const WEEKDAY_SHORT_NAMES: [&str; 7] = ["Lun", "Mar", "Mié", "Jue", "Vie", "Sáb", "Dom"];
const MONTH_NAMES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];
const MONTH_SHORT_NAMES: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date {0:?}, expected YYYY-MM-DD")]
pub struct InvalidDateLabel(pub String);

/// Strict `YYYY-MM-DD` parse. Single-digit months/days and timestamps are rejected.
pub fn parse_label(label: &str) -> Result<NaiveDate, InvalidDateLabel> {
    let bytes = label.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(InvalidDateLabel(label.to_string()));
    }
    NaiveDate::parse_from_str(label, "%Y-%m-%d").map_err(|_| InvalidDateLabel(label.to_string()))
}

pub fn label(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Label of the calendar day `value` falls on in its own zone.
pub fn to_local_date_string<Tz: TimeZone>(value: &DateTime<Tz>) -> String {
    label(value.date_naive())
}

/// `label` anchored at local midnight.
pub fn parse_local_date(label: &str) -> Result<DateTime<Local>, InvalidDateLabel> {
    parse_local_date_in(label, &Local)
}

/// `label` anchored at midnight in `tz`. When midnight is skipped by a DST
/// transition the first valid instant of that day is used instead.
pub fn parse_local_date_in<Tz: TimeZone>(
    label: &str,
    tz: &Tz,
) -> Result<DateTime<Tz>, InvalidDateLabel> {
    let day = parse_label(label)?;
    let midnight = day.and_time(NaiveTime::MIN);
    (0..=24 * 4)
        .map(|quarter| midnight + Duration::minutes(15 * quarter))
        .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
        .ok_or_else(|| InvalidDateLabel(label.to_string()))
}

pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Monday of the ISO week containing `label`. A Sunday maps six days back.
pub fn monday_of_week(label_str: &str) -> Result<String, InvalidDateLabel> {
    Ok(label(monday_of(parse_label(label_str)?)))
}

pub fn get_monday_of_current_week_local() -> String {
    label(monday_of(today_local()))
}

/// Monday..Friday starting at `monday`.
pub fn get_week_days_range(monday: &str) -> Result<Vec<String>, InvalidDateLabel> {
    let start = parse_label(monday)?;
    Ok((0..5).map(|i| label(start + Duration::days(i))).collect())
}

/// Sunday before `monday` through the Saturday after it.
pub fn full_week_range(monday: &str) -> Result<Vec<String>, InvalidDateLabel> {
    let sunday = parse_label(monday)? - Duration::days(1);
    Ok((0..7).map(|i| label(sunday + Duration::days(i))).collect())
}

pub fn add_days(label_str: &str, days: i64) -> Result<String, InvalidDateLabel> {
    Ok(label(parse_label(label_str)? + Duration::days(days)))
}

pub fn add_weeks(label_str: &str, weeks: i64) -> Result<String, InvalidDateLabel> {
    add_days(label_str, weeks * 7)
}

/// Month arithmetic clamps to the last day of the target month
/// (`2025-01-31` + 1 month is `2025-02-28`).
pub fn add_months(label_str: &str, months: i32) -> Result<String, InvalidDateLabel> {
    let date = parse_label(label_str)?;
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted
        .map(label)
        .ok_or_else(|| InvalidDateLabel(label_str.to_string()))
}

pub fn days_between(a: &str, b: &str) -> Result<i64, InvalidDateLabel> {
    Ok((parse_label(b)? - parse_label(a)?).num_days().abs())
}

/// Every label from `start` to `end`, both inclusive. Empty when `end < start`.
pub fn date_range(start: &str, end: &str) -> Result<Vec<String>, InvalidDateLabel> {
    let start = parse_label(start)?;
    let end = parse_label(end)?;
    Ok(start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(label)
        .collect())
}

pub fn count_weekdays(start: &str, end: &str) -> Result<usize, InvalidDateLabel> {
    let start = parse_label(start)?;
    let end = parse_label(end)?;
    Ok(start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_weekday_date(*d))
        .count())
}

pub fn first_day_of_month(label_str: &str) -> Result<String, InvalidDateLabel> {
    let date = parse_label(label_str)?;
    Ok(label(date.with_day(1).unwrap_or(date)))
}

pub fn last_day_of_month(label_str: &str) -> Result<String, InvalidDateLabel> {
    let first = parse_label(&first_day_of_month(label_str)?)?;
    first
        .checked_add_months(Months::new(1))
        .map(|next| label(next - Duration::days(1)))
        .ok_or_else(|| InvalidDateLabel(label_str.to_string()))
}

pub fn month_days(label_str: &str) -> Result<Vec<String>, InvalidDateLabel> {
    date_range(
        &first_day_of_month(label_str)?,
        &last_day_of_month(label_str)?,
    )
}

/// `YYYY-MM` bucket of a label.
pub fn month_key(label_str: &str) -> Result<String, InvalidDateLabel> {
    Ok(parse_label(label_str)?.format("%Y-%m").to_string())
}

pub fn is_weekday_date(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn is_weekday(label_str: &str) -> Result<bool, InvalidDateLabel> {
    Ok(is_weekday_date(parse_label(label_str)?))
}

pub fn is_weekend(label_str: &str) -> Result<bool, InvalidDateLabel> {
    Ok(!is_weekday(label_str)?)
}

pub fn is_same_day<A: TimeZone, B: TimeZone>(a: &DateTime<A>, b: &DateTime<B>) -> bool {
    to_local_date_string(a) == to_local_date_string(b)
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    WEEKDAY_NAMES[date.weekday().num_days_from_monday() as usize]
}

pub fn short_weekday_name(date: NaiveDate) -> &'static str {
    WEEKDAY_SHORT_NAMES[date.weekday().num_days_from_monday() as usize]
}

pub fn month_name(date: NaiveDate) -> &'static str {
    MONTH_NAMES[date.month0() as usize]
}

/// "jueves, 30 de octubre de 2025"
pub fn format_full_spanish_date(label_str: &str) -> Result<String, InvalidDateLabel> {
    let date = parse_label(label_str)?;
    Ok(format!(
        "{}, {} de {} de {}",
        weekday_name(date).to_lowercase(),
        date.day(),
        month_name(date),
        date.year()
    ))
}

/// "jueves, 30 de octubre"
pub fn format_spanish_date_no_year(label_str: &str) -> Result<String, InvalidDateLabel> {
    let date = parse_label(label_str)?;
    Ok(format!(
        "{}, {} de {}",
        weekday_name(date).to_lowercase(),
        date.day(),
        month_name(date)
    ))
}

/// "30/10/2025"
pub fn format_short_spanish_date(label_str: &str) -> Result<String, InvalidDateLabel> {
    Ok(parse_label(label_str)?.format("%d/%m/%Y").to_string())
}

/// "30 oct"
pub fn format_day_month(label_str: &str) -> Result<String, InvalidDateLabel> {
    let date = parse_label(label_str)?;
    Ok(format!(
        "{} {}",
        date.day(),
        MONTH_SHORT_NAMES[date.month0() as usize]
    ))
}

/// Column header used by the weekly matrix: "30/10".
pub fn format_day_slash_month(date: NaiveDate) -> String {
    date.format("%d/%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn parse_label_rejects_loose_shapes() {
        assert!(parse_label("2025-10-27").is_ok());
        assert!(parse_label("2025-1-5").is_err());
        assert!(parse_label("2025-10-27T00:00:00").is_err());
        assert!(parse_label("2025-02-30").is_err());
        assert!(parse_label("").is_err());
    }

    #[test]
    fn local_label_roundtrips_for_every_offset() {
        let instants = [
            Utc.with_ymd_and_hms(2025, 10, 27, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 10, 27, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 12, 31, 22, 0, 0).unwrap(),
        ];
        for offset_quarters in -48..=56 {
            let tz = FixedOffset::east_opt(offset_quarters * 15 * 60).unwrap();
            for instant in &instants {
                let local = instant.with_timezone(&tz);
                let label = to_local_date_string(&local);
                let back = parse_local_date_in(&label, &tz).expect("parse label");
                assert_eq!(back.date_naive(), local.date_naive(), "offset {tz}");
                assert_eq!(to_local_date_string(&back), label);
            }
        }
    }

    #[test]
    fn label_follows_the_zone_not_utc() {
        // 02:00 UTC is still the previous evening in Lima (UTC-5).
        let lima = FixedOffset::west_opt(5 * 3600).unwrap();
        let instant = Utc.with_ymd_and_hms(2025, 10, 28, 2, 0, 0).unwrap();
        assert_eq!(to_local_date_string(&instant), "2025-10-28");
        assert_eq!(
            to_local_date_string(&instant.with_timezone(&lima)),
            "2025-10-27"
        );
    }

    #[test]
    fn monday_of_week_handles_sunday() {
        assert_eq!(monday_of_week("2025-10-31").unwrap(), "2025-10-27");
        assert_eq!(monday_of_week("2025-10-27").unwrap(), "2025-10-27");
        assert_eq!(monday_of_week("2025-11-02").unwrap(), "2025-10-27");
        let monday = parse_label(&get_monday_of_current_week_local()).unwrap();
        assert_eq!(monday.weekday(), Weekday::Mon);
    }

    #[test]
    fn week_ranges() {
        assert_eq!(
            get_week_days_range("2025-10-27").unwrap(),
            vec![
                "2025-10-27",
                "2025-10-28",
                "2025-10-29",
                "2025-10-30",
                "2025-10-31"
            ]
        );
        let full = full_week_range("2025-10-27").unwrap();
        assert_eq!(full.first().map(String::as_str), Some("2025-10-26"));
        assert_eq!(full.last().map(String::as_str), Some("2025-11-01"));
        assert_eq!(full.len(), 7);
    }

    #[test]
    fn arithmetic_helpers() {
        assert_eq!(add_days("2025-10-28", 3).unwrap(), "2025-10-31");
        assert_eq!(add_days("2025-10-28", -2).unwrap(), "2025-10-26");
        assert_eq!(add_weeks("2025-10-27", 1).unwrap(), "2025-11-03");
        assert_eq!(add_months("2025-01-31", 1).unwrap(), "2025-02-28");
        assert_eq!(add_months("2025-03-15", -3).unwrap(), "2024-12-15");
        assert_eq!(days_between("2025-10-31", "2025-10-27").unwrap(), 4);
        assert_eq!(date_range("2025-10-27", "2025-10-31").unwrap().len(), 5);
        assert!(date_range("2025-10-31", "2025-10-27").unwrap().is_empty());
        assert_eq!(count_weekdays("2025-10-27", "2025-11-09").unwrap(), 10);
        assert_eq!(first_day_of_month("2025-10-28").unwrap(), "2025-10-01");
        assert_eq!(last_day_of_month("2024-02-10").unwrap(), "2024-02-29");
        assert_eq!(month_days("2025-11-05").unwrap().len(), 30);
        assert_eq!(month_key("2025-10-28").unwrap(), "2025-10");
        assert!(is_weekend("2025-11-01").unwrap());
        assert!(is_weekday("2025-10-31").unwrap());
    }

    #[test]
    fn spanish_formatting() {
        assert_eq!(
            format_full_spanish_date("2025-10-30").unwrap(),
            "jueves, 30 de octubre de 2025"
        );
        assert_eq!(
            format_spanish_date_no_year("2025-10-29").unwrap(),
            "miércoles, 29 de octubre"
        );
        assert_eq!(format_short_spanish_date("2025-01-05").unwrap(), "05/01/2025");
        assert_eq!(format_day_month("2025-10-30").unwrap(), "30 oct");
        let d = parse_label("2025-11-01").unwrap();
        assert_eq!(weekday_name(d), "Sábado");
        assert_eq!(short_weekday_name(d), "Sáb");
        assert_eq!(format_day_slash_month(d), "01/11");
    }
}
