//! Calendar-aware due-date arithmetic.
//!
//! Month advancement clamps the day-of-month to the last valid day of the
//! target month. Due dates drive late-fee eligibility downstream, so the
//! clamping must be exact: Jan 31 + 1 month is Feb 28/29, never Mar 3.

use chrono::{Datelike, NaiveDate};

/// Adds `n` calendar months to a date, clamping the day-of-month.
#[must_use]
pub fn advance_months(date: NaiveDate, n: u32) -> NaiveDate {
    let months = date.year() * 12 + i32::try_from(date.month0()).unwrap_or(0) + cast_i32(n);
    let year = months.div_euclid(12);
    let month = u32::try_from(months.rem_euclid(12)).unwrap_or(0) + 1;
    let day = date.day().min(days_in_month(year, month));

    // year/month/day are valid by construction above.
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or(date)
}

/// First due date of a freshly activated plan: one month after origination.
#[must_use]
pub fn first_due_date(origination: NaiveDate) -> NaiveDate {
    advance_months(origination, 1)
}

/// Number of days in the given month, accounting for leap years.
fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[allow(clippy::cast_possible_wrap)]
const fn cast_i32(n: u32) -> i32 {
    n as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(date(2024, 1, 31), 1, date(2024, 2, 29))] // leap year clamp
    #[case(date(2023, 1, 31), 1, date(2023, 2, 28))]
    #[case(date(2024, 1, 15), 1, date(2024, 2, 15))]
    #[case(date(2024, 3, 31), 1, date(2024, 4, 30))]
    #[case(date(2024, 11, 30), 3, date(2025, 2, 28))] // year rollover + clamp
    #[case(date(2024, 12, 31), 2, date(2025, 2, 28))]
    #[case(date(2024, 5, 31), 0, date(2024, 5, 31))]
    #[case(date(2023, 2, 28), 12, date(2024, 2, 28))]
    fn test_advance_months(
        #[case] from: NaiveDate,
        #[case] n: u32,
        #[case] expected: NaiveDate,
    ) {
        assert_eq!(advance_months(from, n), expected);
    }

    #[test]
    fn test_first_due_date_is_one_month_out() {
        assert_eq!(first_due_date(date(2024, 6, 15)), date(2024, 7, 15));
        assert_eq!(first_due_date(date(2024, 1, 30)), date(2024, 2, 29));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2100, 2), 28); // century, not leap
        assert_eq!(days_in_month(2000, 2), 29); // 400-year rule
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 7), 31);
    }

    proptest! {
        /// Advancing month by month equals advancing once by the sum when the
        /// source day needs no clamping (day <= 28 stays exact forever).
        #[test]
        fn prop_stepwise_matches_bulk_for_low_days(
            year in 2000i32..2100i32,
            month in 1u32..=12u32,
            day in 1u32..=28u32,
            a in 0u32..60u32,
            b in 0u32..60u32,
        ) {
            let start = NaiveDate::from_ymd_opt(year, month, day).unwrap();
            let stepped = advance_months(advance_months(start, a), b);
            prop_assert_eq!(stepped, advance_months(start, a + b));
        }

        /// The result always lands in the expected target month.
        #[test]
        fn prop_target_month_is_correct(
            year in 2000i32..2100i32,
            month in 1u32..=12u32,
            day in 1u32..=31u32,
            n in 0u32..120u32,
        ) {
            let Some(start) = NaiveDate::from_ymd_opt(year, month, day) else {
                return Ok(());
            };
            let result = advance_months(start, n);
            let total = year * 12 + i32::try_from(month - 1).unwrap() + i32::try_from(n).unwrap();
            prop_assert_eq!(result.year(), total.div_euclid(12));
            prop_assert_eq!(result.month(), u32::try_from(total.rem_euclid(12)).unwrap() + 1);
            prop_assert!(result.day() <= start.day());
        }
    }
}
