//! Pure date arithmetic for credential validity and license terms.

use chrono::{Datelike, Months, NaiveDate};

/// Medical fitness certificates hold for a year unless the examiner set an
/// explicit expiry.
pub const MEDICAL_FITNESS_WINDOW: Months = Months::new(12);

/// Passed theory and practical exams count for six months.
pub const EXAM_RESULT_WINDOW: Months = Months::new(6);

/// Whether a dated credential still counts at `as_of`. Fails closed when
/// the credential was never passed. An explicit expiry date wins over the
/// default window; the default window is exclusive of its end day.
pub fn credential_valid(
    passed: bool,
    issued_on: NaiveDate,
    expires_on: Option<NaiveDate>,
    default_window: Months,
    as_of: NaiveDate,
) -> bool {
    if !passed {
        return false;
    }
    match expires_on {
        Some(expiry) => as_of <= expiry,
        None => match issued_on.checked_add_months(default_window) {
            Some(limit) => as_of < limit,
            None => false,
        },
    }
}

/// License term in years by the holder's age at issuance. Shorter renewal
/// cycles apply at the age extremes; a first issue under 21 is probationary.
pub fn license_term_years(age: u32, first_issue: bool) -> u8 {
    match age {
        0..=20 => {
            if first_issue {
                1
            } else {
                3
            }
        }
        21..=46 => 5,
        47..=60 => 4,
        61..=70 => 3,
        _ => 1,
    }
}

/// Completed years between `birth_date` and `as_of`.
pub fn age_on(birth_date: NaiveDate, as_of: NaiveDate) -> u32 {
    let mut age = as_of.year() - birth_date.year();
    if (as_of.month(), as_of.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

/// Expiration lands on the holder's birthday: take issue date plus term,
/// snap day and month to the birth date, and push one more year if the
/// snapped date is not strictly after the issue date. Feb 29 birth dates
/// snap to Feb 28 in non-leap years.
pub fn license_expiration(
    birth_date: NaiveDate,
    issue_date: NaiveDate,
    term_years: u8,
) -> NaiveDate {
    let horizon = issue_date
        .checked_add_months(Months::new(u32::from(term_years) * 12))
        .unwrap_or(issue_date);

    let snapped = birthday_in(birth_date, horizon.year());
    if snapped > issue_date {
        snapped
    } else {
        birthday_in(birth_date, horizon.year() + 1)
    }
}

fn birthday_in(birth_date: NaiveDate, year: i32) -> NaiveDate {
    birth_date.with_year(year).unwrap_or_else(|| {
        // Feb 29 in a non-leap year.
        NaiveDate::from_ymd_opt(year, 2, 28).expect("Feb 28 exists in every year")
    })
}
