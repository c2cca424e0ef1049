use chrono::Months;

use super::common::date;
use crate::procedures::validity::{
    age_on, credential_valid, license_expiration, license_term_years, EXAM_RESULT_WINDOW,
    MEDICAL_FITNESS_WINDOW,
};

#[test]
fn credential_fails_closed_when_never_passed() {
    assert!(!credential_valid(
        false,
        date(2025, 1, 10),
        None,
        MEDICAL_FITNESS_WINDOW,
        date(2025, 1, 11),
    ));
}

#[test]
fn explicit_expiry_is_inclusive_of_its_last_day() {
    let issued = date(2025, 1, 10);
    let expiry = Some(date(2025, 3, 1));
    assert!(credential_valid(true, issued, expiry, MEDICAL_FITNESS_WINDOW, date(2025, 3, 1)));
    assert!(!credential_valid(true, issued, expiry, MEDICAL_FITNESS_WINDOW, date(2025, 3, 2)));
}

#[test]
fn default_exam_window_is_exclusive_of_its_end_day() {
    let exam_date = date(2025, 1, 10);
    assert!(credential_valid(true, exam_date, None, EXAM_RESULT_WINDOW, date(2025, 7, 9)));
    assert!(!credential_valid(true, exam_date, None, EXAM_RESULT_WINDOW, date(2025, 7, 10)));
}

#[test]
fn medical_default_window_is_twelve_months() {
    let exam_date = date(2024, 6, 2);
    assert!(credential_valid(true, exam_date, None, MEDICAL_FITNESS_WINDOW, date(2025, 6, 1)));
    assert!(!credential_valid(
        true,
        exam_date,
        None,
        MEDICAL_FITNESS_WINDOW,
        date(2025, 6, 2)
    ));
}

#[test]
fn explicit_expiry_wins_over_the_default_window() {
    // Examiner shortened the certificate well below twelve months.
    let exam_date = date(2025, 1, 10);
    let expiry = Some(date(2025, 2, 1));
    assert!(!credential_valid(
        true,
        exam_date,
        expiry,
        MEDICAL_FITNESS_WINDOW,
        date(2025, 3, 1)
    ));
}

#[test]
fn term_follows_the_age_bands() {
    assert_eq!(license_term_years(20, true), 1);
    assert_eq!(license_term_years(20, false), 3);
    assert_eq!(license_term_years(21, false), 5);
    assert_eq!(license_term_years(46, false), 5);
    assert_eq!(license_term_years(47, false), 4);
    assert_eq!(license_term_years(60, false), 4);
    assert_eq!(license_term_years(61, false), 3);
    assert_eq!(license_term_years(70, false), 3);
    assert_eq!(license_term_years(71, false), 1);
    assert_eq!(license_term_years(75, true), 1);
}

#[test]
fn age_counts_completed_years_only() {
    let birth = date(1990, 3, 15);
    assert_eq!(age_on(birth, date(2025, 3, 14)), 34);
    assert_eq!(age_on(birth, date(2025, 3, 15)), 35);
    assert_eq!(age_on(birth, date(2025, 6, 2)), 35);
}

#[test]
fn expiration_snaps_to_the_birthday_after_the_term() {
    let expires = license_expiration(date(1990, 3, 15), date(2024, 1, 10), 5);
    assert_eq!(expires, date(2029, 3, 15));
}

#[test]
fn expiration_pushes_a_year_when_the_snapped_date_does_not_clear_issue() {
    // Zero-term horizon lands on the issue date itself.
    let expires = license_expiration(date(1990, 3, 15), date(2024, 3, 15), 0);
    assert_eq!(expires, date(2025, 3, 15));
}

#[test]
fn leap_day_birthday_snaps_to_feb_28() {
    let expires = license_expiration(date(1992, 2, 29), date(2024, 1, 10), 1);
    assert_eq!(expires, date(2025, 2, 28));
}

#[test]
fn feb_29_birthday_keeps_its_day_in_leap_years() {
    let expires = license_expiration(date(1992, 2, 29), date(2027, 1, 10), 1);
    assert_eq!(expires, date(2028, 2, 29));
}

#[test]
fn exam_window_shorter_than_medical_window() {
    assert!(Months::new(6) == EXAM_RESULT_WINDOW);
    assert!(Months::new(12) == MEDICAL_FITNESS_WINDOW);
}
