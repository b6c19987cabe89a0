//! Loan date rules. Pure functions, no storage access.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::{
    error::{AppError, AppResult},
    models::LoanState,
};

/// Longest due-soon window accepted by [`due_window_end`]
pub const MAX_DUE_WINDOW_DAYS: i64 = 365;

/// The date a loan is measured against: the return date once returned,
/// otherwise today.
fn reference_date(actual_return: Option<DateTime<Utc>>, today: NaiveDate) -> NaiveDate {
    actual_return.map_or(today, |at| at.date_naive())
}

/// A loan is overdue when its reference date lies after the expected return date.
pub fn is_overdue(
    expected_return: NaiveDate,
    actual_return: Option<DateTime<Utc>>,
    today: NaiveDate,
) -> bool {
    reference_date(actual_return, today) > expected_return
}

/// Whole days past the expected return date, 0 when not overdue
pub fn overdue_days(
    expected_return: NaiveDate,
    actual_return: Option<DateTime<Utc>>,
    today: NaiveDate,
) -> i64 {
    (reference_date(actual_return, today) - expected_return)
        .num_days()
        .max(0)
}

pub fn can_renew(
    expected_return: NaiveDate,
    actual_return: Option<DateTime<Utc>>,
    state: LoanState,
    today: NaiveDate,
) -> bool {
    state == LoanState::Active && !is_overdue(expected_return, actual_return, today)
}

/// Expected return dates may be today but never in the past
pub fn validate_expected_return(expected_return: NaiveDate, today: NaiveDate) -> AppResult<()> {
    if expected_return < today {
        return Err(AppError::Validation(format!(
            "Expected return date {} is in the past",
            expected_return
        )));
    }
    Ok(())
}

pub fn validate_return_time(loaned_at: DateTime<Utc>, returned_at: DateTime<Utc>) -> AppResult<()> {
    if returned_at < loaned_at {
        return Err(AppError::Validation(format!(
            "Return time {} precedes the loan time {}",
            returned_at, loaned_at
        )));
    }
    Ok(())
}

/// Last expected return date included in a due-soon window of `days`
pub fn due_window_end(today: NaiveDate, days: i64) -> AppResult<NaiveDate> {
    if !(0..=MAX_DUE_WINDOW_DAYS).contains(&days) {
        return Err(AppError::Validation(format!(
            "days must be between 0 and {}",
            MAX_DUE_WINDOW_DAYS
        )));
    }
    Ok(today + Duration::days(days))
}
