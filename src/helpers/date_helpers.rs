use chrono::{Duration, NaiveDate};

use crate::processor::ScorecardError;

/// Resolves a trailing window of `days` (negative) ending before `today`.
///
/// The current day is excluded since its data is still incomplete, so the
/// returned range is `[today + days, today - 1]`, inclusive on both ends.
pub fn trailing_window(
    today: NaiveDate,
    days: i64,
) -> Result<(NaiveDate, NaiveDate), ScorecardError> {
    if days >= 0 {
        return Err(ScorecardError::InvalidSelection(format!(
            "date window must be a negative offset (got {days})"
        )));
    }

    let out_of_range =
        || ScorecardError::InvalidSelection(format!("date window {days} is out of range"));
    let start = today
        .checked_add_signed(Duration::days(days))
        .ok_or_else(out_of_range)?;
    let end = today
        .checked_sub_signed(Duration::days(1))
        .ok_or_else(out_of_range)?;

    Ok((start, end))
}
