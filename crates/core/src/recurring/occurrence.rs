//! Date arithmetic for recurring schedules.

use chrono::{Days, Months, NaiveDate};

use super::RecurrenceUnit;
use crate::errors::{Result, ValidationError};

/// Returns the cursor date one period after `cursor`.
///
/// Month and year steps land on the same day-of-month when it exists and on
/// the last day of the target month otherwise (Jan 31 + 1 month is Feb 28 or
/// 29, Feb 29 + 1 year is Feb 28 in a common year). A `period_length` below 1
/// is rejected since it would never move the cursor.
pub fn advance(cursor: NaiveDate, period_length: i32, unit: RecurrenceUnit) -> Result<NaiveDate> {
    let steps = u32::try_from(period_length)
        .ok()
        .filter(|steps| *steps > 0)
        .ok_or_else(|| ValidationError::invalid_field("period_length", "must be at least 1"))?;

    let next = match unit {
        RecurrenceUnit::Daily => cursor.checked_add_days(Days::new(u64::from(steps))),
        RecurrenceUnit::Weekly => cursor.checked_add_days(Days::new(u64::from(steps) * 7)),
        RecurrenceUnit::Monthly => cursor.checked_add_months(Months::new(steps)),
        RecurrenceUnit::Yearly => steps
            .checked_mul(12)
            .and_then(|months| cursor.checked_add_months(Months::new(months))),
    };

    next.ok_or_else(|| {
        ValidationError::invalid_field(
            "period_length",
            format!(
                "advancing {} by {} {} leaves the supported date range",
                cursor,
                period_length,
                unit.as_str()
            ),
        )
        .into()
    })
}
