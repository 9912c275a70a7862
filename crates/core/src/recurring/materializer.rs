//! Turns due occurrences of a schedule into transaction instances.

use chrono::NaiveDate;
use log::{debug, warn};

use super::occurrence::advance;
use super::{RecurringSchedule, TransactionInstance};
use crate::errors::Result;
use crate::transactions::Transaction;

/// Materializes every occurrence of `schedule` due on or before `today`.
///
/// The schedule is mutated in place: its cursor ends past `today` (or past
/// its end date) and it is deactivated when it runs past `end_date` or when
/// the base transaction is missing or soft-deleted. Deactivation is terminal
/// and not an error. An inactive schedule produces nothing.
///
/// The loop terminates because every iteration moves the cursor forward by at
/// least one day and stops once it passes `today`.
pub fn materialize(
    schedule: &mut RecurringSchedule,
    base: Option<&Transaction>,
    today: NaiveDate,
) -> Result<Vec<TransactionInstance>> {
    let mut instances = Vec::new();

    while schedule.is_active && schedule.next_occurrence <= today {
        if schedule
            .end_date
            .is_some_and(|end_date| schedule.next_occurrence > end_date)
        {
            debug!(
                "Recurring schedule {} passed its end date; deactivating",
                schedule.id
            );
            schedule.is_active = false;
            break;
        }

        let Some(base) = base.filter(|base| !base.is_deleted()) else {
            warn!(
                "Base transaction {} for recurring schedule {} is gone; deactivating",
                schedule.base_transaction_id, schedule.id
            );
            schedule.is_active = false;
            break;
        };

        instances.push(TransactionInstance::from_base(
            base,
            schedule,
            schedule.next_occurrence,
        ));
        schedule.next_occurrence = advance(
            schedule.next_occurrence,
            schedule.period_length,
            schedule.recurrence_unit,
        )?;
    }

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurring::RecurrenceUnit;
    use crate::transactions::TransactionType;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule(
        start: NaiveDate,
        unit: RecurrenceUnit,
        period_length: i32,
        end_date: Option<NaiveDate>,
    ) -> RecurringSchedule {
        let now = Utc::now();
        RecurringSchedule {
            id: "sched-1".into(),
            user_id: "user-1".into(),
            base_transaction_id: "tx-base".into(),
            period_length,
            recurrence_unit: unit,
            start_date: start,
            end_date,
            next_occurrence: start,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn base_transaction() -> Transaction {
        let now = Utc::now();
        Transaction {
            id: "tx-base".into(),
            user_id: "user-1".into(),
            wallet_id: "wallet-1".into(),
            category_id: Some("cat-rent".into()),
            payment_method_id: None,
            amount: dec!(1200.00),
            title: "Rent".into(),
            notes: Some("apartment".into()),
            date: now,
            is_income: false,
            transaction_type: TransactionType::Regular,
            special_type: 0,
            is_paid: true,
            original_due_date: None,
            skip_paid: false,
            paired_transaction_id: None,
            recurring_config_id: None,
            receipt_image_url: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn monthly_catch_up_produces_each_due_month() {
        let mut sched = schedule(date(2024, 1, 1), RecurrenceUnit::Monthly, 1, None);
        let base = base_transaction();

        let instances = materialize(&mut sched, Some(&base), date(2024, 3, 15)).unwrap();

        let dates: Vec<_> = instances.iter().map(|i| i.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1)]);
        assert_eq!(sched.next_occurrence, date(2024, 4, 1));
        assert!(sched.is_active);
    }

    #[test]
    fn instances_copy_financial_fields_and_link_schedule() {
        let mut sched = schedule(date(2024, 1, 1), RecurrenceUnit::Daily, 1, None);
        let base = base_transaction();

        let instances = materialize(&mut sched, Some(&base), date(2024, 1, 1)).unwrap();
        let instance = &instances[0];

        assert_eq!(instance.wallet_id, base.wallet_id);
        assert_eq!(instance.category_id, base.category_id);
        assert_eq!(instance.amount, base.amount);
        assert_eq!(instance.title, base.title);
        assert_eq!(instance.notes, base.notes);
        assert_eq!(instance.is_income, base.is_income);
        assert_eq!(instance.recurring_config_id, sched.id);
        assert_eq!(instance.transaction_type(), TransactionType::RecurringInstance);
        assert_ne!(instance.id, base.id);
    }

    #[test]
    fn second_run_with_same_today_creates_nothing() {
        let mut sched = schedule(date(2024, 1, 1), RecurrenceUnit::Weekly, 1, None);
        let base = base_transaction();
        let today = date(2024, 1, 20);

        let first = materialize(&mut sched, Some(&base), today).unwrap();
        let second = materialize(&mut sched, Some(&base), today).unwrap();

        assert_eq!(first.len(), 3);
        assert!(second.is_empty());
    }

    #[test]
    fn cursor_equal_to_end_date_still_produces_final_instance() {
        let end = date(2024, 3, 1);
        let mut sched = schedule(date(2024, 1, 1), RecurrenceUnit::Monthly, 1, Some(end));
        let base = base_transaction();

        let instances = materialize(&mut sched, Some(&base), date(2024, 6, 1)).unwrap();

        assert_eq!(instances.len(), 3);
        assert_eq!(instances.last().map(|i| i.date), Some(end));
        assert!(!sched.is_active);
        assert_eq!(sched.next_occurrence, date(2024, 4, 1));
    }

    #[test]
    fn cursor_past_end_date_deactivates_without_instances() {
        let mut sched = schedule(date(2024, 1, 1), RecurrenceUnit::Monthly, 1, Some(date(2024, 1, 31)));
        sched.next_occurrence = date(2024, 2, 1);
        let base = base_transaction();

        let instances = materialize(&mut sched, Some(&base), date(2024, 3, 1)).unwrap();

        assert!(instances.is_empty());
        assert!(!sched.is_active);
        assert_eq!(sched.next_occurrence, date(2024, 2, 1));
    }

    #[test]
    fn deleted_or_missing_base_deactivates() {
        let mut base = base_transaction();
        base.deleted_at = Some(Utc::now());

        let mut sched = schedule(date(2024, 1, 1), RecurrenceUnit::Daily, 1, None);
        assert!(materialize(&mut sched, Some(&base), date(2024, 1, 5)).unwrap().is_empty());
        assert!(!sched.is_active);

        let mut sched = schedule(date(2024, 1, 1), RecurrenceUnit::Daily, 1, None);
        assert!(materialize(&mut sched, None, date(2024, 1, 5)).unwrap().is_empty());
        assert!(!sched.is_active);
    }

    #[test]
    fn inactive_or_future_schedules_are_untouched() {
        let base = base_transaction();
        let mut inactive = schedule(date(2024, 1, 1), RecurrenceUnit::Daily, 1, None);
        inactive.is_active = false;
        assert!(materialize(&mut inactive, Some(&base), date(2024, 2, 1)).unwrap().is_empty());
        assert_eq!(inactive.next_occurrence, date(2024, 1, 1));

        let mut future = schedule(date(2024, 5, 1), RecurrenceUnit::Daily, 1, None);
        assert!(materialize(&mut future, None, date(2024, 4, 30)).unwrap().is_empty());
        assert!(future.is_active);
    }

    #[test]
    fn long_catch_up_is_bounded_by_today() {
        let mut sched = schedule(date(2020, 1, 1), RecurrenceUnit::Daily, 1, None);
        let base = base_transaction();
        let today = date(2020, 12, 31);

        let instances = materialize(&mut sched, Some(&base), today).unwrap();

        assert_eq!(instances.len(), 366);
        assert!(instances.iter().all(|i| i.date <= today));
        assert_eq!(sched.next_occurrence, date(2021, 1, 1));
    }

    #[test]
    fn corrupt_zero_period_surfaces_an_error() {
        let mut sched = schedule(date(2024, 1, 1), RecurrenceUnit::Daily, 0, None);
        let base = base_transaction();
        assert!(materialize(&mut sched, Some(&base), date(2024, 1, 3)).is_err());
    }
}
