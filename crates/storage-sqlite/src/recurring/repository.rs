use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, warn};
use std::sync::Arc;
use uuid::Uuid;

use accountant_core::errors::{Error, Result};
use accountant_core::recurring::{
    materialize, NewRecurringSchedule, RecurringRepositoryTrait, RecurringSchedule,
    RecurringScheduleList, RecurringScheduleUpdate, RecurringTriggerResult, TransactionInstance,
};
use accountant_core::transactions::{ledger, Transaction, TransactionType};
use accountant_core::utils::time_utils::{format_date, format_utc_millis};

use super::model::RecurringConfigDB;
use crate::db::{get_connection, with_savepoint, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{recurring_configs, transactions};
use crate::transactions::{find_live_transaction, TransactionDB, WalletBalances};

fn instance_record(instance: &TransactionInstance, now: DateTime<Utc>) -> Transaction {
    Transaction {
        id: instance.id.clone(),
        user_id: instance.user_id.clone(),
        wallet_id: instance.wallet_id.clone(),
        category_id: instance.category_id.clone(),
        payment_method_id: instance.payment_method_id.clone(),
        amount: instance.amount,
        title: instance.title.clone(),
        notes: instance.notes.clone(),
        date: instance.date.and_time(NaiveTime::MIN).and_utc(),
        is_income: instance.is_income,
        transaction_type: TransactionType::RecurringInstance,
        special_type: 0,
        is_paid: true,
        original_due_date: None,
        skip_paid: false,
        paired_transaction_id: None,
        recurring_config_id: Some(instance.recurring_config_id.clone()),
        receipt_image_url: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

/// Inserts one materialized instance and applies its balance effect.
fn persist_instance(conn: &mut SqliteConnection, instance: &TransactionInstance) -> Result<()> {
    let record = instance_record(instance, Utc::now());
    diesel::insert_into(transactions::table)
        .values(TransactionDB::from(&record))
        .execute(conn)
        .map_err(StorageError::from)?;
    ledger::apply(
        &mut WalletBalances::new(conn, &instance.user_id),
        &instance.balance_effect(),
    )
}

fn load_schedule(
    conn: &mut SqliteConnection,
    user_id: &str,
    schedule_id: &str,
) -> Result<RecurringSchedule> {
    let row = recurring_configs::table
        .filter(recurring_configs::id.eq(schedule_id))
        .filter(recurring_configs::user_id.eq(user_id))
        .select(RecurringConfigDB::as_select())
        .first::<RecurringConfigDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .ok_or_else(|| Error::not_found("Recurring config"))?;
    Ok(RecurringSchedule::try_from(row)?)
}

fn save_schedule(conn: &mut SqliteConnection, schedule: &RecurringSchedule) -> Result<()> {
    diesel::update(recurring_configs::table.find(&schedule.id))
        .set(RecurringConfigDB::from(schedule))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

/// Materializes one due schedule and persists the outcome.
///
/// Instances are written one savepoint at a time. When an instance fails,
/// the ones before it stay committed and the cursor is left on the failed
/// occurrence so a later trigger retries from there.
fn process_schedule(
    conn: &mut SqliteConnection,
    mut schedule: RecurringSchedule,
    today: NaiveDate,
    created_ids: &mut Vec<String>,
) -> Result<()> {
    let was_active = schedule.is_active;
    let base = find_live_transaction(conn, &schedule.user_id, &schedule.base_transaction_id)?;
    let instances = materialize(&mut schedule, base.as_ref(), today)?;

    for instance in &instances {
        if let Err(err) = with_savepoint(conn, |conn| persist_instance(conn, instance)) {
            warn!(
                "Failed to persist occurrence {} of recurring config {}: {}",
                instance.date, schedule.id, err
            );
            schedule.next_occurrence = instance.date;
            schedule.is_active = was_active;
            break;
        }
        created_ids.push(instance.id.clone());
    }

    schedule.updated_at = Utc::now();
    save_schedule(conn, &schedule)
}

pub struct RecurringRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl RecurringRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        RecurringRepository { pool, writer }
    }
}

#[async_trait]
impl RecurringRepositoryTrait for RecurringRepository {
    fn list_schedules(
        &self,
        user_id: &str,
        is_active: Option<bool>,
        skip: i64,
        limit: i64,
    ) -> Result<RecurringScheduleList> {
        let mut conn = get_connection(&self.pool)?;
        let scoped = || {
            let mut query = recurring_configs::table
                .filter(recurring_configs::user_id.eq(user_id))
                .into_boxed();
            if let Some(active) = is_active {
                query = query.filter(recurring_configs::is_active.eq(active));
            }
            query
        };

        let total = scoped()
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        let rows = scoped()
            .order((recurring_configs::next_occurrence.asc(), recurring_configs::id.asc()))
            .offset(skip)
            .limit(limit)
            .select(RecurringConfigDB::as_select())
            .load::<RecurringConfigDB>(&mut conn)
            .map_err(StorageError::from)?;
        let items = rows
            .into_iter()
            .map(RecurringSchedule::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(RecurringScheduleList { items, total })
    }

    fn get_schedule(&self, user_id: &str, schedule_id: &str) -> Result<RecurringSchedule> {
        let mut conn = get_connection(&self.pool)?;
        load_schedule(&mut conn, user_id, schedule_id)
    }

    async fn create_schedule(
        &self,
        user_id: String,
        new_schedule: NewRecurringSchedule,
    ) -> Result<RecurringSchedule> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<RecurringSchedule> {
                let base_id = new_schedule.base_transaction_id.to_string();
                if find_live_transaction(conn, &user_id, &base_id)?.is_none() {
                    return Err(Error::not_found("Base transaction"));
                }

                let now = Utc::now();
                let schedule = RecurringSchedule {
                    id: Uuid::new_v4().to_string(),
                    user_id,
                    base_transaction_id: base_id,
                    period_length: new_schedule.period_length,
                    recurrence_unit: new_schedule.recurrence_unit,
                    start_date: new_schedule.start_date,
                    end_date: new_schedule.end_date,
                    next_occurrence: new_schedule.start_date,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                };
                diesel::insert_into(recurring_configs::table)
                    .values(RecurringConfigDB::from(&schedule))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(schedule)
            })
            .await
    }

    async fn update_schedule(
        &self,
        user_id: String,
        schedule_id: String,
        update: RecurringScheduleUpdate,
    ) -> Result<RecurringSchedule> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<RecurringSchedule> {
                let mut schedule = load_schedule(conn, &user_id, &schedule_id)?;
                update.apply_to(&mut schedule)?;
                schedule.updated_at = Utc::now();
                save_schedule(conn, &schedule)?;
                Ok(schedule)
            })
            .await
    }

    async fn delete_schedule(&self, user_id: String, schedule_id: String) -> Result<()> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::update(
                    transactions::table
                        .filter(transactions::user_id.eq(&user_id))
                        .filter(transactions::recurring_config_id.eq(&schedule_id)),
                )
                .set((
                    transactions::recurring_config_id.eq(None::<String>),
                    transactions::updated_at.eq(format_utc_millis(&Utc::now())),
                ))
                .execute(conn)
                .map_err(StorageError::from)?;

                let deleted = diesel::delete(
                    recurring_configs::table
                        .filter(recurring_configs::id.eq(&schedule_id))
                        .filter(recurring_configs::user_id.eq(&user_id)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                if deleted == 0 {
                    return Err(Error::not_found("Recurring config"));
                }
                Ok(())
            })
            .await
    }

    async fn materialize_due(
        &self,
        user_id: String,
        today: NaiveDate,
    ) -> Result<RecurringTriggerResult> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<RecurringTriggerResult> {
                let due = recurring_configs::table
                    .filter(recurring_configs::user_id.eq(&user_id))
                    .filter(recurring_configs::is_active.eq(true))
                    .filter(recurring_configs::next_occurrence.le(format_date(&today)))
                    .order(recurring_configs::next_occurrence.asc())
                    .select(RecurringConfigDB::as_select())
                    .load::<RecurringConfigDB>(conn)
                    .map_err(StorageError::from)?;

                let mut result = RecurringTriggerResult {
                    processed_count: due.len(),
                    ..Default::default()
                };
                for row in due {
                    let schedule_id = row.id.clone();
                    let outcome = RecurringSchedule::try_from(row)
                        .map_err(Error::from)
                        .and_then(|schedule| {
                            process_schedule(conn, schedule, today, &mut result.created_transaction_ids)
                        });
                    if let Err(err) = outcome {
                        warn!("Skipping recurring config {}: {}", schedule_id, err);
                    }
                }
                debug!(
                    "Materialized {} instances across {} schedules for user {}",
                    result.created_transaction_ids.len(),
                    result.processed_count,
                    user_id
                );
                Ok(result)
            })
            .await
    }
}
