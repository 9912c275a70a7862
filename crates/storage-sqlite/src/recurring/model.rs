use diesel::prelude::*;

use accountant_core::recurring::{RecurrenceUnit, RecurringSchedule};
use accountant_core::utils::time_utils::{format_date, format_utc_millis, parse_date};
use chrono::NaiveDate;

use crate::errors::StorageError;
use crate::transactions::timestamp_from_db;

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::recurring_configs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct RecurringConfigDB {
    pub id: String,
    pub user_id: String,
    pub base_transaction_id: String,
    pub period_length: i32,
    pub reoccurrence: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub next_occurrence: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

fn date_from_db(column: &'static str, value: &str) -> Result<NaiveDate, StorageError> {
    parse_date(value).ok_or_else(|| StorageError::corrupt(column, value))
}

impl TryFrom<RecurringConfigDB> for RecurringSchedule {
    type Error = StorageError;

    fn try_from(db: RecurringConfigDB) -> Result<Self, Self::Error> {
        Ok(RecurringSchedule {
            recurrence_unit: db
                .reoccurrence
                .parse::<RecurrenceUnit>()
                .map_err(|_| StorageError::corrupt("reoccurrence", db.reoccurrence.clone()))?,
            start_date: date_from_db("start_date", &db.start_date)?,
            end_date: db
                .end_date
                .as_deref()
                .map(|raw| date_from_db("end_date", raw))
                .transpose()?,
            next_occurrence: date_from_db("next_occurrence", &db.next_occurrence)?,
            created_at: timestamp_from_db("created_at", &db.created_at)?,
            updated_at: timestamp_from_db("updated_at", &db.updated_at)?,
            id: db.id,
            user_id: db.user_id,
            base_transaction_id: db.base_transaction_id,
            period_length: db.period_length,
            is_active: db.is_active,
        })
    }
}

impl From<&RecurringSchedule> for RecurringConfigDB {
    fn from(schedule: &RecurringSchedule) -> Self {
        RecurringConfigDB {
            id: schedule.id.clone(),
            user_id: schedule.user_id.clone(),
            base_transaction_id: schedule.base_transaction_id.clone(),
            period_length: schedule.period_length,
            reoccurrence: schedule.recurrence_unit.as_str().to_string(),
            start_date: format_date(&schedule.start_date),
            end_date: schedule.end_date.as_ref().map(format_date),
            next_occurrence: format_date(&schedule.next_occurrence),
            is_active: schedule.is_active,
            created_at: format_utc_millis(&schedule.created_at),
            updated_at: format_utc_millis(&schedule.updated_at),
        }
    }
}
