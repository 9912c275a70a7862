use async_trait::async_trait;
use chrono::NaiveDate;

use super::{
    NewRecurringSchedule, RecurringSchedule, RecurringScheduleList, RecurringScheduleUpdate,
    RecurringTriggerResult,
};
use crate::errors::Result;

#[async_trait]
pub trait RecurringRepositoryTrait: Send + Sync {
    fn list_schedules(
        &self,
        user_id: &str,
        is_active: Option<bool>,
        skip: i64,
        limit: i64,
    ) -> Result<RecurringScheduleList>;

    fn get_schedule(&self, user_id: &str, schedule_id: &str) -> Result<RecurringSchedule>;

    /// Inserts a schedule whose cursor starts at `start_date`.
    async fn create_schedule(
        &self,
        user_id: String,
        new_schedule: NewRecurringSchedule,
    ) -> Result<RecurringSchedule>;

    async fn update_schedule(
        &self,
        user_id: String,
        schedule_id: String,
        update: RecurringScheduleUpdate,
    ) -> Result<RecurringSchedule>;

    /// Hard-deletes the schedule. Materialized instances stay, with their
    /// back-reference cleared.
    async fn delete_schedule(&self, user_id: String, schedule_id: String) -> Result<()>;

    /// Materializes every due schedule of `user_id` as of `today`, persisting
    /// each instance with its balance effect and the advanced cursor together.
    async fn materialize_due(&self, user_id: String, today: NaiveDate)
        -> Result<RecurringTriggerResult>;
}

#[async_trait]
pub trait RecurringServiceTrait: Send + Sync {
    fn list_schedules(
        &self,
        user_id: &str,
        is_active: Option<bool>,
        skip: Option<i64>,
        limit: Option<i64>,
    ) -> Result<RecurringScheduleList>;

    fn get_schedule(&self, user_id: &str, schedule_id: &str) -> Result<RecurringSchedule>;

    async fn create_schedule(
        &self,
        user_id: &str,
        new_schedule: NewRecurringSchedule,
    ) -> Result<RecurringSchedule>;

    async fn update_schedule(
        &self,
        user_id: &str,
        schedule_id: &str,
        update: RecurringScheduleUpdate,
    ) -> Result<RecurringSchedule>;

    async fn delete_schedule(&self, user_id: &str, schedule_id: &str) -> Result<()>;

    /// Runs materialization for `user_id` against the service clock.
    async fn trigger(&self, user_id: &str) -> Result<RecurringTriggerResult>;
}
