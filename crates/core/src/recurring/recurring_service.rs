use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use super::{
    NewRecurringSchedule, RecurringRepositoryTrait, RecurringSchedule, RecurringScheduleList,
    RecurringScheduleUpdate, RecurringServiceTrait, RecurringTriggerResult,
};
use crate::errors::{Error, Result};
use crate::transactions::{page_bounds, TransactionRepositoryTrait};
use crate::utils::time_utils::Clock;

pub struct RecurringService {
    repository: Arc<dyn RecurringRepositoryTrait>,
    transaction_repository: Arc<dyn TransactionRepositoryTrait>,
    clock: Arc<dyn Clock>,
}

impl RecurringService {
    pub fn new(
        repository: Arc<dyn RecurringRepositoryTrait>,
        transaction_repository: Arc<dyn TransactionRepositoryTrait>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            transaction_repository,
            clock,
        }
    }
}

#[async_trait]
impl RecurringServiceTrait for RecurringService {
    fn list_schedules(
        &self,
        user_id: &str,
        is_active: Option<bool>,
        skip: Option<i64>,
        limit: Option<i64>,
    ) -> Result<RecurringScheduleList> {
        let (skip, limit) = page_bounds(skip, limit)?;
        self.repository
            .list_schedules(user_id, is_active, skip, limit)
    }

    fn get_schedule(&self, user_id: &str, schedule_id: &str) -> Result<RecurringSchedule> {
        self.repository.get_schedule(user_id, schedule_id)
    }

    async fn create_schedule(
        &self,
        user_id: &str,
        new_schedule: NewRecurringSchedule,
    ) -> Result<RecurringSchedule> {
        new_schedule.validate()?;

        let base_id = new_schedule.base_transaction_id.to_string();
        self.transaction_repository
            .get_transaction(user_id, &base_id)
            .map_err(|err| {
                if err.is_not_found() {
                    Error::not_found("Base transaction")
                } else {
                    err
                }
            })?;

        debug!(
            "Creating recurring schedule for base transaction {} (every {} {})",
            base_id,
            new_schedule.period_length,
            new_schedule.recurrence_unit.as_str()
        );
        self.repository
            .create_schedule(user_id.to_string(), new_schedule)
            .await
    }

    async fn update_schedule(
        &self,
        user_id: &str,
        schedule_id: &str,
        update: RecurringScheduleUpdate,
    ) -> Result<RecurringSchedule> {
        update.validate()?;
        self.repository
            .update_schedule(user_id.to_string(), schedule_id.to_string(), update)
            .await
    }

    async fn delete_schedule(&self, user_id: &str, schedule_id: &str) -> Result<()> {
        self.repository
            .delete_schedule(user_id.to_string(), schedule_id.to_string())
            .await
    }

    async fn trigger(&self, user_id: &str) -> Result<RecurringTriggerResult> {
        let today = self.clock.today();
        let result = self
            .repository
            .materialize_due(user_id.to_string(), today)
            .await?;
        info!(
            "Recurring trigger for user {} as of {}: {} schedules processed, {} instances created",
            user_id,
            today,
            result.processed_count,
            result.created_transaction_ids.len()
        );
        Ok(result)
    }
}
