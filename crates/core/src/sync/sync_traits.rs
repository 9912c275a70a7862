use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    SyncChange, SyncPullResponse, SyncPushRequest, SyncPullRequest, SyncPushResponse,
    SyncStatusResponse, SyncTable, SyncTableStatus,
};
use crate::errors::Result;

#[async_trait]
pub trait SyncRepositoryTrait: Send + Sync {
    /// Reconciles a batch against `table` as one unit of work.
    async fn push_changes(
        &self,
        user_id: String,
        table: SyncTable,
        changes: Vec<SyncChange>,
        now: DateTime<Utc>,
    ) -> Result<SyncPushResponse>;

    /// Full snapshot of the user's rows, soft-deleted ones included.
    fn pull_snapshot(&self, user_id: &str, table: SyncTable) -> Result<SyncPullResponse>;

    fn table_status(&self, user_id: &str, table: SyncTable) -> Result<SyncTableStatus>;
}

#[async_trait]
pub trait SyncServiceTrait: Send + Sync {
    async fn push(&self, user_id: &str, request: SyncPushRequest) -> Result<SyncPushResponse>;

    fn pull(&self, user_id: &str, request: SyncPullRequest) -> Result<SyncPullResponse>;

    fn status(&self, user_id: &str) -> Result<SyncStatusResponse>;
}
