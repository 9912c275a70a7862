use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use super::{
    SyncPullRequest, SyncPullResponse, SyncPushRequest, SyncPushResponse, SyncRepositoryTrait,
    SyncServiceTrait, SyncStatusResponse, SyncTable,
};
use crate::errors::Result;
use crate::utils::time_utils::Clock;

pub struct SyncService {
    repository: Arc<dyn SyncRepositoryTrait>,
    clock: Arc<dyn Clock>,
}

impl SyncService {
    pub fn new(repository: Arc<dyn SyncRepositoryTrait>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }
}

#[async_trait]
impl SyncServiceTrait for SyncService {
    async fn push(&self, user_id: &str, request: SyncPushRequest) -> Result<SyncPushResponse> {
        let table: SyncTable = request.table.parse()?;
        let change_count = request.changes.len();
        let response = self
            .repository
            .push_changes(user_id.to_string(), table, request.changes, self.clock.now())
            .await?;
        info!(
            "Sync push {} for user {}: {} changes, {} accepted, {} conflicts, {} rejected, client v{} -> server v{}",
            table,
            user_id,
            change_count,
            response.accepted.len(),
            response.conflicts.len(),
            response.rejected.len(),
            request.client_version,
            response.server_version
        );
        Ok(response)
    }

    /// `since_version` is accepted for compatibility; the full snapshot is
    /// always returned.
    fn pull(&self, user_id: &str, request: SyncPullRequest) -> Result<SyncPullResponse> {
        let table: SyncTable = request.table.parse()?;
        let response = self.repository.pull_snapshot(user_id, table)?;
        debug!(
            "Sync pull {} for user {} since v{}: {} rows at v{}",
            table,
            user_id,
            request.since_version,
            response.changes.len(),
            response.server_version
        );
        Ok(response)
    }

    fn status(&self, user_id: &str) -> Result<SyncStatusResponse> {
        let mut status = SyncStatusResponse::default();
        for table in SyncTable::ALL {
            let table_status = self.repository.table_status(user_id, table)?;
            status.tables.insert(table.as_str().to_string(), table_status);
        }
        Ok(status)
    }
}
