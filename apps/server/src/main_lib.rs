//! Application state wiring: storage, repositories and services.

use std::sync::Arc;
use tracing::info;

use accountant_core::errors::Result;
use accountant_core::recurring::{RecurringService, RecurringServiceTrait};
use accountant_core::sync::{SyncService, SyncServiceTrait};
use accountant_core::transactions::{TransactionService, TransactionServiceTrait};
use accountant_core::utils::time_utils::{Clock, SystemClock};
use accountant_storage_sqlite::{
    create_pool, init, run_migrations, spawn_writer, RecurringRepository, SyncRepository,
    TransactionRepository,
};

use crate::auth::JwtVerifier;
use crate::config::Config;

pub struct AppState {
    pub jwt: JwtVerifier,
    pub transaction_service: Arc<dyn TransactionServiceTrait>,
    pub recurring_service: Arc<dyn RecurringServiceTrait>,
    pub sync_service: Arc<dyn SyncServiceTrait>,
}

pub fn build_state(config: &Config) -> Result<Arc<AppState>> {
    build_state_with_clock(config, Arc::new(SystemClock))
}

/// Opens (and migrates) the database under `config.data_dir` and wires the
/// services against `clock`.
pub fn build_state_with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Arc<AppState>> {
    let db_path = init(&config.data_dir.to_string_lossy())?;
    run_migrations(&db_path)?;
    let pool = create_pool(&db_path)?;
    let writer = spawn_writer(pool.as_ref().clone());
    info!("Database ready at {}", db_path);

    let transaction_repository = Arc::new(TransactionRepository::new(pool.clone(), writer.clone()));
    let recurring_repository = Arc::new(RecurringRepository::new(pool.clone(), writer.clone()));
    let sync_repository = Arc::new(SyncRepository::new(pool, writer));

    Ok(Arc::new(AppState {
        jwt: JwtVerifier::new(&config.jwt_secret, config.jwt_algorithm),
        transaction_service: Arc::new(TransactionService::new(transaction_repository.clone())),
        recurring_service: Arc::new(RecurringService::new(
            recurring_repository,
            transaction_repository,
            clock.clone(),
        )),
        sync_service: Arc::new(SyncService::new(sync_repository, clock)),
    }))
}
