//! SQLite persistence for the accountant service.
//!
//! Reads go through the r2d2 pool; every write is funneled through the
//! single writer thread in [`db::write_actor`].

pub mod db;
pub mod errors;
pub mod recurring;
pub mod schema;
pub mod sync;
pub mod transactions;

#[cfg(test)]
mod test_support;

pub use db::{create_pool, get_connection, init, run_migrations, spawn_writer, DbPool, WriteHandle};
pub use errors::StorageError;
pub use recurring::RecurringRepository;
pub use sync::SyncRepository;
pub use transactions::TransactionRepository;
