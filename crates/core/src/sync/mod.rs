//! Client replica synchronization: push reconciliation, pull snapshots and
//! per-table version tracking.

pub mod field_catalog;
pub mod reconciler;
mod sync_model;
mod sync_service;
mod sync_traits;

pub use field_catalog::{normalize_row, prepare_fields, FieldValue, Fields, PrepareMode};
pub use reconciler::{reconcile_push, SyncStore};
pub use sync_model::*;
pub use sync_service::SyncService;
pub use sync_traits::{SyncRepositoryTrait, SyncServiceTrait};
