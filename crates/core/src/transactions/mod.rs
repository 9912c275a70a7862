//! Transactions and the wallet balance guard.

pub mod ledger;
mod transactions_model;
mod transactions_service;
mod transactions_traits;

pub use ledger::{BalanceEffect, BalanceStore, LEDGER_SCALE};
pub use transactions_model::*;
pub use transactions_service::{page_bounds, TransactionService, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use transactions_traits::{TransactionRepositoryTrait, TransactionServiceTrait};
