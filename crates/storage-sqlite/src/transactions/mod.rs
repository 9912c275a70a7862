mod model;
mod repository;

pub use model::{TransactionDB, WalletBalanceDB};
pub(crate) use model::{decimal_from_db, optional_timestamp_from_db, timestamp_from_db};
pub use repository::{ensure_wallet, find_live_transaction, TransactionRepository, WalletBalances};
