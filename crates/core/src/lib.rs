//! Domain core of the accountant service: recurring schedules, the wallet
//! balance ledger and the client sync protocol.

pub mod errors;
pub mod recurring;
pub mod sync;
pub mod transactions;
pub mod utils;

pub use errors::{Error, Result};
