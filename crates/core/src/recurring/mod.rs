pub mod materializer;
pub mod occurrence;
mod recurring_model;
mod recurring_service;
mod recurring_traits;

pub use materializer::materialize;
pub use occurrence::advance;
pub use recurring_model::*;
pub(crate) use recurring_model::validate_window;
pub use recurring_service::RecurringService;
pub use recurring_traits::{RecurringRepositoryTrait, RecurringServiceTrait};
