mod model;
mod repository;

pub use model::RecurringConfigDB;
pub use repository::RecurringRepository;
