//! Scheduler records: orders, workers, and the drink menu.

mod drink;
mod order;
mod worker;

pub use drink::Drink;
pub use order::{Order, OrderStatus, HARD_DEADLINE_MINUTES};
pub use worker::{Worker, WorkerStatus};
