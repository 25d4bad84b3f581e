//! Scheduler module for order assignment.
//!
//! The scheduler is responsible for:
//! - Repairing capacity and assignment invariants left by crashes or bad writes
//! - Promoting finished orders to READY_TO_PICKUP
//! - Rescoring waiting orders and assigning the best ones to free workers

mod counters;
mod reconciler;
mod worker;

pub use counters::{SchedulerCounters, SchedulerSnapshot};
pub use reconciler::{ReconcileStats, SchedulerReconciler};
pub use worker::SchedulerWorker;
