//! Drink order scheduler.
//!
//! Orders compete for a small pool of workers by priority score. A periodic
//! reconciliation loop repairs inconsistent state, promotes finished orders
//! and assigns new ones. A simulator generates synthetic morning rushes and
//! replays them through an adaptive dispatch policy, and the quality module
//! reports wait-time KPIs over completed orders.
//!
//! The crate ships a `brew-scheduler` binary; the library surface exists for
//! integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod priority;
pub mod quality;
pub mod scheduler;
pub mod seed;
pub mod service;
pub mod simulation;
pub mod state;
pub mod store;
