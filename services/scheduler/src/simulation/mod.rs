//! Synthetic workload generation and dispatch simulation.
//!
//! - [`arrivals`]: a morning rush of orders with Poisson arrival gaps
//! - [`dispatch`]: a discrete-event replay of the queue over K worker slots
//!   with a policy that shifts toward short drinks as waits degrade

pub mod arrivals;
pub mod dispatch;

use std::collections::HashMap;

use brew_id::DrinkId;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::model::{Drink, Order, OrderStatus};
use crate::quality::{self, DrinkShare, SlaVerdict};

pub use arrivals::ArrivalWindow;
pub use dispatch::{Completion, DispatchMode, DispatchRun};

/// Parameters for generated workloads.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Orders generated per run.
    pub total_orders: usize,
    /// Mean arrivals per minute.
    pub lambda: f64,
    /// Start of the arrival window (UTC wall clock).
    pub opening: NaiveTime,
    pub window_minutes: i64,
    /// Probability that a generated customer is loyal.
    pub loyal_rate: f64,
    /// Fixed RNG seed; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            total_orders: 100,
            lambda: 0.60,
            opening: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            window_minutes: 180,
            loyal_rate: 0.30,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// The arrival window on `day`.
    pub fn window_on(&self, day: NaiveDate) -> ArrivalWindow {
        let start = day.and_time(self.opening).and_utc();
        ArrivalWindow::new(start, self.window_minutes)
    }
}

/// Result of [`crate::service::ShopService::run_simulation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub orders_created: usize,
    pub loyal_count: usize,
    pub lambda: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub message: String,
}

/// Result of [`crate::service::ShopService::simulate_dispatch`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchSummary {
    pub processed: usize,
    pub avg_wait_minutes: f64,
    pub verdict: SlaVerdict,
    pub warning_decisions: usize,
    pub critical_decisions: usize,
    /// Orders left WAITING because their drink is not on the menu.
    pub unroutable: usize,
    pub message: String,
}

impl DispatchSummary {
    pub fn from_run(run: &DispatchRun) -> Self {
        let verdict = SlaVerdict::for_avg_wait(run.avg_wait_minutes);
        Self {
            processed: run.completions.len(),
            avg_wait_minutes: run.avg_wait_minutes,
            verdict,
            warning_decisions: run.warning_decisions,
            critical_decisions: run.critical_decisions,
            unroutable: run.unroutable.len(),
            message: format!(
                "Processed {} orders - Avg wait: {:.2} min ({verdict})",
                run.completions.len(),
                run.avg_wait_minutes
            ),
        }
    }
}

/// Composition of the current backlog, whatever the order status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStats {
    pub total_orders: usize,
    pub waiting_orders: usize,
    pub loyal_customers: usize,
    pub drink_distribution: Vec<DrinkShare>,
}

impl SimulationStats {
    pub fn from_orders(orders: &[Order], drinks: &[Drink]) -> Self {
        let menu: HashMap<DrinkId, &Drink> = drinks.iter().map(|d| (d.id, d)).collect();
        let all: Vec<&Order> = orders.iter().collect();
        Self {
            total_orders: orders.len(),
            waiting_orders: orders
                .iter()
                .filter(|o| o.status == OrderStatus::Waiting)
                .count(),
            loyal_customers: orders.iter().filter(|o| o.loyal).count(),
            drink_distribution: quality::drink_distribution(&all, &menu),
        }
    }
}
