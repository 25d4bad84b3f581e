//! Adaptive dispatch simulation.
//!
//! Replays a queue of WAITING orders over `slots` identical workers. Each
//! step takes the slot that frees up first and picks an order among those
//! that have arrived by then:
//!
//! - critical (running average wait >= 9 min): shortest prep time
//! - otherwise: highest throughput-adjusted priority score
//!
//! If nothing has arrived yet the slot idles until the next arrival.

use std::collections::HashMap;

use brew_id::{DrinkId, OrderId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{Drink, Order};
use crate::priority;

/// Dispatch policy tier for one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    Normal,
    Warning,
    Critical,
}

impl DispatchMode {
    pub const WARNING_AVG_WAIT: f64 = 7.5;
    pub const CRITICAL_AVG_WAIT: f64 = 9.0;

    pub fn from_avg_wait(avg_wait: f64) -> Self {
        if avg_wait >= Self::CRITICAL_AVG_WAIT {
            Self::Critical
        } else if avg_wait >= Self::WARNING_AVG_WAIT {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

/// One simulated preparation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub order_id: OrderId,
    /// Index of the worker slot that prepared the order.
    pub slot: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Whole minutes from arrival to completion.
    pub wait_minutes: i64,
    pub mode: DispatchMode,
}

/// Outcome of a dispatch replay.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchRun {
    /// In decision order.
    pub completions: Vec<Completion>,
    pub avg_wait_minutes: f64,
    pub warning_decisions: usize,
    pub critical_decisions: usize,
    /// Orders skipped because their drink is not on the menu.
    pub unroutable: Vec<OrderId>,
}

/// Replay `pending` over `slots` workers that all start free at `opening`.
pub fn dispatch(
    pending: &[Order],
    menu: &HashMap<DrinkId, Drink>,
    slots: usize,
    opening: DateTime<Utc>,
) -> DispatchRun {
    let mut run = DispatchRun::default();
    if slots == 0 {
        warn!(pending = pending.len(), "No worker slots, nothing dispatched");
        return run;
    }

    let mut queue: Vec<(&Order, &Drink)> = Vec::with_capacity(pending.len());
    for order in pending {
        match menu.get(&order.drink_id) {
            Some(drink) => queue.push((order, drink)),
            None => {
                warn!(order_id = %order.id, drink_id = %order.drink_id, "Order references unknown drink");
                run.unroutable.push(order.id);
            }
        }
    }
    queue.sort_by_key(|(order, _)| order.order_time());

    let mut free_at = vec![opening; slots];
    let mut total_wait = 0i64;

    while !queue.is_empty() {
        let (slot, free) = earliest_free(&free_at);
        let mode = DispatchMode::from_avg_wait(run.avg_wait_minutes);
        match mode {
            DispatchMode::Critical => run.critical_decisions += 1,
            DispatchMode::Warning => run.warning_decisions += 1,
            DispatchMode::Normal => {}
        }

        let available: Vec<usize> = (0..queue.len())
            .filter(|&i| queue[i].0.order_time() <= free)
            .collect();
        let pick = if available.is_empty() {
            // Queue is sorted, so the head is the next arrival.
            0
        } else if mode == DispatchMode::Critical {
            shortest_prep(&queue, &available)
        } else {
            best_score(&queue, &available, free, run.avg_wait_minutes)
        };

        let (order, drink) = queue.remove(pick);
        let started_at = order.order_time().max(free);
        let completed_at = started_at + Duration::minutes(i64::from(drink.prep_time_minutes));
        let wait_minutes = (completed_at - order.order_time()).num_minutes();

        free_at[slot] = completed_at;
        total_wait += wait_minutes;
        run.completions.push(Completion {
            order_id: order.id,
            slot,
            started_at,
            completed_at,
            wait_minutes,
            mode,
        });
        run.avg_wait_minutes = total_wait as f64 / run.completions.len() as f64;
    }

    debug!(
        processed = run.completions.len(),
        avg_wait = run.avg_wait_minutes,
        critical = run.critical_decisions,
        warning = run.warning_decisions,
        "Dispatch replay finished"
    );
    run
}

/// First slot with the earliest free time.
fn earliest_free(free_at: &[DateTime<Utc>]) -> (usize, DateTime<Utc>) {
    let mut best = (0, free_at[0]);
    for (i, &t) in free_at.iter().enumerate().skip(1) {
        if t < best.1 {
            best = (i, t);
        }
    }
    best
}

fn shortest_prep(queue: &[(&Order, &Drink)], available: &[usize]) -> usize {
    available
        .iter()
        .copied()
        .min_by_key(|&i| queue[i].1.prep_time_minutes)
        .unwrap_or(0)
}

/// First candidate with the highest throughput-adjusted score.
fn best_score(
    queue: &[(&Order, &Drink)],
    available: &[usize],
    now: DateTime<Utc>,
    avg_wait: f64,
) -> usize {
    let score = |i: usize| {
        let (order, drink) = queue[i];
        priority::score_with_throughput(order, drink, now, avg_wait)
    };

    let mut best = available[0];
    let mut best_score = score(best);
    for &i in &available[1..] {
        let s = score(i);
        if s > best_score {
            best = i;
            best_score = s;
        }
    }
    best
}
