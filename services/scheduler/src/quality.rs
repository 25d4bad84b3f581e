//! Quality-of-service analysis over completed orders.
//!
//! Everything here is a pure function of the records passed in. Waits are
//! whole minutes from arrival to completion.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use brew_id::{DrinkId, WorkerId};
use chrono::{Duration, NaiveTime, Timelike};
use serde::Serialize;

use crate::model::{Drink, Order, Worker, HARD_DEADLINE_MINUTES};
use crate::scheduler::SchedulerSnapshot;

/// Mean wait at or above this fails the SLA.
pub const SLA_MAX_AVG_WAIT: f64 = 10.0;

/// Weight of a loyal customer's wait in the weighted mean.
pub const LOYAL_WEIGHT: f64 = 1.5;

/// Skipped more often than this counts as starvation.
pub const STARVATION_SKIPS: u32 = 3;

const SLOT_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaVerdict {
    Passed,
    Failed,
}

impl SlaVerdict {
    pub fn for_avg_wait(avg_wait: f64) -> Self {
        if avg_wait < SLA_MAX_AVG_WAIT {
            Self::Passed
        } else {
            Self::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SlaVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    NoData,
    /// At least one order exceeded the hard deadline.
    Warning,
    Passed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrinkShare {
    pub drink_id: DrinkId,
    pub name: String,
    pub count: usize,
    pub percent: f64,
    pub prep_time_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerPerformance {
    pub worker_id: WorkerId,
    pub name: String,
    pub orders_completed: usize,
    pub avg_wait_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSlotPerformance {
    /// `HH:MM-HH:MM` bucket of order time.
    pub slot: String,
    pub arrivals: usize,
    pub completions: usize,
    pub avg_wait_minutes: f64,
    pub max_wait_minutes: i64,
    pub timeout_rate: f64,
    pub fairness_violations: usize,
}

/// Aggregate service-quality report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QosReport {
    /// Completed orders analyzed.
    pub total_orders: usize,
    pub avg_wait_minutes: f64,
    pub weighted_avg_wait_minutes: f64,
    pub max_wait_minutes: i64,
    pub timeout_count: usize,
    /// Percent of completed orders over the hard deadline.
    pub timeout_rate: f64,
    /// Percent of worker capacity spent preparing, capped at 100.
    pub utilization: f64,
    pub fairness_issues: usize,
    pub starvation_count: usize,
    pub fifo_skips: usize,
    pub completion_inversions: usize,
    pub complaints_raised: usize,
    pub violations_count: usize,
    pub validation_status: ValidationStatus,
    /// `None` when there is nothing to judge.
    pub sla_verdict: Option<SlaVerdict>,
    pub sla_failure_reason: Option<String>,
    pub drink_distribution: Vec<DrinkShare>,
    pub worker_performance: Vec<WorkerPerformance>,
    pub time_slots: Vec<TimeSlotPerformance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<SchedulerSnapshot>,
}

/// Analyze the completed subset of `orders`.
pub fn analyze(orders: &[Order], drinks: &[Drink], workers: &[Worker], capacity: usize) -> QosReport {
    let completed: Vec<&Order> = orders.iter().filter(|o| o.completed_time.is_some()).collect();
    let waits: Vec<i64> = completed.iter().map(|o| wait_of(o)).collect();
    let menu: HashMap<DrinkId, &Drink> = drinks.iter().map(|d| (d.id, d)).collect();

    let timeout_count = waits.iter().filter(|&&w| is_timeout(w)).count();
    let avg_wait = mean(&waits);
    let (sla_verdict, sla_failure_reason) = if completed.is_empty() {
        (None, None)
    } else {
        let verdict = SlaVerdict::for_avg_wait(avg_wait);
        let reason = (verdict == SlaVerdict::Failed).then(|| {
            format!("average wait {avg_wait:.2} min is not below {SLA_MAX_AVG_WAIT:.0} min")
        });
        (Some(verdict), reason)
    };
    let validation_status = if completed.is_empty() {
        ValidationStatus::NoData
    } else if timeout_count > 0 {
        ValidationStatus::Warning
    } else {
        ValidationStatus::Passed
    };

    QosReport {
        total_orders: completed.len(),
        avg_wait_minutes: avg_wait,
        weighted_avg_wait_minutes: weighted_mean(&completed),
        max_wait_minutes: waits.iter().copied().max().unwrap_or(0),
        timeout_count,
        timeout_rate: percent(timeout_count, completed.len()),
        utilization: utilization(&completed, &menu, capacity),
        fairness_issues: completed.iter().filter(|o| o.times_skipped > 0).count(),
        starvation_count: completed
            .iter()
            .filter(|o| o.times_skipped > STARVATION_SKIPS)
            .count(),
        fifo_skips: fifo_skips(&completed),
        completion_inversions: completion_inversions(&completed),
        complaints_raised: timeout_count,
        violations_count: timeout_count,
        validation_status,
        sla_verdict,
        sla_failure_reason,
        drink_distribution: drink_distribution(&completed, &menu),
        worker_performance: worker_performance(&completed, workers),
        time_slots: time_slots(&completed),
        scheduler: None,
    }
}

fn wait_of(order: &Order) -> i64 {
    order.wait_minutes().unwrap_or(0)
}

fn is_timeout(wait: i64) -> bool {
    wait > HARD_DEADLINE_MINUTES
}

fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<i64>() as f64 / values.len() as f64
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn weighted_mean(completed: &[&Order]) -> f64 {
    let (total, weight) = completed.iter().fold((0.0, 0.0), |(total, weight), o| {
        let w = if o.loyal { LOYAL_WEIGHT } else { 1.0 };
        (total + wait_of(o) as f64 * w, weight + w)
    });
    if weight > 0.0 {
        total / weight
    } else {
        0.0
    }
}

fn utilization(completed: &[&Order], menu: &HashMap<DrinkId, &Drink>, capacity: usize) -> f64 {
    let earliest = completed.iter().map(|o| o.order_time()).min();
    let latest = completed.iter().filter_map(|o| o.completed_time).max();
    let (Some(earliest), Some(latest)) = (earliest, latest) else {
        return 0.0;
    };
    let span = (latest - earliest).num_minutes();
    if span <= 0 || capacity == 0 {
        return 0.0;
    }

    let prep: u64 = completed
        .iter()
        .filter_map(|o| menu.get(&o.drink_id))
        .map(|d| u64::from(d.prep_time_minutes))
        .sum();
    (prep as f64 / (capacity as f64 * span as f64) * 100.0).min(100.0)
}

/// Positions where arrival order and completion order disagree.
fn fifo_skips(completed: &[&Order]) -> usize {
    let mut by_arrival = completed.to_vec();
    by_arrival.sort_by_key(|o| o.order_time());
    let mut by_completion = completed.to_vec();
    by_completion.sort_by_key(|o| o.completed_time);

    by_arrival
        .iter()
        .zip(&by_completion)
        .filter(|(a, c)| a.id != c.id)
        .count()
}

/// Pairs where the earlier arrival finished strictly later.
fn completion_inversions(completed: &[&Order]) -> usize {
    let mut by_arrival = completed.to_vec();
    by_arrival.sort_by_key(|o| o.order_time());

    let mut inversions = 0;
    for (i, a) in by_arrival.iter().enumerate() {
        for b in &by_arrival[i + 1..] {
            if a.order_time() < b.order_time() && a.completed_time > b.completed_time {
                inversions += 1;
            }
        }
    }
    inversions
}

/// Per-drink counts over `orders`, most ordered first.
pub(crate) fn drink_distribution(
    orders: &[&Order],
    menu: &HashMap<DrinkId, &Drink>,
) -> Vec<DrinkShare> {
    let mut counts: Vec<(DrinkId, usize)> = Vec::new();
    for order in orders {
        match counts.iter_mut().find(|(id, _)| *id == order.drink_id) {
            Some((_, n)) => *n += 1,
            None => counts.push((order.drink_id, 1)),
        }
    }

    let mut shares: Vec<DrinkShare> = counts
        .into_iter()
        .map(|(drink_id, count)| {
            let drink = menu.get(&drink_id);
            DrinkShare {
                drink_id,
                name: drink.map_or_else(|| drink_id.to_string(), |d| d.name.clone()),
                count,
                percent: percent(count, orders.len()),
                prep_time_minutes: drink.map_or(0, |d| d.prep_time_minutes),
            }
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}

fn worker_performance(completed: &[&Order], workers: &[Worker]) -> Vec<WorkerPerformance> {
    workers
        .iter()
        .map(|worker| {
            let waits: Vec<i64> = completed
                .iter()
                .filter(|o| o.assigned_worker == Some(worker.id))
                .map(|o| wait_of(o))
                .collect();
            WorkerPerformance {
                worker_id: worker.id,
                name: worker.name.clone(),
                orders_completed: waits.len(),
                avg_wait_minutes: mean(&waits),
            }
        })
        .collect()
}

fn slot_start(order: &Order) -> NaiveTime {
    let time = order.order_time().time();
    let minute = if time.minute() < SLOT_MINUTES { 0 } else { SLOT_MINUTES };
    NaiveTime::from_hms_opt(time.hour(), minute, 0).unwrap_or(NaiveTime::MIN)
}

fn time_slots(completed: &[&Order]) -> Vec<TimeSlotPerformance> {
    let mut slots: BTreeMap<NaiveTime, Vec<&Order>> = BTreeMap::new();
    for order in completed {
        slots.entry(slot_start(order)).or_default().push(order);
    }

    slots
        .into_iter()
        .map(|(start, orders)| {
            let end = start + Duration::minutes(i64::from(SLOT_MINUTES));
            let waits: Vec<i64> = orders.iter().map(|o| wait_of(o)).collect();
            let timeouts = waits.iter().filter(|&&w| is_timeout(w)).count();
            TimeSlotPerformance {
                slot: format!("{}-{}", start.format("%H:%M"), end.format("%H:%M")),
                arrivals: orders.len(),
                completions: orders.len(),
                avg_wait_minutes: mean(&waits),
                max_wait_minutes: waits.iter().copied().max().unwrap_or(0),
                timeout_rate: percent(timeouts, orders.len()),
                fairness_violations: orders.iter().filter(|o| o.times_skipped > 0).count(),
            }
        })
        .collect()
}
