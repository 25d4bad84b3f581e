//! Running totals across reconciliation cycles.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::reconciler::ReconcileStats;

/// Lock-free counters updated after every tick.
#[derive(Debug, Default)]
pub struct SchedulerCounters {
    ticks_completed: AtomicU64,
    ticks_skipped: AtomicU64,
    ticks_failed: AtomicU64,
    reset_unassigned: AtomicU64,
    reset_missing_eta: AtomicU64,
    reset_over_capacity: AtomicU64,
    reset_double_assigned: AtomicU64,
    orders_ready: AtomicU64,
    orders_assigned: AtomicU64,
    orders_skipped: AtomicU64,
}

/// Point-in-time copy of [`SchedulerCounters`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSnapshot {
    pub ticks_completed: u64,
    /// Ticks dropped because a cycle was already running.
    pub ticks_skipped: u64,
    /// Ticks aborted by a store error.
    pub ticks_failed: u64,
    /// Repairs by kind, see [`ReconcileStats`].
    pub reset_unassigned: u64,
    pub reset_missing_eta: u64,
    pub reset_over_capacity: u64,
    pub reset_double_assigned: u64,
    pub orders_ready: u64,
    pub orders_assigned: u64,
    pub orders_skipped: u64,
}

impl SchedulerCounters {
    pub fn record_cycle(&self, stats: &ReconcileStats) {
        self.ticks_completed.fetch_add(1, Ordering::Relaxed);
        self.reset_unassigned
            .fetch_add(u64::from(stats.reset_unassigned), Ordering::Relaxed);
        self.reset_missing_eta
            .fetch_add(u64::from(stats.reset_missing_eta), Ordering::Relaxed);
        self.reset_over_capacity
            .fetch_add(u64::from(stats.reset_over_capacity), Ordering::Relaxed);
        self.reset_double_assigned
            .fetch_add(u64::from(stats.reset_double_assigned), Ordering::Relaxed);
        self.orders_ready
            .fetch_add(u64::from(stats.orders_ready), Ordering::Relaxed);
        self.orders_assigned
            .fetch_add(u64::from(stats.orders_assigned), Ordering::Relaxed);
        self.orders_skipped
            .fetch_add(u64::from(stats.orders_skipped), Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.ticks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            ticks_completed: self.ticks_completed.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            ticks_failed: self.ticks_failed.load(Ordering::Relaxed),
            reset_unassigned: self.reset_unassigned.load(Ordering::Relaxed),
            reset_missing_eta: self.reset_missing_eta.load(Ordering::Relaxed),
            reset_over_capacity: self.reset_over_capacity.load(Ordering::Relaxed),
            reset_double_assigned: self.reset_double_assigned.load(Ordering::Relaxed),
            orders_ready: self.orders_ready.load(Ordering::Relaxed),
            orders_assigned: self.orders_assigned.load(Ordering::Relaxed),
            orders_skipped: self.orders_skipped.load(Ordering::Relaxed),
        }
    }
}
