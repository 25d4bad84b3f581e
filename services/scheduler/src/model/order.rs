//! Drink orders and their lifecycle.

use brew_id::{DrinkId, OrderId, WorkerId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Record, Stateful};

/// Every order must be served within this many minutes of arrival.
pub const HARD_DEADLINE_MINUTES: i64 = 10;

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Queued, competing for a worker by priority score.
    Waiting,
    /// Held by a worker until the estimated completion time passes.
    Preparing,
    /// Done and waiting for the customer.
    ReadyToPickup,
    /// Picked up (or completed by the dispatch simulator).
    Completed,
    /// Terminal; nothing in the scheduler produces it.
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Preparing => "PREPARING",
            Self::ReadyToPickup => "READY_TO_PICKUP",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer's drink order.
///
/// `order_time` and `hard_deadline` are fixed at construction. Status changes
/// go through the transition methods below; the scheduler never edits the
/// status field directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub drink_id: DrinkId,
    pub assigned_worker: Option<WorkerId>,
    pub status: OrderStatus,
    pub priority_score: f64,
    order_time: DateTime<Utc>,
    pub estimated_completion_time: Option<DateTime<Utc>>,
    pub completed_time: Option<DateTime<Utc>>,
    /// Fairness tracking: cycles in which a later arrival was served first.
    pub times_skipped: u32,
    pub loyal: bool,
    hard_deadline: DateTime<Utc>,
}

impl Order {
    /// Create a WAITING order that arrived at `order_time`.
    pub fn new(
        customer_name: impl Into<String>,
        drink_id: DrinkId,
        loyal: bool,
        order_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            customer_name: customer_name.into(),
            drink_id,
            assigned_worker: None,
            status: OrderStatus::Waiting,
            priority_score: 0.0,
            order_time,
            estimated_completion_time: None,
            completed_time: None,
            times_skipped: 0,
            loyal,
            hard_deadline: order_time + Duration::minutes(HARD_DEADLINE_MINUTES),
        }
    }

    pub fn order_time(&self) -> DateTime<Utc> {
        self.order_time
    }

    pub fn hard_deadline(&self) -> DateTime<Utc> {
        self.hard_deadline
    }

    /// Fractional minutes between arrival and `now` (negative before arrival).
    pub fn minutes_waiting(&self, now: DateTime<Utc>) -> f64 {
        (now - self.order_time).num_seconds() as f64 / 60.0
    }

    /// Whole minutes from arrival to completion, if completed.
    pub fn wait_minutes(&self) -> Option<i64> {
        self.completed_time
            .map(|completed| (completed - self.order_time).num_minutes())
    }

    /// WAITING -> PREPARING on `worker`, due at `estimated_completion`.
    pub fn start_preparing(&mut self, worker: WorkerId, estimated_completion: DateTime<Utc>) {
        self.status = OrderStatus::Preparing;
        self.assigned_worker = Some(worker);
        self.estimated_completion_time = Some(estimated_completion);
    }

    /// PREPARING -> READY_TO_PICKUP. The worker reference is kept for reporting.
    pub fn mark_ready(&mut self) {
        self.status = OrderStatus::ReadyToPickup;
    }

    /// -> COMPLETED at `at`.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = OrderStatus::Completed;
        self.completed_time = Some(at);
    }

    /// Repair path: back to WAITING with no worker and no estimate.
    pub fn reset_to_waiting(&mut self) {
        self.status = OrderStatus::Waiting;
        self.assigned_worker = None;
        self.estimated_completion_time = None;
    }
}

impl Record for Order {
    type Id = OrderId;

    fn id(&self) -> OrderId {
        self.id
    }
}

impl Stateful for Order {
    type Status = OrderStatus;

    fn status(&self) -> OrderStatus {
        self.status
    }
}
