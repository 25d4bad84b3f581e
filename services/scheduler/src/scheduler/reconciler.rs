//! Scheduler reconciler for order assignment.
//!
//! One reconciliation cycle runs four phases in order:
//! 1. Repair: reset PREPARING orders that violate the capacity and
//!    assignment invariants, then zero every active worker's load.
//! 2. Ready-check: PREPARING orders past their estimated completion become
//!    READY_TO_PICKUP.
//! 3. Rescore: recompute the priority score of every WAITING order.
//! 4. Assign: pair the highest-scoring WAITING orders with free workers.
//!
//! Any store error aborts the rest of the cycle. The next cycle's repair
//! phase fixes whatever a partial cycle left behind, so a cycle can always be
//! re-run from any state.

use std::collections::{HashMap, HashSet};

use brew_id::{DrinkId, WorkerId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::model::{Drink, Order, OrderStatus, WorkerStatus};
use crate::priority;
use crate::store::{Repository, StatusRepository, Store, StoreResult};

/// Counts from a single reconciliation cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// PREPARING orders with no (or an unknown) worker.
    pub reset_unassigned: u32,
    /// PREPARING orders with no estimated completion time.
    pub reset_missing_eta: u32,
    /// PREPARING orders beyond the capacity limit.
    pub reset_over_capacity: u32,
    /// Extra PREPARING orders on a worker that already had one.
    pub reset_double_assigned: u32,
    pub orders_ready: u32,
    pub orders_rescored: u32,
    pub orders_assigned: u32,
    /// WAITING orders passed over for a later arrival this cycle.
    pub orders_skipped: u32,
}

impl ReconcileStats {
    /// Total invariant repairs performed.
    pub fn repairs(&self) -> u32 {
        self.reset_unassigned
            + self.reset_missing_eta
            + self.reset_over_capacity
            + self.reset_double_assigned
    }
}

/// The scheduler reconciler.
pub struct SchedulerReconciler {
    store: Store,
    capacity: usize,
}

impl SchedulerReconciler {
    /// Create a reconciler allowing `capacity` orders in PREPARING at once.
    pub fn new(store: Store, capacity: usize) -> Self {
        Self { store, capacity }
    }

    /// Run one full reconciliation cycle at `now`.
    #[instrument(skip(self), fields(capacity = self.capacity))]
    pub async fn reconcile(&self, now: DateTime<Utc>) -> StoreResult<ReconcileStats> {
        let mut stats = ReconcileStats::default();
        let menu = self.menu().await?;

        self.repair_invariants(&mut stats).await?;
        self.promote_ready_orders(now, &menu, &mut stats).await?;
        self.rescore_waiting(now, &menu, &mut stats).await?;
        self.assign_orders(now, &menu, &mut stats).await?;

        if stats.repairs() > 0 || stats.orders_ready > 0 || stats.orders_assigned > 0 {
            info!(
                repairs = stats.repairs(),
                orders_ready = stats.orders_ready,
                orders_assigned = stats.orders_assigned,
                orders_skipped = stats.orders_skipped,
                "Reconciliation cycle complete"
            );
        } else {
            debug!(orders_rescored = stats.orders_rescored, "Reconciliation cycle idle");
        }

        Ok(stats)
    }

    async fn menu(&self) -> StoreResult<HashMap<DrinkId, Drink>> {
        Ok(self
            .store
            .drinks
            .list_all()
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect())
    }

    async fn preparing(&self) -> StoreResult<Vec<Order>> {
        self.store.orders.list_by_status(OrderStatus::Preparing).await
    }

    // =========================================================================
    // Phase 1: repair
    // =========================================================================

    async fn repair_invariants(&self, stats: &mut ReconcileStats) -> StoreResult<()> {
        let known_workers: HashSet<WorkerId> = self
            .store
            .workers
            .list_all()
            .await?
            .iter()
            .map(|w| w.id)
            .collect();

        // Unassigned (or assigned to a worker that no longer exists).
        let mut unassigned = Vec::new();
        for mut order in self.preparing().await? {
            let attached = order
                .assigned_worker
                .is_some_and(|w| known_workers.contains(&w));
            if !attached {
                warn!(
                    order_id = %order.id,
                    worker_id = ?order.assigned_worker,
                    "Order in PREPARING without a worker, resetting to WAITING"
                );
                order.reset_to_waiting();
                unassigned.push(order);
            }
        }
        stats.reset_unassigned += unassigned.len() as u32;
        self.store.orders.save_all(unassigned).await?;

        // No completion estimate: the ready-check would never release it.
        let mut stalled = Vec::new();
        for mut order in self.preparing().await? {
            if order.estimated_completion_time.is_none() {
                warn!(
                    order_id = %order.id,
                    worker_id = ?order.assigned_worker,
                    "Order in PREPARING without a completion estimate, resetting to WAITING"
                );
                order.reset_to_waiting();
                stalled.push(order);
            }
        }
        stats.reset_missing_eta += stalled.len() as u32;
        self.store.orders.save_all(stalled).await?;

        // Over capacity: keep the oldest `capacity` orders.
        let mut preparing = self.preparing().await?;
        if preparing.len() > self.capacity {
            warn!(
                preparing = preparing.len(),
                capacity = self.capacity,
                "Capacity violation, resetting newest PREPARING orders"
            );
            preparing.sort_by_key(|o| o.order_time());
            let excess: Vec<Order> = preparing
                .split_off(self.capacity)
                .into_iter()
                .map(|mut order| {
                    info!(order_id = %order.id, worker_id = ?order.assigned_worker, "Resetting order to WAITING");
                    order.reset_to_waiting();
                    order
                })
                .collect();
            stats.reset_over_capacity += excess.len() as u32;
            self.store.orders.save_all(excess).await?;
        }

        // Double assignment: first order per worker wins.
        let mut seen = HashSet::new();
        let mut doubled = Vec::new();
        for mut order in self.preparing().await? {
            let Some(worker) = order.assigned_worker else {
                continue;
            };
            if !seen.insert(worker) {
                warn!(
                    order_id = %order.id,
                    worker_id = %worker,
                    "Worker already has a PREPARING order, resetting extra to WAITING"
                );
                order.reset_to_waiting();
                doubled.push(order);
            }
        }
        stats.reset_double_assigned += doubled.len() as u32;
        self.store.orders.save_all(doubled).await?;

        // Load is advisory and rebuilt from zero every cycle.
        let workers: Vec<_> = self
            .store
            .workers
            .list_by_status(WorkerStatus::Active)
            .await?
            .into_iter()
            .map(|mut w| {
                w.current_load_minutes = 0;
                w
            })
            .collect();
        self.store.workers.save_all(workers).await?;

        if stats.repairs() > 0 {
            info!(orders_reset = stats.repairs(), "Repaired scheduler invariants");
        }
        Ok(())
    }

    // =========================================================================
    // Phase 2: ready-check
    // =========================================================================

    async fn promote_ready_orders(
        &self,
        now: DateTime<Utc>,
        menu: &HashMap<DrinkId, Drink>,
        stats: &mut ReconcileStats,
    ) -> StoreResult<()> {
        for mut order in self.preparing().await? {
            let due = order.estimated_completion_time.is_some_and(|eta| eta <= now);
            if !due {
                continue;
            }

            info!(order_id = %order.id, "Order ready for pickup");
            order.mark_ready();

            if let Some(worker_id) = order.assigned_worker {
                if let Some(mut worker) = self.store.workers.find_by_id(worker_id).await? {
                    worker.remove_load(prep_minutes(menu, order.drink_id));
                    self.store.workers.save(worker).await?;
                }
            }

            self.store.orders.save(order).await?;
            stats.orders_ready += 1;
        }
        Ok(())
    }

    // =========================================================================
    // Phase 3: rescore
    // =========================================================================

    async fn rescore_waiting(
        &self,
        now: DateTime<Utc>,
        menu: &HashMap<DrinkId, Drink>,
        stats: &mut ReconcileStats,
    ) -> StoreResult<()> {
        let mut waiting = self.store.orders.list_by_status(OrderStatus::Waiting).await?;
        for order in &mut waiting {
            match menu.get(&order.drink_id) {
                Some(drink) => {
                    order.priority_score = priority::score(order, drink, now);
                    stats.orders_rescored += 1;
                }
                None => warn!(order_id = %order.id, drink_id = %order.drink_id, "Order references unknown drink"),
            }
        }
        self.store.orders.save_all(waiting).await?;
        Ok(())
    }

    // =========================================================================
    // Phase 4: assign
    // =========================================================================

    async fn assign_orders(
        &self,
        now: DateTime<Utc>,
        menu: &HashMap<DrinkId, Drink>,
        stats: &mut ReconcileStats,
    ) -> StoreResult<()> {
        let preparing = self.preparing().await?;
        if preparing.len() >= self.capacity {
            info!(
                preparing = preparing.len(),
                capacity = self.capacity,
                "At capacity, no new assignments"
            );
            return Ok(());
        }

        let busy: HashSet<WorkerId> = preparing.iter().filter_map(|o| o.assigned_worker).collect();
        let free_workers: Vec<_> = self
            .store
            .workers
            .list_by_status(WorkerStatus::Active)
            .await?
            .into_iter()
            .filter(|w| !busy.contains(&w.id))
            .collect();

        let mut candidates = self.store.orders.list_by_status(OrderStatus::Waiting).await?;
        candidates.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));

        let slots = self.capacity - preparing.len();
        let n = slots.min(free_workers.len()).min(candidates.len());
        debug!(
            preparing = preparing.len(),
            free_workers = free_workers.len(),
            candidates = candidates.len(),
            assignments = n,
            "Assignment window"
        );
        if n == 0 {
            return Ok(());
        }

        // Index pairing: the i-th best order goes to the i-th free worker.
        let passed_over = candidates.split_off(n);
        let mut latest_assigned = None;
        for (mut order, mut worker) in candidates.into_iter().zip(free_workers) {
            let prep = prep_minutes(menu, order.drink_id);
            order.start_preparing(worker.id, now + Duration::minutes(i64::from(prep)));
            worker.add_load(prep);

            info!(
                order_id = %order.id,
                worker_id = %worker.id,
                worker = %worker.name,
                score = order.priority_score,
                "Assigned order to worker"
            );

            latest_assigned = latest_assigned.max(Some(order.order_time()));
            self.store.orders.save(order).await?;
            self.store.workers.save(worker).await?;
            stats.orders_assigned += 1;
        }

        match latest_assigned {
            Some(latest) => self.mark_skipped(passed_over, latest, stats).await,
            None => Ok(()),
        }
    }

    /// Bump `times_skipped` on orders that arrived before one served this cycle.
    async fn mark_skipped(
        &self,
        passed_over: Vec<Order>,
        latest_assigned: DateTime<Utc>,
        stats: &mut ReconcileStats,
    ) -> StoreResult<()> {
        let skipped: Vec<Order> = passed_over
            .into_iter()
            .filter(|o| o.order_time() < latest_assigned)
            .map(|mut o| {
                o.times_skipped += 1;
                o
            })
            .collect();
        if skipped.is_empty() {
            return Ok(());
        }

        debug!(count = skipped.len(), "Orders passed over for later arrivals");
        stats.orders_skipped += skipped.len() as u32;
        self.store.orders.save_all(skipped).await?;
        Ok(())
    }
}

fn prep_minutes(menu: &HashMap<DrinkId, Drink>, drink_id: DrinkId) -> u32 {
    menu.get(&drink_id).map_or(0, |d| d.prep_time_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::TimeZone;

    use crate::model::Worker;
    use crate::store::{MemoryRepository, Repository, StatusRepository};

    struct Fixture {
        orders: Arc<MemoryRepository<Order>>,
        workers: Arc<MemoryRepository<Worker>>,
        drinks: Arc<MemoryRepository<Drink>>,
        store: Store,
    }

    impl Fixture {
        fn new() -> Self {
            let orders = Arc::new(MemoryRepository::new());
            let workers = Arc::new(MemoryRepository::new());
            let drinks = Arc::new(MemoryRepository::new());
            let store = Store::new(orders.clone(), workers.clone(), drinks.clone());
            Self {
                orders,
                workers,
                drinks,
                store,
            }
        }

        async fn drink(&self, name: &str, prep: u32) -> Drink {
            self.drinks.save(Drink::new(name, prep, 4.0, 0.1)).await.unwrap()
        }

        async fn worker(&self, name: &str) -> Worker {
            self.workers.save(Worker::new(name)).await.unwrap()
        }

        async fn order(&self, drink: &Drink, arrived: DateTime<Utc>) -> Order {
            self.orders
                .save(Order::new("Customer", drink.id, false, arrived))
                .await
                .unwrap()
        }

        async fn get(&self, order: &Order) -> Order {
            self.orders.find_by_id(order.id).await.unwrap().unwrap()
        }

        fn reconciler(&self) -> SchedulerReconciler {
            SchedulerReconciler::new(self.store.clone(), 3)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    async fn prepare(fx: &Fixture, order: Order, worker: Option<WorkerId>) -> Order {
        let mut order = order;
        order.status = OrderStatus::Preparing;
        order.assigned_worker = worker;
        order.estimated_completion_time = Some(now() + Duration::minutes(10));
        fx.orders.save(order).await.unwrap()
    }

    #[tokio::test]
    async fn test_over_capacity_resets_newest() {
        let fx = Fixture::new();
        let latte = fx.drink("Latte", 4).await;
        let (w1, w2, w3) = (fx.worker("Alice").await, fx.worker("Bob").await, fx.worker("Charlie").await);

        let t0 = now() - Duration::minutes(8);
        let a = prepare(&fx, fx.order(&latte, t0).await, Some(w1.id)).await;
        let b = prepare(&fx, fx.order(&latte, t0 + Duration::minutes(1)).await, Some(w2.id)).await;
        let c = prepare(&fx, fx.order(&latte, t0 + Duration::minutes(2)).await, Some(w3.id)).await;
        let d = prepare(&fx, fx.order(&latte, t0 + Duration::minutes(3)).await, Some(w1.id)).await;

        let stats = fx.reconciler().reconcile(now()).await.unwrap();

        assert_eq!(stats.reset_over_capacity, 1);
        assert_eq!(stats.reset_double_assigned, 0);
        assert_eq!(stats.orders_assigned, 0);
        for kept in [&a, &b, &c] {
            assert_eq!(fx.get(kept).await.status, OrderStatus::Preparing);
        }
        let d = fx.get(&d).await;
        assert_eq!(d.status, OrderStatus::Waiting);
        assert!(d.assigned_worker.is_none());
        assert!(d.estimated_completion_time.is_none());
    }

    #[tokio::test]
    async fn test_unassigned_and_dangling_orders_are_reset() {
        let fx = Fixture::new();
        let espresso = fx.drink("Espresso", 2).await;

        let orphan = prepare(&fx, fx.order(&espresso, now()).await, None).await;
        let dangling = prepare(&fx, fx.order(&espresso, now()).await, Some(WorkerId::new())).await;

        let stats = fx.reconciler().reconcile(now()).await.unwrap();

        assert_eq!(stats.reset_unassigned, 2);
        assert_eq!(fx.get(&orphan).await.status, OrderStatus::Waiting);
        assert_eq!(fx.get(&dangling).await.status, OrderStatus::Waiting);
    }

    #[tokio::test]
    async fn test_preparing_without_estimate_releases_its_worker() {
        let fx = Fixture::new();
        let latte = fx.drink("Latte", 4).await;
        let alice = fx.worker("Alice").await;

        let mut stuck = prepare(&fx, fx.order(&latte, now() - Duration::minutes(5)).await, Some(alice.id)).await;
        stuck.estimated_completion_time = None;
        fx.orders.save(stuck.clone()).await.unwrap();

        let later = now() + Duration::hours(1);
        let stats = fx.reconciler().reconcile(later).await.unwrap();

        assert_eq!(stats.reset_missing_eta, 1);
        assert_eq!(stats.reset_unassigned, 0);
        // Reset, then picked up again by the only worker with a fresh estimate.
        let order = fx.get(&stuck).await;
        assert_eq!(order.status, OrderStatus::Preparing);
        assert_eq!(order.assigned_worker, Some(alice.id));
        assert_eq!(order.estimated_completion_time, Some(later + Duration::minutes(4)));

        let stats = fx.reconciler().reconcile(later + Duration::minutes(4)).await.unwrap();
        assert_eq!(stats.orders_ready, 1);
        assert_eq!(fx.get(&stuck).await.status, OrderStatus::ReadyToPickup);
    }

    #[tokio::test]
    async fn test_double_assignment_keeps_first() {
        let fx = Fixture::new();
        let espresso = fx.drink("Espresso", 2).await;
        let alice = fx.worker("Alice").await;

        let first = prepare(&fx, fx.order(&espresso, now()).await, Some(alice.id)).await;
        let second = prepare(&fx, fx.order(&espresso, now()).await, Some(alice.id)).await;

        let stats = fx.reconciler().reconcile(now()).await.unwrap();

        assert_eq!(stats.reset_double_assigned, 1);
        assert_eq!(fx.get(&first).await.assigned_worker, Some(alice.id));
        assert_eq!(fx.get(&second).await.status, OrderStatus::Waiting);
    }

    #[tokio::test]
    async fn test_due_orders_become_ready_and_free_the_worker() {
        let fx = Fixture::new();
        let cold_brew = fx.drink("Cold Brew", 1).await;
        let alice = fx.worker("Alice").await;

        let mut order = fx.order(&cold_brew, now() - Duration::minutes(2)).await;
        order.start_preparing(alice.id, now());
        fx.orders.save(order.clone()).await.unwrap();
        let next = fx.order(&cold_brew, now() - Duration::minutes(1)).await;

        let stats = fx.reconciler().reconcile(now()).await.unwrap();

        assert_eq!(stats.orders_ready, 1);
        let ready = fx.get(&order).await;
        assert_eq!(ready.status, OrderStatus::ReadyToPickup);
        assert_eq!(ready.assigned_worker, Some(alice.id));

        // Alice is free again in the same cycle.
        let next = fx.get(&next).await;
        assert_eq!(next.status, OrderStatus::Preparing);
        assert_eq!(next.assigned_worker, Some(alice.id));
        assert_eq!(next.estimated_completion_time, Some(now() + Duration::minutes(1)));
        let alice = fx.workers.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(alice.current_load_minutes, 1);
    }

    #[tokio::test]
    async fn test_highest_score_wins_and_earlier_arrival_is_marked_skipped() {
        let fx = Fixture::new();
        let mocha = fx.drink("Mocha", 6).await;
        let espresso = fx.drink("Espresso", 1).await;
        fx.worker("Alice").await;

        let older = fx.order(&mocha, now() - Duration::minutes(5)).await;
        let newer = fx.order(&espresso, now() - Duration::minutes(4)).await;

        let stats = fx.reconciler().reconcile(now()).await.unwrap();

        assert_eq!(stats.orders_rescored, 2);
        assert_eq!(stats.orders_assigned, 1);
        assert_eq!(stats.orders_skipped, 1);
        assert_eq!(fx.get(&newer).await.status, OrderStatus::Preparing);

        let older = fx.get(&older).await;
        assert_eq!(older.status, OrderStatus::Waiting);
        assert_eq!(older.times_skipped, 1);
        assert!(older.priority_score > 27.0 && older.priority_score < 28.0);
    }

    #[tokio::test]
    async fn test_inactive_workers_get_nothing() {
        let fx = Fixture::new();
        let espresso = fx.drink("Espresso", 2).await;
        let mut dana = Worker::new("Dana");
        dana.status = WorkerStatus::Inactive;
        fx.workers.save(dana).await.unwrap();

        let order = fx.order(&espresso, now()).await;
        let stats = fx.reconciler().reconcile(now()).await.unwrap();

        assert_eq!(stats.orders_assigned, 0);
        assert_eq!(fx.get(&order).await.status, OrderStatus::Waiting);
    }

    #[tokio::test]
    async fn test_failed_cycle_is_repaired_by_the_next() {
        let fx = Fixture::new();
        let latte = fx.drink("Latte", 4).await;
        for name in ["Alice", "Bob", "Charlie"] {
            fx.worker(name).await;
        }
        for i in 0..5 {
            fx.order(&latte, now() - Duration::minutes(i)).await;
        }

        // Fails on the second assignment save.
        fx.orders.fail_after(13);
        assert!(fx.reconciler().reconcile(now()).await.is_err());

        fx.orders.set_online(true);
        fx.reconciler().reconcile(now()).await.unwrap();

        let preparing = fx.orders.list_by_status(OrderStatus::Preparing).await.unwrap();
        assert_eq!(preparing.len(), 3);
        let workers: HashSet<_> = preparing.iter().filter_map(|o| o.assigned_worker).collect();
        assert_eq!(workers.len(), 3);
    }

    #[tokio::test]
    async fn test_second_cycle_without_time_passing_changes_nothing() {
        let fx = Fixture::new();
        let latte = fx.drink("Latte", 4).await;
        fx.worker("Alice").await;
        fx.order(&latte, now()).await;
        fx.order(&latte, now()).await;

        let reconciler = fx.reconciler();
        let first = reconciler.reconcile(now()).await.unwrap();
        let second = reconciler.reconcile(now()).await.unwrap();

        assert_eq!(first.orders_assigned, 1);
        assert_eq!(second.orders_assigned, 0);
        assert_eq!(second.repairs(), 0);
    }
}
