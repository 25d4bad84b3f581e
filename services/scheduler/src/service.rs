//! Shop service: the operations exposed to the HTTP layer and the worker.
//!
//! All mutating operations serialize on one cycle guard. A tick that finds
//! the guard held is skipped rather than queued.

use std::collections::HashMap;
use std::sync::{Mutex as StdMutex, MutexGuard, PoisonError};

use brew_id::{DrinkId, OrderId};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::model::{Drink, Order, OrderStatus, WorkerStatus};
use crate::priority;
use crate::quality::{self, QosReport};
use crate::scheduler::{ReconcileStats, SchedulerCounters, SchedulerReconciler, SchedulerSnapshot};
use crate::seed;
use crate::simulation::{
    arrivals, dispatch, DispatchSummary, SimulationConfig, SimulationStats, SimulationSummary,
};
use crate::store::{Repository, StatusRepository, Store};

/// Tunables for [`ShopService`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShopConfig {
    /// Maximum orders in PREPARING at once.
    pub capacity: usize,
    pub simulation: SimulationConfig,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            capacity: 3,
            simulation: SimulationConfig::default(),
        }
    }
}

/// Result of a tick request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "stats", rename_all = "snake_case")]
pub enum TickOutcome {
    Completed(ReconcileStats),
    /// Another cycle held the guard.
    Skipped,
}

pub struct ShopService {
    store: Store,
    reconciler: SchedulerReconciler,
    config: ShopConfig,
    cycle: Mutex<()>,
    counters: SchedulerCounters,
    rng: StdMutex<StdRng>,
}

impl ShopService {
    pub fn new(store: Store, config: ShopConfig) -> Self {
        let rng = match config.simulation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            reconciler: SchedulerReconciler::new(store.clone(), config.capacity),
            store,
            config,
            cycle: Mutex::new(()),
            counters: SchedulerCounters::default(),
            rng: StdMutex::new(rng),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn counters(&self) -> SchedulerSnapshot {
        self.counters.snapshot()
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed the default menu and staff if none exist.
    pub async fn seed_defaults(&self) -> ServiceResult<()> {
        let _guard = self.cycle.lock().await;

        if self.store.drinks.list_all().await?.is_empty() {
            let menu = self.store.drinks.save_all(seed::default_menu()).await?;
            info!(drinks = menu.len(), "Seeded default menu");
        }
        if self
            .store
            .workers
            .list_by_status(WorkerStatus::Active)
            .await?
            .is_empty()
        {
            let workers = self.store.workers.save_all(seed::default_workers()).await?;
            info!(workers = workers.len(), "Seeded default workers");
        }
        Ok(())
    }

    /// Cheap store round trip for readiness probes.
    pub async fn check_store(&self) -> ServiceResult<()> {
        self.store.drinks.list_all().await?;
        Ok(())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    pub async fn menu(&self) -> ServiceResult<Vec<Drink>> {
        Ok(self.store.drinks.list_all().await?)
    }

    /// Queue a new WAITING order, scored at zero wait.
    #[instrument(skip(self, customer_name))]
    pub async fn place_order(
        &self,
        customer_name: impl Into<String>,
        drink_id: DrinkId,
        loyal: bool,
    ) -> ServiceResult<Order> {
        let _guard = self.cycle.lock().await;

        let drink = self
            .store
            .drinks
            .find_by_id(drink_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("drink", drink_id))?;

        let now = Utc::now();
        let mut order = Order::new(customer_name, drink.id, loyal, now);
        order.priority_score = priority::score(&order, &drink, now);
        let order = self.store.orders.save(order).await?;

        info!(order_id = %order.id, drink = %drink.name, loyal, "Order placed");
        Ok(order)
    }

    pub async fn get_order(&self, id: OrderId) -> ServiceResult<Order> {
        self.store
            .orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("order", id))
    }

    pub async fn list_orders(&self) -> ServiceResult<Vec<Order>> {
        Ok(self.store.orders.list_all().await?)
    }

    /// READY_TO_PICKUP -> COMPLETED.
    #[instrument(skip(self))]
    pub async fn pickup_order(&self, id: OrderId) -> ServiceResult<Order> {
        let _guard = self.cycle.lock().await;

        let mut order = self.get_order(id).await?;
        if order.status != OrderStatus::ReadyToPickup {
            return Err(ServiceError::InvalidState {
                id,
                status: order.status,
            });
        }

        order.complete(Utc::now());
        let order = self.store.orders.save(order).await?;
        info!(order_id = %order.id, wait_minutes = ?order.wait_minutes(), "Order picked up");
        Ok(order)
    }

    // =========================================================================
    // Scheduler
    // =========================================================================

    pub async fn tick(&self) -> ServiceResult<TickOutcome> {
        self.tick_at(Utc::now()).await
    }

    /// Run one reconciliation cycle at `now`, unless one is already running.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> ServiceResult<TickOutcome> {
        let Ok(_guard) = self.cycle.try_lock() else {
            self.counters.record_skipped();
            warn!("Reconciliation already in progress, skipping tick");
            return Ok(TickOutcome::Skipped);
        };

        match self.reconciler.reconcile(now).await {
            Ok(stats) => {
                self.counters.record_cycle(&stats);
                Ok(TickOutcome::Completed(stats))
            }
            Err(e) => {
                self.counters.record_failed();
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Simulation
    // =========================================================================

    /// Replace every order with a generated morning rush.
    #[instrument(skip(self))]
    pub async fn run_simulation(&self) -> ServiceResult<SimulationSummary> {
        let _guard = self.cycle.lock().await;

        let menu = self.store.drinks.list_all().await?;
        if menu.is_empty() {
            return Err(ServiceError::not_found("drink", "any"));
        }

        let sim = &self.config.simulation;
        let window = sim.window_on(Utc::now().date_naive());
        let orders = {
            let mut rng = self.rng();
            arrivals::generate_orders(
                &mut *rng,
                &menu,
                sim.total_orders,
                sim.lambda,
                sim.loyal_rate,
                &window,
            )
        };

        let removed = self.store.orders.delete_all().await?;
        let orders = self.store.orders.save_all(orders).await?;
        let loyal_count = orders.iter().filter(|o| o.loyal).count();

        info!(
            removed,
            created = orders.len(),
            loyal = loyal_count,
            "Generated simulated orders"
        );
        Ok(SimulationSummary {
            orders_created: orders.len(),
            loyal_count,
            lambda: sim.lambda,
            window_start: window.start,
            window_end: window.end,
            message: format!("Generated {} orders", orders.len()),
        })
    }

    /// Drain the WAITING queue through the adaptive dispatch replay.
    #[instrument(skip(self))]
    pub async fn simulate_dispatch(&self) -> ServiceResult<DispatchSummary> {
        let _guard = self.cycle.lock().await;

        let waiting = self.store.orders.list_by_status(OrderStatus::Waiting).await?;
        let menu: HashMap<DrinkId, Drink> = self
            .store
            .drinks
            .list_all()
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();
        let workers = self.store.workers.list_by_status(WorkerStatus::Active).await?;
        let opening = self
            .config
            .simulation
            .window_on(Utc::now().date_naive())
            .start;

        let run = dispatch::dispatch(&waiting, &menu, self.config.capacity, opening);

        let mut by_id: HashMap<OrderId, Order> = waiting.into_iter().map(|o| (o.id, o)).collect();
        let completed: Vec<Order> = run
            .completions
            .iter()
            .filter_map(|c| {
                let mut order = by_id.remove(&c.order_id)?;
                order.assigned_worker = workers.get(c.slot).map(|w| w.id);
                order.complete(c.completed_at);
                Some(order)
            })
            .collect();
        self.store.orders.save_all(completed).await?;

        let summary = DispatchSummary::from_run(&run);
        info!(
            processed = summary.processed,
            avg_wait = summary.avg_wait_minutes,
            verdict = %summary.verdict,
            "Dispatch simulation complete"
        );
        Ok(summary)
    }

    /// Backlog composition over every stored order.
    pub async fn simulation_stats(&self) -> ServiceResult<SimulationStats> {
        let orders = self.store.orders.list_all().await?;
        let drinks = self.store.drinks.list_all().await?;
        Ok(SimulationStats::from_orders(&orders, &drinks))
    }

    // =========================================================================
    // Stats
    // =========================================================================

    pub async fn get_stats(&self) -> ServiceResult<QosReport> {
        let orders = self.store.orders.list_all().await?;
        let drinks = self.store.drinks.list_all().await?;
        let workers = self.store.workers.list_all().await?;

        let mut report = quality::analyze(&orders, &drinks, &workers, self.config.capacity);
        report.scheduler = Some(self.counters());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> ShopService {
        let config = ShopConfig {
            simulation: SimulationConfig {
                seed: Some(7),
                ..SimulationConfig::default()
            },
            ..ShopConfig::default()
        };
        let service = ShopService::new(Store::in_memory(), config);
        service.seed_defaults().await.unwrap();
        service
    }

    async fn drink_named(service: &ShopService, name: &str) -> Drink {
        service
            .menu()
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.name == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_seed_defaults_is_idempotent() {
        let service = seeded().await;
        service.seed_defaults().await.unwrap();
        assert_eq!(service.menu().await.unwrap().len(), 6);
        assert_eq!(service.store().workers.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_place_order_scores_at_zero_wait() {
        let service = seeded().await;
        let americano = drink_named(&service, "Americano").await;

        let order = service.place_order("Ada", americano.id, false).await.unwrap();
        assert_eq!(order.status, OrderStatus::Waiting);
        assert!((order.priority_score - 20.0).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_place_order_unknown_drink() {
        let service = seeded().await;
        let err = service.place_order("Ada", DrinkId::new(), false).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { kind: "drink", .. }));
    }

    #[tokio::test]
    async fn test_pickup_requires_ready() {
        let service = seeded().await;
        let latte = drink_named(&service, "Latte").await;
        let order = service.place_order("Ada", latte.id, false).await.unwrap();
        let now = order.order_time();

        let err = service.pickup_order(order.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidState {
                status: OrderStatus::Waiting,
                ..
            }
        ));

        service.tick_at(now).await.unwrap();
        let err = service.pickup_order(order.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidState {
                status: OrderStatus::Preparing,
                ..
            }
        ));

        service.tick_at(now + chrono::Duration::minutes(4)).await.unwrap();
        service.pickup_order(order.id).await.unwrap();
        let err = service.pickup_order(order.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidState {
                status: OrderStatus::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_order_lifecycle_through_ticks() {
        let service = seeded().await;
        let latte = drink_named(&service, "Latte").await;
        let order = service.place_order("Ada", latte.id, true).await.unwrap();
        let now = order.order_time();

        service.tick_at(now).await.unwrap();
        let preparing = service.get_order(order.id).await.unwrap();
        assert_eq!(preparing.status, OrderStatus::Preparing);
        assert!(preparing.assigned_worker.is_some());

        let done_at = now + chrono::Duration::minutes(4);
        service.tick_at(done_at).await.unwrap();
        assert_eq!(
            service.get_order(order.id).await.unwrap().status,
            OrderStatus::ReadyToPickup
        );

        let picked = service.pickup_order(order.id).await.unwrap();
        assert_eq!(picked.status, OrderStatus::Completed);
        assert!(picked.completed_time.is_some());
        assert_eq!(service.counters().ticks_completed, 2);
    }

    #[tokio::test]
    async fn test_tick_skips_while_cycle_held() {
        let service = seeded().await;

        let guard = service.cycle.lock().await;
        assert_eq!(service.tick().await.unwrap(), TickOutcome::Skipped);
        drop(guard);

        assert!(matches!(
            service.tick().await.unwrap(),
            TickOutcome::Completed(_)
        ));
        let counters = service.counters();
        assert_eq!(counters.ticks_skipped, 1);
        assert_eq!(counters.ticks_completed, 1);
    }

    #[tokio::test]
    async fn test_seeded_simulation_is_reproducible() {
        let first = seeded().await;
        let second = seeded().await;
        first.run_simulation().await.unwrap();
        second.run_simulation().await.unwrap();

        let times = |orders: Vec<Order>| -> Vec<_> { orders.iter().map(|o| o.order_time()).collect() };
        assert_eq!(
            times(first.list_orders().await.unwrap()),
            times(second.list_orders().await.unwrap())
        );
    }

    #[tokio::test]
    async fn test_simulation_stats_cover_the_whole_backlog() {
        let service = seeded().await;
        let summary = service.run_simulation().await.unwrap();

        let stats = service.simulation_stats().await.unwrap();
        assert_eq!(stats.total_orders, summary.orders_created);
        assert_eq!(stats.waiting_orders, summary.orders_created);
        assert_eq!(stats.loyal_customers, summary.loyal_count);
        let counted: usize = stats.drink_distribution.iter().map(|d| d.count).sum();
        assert_eq!(counted, summary.orders_created);
    }

    #[tokio::test]
    async fn test_counters_split_repairs_by_kind() {
        let service = seeded().await;
        let latte = drink_named(&service, "Latte").await;
        let order = service.place_order("Ada", latte.id, false).await.unwrap();

        let mut orphan = service.get_order(order.id).await.unwrap();
        orphan.status = OrderStatus::Preparing;
        orphan.assigned_worker = Some(brew_id::WorkerId::new());
        orphan.estimated_completion_time = Some(orphan.order_time());
        service.store().orders.save(orphan).await.unwrap();

        service.tick_at(order.order_time()).await.unwrap();
        let counters = service.counters();
        assert_eq!(counters.reset_unassigned, 1);
        assert_eq!(counters.reset_missing_eta, 0);
        assert_eq!(counters.reset_over_capacity, 0);
        assert_eq!(counters.orders_assigned, 1);
    }

    #[tokio::test]
    async fn test_stats_carry_scheduler_counters() {
        let service = seeded().await;
        service.tick().await.unwrap();
        let report = service.get_stats().await.unwrap();
        assert_eq!(report.scheduler.unwrap().ticks_completed, 1);
    }
}
