//! Reconciliation loop integration tests.
//!
//! Whatever state the store is in, one successful tick must leave it
//! satisfying the capacity and assignment invariants.

use std::collections::HashSet;
use std::sync::Arc;

use brew_id::WorkerId;
use brew_scheduler::{
    error::ServiceError,
    model::{Drink, Order, OrderStatus, Worker, WorkerStatus},
    service::{ShopConfig, ShopService, TickOutcome},
    store::{MemoryRepository, Repository, StatusRepository, Store},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

const CAPACITY: usize = 3;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

struct Shop {
    orders: Arc<MemoryRepository<Order>>,
    workers: Arc<MemoryRepository<Worker>>,
    drinks: Arc<MemoryRepository<Drink>>,
    service: ShopService,
}

impl Shop {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();

        let orders = Arc::new(MemoryRepository::new());
        let workers = Arc::new(MemoryRepository::new());
        let drinks = Arc::new(MemoryRepository::new());
        let store = Store::new(orders.clone(), workers.clone(), drinks.clone());
        let service = ShopService::new(
            store,
            ShopConfig {
                capacity: CAPACITY,
                ..ShopConfig::default()
            },
        );
        Self {
            orders,
            workers,
            drinks,
            service,
        }
    }

    /// Check every invariant a completed tick guarantees.
    async fn assert_invariants(&self) {
        let preparing = self.orders.list_by_status(OrderStatus::Preparing).await.unwrap();
        let waiting = self.orders.list_by_status(OrderStatus::Waiting).await.unwrap();
        let workers = self.workers.list_all().await.unwrap();
        let known: HashSet<WorkerId> = workers.iter().map(|w| w.id).collect();

        assert!(preparing.len() <= CAPACITY, "{} preparing", preparing.len());

        let mut busy = HashSet::new();
        for order in &preparing {
            let worker = order.assigned_worker.expect("PREPARING without worker");
            assert!(known.contains(&worker), "PREPARING on unknown worker");
            assert!(busy.insert(worker), "worker {worker} double-booked");
            assert!(order.estimated_completion_time.is_some());
        }

        let idle_active = workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Active && !busy.contains(&w.id))
            .count();
        if preparing.len() < CAPACITY && idle_active > 0 {
            assert!(waiting.is_empty(), "work left waiting with idle capacity");
        }
    }
}

// =============================================================================
// Corrupted-store property
// =============================================================================

#[derive(Debug, Clone)]
struct OrderSeed {
    status: usize,
    /// Index into workers; `>= workers.len()` means a dangling reference.
    worker: Option<usize>,
    arrived_minutes_ago: i64,
    /// `None` leaves the completion estimate unset.
    eta_offset_minutes: Option<i64>,
    drink: usize,
}

fn order_seed() -> impl Strategy<Value = OrderSeed> {
    (
        0usize..5,
        proptest::option::of(0usize..6),
        0i64..30,
        proptest::option::of(-5i64..10),
        0usize..3,
    )
        .prop_map(|(status, worker, arrived_minutes_ago, eta_offset_minutes, drink)| OrderSeed {
            status,
            worker,
            arrived_minutes_ago,
            eta_offset_minutes,
            drink,
        })
}

const STATUSES: [OrderStatus; 5] = [
    OrderStatus::Waiting,
    OrderStatus::Preparing,
    OrderStatus::ReadyToPickup,
    OrderStatus::Completed,
    OrderStatus::Cancelled,
];

async fn corrupted_tick(worker_active: Vec<bool>, seeds: Vec<OrderSeed>) {
    let shop = Shop::new();

    let mut drinks = Vec::new();
    for (name, prep) in [("Espresso", 2), ("Latte", 4), ("Mocha", 6)] {
        drinks.push(shop.drinks.save(Drink::new(name, prep, 4.0, 0.1)).await.unwrap());
    }

    let mut worker_ids = Vec::new();
    for (i, active) in worker_active.iter().enumerate() {
        let mut worker = Worker::new(format!("Worker {i}"));
        if !active {
            worker.status = WorkerStatus::Inactive;
        }
        // Stale load must not survive the cycle.
        worker.current_load_minutes = 17;
        worker_ids.push(shop.workers.save(worker).await.unwrap().id);
    }

    for seed in seeds {
        let drink = &drinks[seed.drink];
        let mut order = Order::new(
            "Customer",
            drink.id,
            seed.status % 2 == 0,
            now() - Duration::minutes(seed.arrived_minutes_ago),
        );
        order.status = STATUSES[seed.status];
        order.assigned_worker = seed
            .worker
            .map(|i| worker_ids.get(i).copied().unwrap_or_else(WorkerId::new));
        order.estimated_completion_time = seed
            .eta_offset_minutes
            .map(|offset| now() + Duration::minutes(offset));
        shop.orders.save(order).await.unwrap();
    }

    let outcome = shop.service.tick_at(now()).await.unwrap();
    assert!(matches!(outcome, TickOutcome::Completed(_)));
    shop.assert_invariants().await;

    for worker in shop.workers.list_by_status(WorkerStatus::Active).await.unwrap() {
        assert!(worker.current_load_minutes <= 6, "stale load {}", worker.current_load_minutes);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_one_tick_restores_invariants(
        worker_active in proptest::collection::vec(any::<bool>(), 0..5),
        seeds in proptest::collection::vec(order_seed(), 0..12),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(corrupted_tick(worker_active, seeds));
    }
}

// =============================================================================
// Store failures
// =============================================================================

#[tokio::test]
async fn test_failed_tick_then_healthy_tick_repairs() {
    let shop = Shop::new();
    let latte = shop.drinks.save(Drink::new("Latte", 4, 4.5, 0.12)).await.unwrap();
    for name in ["Alice", "Bob", "Charlie"] {
        shop.workers.save(Worker::new(name)).await.unwrap();
    }
    for i in 0..6 {
        shop.orders
            .save(Order::new("Customer", latte.id, false, now() - Duration::minutes(i)))
            .await
            .unwrap();
    }

    shop.orders.set_online(false);
    let err = shop.service.tick_at(now()).await.unwrap_err();
    assert!(matches!(err, ServiceError::StoreUnavailable(_)));
    assert!(err.is_retryable());

    // Come back, then die part-way through the assignment phase.
    shop.orders.set_online(true);
    shop.orders.fail_after(13);
    assert!(shop.service.tick_at(now()).await.is_err());

    shop.orders.set_online(true);
    shop.service.tick_at(now()).await.unwrap();
    shop.assert_invariants().await;

    let counters = shop.service.counters();
    assert_eq!(counters.ticks_failed, 2);
    assert_eq!(counters.ticks_completed, 1);
    assert_eq!(
        shop.orders.list_by_status(OrderStatus::Preparing).await.unwrap().len(),
        CAPACITY
    );
}

#[tokio::test]
async fn test_unreachable_drink_store_aborts_tick() {
    let shop = Shop::new();
    shop.drinks.set_online(false);
    assert!(matches!(
        shop.service.tick_at(now()).await,
        Err(ServiceError::StoreUnavailable(_))
    ));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_and_ticks_keep_invariants() {
    let shop = Arc::new(Shop::new());
    shop.service.seed_defaults().await.unwrap();
    let menu = shop.service.menu().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let shop = shop.clone();
        let drink = menu[i % menu.len()].id;
        handles.push(tokio::spawn(async move {
            shop.service
                .place_order(format!("Customer_{i}"), drink, i % 3 == 0)
                .await
                .unwrap();
            shop.service.tick().await.unwrap()
        }));
    }

    let mut completed = 0;
    for handle in handles {
        if let TickOutcome::Completed(_) = handle.await.unwrap() {
            completed += 1;
        }
    }
    assert!(completed >= 1);

    let counters = shop.service.counters();
    assert_eq!(counters.ticks_completed + counters.ticks_skipped, 20);

    shop.service.tick().await.unwrap();
    shop.assert_invariants().await;
}
