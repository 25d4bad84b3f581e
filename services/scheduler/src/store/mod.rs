//! Record store capability interface.
//!
//! The scheduler never assumes a persistence technology. It talks to one
//! repository per record type:
//! - `Repository<T>`: list, find, save (upsert, last write wins), delete all
//! - `StatusRepository<T>`: adds `list_by_status` for orders and workers
//!
//! An in-memory implementation is provided for the service and for tests.

mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Drink, Order, Worker};

pub use memory::MemoryRepository;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the record store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A stored record with a stable identity.
pub trait Record: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + fmt::Display + Send + Sync;

    fn id(&self) -> Self::Id;
}

/// A record with a lifecycle status that can be queried on.
pub trait Stateful: Record {
    type Status: Copy + Eq + Send + Sync;

    fn status(&self) -> Self::Status;
}

/// Basic record access for one record type.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// All records in insertion order.
    async fn list_all(&self) -> StoreResult<Vec<T>>;

    async fn find_by_id(&self, id: T::Id) -> StoreResult<Option<T>>;

    /// Insert or replace by id.
    async fn save(&self, record: T) -> StoreResult<T>;

    async fn save_all(&self, records: Vec<T>) -> StoreResult<Vec<T>>;

    /// Remove every record, returning how many were removed.
    async fn delete_all(&self) -> StoreResult<usize>;
}

/// Record access with a status index.
#[async_trait]
pub trait StatusRepository<T: Stateful>: Repository<T> {
    /// Records with the given status in insertion order.
    async fn list_by_status(&self, status: T::Status) -> StoreResult<Vec<T>>;
}

/// The repositories the scheduler works against.
#[derive(Clone)]
pub struct Store {
    pub orders: Arc<dyn StatusRepository<Order>>,
    pub workers: Arc<dyn StatusRepository<Worker>>,
    pub drinks: Arc<dyn Repository<Drink>>,
}

impl Store {
    pub fn new(
        orders: Arc<dyn StatusRepository<Order>>,
        workers: Arc<dyn StatusRepository<Worker>>,
        drinks: Arc<dyn Repository<Drink>>,
    ) -> Self {
        Self {
            orders,
            workers,
            drinks,
        }
    }

    /// A store backed by fresh in-memory repositories.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryRepository::<Order>::new()),
            Arc::new(MemoryRepository::<Worker>::new()),
            Arc::new(MemoryRepository::<Drink>::new()),
        )
    }
}
