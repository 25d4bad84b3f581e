//! In-memory repository with fault injection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{Record, Repository, Stateful, StatusRepository, StoreError, StoreResult};

const UNLIMITED: usize = usize::MAX;

/// Vec-backed repository that keeps records in insertion order.
pub struct MemoryRepository<T> {
    records: RwLock<Vec<T>>,
    online: AtomicBool,
    /// Operations left before the repository goes offline.
    op_budget: AtomicUsize,
}

impl<T: Record> MemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            online: AtomicBool::new(true),
            op_budget: AtomicUsize::new(UNLIMITED),
        }
    }

    /// Toggle availability. An offline repository fails every operation.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        if online {
            self.op_budget.store(UNLIMITED, Ordering::SeqCst);
        }
    }

    /// Allow `ops` more operations, then fail until `set_online(true)`.
    pub fn fail_after(&self, ops: usize) {
        self.op_budget.store(ops, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("repository offline".to_string()));
        }
        self.op_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| {
                if budget == UNLIMITED {
                    Some(budget)
                } else {
                    budget.checked_sub(1)
                }
            })
            .map(|_| ())
            .map_err(|_| StoreError::Unavailable("repository operation budget exhausted".to_string()))
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Vec<T>>> {
        self.check_online()?;
        self.records
            .read()
            .map_err(|_| StoreError::Unavailable("repository lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Vec<T>>> {
        self.check_online()?;
        self.records
            .write()
            .map_err(|_| StoreError::Unavailable("repository lock poisoned".to_string()))
    }
}

impl<T: Record> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn upsert<T: Record>(records: &mut Vec<T>, record: T) {
    let id = record.id();
    match records.iter_mut().find(|existing| existing.id() == id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    async fn list_all(&self) -> StoreResult<Vec<T>> {
        Ok(self.read()?.clone())
    }

    async fn find_by_id(&self, id: T::Id) -> StoreResult<Option<T>> {
        Ok(self.read()?.iter().find(|r| r.id() == id).cloned())
    }

    async fn save(&self, record: T) -> StoreResult<T> {
        let mut records = self.write()?;
        upsert(&mut records, record.clone());
        Ok(record)
    }

    async fn save_all(&self, batch: Vec<T>) -> StoreResult<Vec<T>> {
        let mut records = self.write()?;
        for record in &batch {
            upsert(&mut records, record.clone());
        }
        Ok(batch)
    }

    async fn delete_all(&self) -> StoreResult<usize> {
        let mut records = self.write()?;
        let removed = records.len();
        records.clear();
        debug!(removed, "Cleared repository");
        Ok(removed)
    }
}

#[async_trait]
impl<T: Stateful> StatusRepository<T> for MemoryRepository<T> {
    async fn list_by_status(&self, status: T::Status) -> StoreResult<Vec<T>> {
        Ok(self
            .read()?
            .iter()
            .filter(|r| r.status() == status)
            .cloned()
            .collect())
    }
}
