//! Baristas: units of preparation capacity.

use brew_id::WorkerId;
use serde::{Deserialize, Serialize};

use crate::store::{Record, Stateful};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Active,
    Inactive,
}

/// A worker prepares one order at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    pub status: WorkerStatus,
    /// Advisory only; rebuilt from zero on every reconciliation cycle.
    pub current_load_minutes: u32,
}

impl Worker {
    /// Create an active, idle worker.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorkerId::new(),
            name: name.into(),
            status: WorkerStatus::Active,
            current_load_minutes: 0,
        }
    }

    pub fn add_load(&mut self, minutes: u32) {
        self.current_load_minutes = self.current_load_minutes.saturating_add(minutes);
    }

    /// Floors at zero.
    pub fn remove_load(&mut self, minutes: u32) {
        self.current_load_minutes = self.current_load_minutes.saturating_sub(minutes);
    }
}

impl Record for Worker {
    type Id = WorkerId;

    fn id(&self) -> WorkerId {
        self.id
    }
}

impl Stateful for Worker {
    type Status = WorkerStatus;

    fn status(&self) -> WorkerStatus {
        self.status
    }
}
