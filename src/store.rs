//! Durable keyed storage for the latest snapshot set.
//!
//! The engine treats the store as a replace-all sink: a refresh hands over
//! the complete new row set, and readers must observe either the previous or
//! the new set in full, never a mix.

use std::sync::Mutex;

use crate::error::Result;
use crate::snapshot::InvestorSnapshot;

pub trait SnapshotStore: Send + Sync {
    /// Atomically replaces the entire stored snapshot set.
    fn replace_all(&self, rows: Vec<InvestorSnapshot>) -> Result<()>;

    /// Returns the full current snapshot set.
    fn load_all(&self) -> Result<Vec<InvestorSnapshot>>;
}

/// In-memory store backing tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<InvestorSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn replace_all(&self, rows: Vec<InvestorSnapshot>) -> Result<()> {
        let mut guard = match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = rows;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<InvestorSnapshot>> {
        let guard = match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(guard.clone())
    }
}
