//! Pending-buffer handoff between table augmentation and the host's own
//! finishing pass.
//!
//! The engine records `table -> buffer` before it installs an augmented
//! buffer. When the host later finishes the same table object it drains the
//! entry under the same lock and installs that buffer instead of its own data,
//! so exactly one of the two buffers ends up in the table.

use std::sync::{Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;

use crate::ids::TableId;
use crate::table::ClipBuffer;

#[derive(Debug, Default)]
pub struct FinishCache {
    pending: Mutex<HashMap<TableId, ClipBuffer>>,
}

impl FinishCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TableId, ClipBuffer>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a pending buffer. A newer buffer for the same table replaces the old one.
    pub fn record(&self, table: TableId, buffer: ClipBuffer) {
        if self.lock().insert(table, buffer).is_some() {
            log::trace!("replaced pending buffer for table {:#x}", table.0);
        }
    }

    /// Remove and return the pending buffer for `table`, if any.
    pub fn take(&self, table: TableId) -> Option<ClipBuffer> {
        self.lock().remove(&table)
    }

    /// Drop a pending buffer without installing it (table torn down).
    pub fn discard(&self, table: TableId) -> bool {
        self.lock().remove(&table).is_some()
    }

    pub fn contains(&self, table: TableId) -> bool {
        self.lock().contains_key(&table)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
