//! # Registry
//!
//! The processed set: every item id that has been claimed by a worker during
//! this process lifetime, plus every id that already has a record directory
//! on disk. Claiming is an atomic insert-if-absent, so exactly one caller
//! ever wins a given id.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::core::model::ItemId;

#[derive(Debug, Default)]
pub struct Registry {
    claimed: Mutex<HashSet<ItemId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry pre-filled with ids found in the snapshot store.
    pub fn seeded<I: IntoIterator<Item = ItemId>>(ids: I) -> Self {
        Self {
            claimed: Mutex::new(ids.into_iter().collect()),
        }
    }

    pub fn is_claimed(&self, id: ItemId) -> bool {
        self.lock().contains(&id)
    }

    /// Inserts `id` if absent. Returns `true` only for the caller that inserted it.
    pub fn claim(&self, id: ItemId) -> bool {
        let newly_claimed = self.lock().insert(id);
        if newly_claimed {
            tracing::debug!(item_id = %id, "claimed");
        }
        newly_claimed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the set half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashSet<ItemId>> {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
