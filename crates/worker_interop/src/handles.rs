//! The callback table: vtables registered for the lifetime of a native call
//! or a connection, addressed by plain integer handles.
//!
//! ABI structs carry only the integer; whoever receives it resolves the
//! codecs through the table that issued it. Handles are move-only and must be
//! handed back with [`CallbackTable::release`]. A table dropped with
//! handles still outstanding logs a leak.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use worker_component::ComponentVtable;

/// A registered vtable. Not `Clone`: each registration is released once.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "callback handles must be released"]
pub struct CallbackHandle(u64);

impl CallbackHandle {
    /// The integer stored in ABI structs.
    #[must_use]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Registered vtables keyed by handle.
#[derive(Debug, Default)]
pub struct CallbackTable {
    next: u64,
    entries: BTreeMap<u64, ComponentVtable>,
}

impl CallbackTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `vtable`, returning the handle that addresses it.
    pub fn register(&mut self, vtable: ComponentVtable) -> CallbackHandle {
        self.next += 1;
        let raw = self.next;
        self.entries.insert(raw, vtable);
        debug!(handle = raw, "callback registered");
        CallbackHandle(raw)
    }

    /// The vtable behind a raw handle value.
    #[must_use]
    pub fn get(&self, raw: u64) -> Option<&ComponentVtable> {
        self.entries.get(&raw)
    }

    /// Release a handle, returning its vtable.
    pub fn release(&mut self, handle: CallbackHandle) -> Option<ComponentVtable> {
        let vtable = self.entries.remove(&handle.0);
        if vtable.is_none() {
            warn!(handle = handle.0, "released a handle this table did not issue");
        }
        vtable
    }

    /// Release every handle in `handles`.
    pub fn release_all(&mut self, handles: impl IntoIterator<Item = CallbackHandle>) {
        for handle in handles {
            self.release(handle);
        }
    }

    /// Number of handles registered and not yet released.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.entries.len()
    }
}

impl Drop for CallbackTable {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            warn!(outstanding = self.entries.len(), "callback table dropped with unreleased handles");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_release() {
        let mut table = CallbackTable::new();
        let first = table.register(ComponentVtable::new());
        let second = table.register(ComponentVtable::new());
        assert_ne!(first.raw(), second.raw());
        assert_eq!(table.outstanding(), 2);
        assert!(table.get(first.raw()).is_some());

        let raw = first.raw();
        assert!(table.release(first).is_some());
        assert!(table.get(raw).is_none());
        table.release_all([second]);
        assert_eq!(table.outstanding(), 0);
    }

    #[test]
    fn test_releasing_twice_is_impossible_by_move() {
        let mut table = CallbackTable::new();
        let handle = table.register(ComponentVtable::new());
        let raw = handle.raw();
        table.release(handle);
        // `handle` is gone; a fresh registration never reuses its number.
        let next = table.register(ComponentVtable::new());
        assert_ne!(next.raw(), raw);
        table.release(next);
    }
}
