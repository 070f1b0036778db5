use std::sync::{Arc, RwLock};

use hashbrown::HashMap;

use crate::{
    model::ActivatedFlag,
    types::{TaskId, TimestampMs},
};

/// Immutable flag to task mapping built from one catalogue read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlagIndexSnapshot {
    flags: HashMap<String, TaskId>,
    built_at_ms: TimestampMs,
}

impl FlagIndexSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_flags<I>(flags: I, built_at_ms: TimestampMs) -> Self
    where
        I: IntoIterator<Item = ActivatedFlag>,
    {
        let flags = flags
            .into_iter()
            .map(|f| (f.flag, f.task_id))
            .collect();
        Self { flags, built_at_ms }
    }

    pub fn resolve(&self, token: &str) -> Option<TaskId> {
        self.flags.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Catalogue time the snapshot reflects.
    pub fn built_at_ms(&self) -> TimestampMs {
        self.built_at_ms
    }
}

/// Shared handle to the current [`FlagIndexSnapshot`].
///
/// Readers clone the `Arc` under the read lock; the refresher swaps in a
/// fully built replacement under the write lock. Snapshots are never
/// mutated after publication.
#[derive(Debug, Default)]
pub struct FlagIndex {
    current: RwLock<Arc<FlagIndexSnapshot>>,
}

impl FlagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, token: &str) -> Option<TaskId> {
        self.snapshot().resolve(token)
    }

    pub fn snapshot(&self) -> Arc<FlagIndexSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replaces the current snapshot and hands back the previous one.
    pub fn publish(&self, snapshot: FlagIndexSnapshot) -> Arc<FlagIndexSnapshot> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, next)
    }
}
