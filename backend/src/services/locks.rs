//! Keyed async locks: one writer per entity key

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock table keyed by entity id (ingredient name, request id)
#[derive(Clone, Default)]
pub struct KeyedLocks {
    table: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Guards held for a set of keys, released on drop
pub struct KeyedGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut table = match self.table.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Drop entries nobody is holding or waiting on
        if table.len() > 1024 {
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        table
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let guard = self.entry(key).lock_owned().await;
        KeyedGuard {
            _guards: vec![guard],
        }
    }

    /// Lock several keys in sorted order, duplicates collapsed
    pub async fn lock_many<I, S>(&self, keys: I) -> KeyedGuard
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sorted: BTreeSet<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        let mut guards = Vec::with_capacity(sorted.len());
        for key in &sorted {
            guards.push(self.entry(key).lock_owned().await);
        }
        KeyedGuard { _guards: guards }
    }
}
