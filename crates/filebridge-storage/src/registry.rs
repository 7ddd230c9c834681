// Filebridge - Unified File Storage
// Copyright (C) 2025 Filebridge Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Registry of platform adapters
//!
//! Lookups are by exact platform identifier. The map itself is an immutable
//! snapshot behind an `Arc`; `register` and `remove` build a new map and swap
//! the pointer, so readers only ever clone an `Arc`.

use crate::platform::FileStorage;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

type Snapshot = Arc<HashMap<String, Arc<dyn FileStorage>>>;

/// Platform identifier → adapter
#[derive(Debug, Default)]
pub struct PlatformRegistry {
    platforms: RwLock<Snapshot>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; later registrations do not affect it
    pub fn snapshot(&self) -> Snapshot {
        match self.platforms.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Register an adapter under its own identifier
    ///
    /// The last registration wins; the replaced adapter is returned.
    pub fn register(&self, storage: Arc<dyn FileStorage>) -> Option<Arc<dyn FileStorage>> {
        let platform = storage.platform().to_string();
        let replaced = self.update(|map| map.insert(platform.clone(), storage));
        match &replaced {
            Some(_) => info!(platform = %platform, "Replaced storage platform"),
            None => debug!(platform = %platform, "Registered storage platform"),
        }
        replaced
    }

    pub fn remove(&self, platform: &str) -> Option<Arc<dyn FileStorage>> {
        let removed = self.update(|map| map.remove(platform));
        if removed.is_some() {
            debug!(platform, "Removed storage platform");
        }
        removed
    }

    pub fn get(&self, platform: &str) -> Option<Arc<dyn FileStorage>> {
        self.snapshot().get(platform).cloned()
    }

    pub fn contains(&self, platform: &str) -> bool {
        self.snapshot().contains_key(platform)
    }

    /// Registered identifiers, sorted
    pub fn platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> = self.snapshot().keys().cloned().collect();
        platforms.sort();
        platforms
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Close every adapter and empty the registry
    pub async fn close_all(&self) {
        let snapshot = self.update(|map| std::mem::take(map).into_values().collect::<Vec<_>>());
        for storage in snapshot {
            storage.close().await;
            debug!(platform = storage.platform(), "Closed storage platform");
        }
    }

    fn update<T>(&self, f: impl FnOnce(&mut HashMap<String, Arc<dyn FileStorage>>) -> T) -> T {
        let mut guard = match self.platforms.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = HashMap::clone(&guard);
        let result = f(&mut next);
        *guard = Arc::new(next);
        result
    }
}
