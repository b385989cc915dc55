//! Location store.
//!
//! The store keeps the most recent valid location and nothing else. It is
//! written by the ingest loop and read by the broadcast hub (late-join replay)
//! and the telemetry uploader.

use crate::model::Location;

/// Trait for location storage implementations.
pub trait LocationStore: Send + Sync {
    /// Replace the current location.
    fn set(&mut self, location: Location);

    /// Get a copy of the current location, if a valid fix was ever received.
    fn get(&self) -> Option<Location>;

    /// Number of locations accepted since startup.
    fn update_count(&self) -> u64;
}

/// In-memory single-slot store.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocationStore {
    current: Option<Location>,
    updates: u64,
}

impl MemoryLocationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationStore for MemoryLocationStore {
    fn set(&mut self, location: Location) {
        // Both coordinates travel in one Copy value, so a reader never sees a
        // half-applied update.
        self.current = Some(location);
        self.updates += 1;
    }

    fn get(&self) -> Option<Location> {
        self.current
    }

    fn update_count(&self) -> u64 {
        self.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_store_is_unset() {
        let store = MemoryLocationStore::new();
        assert_eq!(store.get(), None);
        assert_eq!(store.update_count(), 0);
    }

    #[test]
    fn test_set_replaces_location() {
        let mut store = MemoryLocationStore::new();

        store.set(Location::new(48.1173, 11.5167));
        store.set(Location::new(-33.8568, 151.2153));

        assert_eq!(store.get(), Some(Location::new(-33.8568, 151.2153)));
        assert_eq!(store.update_count(), 2);
    }

    #[test]
    fn test_get_returns_copy() {
        let mut store = MemoryLocationStore::new();
        store.set(Location::new(1.0, 2.0));

        let mut snapshot = store.get().unwrap();
        snapshot.latitude = 50.0;

        assert_eq!(store.get(), Some(Location::new(1.0, 2.0)));
    }
}
