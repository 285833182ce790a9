//! Shared store for the current snapshot.
//!
//! Readers take an `Arc` of the current snapshot and keep using it for the
//! whole query; the refresher swaps in a fully built replacement. The write
//! lock is only held for the pointer swap.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::metrics;
use crate::zone::Snapshot;

/// Thread-safe holder of the current [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    /// Create a store holding an empty snapshot.
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::empty())
    }

    /// Create a store holding `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// Current snapshot.
    pub fn get(&self) -> Arc<Snapshot> {
        self.inner.read().clone()
    }

    /// Install `snapshot` as the current one.
    pub fn replace(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        let previous = std::mem::replace(&mut *self.inner.write(), snapshot);
        debug!(previous_zones = previous.zones_count(), "replaced snapshot");
        // `previous` is dropped here, or by the last in-flight reader.
    }

    /// Emit current snapshot metrics.
    pub fn emit_metrics(&self) {
        let snapshot = self.get();
        metrics::record_snapshot_counts(
            snapshot.zones_count(),
            snapshot.records_count(),
            snapshot.reverse_records().len(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::derive_claim;
    use crate::zone::ZoneAssembler;
    use hickory_proto::rr::{LowerName, Name};
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn generation(n: u8) -> Snapshot {
        let assembler = ZoneAssembler::new(vec![LowerName::from(Name::root())], 60);
        let address = format!("10.0.0.{}", n);
        let tag = format!("coredns:plugin:ospfip:host{}.zone{}.example.net", n, n);
        assembler
            .assemble([(address.as_str(), derive_claim(&[tag]))])
            .unwrap()
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = SnapshotStore::new();
        assert_eq!(store.get().zones_count(), 0);
        assert!(store.get().reverse_records().is_empty());
    }

    #[test]
    fn test_replace_swaps_snapshot() {
        let store = SnapshotStore::new();
        store.replace(generation(1));
        assert_eq!(store.get().zone_names()[0].to_string(), "zone1.example.net.");

        store.replace(generation(2));
        assert_eq!(store.get().zone_names()[0].to_string(), "zone2.example.net.");
    }

    #[test]
    fn test_reader_keeps_its_snapshot_across_replace() {
        let store = SnapshotStore::with_snapshot(generation(1));
        let held = store.get();

        store.replace(generation(2));

        assert_eq!(held.zone_names()[0].to_string(), "zone1.example.net.");
        assert_eq!(store.get().zone_names()[0].to_string(), "zone2.example.net.");
    }

    #[test]
    fn test_clones_share_state() {
        let store = SnapshotStore::new();
        let clone = store.clone();
        clone.replace(generation(3));
        assert_eq!(store.get().zones_count(), 1);
    }

    #[test]
    fn test_readers_never_see_mixed_generations() {
        let store = SnapshotStore::with_snapshot(generation(1));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        let snapshot = store.get();
                        let zone = snapshot.zone_names()[0].to_string();
                        let n: u8 = zone
                            .trim_start_matches("zone")
                            .split('.')
                            .next()
                            .unwrap()
                            .parse()
                            .unwrap();
                        let addr: IpAddr = format!("10.0.0.{}", n).parse().unwrap();
                        assert_eq!(snapshot.reverse_records().len(), 1);
                        assert_eq!(
                            snapshot.reverse_name(&addr).map(|name| name.to_string()),
                            Some(format!("host{}.zone{}.example.net.", n, n))
                        );
                    }
                })
            })
            .collect();

        for n in 2..=200u8 {
            store.replace(generation(n));
        }
        done.store(true, Ordering::Relaxed);

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
