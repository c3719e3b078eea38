use std::{collections::HashMap, num::NonZeroUsize};

use parking_lot::Mutex;
use tracing::Span;

use crate::{
    entry::{unix_now, Entry},
    store::{LocationStore, StoreError},
};

/// Process-local history store. A single lock guards every history, and the
/// sweeper takes the same lock as request handlers.
///
/// Histories that become empty through expiry are removed, so a fully expired
/// order reads as not found.
pub struct InMemoryStore {
    data: Mutex<HashMap<String, Vec<Entry>>>,
    ttl: u64,
    max_entries: Option<NonZeroUsize>,
}

impl InMemoryStore {
    pub fn new(ttl: u64) -> Self {
        InMemoryStore {
            data: Mutex::new(HashMap::new()),
            ttl,
            max_entries: None,
        }
    }

    /// Caps every history at `max_entries`, dropping the oldest entries first.
    pub fn with_max_entries(mut self, max_entries: Option<NonZeroUsize>) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// Number of orders currently holding history.
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    pub(crate) fn append_at(&self, order_id: &str, mut entry: Entry, now: u64) {
        let mut data = self.data.lock();
        let history = data.entry(order_id.to_string()).or_default();
        // Keep creation times non-decreasing even if the wall clock steps back
        entry.created_at = match history.last() {
            Some(last) => now.max(last.created_at),
            None => now,
        };
        history.push(entry);
        if let Some(max) = self.max_entries {
            if history.len() > max.get() {
                let excess = history.len() - max.get();
                history.drain(..excess);
            }
        }
    }

    /// Drops every entry older than the ttl as of `now` and returns how many
    /// were removed.
    pub fn expire_at(&self, now: u64) -> usize {
        let ttl = self.ttl;
        let mut removed = 0;
        self.data.lock().retain(|_, history| {
            // Histories are in creation order, so the newest expired entry
            // marks the cut and everything before it goes too.
            if let Some(boundary) = history.iter().rposition(|e| e.age(now) > ttl) {
                history.drain(..=boundary);
                removed += boundary + 1;
            }
            !history.is_empty()
        });
        removed
    }

    pub fn expire(&self) -> usize {
        self.expire_at(unix_now())
    }
}

impl LocationStore for InMemoryStore {
    #[tracing::instrument(level = "debug", skip(self, entry))]
    fn append(&self, order_id: &str, entry: Entry) -> Result<(), StoreError> {
        self.append_at(order_id, entry, unix_now());
        Ok(())
    }

    #[tracing::instrument(
        level = "debug",
        skip(self),
        fields(history_len = tracing::field::Empty)
    )]
    fn read(&self, order_id: &str, depth: Option<i64>) -> Result<Vec<Entry>, StoreError> {
        let data = self.data.lock();
        let history = match data.get(order_id) {
            Some(history) => history,
            None => {
                let err = StoreError::NotFound(order_id.to_string());
                tracing::debug!(error = %err);
                return Err(err);
            }
        };
        Span::current().record("history_len", history.len() as u64);

        let start = match depth {
            Some(depth) => {
                let len = history.len() as i64;
                (len - depth.clamp(0, len)) as usize
            }
            None => 0,
        };
        Ok(history[start..].to_vec())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn delete(&self, order_id: &str) -> Result<(), StoreError> {
        match self.data.lock().remove(order_id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(order_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, sync::Arc, thread};

    use super::InMemoryStore;
    use crate::{
        entry::{unix_now, Entry},
        store::{LocationStore, StoreError},
    };

    fn coords(entries: &[Entry]) -> Vec<(f32, f32)> {
        entries.iter().map(|e| (e.latitude, e.longitude)).collect()
    }

    #[test]
    fn append_then_read() {
        let store = InMemoryStore::new(60);
        let before = unix_now();
        store.append("A", Entry::new(1.0, 2.0)).unwrap();
        let after = unix_now();

        let history = store.read("A", None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(coords(&history), vec![(1.0, 2.0)]);
        assert!(history[0].created_at >= before);
        assert!(history[0].created_at <= after);
    }

    #[test]
    fn read_preserves_insertion_order() {
        let store = InMemoryStore::new(60);
        for i in 0..5 {
            store.append("A", Entry::new(i as f32, 0.0)).unwrap();
        }
        let history = store.read("A", None).unwrap();
        assert_eq!(
            coords(&history),
            vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]
        );
    }

    #[test]
    fn read_with_depth() {
        let store = InMemoryStore::new(60);
        store.append("B", Entry::new(1.0, 1.0)).unwrap();
        store.append("B", Entry::new(2.0, 2.0)).unwrap();
        store.append("B", Entry::new(3.0, 3.0)).unwrap();

        assert_eq!(
            coords(&store.read("B", Some(2)).unwrap()),
            vec![(2.0, 2.0), (3.0, 3.0)]
        );
        assert_eq!(coords(&store.read("B", Some(1)).unwrap()), vec![(3.0, 3.0)]);
        assert_eq!(store.read("B", Some(3)).unwrap().len(), 3);
    }

    #[test]
    fn read_depth_out_of_range_is_clamped() {
        let store = InMemoryStore::new(60);
        store.append("B", Entry::new(1.0, 1.0)).unwrap();
        store.append("B", Entry::new(2.0, 2.0)).unwrap();

        assert!(store.read("B", Some(0)).unwrap().is_empty());
        assert!(store.read("B", Some(-4)).unwrap().is_empty());
        assert_eq!(store.read("B", Some(10)).unwrap().len(), 2);
        assert_eq!(store.read("B", Some(i64::MAX)).unwrap().len(), 2);
    }

    #[test]
    fn read_returns_snapshot() {
        let store = InMemoryStore::new(60);
        store.append_at("A", Entry::new(1.0, 1.0), 100);
        let snapshot = store.read("A", None).unwrap();

        store.append_at("A", Entry::new(2.0, 2.0), 101);
        store.expire_at(1_000);
        assert_eq!(coords(&snapshot), vec![(1.0, 1.0)]);
    }

    #[test]
    fn missing_key() {
        let store = InMemoryStore::new(60);
        assert_eq!(
            store.read("nope", None),
            Err(StoreError::NotFound("nope".to_string()))
        );
        assert_eq!(
            store.delete("nope"),
            Err(StoreError::NotFound("nope".to_string()))
        );
    }

    #[test]
    fn delete_removes_history() {
        let store = InMemoryStore::new(60);
        store.append("A", Entry::new(1.0, 2.0)).unwrap();
        store.append("B", Entry::new(3.0, 4.0)).unwrap();

        store.delete("A").unwrap();
        assert!(matches!(store.read("A", None), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("A"), Err(StoreError::NotFound(_))));
        assert_eq!(store.read("B", None).unwrap().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn created_at_never_decreases() {
        let store = InMemoryStore::new(60);
        store.append_at("A", Entry::new(1.0, 1.0), 200);
        store.append_at("A", Entry::new(2.0, 2.0), 150);
        let history = store.read("A", None).unwrap();
        assert_eq!(history[0].created_at, 200);
        assert_eq!(history[1].created_at, 200);
    }

    #[test]
    fn max_entries_drops_oldest() {
        let store = InMemoryStore::new(60).with_max_entries(NonZeroUsize::new(2));
        for i in 0..4 {
            store.append("A", Entry::new(i as f32, 0.0)).unwrap();
        }
        assert_eq!(
            coords(&store.read("A", None).unwrap()),
            vec![(2.0, 0.0), (3.0, 0.0)]
        );
    }

    #[test]
    fn max_entries_of_one_keeps_latest() {
        let store = InMemoryStore::new(60).with_max_entries(NonZeroUsize::new(1));
        store.append("A", Entry::new(1.0, 0.0)).unwrap();
        store.append("A", Entry::new(2.0, 0.0)).unwrap();
        assert_eq!(coords(&store.read("A", None).unwrap()), vec![(2.0, 0.0)]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn ttl_boundary() {
        // ttl 5s swept every second, appended at t0
        let t0 = 1_000;
        let store = InMemoryStore::new(5);
        store.append_at("A", Entry::new(1.0, 2.0), t0);

        assert_eq!(store.expire_at(t0 + 3), 0);
        assert_eq!(coords(&store.read("A", None).unwrap()), vec![(1.0, 2.0)]);

        assert_eq!(store.expire_at(t0 + 5), 0);
        assert_eq!(store.read("A", None).unwrap().len(), 1);

        // Gone by the first sweep after t0 + ttl
        assert_eq!(store.expire_at(t0 + 5 + 1), 1);
        assert!(matches!(store.read("A", None), Err(StoreError::NotFound(_))));

        assert_eq!(store.expire_at(t0 + 7), 0);
        assert!(matches!(store.read("A", None), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn expire_cuts_prefix() {
        let store = InMemoryStore::new(5);
        store.append_at("A", Entry::new(1.0, 0.0), 100);
        store.append_at("A", Entry::new(2.0, 0.0), 102);
        store.append_at("A", Entry::new(3.0, 0.0), 104);

        // Age equal to the ttl is kept
        assert_eq!(store.expire_at(105), 0);
        assert_eq!(store.read("A", None).unwrap().len(), 3);

        assert_eq!(store.expire_at(107), 1);
        assert_eq!(
            coords(&store.read("A", None).unwrap()),
            vec![(2.0, 0.0), (3.0, 0.0)]
        );

        assert_eq!(store.expire_at(108), 1);
        assert_eq!(coords(&store.read("A", None).unwrap()), vec![(3.0, 0.0)]);
    }

    #[test]
    fn expire_removes_emptied_keys() {
        let store = InMemoryStore::new(5);
        store.append_at("A", Entry::new(1.0, 2.0), 0);
        store.append_at("B", Entry::new(1.0, 2.0), 4);

        assert_eq!(store.read("A", Some(10)).unwrap().len(), 1);
        assert_eq!(store.expire_at(7), 1);
        assert!(matches!(store.read("A", None), Err(StoreError::NotFound(_))));
        assert_eq!(store.read("B", None).unwrap().len(), 1);
        assert_eq!(store.len(), 1);

        assert_eq!(store.expire_at(100), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn expire_on_empty_store() {
        let store = InMemoryStore::new(5);
        assert_eq!(store.expire_at(1_000), 0);
        assert_eq!(store.expire(), 0);
    }

    #[test]
    fn concurrent_appends() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let store = Arc::new(InMemoryStore::new(3_600));
        let mut handles = Vec::new();
        for t in 0..THREADS {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for i in 0..PER_THREAD {
                    store
                        .append("shared", Entry::new(t as f32, i as f32))
                        .unwrap();
                }
            }));
        }
        // Sweep alongside the writers; nothing is old enough to go
        let sweeper = {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    store.expire();
                    let _ = store.read("shared", Some(3));
                }
            })
        };
        for handle in handles {
            handle.join().unwrap();
        }
        sweeper.join().unwrap();

        let history = store.read("shared", None).unwrap();
        assert_eq!(history.len(), THREADS * PER_THREAD);
        for t in 0..THREADS {
            let seen: Vec<f32> = history
                .iter()
                .filter(|e| e.latitude == t as f32)
                .map(|e| e.longitude)
                .collect();
            // Each writer's entries appear once each and in its own order
            assert_eq!(seen, (0..PER_THREAD).map(|i| i as f32).collect::<Vec<_>>());
        }
    }
}
