use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use crate::client::ClientKey;
use crate::rate_limit::RateLimitEntry;

/// Storage for per-client window/block state.
///
/// Implementations must run `update` as a single atomic read-modify-write
/// for the given key, and must evaluate the `delete_if` predicate under the
/// same guard as the removal. An in-process map satisfies both with a
/// per-shard lock; a shared backend would use a transaction or script.
pub trait RateLimitStore: Send + Sync {
    fn get(&self, key: &ClientKey) -> Option<RateLimitEntry>;

    fn upsert(&self, key: &ClientKey, entry: RateLimitEntry);

    /// Removes the entry only if `pred` holds for its current value.
    fn delete_if(&self, key: &ClientKey, pred: &dyn Fn(&RateLimitEntry) -> bool) -> bool;

    /// Hands the current slot to `f`; whatever `f` leaves in it is stored,
    /// `None` meaning remove.
    fn update(&self, key: &ClientKey, f: &mut dyn FnMut(&mut Option<RateLimitEntry>));

    fn keys(&self) -> Vec<ClientKey>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Process-local store, state is lost on restart
#[derive(Default)]
pub struct InMemoryStore {
    entries: DashMap<ClientKey, RateLimitEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryStore {
    fn get(&self, key: &ClientKey) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|e| *e)
    }

    fn upsert(&self, key: &ClientKey, entry: RateLimitEntry) {
        self.entries.insert(key.clone(), entry);
    }

    fn delete_if(&self, key: &ClientKey, pred: &dyn Fn(&RateLimitEntry) -> bool) -> bool {
        self.entries.remove_if(key, |_, entry| pred(entry)).is_some()
    }

    fn update(&self, key: &ClientKey, f: &mut dyn FnMut(&mut Option<RateLimitEntry>)) {
        // the entry guard holds the shard lock until the match ends
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let mut slot = Some(*occupied.get());
                f(&mut slot);
                match slot {
                    Some(entry) => {
                        occupied.insert(entry);
                    }
                    None => {
                        occupied.remove();
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                f(&mut slot);
                if let Some(entry) = slot {
                    vacant.insert(entry);
                }
            }
        }
    }

    fn keys(&self) -> Vec<ClientKey> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
