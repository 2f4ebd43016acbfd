use crate::{Error, MaxIdStore, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

/// An in-process [`MaxIdStore`].
///
/// Each reservation is one critical section over the namespace map, which
/// makes it atomic for every thread of this process. It is not shared across
/// processes; use it for tests, single-process services, or as the tier in
/// front of a durable store.
#[derive(Debug, Default)]
pub struct MemoryMaxIdStore {
    maxima: Mutex<HashMap<String, u64>>,
    auto_create: bool,
}

impl MemoryMaxIdStore {
    /// An empty store that only reserves for namespaces created via
    /// [`MaxIdStore::create`].
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store that starts unknown namespaces at zero on first
    /// reservation.
    pub fn with_auto_create() -> Self {
        Self {
            maxima: Mutex::default(),
            auto_create: true,
        }
    }

    pub const fn auto_create(&self) -> bool {
        self.auto_create
    }
}

impl MaxIdStore for MemoryMaxIdStore {
    fn reserve(&self, namespace: &str, step: u64) -> Result<u64> {
        let mut maxima = self.maxima.lock();
        let current = if self.auto_create {
            maxima.entry(namespace.to_owned()).or_insert(0)
        } else {
            maxima
                .get_mut(namespace)
                .ok_or_else(|| Error::not_found(namespace))?
        };
        let next = current
            .checked_add(step)
            .ok_or_else(|| Error::max_id_overflow(namespace, *current, step))?;
        *current = next;
        Ok(next)
    }

    fn create(&self, namespace: &str, initial_max_id: u64) -> Result<bool> {
        if namespace.is_empty() {
            return Err(Error::invalid_config("namespace can not be empty"));
        }
        let mut maxima = self.maxima.lock();
        if maxima.contains_key(namespace) {
            return Ok(false);
        }
        maxima.insert(namespace.to_owned(), initial_max_id);
        Ok(true)
    }

    fn current(&self, namespace: &str) -> Result<Option<u64>> {
        Ok(self.maxima.lock().get(namespace).copied())
    }
}
