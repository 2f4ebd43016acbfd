use crate::app::config::{AppConfig, StoreKind};
use segid::{MaxIdStore, MemoryMaxIdStore, Result, SledMaxIdStore};

/// The store selected by `STORE`.
#[derive(Debug)]
pub enum AppStore {
    Memory(MemoryMaxIdStore),
    Sled(SledMaxIdStore),
}

impl AppStore {
    /// Opens the configured store. Both kinds start unknown namespaces at
    /// zero.
    pub fn open(config: &AppConfig) -> Result<Self> {
        match config.store {
            StoreKind::Memory => Ok(Self::Memory(MemoryMaxIdStore::with_auto_create())),
            StoreKind::Sled => SledMaxIdStore::open(&config.sled_path)
                .map(|store| Self::Sled(store.with_auto_create(true))),
        }
    }
}

impl MaxIdStore for AppStore {
    fn reserve(&self, namespace: &str, step: u64) -> Result<u64> {
        match self {
            Self::Memory(store) => store.reserve(namespace, step),
            Self::Sled(store) => store.reserve(namespace, step),
        }
    }

    fn create(&self, namespace: &str, initial_max_id: u64) -> Result<bool> {
        match self {
            Self::Memory(store) => store.create(namespace, initial_max_id),
            Self::Sled(store) => store.create(namespace, initial_max_id),
        }
    }

    fn current(&self, namespace: &str) -> Result<Option<u64>> {
        match self {
            Self::Memory(store) => store.current(namespace),
            Self::Sled(store) => store.current(namespace),
        }
    }
}
