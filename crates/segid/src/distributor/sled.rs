use crate::{Error, MaxIdStore, Result};
use std::path::Path;
use tracing::{info, trace};

/// Name of the sled tree holding one `namespace -> max id` entry per
/// namespace.
pub const MAX_ID_TREE: &str = "segid_max_id";

/// A durable [`MaxIdStore`] on top of an embedded sled database.
///
/// Values are the big-endian `u64` maximum. [`MaxIdStore::reserve`] runs
/// sled's compare-and-swap retry loop (`update_and_fetch`), so every
/// reservation is one atomic transition of the stored value and concurrent
/// reservations can never both observe the same maximum.
///
/// sled admits a single process per database directory: processes that need
/// to share a namespace must go through the process owning the store.
#[derive(Debug, Clone)]
pub struct SledMaxIdStore {
    tree: sled::Tree,
    auto_create: bool,
    flush_on_reserve: bool,
}

impl SledMaxIdStore {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if sled cannot open the database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|e| Error::store(MAX_ID_TREE, e))?;
        info!(path = %path.display(), "opened sled max id store");
        Self::from_db(&db)
    }

    /// Uses the [`MAX_ID_TREE`] tree of an already opened database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the tree cannot be opened.
    pub fn from_db(db: &sled::Db) -> Result<Self> {
        let tree = db
            .open_tree(MAX_ID_TREE)
            .map_err(|e| Error::store(MAX_ID_TREE, e))?;
        Ok(Self {
            tree,
            auto_create: false,
            flush_on_reserve: true,
        })
    }

    /// Start unknown namespaces at zero on first reservation.
    #[must_use]
    pub const fn with_auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = auto_create;
        self
    }

    /// Flush to disk after every reservation (the default). Turning this off
    /// trades durability of the last few reservations for latency.
    #[must_use]
    pub const fn with_flush_on_reserve(mut self, flush: bool) -> Self {
        self.flush_on_reserve = flush;
        self
    }

    fn decode(namespace: &str, bytes: &[u8]) -> Result<u64> {
        <[u8; 8]>::try_from(bytes)
            .map(u64::from_be_bytes)
            .map_err(|_| Error::store(namespace, format!("corrupt max id of {} bytes", bytes.len())))
    }
}

impl MaxIdStore for SledMaxIdStore {
    fn reserve(&self, namespace: &str, step: u64) -> Result<u64> {
        let mut failure = None;
        let updated = self
            .tree
            .update_and_fetch(namespace, |old| {
                // The closure may run several times under contention.
                failure = None;
                let current = match old {
                    Some(bytes) => match Self::decode(namespace, bytes) {
                        Ok(current) => current,
                        Err(e) => {
                            failure = Some(e);
                            return Some(bytes.to_vec());
                        }
                    },
                    None if self.auto_create => 0,
                    None => {
                        failure = Some(Error::not_found(namespace));
                        return None;
                    }
                };
                match current.checked_add(step) {
                    Some(next) => Some(next.to_be_bytes().to_vec()),
                    None => {
                        failure = Some(Error::max_id_overflow(namespace, current, step));
                        Some(current.to_be_bytes().to_vec())
                    }
                }
            })
            .map_err(|e| Error::store(namespace, e))?;

        if let Some(e) = failure {
            return Err(e);
        }
        let bytes = updated.ok_or_else(|| Error::not_found(namespace))?;
        let max_id = Self::decode(namespace, &bytes)?;

        if self.flush_on_reserve {
            self.tree.flush().map_err(|e| Error::store(namespace, e))?;
        }
        trace!(namespace, step, max_id, "sled reserve");
        Ok(max_id)
    }

    fn create(&self, namespace: &str, initial_max_id: u64) -> Result<bool> {
        if namespace.is_empty() {
            return Err(Error::invalid_config("namespace can not be empty"));
        }
        let swapped = self
            .tree
            .compare_and_swap(
                namespace,
                None::<&[u8]>,
                Some(initial_max_id.to_be_bytes().to_vec()),
            )
            .map_err(|e| Error::store(namespace, e))?;
        if swapped.is_ok() {
            self.tree.flush().map_err(|e| Error::store(namespace, e))?;
        }
        Ok(swapped.is_ok())
    }

    fn current(&self, namespace: &str) -> Result<Option<u64>> {
        self.tree
            .get(namespace)
            .map_err(|e| Error::store(namespace, e))?
            .map(|bytes| Self::decode(namespace, &bytes))
            .transpose()
    }
}
