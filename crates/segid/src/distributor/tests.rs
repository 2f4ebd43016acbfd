use crate::{
    ChainNode, Error, IdSegment, MaxIdStore, MemoryMaxIdStore, ReservedSegment, Result,
    SegmentDistributor, StoreSegmentDistributor, TTL_FOREVER, TimeSource,
};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    thread::scope,
};

struct FixedTime(u64);

impl TimeSource for FixedTime {
    fn current_secs(&self) -> u64 {
        self.0
    }
}

fn distributor(
    namespace: &str,
    step: u64,
) -> StoreSegmentDistributor<MemoryMaxIdStore, FixedTime> {
    let store = Arc::new(MemoryMaxIdStore::with_auto_create());
    StoreSegmentDistributor::new(namespace, step, store, FixedTime(42)).unwrap()
}

/// A distributor that replays a fixed list of maxima.
struct Scripted {
    step: u64,
    maxima: Mutex<Vec<u64>>,
}

impl SegmentDistributor for Scripted {
    fn namespace(&self) -> &str {
        "scripted"
    }

    fn step(&self) -> u64 {
        self.step
    }

    fn now_secs(&self) -> u64 {
        0
    }

    fn reserve_max_id(&self, _step: u64) -> Result<u64> {
        Ok(self.maxima.lock().unwrap().remove(0))
    }
}

#[test]
fn constructor_rejects_empty_namespace_and_zero_step() {
    let store = Arc::new(MemoryMaxIdStore::new());
    assert!(matches!(
        StoreSegmentDistributor::new("", 10, store.clone(), FixedTime(0)),
        Err(Error::InvalidConfig { .. })
    ));
    assert!(matches!(
        StoreSegmentDistributor::new("orders", 0, store, FixedTime(0)),
        Err(Error::InvalidConfig { .. })
    ));
}

#[test]
fn step_for_multiplies_and_detects_overflow() {
    let d = distributor("orders", 100);
    assert_eq!(d.step_for(1).unwrap(), 100);
    assert_eq!(d.step_for(8).unwrap(), 800);

    let d = distributor("orders", u64::MAX / 2);
    assert_eq!(
        d.step_for(3),
        Err(Error::StepOverflow {
            step: u64::MAX / 2,
            segments: 3
        })
    );
}

#[test]
fn consecutive_segments_are_disjoint_and_increasing() {
    let d = distributor("orders", 10);

    let first = d.next_segment(TTL_FOREVER).unwrap();
    let second = d.next_segment(TTL_FOREVER).unwrap();

    assert_eq!((first.start_id(), first.max_id()), (1, 10));
    assert_eq!((second.start_id(), second.max_id()), (11, 20));
    assert_eq!(first.created_at_secs(), 42);
    assert!(!first.is_merged());
}

#[test]
fn multi_step_reservation_yields_a_merged_segment() {
    let d = distributor("orders", 10);
    d.next_segment(TTL_FOREVER).unwrap();

    let merged = d.next_segments(4, 60).unwrap();
    let ReservedSegment::Merged(inner) = &merged else {
        panic!("expected a merged segment, got {merged}");
    };
    assert_eq!(inner.segments(), 4);
    assert_eq!((merged.start_id(), merged.max_id()), (11, 50));
    assert_eq!(merged.step(), 40);
    assert_eq!(merged.ttl_secs(), 60);

    assert!(!d.next_segments(1, TTL_FOREVER).unwrap().is_merged());
    assert!(matches!(
        d.next_segments(0, TTL_FOREVER),
        Err(Error::InvalidConfig { .. })
    ));
}

#[test]
fn chain_nodes_carry_versions() {
    let d = distributor("orders", 10);

    let root = d.next_chain_node(None, 1, TTL_FOREVER).unwrap();
    let next = d.next_chain_node(Some(&root), 2, TTL_FOREVER).unwrap();

    assert_eq!(root.version(), 0);
    assert_eq!(next.version(), 1);
    assert_eq!(next.start_id(), root.max_id() + 1);
    assert!(Arc::ptr_eq(&next.previous().unwrap(), &root));
}

#[test]
fn maximum_smaller_than_the_step_is_an_ordering_anomaly() {
    // A store that hands back a maximum smaller than the step cannot form a
    // range of positive ids.
    let d = Scripted {
        step: 10,
        maxima: Mutex::new(vec![5]),
    };
    let err = d.next_segment(TTL_FOREVER).unwrap_err();
    assert!(err.is_ordering_anomaly());
    assert!(!err.is_transient());
}

#[test]
fn short_merged_reservation_is_reported_against_the_previous_node() {
    let d = Scripted {
        step: 1000,
        maxima: Mutex::new(vec![2000, 1500]),
    };
    let root = d.next_chain_node(None, 2, TTL_FOREVER).unwrap();
    assert_eq!((root.start_id(), root.max_id()), (1, 2000));

    assert_eq!(
        d.next_chain_node(Some(&root), 2, TTL_FOREVER).unwrap_err(),
        Error::NextIdSegmentExpired {
            namespace: "scripted".into(),
            tail_max_id: 2000,
            candidate_start_id: 0,
        }
    );
}

#[test]
fn distributor_surfaces_segment_validation_errors() {
    let d = Scripted {
        step: 10,
        maxima: Mutex::new(vec![100]),
    };
    assert!(matches!(
        d.next_segment(0),
        Err(Error::InvalidConfig { .. })
    ));
}

#[test]
fn candidate_nodes_are_not_checked_until_installed() {
    let d = Scripted {
        step: 10,
        maxima: Mutex::new(vec![100, 50]),
    };
    let first = d.next_chain_node(None, 1, TTL_FOREVER).unwrap();
    let behind: Arc<ChainNode> = d.next_chain_node(Some(&first), 1, TTL_FOREVER).unwrap();
    assert!(behind.start_id() < first.max_id());
}

#[test]
fn memory_store_requires_created_namespaces_by_default() {
    let store = MemoryMaxIdStore::new();
    assert!(!store.auto_create());
    assert_eq!(
        store.reserve("orders", 10),
        Err(Error::NotFoundMaxId {
            namespace: "orders".into()
        })
    );
    assert_eq!(store.current("orders").unwrap(), None);

    assert!(store.create("orders", 1000).unwrap());
    assert!(!store.create("orders", 0).unwrap(), "create is not an upsert");
    assert_eq!(store.reserve("orders", 10).unwrap(), 1010);
    assert_eq!(store.current("orders").unwrap(), Some(1010));

    assert!(store.create("", 0).is_err());
}

#[test]
fn memory_store_auto_creates_at_zero() {
    let store = MemoryMaxIdStore::with_auto_create();
    assert_eq!(store.reserve("a", 5).unwrap(), 5);
    assert_eq!(store.reserve("b", 7).unwrap(), 7);
    assert_eq!(store.reserve("a", 5).unwrap(), 10);
}

#[test]
fn memory_store_reports_overflow_as_a_permanent_error() {
    let store = MemoryMaxIdStore::new();
    store.create("orders", u64::MAX - 1).unwrap();
    let err = store.reserve("orders", 2).unwrap_err();
    assert_eq!(
        err,
        Error::MaxIdOverflow {
            namespace: "orders".into(),
            max_id: u64::MAX - 1,
            step: 2,
        }
    );
    assert!(!err.is_transient());
    assert_eq!(store.current("orders").unwrap(), Some(u64::MAX - 1));
}

fn assert_concurrent_reservations_are_disjoint<S: MaxIdStore>(store: &S) {
    const THREADS: usize = 8;
    const RESERVATIONS: usize = 250;
    const STEP: u64 = 10;

    let seen = Mutex::new(HashSet::new());
    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let local: Vec<u64> = (0..RESERVATIONS)
                    .map(|_| store.reserve("orders", STEP).unwrap())
                    .collect();
                let mut seen = seen.lock().unwrap();
                for max_id in local {
                    assert!(seen.insert(max_id), "max id {max_id} handed out twice");
                }
            });
        }
    });

    let seen = seen.into_inner().unwrap();
    let total = (THREADS * RESERVATIONS) as u64;
    assert_eq!(seen.len() as u64, total);
    assert_eq!(seen.iter().max().copied(), Some(total * STEP));
    assert!(seen.iter().all(|max_id| max_id % STEP == 0));
}

#[test]
fn memory_store_reservations_are_atomic() {
    assert_concurrent_reservations_are_disjoint(&MemoryMaxIdStore::with_auto_create());
}

#[cfg(feature = "sled")]
mod sled_store {
    use super::*;
    use crate::SledMaxIdStore;

    fn open(dir: &tempfile::TempDir) -> SledMaxIdStore {
        SledMaxIdStore::open(dir.path().join("max-id")).unwrap()
    }

    #[test]
    fn sled_store_mirrors_memory_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);

        assert!(matches!(
            store.reserve("orders", 10),
            Err(Error::NotFoundMaxId { .. })
        ));
        assert!(store.create("orders", 100).unwrap());
        assert!(!store.create("orders", 0).unwrap());
        assert_eq!(store.reserve("orders", 10).unwrap(), 110);
        assert_eq!(store.current("orders").unwrap(), Some(110));
        assert_eq!(store.current("missing").unwrap(), None);

        let store = store.with_auto_create(true);
        assert_eq!(store.reserve("fresh", 3).unwrap(), 3);
    }

    #[test]
    fn sled_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open(&dir).with_auto_create(true);
            store.reserve("orders", 10).unwrap();
            store.reserve("orders", 10).unwrap();
        }
        let store = open(&dir);
        assert_eq!(store.current("orders").unwrap(), Some(20));
        assert_eq!(store.reserve("orders", 10).unwrap(), 30);
    }

    #[test]
    fn sled_store_reports_overflow_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        store.create("orders", u64::MAX).unwrap();
        let err = store.reserve("orders", 1).unwrap_err();
        assert!(matches!(err, Error::MaxIdOverflow { max_id: u64::MAX, step: 1, .. }));
        assert!(!err.is_transient());
        assert_eq!(store.current("orders").unwrap(), Some(u64::MAX));
    }

    #[test]
    fn sled_store_reservations_are_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir)
            .with_auto_create(true)
            .with_flush_on_reserve(false);
        assert_concurrent_reservations_are_disjoint(&store);
    }

    #[test]
    fn distributor_over_sled_issues_consecutive_segments() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(open(&dir).with_auto_create(true));
        let d = StoreSegmentDistributor::new("orders", 100, store, FixedTime(7)).unwrap();

        let a = d.next_segment(TTL_FOREVER).unwrap();
        let b = d.next_segments(3, TTL_FOREVER).unwrap();
        assert_eq!((a.start_id(), a.max_id()), (1, 100));
        assert_eq!((b.start_id(), b.max_id()), (101, 400));
    }
}
