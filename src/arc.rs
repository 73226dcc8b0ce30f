//! `shptr::arc::Arc<T>` is very similar to `std::sync::Arc<T>`, but with a
//! pluggable allocator and destruction policy, like C++'s `shared_ptr`.
//!
//! See [`Shared`][crate::Shared] for the detailed API, as it's the same as
//! `shptr::rc::Rc<T>`.
//!
//! ## See also
//!
//! `shptr::rc::Rc<T>` in this crate is nonatomic version for single-threaded
//! use.
use crate::{
    allocator::Global,
    block::{private, Count, LOCKED},
    destroy::DropInPlace,
    shared,
    sync::{
        fence, spin_loop, AtomicUsize,
        Ordering::{Acquire, Relaxed, Release},
    },
};

impl private::Sealed for AtomicUsize {}

unsafe impl Count for AtomicUsize {
    fn new(v: usize) -> Self {
        AtomicUsize::new(v)
    }

    fn get(&self) -> usize {
        // relaxed ordering as this is only advisory
        self.load(Relaxed)
    }

    fn inc_relaxed(&self) -> usize {
        // Only called by a live handle, so the count can't reach zero
        // concurrently and there is nothing to synchronize with.
        self.fetch_add(1, Relaxed)
    }

    fn inc_if_nonzero(&self) -> bool {
        // Checking then incrementing would race with the last strong pointer
        // going away in between, so retry the exchange until it either
        // succeeds or sees zero.
        let mut n = self.load(Relaxed);
        loop {
            if n == 0 {
                return false;
            }
            match self.compare_exchange_weak(n, n + 1, Acquire, Relaxed) {
                Ok(_) => return true,
                Err(actual) => n = actual,
            }
        }
    }

    fn inc_unless_locked(&self) {
        let mut n = self.load(Relaxed);
        loop {
            if n == LOCKED {
                spin_loop();
                n = self.load(Relaxed);
                continue;
            }
            // Acquire pairs with `unlock`, so the `get_mut` caller's view of
            // the strong count is settled before this weak pointer exists.
            match self.compare_exchange_weak(n, n + 1, Acquire, Relaxed) {
                Ok(_) => return,
                Err(actual) => n = actual,
            }
        }
    }

    fn dec(&self) -> usize {
        self.fetch_sub(1, Release)
    }

    fn dec_if_one(&self) -> bool {
        self.compare_exchange(1, 0, Acquire, Relaxed).is_ok()
    }

    fn try_lock(&self) -> bool {
        self.compare_exchange(1, LOCKED, Acquire, Relaxed).is_ok()
    }

    fn unlock(&self) {
        self.store(1, Release)
    }

    fn set_release(&self, value: usize) {
        self.store(value, Release)
    }

    fn acquire_fence(&self) {
        fence(Acquire);
    }
}

/// Atomic count type.
pub type Atomic = AtomicUsize;

pub type Arc<T, A = Global, P = DropInPlace> = shared::Shared<T, Atomic, A, P>;
pub type Weak<T, A = Global, P = DropInPlace> = shared::Weak<T, Atomic, A, P>;

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::destroy::{ByValue, Destroy};
    use crate::test_util::{check_count_model, op, DropCounter, Failing, Stats, SyncDropCounter, Tracking};
    use crate::{AllocError, Allocator};
    use core::cell::Cell;
    use proptest::prelude::*;
    use std::{sync::Barrier, thread, vec::Vec};

    fn counts<T, A: Allocator, P: Destroy<T, A>>(x: &Arc<T, A, P>) -> (usize, usize) {
        (Arc::strong_count(x), Arc::weak_count(x))
    }
    fn wcounts<T>(x: &Weak<T>) -> (usize, usize) {
        (Weak::strong_count(x), Weak::weak_count(x))
    }

    #[test]
    fn test_simpler() {
        let x = Arc::new(2);
        assert_eq!(*x, 2);
        assert_eq!(counts(&x), (1, 0));
        drop(x);
    }

    #[test]
    fn test_simple() {
        let x = Arc::new(2);
        let y = x.clone();
        assert_eq!(*x, 2);
        assert_eq!(&*x as *const i32, &*y as *const i32);
        drop(x);
        assert_eq!(*y, 2);
    }

    #[test]
    fn test_weak() {
        let x = Arc::new(2);
        let y = Arc::downgrade(&x);
        assert_eq!(wcounts(&y), (1, 1));
        drop(x);
        assert!(y.expired());
        assert!(y.upgrade().is_none());
        drop(y);
    }

    #[test]
    fn test_cyclic() {
        struct Cyclic(Weak<Cyclic>);
        let x = Arc::new_cyclic(|p| Cyclic(p.clone()));
        assert_eq!(Arc::strong_count(&x), 1);
        assert_eq!(Arc::weak_count(&x), 1);
    }

    #[test]
    fn test_get_mut() {
        let mut x = Arc::new(1);
        *Arc::get_mut(&mut x).unwrap() += 1;
        let w = Arc::downgrade(&x);
        assert!(Arc::get_mut(&mut x).is_none());
        drop(w);
        assert_eq!(Arc::try_unwrap(x).ok(), Some(2));
    }

    #[test]
    fn test_alloc_failure() {
        let n = Cell::new(0);
        let r = Arc::try_new_in(DropCounter(1, &n), Failing);
        assert_eq!(r.err(), Some(AllocError));
        assert_eq!(n.get(), 1);
    }

    #[test]
    fn test_try_new_in_tracking() {
        let stats = Stats::default();
        let x = Arc::try_new_in(7, Tracking(&stats)).unwrap();
        assert_eq!(*x, 7);
        assert_eq!(stats.live(), 1);
        drop(x);
        assert_eq!(stats.live(), 0);
    }

    #[test]
    fn test_threads_take_and_release() {
        for n in [0, 1, 4, 16] {
            let drops = std::sync::atomic::AtomicUsize::new(0);
            let x = Arc::new(SyncDropCounter(3, &drops));
            thread::scope(|s| {
                for _ in 0..n {
                    let x = &x;
                    s.spawn(move || {
                        for _ in 0..1000 {
                            let y = x.clone();
                            assert_eq!(y.0, 3);
                        }
                    });
                }
            });
            assert_eq!(counts(&x), (1, 0));
            drop(x);
            assert_eq!(drops.load(Relaxed), 1);
        }
    }

    #[test]
    fn test_threads_upgrade_race() {
        // upgrades race with the last strong pointer going away; each one
        // either fails or sees the live value, and the value dies once
        for _ in 0..50 {
            let drops = std::sync::atomic::AtomicUsize::new(0);
            let stats = Stats::default();
            let x = Arc::new_in(SyncDropCounter(8, &drops), Tracking(&stats));
            let weaks: Vec<_> = (0..4).map(|_| Arc::downgrade(&x)).collect();
            let barrier = Barrier::new(5);
            thread::scope(|s| {
                for w in weaks {
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        for _ in 0..100 {
                            if let Some(y) = w.upgrade() {
                                assert_eq!(y.0, 8);
                            }
                        }
                    });
                }
                barrier.wait();
                drop(x);
            });
            assert_eq!(drops.load(Relaxed), 1);
            assert_eq!(stats.live(), 0);
        }
    }

    #[test]
    fn test_threads_downgrade_and_drop() {
        let drops = std::sync::atomic::AtomicUsize::new(0);
        let stats = Stats::default();
        let x = Arc::new_in(SyncDropCounter(1, &drops), Tracking(&stats));
        thread::scope(|s| {
            for _ in 0..8 {
                let y = x.clone();
                s.spawn(move || {
                    let w = Arc::downgrade(&y);
                    drop(y);
                    let _ = w.upgrade();
                });
            }
        });
        assert_eq!(counts(&x), (1, 0));
        drop(x);
        assert_eq!(drops.load(Relaxed), 1);
        assert_eq!(stats.live(), 0);
    }

    #[test]
    fn test_threads_get_mut_vs_downgrade() {
        // `get_mut` must never hand out a reference while another thread
        // holds a weak pointer
        for _ in 0..50 {
            let mut x = Arc::new(0usize);
            let y = x.clone();
            let t = thread::spawn(move || {
                let w = Arc::downgrade(&y);
                drop(y);
                w
            });
            while Arc::weak_count(&x) == 0 || Arc::strong_count(&x) > 1 {
                assert!(Arc::get_mut(&mut x).is_none());
                thread::yield_now();
            }
            let w = t.join().unwrap();
            assert!(Arc::get_mut(&mut x).is_none());
            drop(w);
            assert!(Arc::get_mut(&mut x).is_some());
        }
    }

    #[test]
    fn test_policy_runs_on_last_thread() {
        use std::sync::Mutex;
        let log = Mutex::new(Vec::new());
        let x = Arc::new_with_policy_in(
            5,
            ByValue(|v: i32| log.lock().unwrap().push(v)),
            Global,
        );
        thread::scope(|s| {
            for _ in 0..4 {
                let y = x.clone();
                s.spawn(move || drop(y));
            }
        });
        drop(x);
        assert_eq!(*log.lock().unwrap(), [5]);
    }

    proptest! {
        // Same model as the `Rc` one, driven through the atomic counts.
        #[test]
        fn prop_counts_match_model(ops in proptest::collection::vec(op(), 0..200)) {
            check_count_model::<Atomic>(ops);
        }
    }

    #[test]
    fn test_send_sync() {
        fn check<T: Send + Sync>() {}
        check::<Arc<i32>>();
        check::<Weak<i32>>();
        check::<Arc<Vec<u8>, Tracking<'static>>>();
    }
}
