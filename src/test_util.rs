//! Instrumented allocators and values for the unit tests, and the count
//! model shared by the `rc` and `arc` property tests.
use crate::{shared, AllocError, Allocator, Count, Global};
use core::{
    alloc::Layout,
    cell::Cell,
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering::Relaxed},
};
use proptest::prelude::*;
use std::{vec, vec::Vec};

/// Counts live allocations made through [`Tracking`].
#[derive(Default)]
pub(crate) struct Stats {
    allocs: AtomicUsize,
    frees: AtomicUsize,
}

impl Stats {
    pub(crate) fn allocs(&self) -> usize {
        self.allocs.load(Relaxed)
    }

    pub(crate) fn live(&self) -> usize {
        self.allocs() - self.frees.load(Relaxed)
    }
}

/// The global heap, with bookkeeping.
#[derive(Clone, Copy)]
pub(crate) struct Tracking<'a>(pub &'a Stats);

unsafe impl Allocator for Tracking<'_> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let p = Global.allocate(layout)?;
        self.0.allocs.fetch_add(1, Relaxed);
        Ok(p)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.0.frees.fetch_add(1, Relaxed);
        unsafe { Global.deallocate(ptr, layout) }
    }
}

/// Always out of memory.
pub(crate) struct Failing;

unsafe impl Allocator for Failing {
    fn allocate(&self, _layout: Layout) -> Result<NonNull<u8>, AllocError> {
        Err(AllocError)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        unreachable!("nothing was allocated")
    }
}

#[derive(Debug)]
pub(crate) struct DropCounter<'a>(pub i32, pub &'a Cell<usize>);

impl Drop for DropCounter<'_> {
    fn drop(&mut self) {
        self.1.set(self.1.get() + 1);
    }
}

#[cfg(not(feature = "loom"))]
#[derive(Debug)]
pub(crate) struct SyncDropCounter<'a>(pub i32, pub &'a AtomicUsize);

#[cfg(not(feature = "loom"))]
impl Drop for SyncDropCounter<'_> {
    fn drop(&mut self) {
        self.1.fetch_add(1, Relaxed);
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Op {
    Clone(usize),
    Drop(usize),
    Downgrade(usize),
    DropWeak(usize),
    Upgrade(usize),
}

pub(crate) fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8usize).prop_map(Op::Clone),
        (0..8usize).prop_map(Op::Drop),
        (0..8usize).prop_map(Op::Downgrade),
        (0..8usize).prop_map(Op::DropWeak),
        (0..8usize).prop_map(Op::Upgrade),
    ]
}

/// Applies `ops` to a pool of strong and weak handles to one value. After
/// every step the counts must equal the number of live handles, the value
/// must be dropped exactly when the last strong handle goes, and the block
/// freed exactly when the last handle of either kind goes.
pub(crate) fn check_count_model<C: Count>(ops: Vec<Op>) {
    let drops = Cell::new(0);
    let stats = Stats::default();
    let mut strong: Vec<shared::Shared<DropCounter, C, Tracking>> =
        vec![shared::Shared::new_in(DropCounter(5, &drops), Tracking(&stats))];
    let mut weak: Vec<shared::Weak<DropCounter, C, Tracking>> = Vec::new();

    for op in ops {
        match op {
            Op::Clone(i) if !strong.is_empty() => {
                let s = strong[i % strong.len()].clone();
                strong.push(s);
            }
            Op::Drop(i) if !strong.is_empty() => {
                strong.swap_remove(i % strong.len());
            }
            Op::Downgrade(i) if !strong.is_empty() => {
                weak.push(shared::Shared::downgrade(&strong[i % strong.len()]));
            }
            Op::DropWeak(i) if !weak.is_empty() => {
                weak.swap_remove(i % weak.len());
            }
            Op::Upgrade(i) if !weak.is_empty() => match weak[i % weak.len()].upgrade() {
                Some(s) => strong.push(s),
                None => assert!(strong.is_empty()),
            },
            _ => {}
        }

        let dead = strong.is_empty();
        assert_eq!(drops.get(), dead as usize);
        assert_eq!(stats.live(), (!dead || !weak.is_empty()) as usize);
        for s in &strong {
            assert_eq!(shared::Shared::strong_count(s), strong.len());
            assert_eq!(shared::Shared::weak_count(s), weak.len());
            assert_eq!(s.0, 5);
        }
        for w in &weak {
            assert_eq!(w.expired(), dead);
            assert_eq!((w.strong_count(), w.weak_count()), (strong.len(), weak.len()));
        }
    }

    drop(strong);
    drop(weak);
    assert_eq!(drops.get(), 1);
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.allocs(), 1);
}
