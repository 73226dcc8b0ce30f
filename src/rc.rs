//! `shptr::rc::Rc<T>` is very similar to `std::rc::Rc<T>`, but with a
//! pluggable allocator and destruction policy, like C++'s `shared_ptr`.
//!
//! See [`Shared`][crate::Shared] for the detailed API, as it's the same as
//! `shptr::arc::Arc<T>`.
//!
//! ## See also
//!
//! `shptr::arc::Arc<T>` in this crate is atomic version for sharing
//! data across threads.
use crate::{
    allocator::Global,
    block::{private, Count, LOCKED},
    destroy::DropInPlace,
    shared,
};
use core::cell::Cell;

impl private::Sealed for Cell<usize> {}

unsafe impl Count for Cell<usize> {
    fn new(v: usize) -> Self {
        Cell::new(v)
    }

    fn get(&self) -> usize {
        Cell::get(self)
    }

    fn inc_relaxed(&self) -> usize {
        let i = self.get();
        self.set(i + 1);
        i
    }

    fn inc_if_nonzero(&self) -> bool {
        let i = self.get();
        if i != 0 {
            self.set(i + 1);
            true
        } else {
            false
        }
    }

    fn inc_unless_locked(&self) {
        // nothing else runs while `get_mut` holds the lock
        debug_assert_ne!(self.get(), LOCKED);
        self.inc_relaxed();
    }

    fn dec(&self) -> usize {
        let i = self.get();
        self.set(i - 1);
        i
    }

    fn dec_if_one(&self) -> bool {
        if self.get() == 1 {
            self.set(0);
            true
        } else {
            false
        }
    }

    fn try_lock(&self) -> bool {
        if self.get() == 1 {
            self.set(LOCKED);
            true
        } else {
            false
        }
    }

    fn unlock(&self) {
        debug_assert_eq!(self.get(), LOCKED);
        self.set(1);
    }

    fn set_release(&self, value: usize) {
        self.set(value);
    }

    fn acquire_fence(&self) {}
}

/// Nonatomic count type. Not `Send` or `Sync`.
pub type Nonatomic = Cell<usize>;

pub type Rc<T, A = Global, P = DropInPlace> = shared::Shared<T, Nonatomic, A, P>;
pub type Weak<T, A = Global, P = DropInPlace> = shared::Weak<T, Nonatomic, A, P>;
