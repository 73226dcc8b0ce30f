//! Destruction policies: how the owned value is torn down when the last
//! strong handle goes away.
//!
//! The policy is a type parameter of the handle, so the choice is made at
//! compile time. The policy instance lives in the control block and is
//! consumed by its one call to [`Destroy::destroy`].
//!
//! - [`DropInPlace`] (the default) runs `T`'s drop glue. Types with nothing
//!   to clean up cost nothing.
//! - [`CallCleanup`] runs [`Cleanup::cleanup`] with the block's allocator,
//!   then the drop glue.
//! - [`ByRef`], [`ByValue`], [`ByRefIn`] and [`ByValueIn`] wrap a closure
//!   of the matching shape.
//!
//! ```
//! use shptr::{destroy::ByValue, Global, Rc};
//!
//! let mut log = Vec::new();
//! {
//!     let p = Rc::new_with_policy_in(5, ByValue(|v: i32| log.push(v)), Global);
//!     assert_eq!(*p, 5);
//! }
//! assert_eq!(log, [5]);
//! ```
use core::ptr::{self, NonNull};

/// Releases an owned value.
pub trait Destroy<T, A> {
    /// Tear down `*value`.
    ///
    /// # Safety
    ///
    /// `value` points to an initialized `T` that nothing will touch again.
    /// The memory it lives in is owned by the caller and must not be freed
    /// here.
    unsafe fn destroy(self, value: NonNull<T>, alloc: &A);
}

/// Cleanup hook for element types that release resources through the
/// allocator that owns them. Select it with the [`CallCleanup`] policy.
pub trait Cleanup<A> {
    fn cleanup(&mut self, alloc: &A);
}

/// Run `T`'s destructor.
#[derive(Clone, Copy, Debug, Default)]
pub struct DropInPlace;

impl<T, A> Destroy<T, A> for DropInPlace {
    unsafe fn destroy(self, value: NonNull<T>, _alloc: &A) {
        unsafe { ptr::drop_in_place(value.as_ptr()) }
    }
}

/// Call [`Cleanup::cleanup`], then run `T`'s destructor.
#[derive(Clone, Copy, Debug, Default)]
pub struct CallCleanup;

impl<T: Cleanup<A>, A> Destroy<T, A> for CallCleanup {
    unsafe fn destroy(self, value: NonNull<T>, alloc: &A) {
        unsafe {
            (*value.as_ptr()).cleanup(alloc);
            ptr::drop_in_place(value.as_ptr());
        }
    }
}

/// Closure taking `&mut T`; the destructor runs afterwards.
#[derive(Clone, Copy, Debug)]
pub struct ByRef<F>(pub F);

impl<T, A, F: FnOnce(&mut T)> Destroy<T, A> for ByRef<F> {
    unsafe fn destroy(self, value: NonNull<T>, _alloc: &A) {
        unsafe {
            (self.0)(&mut *value.as_ptr());
            ptr::drop_in_place(value.as_ptr());
        }
    }
}

/// Closure taking the value itself.
#[derive(Clone, Copy, Debug)]
pub struct ByValue<F>(pub F);

impl<T, A, F: FnOnce(T)> Destroy<T, A> for ByValue<F> {
    unsafe fn destroy(self, value: NonNull<T>, _alloc: &A) {
        (self.0)(unsafe { ptr::read(value.as_ptr()) })
    }
}

/// Closure taking `&mut T` and the allocator; the destructor runs afterwards.
#[derive(Clone, Copy, Debug)]
pub struct ByRefIn<F>(pub F);

impl<T, A, F: FnOnce(&mut T, &A)> Destroy<T, A> for ByRefIn<F> {
    unsafe fn destroy(self, value: NonNull<T>, alloc: &A) {
        unsafe {
            (self.0)(&mut *value.as_ptr(), alloc);
            ptr::drop_in_place(value.as_ptr());
        }
    }
}

/// Closure taking the value and the allocator.
#[derive(Clone, Copy, Debug)]
pub struct ByValueIn<F>(pub F);

impl<T, A, F: FnOnce(T, &A)> Destroy<T, A> for ByValueIn<F> {
    unsafe fn destroy(self, value: NonNull<T>, alloc: &A) {
        (self.0)(unsafe { ptr::read(value.as_ptr()) }, alloc)
    }
}
