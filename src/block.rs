//! The control block shared by every handle to one value, and the count
//! abstraction that lets `Rc` and `Arc` share one implementation.
//!
//! Counting protocol (both families):
//!
//! - `strong` is the number of live strong handles.
//! - `weak` is the number of live weak handles, plus one unit held by the
//!   strong handles as a group for as long as `strong > 0`.
//!
//! The value is destroyed when `strong` drops from 1 to 0; that release then
//! gives up the group's weak unit. The block is freed when `weak` drops from 1
//! to 0, whether that last unit belonged to a weak handle or to the strong
//! group.
use crate::{allocator::Allocator, destroy::Destroy, AllocError};
use core::{
    alloc::Layout,
    mem::{ManuallyDrop, MaybeUninit},
    ptr::{self, NonNull},
};

/// Weak count value meaning "checked out by `get_mut`".
pub(crate) const LOCKED: usize = usize::MAX;

/// Reference count operations. Implemented by `Cell<usize>` for
/// [`Rc`][crate::Rc] and `AtomicUsize` for [`Arc`][crate::Arc].
///
/// It is `pub` so you can write code that's generic over atomicity, but there's
/// no reason to implement it for any other types.
///
/// # Safety
/// Trait is sealed.
pub unsafe trait Count: private::Sealed {
    #[doc(hidden)]
    fn new(v: usize) -> Self;
    #[doc(hidden)]
    fn get(&self) -> usize;
    /// Returns the previous value.
    #[doc(hidden)]
    fn inc_relaxed(&self) -> usize;
    /// Increments unless the count is zero. Acquire on success.
    #[doc(hidden)]
    fn inc_if_nonzero(&self) -> bool;
    /// Increments, waiting out a `try_lock` holder.
    #[doc(hidden)]
    fn inc_unless_locked(&self);
    /// Release decrement. Returns the previous value.
    #[doc(hidden)]
    fn dec(&self) -> usize;
    /// 1 -> 0 with acquire, or nothing.
    #[doc(hidden)]
    fn dec_if_one(&self) -> bool;
    /// 1 -> LOCKED with acquire, or nothing.
    #[doc(hidden)]
    fn try_lock(&self) -> bool;
    /// LOCKED -> 1 with release.
    #[doc(hidden)]
    fn unlock(&self);
    #[doc(hidden)]
    fn set_release(&self, value: usize);
    #[doc(hidden)]
    fn acquire_fence(&self);
}

#[repr(C)]
pub(crate) struct ControlBlock<T, C, A, P> {
    strong: C,
    weak: C,
    alloc: ManuallyDrop<A>,
    policy: ManuallyDrop<P>,
    value: MaybeUninit<T>,
}

// All access goes through raw field pointers. Weak handles read `strong` while
// the value is being torn down on another thread, so nothing may hold a
// reference to the whole block.
impl<T, C: Count, A: Allocator, P: Destroy<T, A>> ControlBlock<T, C, A, P> {
    pub(crate) const LAYOUT: Layout = Layout::new::<Self>();

    /// Allocate a block holding `value` with one strong handle. On failure
    /// nothing is allocated and the arguments are dropped.
    pub(crate) fn allocate(value: T, alloc: A, policy: P) -> Result<NonNull<Self>, AllocError> {
        let b = Self::allocate_uninit(1, alloc, policy)?;
        // Safety: the value slot is ours until a handle is built over `b`
        unsafe { Self::value(b).as_ptr().write(value) };
        Ok(b)
    }

    /// Allocate a block whose value slot is left uninitialized. The caller
    /// fills it in before `strong` becomes nonzero.
    pub(crate) fn allocate_uninit(strong: usize, alloc: A, policy: P) -> Result<NonNull<Self>, AllocError> {
        let b = alloc.allocate(Self::LAYOUT)?.cast::<Self>();
        // Safety: fresh allocation sized and aligned for Self
        unsafe {
            b.as_ptr().write(ControlBlock {
                strong: C::new(strong),
                weak: C::new(1),
                alloc: ManuallyDrop::new(alloc),
                policy: ManuallyDrop::new(policy),
                value: MaybeUninit::uninit(),
            })
        };
        Ok(b)
    }

    /// # Safety
    /// `this` is a live block.
    pub(crate) unsafe fn strong<'a>(this: NonNull<Self>) -> &'a C {
        unsafe { &*ptr::addr_of!((*this.as_ptr()).strong) }
    }

    /// # Safety
    /// `this` is a live block.
    pub(crate) unsafe fn weak<'a>(this: NonNull<Self>) -> &'a C {
        unsafe { &*ptr::addr_of!((*this.as_ptr()).weak) }
    }

    /// # Safety
    /// `this` is a live block.
    pub(crate) unsafe fn alloc<'a>(this: NonNull<Self>) -> &'a A {
        unsafe { &*ptr::addr_of!((*this.as_ptr()).alloc).cast::<A>() }
    }

    /// Pointer to the value. Only initialized while `strong > 0`.
    pub(crate) fn value(this: NonNull<Self>) -> NonNull<T> {
        // Safety: field projection of a non-null pointer
        unsafe { NonNull::new_unchecked(ptr::addr_of_mut!((*this.as_ptr()).value).cast::<T>()) }
    }

    /// Run the destruction policy on the value.
    ///
    /// # Safety
    /// Called once, by the release that took `strong` to 0, after an acquire
    /// fence on `strong`.
    pub(crate) unsafe fn destroy_value(this: NonNull<Self>) {
        unsafe {
            let policy = ManuallyDrop::into_inner(ptr::read(ptr::addr_of!((*this.as_ptr()).policy)));
            policy.destroy(Self::value(this), Self::alloc(this));
        }
    }

    /// Drop the policy without running it. For when the value was moved out.
    ///
    /// # Safety
    /// Same as `destroy_value`, which must not run afterwards.
    pub(crate) unsafe fn forget_value(this: NonNull<Self>) {
        unsafe { ManuallyDrop::drop(&mut *ptr::addr_of_mut!((*this.as_ptr()).policy)) }
    }

    /// Give up one weak unit, freeing the block if it was the last.
    ///
    /// # Safety
    /// The caller owns a weak unit (a weak handle, or the strong group's
    /// sentinel after the value is gone) and does not use `this` afterwards.
    pub(crate) unsafe fn release_weak(this: NonNull<Self>) {
        let weak = unsafe { Self::weak(this) };
        if weak.dec() != 1 {
            return;
        }
        // Freeing must happen-after the value teardown in the last strong
        // release, and after every other handle's last read of the counts.
        weak.acquire_fence();
        unsafe { Self::deallocate(this) }
    }

    unsafe fn deallocate(this: NonNull<Self>) {
        let b = this.as_ptr();
        unsafe {
            ptr::drop_in_place(ptr::addr_of_mut!((*b).strong));
            ptr::drop_in_place(ptr::addr_of_mut!((*b).weak));
            let alloc = ManuallyDrop::into_inner(ptr::read(ptr::addr_of!((*b).alloc)));
            alloc.deallocate(this.cast(), Self::LAYOUT);
        }
    }
}

pub(crate) mod private {
    pub trait Sealed {}
}
