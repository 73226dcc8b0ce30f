//! The allocator capability used to obtain and release control blocks.
//!
//! `core::alloc::Allocator` is still unstable, so this crate carries its own
//! two-method trait. [`Global`] forwards to the process allocator, `&Bump`
//! works with the `bumpalo` feature, and [`StdAllocator`] adapts a nightly
//! `core::alloc::Allocator` with the `allocator_api` feature.
use core::{alloc::Layout, fmt, ptr::NonNull};

/// Allocation failed. Returned by the `try_*` constructors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl core::error::Error for AllocError {}

/// Source of control block storage.
///
/// A control block remembers the allocator it was created with and hands the
/// memory back to that same allocator, so implementations don't need to cope
/// with foreign pointers.
///
/// # Safety
///
/// `allocate` must return memory valid for reads and writes of
/// `layout.size()` bytes at `layout.align()` alignment, which stays valid
/// until passed to `deallocate`.
pub unsafe trait Allocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// # Safety
    ///
    /// `ptr` must have come from `allocate` on this allocator with the same
    /// `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The global heap.
#[derive(Clone, Copy, Debug, Default)]
pub struct Global;

unsafe impl Allocator for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(layout.size() != 0);
        // Safety: control blocks always have nonzero size
        NonNull::new(unsafe { alloc::alloc::alloc(layout) }).ok_or(AllocError)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

unsafe impl<A: Allocator + ?Sized> Allocator for &A {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

/// Arena allocation. Memory is reclaimed when the arena is reset or dropped,
/// which the borrow in `&Bump` prevents while any handle is alive.
#[cfg(any(test, feature = "bumpalo"))]
unsafe impl Allocator for bumpalo::Bump {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        self.try_alloc_layout(layout).map_err(|_| AllocError)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}
}

/// Wraps a `core::alloc::Allocator` (nightly only).
#[cfg(feature = "allocator_api")]
#[derive(Clone, Copy, Debug, Default)]
pub struct StdAllocator<A>(pub A);

#[cfg(feature = "allocator_api")]
unsafe impl<A: core::alloc::Allocator> Allocator for StdAllocator<A> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        self.0
            .allocate(layout)
            .map(NonNull::cast)
            .map_err(|_| AllocError)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { self.0.deallocate(ptr, layout) }
    }
}
