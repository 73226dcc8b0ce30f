//! `shptr::shared::Shared<T, C>` implements `Arc` and `Rc` generically across
//! the count type (atomic vs. nonatomic).
//!
//! See module docs for detailed API
//!
//! ## See also
//!
//! `shptr::arc::Arc<T>` in this crate is atomic version for sharing data across
//! threads.
//!
//! `shptr::rc::Rc<T>` in this crate is nonatomic version for single-threaded use.
use crate::{
    allocator::{Allocator, Global},
    block::{ControlBlock, Count, LOCKED},
    destroy::{Destroy, DropInPlace},
    AllocError,
};
use core::{
    borrow, cmp, fmt, hash,
    marker::PhantomData,
    mem,
    ops::Deref,
    pin::Pin,
    ptr::{self, NonNull},
};

/// Generic implementation behind `Rc` and `Arc`.
///
/// One pointer wide; the counts, the allocator and the destruction policy
/// all live in the control block.
pub struct Shared<T, C: Count, A: Allocator = Global, P: Destroy<T, A> = DropInPlace> {
    block: NonNull<ControlBlock<T, C, A, P>>,
    phantom: PhantomData<ControlBlock<T, C, A, P>>,
}

/// Generic implementation behind `rc::Weak` and `arc::Weak`, distinguished
/// by `Count`.
///
/// May be empty (see [`Weak::new`]), in which case it behaves like a weak
/// pointer whose value is already gone.
pub struct Weak<T, C: Count, A: Allocator = Global, P: Destroy<T, A> = DropInPlace> {
    block: Option<NonNull<ControlBlock<T, C, A, P>>>,
    phantom: PhantomData<ControlBlock<T, C, A, P>>,
}

// The count must be shareable across threads for the handles to move
// between them. Any thread may run the last release, which destroys the value
// through the policy and frees the block through the allocator.
unsafe impl<T, C, A, P> Send for Shared<T, C, A, P>
where
    T: Send + Sync,
    C: Count + Send + Sync,
    A: Allocator + Send + Sync,
    P: Destroy<T, A> + Send + Sync,
{
}

unsafe impl<T, C, A, P> Sync for Shared<T, C, A, P>
where
    T: Send + Sync,
    C: Count + Send + Sync,
    A: Allocator + Send + Sync,
    P: Destroy<T, A> + Send + Sync,
{
}

unsafe impl<T, C, A, P> Send for Weak<T, C, A, P>
where
    T: Send + Sync,
    C: Count + Send + Sync,
    A: Allocator + Send + Sync,
    P: Destroy<T, A> + Send + Sync,
{
}

unsafe impl<T, C, A, P> Sync for Weak<T, C, A, P>
where
    T: Send + Sync,
    C: Count + Send + Sync,
    A: Allocator + Send + Sync,
    P: Destroy<T, A> + Send + Sync,
{
}

impl<T, C: Count> Shared<T, C> {
    /// Constructs a new `Shared<T>` with the given value.
    ///
    /// Aborts via [`handle_alloc_error`][alloc::alloc::handle_alloc_error] if
    /// the allocation fails; see [`try_new`][Shared::try_new].
    pub fn new(value: T) -> Self {
        Self::new_in(value, Global)
    }

    /// Constructs a new `Shared<T>`, returning an error if allocation fails.
    pub fn try_new(value: T) -> Result<Self, AllocError> {
        Self::try_new_in(value, Global)
    }

    /// Constructs a new `Shared<T>` while giving you a `Weak<T>` to the
    /// allocation, to allow you to construct a `T` which holds a weak pointer
    /// to itself.
    ///
    /// See `std::rc::Rc::new_cyclic` for more details.
    pub fn new_cyclic<F>(data_fn: F) -> Self
    where
        F: FnOnce(&Weak<T, C>) -> T,
    {
        // Construct the inner in the "uninitialized" state with a single weak
        // reference. We don't set strong=1 yet so that if `f` panics, we don't
        // try to drop the uninitialized value.
        let block = match ControlBlock::allocate_uninit(0, Global, DropInPlace) {
            Ok(b) => b,
            Err(AllocError) => alloc::alloc::handle_alloc_error(ControlBlock::<T, C, Global, DropInPlace>::LAYOUT),
        };
        let weak = Weak {
            block: Some(block),
            phantom: PhantomData,
        };

        let value = data_fn(&weak);
        // Safety: strong is 0, so nothing reads the value yet
        unsafe { ControlBlock::value(block).as_ptr().write(value) };

        // Now that the inner is initialized, we can set the strong count to 1.
        // Release pairs with the acquire in `upgrade`.
        let strong = unsafe { ControlBlock::strong(block) };
        debug_assert_eq!(strong.get(), 0, "No prior strong references should exist");
        strong.set_release(1);

        // Strong references collectively own a shared weak reference, so don't
        // run the destructor for our old weak reference.
        mem::forget(weak);
        Shared {
            block,
            phantom: PhantomData,
        }
    }

    /// Constructs a new `Pin<Shared<T>>`. If `T` does not implement `Unpin`,
    /// then `value` will be pinned in memory and unable to be moved.
    pub fn pin(value: T) -> Pin<Self> {
        // Safety: the value never moves out of its block
        unsafe { Pin::new_unchecked(Self::new(value)) }
    }
}

impl<T, C: Count, A: Allocator> Shared<T, C, A> {
    /// Constructs a new `Shared<T>` in the given allocator.
    pub fn new_in(value: T, alloc: A) -> Self {
        Self::new_with_policy_in(value, DropInPlace, alloc)
    }

    /// Fallible version of `new_in()`.
    pub fn try_new_in(value: T, alloc: A) -> Result<Self, AllocError> {
        Self::try_new_with_policy_in(value, DropInPlace, alloc)
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> Shared<T, C, A, P> {
    /// Constructs a new pointer whose value will be released by `policy`
    /// instead of plain drop glue.
    pub fn new_with_policy_in(value: T, policy: P, alloc: A) -> Self {
        match Self::try_new_with_policy_in(value, policy, alloc) {
            Ok(this) => this,
            Err(AllocError) => alloc::alloc::handle_alloc_error(ControlBlock::<T, C, A, P>::LAYOUT),
        }
    }

    /// Fallible version of `new_with_policy_in()`. On failure `value`,
    /// `policy` and `alloc` are dropped and nothing stays allocated.
    pub fn try_new_with_policy_in(value: T, policy: P, alloc: A) -> Result<Self, AllocError> {
        let block = ControlBlock::allocate(value, alloc, policy)?;
        Ok(Shared {
            block,
            phantom: PhantomData,
        })
    }

    /// Return a [`Weak`] pointer to this object.
    pub fn downgrade(this: &Self) -> Weak<T, C, A, P> {
        this.weak().inc_unless_locked();
        Weak {
            block: Some(this.block),
            phantom: PhantomData,
        }
    }

    /// Make `self` share `other`'s value, releasing whatever `self` held.
    ///
    /// `other`'s count goes up before `self`'s old block is released, so the
    /// value survives even when `self` held the last path to `other`.
    pub fn assign(&mut self, other: &Self) {
        if Self::ptr_eq(self, other) {
            return;
        }
        let old = mem::replace(self, other.clone());
        drop(old);
    }

    /// Exchange the targets of two pointers. Counts are untouched.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other)
    }

    /// Returns the inner value if this is the only strong pointer. Otherwise
    /// returns the pointer unchanged.
    ///
    /// Weak pointers become expired; the destruction policy is dropped
    /// without being run, since the value was handed back instead.
    pub fn try_unwrap(this: Self) -> Result<T, Self> {
        if !this.strong().dec_if_one() {
            return Err(this);
        }
        let block = this.block;
        mem::forget(this);
        unsafe {
            let value = ptr::read(ControlBlock::value(block).as_ptr());
            ControlBlock::forget_value(block);
            ControlBlock::release_weak(block);
            Ok(value)
        }
    }

    /// Returns a mutable reference into the given pointer, without any check.
    ///
    /// See also [`get_mut`], which is safe and does appropriate checks.
    ///
    /// [`get_mut`]: Shared::get_mut
    ///
    /// # Safety
    ///
    /// If any other strong or [`Weak`] pointers to the same allocation exist,
    /// then they must not be dereferenced or have active borrows for the
    /// duration of the returned borrow. This is trivially the case if no such
    /// pointers exist, for example immediately after `new`.
    pub unsafe fn get_mut_unchecked(this: &mut Self) -> &mut T {
        unsafe { &mut *ControlBlock::value(this.block).as_ptr() }
    }

    /// Returns a mutable reference if there are no other strong or weak
    /// pointers to the same allocation.
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        if Self::is_unique(this) {
            unsafe { Some(Self::get_mut_unchecked(this)) }
        } else {
            None
        }
    }

    fn is_unique(this: &Self) -> bool {
        // Lock the weak count so no weak pointer can appear (through
        // `downgrade` on another strong pointer) between the two checks.
        let weak = this.weak();
        if !weak.try_lock() {
            return false;
        }
        let unique = this.strong().get() == 1;
        weak.unlock();
        if unique {
            // pairs with the release decrement of any strong pointers that
            // were dropped before we looked
            this.strong().acquire_fence();
        }
        unique
    }

    /// Returns true if two pointers share the same control block.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.block == other.block
    }

    /// The allocator the control block came from.
    pub fn allocator(this: &Self) -> &A {
        unsafe { ControlBlock::alloc(this.block) }
    }

    fn strong(&self) -> &C {
        // Safety: a strong pointer keeps its block alive
        unsafe { ControlBlock::strong(self.block) }
    }

    fn weak(&self) -> &C {
        unsafe { ControlBlock::weak(self.block) }
    }

    // Get the current strong count of this pointer
    pub fn strong_count(this: &Self) -> usize {
        this.strong().get()
    }

    // Get the current weak count of this pointer
    pub fn weak_count(this: &Self) -> usize {
        match this.weak().get() {
            LOCKED => 0,
            // Subtract one to hide the implicit weak pointer owned by the
            // strong pointers, which is an implementation detail.
            n => n - 1,
        }
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> Weak<T, C, A, P> {
    /// Constructs a weak pointer with no allocation behind it. `upgrade`
    /// always returns `None`.
    pub const fn new() -> Self {
        Weak {
            block: None,
            phantom: PhantomData,
        }
    }

    /// Attempts to get a strong pointer, returning `None` if the value has
    /// already been destroyed.
    pub fn upgrade(&self) -> Option<Shared<T, C, A, P>> {
        let block = self.block?;
        // Safety: a weak pointer keeps its block alive
        let strong = unsafe { ControlBlock::strong(block) };
        if strong.inc_if_nonzero() {
            Some(Shared {
                block,
                phantom: PhantomData,
            })
        } else {
            None
        }
    }

    /// Returns true if all strong pointers have been dropped, so `upgrade`
    /// will return `None`.
    ///
    /// For `arc::Weak` this is a snapshot: another thread may drop the last
    /// strong pointer right after it returns `false`.
    pub fn expired(&self) -> bool {
        self.strong_count() == 0
    }

    // Get the current strong count of this pointer
    pub fn strong_count(&self) -> usize {
        match self.block {
            Some(block) => unsafe { ControlBlock::strong(block) }.get(),
            None => 0,
        }
    }

    /// Get the current weak count of this pointer.
    ///
    /// Inside the closure passed to [`Shared::new_cyclic`] the strong count
    /// is still 0, so the weak pointer handed to the closure reports 1.
    pub fn weak_count(&self) -> usize {
        let Some(block) = self.block else {
            return 0;
        };
        let (strong, weak) = unsafe { (ControlBlock::strong(block), ControlBlock::weak(block)) };
        let w = weak.get();
        if strong.get() > 0 {
            // hide the sentinel held by the strong pointers
            w - 1
        } else {
            w
        }
    }

    /// Make `self` observe the same value as `other`, releasing whatever
    /// `self` observed.
    pub fn assign(&mut self, other: &Self) {
        if self.block == other.block {
            return;
        }
        let old = mem::replace(self, other.clone());
        drop(old);
    }

    /// Exchange the targets of two weak pointers. Counts are untouched.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other)
    }

    /// Returns true if both point to the same control block, or both are
    /// empty.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.block == other.block
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> AsRef<T> for Shared<T, C, A, P> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> borrow::Borrow<T> for Shared<T, C, A, P> {
    fn borrow(&self) -> &T {
        self
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> Clone for Shared<T, C, A, P> {
    fn clone(&self) -> Self {
        self.strong().inc_relaxed();
        Shared {
            block: self.block,
            phantom: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source)
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> Clone for Weak<T, C, A, P> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            // Safety: a weak pointer keeps its block alive. The count can't
            // be locked, since that requires there to be no weak pointers.
            unsafe { ControlBlock::weak(block) }.inc_relaxed();
        }
        Weak {
            block: self.block,
            phantom: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source)
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> Default for Weak<T, C, A, P> {
    fn default() -> Self {
        Weak::new()
    }
}

impl<T: Default, C: Count> Default for Shared<T, C> {
    fn default() -> Self {
        Shared::new(T::default())
    }
}

impl<T, C: Count> From<T> for Shared<T, C> {
    fn from(value: T) -> Self {
        Shared::new(value)
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> Deref for Shared<T, C, A, P> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the value is initialized while any strong pointer exists
        unsafe { ControlBlock::value(self.block).as_ref() }
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> Drop for Shared<T, C, A, P> {
    fn drop(&mut self) {
        if self.strong().dec() != 1 {
            return;
        }
        // last strong pointer was just dropped
        self.strong().acquire_fence();
        unsafe {
            ControlBlock::destroy_value(self.block);
            // decrement weak count owned by strong ptrs
            ControlBlock::release_weak(self.block);
        }
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> Drop for Weak<T, C, A, P> {
    fn drop(&mut self) {
        if let Some(block) = self.block {
            unsafe { ControlBlock::release_weak(block) }
        }
    }
}

impl<T: PartialEq, C: Count, A: Allocator, P: Destroy<T, A>> PartialEq for Shared<T, C, A, P> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        *(*self) == *(*other)
    }
}

impl<T: PartialOrd, C: Count, A: Allocator, P: Destroy<T, A>> PartialOrd for Shared<T, C, A, P> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        (**self).partial_cmp(&**other)
    }
}

impl<T: Ord, C: Count, A: Allocator, P: Destroy<T, A>> cmp::Ord for Shared<T, C, A, P> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        (**self).cmp(&**other)
    }
}

impl<T: Eq, C: Count, A: Allocator, P: Destroy<T, A>> Eq for Shared<T, C, A, P> {}

impl<T: hash::Hash, C: Count, A: Allocator, P: Destroy<T, A>> hash::Hash for Shared<T, C, A, P> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        (**self).hash(state)
    }
}

impl<T: fmt::Display, C: Count, A: Allocator, P: Destroy<T, A>> fmt::Display for Shared<T, C, A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: fmt::Debug, C: Count, A: Allocator, P: Destroy<T, A>> fmt::Debug for Shared<T, C, A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> fmt::Pointer for Shared<T, C, A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&(&**self as *const T), f)
    }
}

impl<T, C: Count, A: Allocator, P: Destroy<T, A>> fmt::Debug for Weak<T, C, A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(Weak)")
    }
}
