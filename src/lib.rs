/*!
This crate provides reference-counted owning pointers ([`Rc`], [`Arc`]) and
their non-owning observers ([`rc::Weak`], [`arc::Weak`]), in the style of
C++'s [`shared_ptr`](https://en.cppreference.com/w/cpp/memory/shared_ptr) and
`weak_ptr`: the allocator that provides the control block, and the policy
that tears down the value, are both part of the pointer's type.

```rust
    use shptr::rc::{Rc, Weak};
    let a: Rc<[i32; 3]> = Rc::new([1, 2, 3]);
    let w: Weak<[i32; 3]> = Rc::downgrade(&a);

    assert_eq!(w.upgrade().map(|p| p[1]), Some(2));
    drop(a);

    // the value is gone; the weak pointer only sees that
    assert!(w.expired());
    assert!(w.upgrade().is_none());
```

# Control blocks

Every pointer is one machine word. It points at a control block holding the
strong count, the weak count, the allocator, the destruction policy and the
value. The strong pointers collectively hold one unit of the weak count, so
the block is freed by whichever release, strong or weak, gives up the last
unit:

```
    use shptr::Rc;
    let a = Rc::new(String::from("hi"));
    let w = Rc::downgrade(&a);
    assert_eq!((Rc::strong_count(&a), Rc::weak_count(&a)), (1, 1));

    drop(a);            // destroys the String, keeps the block
    assert_eq!(w.strong_count(), 0);
    drop(w);            // frees the block
```

# Allocators

Construction goes through an [`Allocator`]. [`Global`] is the default; with
the `bumpalo` feature, `&bumpalo::Bump` works too. The allocator is stored in
the block, so the same one frees it. Allocation failure is reported by the
`try_*` constructors:

```
    use shptr::{AllocError, Allocator, Global, Rc};
    use core::{alloc::Layout, ptr::NonNull};

    struct Empty;
    unsafe impl Allocator for Empty {
        fn allocate(&self, _: Layout) -> Result<NonNull<u8>, AllocError> {
            Err(AllocError)
        }
        unsafe fn deallocate(&self, _: NonNull<u8>, _: Layout) {}
    }

    assert_eq!(Rc::try_new_in(1, Empty).err(), Some(AllocError));
    assert!(Rc::try_new_in(1, Global).is_ok());
```

# Destruction policies

By default the value's destructor runs when the last strong pointer goes
away. A type that needs the allocator to clean up implements
[`destroy::Cleanup`] and is created with the [`destroy::CallCleanup`]
policy; arbitrary closures can be used through the adapters in [`destroy`].

```
    use shptr::{destroy::ByRefIn, Global, Rc};
    use std::cell::Cell;

    let closed = Cell::new(false);
    let file = Rc::new_with_policy_in(
        3,
        ByRefIn(|fd: &mut i32, _: &Global| closed.set(*fd == 3)),
        Global,
    );
    let other = file.clone();
    drop(file);
    assert!(!closed.get());
    drop(other);
    assert!(closed.get());
```

# Cycles

There is no cycle collection. Two values holding strong pointers to each
other are never freed unless one link is broken by hand. Use a [`rc::Weak`]
for back edges:

```
    use shptr::rc::{Rc, Weak};
    use std::cell::RefCell;

    struct Node {
        parent: RefCell<Weak<Node>>,
        children: RefCell<Vec<Rc<Node>>>,
    }

    let root = Rc::new(Node {
        parent: RefCell::new(Weak::new()),
        children: RefCell::new(vec![]),
    });
    let leaf = Rc::new(Node {
        parent: RefCell::new(Rc::downgrade(&root)),
        children: RefCell::new(vec![]),
    });
    root.children.borrow_mut().push(leaf.clone());

    assert_eq!(Rc::strong_count(&root), 1);
    assert!(Rc::ptr_eq(&leaf.parent.borrow().upgrade().unwrap(), &root));
```

## Differences from `std::sync::Arc` and `std::rc::Rc`

Unlike in std, `Rc` and `Arc` share a single generic implementation. `Rc<T>`
is an alias for `Shared<T, Nonatomic>` and `Arc<T>` is an alias for
`Shared<T, Atomic>`. This does make the documentation a little uglier, since
it's all on struct `Shared` instead of the actual types you normally care
about.

If you leak so many pointers that the refcount overflows, the std pointers
will abort. `shptr` does not, because there is no `abort()` function in
`no_std`.

Unsized values (`Rc<[T]>`, `Rc<dyn Trait>`) are not supported; the block
layout is fixed by `T`.

`weak_count` does not include the unit held by the strong pointers.

## Features

- `bumpalo`: `Allocator` for `bumpalo::Bump`.
- `allocator_api`: [`StdAllocator`] wrapping a `core::alloc::Allocator`.
  Needs nightly.
- `loom`: run the atomic counts on [loom](https://docs.rs/loom) for model
  checking.
*/
#![no_std]
#![cfg_attr(feature = "allocator_api", feature(allocator_api))]
#[cfg(test)]
extern crate std;

extern crate alloc;

pub mod allocator;
pub mod arc;
mod block;
pub mod destroy;
pub mod rc;
pub mod shared;
mod sync;

#[cfg(test)]
mod test_util;

#[cfg(feature = "allocator_api")]
pub use self::allocator::StdAllocator;
pub use self::allocator::{AllocError, Allocator, Global};
pub use self::arc::{Arc, Atomic};
pub use self::block::Count;
pub use self::rc::{Nonatomic, Rc};
pub use self::shared::Shared;
