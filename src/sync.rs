//! Atomics used by the concurrent count. Swapped for loom's model-checked
//! versions with the `loom` feature.

#[cfg(feature = "loom")]
pub(crate) use loom::{
    hint::spin_loop,
    sync::atomic::{fence, AtomicUsize, Ordering},
};

#[cfg(not(feature = "loom"))]
pub(crate) use core::{
    hint::spin_loop,
    sync::atomic::{fence, AtomicUsize, Ordering},
};
