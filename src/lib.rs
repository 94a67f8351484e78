//! Owning pointers with an explicit, inspectable ownership protocol.
//!
//! Three pointer types are provided:
//!
//! - [`Exclusive`] owns its object alone and runs its [`Deleter`] exactly once, when dropped or
//!   reset. It is nullable and can hand its object back through [`Exclusive::release`].
//! - [`Shared`] is an atomically reference counted owner, similar to [`std::sync::Arc`].
//! - [`Weak`] observes an object owned by `Shared` pointers without keeping it alive. It must be
//!   [locked][Weak::lock] to reach the object.
//!
//! `Shared` and `Weak` delegate every lifetime decision to a control block holding a strong and
//! a weak count. Strong pointers collectively hold one weak reference, so the object is always
//! disposed before the block is freed, and weak pointers can still ask whether the object is
//! [expired][Weak::expired] after it is gone.
//!
//! A control block is stored in one of two ways. [`make_shared`] and [`allocate_shared`] place
//! the object inside the block, in a single allocation that can come from any [`Allocator`]
//! such as a recycling [`Pool`]. [`Shared::from_box`] and [`Shared::from_raw_with_deleter`]
//! adopt an object that was allocated separately and remember how to release it.
//!
//! Reference counts are atomic, but the managed object is not protected in any way. A cycle of
//! `Shared` pointers is never freed.
//!
//! ```
//! # use custody::{make_shared, Error, Shared};
//! let s = make_shared(10);
//! let w = s.downgrade();
//! let t = s.clone();
//! assert!(s.use_count() == 2);
//!
//! drop((s, t));
//! assert!(w.expired());
//! assert!(w.lock().is_null());
//! assert!(Shared::try_from_weak(&w) == Err(Error::BadWeakReference));
//! ```

mod alloc;
mod block;
mod deleter;
mod error;
mod exclusive;
mod make;
mod shared;
mod weak;

pub use crate::{
    alloc::{Allocator, Global, Pool},
    deleter::{DefaultDelete, Deleter, FnDeleter},
    error::{Error, Result},
    exclusive::Exclusive,
    make::{
        allocate_shared, make_exclusive, make_exclusive_slice, make_shared,
        try_allocate_shared_with,
    },
    shared::Shared,
    weak::Weak,
};
