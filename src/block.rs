//! The control block shared by every [`Shared`][crate::Shared] and [`Weak`][crate::Weak]
//! derived from the same origin.
//!
//! A block carries two counters. `strong` counts the owning handles. `weak` counts the observing
//! handles plus one reference that the strong handles hold as a group. When `strong` drops to
//! zero the managed object is disposed and the group reference is released. When `weak` drops to
//! zero the block itself is destroyed. Both transitions happen exactly once, in that order.

use std::{
    alloc::Layout,
    any::type_name,
    cell::UnsafeCell,
    mem::{self, ManuallyDrop, MaybeUninit},
    process,
    ptr::{self, NonNull},
    sync::atomic::{
        AtomicUsize,
        Ordering::{AcqRel, Acquire, Relaxed},
    },
};

use crate::{alloc::Allocator, deleter::Deleter, error::Error};

/// Counts above this are treated as a leak of handles; we abort rather than wrap around.
const MAX_REFCOUNT: usize = isize::MAX as usize;

pub(crate) struct ControlBlock<T> {
    strong: AtomicUsize,
    weak: AtomicUsize,
    payload: Payload<T>,
}

/// Where the managed object lives and how it is torn down.
enum Payload<T> {
    /// The object was allocated on its own. `deleter` reclaims it; the block is a `Box`.
    Separate {
        ptr: NonNull<T>,
        deleter: UnsafeCell<Box<dyn Deleter<T> + Send>>,
    },
    /// The object is stored in the block, which sits at the head of an [`InlineBlock`].
    /// `release` returns that allocation to the allocator stored next to it.
    Inline {
        value: UnsafeCell<MaybeUninit<T>>,
        release: unsafe fn(NonNull<ControlBlock<T>>),
    },
}

#[repr(C)]
struct InlineBlock<T, A> {
    header: ControlBlock<T>,
    alloc: ManuallyDrop<A>,
}

/// A strong or weak reference into a block, together with the cached object address.
pub(crate) struct Handle<T> {
    pub(crate) ptr: NonNull<T>,
    pub(crate) block: NonNull<ControlBlock<T>>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> ControlBlock<T> {
    fn with_payload(payload: Payload<T>) -> Self {
        ControlBlock {
            strong: AtomicUsize::new(1),
            weak: AtomicUsize::new(1),
            payload,
        }
    }

    /// Creates a block for an object that was allocated independently. The returned handle holds
    /// the initial strong reference.
    pub(crate) fn separate<D>(ptr: NonNull<T>, deleter: D) -> Handle<T>
    where
        D: Deleter<T> + Send + 'static,
    {
        let deleter: Box<dyn Deleter<T> + Send> = Box::new(deleter);
        let block = Box::new(ControlBlock::with_payload(Payload::Separate {
            ptr,
            deleter: UnsafeCell::new(deleter),
        }));

        Handle {
            ptr,
            block: NonNull::from(Box::leak(block)),
        }
    }

    /// Allocates a block with the object stored inside it. The returned handle holds the initial
    /// strong reference.
    ///
    /// The memory is requested from `alloc` before `init` runs. If `init` fails or panics, the
    /// memory is handed back before the failure propagates.
    pub(crate) fn inline<A, E, F>(alloc: A, init: F) -> Result<Handle<T>, E>
    where
        A: Allocator + Send + 'static,
        E: From<Error>,
        F: FnOnce() -> Result<T, E>,
    {
        struct Guard<'a, A: Allocator> {
            ptr: NonNull<u8>,
            layout: Layout,
            alloc: &'a A,
        }

        impl<A: Allocator> Drop for Guard<'_, A> {
            fn drop(&mut self) {
                unsafe { self.alloc.deallocate(self.ptr, self.layout) };
            }
        }

        let layout = Layout::new::<InlineBlock<T, A>>();
        let raw = alloc.allocate(layout)?;

        let guard = Guard {
            ptr: raw,
            layout,
            alloc: &alloc,
        };
        let value = init()?;
        mem::forget(guard);

        let raw = raw.cast::<InlineBlock<T, A>>();
        unsafe {
            raw.as_ptr().write(InlineBlock {
                header: ControlBlock::with_payload(Payload::Inline {
                    value: UnsafeCell::new(MaybeUninit::new(value)),
                    release: release_inline::<T, A>,
                }),
                alloc: ManuallyDrop::new(alloc),
            });
        }

        // `header` is the first field of a `repr(C)` struct
        let block = raw.cast::<ControlBlock<T>>();
        let ptr = match unsafe { &block.as_ref().payload } {
            Payload::Inline { value, .. } => unsafe {
                NonNull::new_unchecked(value.get().cast::<T>())
            },
            Payload::Separate { .. } => unreachable!(),
        };

        Ok(Handle { ptr, block })
    }

    /// Relaxed snapshot of the strong count. Advisory only.
    pub(crate) fn strong_count(&self) -> usize {
        self.strong.load(Relaxed)
    }

    /// Relaxed snapshot of the weak count, including the reference held by the strong group.
    pub(crate) fn weak_count(&self) -> usize {
        self.weak.load(Relaxed)
    }

    /// Adds a strong reference. The caller must already hold one.
    pub(crate) fn add_strong(&self) {
        if self.strong.fetch_add(1, AcqRel) > MAX_REFCOUNT {
            process::abort();
        }
    }

    /// Adds a strong reference unless the object has already been disposed.
    pub(crate) fn try_add_strong(&self) -> bool {
        let mut n = self.strong.load(Acquire);
        loop {
            if n == 0 {
                return false;
            }
            if n > MAX_REFCOUNT {
                process::abort();
            }

            match self.strong.compare_exchange_weak(n, n + 1, AcqRel, Relaxed) {
                Ok(_) => return true,
                Err(strong) => n = strong,
            }
        }
    }

    /// Adds a weak reference. The caller must hold a strong or weak reference.
    pub(crate) fn add_weak(&self) {
        if self.weak.fetch_add(1, AcqRel) > MAX_REFCOUNT {
            process::abort();
        }
    }

    /// Drops a strong reference. The last one disposes the object and gives up the weak
    /// reference held by the strong group.
    ///
    /// # Safety
    ///
    /// `this` must be a live block and the caller must own the strong reference being released.
    pub(crate) unsafe fn release_strong(this: NonNull<Self>) {
        if this.as_ref().strong.fetch_sub(1, AcqRel) == 1 {
            Self::dispose(this);
            Self::release_weak(this);
        }
    }

    /// Drops a weak reference. The last one destroys the block.
    ///
    /// # Safety
    ///
    /// `this` must be a live block and the caller must own the weak reference being released.
    pub(crate) unsafe fn release_weak(this: NonNull<Self>) {
        if this.as_ref().weak.fetch_sub(1, AcqRel) == 1 {
            Self::destroy(this);
        }
    }

    /// Runs the object's teardown. Called once, when `strong` reaches zero.
    unsafe fn dispose(this: NonNull<Self>) {
        log::trace!("disposing {} in block {:p}", type_name::<T>(), this);

        match &this.as_ref().payload {
            Payload::Separate { ptr, deleter } => (*deleter.get()).delete(*ptr),
            Payload::Inline { value, .. } => ptr::drop_in_place((*value.get()).as_mut_ptr()),
        }
    }

    /// Frees the block. Called once, when `weak` reaches zero.
    unsafe fn destroy(this: NonNull<Self>) {
        log::trace!("destroying block {:p} of {}", this, type_name::<T>());

        match this.as_ref().payload {
            Payload::Separate { .. } => drop(Box::from_raw(this.as_ptr())),
            Payload::Inline { release, .. } => release(this),
        }
    }
}

unsafe fn release_inline<T, A>(block: NonNull<ControlBlock<T>>)
where
    A: Allocator,
{
    let raw = block.cast::<InlineBlock<T, A>>().as_ptr();
    let alloc = ManuallyDrop::take(&mut (*raw).alloc);
    ptr::drop_in_place(raw);
    alloc.deallocate(
        NonNull::new_unchecked(raw.cast::<u8>()),
        Layout::new::<InlineBlock<T, A>>(),
    );
}
