use std::{fmt, ptr::NonNull};

/// Reclaims an object that an owning pointer gave up.
///
/// [`Exclusive`][crate::Exclusive] stores its deleter by value. A [`Shared`][crate::Shared]
/// built from a raw pointer moves the deleter into the control block, where it is invoked once
/// the last strong reference is gone.
pub trait Deleter<T: ?Sized> {
    /// Destroys the object at `ptr` and frees its memory.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live object that this deleter knows how to reclaim, and nobody may
    /// use `ptr` afterwards.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

/// Reclaims objects allocated through [`Box`].
///
/// This also covers slices: a `NonNull<[T]>` carries its length, so reconstructing the
/// `Box<[T]>` destroys every element and frees the whole buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

/// Adapts a closure into a [`Deleter`].
///
/// ```
/// # use std::ptr::NonNull;
/// # use custody::{Exclusive, FnDeleter};
/// let raw = Box::into_raw(Box::new(7));
/// let e = unsafe {
///     Exclusive::from_raw_with_deleter(
///         raw,
///         FnDeleter(|p: NonNull<i32>| drop(unsafe { Box::from_raw(p.as_ptr()) })),
///     )
/// };
/// assert_eq!(*e, 7);
/// ```
#[derive(Clone, Copy, Default)]
pub struct FnDeleter<F>(pub F);

impl<F> fmt::Debug for FnDeleter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnDeleter")
    }
}

impl<T, F> Deleter<T> for FnDeleter<F>
where
    T: ?Sized,
    F: FnMut(NonNull<T>),
{
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        (self.0)(ptr)
    }
}
