use std::{fmt, marker::PhantomData, mem, ptr};

use crate::{
    block::{ControlBlock, Handle},
    shared::Shared,
};

/// A non-owning pointer to an object managed by [`Shared`].
///
/// A weak pointer keeps the control block alive but not the object. It cannot provide a
/// reference to the value because another thread may drop the last strong pointer at any time.
/// Instead you must first [`lock`][Weak::lock] it, which either produces a new strong pointer or
/// tells you that the object is gone.
pub struct Weak<T> {
    handle: Option<Handle<T>>,
    _marker: PhantomData<T>,
}

impl<T> Drop for Weak<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            unsafe { ControlBlock::release_weak(handle.block) };
        }
    }
}

unsafe impl<T> Send for Weak<T> where T: Send + Sync {}

unsafe impl<T> Sync for Weak<T> where T: Send + Sync {}

impl<T> Weak<T> {
    /// Creates an empty weak pointer that observes nothing. It is always expired.
    pub const fn new() -> Self {
        Weak {
            handle: None,
            _marker: PhantomData,
        }
    }

    pub(crate) fn handle(&self) -> Option<Handle<T>> {
        self.handle
    }

    fn block(&self) -> Option<&ControlBlock<T>> {
        self.handle.as_ref().map(|h| unsafe { h.block.as_ref() })
    }

    /// Creates a strong pointer to the object. Returns an empty [`Shared`] if the object has
    /// already been disposed because there are no more strong pointers to it.
    ///
    /// This is the authoritative liveness check: the strong count is raised atomically only if
    /// it is not already zero.
    ///
    /// # Examples
    ///
    /// ```
    /// # use custody::Shared;
    /// let s = Shared::new(5);
    /// let w = s.downgrade();
    ///
    /// assert!(*w.lock() == 5);
    ///
    /// drop(s);
    /// assert!(w.lock().is_null());
    /// ```
    pub fn lock(&self) -> Shared<T> {
        self.upgrade().unwrap_or_default()
    }

    /// Like [`lock`][Weak::lock], but reports a missing object as `None`.
    pub fn upgrade(&self) -> Option<Shared<T>> {
        let handle = self.handle?;

        if unsafe { handle.block.as_ref() }.try_add_strong() {
            Some(Shared::from_handle(handle))
        } else {
            None
        }
    }

    /// Gets the number of strong pointers to the object. Returns `0` once the object is gone,
    /// or if this pointer is empty.
    pub fn use_count(&self) -> usize {
        self.block().map_or(0, |b| b.strong_count())
    }

    /// Returns `true` if the object has been disposed.
    ///
    /// The answer may be outdated as soon as it is returned if other threads are dropping strong
    /// pointers. Only [`lock`][Weak::lock] decides reliably.
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Stops observing the object, leaving this pointer empty.
    pub fn reset(&mut self) {
        Self::new().swap(self);
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.handle, &mut other.handle);
    }

    /// Moves the weak reference out, leaving this pointer empty. No reference count changes.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Gets the cached address of the object. The address may dangle and must not be
    /// dereferenced without upgrading first.
    pub fn as_ptr(&self) -> *const T {
        self.handle.map_or(ptr::null(), |h| h.ptr.as_ptr() as *const T)
    }

    /// Returns `true` if both pointers observe the same control block, or both are empty.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.handle, other.handle) {
            (Some(a), Some(b)) => a.block == b.block,
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> From<&Shared<T>> for Weak<T> {
    fn from(value: &Shared<T>) -> Self {
        let handle = value.handle();
        if let Some(handle) = handle {
            unsafe { handle.block.as_ref() }.add_weak();
        }

        Weak {
            handle,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Weak<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block() {
            block.add_weak();
        }

        Weak {
            handle: self.handle,
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Weak<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Weak<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("Weak");
        if let Some(strong) = self.upgrade() {
            f.field(&*strong);
        }
        f.finish()
    }
}
