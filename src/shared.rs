use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem,
    ops::Deref,
    ptr::{self, NonNull},
};

use crate::{
    block::{ControlBlock, Handle},
    deleter::{DefaultDelete, Deleter},
    error::{Error, Result},
    weak::Weak,
};

/// A reference counted owning pointer, similar to [`Arc`].
///
/// A `Shared` is either empty or holds one strong reference to a control block. Cloning adds a
/// strong reference; dropping, [`reset`][Shared::reset] or [`take`][Shared::take] followed by a
/// drop gives it back. The object is disposed when the last strong reference goes away, while
/// the control block stays around for as long as [`Weak`] pointers observe it.
///
/// The managed object is only ever handed out as `&T`. Mutating it from several owners needs
/// interior mutability of its own.
///
/// [`Arc`]: std::sync::Arc
pub struct Shared<T> {
    handle: Option<Handle<T>>,
    _marker: PhantomData<T>,
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            unsafe { ControlBlock::release_strong(handle.block) };
        }
    }
}

unsafe impl<T> Send for Shared<T> where T: Send + Sync {}

unsafe impl<T> Sync for Shared<T> where T: Send + Sync {}

impl<T> Shared<T> {
    /// Creates an empty pointer that owns nothing.
    pub const fn null() -> Self {
        Shared {
            handle: None,
            _marker: PhantomData,
        }
    }

    /// Moves `value` into a new allocation shared with its control block. Same as
    /// [`make_shared`][crate::make_shared].
    ///
    /// # Examples
    ///
    /// ```
    /// # use custody::Shared;
    /// let s = Shared::new(5);
    /// assert!(*s == 5);
    /// assert!(s.use_count() == 1);
    /// ```
    pub fn new(value: T) -> Self {
        crate::make_shared(value)
    }

    /// Takes over a boxed object. The control block is allocated separately and releases the box
    /// when the last strong reference is gone.
    pub fn from_box(value: Box<T>) -> Self {
        let ptr = NonNull::from(Box::leak(value));
        Self::from_handle(ControlBlock::separate(ptr, DefaultDelete))
    }

    /// Takes ownership of a raw pointer obtained from [`Box::into_raw`]. A null pointer gives an
    /// empty `Shared`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from `Box::into_raw`, and must not be owned by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        match NonNull::new(ptr) {
            Some(ptr) => Self::from_handle(ControlBlock::separate(ptr, DefaultDelete)),
            None => Self::null(),
        }
    }

    /// Takes ownership of `ptr`, to be released with `deleter` once the last strong reference is
    /// gone. A null pointer gives an empty `Shared` and `deleter` is dropped unused.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live object that `deleter` can reclaim, and must not be
    /// owned by anything else.
    pub unsafe fn from_raw_with_deleter<D>(ptr: *mut T, deleter: D) -> Self
    where
        D: Deleter<T> + Send + 'static,
    {
        match NonNull::new(ptr) {
            Some(ptr) => Self::from_handle(ControlBlock::separate(ptr, deleter)),
            None => Self::null(),
        }
    }

    /// Adopts a handle that already carries a strong reference.
    pub(crate) fn from_handle(handle: Handle<T>) -> Self {
        Shared {
            handle: Some(handle),
            _marker: PhantomData,
        }
    }

    /// Upgrades a weak pointer, failing if its object has already been disposed.
    ///
    /// An empty `Weak` gives an empty `Shared`, which is not an error. Use [`Weak::lock`] to get
    /// an empty `Shared` in both cases instead.
    ///
    /// # Examples
    ///
    /// ```
    /// # use custody::{Error, Shared};
    /// let s = Shared::new(5);
    /// let w = s.downgrade();
    /// assert!(*Shared::try_from_weak(&w).unwrap() == 5);
    ///
    /// drop(s);
    /// assert!(Shared::try_from_weak(&w) == Err(Error::BadWeakReference));
    /// ```
    pub fn try_from_weak(weak: &Weak<T>) -> Result<Self> {
        match weak.handle() {
            None => Ok(Self::null()),
            Some(handle) => {
                if unsafe { handle.block.as_ref() }.try_add_strong() {
                    Ok(Self::from_handle(handle))
                } else {
                    log::debug!("upgrade of {:p} failed, object already disposed", handle.ptr);
                    Err(Error::BadWeakReference)
                }
            }
        }
    }

    pub(crate) fn handle(&self) -> Option<Handle<T>> {
        self.handle
    }

    fn block(&self) -> Option<&ControlBlock<T>> {
        self.handle.as_ref().map(|h| unsafe { h.block.as_ref() })
    }

    /// Gets a reference to the value, or `None` if the pointer is empty.
    pub fn get(&self) -> Option<&T> {
        self.handle.as_ref().map(|h| unsafe { h.ptr.as_ref() })
    }

    /// Gets a raw pointer to the value. Empty pointers give a null pointer.
    pub fn as_ptr(&self) -> *const T {
        self.handle.map_or(ptr::null(), |h| h.ptr.as_ptr() as *const T)
    }

    pub fn is_null(&self) -> bool {
        self.handle.is_none()
    }

    /// Gets the number of strong pointers to the object, or `0` for an empty pointer.
    ///
    /// This is a snapshot. Other threads may clone or drop handles at any time, so the value can
    /// be stale by the time it is read.
    ///
    /// # Examples
    ///
    /// ```
    /// # use custody::Shared;
    /// let s1 = Shared::new(5);
    /// assert!(s1.use_count() == 1);
    ///
    /// let s2 = s1.clone();
    /// assert!(s1.use_count() == 2);
    ///
    /// drop(s2);
    /// assert!(s1.use_count() == 1);
    /// ```
    pub fn use_count(&self) -> usize {
        self.block().map_or(0, |b| b.strong_count())
    }

    /// Returns `true` if this is the only strong pointer to the object.
    pub fn unique(&self) -> bool {
        self.use_count() == 1
    }

    /// Gets the number of [`Weak`] pointers to the object. Like [`use_count`][Self::use_count],
    /// this is only a snapshot.
    pub fn weak_count(&self) -> usize {
        // the strong group holds one weak reference of its own
        self.block().map_or(0, |b| b.weak_count().saturating_sub(1))
    }

    /// Creates a new weak pointer to the object.
    ///
    /// # Examples
    ///
    /// ```
    /// # use custody::Shared;
    /// let s = Shared::new(5);
    /// let w = s.downgrade();
    ///
    /// assert!(s.as_ptr() == w.as_ptr());
    /// assert!(s.use_count() == 1);
    /// assert!(s.weak_count() == 1);
    /// ```
    pub fn downgrade(&self) -> Weak<T> {
        Weak::from(self)
    }

    /// Gives up this pointer's ownership, leaving it empty.
    pub fn reset(&mut self) {
        Self::null().swap(self);
    }

    /// Gives up this pointer's ownership and takes over `value` instead.
    pub fn reset_with(&mut self, value: Box<T>) {
        Self::from_box(value).swap(self);
    }

    /// Gives up this pointer's ownership and takes over `ptr` instead, to be released with
    /// `deleter`.
    ///
    /// # Safety
    ///
    /// Same as [`from_raw_with_deleter`][Self::from_raw_with_deleter].
    pub unsafe fn reset_with_deleter<D>(&mut self, ptr: *mut T, deleter: D)
    where
        D: Deleter<T> + Send + 'static,
    {
        Self::from_raw_with_deleter(ptr, deleter).swap(self);
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.handle, &mut other.handle);
    }

    /// Moves the ownership out, leaving this pointer empty. No reference count changes.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Returns `true` if both pointers refer to the same object, or both are empty.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        ptr::eq(self.as_ptr(), other.as_ptr())
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block() {
            block.add_strong();
        }

        Shared {
            handle: self.handle,
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Deref for Shared<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the pointer is empty.
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty Shared<{}>", std::any::type_name::<T>()),
        }
    }
}

impl<T> From<Box<T>> for Shared<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T> TryFrom<&Weak<T>> for Shared<T> {
    type Error = Error;

    fn try_from(value: &Weak<T>) -> Result<Self> {
        Self::try_from_weak(value)
    }
}

impl<T> fmt::Debug for Shared<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T> fmt::Pointer for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

impl<T> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for Shared<T> {}

impl<T> PartialOrd for Shared<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Shared<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        Ord::cmp(&self.as_ptr(), &other.as_ptr())
    }
}

impl<T> Hash for Shared<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Hash::hash(&self.as_ptr(), state)
    }
}
