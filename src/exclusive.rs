use std::{
    fmt,
    marker::PhantomData,
    mem,
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use crate::deleter::{DefaultDelete, Deleter};

/// An owning pointer with exactly one owner, similar to [`Box`] but nullable and with a
/// pluggable [`Deleter`].
///
/// An `Exclusive` is either owning or empty. It cannot be cloned; moving it (or calling
/// [`take`][Exclusive::take]) transfers ownership. The deleter runs exactly once, when an owning
/// pointer is dropped or [`reset`][Exclusive::reset], and never after
/// [`release`][Exclusive::release].
pub struct Exclusive<T, D = DefaultDelete>
where
    T: ?Sized,
    D: Deleter<T>,
{
    ptr: Option<NonNull<T>>,
    deleter: D,
    _marker: PhantomData<T>,
}

impl<T, D> Drop for Exclusive<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    fn drop(&mut self) {
        self.reset();
    }
}

unsafe impl<T, D> Send for Exclusive<T, D>
where
    T: ?Sized + Send,
    D: Deleter<T> + Send,
{
}

unsafe impl<T, D> Sync for Exclusive<T, D>
where
    T: ?Sized + Sync,
    D: Deleter<T> + Sync,
{
}

impl<T> Exclusive<T> {
    /// Moves `value` to the heap. Same as [`make_exclusive`][crate::make_exclusive].
    pub fn new(value: T) -> Self {
        Self::from(Box::new(value))
    }
}

impl<T> Exclusive<T>
where
    T: ?Sized,
{
    /// Converts back into a [`Box`], or `None` if the pointer is empty.
    pub fn into_box(mut self) -> Option<Box<T>> {
        self.release().map(|ptr| unsafe { Box::from_raw(ptr.as_ptr()) })
    }
}

impl<T, D> Exclusive<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    /// Creates an empty pointer.
    pub fn null() -> Self
    where
        D: Default,
    {
        Exclusive {
            ptr: None,
            deleter: D::default(),
            _marker: PhantomData,
        }
    }

    /// Takes ownership of `ptr`. A null pointer gives an empty `Exclusive`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live object that `D::default()` can reclaim, and must not
    /// be owned by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self
    where
        D: Default,
    {
        Self::from_raw_with_deleter(ptr, D::default())
    }

    /// Takes ownership of `ptr`, to be reclaimed by `deleter`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live object that `deleter` can reclaim, and must not be
    /// owned by anything else.
    pub unsafe fn from_raw_with_deleter(ptr: *mut T, deleter: D) -> Self {
        Exclusive {
            ptr: NonNull::new(ptr),
            deleter,
            _marker: PhantomData,
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.ptr.map(|ptr| unsafe { &mut *ptr.as_ptr() })
    }

    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    pub fn deleter(&self) -> &D {
        &self.deleter
    }

    pub fn deleter_mut(&mut self) -> &mut D {
        &mut self.deleter
    }

    /// Gives up ownership without running the deleter. The caller becomes responsible for the
    /// returned pointer.
    ///
    /// # Examples
    ///
    /// ```
    /// # use custody::Exclusive;
    /// let mut e = Exclusive::new(5);
    /// let raw = e.release().unwrap();
    /// assert!(e.is_null());
    ///
    /// // hand it back
    /// unsafe { e.reset_raw(raw.as_ptr()) };
    /// assert!(*e == 5);
    /// ```
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.ptr.take()
    }

    /// Runs the deleter on the owned object, if any, leaving the pointer empty.
    pub fn reset(&mut self) {
        if let Some(old) = self.ptr.take() {
            unsafe { self.deleter.delete(old) };
        }
    }

    /// Takes ownership of `ptr` after running the deleter on the previously owned object.
    ///
    /// # Safety
    ///
    /// Same as [`from_raw_with_deleter`][Self::from_raw_with_deleter], with this pointer's
    /// deleter. `ptr` must not be the object currently owned.
    pub unsafe fn reset_raw(&mut self, ptr: *mut T) {
        // the old object is no longer reachable from `self` while its deleter runs
        let old = mem::replace(&mut self.ptr, NonNull::new(ptr));
        if let Some(old) = old {
            self.deleter.delete(old);
        }
    }

    /// Moves the ownership and the deleter out, leaving this pointer empty.
    pub fn take(&mut self) -> Self
    where
        D: Default,
    {
        Exclusive {
            ptr: self.ptr.take(),
            deleter: mem::take(&mut self.deleter),
            _marker: PhantomData,
        }
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.ptr, &mut other.ptr);
        mem::swap(&mut self.deleter, &mut other.deleter);
    }
}

impl<T> From<Box<T>> for Exclusive<T>
where
    T: ?Sized,
{
    fn from(value: Box<T>) -> Self {
        Exclusive {
            ptr: Some(NonNull::from(Box::leak(value))),
            deleter: DefaultDelete,
            _marker: PhantomData,
        }
    }
}

impl<T, D> Default for Exclusive<T, D>
where
    T: ?Sized,
    D: Deleter<T> + Default,
{
    fn default() -> Self {
        Self::null()
    }
}

impl<T, D> Deref for Exclusive<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    type Target = T;

    /// # Panics
    ///
    /// Panics if the pointer is empty.
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty Exclusive<{}>", std::any::type_name::<T>()),
        }
    }
}

impl<T, D> DerefMut for Exclusive<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    fn deref_mut(&mut self) -> &mut T {
        match self.get_mut() {
            Some(value) => value,
            None => panic!("dereferenced an empty Exclusive<{}>", std::any::type_name::<T>()),
        }
    }
}

impl<T, D> fmt::Debug for Exclusive<T, D>
where
    T: ?Sized + fmt::Debug,
    D: Deleter<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T, D> PartialEq for Exclusive<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    /// Compares addresses. Two empty pointers are equal.
    fn eq(&self, other: &Self) -> bool {
        match (self.ptr, other.ptr) {
            (Some(a), Some(b)) => a.as_ptr() as *const () == b.as_ptr() as *const (),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T, D> Eq for Exclusive<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
}
