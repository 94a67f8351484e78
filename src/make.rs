use std::alloc::{handle_alloc_error, Layout};

use crate::{
    alloc::{Allocator, Global},
    block::ControlBlock,
    error::{Error, Result},
    exclusive::Exclusive,
    shared::Shared,
};

/// Moves `value` to the heap under a single owner.
///
/// ```
/// # use custody::make_exclusive;
/// let mut e = make_exclusive(String::from("a"));
/// e.push('b');
/// assert!(*e == "ab");
/// ```
pub fn make_exclusive<T>(value: T) -> Exclusive<T> {
    Exclusive::new(value)
}

/// Allocates `len` default values as a single slice under a single owner.
///
/// ```
/// # use custody::make_exclusive_slice;
/// let mut e = make_exclusive_slice::<u32>(3);
/// e[1] = 7;
/// assert!(*e == [0, 7, 0]);
/// ```
pub fn make_exclusive_slice<T>(len: usize) -> Exclusive<[T]>
where
    T: Default,
{
    Exclusive::from(
        std::iter::repeat_with(T::default)
            .take(len)
            .collect::<Box<[T]>>(),
    )
}

/// Moves `value` into a single allocation together with its control block.
///
/// Allocation failure is reported through [`handle_alloc_error`], the same way [`Box::new`]
/// reports it. Use [`allocate_shared`] to receive it as an error instead.
pub fn make_shared<T>(value: T) -> Shared<T> {
    match ControlBlock::inline::<_, Error, _>(Global, || Ok(value)) {
        Ok(handle) => Shared::from_handle(handle),
        Err(Error::AllocFailed { size, align }) => handle_alloc_error(
            Layout::from_size_align(size, align).unwrap_or_else(|_| Layout::new::<T>()),
        ),
        Err(err) => unreachable!("infallible initializer failed: {err}"),
    }
}

/// Like [`make_shared`], but the combined allocation comes from `alloc`. The allocator is
/// stored in the allocation and used again to free it once the last weak reference is gone.
///
/// ```
/// # use custody::{allocate_shared, Global};
/// let s = allocate_shared(Global, 5).unwrap();
/// assert!(*s == 5);
/// ```
pub fn allocate_shared<T, A>(alloc: A, value: T) -> Result<Shared<T>>
where
    A: Allocator + Send + 'static,
{
    try_allocate_shared_with(alloc, || Ok(value))
}

/// Like [`allocate_shared`], but the value is produced by `init` after the memory has been
/// obtained. If `init` fails or panics, the memory is returned to `alloc` first.
///
/// ```
/// # use custody::{try_allocate_shared_with, Error, Global};
/// #[derive(Debug)]
/// enum ParseError {
///     Alloc(Error),
///     Parse(std::num::ParseIntError),
/// }
///
/// impl From<Error> for ParseError {
///     fn from(err: Error) -> Self {
///         ParseError::Alloc(err)
///     }
/// }
///
/// let ok = try_allocate_shared_with(Global, || "12".parse::<u32>().map_err(ParseError::Parse));
/// assert!(*ok.unwrap() == 12);
///
/// let bad = try_allocate_shared_with(Global, || "x".parse::<u32>().map_err(ParseError::Parse));
/// assert!(matches!(bad, Err(ParseError::Parse(_))));
/// ```
pub fn try_allocate_shared_with<T, A, E, F>(alloc: A, init: F) -> Result<Shared<T>, E>
where
    A: Allocator + Send + 'static,
    E: From<Error>,
    F: FnOnce() -> Result<T, E>,
{
    ControlBlock::inline(alloc, init).map(Shared::from_handle)
}
