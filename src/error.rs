use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A [`Shared`][crate::Shared] was requested directly from a [`Weak`][crate::Weak] whose
    /// object has already been disposed. [`Weak::lock`][crate::Weak::lock] reports the same
    /// situation as an empty handle instead.
    #[error("bad weak reference: the managed object no longer exists")]
    BadWeakReference,

    #[error("allocation of {size} bytes (align {align}) failed")]
    AllocFailed { size: usize, align: usize },
}

impl Error {
    pub(crate) fn alloc_failed(layout: std::alloc::Layout) -> Error {
        Error::AllocFailed {
            size: layout.size(),
            align: layout.align(),
        }
    }
}
