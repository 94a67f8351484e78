use std::{alloc::Layout, fmt, ptr::NonNull, sync::OnceLock};

use crossbeam::channel;

use crate::error::{Error, Result};

/// A source of memory for co-allocated control blocks, used by
/// [`allocate_shared`][crate::allocate_shared].
///
/// # Safety
///
/// `allocate` must return memory valid for `layout` that stays valid until it is passed back to
/// `deallocate` with the same layout. Memory from one allocator must never be released through
/// another, unless the two share their backing store.
pub unsafe trait Allocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>>;

    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this allocator with the same `layout`, and
    /// must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

unsafe impl<A> Allocator for &A
where
    A: Allocator + ?Sized,
{
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        (**self).allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }
}

/// The process-wide allocator behind [`Box`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Global;

unsafe impl Allocator for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        if layout.size() == 0 {
            // any aligned, non-null address is a valid zero sized allocation
            return Ok(unsafe { NonNull::new_unchecked(layout.align() as *mut u8) });
        }

        NonNull::new(unsafe { std::alloc::alloc(layout) }).ok_or(Error::alloc_failed(layout))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            std::alloc::dealloc(ptr.as_ptr(), layout);
        }
    }
}

struct AllowSend<T>(T);

unsafe impl<T> Send for AllowSend<T> {}

/// An allocator that recycles released blocks instead of returning them to [`Global`].
///
/// A pool binds itself to the first layout it is asked for. Released blocks of that layout are
/// kept on a free list of at most `capacity` entries and handed out again by later allocations.
/// Requests for any other layout, and releases that find the free list full, go straight to
/// `Global`.
///
/// You usually define a static pool for every type that is created in large numbers.
///
/// ```
/// # use custody::{allocate_shared, Pool};
/// static POOL: Pool = Pool::new();
///
/// let s = allocate_shared(&POOL, 5).unwrap();
/// drop(s);
/// assert_eq!(POOL.cached(), 1);
///
/// // the next block reuses the cached allocation
/// let _s = allocate_shared(&POOL, 6).unwrap();
/// assert_eq!(POOL.cached(), 0);
/// ```
pub struct Pool {
    capacity: usize,
    layout: OnceLock<Layout>,
    channel: OnceLock<(
        channel::Sender<AllowSend<NonNull<u8>>>,
        channel::Receiver<AllowSend<NonNull<u8>>>,
    )>,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity)
            .field("layout", &self.layout.get())
            .field("cached", &self.cached())
            .finish()
    }
}

impl Pool {
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Creates a pool holding at most [`Pool::DEFAULT_CAPACITY`] released blocks.
    pub const fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub const fn with_capacity(capacity: usize) -> Self {
        Pool {
            capacity,
            layout: OnceLock::new(),
            channel: OnceLock::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of released blocks currently waiting for reuse.
    pub fn cached(&self) -> usize {
        self.channel.get().map_or(0, |(_, recv)| recv.len())
    }

    fn channel(
        &self,
    ) -> &(
        channel::Sender<AllowSend<NonNull<u8>>>,
        channel::Receiver<AllowSend<NonNull<u8>>>,
    ) {
        self.channel
            .get_or_init(|| channel::bounded(self.capacity))
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Allocator for Pool {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>> {
        if *self.layout.get_or_init(|| layout) == layout {
            if let Ok(slot) = self.channel().1.try_recv() {
                log::debug!("pool reusing a block of {} bytes", layout.size());
                return Ok(slot.0);
            }
        }

        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if self.layout.get() != Some(&layout) {
            return Global.deallocate(ptr, layout);
        }

        if let Err(err) = self.channel().0.try_send(AllowSend(ptr)) {
            log::debug!("pool full, releasing a block of {} bytes", layout.size());
            Global.deallocate(err.into_inner().0, layout);
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if let (Some(layout), Some((_, recv))) = (self.layout.get(), self.channel.get()) {
            while let Ok(slot) = recv.try_recv() {
                unsafe { Global.deallocate(slot.0, *layout) };
            }
        }
    }
}
