use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use colview_error::{Result, VectorError};
use parking_lot::Mutex;
use tracing::trace;

/// Allocator service backing all vector buffers.
///
/// The manager only accounts for memory, it doesn't pick an allocation
/// strategy. Buffers ask for a reservation before allocating, and the
/// reservation is handed back when it's dropped.
pub trait BufferManager: Debug + Sync + Clone + Send + Sized {
    /// Try to reserve some number of bytes.
    ///
    /// Returns a reservation for keeping tracker of "used" bytes.
    ///
    /// This should never error when attempting to reserve zero bytes.
    fn try_reserve(&self, size_bytes: usize) -> Result<Reservation<Self>>;

    /// Drops a memory reservation.
    ///
    /// Called automatically when a reservation goes out of scope.
    fn drop_reservation(&self, reservation: &Reservation<Self>);
}

#[derive(Debug)]
pub struct Reservation<B: BufferManager> {
    manager: B,
    /// Size in bytes of the memory reservation.
    size: usize,
}

impl<B> Reservation<B>
where
    B: BufferManager,
{
    /// Create a new reservation.
    ///
    /// Only buffer managers should call this after accounting for `size`.
    pub fn new(manager: B, size: usize) -> Self {
        Reservation { manager, size }
    }

    /// Create a zero-sized reservation that never touches the manager's
    /// accounting.
    pub fn empty(manager: &B) -> Self {
        Reservation {
            manager: manager.clone(),
            size: 0,
        }
    }

    /// Merge another reservation into this one.
    ///
    /// Both reservations should have come from the same manager.
    pub fn merge(&mut self, mut other: Self) {
        self.size += other.size;
        // Ownership of the bytes moved to self.
        other.size = 0;
    }

    pub const fn manager(&self) -> &B {
        &self.manager
    }

    pub const fn size(&self) -> usize {
        self.size
    }
}

impl<B> Drop for Reservation<B>
where
    B: BufferManager,
{
    fn drop(&mut self) {
        if self.size > 0 {
            self.manager.drop_reservation(self);
        }
    }
}

/// Placeholder buffer manager.
///
/// Never fails, never tracks anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NopBufferManager;

impl BufferManager for NopBufferManager {
    fn try_reserve(&self, size_bytes: usize) -> Result<Reservation<Self>> {
        Ok(Reservation::new(*self, size_bytes))
    }

    fn drop_reservation(&self, _reservation: &Reservation<Self>) {
        // Ok
    }
}

static NEXT_MANAGER_ID: AtomicUsize = AtomicUsize::new(0);

/// Buffer manager that tracks reserved bytes against an optional limit.
///
/// Clones share the same accounting.
#[derive(Debug, Clone)]
pub struct TrackedBufferManager {
    inner: Arc<TrackedInner>,
}

#[derive(Debug)]
struct TrackedInner {
    id: usize,
    limit: Option<usize>,
    state: Mutex<TrackedState>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrackedState {
    /// Bytes currently reserved.
    pub allocated: usize,
    /// High water mark for reserved bytes.
    pub peak: usize,
}

impl TrackedBufferManager {
    /// Create a manager without a limit.
    pub fn new() -> Self {
        Self::new_inner(None)
    }

    /// Create a manager that will refuse reservations that would push the
    /// total reserved bytes over `limit`.
    pub fn with_limit(limit: usize) -> Self {
        Self::new_inner(Some(limit))
    }

    fn new_inner(limit: Option<usize>) -> Self {
        TrackedBufferManager {
            inner: Arc::new(TrackedInner {
                id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
                limit,
                state: Mutex::new(TrackedState::default()),
            }),
        }
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn limit(&self) -> Option<usize> {
        self.inner.limit
    }

    pub fn allocated_bytes(&self) -> usize {
        self.inner.state.lock().allocated
    }

    pub fn peak_bytes(&self) -> usize {
        self.inner.state.lock().peak
    }

    pub fn stats(&self) -> TrackedState {
        *self.inner.state.lock()
    }

    /// Check if two handles point to the same accounting pool.
    pub fn same_pool(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for TrackedBufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferManager for TrackedBufferManager {
    fn try_reserve(&self, size_bytes: usize) -> Result<Reservation<Self>> {
        if size_bytes == 0 {
            return Ok(Reservation::empty(self));
        }

        let mut state = self.inner.state.lock();
        let requested = state.allocated.checked_add(size_bytes).ok_or_else(|| {
            VectorError::allocation("Reservation size overflows").with_field("size", size_bytes)
        })?;

        if let Some(limit) = self.inner.limit {
            if requested > limit {
                return Err(
                    VectorError::allocation("Buffer manager cannot satisfy reservation")
                        .with_field("manager", self.inner.id)
                        .with_field("requested", size_bytes)
                        .with_field("allocated", state.allocated)
                        .with_field("limit", limit),
                );
            }
        }

        state.allocated = requested;
        state.peak = usize::max(state.peak, requested);

        trace!(
            manager = self.inner.id,
            size = size_bytes,
            allocated = state.allocated,
            "reserved bytes"
        );

        Ok(Reservation::new(self.clone(), size_bytes))
    }

    fn drop_reservation(&self, reservation: &Reservation<Self>) {
        let mut state = self.inner.state.lock();
        debug_assert!(state.allocated >= reservation.size());

        state.allocated = state.allocated.saturating_sub(reservation.size());

        trace!(
            manager = self.inner.id,
            size = reservation.size(),
            allocated = state.allocated,
            "released bytes"
        );
    }
}
