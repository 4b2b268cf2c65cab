use std::fmt::Debug;

use colview_error::{Result, VectorError};
use half::f16;

use super::buffer_manager::{BufferManager, Reservation};

/// Marker for types that can be viewed as raw bytes and built back up from
/// raw bytes.
///
/// # Safety
///
/// Implementors must be `Copy`, contain no padding, and every bit pattern of
/// `size_of::<Self>()` bytes must be a valid value.
pub unsafe trait PlainData: Debug + Copy + Default + Send + Sync + 'static {}

unsafe impl PlainData for i8 {}
unsafe impl PlainData for i16 {}
unsafe impl PlainData for i32 {}
unsafe impl PlainData for i64 {}
unsafe impl PlainData for u8 {}
unsafe impl PlainData for u16 {}
unsafe impl PlainData for u32 {}
unsafe impl PlainData for u64 {}
unsafe impl PlainData for f16 {}
unsafe impl PlainData for f32 {}
unsafe impl PlainData for f64 {}

/// Type alias to a buffer storing bytes.
pub type ByteBuffer<B> = TypedBuffer<u8, B>;

/// A fixed capacity buffer of `T` backed by a buffer manager reservation.
///
/// Every slot up to capacity is initialized (zeroed on allocation), so reads
/// never observe uninitialized memory. Growing the buffer reserves the
/// additional bytes before touching the allocation, so a failed reservation
/// leaves the buffer untouched.
#[derive(Debug)]
pub struct TypedBuffer<T: PlainData, B: BufferManager> {
    data: Vec<T>,
    reservation: Reservation<B>,
}

impl<T, B> TypedBuffer<T, B>
where
    T: PlainData,
    B: BufferManager,
{
    /// Zero-capacity buffer.
    ///
    /// Never allocates and never touches the manager's accounting.
    pub fn empty(manager: &B) -> Self {
        TypedBuffer {
            data: Vec::new(),
            reservation: Reservation::empty(manager),
        }
    }

    /// Create a new buffer that can hold `cap` number of entries.
    pub fn try_with_capacity(manager: &B, cap: usize) -> Result<Self> {
        let size = Self::bytes_for(cap)?;
        let reservation = manager.try_reserve(size)?;

        let mut data = Vec::new();
        Self::try_grow(&mut data, cap)?;

        Ok(TypedBuffer { data, reservation })
    }

    /// Create a new buffer holding a copy of `values`.
    pub fn try_from_slice(manager: &B, values: &[T]) -> Result<Self> {
        let mut buf = Self::try_with_capacity(manager, values.len())?;
        buf.data.copy_from_slice(values);
        Ok(buf)
    }

    /// Create a new buffer from raw bytes.
    ///
    /// Errors if the number of bytes isn't a multiple of the size of `T`.
    pub fn try_from_bytes(manager: &B, bytes: &[u8]) -> Result<Self> {
        let width = std::mem::size_of::<T>();
        if bytes.len() % width != 0 {
            return Err(
                VectorError::schema_mismatch("Byte length not a multiple of the type width")
                    .with_field("bytes", bytes.len())
                    .with_field("width", width),
            );
        }

        let mut buf = Self::try_with_capacity(manager, bytes.len() / width)?;
        buf.as_bytes_mut().copy_from_slice(bytes);

        Ok(buf)
    }

    /// Resizes the buffer if the current capacity is less than `size` in number
    /// of `T` elements.
    ///
    /// Does nothing if the current capacity is sufficient.
    ///
    /// Attempts to amortize reallocations by doubling the current capacity if
    /// sufficient.
    pub fn reserve_for_size(&mut self, size: usize) -> Result<()> {
        if self.capacity() < size {
            let new_cap = usize::max(size, self.capacity() * 2);
            let additional = new_cap - self.capacity();
            self.reserve_additional(additional)?;
        }

        Ok(())
    }

    /// Grow this buffer by exactly `additional` number of entries.
    ///
    /// New entries are zeroed.
    pub fn reserve_additional(&mut self, additional: usize) -> Result<()> {
        if additional == 0 {
            return Ok(());
        }

        let size = Self::bytes_for(additional)?;
        let extra = self.reservation.manager().try_reserve(size)?;

        // The reservation is released if the allocation fails.
        Self::try_grow(&mut self.data, additional)?;
        self.reservation.merge(extra);

        Ok(())
    }

    /// Returns the capacity of this buffer in number of `T`.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Size in bytes of the buffer's contents.
    pub fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<T>()
    }

    pub fn manager(&self) -> &B {
        self.reservation.manager()
    }

    pub fn reservation(&self) -> &Reservation<B> {
        &self.reservation
    }

    /// Swap out the reservation backing this buffer, returning the old one.
    ///
    /// Used when handing ownership of the allocation over to a different
    /// manager. Dropping the returned reservation releases the bytes from the
    /// previous manager.
    pub(crate) fn replace_reservation(&mut self, reservation: Reservation<B>) -> Reservation<B> {
        debug_assert_eq!(self.size_bytes(), reservation.size());
        std::mem::replace(&mut self.reservation, reservation)
    }

    /// Zero out all entries, keeping the capacity.
    pub fn reset(&mut self) {
        self.data.iter_mut().for_each(|v| *v = T::default());
    }

    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    /// Convert this buffer to a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Convert this buffer to a mutable slice.
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// View the buffer's contents as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `PlainData` guarantees no padding.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr().cast::<u8>(), self.size_bytes()) }
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.size_bytes();
        // SAFETY: `PlainData` guarantees no padding and that any bit pattern
        // is valid.
        unsafe { std::slice::from_raw_parts_mut(self.data.as_mut_ptr().cast::<u8>(), len) }
    }

    /// Append `additional` zeroed entries, erroring instead of aborting if
    /// the allocator can't satisfy the request.
    fn try_grow(data: &mut Vec<T>, additional: usize) -> Result<()> {
        data.try_reserve_exact(additional).map_err(|e| {
            VectorError::allocation("Failed to allocate buffer")
                .with_field("capacity", additional)
                .with_field("reason", e)
        })?;
        data.resize(data.len() + additional, T::default());
        Ok(())
    }

    fn bytes_for(cap: usize) -> Result<usize> {
        cap.checked_mul(std::mem::size_of::<T>()).ok_or_else(|| {
            VectorError::allocation("Requested buffer size overflows").with_field("capacity", cap)
        })
    }
}

impl<T, B> AsRef<[T]> for TypedBuffer<T, B>
where
    T: PlainData,
    B: BufferManager,
{
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, B> AsMut<[T]> for TypedBuffer<T, B>
where
    T: PlainData,
    B: BufferManager,
{
    fn as_mut(&mut self) -> &mut [T] {
        self.as_slice_mut()
    }
}
