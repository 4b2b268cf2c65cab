use colview_error::{Result, VectorError};

use crate::buffer::buffer_manager::{BufferManager, Reservation};
use crate::buffer::typed::ByteBuffer;

/// Number of bytes needed to hold `len` bits.
pub const fn num_bytes_for_bits(len: usize) -> usize {
    len.div_ceil(8)
}

/// An LSB ordered bitmap backed by a managed byte buffer.
#[derive(Debug)]
pub struct Bitmap<B: BufferManager> {
    len: usize,
    data: ByteBuffer<B>,
}

impl<B> Bitmap<B>
where
    B: BufferManager,
{
    /// Zero-length bitmap without any backing memory.
    pub fn empty(manager: &B) -> Self {
        Bitmap {
            len: 0,
            data: ByteBuffer::empty(manager),
        }
    }

    /// Create a bitmap of `len` bits, all unset.
    pub fn try_new_all_false(manager: &B, len: usize) -> Result<Self> {
        let data = ByteBuffer::try_with_capacity(manager, num_bytes_for_bits(len))?;
        Ok(Bitmap { len, data })
    }

    /// Wrap an existing byte buffer as a bitmap of `len` bits.
    ///
    /// Errors if the buffer is too small to hold `len` bits.
    pub fn try_from_buffer(data: ByteBuffer<B>, len: usize) -> Result<Self> {
        let need = num_bytes_for_bits(len);
        if data.capacity() < need {
            return Err(VectorError::schema_mismatch("Bitmap buffer too small")
                .with_field("need_bytes", need)
                .with_field("have_bytes", data.capacity()));
        }
        Ok(Bitmap { len, data })
    }

    /// Get the number of bits being tracked by this bitmap.
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the value at index.
    ///
    /// Panics if index is out of bounds.
    #[inline]
    pub fn value(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len);
        let byte = self.data.as_slice()[idx >> 3];
        (byte >> (idx & 7)) & 1 != 0
    }

    /// Set a bit at index.
    ///
    /// Panics if index is out of bounds.
    #[inline]
    pub fn set_unchecked(&mut self, idx: usize, val: bool) {
        debug_assert!(idx < self.len);
        let byte = idx / 8;
        let bit = idx & 7;
        let data = self.data.as_slice_mut();
        if val {
            data[byte] |= 1 << bit;
        } else {
            data[byte] &= !(1 << bit);
        }
    }

    /// Count the set bits among the first `len` bits.
    pub fn count_trues_prefix(&self, len: usize) -> usize {
        debug_assert!(len <= self.len);
        let full = len / 8;
        let mut count = self.data.as_slice()[..full]
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum();

        let rem = len % 8;
        if rem != 0 {
            let mask = (1u8 << rem) - 1;
            count += (self.data.as_slice()[full] & mask).count_ones() as usize;
        }

        count
    }

    pub fn count_trues(&self) -> usize {
        self.count_trues_prefix(self.len)
    }

    /// Grow the bitmap to track `len` bits.
    ///
    /// New bits are unset. Never shrinks.
    pub fn resize(&mut self, len: usize) -> Result<()> {
        if len <= self.len {
            return Ok(());
        }
        let need = num_bytes_for_bits(len);
        if need > self.data.capacity() {
            self.data.reserve_additional(need - self.data.capacity())?;
        }
        self.len = len;
        Ok(())
    }

    /// Unset every bit, keeping the length.
    pub fn reset(&mut self) {
        self.data.reset();
    }

    pub fn iter(&self) -> BitmapIter<'_, B> {
        BitmapIter {
            idx: 0,
            bitmap: self,
        }
    }

    /// Bytes covering the first `len` bits.
    pub fn bytes_for_prefix(&self, len: usize) -> &[u8] {
        &self.data.as_slice()[..num_bytes_for_bits(len)]
    }

    pub fn size_bytes(&self) -> usize {
        self.data.size_bytes()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    pub(crate) fn replace_reservation(&mut self, reservation: Reservation<B>) -> Reservation<B> {
        self.data.replace_reservation(reservation)
    }

    pub fn into_inner(self) -> ByteBuffer<B> {
        self.data
    }
}

#[derive(Debug)]
pub struct BitmapIter<'a, B: BufferManager> {
    idx: usize,
    bitmap: &'a Bitmap<B>,
}

impl<B> Iterator for BitmapIter<'_, B>
where
    B: BufferManager,
{
    type Item = bool;

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.bitmap.len() {
            return None;
        }
        let v = self.bitmap.value(self.idx);
        self.idx += 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rem = self.bitmap.len() - self.idx;
        (rem, Some(rem))
    }
}

impl<B> ExactSizeIterator for BitmapIter<'_, B> where B: BufferManager {}
