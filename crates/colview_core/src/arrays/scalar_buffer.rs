use std::fmt;

use colview_error::{Result, VectorError};

use super::hash::{HashValue, VectorHasher};
use super::physical_type::{PhysicalStorage, PhysicalType};
use super::scalar::ScalarValue;
use crate::buffer::buffer_manager::{BufferManager, Reservation};
use crate::buffer::typed::TypedBuffer;

/// A typed buffer of primitive values, tagged by physical type.
#[derive(Debug)]
pub enum ScalarBuffer<B: BufferManager> {
    Int8(TypedBuffer<i8, B>),
    Int16(TypedBuffer<i16, B>),
    Int32(TypedBuffer<i32, B>),
    Int64(TypedBuffer<i64, B>),
    UInt8(TypedBuffer<u8, B>),
    UInt16(TypedBuffer<u16, B>),
    UInt32(TypedBuffer<u32, B>),
    UInt64(TypedBuffer<u64, B>),
    Float16(TypedBuffer<half::f16, B>),
    Float32(TypedBuffer<f32, B>),
    Float64(TypedBuffer<f64, B>),
}

/// Run an expression against the inner typed buffer regardless of type.
macro_rules! dispatch {
    ($self:expr, $buf:ident => $body:expr) => {
        match $self {
            ScalarBuffer::Int8($buf) => $body,
            ScalarBuffer::Int16($buf) => $body,
            ScalarBuffer::Int32($buf) => $body,
            ScalarBuffer::Int64($buf) => $body,
            ScalarBuffer::UInt8($buf) => $body,
            ScalarBuffer::UInt16($buf) => $body,
            ScalarBuffer::UInt32($buf) => $body,
            ScalarBuffer::UInt64($buf) => $body,
            ScalarBuffer::Float16($buf) => $body,
            ScalarBuffer::Float32($buf) => $body,
            ScalarBuffer::Float64($buf) => $body,
        }
    };
}

/// Construct a buffer variant for a physical type.
macro_rules! construct {
    ($physical_type:expr, $ctor:ident ( $($arg:expr),* )) => {
        match $physical_type {
            PhysicalType::Int8 => ScalarBuffer::Int8(TypedBuffer::$ctor($($arg),*)),
            PhysicalType::Int16 => ScalarBuffer::Int16(TypedBuffer::$ctor($($arg),*)),
            PhysicalType::Int32 => ScalarBuffer::Int32(TypedBuffer::$ctor($($arg),*)),
            PhysicalType::Int64 => ScalarBuffer::Int64(TypedBuffer::$ctor($($arg),*)),
            PhysicalType::UInt8 => ScalarBuffer::UInt8(TypedBuffer::$ctor($($arg),*)),
            PhysicalType::UInt16 => ScalarBuffer::UInt16(TypedBuffer::$ctor($($arg),*)),
            PhysicalType::UInt32 => ScalarBuffer::UInt32(TypedBuffer::$ctor($($arg),*)),
            PhysicalType::UInt64 => ScalarBuffer::UInt64(TypedBuffer::$ctor($($arg),*)),
            PhysicalType::Float16 => ScalarBuffer::Float16(TypedBuffer::$ctor($($arg),*)),
            PhysicalType::Float32 => ScalarBuffer::Float32(TypedBuffer::$ctor($($arg),*)),
            PhysicalType::Float64 => ScalarBuffer::Float64(TypedBuffer::$ctor($($arg),*)),
        }
    };
}

/// Same as `construct`, but for fallible constructors.
macro_rules! try_construct {
    ($physical_type:expr, $ctor:ident ( $($arg:expr),* )) => {
        match $physical_type {
            PhysicalType::Int8 => ScalarBuffer::Int8(TypedBuffer::$ctor($($arg),*)?),
            PhysicalType::Int16 => ScalarBuffer::Int16(TypedBuffer::$ctor($($arg),*)?),
            PhysicalType::Int32 => ScalarBuffer::Int32(TypedBuffer::$ctor($($arg),*)?),
            PhysicalType::Int64 => ScalarBuffer::Int64(TypedBuffer::$ctor($($arg),*)?),
            PhysicalType::UInt8 => ScalarBuffer::UInt8(TypedBuffer::$ctor($($arg),*)?),
            PhysicalType::UInt16 => ScalarBuffer::UInt16(TypedBuffer::$ctor($($arg),*)?),
            PhysicalType::UInt32 => ScalarBuffer::UInt32(TypedBuffer::$ctor($($arg),*)?),
            PhysicalType::UInt64 => ScalarBuffer::UInt64(TypedBuffer::$ctor($($arg),*)?),
            PhysicalType::Float16 => ScalarBuffer::Float16(TypedBuffer::$ctor($($arg),*)?),
            PhysicalType::Float32 => ScalarBuffer::Float32(TypedBuffer::$ctor($($arg),*)?),
            PhysicalType::Float64 => ScalarBuffer::Float64(TypedBuffer::$ctor($($arg),*)?),
        }
    };
}

impl<B> ScalarBuffer<B>
where
    B: BufferManager,
{
    /// Zero-capacity buffer for the given physical type.
    pub fn empty(manager: &B, physical_type: PhysicalType) -> Self {
        construct!(physical_type, empty(manager))
    }

    /// Create a new zeroed buffer that can hold `capacity` values.
    pub fn try_with_capacity(
        manager: &B,
        physical_type: PhysicalType,
        capacity: usize,
    ) -> Result<Self> {
        Ok(try_construct!(physical_type, try_with_capacity(manager, capacity)))
    }

    /// Create a buffer by copying raw bytes.
    pub fn try_from_bytes(manager: &B, physical_type: PhysicalType, bytes: &[u8]) -> Result<Self> {
        Ok(try_construct!(physical_type, try_from_bytes(manager, bytes)))
    }

    pub fn try_from_slice<S>(manager: &B, values: &[S::StorageType]) -> Result<Self>
    where
        S: PhysicalStorage,
    {
        let buf = TypedBuffer::try_from_slice(manager, values)?;
        Ok(S::into_scalar_buffer(buf))
    }

    pub fn physical_type(&self) -> PhysicalType {
        match self {
            Self::Int8(_) => PhysicalType::Int8,
            Self::Int16(_) => PhysicalType::Int16,
            Self::Int32(_) => PhysicalType::Int32,
            Self::Int64(_) => PhysicalType::Int64,
            Self::UInt8(_) => PhysicalType::UInt8,
            Self::UInt16(_) => PhysicalType::UInt16,
            Self::UInt32(_) => PhysicalType::UInt32,
            Self::UInt64(_) => PhysicalType::UInt64,
            Self::Float16(_) => PhysicalType::Float16,
            Self::Float32(_) => PhysicalType::Float32,
            Self::Float64(_) => PhysicalType::Float64,
        }
    }

    /// Number of values this buffer can hold.
    pub fn capacity(&self) -> usize {
        dispatch!(self, buf => buf.capacity())
    }

    pub fn size_bytes(&self) -> usize {
        dispatch!(self, buf => buf.size_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        dispatch!(self, buf => buf.as_bytes())
    }

    pub fn as_ptr(&self) -> *const u8 {
        dispatch!(self, buf => buf.as_ptr().cast::<u8>())
    }

    pub fn reservation(&self) -> &Reservation<B> {
        dispatch!(self, buf => buf.reservation())
    }

    /// Grow the buffer to hold exactly `additional` more values.
    pub fn reserve_additional(&mut self, additional: usize) -> Result<()> {
        dispatch!(self, buf => buf.reserve_additional(additional))
    }

    pub fn reset(&mut self) {
        dispatch!(self, buf => buf.reset())
    }

    pub(crate) fn replace_reservation(&mut self, reservation: Reservation<B>) -> Reservation<B> {
        dispatch!(self, buf => buf.replace_reservation(reservation))
    }

    pub fn try_as_slice<S>(&self) -> Result<&[S::StorageType]>
    where
        S: PhysicalStorage,
    {
        match S::get_buffer(self) {
            Some(buf) => Ok(buf.as_slice()),
            None => Err(self.type_mismatch(S::PHYSICAL_TYPE)),
        }
    }

    pub fn try_as_slice_mut<S>(&mut self) -> Result<&mut [S::StorageType]>
    where
        S: PhysicalStorage,
    {
        let have = self.physical_type();
        match S::get_buffer_mut(self) {
            Some(buf) => Ok(buf.as_slice_mut()),
            None => Err(VectorError::schema_mismatch("Physical types don't match")
                .with_field("have", have)
                .with_field("want", S::PHYSICAL_TYPE)),
        }
    }

    /// Get a value at some index.
    ///
    /// Returns None if the index is out of bounds.
    pub fn scalar_value(&self, idx: usize) -> Option<ScalarValue> {
        dispatch!(self, buf => buf.as_slice().get(idx).map(|v| (*v).into()))
    }

    /// Hash a value at some index.
    ///
    /// Returns None if the index is out of bounds.
    pub fn hash_value<H>(&self, idx: usize, hasher: &H) -> Option<u64>
    where
        H: VectorHasher + ?Sized,
    {
        dispatch!(self, buf => buf.as_slice().get(idx).map(|v| v.hash_with(hasher)))
    }

    /// Copy `len` values from `src` starting at `src_start` into this buffer
    /// starting at `dest_start`.
    ///
    /// Both buffers must have the same physical type and enough capacity.
    pub fn copy_from(
        &mut self,
        dest_start: usize,
        src: &ScalarBuffer<B>,
        src_start: usize,
        len: usize,
    ) -> Result<()> {
        if self.physical_type() != src.physical_type() {
            return Err(src.type_mismatch(self.physical_type()));
        }
        if dest_start + len > self.capacity() {
            return Err(VectorError::index_out_of_range(dest_start + len, self.capacity()));
        }
        if src_start + len > src.capacity() {
            return Err(VectorError::index_out_of_range(src_start + len, src.capacity()));
        }

        let width = self.physical_type().width();
        let src_bytes = &src.as_bytes()[(src_start * width)..((src_start + len) * width)];
        let dest_bytes = dispatch!(self, buf => buf.as_bytes_mut());
        dest_bytes[(dest_start * width)..((dest_start + len) * width)].copy_from_slice(src_bytes);

        Ok(())
    }

    fn type_mismatch(&self, want: PhysicalType) -> VectorError {
        VectorError::schema_mismatch("Physical types don't match")
            .with_field("have", self.physical_type())
            .with_field("want", want)
    }
}

/// Role of a buffer within a vector's exported buffer list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldBufferKind {
    Validity,
    Offsets,
    Sizes,
    Values,
}

impl FieldBufferKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validity => "validity",
            Self::Offsets => "offsets",
            Self::Sizes => "sizes",
            Self::Values => "values",
        }
    }
}

impl fmt::Display for FieldBufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Export order for list view vectors.
pub const LIST_VIEW_BUFFER_ORDER: [FieldBufferKind; 4] = [
    FieldBufferKind::Validity,
    FieldBufferKind::Offsets,
    FieldBufferKind::Sizes,
    FieldBufferKind::Values,
];

/// Export order for flat vectors.
pub const FLAT_BUFFER_ORDER: [FieldBufferKind; 2] =
    [FieldBufferKind::Validity, FieldBufferKind::Values];

/// Borrowed byte-level view of one of a vector's buffers.
///
/// Views are trimmed to the vector's logical length. Validity bitmaps are
/// exposed as `UInt8` bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferView<'a> {
    pub kind: FieldBufferKind,
    pub physical_type: PhysicalType,
    pub bytes: &'a [u8],
}

impl BufferView<'_> {
    /// Number of values in this view.
    pub fn len(&self) -> usize {
        self.bytes.len() / self.physical_type.width()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy the view into a new buffer owned by `manager`.
    pub fn try_to_owned<B>(&self, manager: &B) -> Result<ScalarBuffer<B>>
    where
        B: BufferManager,
    {
        ScalarBuffer::try_from_bytes(manager, self.physical_type, self.bytes)
    }
}

/// Row metadata accompanying a set of exported buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldNode {
    pub length: usize,
    pub null_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::physical_type::{PhysicalF64, PhysicalI32, PhysicalI64};
    use crate::buffer::buffer_manager::NopBufferManager;

    #[test]
    fn typed_slice_access() {
        let mut buf =
            ScalarBuffer::try_with_capacity(&NopBufferManager, PhysicalType::Int32, 3).unwrap();
        buf.try_as_slice_mut::<PhysicalI32>()
            .unwrap()
            .copy_from_slice(&[4, 5, 6]);

        assert_eq!(&[4, 5, 6], buf.try_as_slice::<PhysicalI32>().unwrap());
        assert_eq!(Some(ScalarValue::Int32(5)), buf.scalar_value(1));
        assert_eq!(None, buf.scalar_value(3));
    }

    #[test]
    fn typed_slice_wrong_type() {
        let buf =
            ScalarBuffer::try_with_capacity(&NopBufferManager, PhysicalType::Int32, 3).unwrap();
        let err = buf.try_as_slice::<PhysicalI64>().unwrap_err();
        assert_eq!(colview_error::ErrorKind::SchemaMismatch, err.kind());
    }

    #[test]
    fn copy_between_buffers() {
        let src = ScalarBuffer::try_from_slice::<PhysicalF64>(&NopBufferManager, &[1.0, 2.0, 3.0])
            .unwrap();
        let mut dest =
            ScalarBuffer::try_with_capacity(&NopBufferManager, PhysicalType::Float64, 4).unwrap();

        dest.copy_from(2, &src, 1, 2).unwrap();
        assert_eq!(&[0.0, 0.0, 2.0, 3.0], dest.try_as_slice::<PhysicalF64>().unwrap());
    }

    #[test]
    fn copy_out_of_bounds() {
        let src = ScalarBuffer::try_from_slice::<PhysicalI32>(&NopBufferManager, &[1, 2]).unwrap();
        let mut dest =
            ScalarBuffer::try_with_capacity(&NopBufferManager, PhysicalType::Int32, 1).unwrap();
        dest.copy_from(0, &src, 0, 2).unwrap_err();
    }

    #[test]
    fn view_to_owned() {
        let buf = ScalarBuffer::try_from_slice::<PhysicalI32>(&NopBufferManager, &[9, 8]).unwrap();
        let view = BufferView {
            kind: FieldBufferKind::Values,
            physical_type: buf.physical_type(),
            bytes: buf.as_bytes(),
        };
        assert_eq!(2, view.len());

        let owned = view.try_to_owned(&NopBufferManager).unwrap();
        assert_eq!(&[9, 8], owned.try_as_slice::<PhysicalI32>().unwrap());
    }
}
