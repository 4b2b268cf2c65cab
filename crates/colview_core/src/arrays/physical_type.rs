use std::fmt::{self, Debug};

use colview_error::{Result, VectorError};
use half::f16;

use super::hash::HashValue;
use super::scalar::ScalarValue;
use super::scalar_buffer::ScalarBuffer;
use crate::buffer::buffer_manager::BufferManager;
use crate::buffer::typed::{PlainData, TypedBuffer};

/// Physical layout of values in a scalar buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
}

impl PhysicalType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::UInt8 => "UInt8",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Float16 => "Float16",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
        }
    }

    /// Size in bytes of a single value.
    pub const fn width(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed access to a scalar buffer of a particular physical type.
pub trait PhysicalStorage: Debug + Default + Sync + Send + Clone + Copy + 'static {
    /// The physical type for this storage.
    const PHYSICAL_TYPE: PhysicalType;

    /// Type of a single value.
    type StorageType: PlainData + HashValue + PartialEq + Into<ScalarValue>;

    fn get_buffer<B>(buffer: &ScalarBuffer<B>) -> Option<&TypedBuffer<Self::StorageType, B>>
    where
        B: BufferManager;

    fn get_buffer_mut<B>(
        buffer: &mut ScalarBuffer<B>,
    ) -> Option<&mut TypedBuffer<Self::StorageType, B>>
    where
        B: BufferManager;

    fn into_scalar_buffer<B>(buffer: TypedBuffer<Self::StorageType, B>) -> ScalarBuffer<B>
    where
        B: BufferManager;

    /// Unwrap an owned scalar buffer into its typed buffer.
    fn try_from_scalar_buffer<B>(
        buffer: ScalarBuffer<B>,
    ) -> Result<TypedBuffer<Self::StorageType, B>>
    where
        B: BufferManager;
}

macro_rules! generate_primitive {
    ($prim:ty, $name:ident, $variant:ident) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl PhysicalStorage for $name {
            const PHYSICAL_TYPE: PhysicalType = PhysicalType::$variant;

            type StorageType = $prim;

            fn get_buffer<B>(
                buffer: &ScalarBuffer<B>,
            ) -> Option<&TypedBuffer<Self::StorageType, B>>
            where
                B: BufferManager,
            {
                match buffer {
                    ScalarBuffer::$variant(buf) => Some(buf),
                    _ => None,
                }
            }

            fn get_buffer_mut<B>(
                buffer: &mut ScalarBuffer<B>,
            ) -> Option<&mut TypedBuffer<Self::StorageType, B>>
            where
                B: BufferManager,
            {
                match buffer {
                    ScalarBuffer::$variant(buf) => Some(buf),
                    _ => None,
                }
            }

            fn into_scalar_buffer<B>(buffer: TypedBuffer<Self::StorageType, B>) -> ScalarBuffer<B>
            where
                B: BufferManager,
            {
                ScalarBuffer::$variant(buffer)
            }

            fn try_from_scalar_buffer<B>(
                buffer: ScalarBuffer<B>,
            ) -> Result<TypedBuffer<Self::StorageType, B>>
            where
                B: BufferManager,
            {
                match buffer {
                    ScalarBuffer::$variant(buf) => Ok(buf),
                    other => Err(VectorError::schema_mismatch("Physical types don't match")
                        .with_field("have", other.physical_type())
                        .with_field("want", Self::PHYSICAL_TYPE)),
                }
            }
        }
    };
}

generate_primitive!(i8, PhysicalI8, Int8);
generate_primitive!(i16, PhysicalI16, Int16);
generate_primitive!(i32, PhysicalI32, Int32);
generate_primitive!(i64, PhysicalI64, Int64);

generate_primitive!(u8, PhysicalU8, UInt8);
generate_primitive!(u16, PhysicalU16, UInt16);
generate_primitive!(u32, PhysicalU32, UInt32);
generate_primitive!(u64, PhysicalU64, UInt64);

generate_primitive!(f16, PhysicalF16, Float16);
generate_primitive!(f32, PhysicalF32, Float32);
generate_primitive!(f64, PhysicalF64, Float64);

/// Integer type used for list view offsets and sizes.
///
/// `i32` for the standard variant, `i64` for the large variant.
pub trait OffsetIndex: PlainData + PartialOrd + fmt::Display {
    type Storage: PhysicalStorage<StorageType = Self>;

    const ZERO: Self;

    /// If this is the 64-bit "large" variant.
    const IS_LARGE: bool;

    /// Convert to a usize.
    ///
    /// Callers must ensure the value isn't negative.
    fn as_usize(self) -> usize;

    fn try_from_usize(v: usize) -> Result<Self>;

    fn is_negative(self) -> bool {
        self < Self::ZERO
    }
}

impl OffsetIndex for i32 {
    type Storage = PhysicalI32;

    const ZERO: Self = 0;
    const IS_LARGE: bool = false;

    fn as_usize(self) -> usize {
        debug_assert!(self >= 0);
        self as usize
    }

    fn try_from_usize(v: usize) -> Result<Self> {
        i32::try_from(v).map_err(|_| {
            VectorError::new("Value exceeds maximum 32-bit list view offset")
                .with_field("value", v)
        })
    }
}

impl OffsetIndex for i64 {
    type Storage = PhysicalI64;

    const ZERO: Self = 0;
    const IS_LARGE: bool = true;

    fn as_usize(self) -> usize {
        debug_assert!(self >= 0);
        self as usize
    }

    fn try_from_usize(v: usize) -> Result<Self> {
        i64::try_from(v).map_err(|_| {
            VectorError::new("Value exceeds maximum 64-bit list view offset")
                .with_field("value", v)
        })
    }
}
