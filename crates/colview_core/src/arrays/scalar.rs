use std::fmt;

use colview_error::{Result, VectorError};
use half::f16;

use super::physical_type::PhysicalType;

/// A single materialized value pulled out of a vector.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float16(f16),
    Float32(f32),
    Float64(f64),
    /// Elements of a single list row.
    List(Vec<ScalarValue>),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Physical type of a non-null primitive value.
    pub fn physical_type(&self) -> Option<PhysicalType> {
        Some(match self {
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
            Self::Null | Self::List(_) => return None,
        })
    }

    pub fn try_as_i64(&self) -> Result<i64> {
        Ok(match self {
            Self::Int8(v) => *v as i64,
            Self::Int16(v) => *v as i64,
            Self::Int32(v) => *v as i64,
            Self::Int64(v) => *v,
            Self::UInt8(v) => *v as i64,
            Self::UInt16(v) => *v as i64,
            Self::UInt32(v) => *v as i64,
            Self::UInt64(v) => i64::try_from(*v).map_err(|_| {
                VectorError::new("UInt64 value too large for i64").with_field("value", v)
            })?,
            other => return Err(VectorError::new(format!("Not an integer: {other}"))),
        })
    }

    pub fn try_as_usize(&self) -> Result<usize> {
        let v = self.try_as_i64()?;
        usize::try_from(v)
            .map_err(|_| VectorError::new("Value cannot be negative").with_field("value", v))
    }

    pub fn try_as_list(&self) -> Result<&[ScalarValue]> {
        match self {
            Self::List(vals) => Ok(vals),
            other => Err(VectorError::new(format!("Not a list: {other}"))),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt8(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float16(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::List(vals) => {
                write!(f, "[")?;
                for (idx, v) in vals.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! impl_from_primitive {
    ($prim:ty, $variant:ident) => {
        impl From<$prim> for ScalarValue {
            fn from(value: $prim) -> Self {
                ScalarValue::$variant(value)
            }
        }
    };
}

impl_from_primitive!(i8, Int8);
impl_from_primitive!(i16, Int16);
impl_from_primitive!(i32, Int32);
impl_from_primitive!(i64, Int64);
impl_from_primitive!(u8, UInt8);
impl_from_primitive!(u16, UInt16);
impl_from_primitive!(u32, UInt32);
impl_from_primitive!(u64, UInt64);
impl_from_primitive!(f16, Float16);
impl_from_primitive!(f32, Float32);
impl_from_primitive!(f64, Float64);

impl From<usize> for ScalarValue {
    fn from(value: usize) -> Self {
        ScalarValue::UInt64(value as u64)
    }
}

impl<T> From<Vec<T>> for ScalarValue
where
    T: Into<ScalarValue>,
{
    fn from(value: Vec<T>) -> Self {
        ScalarValue::List(value.into_iter().map(Into::into).collect())
    }
}
