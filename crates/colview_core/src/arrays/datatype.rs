use std::fmt;

use colview_error::{Result, VectorError, not_implemented};

use super::physical_type::PhysicalType;

/// Metadata associated with list views.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListTypeMeta {
    pub datatype: Box<DataType>,
}

impl ListTypeMeta {
    pub fn new(child: DataType) -> Self {
        ListTypeMeta {
            datatype: Box::new(child),
        }
    }
}

/// Supported data types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
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
    /// Variable length lists with 32-bit offsets and sizes.
    ListView(ListTypeMeta),
    /// Variable length lists with 64-bit offsets and sizes.
    LargeListView(ListTypeMeta),
}

impl DataType {
    pub fn list_view(child: DataType) -> Self {
        DataType::ListView(ListTypeMeta::new(child))
    }

    pub fn large_list_view(child: DataType) -> Self {
        DataType::LargeListView(ListTypeMeta::new(child))
    }

    /// Physical type backing a primitive data type.
    ///
    /// Errors for list types since they span multiple buffers.
    pub fn try_physical_type(&self) -> Result<PhysicalType> {
        Ok(match self {
            Self::Int8 => PhysicalType::Int8,
            Self::Int16 => PhysicalType::Int16,
            Self::Int32 => PhysicalType::Int32,
            Self::Int64 => PhysicalType::Int64,
            Self::UInt8 => PhysicalType::UInt8,
            Self::UInt16 => PhysicalType::UInt16,
            Self::UInt32 => PhysicalType::UInt32,
            Self::UInt64 => PhysicalType::UInt64,
            Self::Float16 => PhysicalType::Float16,
            Self::Float32 => PhysicalType::Float32,
            Self::Float64 => PhysicalType::Float64,
            other => {
                return Err(VectorError::schema_mismatch(
                    "Data type has no single physical type",
                )
                .with_field("datatype", other));
            }
        })
    }

    pub const fn is_list_view(&self) -> bool {
        matches!(self, Self::ListView(_) | Self::LargeListView(_))
    }

    /// Get the list metadata if this is a list view type.
    pub fn try_get_list_type_meta(&self) -> Result<&ListTypeMeta> {
        match self {
            Self::ListView(meta) | Self::LargeListView(meta) => Ok(meta),
            other => Err(VectorError::schema_mismatch("Expected list view type")
                .with_field("datatype", other)),
        }
    }

    /// Physical type of the child values of a list view type.
    ///
    /// Only primitive children can be stored directly.
    pub fn try_list_child_physical_type(&self) -> Result<PhysicalType> {
        let meta = self.try_get_list_type_meta()?;
        if meta.datatype.is_list_view() {
            not_implemented!("Nested list view children: {}", self);
        }
        meta.datatype.try_physical_type()
    }
}

impl From<PhysicalType> for DataType {
    fn from(value: PhysicalType) -> Self {
        match value {
            PhysicalType::Int8 => Self::Int8,
            PhysicalType::Int16 => Self::Int16,
            PhysicalType::Int32 => Self::Int32,
            PhysicalType::Int64 => Self::Int64,
            PhysicalType::UInt8 => Self::UInt8,
            PhysicalType::UInt16 => Self::UInt16,
            PhysicalType::UInt32 => Self::UInt32,
            PhysicalType::UInt64 => Self::UInt64,
            PhysicalType::Float16 => Self::Float16,
            PhysicalType::Float32 => Self::Float32,
            PhysicalType::Float64 => Self::Float64,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int8 => write!(f, "Int8"),
            Self::Int16 => write!(f, "Int16"),
            Self::Int32 => write!(f, "Int32"),
            Self::Int64 => write!(f, "Int64"),
            Self::UInt8 => write!(f, "UInt8"),
            Self::UInt16 => write!(f, "UInt16"),
            Self::UInt32 => write!(f, "UInt32"),
            Self::UInt64 => write!(f, "UInt64"),
            Self::Float16 => write!(f, "Float16"),
            Self::Float32 => write!(f, "Float32"),
            Self::Float64 => write!(f, "Float64"),
            Self::ListView(meta) => write!(f, "ListView[{}]", meta.datatype),
            Self::LargeListView(meta) => write!(f, "LargeListView[{}]", meta.datatype),
        }
    }
}

/// A named and typed column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, datatype: DataType, nullable: bool) -> Self {
        Field {
            name: name.into(),
            datatype,
            nullable,
        }
    }
}

/// Ordered set of fields describing a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Self {
        Schema {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Schema { fields: Vec::new() }
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Find the index of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Create a new schema containing only the fields at `indices`.
    pub fn project(&self, indices: &[usize]) -> Result<Schema> {
        let fields = indices
            .iter()
            .map(|&idx| {
                self.fields
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| VectorError::index_out_of_range(idx, self.fields.len()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_list_view() {
        let dt = DataType::large_list_view(DataType::Float32);
        assert_eq!("LargeListView[Float32]", dt.to_string());
    }

    #[test]
    fn child_physical_type() {
        let dt = DataType::list_view(DataType::Int16);
        assert_eq!(PhysicalType::Int16, dt.try_list_child_physical_type().unwrap());

        let nested = DataType::list_view(DataType::list_view(DataType::Int16));
        let err = nested.try_list_child_physical_type().unwrap_err();
        assert_eq!(colview_error::ErrorKind::NotImplemented, err.kind());

        DataType::Int8.try_list_child_physical_type().unwrap_err();
    }

    #[test]
    fn project_schema() {
        let schema = Schema::new([
            Field::new("a", DataType::Int32, true),
            Field::new("b", DataType::list_view(DataType::Int32), true),
        ]);
        let projected = schema.project(&[1]).unwrap();
        assert_eq!(vec![schema.fields[1].clone()], projected.fields);
        assert_eq!(Some(1), schema.field_index("b"));

        let err = schema.project(&[2]).unwrap_err();
        assert_eq!(colview_error::ErrorKind::IndexOutOfRange, err.kind());
    }
}
