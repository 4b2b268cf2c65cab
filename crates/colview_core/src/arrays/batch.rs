use colview_error::{Result, VectorError};
use tracing::trace;

use super::datatype::Schema;
use super::vector::Vector;
use crate::buffer::buffer_manager::{BufferManager, NopBufferManager};

/// A batch of same-length vectors.
#[derive(Debug)]
pub struct Batch<B: BufferManager = NopBufferManager> {
    /// Columns that make up this batch.
    columns: Vec<Vector<B>>,
    /// Number of rows in this batch. Needed to allow for a batch that has no
    /// columns but a non-zero number of rows.
    num_rows: usize,
}

impl<B> Batch<B>
where
    B: BufferManager,
{
    pub const fn empty() -> Self {
        Batch {
            columns: Vec::new(),
            num_rows: 0,
        }
    }

    pub fn empty_with_num_rows(num_rows: usize) -> Self {
        Batch {
            columns: Vec::new(),
            num_rows,
        }
    }

    /// Create a new batch from some number of vectors.
    ///
    /// All vectors must have the same number of rows.
    pub fn try_new(columns: impl IntoIterator<Item = Vector<B>>) -> Result<Self> {
        let columns: Vec<_> = columns.into_iter().collect();
        let num_rows = match columns.first() {
            Some(col) => col.value_count(),
            None => return Ok(Self::empty()),
        };

        for (idx, col) in columns.iter().enumerate() {
            if col.value_count() != num_rows {
                return Err(VectorError::schema_mismatch("Column lengths differ")
                    .with_field("expected", num_rows)
                    .with_field("got", col.value_count())
                    .with_field("column", idx));
            }
        }

        Ok(Batch { columns, num_rows })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> Option<&Vector<B>> {
        self.columns.get(idx)
    }

    pub fn columns(&self) -> &[Vector<B>] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Vector<B>> {
        self.columns
    }

    pub fn schema(&self) -> Schema {
        Schema::new(self.columns.iter().map(|c| c.field().clone()))
    }

    /// Keep only the columns at `indices`, in that order.
    ///
    /// Each column can be selected at most once.
    pub fn project(self, indices: &[usize]) -> Result<Self> {
        let num_columns = self.columns.len();
        let mut slots: Vec<Option<Vector<B>>> = self.columns.into_iter().map(Some).collect();

        let columns = indices
            .iter()
            .map(|&idx| {
                let slot = slots
                    .get_mut(idx)
                    .ok_or_else(|| VectorError::index_out_of_range(idx, num_columns))?;
                slot.take().ok_or_else(|| {
                    VectorError::new("Column projected more than once").with_field("column", idx)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Batch {
            columns,
            num_rows: self.num_rows,
        })
    }

    /// Move every column into vectors owned by `manager`.
    ///
    /// Room for every column is reserved in `manager` before any column
    /// moves. On error this batch is left unchanged.
    pub fn transfer_to(&mut self, manager: &B) -> Result<Batch<B>> {
        let reservations = self
            .columns
            .iter()
            .map(|col| col.reserve_transfer(manager))
            .collect::<Result<Vec<_>>>()?;

        let columns = self
            .columns
            .iter_mut()
            .zip(reservations)
            .map(|(col, res)| col.complete_transfer(manager, res))
            .collect::<Result<Vec<_>>>()?;

        let num_rows = self.num_rows;
        self.num_rows = 0;

        trace!(num_rows, num_columns = columns.len(), "transferred batch");

        Ok(Batch { columns, num_rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::arrays::flat::FlatVector;
    use crate::arrays::list_view::ListViewVector;
    use crate::arrays::physical_type::PhysicalI32;
    use crate::arrays::scalar::ScalarValue;
    use crate::buffer::buffer_manager::TrackedBufferManager;

    fn int_col(name: &str, vals: &[Option<i32>]) -> Vector {
        FlatVector::try_from_values::<PhysicalI32>(name, &NopBufferManager, vals)
            .unwrap()
            .into()
    }

    #[test]
    fn mismatched_lengths() {
        let err = Batch::try_new([int_col("a", &[Some(1)]), int_col("b", &[None, None])])
            .unwrap_err();
        assert_eq!(colview_error::ErrorKind::SchemaMismatch, err.kind());
    }

    #[test]
    fn schema_from_columns() {
        let list: Vector = ListViewVector::try_from_rows::<PhysicalI32>(
            "l",
            &NopBufferManager,
            &[Some(&[1][..])],
        )
        .unwrap()
        .into();
        let batch = Batch::try_new([int_col("a", &[Some(1)]), list]).unwrap();

        let schema = batch.schema();
        assert_eq!(2, schema.num_fields());
        assert_eq!(DataType::list_view(DataType::Int32), schema.fields[1].datatype);
    }

    #[test]
    fn project_reorders() {
        let batch = Batch::try_new([
            int_col("a", &[Some(1)]),
            int_col("b", &[Some(2)]),
            int_col("c", &[Some(3)]),
        ])
        .unwrap();

        let projected = batch.project(&[2, 0]).unwrap();
        assert_eq!(2, projected.num_columns());
        assert_eq!("c", projected.column(0).unwrap().field().name);
        assert_eq!(
            ScalarValue::Int32(1),
            projected.column(1).unwrap().get_object(0).unwrap()
        );
    }

    #[test]
    fn project_twice_errors() {
        let batch = Batch::try_new([int_col("a", &[Some(1)])]).unwrap();
        batch.project(&[0, 0]).unwrap_err();
    }

    #[test]
    fn transfer_batch_over_limit_keeps_columns() {
        let from = TrackedBufferManager::new();
        let cols: Vec<Vector<TrackedBufferManager>> = (0..2)
            .map(|_| {
                FlatVector::<TrackedBufferManager>::try_from_values::<PhysicalI32>(
                    "a",
                    &from,
                    &[Some(1), Some(2)],
                )
                .unwrap()
                .into()
            })
            .collect();
        let first_bytes = cols[0].size_bytes();
        let mut batch = Batch::try_new(cols).unwrap();
        let from_bytes = from.allocated_bytes();

        // Room for the first column only.
        let to = TrackedBufferManager::with_limit(first_bytes);
        let err = batch.transfer_to(&to).unwrap_err();
        assert_eq!(colview_error::ErrorKind::Allocation, err.kind());

        assert_eq!(2, batch.num_rows());
        assert_eq!(2, batch.num_columns());
        for col in batch.columns() {
            assert_eq!(ScalarValue::Int32(2), col.get_object(1).unwrap());
        }
        assert_eq!(from_bytes, from.allocated_bytes());
        assert_eq!(0, to.allocated_bytes());
    }

    #[test]
    fn transfer_batch() {
        let from = TrackedBufferManager::new();
        let to = TrackedBufferManager::new();
        let col: Vector<TrackedBufferManager> =
            FlatVector::try_from_values::<PhysicalI32>("a", &from, &[Some(1), None])
                .unwrap()
                .into();
        let mut batch = Batch::try_new([col]).unwrap();

        let moved = batch.transfer_to(&to).unwrap();
        assert_eq!(2, moved.num_rows());
        assert_eq!(0, batch.num_rows());
        assert_eq!(0, from.allocated_bytes());
        assert!(to.allocated_bytes() > 0);
    }
}
