//! Test utilities.
//!
//! Note this this isn't behind a `#[cfg(test)]` flag since this should be
//! usable outside of this crate.
//!
//! Should not be used outside of tests.

use crate::arrays::batch::Batch;
use crate::arrays::vector::Vector;
use crate::buffer::buffer_manager::BufferManager;

/// Asserts that two vectors are logically equal.
///
/// Vectors owned by different buffer managers can be compared.
pub fn assert_vectors_eq<B1, B2>(a: &Vector<B1>, b: &Vector<B2>)
where
    B1: BufferManager,
    B2: BufferManager,
{
    assert_eq!(a.datatype(), b.datatype(), "data types differ");
    assert_eq!(a.value_count(), b.value_count(), "value counts differ");

    for row_idx in 0..a.value_count() {
        let a_val = a.get_object(row_idx).unwrap();
        let b_val = b.get_object(row_idx).unwrap();

        assert_eq!(a_val, b_val, "row {row_idx} differs");
    }
}

/// Asserts that two batches are logically equal.
pub fn assert_batches_eq<B1, B2>(a: &Batch<B1>, b: &Batch<B2>)
where
    B1: BufferManager,
    B2: BufferManager,
{
    assert_eq!(a.num_rows(), b.num_rows(), "num rows differ");
    assert_eq!(a.num_columns(), b.num_columns(), "num columns differ");

    for col_idx in 0..a.num_columns() {
        let a_col = a.column(col_idx).unwrap();
        let b_col = b.column(col_idx).unwrap();

        assert_vectors_eq(a_col, b_col);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::flat::FlatVector;
    use crate::arrays::list_view::ListViewVector;
    use crate::arrays::physical_type::{PhysicalI32, PhysicalI64};
    use crate::buffer::buffer_manager::{NopBufferManager, TrackedBufferManager};

    #[test]
    fn vectors_eq() {
        let a: Vector = ListViewVector::try_from_rows::<PhysicalI32>(
            "a",
            &NopBufferManager,
            &[Some(&[1, 2][..]), None],
        )
        .unwrap()
        .into();
        let b: Vector<TrackedBufferManager> =
            ListViewVector::<TrackedBufferManager>::try_from_rows::<PhysicalI32>(
                "a",
                &TrackedBufferManager::new(),
                &[Some(&[1, 2][..]), None],
            )
            .unwrap()
            .into();

        assert_vectors_eq(&a, &b);
    }

    #[test]
    fn batches_eq() {
        let col = || -> Vector {
            FlatVector::try_from_values::<PhysicalI64>("a", &NopBufferManager, &[Some(4), None])
                .unwrap()
                .into()
        };
        let a = Batch::try_new([col()]).unwrap();
        let b = Batch::try_new([col()]).unwrap();

        assert_batches_eq(&a, &b);
    }

    #[test]
    #[should_panic]
    fn vectors_not_eq() {
        let a: Vector =
            FlatVector::try_from_values::<PhysicalI32>("a", &NopBufferManager, &[Some(1)])
                .unwrap()
                .into();
        let b: Vector =
            FlatVector::try_from_values::<PhysicalI64>("a", &NopBufferManager, &[Some(1)])
                .unwrap()
                .into();

        assert_vectors_eq(&a, &b);
    }
}
