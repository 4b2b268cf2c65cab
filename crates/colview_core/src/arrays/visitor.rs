use colview_error::Result;

use super::datatype::DataType;
use super::flat::FlatVector;
use super::list_view::GenericListViewVector;
use super::physical_type::OffsetIndex;
use super::scalar::ScalarValue;
use super::vector::Vector;
use crate::buffer::buffer_manager::BufferManager;

/// Algorithm that can run over any kind of vector.
///
/// Vectors dispatch to the matching method through their `accept` method.
pub trait VectorVisitor<B: BufferManager> {
    /// Extra input passed through `accept`.
    type Context;
    type Output;

    fn visit_flat(&mut self, vector: &FlatVector<B>, ctx: Self::Context) -> Result<Self::Output>;

    fn visit_list_view<O>(
        &mut self,
        vector: &GenericListViewVector<O, B>,
        ctx: Self::Context,
    ) -> Result<Self::Output>
    where
        O: OffsetIndex;
}

/// Checks if the visited vector is logically equal to `right`.
///
/// Vectors are equal if they have the same data type, the same number of rows,
/// and each row materializes to the same value.
#[derive(Debug)]
pub struct VectorEqualsVisitor<'a, R: BufferManager> {
    right: &'a Vector<R>,
}

impl<'a, R> VectorEqualsVisitor<'a, R>
where
    R: BufferManager,
{
    pub fn new(right: &'a Vector<R>) -> Self {
        VectorEqualsVisitor { right }
    }

    fn rows_equal(
        &self,
        left_type: &DataType,
        left_count: usize,
        get_left: impl Fn(usize) -> Result<ScalarValue>,
    ) -> Result<bool> {
        if left_type != self.right.datatype() || left_count != self.right.value_count() {
            return Ok(false);
        }
        for idx in 0..left_count {
            if get_left(idx)? != self.right.get_object(idx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<B, R> VectorVisitor<B> for VectorEqualsVisitor<'_, R>
where
    B: BufferManager,
    R: BufferManager,
{
    type Context = ();
    type Output = bool;

    fn visit_flat(&mut self, vector: &FlatVector<B>, _ctx: ()) -> Result<bool> {
        self.rows_equal(vector.datatype(), vector.value_count(), |idx| {
            vector.get_object(idx)
        })
    }

    fn visit_list_view<O>(
        &mut self,
        vector: &GenericListViewVector<O, B>,
        _ctx: (),
    ) -> Result<bool>
    where
        O: OffsetIndex,
    {
        self.rows_equal(vector.datatype(), vector.value_count(), |idx| {
            vector.get_object(idx)
        })
    }
}

/// Counts null rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCountVisitor;

impl<B> VectorVisitor<B> for NullCountVisitor
where
    B: BufferManager,
{
    type Context = ();
    type Output = usize;

    fn visit_flat(&mut self, vector: &FlatVector<B>, _ctx: ()) -> Result<usize> {
        Ok(vector.null_count())
    }

    fn visit_list_view<O>(
        &mut self,
        vector: &GenericListViewVector<O, B>,
        _ctx: (),
    ) -> Result<usize>
    where
        O: OffsetIndex,
    {
        Ok(vector.null_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::list_view::{LargeListViewVector, ListViewVector};
    use crate::arrays::physical_type::PhysicalI32;
    use crate::buffer::buffer_manager::{NopBufferManager, TrackedBufferManager};

    fn list_vector<B: BufferManager>(manager: &B) -> Vector<B> {
        Vector::ListView(
            ListViewVector::<B>::try_from_rows::<PhysicalI32>(
                "a",
                manager,
                &[Some(&[1, 2][..]), None, Some(&[][..])],
            )
            .unwrap(),
        )
    }

    #[test]
    fn equal_across_managers() {
        let left = list_vector(&NopBufferManager);
        let right = list_vector(&TrackedBufferManager::new());

        let mut visitor = VectorEqualsVisitor::new(&right);
        assert!(left.accept(&mut visitor, ()).unwrap());
    }

    #[test]
    fn not_equal_different_variant() {
        let left = list_vector(&NopBufferManager);
        let right = Vector::LargeListView(
            LargeListViewVector::try_from_rows::<PhysicalI32>(
                "a",
                &NopBufferManager,
                &[Some(&[1, 2][..]), None, Some(&[][..])],
            )
            .unwrap(),
        );

        let mut visitor = VectorEqualsVisitor::new(&right);
        assert!(!left.accept(&mut visitor, ()).unwrap());
    }

    #[test]
    fn not_equal_different_rows() {
        let left = list_vector(&NopBufferManager);
        let right = Vector::ListView(
            ListViewVector::try_from_rows::<PhysicalI32>(
                "a",
                &NopBufferManager,
                &[Some(&[1, 2][..]), None, None],
            )
            .unwrap(),
        );

        let mut visitor = VectorEqualsVisitor::new(&right);
        assert!(!left.accept(&mut visitor, ()).unwrap());
    }

    #[test]
    fn null_count() {
        let left = list_vector(&NopBufferManager);
        assert_eq!(1, left.accept(&mut NullCountVisitor, ()).unwrap());

        let flat = Vector::Flat(
            FlatVector::try_from_values::<PhysicalI32>(
                "b",
                &NopBufferManager,
                &[None, None, Some(1)],
            )
            .unwrap(),
        );
        assert_eq!(2, flat.accept(&mut NullCountVisitor, ()).unwrap());
    }
}
