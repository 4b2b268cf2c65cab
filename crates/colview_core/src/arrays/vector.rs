use colview_error::{Result, VectorError};

use super::datatype::{DataType, Field};
use super::flat::FlatVector;
use super::hash::VectorHasher;
use super::list_view::{LargeListViewVector, ListViewVector};
use super::scalar::ScalarValue;
use super::scalar_buffer::BufferView;
use super::transfer::Transferable;
use super::visitor::VectorVisitor;
use crate::buffer::buffer_manager::{BufferManager, NopBufferManager, Reservation};

/// Any kind of vector.
#[derive(Debug)]
pub enum Vector<B: BufferManager = NopBufferManager> {
    Flat(FlatVector<B>),
    ListView(ListViewVector<B>),
    LargeListView(LargeListViewVector<B>),
}

/// Run an expression against the inner vector regardless of kind.
macro_rules! dispatch {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            Vector::Flat($v) => $body,
            Vector::ListView($v) => $body,
            Vector::LargeListView($v) => $body,
        }
    };
}

impl<B> Vector<B>
where
    B: BufferManager,
{
    /// Create an unallocated vector of the kind matching the field's type.
    pub fn try_new(field: Field, manager: &B) -> Result<Self> {
        Ok(match field.datatype {
            DataType::ListView(_) => {
                Vector::ListView(ListViewVector::<B>::try_new(field, manager)?)
            }
            DataType::LargeListView(_) => {
                Vector::LargeListView(LargeListViewVector::<B>::try_new(field, manager)?)
            }
            _ => Vector::Flat(FlatVector::try_new(field, manager)?),
        })
    }

    pub fn field(&self) -> &Field {
        dispatch!(self, v => v.field())
    }

    pub fn datatype(&self) -> &DataType {
        dispatch!(self, v => v.datatype())
    }

    pub fn value_count(&self) -> usize {
        dispatch!(self, v => v.value_count())
    }

    pub fn null_count(&self) -> usize {
        dispatch!(self, v => v.null_count())
    }

    pub fn is_null(&self, idx: usize) -> Result<bool> {
        dispatch!(self, v => v.is_null(idx))
    }

    pub fn get_object(&self, idx: usize) -> Result<ScalarValue> {
        dispatch!(self, v => v.get_object(idx))
    }

    pub fn hash<H>(&self, idx: usize, hasher: &H) -> Result<u64>
    where
        H: VectorHasher + ?Sized,
    {
        dispatch!(self, v => v.hash(idx, hasher))
    }

    pub fn size_bytes(&self) -> usize {
        dispatch!(self, v => v.size_bytes())
    }

    /// Buffer views in the export order for this kind of vector.
    pub fn field_buffers(&self) -> Vec<BufferView<'_>> {
        dispatch!(self, v => v.field_buffers().to_vec())
    }

    pub fn accept<V>(&self, visitor: &mut V, ctx: V::Context) -> Result<V::Output>
    where
        V: VectorVisitor<B>,
    {
        dispatch!(self, v => v.accept(visitor, ctx))
    }

    /// Move this vector's buffers into a new vector owned by `manager`.
    ///
    /// Leaves this vector empty.
    pub fn transfer_to(&mut self, manager: &B) -> Result<Vector<B>> {
        let reservations = self.reserve_transfer(manager)?;
        self.complete_transfer(manager, reservations)
    }

    /// Reserve room in `manager` for all of this vector's buffers without
    /// moving anything.
    pub(crate) fn reserve_transfer(&self, manager: &B) -> Result<VectorReservations<B>> {
        Ok(match self {
            Vector::Flat(v) => VectorReservations::Flat(v.reserve_transfer(manager)?),
            Vector::ListView(v) => VectorReservations::ListView(v.reserve_transfer(manager)?),
            Vector::LargeListView(v) => {
                VectorReservations::LargeListView(v.reserve_transfer(manager)?)
            }
        })
    }

    /// Move buffers into a new vector owned by `manager` using reservations
    /// from `reserve_transfer`.
    pub(crate) fn complete_transfer(
        &mut self,
        manager: &B,
        reservations: VectorReservations<B>,
    ) -> Result<Vector<B>> {
        Ok(match (self, reservations) {
            (Vector::Flat(v), VectorReservations::Flat(res)) => {
                Vector::Flat(complete(v, manager, res))
            }
            (Vector::ListView(v), VectorReservations::ListView(res)) => {
                Vector::ListView(complete(v, manager, res))
            }
            (Vector::LargeListView(v), VectorReservations::LargeListView(res)) => {
                Vector::LargeListView(complete(v, manager, res))
            }
            _ => return Err(VectorError::new("Reservations do not match vector kind")),
        })
    }
}

/// Target reservations for moving one vector.
#[derive(Debug)]
pub(crate) enum VectorReservations<B: BufferManager> {
    Flat([Reservation<B>; 2]),
    ListView([Reservation<B>; 4]),
    LargeListView([Reservation<B>; 4]),
}

fn complete<V>(source: &mut V, manager: &V::Manager, reservations: V::Reservations) -> V
where
    V: Transferable,
{
    let mut target = source.empty_like(manager);
    source.complete_transfer(&mut target, reservations);
    target
}

impl<B> From<FlatVector<B>> for Vector<B>
where
    B: BufferManager,
{
    fn from(value: FlatVector<B>) -> Self {
        Vector::Flat(value)
    }
}

impl<B> From<ListViewVector<B>> for Vector<B>
where
    B: BufferManager,
{
    fn from(value: ListViewVector<B>) -> Self {
        Vector::ListView(value)
    }
}

impl<B> From<LargeListViewVector<B>> for Vector<B>
where
    B: BufferManager,
{
    fn from(value: LargeListViewVector<B>) -> Self {
        Vector::LargeListView(value)
    }
}
