use colview_error::{Result, ResultExt, VectorError};
use tracing::trace;

use super::bitmap::{Bitmap, num_bytes_for_bits};
use super::datatype::{DataType, Field};
use super::hash::{DefaultHasher, NULL_HASH, VectorHasher};
use super::next_capacity;
use super::physical_type::{PhysicalStorage, PhysicalType, PhysicalU8};
use super::scalar::ScalarValue;
use super::scalar_buffer::{BufferView, FLAT_BUFFER_ORDER, FieldBufferKind, FieldNode, ScalarBuffer};
use super::transfer::{TransferPair, Transferable};
use super::visitor::VectorVisitor;
use crate::buffer::buffer_manager::{BufferManager, NopBufferManager, Reservation};
use crate::config::VectorConfig;

/// A nullable column of primitive values.
#[derive(Debug)]
pub struct FlatVector<B: BufferManager = NopBufferManager> {
    field: Field,
    manager: B,
    config: VectorConfig,
    validity: Bitmap<B>,
    values: ScalarBuffer<B>,
    value_count: usize,
    last_set: Option<usize>,
}

impl<B> FlatVector<B>
where
    B: BufferManager,
{
    /// Create a new unallocated vector for a primitive field.
    pub fn try_new(field: Field, manager: &B) -> Result<Self> {
        let physical_type = field.datatype.try_physical_type()?;
        Ok(Self::new_unallocated(
            field,
            physical_type,
            manager,
            VectorConfig::default(),
        ))
    }

    /// Build a vector from optional values, `None` being a null row.
    pub fn try_from_values<S>(
        name: impl Into<String>,
        manager: &B,
        values: &[Option<S::StorageType>],
    ) -> Result<Self>
    where
        S: PhysicalStorage,
    {
        let field = Field::new(name, DataType::from(S::PHYSICAL_TYPE), true);
        let mut vector = Self::try_new(field, manager)?;
        vector.allocate_new_with_capacity(values.len())?;

        for (idx, value) in values.iter().enumerate() {
            match value {
                Some(v) => vector.set_value::<S>(idx, *v)?,
                None => vector.set_null(idx)?,
            }
        }
        vector.set_value_count(values.len())?;

        Ok(vector)
    }

    fn new_unallocated(
        field: Field,
        physical_type: PhysicalType,
        manager: &B,
        config: VectorConfig,
    ) -> Self {
        FlatVector {
            field,
            manager: manager.clone(),
            config,
            validity: Bitmap::empty(manager),
            values: ScalarBuffer::empty(manager, physical_type),
            value_count: 0,
            last_set: None,
        }
    }

    pub fn with_config(mut self, config: VectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn datatype(&self) -> &DataType {
        &self.field.datatype
    }

    pub fn manager(&self) -> &B {
        &self.manager
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.values.physical_type()
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn last_set(&self) -> Option<usize> {
        self.last_set
    }

    pub fn value_capacity(&self) -> usize {
        self.validity.len().min(self.values.capacity())
    }

    pub fn values(&self) -> &ScalarBuffer<B> {
        &self.values
    }

    pub fn allocate_new(&mut self) -> Result<()> {
        self.allocate_new_with_capacity(self.config.initial_value_allocation)
    }

    /// Allocate buffers for `rows` rows, discarding any existing content.
    pub fn allocate_new_with_capacity(&mut self, rows: usize) -> Result<()> {
        let validity = Bitmap::try_new_all_false(&self.manager, rows)?;
        let values = ScalarBuffer::try_with_capacity(&self.manager, self.physical_type(), rows)?;

        self.validity = validity;
        self.values = values;
        self.value_count = 0;
        self.last_set = None;

        Ok(())
    }

    fn ensure_capacity(&mut self, rows: usize) -> Result<()> {
        let curr = self.value_capacity();
        if rows <= curr {
            return Ok(());
        }

        let new_cap = next_capacity(curr, rows, self.config.initial_value_allocation);
        self.validity.resize(new_cap)?;
        if self.values.capacity() < new_cap {
            self.values
                .reserve_additional(new_cap - self.values.capacity())?;
        }

        trace!(from = curr, to = new_cap, "grew flat vector capacity");

        Ok(())
    }

    fn update_last_set(&mut self, idx: usize) {
        self.last_set = Some(self.last_set.map_or(idx, |last| last.max(idx)));
    }

    pub fn set_value<S>(&mut self, idx: usize, value: S::StorageType) -> Result<()>
    where
        S: PhysicalStorage,
    {
        if S::PHYSICAL_TYPE != self.physical_type() {
            return Err(VectorError::schema_mismatch("Value has a different type")
                .with_field("have", self.physical_type())
                .with_field("want", S::PHYSICAL_TYPE));
        }

        let rows = idx
            .checked_add(1)
            .ok_or_else(|| VectorError::index_out_of_range(idx, self.value_capacity()))?;
        self.ensure_capacity(rows)?;
        self.values.try_as_slice_mut::<S>()?[idx] = value;
        self.validity.set_unchecked(idx, true);
        self.update_last_set(idx);

        Ok(())
    }

    pub fn set_null(&mut self, idx: usize) -> Result<()> {
        let rows = idx
            .checked_add(1)
            .ok_or_else(|| VectorError::index_out_of_range(idx, self.value_capacity()))?;
        self.ensure_capacity(rows)?;
        self.validity.set_unchecked(idx, false);
        self.update_last_set(idx);
        Ok(())
    }

    /// Finalize the number of rows, marking unwritten trailing rows null.
    pub fn set_value_count(&mut self, count: usize) -> Result<()> {
        self.ensure_capacity(count)?;

        let first_unset = self.last_set.map_or(0, |idx| idx + 1);
        for idx in first_unset..count {
            self.validity.set_unchecked(idx, false);
        }

        self.value_count = count;
        self.last_set = count.checked_sub(1);

        Ok(())
    }

    pub fn is_null(&self, idx: usize) -> Result<bool> {
        if idx >= self.value_count {
            return Err(VectorError::index_out_of_range(idx, self.value_count));
        }
        Ok(!self.validity.value(idx))
    }

    pub fn get_object(&self, idx: usize) -> Result<ScalarValue> {
        if self.is_null(idx)? {
            return Ok(ScalarValue::Null);
        }
        self.values
            .scalar_value(idx)
            .ok_or_else(|| VectorError::index_out_of_range(idx, self.values.capacity()))
    }

    pub fn null_count(&self) -> usize {
        self.value_count - self.validity.count_trues_prefix(self.value_count)
    }

    pub fn hash_code(&self, idx: usize) -> Result<u64> {
        self.hash(idx, &DefaultHasher)
    }

    pub fn hash<H>(&self, idx: usize, hasher: &H) -> Result<u64>
    where
        H: VectorHasher + ?Sized,
    {
        if self.is_null(idx)? {
            return Ok(NULL_HASH);
        }
        self.values
            .hash_value(idx, hasher)
            .ok_or_else(|| VectorError::index_out_of_range(idx, self.values.capacity()))
    }

    pub fn field_node(&self) -> FieldNode {
        FieldNode {
            length: self.value_count,
            null_count: self.null_count(),
        }
    }

    /// Views over the validity and values buffers, trimmed to the row count.
    pub fn field_buffers(&self) -> [BufferView<'_>; 2] {
        let rows = self.value_count;
        let values_bytes = rows * self.physical_type().width();
        [
            BufferView {
                kind: FieldBufferKind::Validity,
                physical_type: PhysicalType::UInt8,
                bytes: self.validity.bytes_for_prefix(rows),
            },
            BufferView {
                kind: FieldBufferKind::Values,
                physical_type: self.physical_type(),
                bytes: &self.values.as_bytes()[..values_bytes],
            },
        ]
    }

    pub fn into_field_buffers(self) -> (FieldNode, Vec<ScalarBuffer<B>>) {
        let node = self.field_node();
        let buffers = vec![ScalarBuffer::UInt8(self.validity.into_inner()), self.values];
        (node, buffers)
    }

    /// Adopt externally produced validity and values buffers.
    ///
    /// On error the vector is left unchanged.
    pub fn load_field_buffers(
        &mut self,
        node: FieldNode,
        buffers: Vec<ScalarBuffer<B>>,
    ) -> Result<()> {
        let buffers: [ScalarBuffer<B>; 2] = buffers.try_into().map_err(|bufs: Vec<_>| {
            VectorError::schema_mismatch("Unexpected number of flat vector buffers")
                .with_field("expected", FLAT_BUFFER_ORDER.len())
                .with_field("got", bufs.len())
        })?;

        self.validate_field_buffers(node, &buffers)
            .context("Failed to load flat vector buffers")?;

        let [validity, values] = buffers;
        let validity = PhysicalU8::try_from_scalar_buffer(validity)?;
        let bits = validity.capacity() * 8;

        self.validity = Bitmap::try_from_buffer(validity, bits)?;
        self.values = values;
        self.value_count = node.length;
        self.last_set = node.length.checked_sub(1);

        Ok(())
    }

    fn validate_field_buffers(
        &self,
        node: FieldNode,
        buffers: &[ScalarBuffer<B>; 2],
    ) -> Result<()> {
        let expected = [PhysicalType::UInt8, self.physical_type()];
        for ((buffer, want), kind) in buffers.iter().zip(expected).zip(FLAT_BUFFER_ORDER) {
            if buffer.physical_type() != want {
                return Err(
                    VectorError::schema_mismatch("Buffer type does not match declared type")
                        .with_field("buffer", kind)
                        .with_field("have", buffer.physical_type())
                        .with_field("want", want),
                );
            }
        }

        let rows = node.length;
        let validity = buffers[0].try_as_slice::<PhysicalU8>()?;
        if validity.len() < num_bytes_for_bits(rows) || buffers[1].capacity() < rows {
            return Err(VectorError::schema_mismatch("Buffers too small for row count")
                .with_field("rows", rows)
                .with_field("validity_bytes", validity.len())
                .with_field("values", buffers[1].capacity()));
        }

        let null_count = (0..rows)
            .filter(|&idx| (validity[idx >> 3] >> (idx & 7)) & 1 == 0)
            .count();
        if null_count != node.null_count {
            return Err(
                VectorError::schema_mismatch("Null count does not match validity buffer")
                    .with_field("declared", node.null_count)
                    .with_field("actual", null_count),
            );
        }

        Ok(())
    }

    pub fn reset(&mut self) {
        self.validity.reset();
        self.values.reset();
        self.value_count = 0;
        self.last_set = None;
    }

    pub fn clear(&mut self) {
        let physical_type = self.physical_type();
        self.validity = Bitmap::empty(&self.manager);
        self.values = ScalarBuffer::empty(&self.manager, physical_type);
        self.value_count = 0;
        self.last_set = None;
    }

    pub fn size_bytes(&self) -> usize {
        self.validity.size_bytes() + self.values.size_bytes()
    }

    pub fn accept<V>(&self, visitor: &mut V, ctx: V::Context) -> Result<V::Output>
    where
        V: VectorVisitor<B>,
    {
        visitor.visit_flat(self, ctx)
    }

    pub fn transfer_pair(&mut self, manager: &B) -> TransferPair<'_, Self> {
        TransferPair::new(self, manager)
    }

    pub fn make_transfer_pair(&mut self, target: Self) -> Result<TransferPair<'_, Self>> {
        TransferPair::try_with_target(self, target)
    }
}

impl<B> Transferable for FlatVector<B>
where
    B: BufferManager,
{
    type Manager = B;
    type Reservations = [Reservation<B>; 2];

    fn manager(&self) -> &B {
        &self.manager
    }

    fn empty_like(&self, manager: &B) -> Self {
        Self::new_unallocated(
            self.field.clone(),
            self.physical_type(),
            manager,
            self.config,
        )
    }

    fn check_transfer_target(&self, target: &Self) -> Result<()> {
        if self.field.datatype != target.field.datatype {
            return Err(
                VectorError::schema_mismatch("Transfer target has a different type")
                    .with_field("source", &self.field.datatype)
                    .with_field("target", &target.field.datatype),
            );
        }
        Ok(())
    }

    fn reserve_transfer(&self, manager: &B) -> Result<[Reservation<B>; 2]> {
        Ok([
            manager.try_reserve(self.validity.size_bytes())?,
            manager.try_reserve(self.values.size_bytes())?,
        ])
    }

    fn complete_transfer(&mut self, target: &mut Self, reservations: [Reservation<B>; 2]) {
        let [validity_res, values_res] = reservations;

        let physical_type = self.physical_type();
        let mut validity = std::mem::replace(&mut self.validity, Bitmap::empty(&self.manager));
        let mut values = std::mem::replace(
            &mut self.values,
            ScalarBuffer::empty(&self.manager, physical_type),
        );
        std::mem::drop(validity.replace_reservation(validity_res));
        std::mem::drop(values.replace_reservation(values_res));

        target.validity = validity;
        target.values = values;
        target.value_count = self.value_count;
        target.last_set = self.last_set;

        self.value_count = 0;
        self.last_set = None;

        trace!(rows = target.value_count, "transferred flat vector buffers");
    }

    fn split_into(&self, start: usize, len: usize, target: &mut Self) -> Result<()> {
        self.check_transfer_target(target)?;

        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.value_count)
            .ok_or_else(|| {
                VectorError::with_kind(
                    colview_error::ErrorKind::IndexOutOfRange,
                    "Split range exceeds value count",
                )
                .with_field("start", start)
                .with_field("len", len)
                .with_field("value_count", self.value_count)
            })?;

        let mut split = self.empty_like(&target.manager);
        split.config = target.config;
        split.allocate_new_with_capacity(len)?;
        split.values.copy_from(0, &self.values, start, len)?;
        for (out_idx, idx) in (start..end).enumerate() {
            split
                .validity
                .set_unchecked(out_idx, self.validity.value(idx));
        }
        split.value_count = len;
        split.last_set = len.checked_sub(1);

        *target = split;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::physical_type::{PhysicalF32, PhysicalI16, PhysicalI32};
    use crate::buffer::buffer_manager::TrackedBufferManager;
    use colview_error::ErrorKind;

    fn rows<B: BufferManager>(vector: &FlatVector<B>) -> Vec<ScalarValue> {
        (0..vector.value_count())
            .map(|idx| vector.get_object(idx).unwrap())
            .collect()
    }

    #[test]
    fn set_and_get() {
        let vector = FlatVector::try_from_values::<PhysicalI32>(
            "a",
            &NopBufferManager,
            &[Some(1), None, Some(3)],
        )
        .unwrap();

        assert_eq!(
            vec![ScalarValue::Int32(1), ScalarValue::Null, ScalarValue::Int32(3)],
            rows(&vector)
        );
        assert_eq!(1, vector.null_count());
        vector.get_object(3).unwrap_err();
    }

    #[test]
    fn wrong_value_type() {
        let field = Field::new("a", DataType::Int16, true);
        let mut vector = FlatVector::try_new(field, &NopBufferManager).unwrap();
        vector.set_value::<PhysicalI16>(0, 4).unwrap();
        let err = vector.set_value::<PhysicalF32>(1, 1.0).unwrap_err();
        assert_eq!(ErrorKind::SchemaMismatch, err.kind());
    }

    #[test]
    fn list_field_rejected() {
        let field = Field::new("a", DataType::list_view(DataType::Int16), true);
        FlatVector::try_new(field, &NopBufferManager).unwrap_err();
    }

    #[test]
    fn max_row_index_errors() {
        let mut vector =
            FlatVector::try_from_values::<PhysicalI32>("a", &NopBufferManager, &[Some(1)]).unwrap();

        let err = vector.set_null(usize::MAX).unwrap_err();
        assert_eq!(ErrorKind::IndexOutOfRange, err.kind());
        let err = vector.set_value::<PhysicalI32>(usize::MAX, 3).unwrap_err();
        assert_eq!(ErrorKind::IndexOutOfRange, err.kind());
    }

    #[test]
    fn trailing_rows_null() {
        let field = Field::new("a", DataType::Int32, true);
        let mut vector = FlatVector::try_new(field, &NopBufferManager).unwrap();
        vector.set_value::<PhysicalI32>(0, 8).unwrap();
        vector.set_value_count(3).unwrap();
        assert_eq!(2, vector.null_count());
        assert_eq!(Some(2), vector.last_set());
    }

    #[test]
    fn buffers_roundtrip() {
        let source = FlatVector::try_from_values::<PhysicalI32>(
            "a",
            &NopBufferManager,
            &[Some(1), None, Some(3)],
        )
        .unwrap();
        let buffers = source
            .field_buffers()
            .iter()
            .map(|v| v.try_to_owned(&NopBufferManager))
            .collect::<Result<Vec<_>>>()
            .unwrap();

        let mut loaded =
            FlatVector::try_new(source.field().clone(), &NopBufferManager).unwrap();
        loaded.load_field_buffers(source.field_node(), buffers).unwrap();
        assert_eq!(rows(&source), rows(&loaded));
    }

    #[test]
    fn transfer_between_managers() {
        let from = TrackedBufferManager::new();
        let to = TrackedBufferManager::new();
        let mut source =
            FlatVector::try_from_values::<PhysicalI32>("a", &from, &[Some(1), Some(2)]).unwrap();
        let bytes = from.allocated_bytes();

        let mut pair = source.transfer_pair(&to);
        pair.transfer().unwrap();
        let target = pair.into_target();

        assert_eq!(0, source.value_count());
        assert_eq!(vec![ScalarValue::Int32(1), ScalarValue::Int32(2)], rows(&target));
        assert_eq!(0, from.allocated_bytes());
        assert_eq!(bytes, to.allocated_bytes());
    }

    #[test]
    fn split_copies_window() {
        let mut source = FlatVector::try_from_values::<PhysicalI32>(
            "a",
            &NopBufferManager,
            &[Some(1), None, Some(3), Some(4)],
        )
        .unwrap();

        let mut pair = source.transfer_pair(&NopBufferManager);
        pair.split_and_transfer(1, 2).unwrap();
        assert_eq!(
            vec![ScalarValue::Null, ScalarValue::Int32(3)],
            rows(pair.target())
        );
    }
}
