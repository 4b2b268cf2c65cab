use colview_error::{ErrorKind, Result, ResultExt, VectorError};
use tracing::trace;

use super::bitmap::{Bitmap, num_bytes_for_bits};
use super::datatype::{DataType, Field};
use super::hash::{DefaultHasher, LIST_SEED_HASH, NULL_HASH, VectorHasher, combine_hashes};
use super::next_capacity;
use super::physical_type::{OffsetIndex, PhysicalStorage, PhysicalType, PhysicalU8};
use super::scalar::ScalarValue;
use super::scalar_buffer::{
    BufferView,
    FieldBufferKind,
    FieldNode,
    LIST_VIEW_BUFFER_ORDER,
    ScalarBuffer,
};
use super::transfer::{TransferPair, Transferable};
use super::visitor::VectorVisitor;
use crate::buffer::buffer_manager::{BufferManager, NopBufferManager, Reservation};
use crate::buffer::typed::TypedBuffer;
use crate::config::VectorConfig;

/// List view vector with 32-bit offsets and sizes.
pub type ListViewVector<B = NopBufferManager> = GenericListViewVector<i32, B>;

/// List view vector with 64-bit offsets and sizes.
pub type LargeListViewVector<B = NopBufferManager> = GenericListViewVector<i64, B>;

/// A nullable column of variable length lists.
///
/// Each row stores an offset and a size into a shared child values buffer.
/// Unlike classic list encoding, offsets don't need to be increasing and
/// rows may reference overlapping ranges of child values.
///
/// Writes beyond the current row capacity grow the buffers. Written rows only
/// become readable once the row count is finalized with `set_value_count`.
#[derive(Debug)]
pub struct GenericListViewVector<O: OffsetIndex, B: BufferManager> {
    field: Field,
    manager: B,
    config: VectorConfig,
    validity: Bitmap<B>,
    offsets: TypedBuffer<O, B>,
    sizes: TypedBuffer<O, B>,
    values: ScalarBuffer<B>,
    /// Number of child values considered written.
    values_len: usize,
    value_count: usize,
    /// Highest row index explicitly written.
    last_set: Option<usize>,
}

impl<O, B> GenericListViewVector<O, B>
where
    O: OffsetIndex,
    B: BufferManager,
{
    /// Create a new unallocated vector for a list view field.
    ///
    /// The field's type must be the list view variant matching the offset
    /// width, with a primitive child type.
    pub fn try_new(field: Field, manager: &B) -> Result<Self> {
        let is_large = matches!(field.datatype, DataType::LargeListView(_));
        if !field.datatype.is_list_view() || is_large != O::IS_LARGE {
            return Err(
                VectorError::schema_mismatch("Field type does not match list view variant")
                    .with_field("datatype", &field.datatype)
                    .with_field("large", O::IS_LARGE),
            );
        }
        let child_type = field.datatype.try_list_child_physical_type()?;

        Ok(Self::new_unallocated(
            field,
            child_type,
            manager,
            VectorConfig::default(),
        ))
    }

    /// Create an empty nullable list view named `name` over `child` values.
    pub fn empty(name: impl Into<String>, child: DataType, manager: &B) -> Result<Self> {
        let datatype = if O::IS_LARGE {
            DataType::large_list_view(child)
        } else {
            DataType::list_view(child)
        };
        Self::try_new(Field::new(name, datatype, true), manager)
    }

    /// Build a vector from rows of child values, `None` being a null row.
    pub fn try_from_rows<S>(
        name: impl Into<String>,
        manager: &B,
        rows: &[Option<&[S::StorageType]>],
    ) -> Result<Self>
    where
        S: PhysicalStorage,
    {
        let mut vector = Self::empty(name, S::PHYSICAL_TYPE.into(), manager)?;
        let child_len = rows.iter().flatten().map(|r| r.len()).sum();
        vector.allocate_exact(rows.len(), child_len)?;

        for (idx, row) in rows.iter().enumerate() {
            match row {
                Some(values) => vector.set_list::<S>(idx, values)?,
                None => vector.set_null(idx)?,
            }
        }
        vector.set_value_count(rows.len())?;

        Ok(vector)
    }

    fn new_unallocated(
        field: Field,
        child_type: PhysicalType,
        manager: &B,
        config: VectorConfig,
    ) -> Self {
        GenericListViewVector {
            field,
            manager: manager.clone(),
            config,
            validity: Bitmap::empty(manager),
            offsets: TypedBuffer::empty(manager),
            sizes: TypedBuffer::empty(manager),
            values: ScalarBuffer::empty(manager, child_type),
            values_len: 0,
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

    pub fn config(&self) -> &VectorConfig {
        &self.config
    }

    pub fn child_physical_type(&self) -> PhysicalType {
        self.values.physical_type()
    }

    /// Number of rows.
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn last_set(&self) -> Option<usize> {
        self.last_set
    }

    /// Number of rows that can be written without growing.
    pub fn value_capacity(&self) -> usize {
        self.validity
            .len()
            .min(self.offsets.capacity())
            .min(self.sizes.capacity())
    }

    /// Number of child values written.
    pub fn values_len(&self) -> usize {
        self.values_len
    }

    pub fn child_capacity(&self) -> usize {
        self.values.capacity()
    }

    /// Child values buffer.
    pub fn values(&self) -> &ScalarBuffer<B> {
        &self.values
    }

    /// Allocate buffers for the configured initial number of rows.
    pub fn allocate_new(&mut self) -> Result<()> {
        self.allocate_new_with_capacity(self.config.initial_value_allocation)
    }

    /// Allocate buffers for at least `rows` rows, discarding any existing
    /// content.
    ///
    /// The child buffer is sized using the configured repeat per record. On
    /// failure the vector keeps its previous buffers.
    pub fn allocate_new_with_capacity(&mut self, rows: usize) -> Result<()> {
        let child = rows.saturating_mul(self.config.repeat_per_record);
        self.allocate_exact(rows, child)
    }

    fn allocate_exact(&mut self, rows: usize, child: usize) -> Result<()> {
        let validity = Bitmap::try_new_all_false(&self.manager, rows)?;
        let offsets = TypedBuffer::try_with_capacity(&self.manager, rows)?;
        let sizes = TypedBuffer::try_with_capacity(&self.manager, rows)?;
        let values =
            ScalarBuffer::try_with_capacity(&self.manager, self.values.physical_type(), child)?;

        trace!(rows, child, "allocated list view buffers");

        self.validity = validity;
        self.offsets = offsets;
        self.sizes = sizes;
        self.values = values;
        self.values_len = 0;
        self.value_count = 0;
        self.last_set = None;

        Ok(())
    }

    fn ensure_row_capacity(&mut self, rows: usize) -> Result<()> {
        let curr = self.value_capacity();
        if rows <= curr {
            return Ok(());
        }

        let new_cap = next_capacity(curr, rows, self.config.initial_value_allocation);
        self.validity.resize(new_cap)?;
        if self.offsets.capacity() < new_cap {
            self.offsets
                .reserve_additional(new_cap - self.offsets.capacity())?;
        }
        if self.sizes.capacity() < new_cap {
            self.sizes.reserve_additional(new_cap - self.sizes.capacity())?;
        }

        trace!(from = curr, to = new_cap, "grew list view row capacity");

        Ok(())
    }

    fn ensure_child_capacity(&mut self, len: usize) -> Result<()> {
        let curr = self.values.capacity();
        if len <= curr {
            return Ok(());
        }

        let new_cap = next_capacity(curr, len, self.config.initial_child_allocation());
        self.values.reserve_additional(new_cap - curr)?;

        trace!(from = curr, to = new_cap, "grew list view child capacity");

        Ok(())
    }

    fn check_child_type<S>(&self) -> Result<()>
    where
        S: PhysicalStorage,
    {
        if S::PHYSICAL_TYPE != self.values.physical_type() {
            return Err(
                VectorError::schema_mismatch("Child values have a different type")
                    .with_field("have", self.values.physical_type())
                    .with_field("want", S::PHYSICAL_TYPE),
            );
        }
        Ok(())
    }

    /// Number of rows needed to hold row `idx`.
    fn row_end(&self, idx: usize) -> Result<usize> {
        idx.checked_add(1)
            .ok_or_else(|| VectorError::index_out_of_range(idx, self.value_capacity()))
    }

    fn update_last_set(&mut self, idx: usize) {
        self.last_set = Some(self.last_set.map_or(idx, |last| last.max(idx)));
    }

    /// Mark a row as null.
    ///
    /// The row's offset and size are left as they are.
    pub fn set_null(&mut self, idx: usize) -> Result<()> {
        self.ensure_row_capacity(self.row_end(idx)?)?;
        self.validity.set_unchecked(idx, false);
        self.update_last_set(idx);
        Ok(())
    }

    /// Begin writing a row, returning the child index where its elements
    /// start.
    ///
    /// Must be followed by `end_value` once the elements are written.
    pub fn start_new_value(&mut self, idx: usize) -> Result<usize> {
        let start = self.values_len;
        let offset = O::try_from_usize(start)?;

        self.ensure_row_capacity(self.row_end(idx)?)?;
        self.offsets.as_slice_mut()[idx] = offset;
        self.sizes.as_slice_mut()[idx] = O::ZERO;
        self.validity.set_unchecked(idx, true);
        self.update_last_set(idx);

        Ok(start)
    }

    /// Finish writing a row with `size` elements, advancing the child write
    /// position past them.
    pub fn end_value(&mut self, idx: usize, size: usize) -> Result<()> {
        let capacity = self.value_capacity();
        if idx >= capacity {
            return Err(VectorError::index_out_of_range(idx, capacity));
        }

        let start = self.offsets.as_slice()[idx].as_usize();
        let end = start
            .checked_add(size)
            .ok_or_else(|| VectorError::new("List view element range overflows"))?;
        let size_val = O::try_from_usize(size)?;
        O::try_from_usize(end)?;

        self.ensure_child_capacity(end)?;
        self.sizes.as_slice_mut()[idx] = size_val;
        self.values_len = self.values_len.max(end);

        Ok(())
    }

    /// Write child values starting at child index `start`.
    pub fn set_child_values<S>(&mut self, start: usize, values: &[S::StorageType]) -> Result<()>
    where
        S: PhysicalStorage,
    {
        self.check_child_type::<S>()?;
        let end = start
            .checked_add(values.len())
            .ok_or_else(|| VectorError::new("Child value range overflows"))?;

        self.ensure_child_capacity(end)?;
        let slice = self.values.try_as_slice_mut::<S>()?;
        slice[start..end].copy_from_slice(values);
        self.values_len = self.values_len.max(end);

        Ok(())
    }

    /// Append `values` to the child buffer and point row `idx` at them.
    pub fn set_list<S>(&mut self, idx: usize, values: &[S::StorageType]) -> Result<()>
    where
        S: PhysicalStorage,
    {
        self.check_child_type::<S>()?;
        let start = self.start_new_value(idx)?;
        self.set_child_values::<S>(start, values)?;
        self.end_value(idx, values.len())
    }

    /// Point row `idx` at an existing range of child values.
    ///
    /// The range may overlap ranges of other rows.
    pub fn set_list_view(&mut self, idx: usize, offset: usize, size: usize) -> Result<()> {
        let end = offset
            .checked_add(size)
            .ok_or_else(|| VectorError::new("List view element range overflows"))?;
        if end > self.values_len {
            return Err(VectorError::with_kind(
                ErrorKind::IndexOutOfRange,
                "List view element range exceeds child values",
            )
            .with_field("offset", offset)
            .with_field("size", size)
            .with_field("values_len", self.values_len));
        }
        let offset_val = O::try_from_usize(offset)?;
        let size_val = O::try_from_usize(size)?;

        self.ensure_row_capacity(self.row_end(idx)?)?;
        self.offsets.as_slice_mut()[idx] = offset_val;
        self.sizes.as_slice_mut()[idx] = size_val;
        self.validity.set_unchecked(idx, true);
        self.update_last_set(idx);

        Ok(())
    }

    /// Finalize the number of rows.
    ///
    /// Rows after the last written row are marked null with an empty range.
    pub fn set_value_count(&mut self, count: usize) -> Result<()> {
        self.ensure_row_capacity(count)?;

        let first_unset = self.last_set.map_or(0, |idx| idx + 1);
        for idx in first_unset..count {
            self.validity.set_unchecked(idx, false);
            self.offsets.as_slice_mut()[idx] = O::ZERO;
            self.sizes.as_slice_mut()[idx] = O::ZERO;
        }

        self.value_count = count;
        self.last_set = count.checked_sub(1);

        trace!(count, "set list view value count");

        Ok(())
    }

    fn check_index(&self, idx: usize) -> Result<()> {
        if idx >= self.value_count {
            return Err(VectorError::index_out_of_range(idx, self.value_count));
        }
        Ok(())
    }

    pub fn is_null(&self, idx: usize) -> Result<bool> {
        self.check_index(idx)?;
        Ok(!self.validity.value(idx))
    }

    /// Get the stored (offset, size) pair for a row.
    pub fn element_range(&self, idx: usize) -> Result<(usize, usize)> {
        self.check_index(idx)?;
        Ok((
            self.offsets.as_slice()[idx].as_usize(),
            self.sizes.as_slice()[idx].as_usize(),
        ))
    }

    pub fn element_start_index(&self, idx: usize) -> Result<usize> {
        let (start, _) = self.element_range(idx)?;
        Ok(start)
    }

    pub fn element_end_index(&self, idx: usize) -> Result<usize> {
        let (start, size) = self.element_range(idx)?;
        Ok(start + size)
    }

    /// Materialize a row as a list scalar, or null.
    pub fn get_object(&self, idx: usize) -> Result<ScalarValue> {
        if self.is_null(idx)? {
            return Ok(ScalarValue::Null);
        }

        let (start, size) = self.element_range(idx)?;
        let values = (start..(start + size))
            .map(|child_idx| {
                self.values
                    .scalar_value(child_idx)
                    .ok_or_else(|| VectorError::index_out_of_range(child_idx, self.values_len))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ScalarValue::List(values))
    }

    pub fn null_count(&self) -> usize {
        self.value_count - self.validity.count_trues_prefix(self.value_count)
    }

    /// Hash a row using the default hasher.
    pub fn hash_code(&self, idx: usize) -> Result<u64> {
        self.hash(idx, &DefaultHasher)
    }

    /// Hash a row's elements combined with its null flag.
    pub fn hash<H>(&self, idx: usize, hasher: &H) -> Result<u64>
    where
        H: VectorHasher + ?Sized,
    {
        if self.is_null(idx)? {
            return Ok(NULL_HASH);
        }

        let (start, size) = self.element_range(idx)?;
        let mut hash = LIST_SEED_HASH;
        for child_idx in start..(start + size) {
            let child_hash = self
                .values
                .hash_value(child_idx, hasher)
                .ok_or_else(|| VectorError::index_out_of_range(child_idx, self.values_len))?;
            hash = combine_hashes(hash, child_hash);
        }

        Ok(hash)
    }

    /// Row count and null count for the exported buffers.
    pub fn field_node(&self) -> FieldNode {
        FieldNode {
            length: self.value_count,
            null_count: self.null_count(),
        }
    }

    /// Views over the buffers in export order: validity, offsets, sizes,
    /// values.
    ///
    /// Views are trimmed to the row count and the written child values.
    pub fn field_buffers(&self) -> [BufferView<'_>; 4] {
        let rows = self.value_count;
        let index_type = O::Storage::PHYSICAL_TYPE;
        let index_bytes = rows * index_type.width();
        let values_bytes = self.values_len * self.values.physical_type().width();

        [
            BufferView {
                kind: FieldBufferKind::Validity,
                physical_type: PhysicalType::UInt8,
                bytes: self.validity.bytes_for_prefix(rows),
            },
            BufferView {
                kind: FieldBufferKind::Offsets,
                physical_type: index_type,
                bytes: &self.offsets.as_bytes()[..index_bytes],
            },
            BufferView {
                kind: FieldBufferKind::Sizes,
                physical_type: index_type,
                bytes: &self.sizes.as_bytes()[..index_bytes],
            },
            BufferView {
                kind: FieldBufferKind::Values,
                physical_type: self.values.physical_type(),
                bytes: &self.values.as_bytes()[..values_bytes],
            },
        ]
    }

    /// Hand out the owned buffers in export order without copying.
    pub fn into_field_buffers(self) -> (FieldNode, Vec<ScalarBuffer<B>>) {
        let node = self.field_node();
        let buffers = vec![
            ScalarBuffer::UInt8(self.validity.into_inner()),
            O::Storage::into_scalar_buffer(self.offsets),
            O::Storage::into_scalar_buffer(self.sizes),
            self.values,
        ];
        (node, buffers)
    }

    /// Adopt externally produced buffers in export order.
    ///
    /// Buffers are checked against the declared type and the element range
    /// invariant before anything is replaced. On error the vector is left
    /// unchanged.
    pub fn load_field_buffers(
        &mut self,
        node: FieldNode,
        buffers: Vec<ScalarBuffer<B>>,
    ) -> Result<()> {
        let buffers: [ScalarBuffer<B>; 4] = buffers.try_into().map_err(|bufs: Vec<_>| {
            VectorError::schema_mismatch("Unexpected number of list view buffers")
                .with_field("expected", LIST_VIEW_BUFFER_ORDER.len())
                .with_field("got", bufs.len())
        })?;

        let values_len = self
            .validate_field_buffers(node, &buffers)
            .context("Failed to load list view buffers")?;

        let [validity, offsets, sizes, values] = buffers;
        let validity = PhysicalU8::try_from_scalar_buffer(validity)?;
        let bits = validity.capacity() * 8;
        let validity = Bitmap::try_from_buffer(validity, bits)?;
        let offsets = O::Storage::try_from_scalar_buffer(offsets)?;
        let sizes = O::Storage::try_from_scalar_buffer(sizes)?;

        self.validity = validity;
        self.offsets = offsets;
        self.sizes = sizes;
        self.values = values;
        self.values_len = values_len;
        self.value_count = node.length;
        self.last_set = node.length.checked_sub(1);

        trace!(rows = node.length, values_len, "loaded list view buffers");

        Ok(())
    }

    /// Validates buffers for loading, returning the number of child values
    /// referenced by valid rows.
    fn validate_field_buffers(
        &self,
        node: FieldNode,
        buffers: &[ScalarBuffer<B>; 4],
    ) -> Result<usize> {
        let index_type = O::Storage::PHYSICAL_TYPE;
        let expected = [
            PhysicalType::UInt8,
            index_type,
            index_type,
            self.values.physical_type(),
        ];
        for ((buffer, want), kind) in buffers.iter().zip(expected).zip(LIST_VIEW_BUFFER_ORDER) {
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
        let offsets = buffers[1].try_as_slice::<O::Storage>()?;
        let sizes = buffers[2].try_as_slice::<O::Storage>()?;
        let child_len = buffers[3].capacity();

        if validity.len() < num_bytes_for_bits(rows) || offsets.len() < rows || sizes.len() < rows
        {
            return Err(VectorError::schema_mismatch("Buffers too small for row count")
                .with_field("rows", rows)
                .with_field("validity_bytes", validity.len())
                .with_field("offsets", offsets.len())
                .with_field("sizes", sizes.len()));
        }

        let mut null_count = 0;
        let mut values_len = 0;
        for idx in 0..rows {
            let valid = (validity[idx >> 3] >> (idx & 7)) & 1 != 0;
            let (offset, size) = (offsets[idx], sizes[idx]);

            if offset.is_negative() || size.is_negative() {
                return Err(VectorError::with_kind(
                    ErrorKind::IndexOutOfRange,
                    "Negative list view offset or size",
                )
                .with_field("row", idx)
                .with_field("offset", offset)
                .with_field("size", size));
            }

            if !valid {
                null_count += 1;
                continue;
            }

            let end = offset.as_usize() + size.as_usize();
            if end > child_len {
                return Err(VectorError::with_kind(
                    ErrorKind::IndexOutOfRange,
                    "List view element range exceeds child values",
                )
                .with_field("row", idx)
                .with_field("offset", offset)
                .with_field("size", size)
                .with_field("values_len", child_len));
            }
            values_len = values_len.max(end);
        }

        if null_count != node.null_count {
            return Err(
                VectorError::schema_mismatch("Null count does not match validity buffer")
                    .with_field("declared", node.null_count)
                    .with_field("actual", null_count),
            );
        }

        Ok(values_len)
    }

    /// Zero all buffers and drop all rows, keeping capacity.
    pub fn reset(&mut self) {
        self.validity.reset();
        self.offsets.reset();
        self.sizes.reset();
        self.values.reset();
        self.values_len = 0;
        self.value_count = 0;
        self.last_set = None;
    }

    /// Release all buffers back to the manager.
    pub fn clear(&mut self) {
        let child_type = self.values.physical_type();
        self.validity = Bitmap::empty(&self.manager);
        self.offsets = TypedBuffer::empty(&self.manager);
        self.sizes = TypedBuffer::empty(&self.manager);
        self.values = ScalarBuffer::empty(&self.manager, child_type);
        self.values_len = 0;
        self.value_count = 0;
        self.last_set = None;
    }

    /// Total bytes held by this vector's buffers.
    pub fn size_bytes(&self) -> usize {
        self.validity.size_bytes()
            + self.offsets.size_bytes()
            + self.sizes.size_bytes()
            + self.values.size_bytes()
    }

    pub fn accept<V>(&self, visitor: &mut V, ctx: V::Context) -> Result<V::Output>
    where
        V: VectorVisitor<B>,
    {
        visitor.visit_list_view(self, ctx)
    }

    /// Pair this vector with a new empty vector owned by `manager`.
    pub fn transfer_pair(&mut self, manager: &B) -> TransferPair<'_, Self> {
        TransferPair::new(self, manager)
    }

    /// Pair this vector with an existing target of the same type.
    pub fn make_transfer_pair(&mut self, target: Self) -> Result<TransferPair<'_, Self>> {
        TransferPair::try_with_target(self, target)
    }
}

impl<O, B> Transferable for GenericListViewVector<O, B>
where
    O: OffsetIndex,
    B: BufferManager,
{
    type Manager = B;
    type Reservations = [Reservation<B>; 4];

    fn manager(&self) -> &B {
        &self.manager
    }

    fn empty_like(&self, manager: &B) -> Self {
        Self::new_unallocated(
            self.field.clone(),
            self.values.physical_type(),
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

    fn reserve_transfer(&self, manager: &B) -> Result<[Reservation<B>; 4]> {
        Ok([
            manager.try_reserve(self.validity.size_bytes())?,
            manager.try_reserve(self.offsets.size_bytes())?,
            manager.try_reserve(self.sizes.size_bytes())?,
            manager.try_reserve(self.values.size_bytes())?,
        ])
    }

    fn complete_transfer(&mut self, target: &mut Self, reservations: [Reservation<B>; 4]) {
        let [validity_res, offsets_res, sizes_res, values_res] = reservations;

        let child_type = self.values.physical_type();
        let mut validity = std::mem::replace(&mut self.validity, Bitmap::empty(&self.manager));
        let mut offsets = std::mem::replace(&mut self.offsets, TypedBuffer::empty(&self.manager));
        let mut sizes = std::mem::replace(&mut self.sizes, TypedBuffer::empty(&self.manager));
        let mut values = std::mem::replace(
            &mut self.values,
            ScalarBuffer::empty(&self.manager, child_type),
        );

        // Old reservations are released from the source manager on drop.
        std::mem::drop(validity.replace_reservation(validity_res));
        std::mem::drop(offsets.replace_reservation(offsets_res));
        std::mem::drop(sizes.replace_reservation(sizes_res));
        std::mem::drop(values.replace_reservation(values_res));

        target.validity = validity;
        target.offsets = offsets;
        target.sizes = sizes;
        target.values = values;
        target.values_len = self.values_len;
        target.value_count = self.value_count;
        target.last_set = self.last_set;

        self.values_len = 0;
        self.value_count = 0;
        self.last_set = None;

        trace!(
            rows = target.value_count,
            bytes = target.size_bytes(),
            "transferred list view buffers"
        );
    }

    fn split_into(&self, start: usize, len: usize, target: &mut Self) -> Result<()> {
        self.check_transfer_target(target)?;

        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.value_count)
            .ok_or_else(|| {
                VectorError::with_kind(
                    ErrorKind::IndexOutOfRange,
                    "Split range exceeds value count",
                )
                .with_field("start", start)
                .with_field("len", len)
                .with_field("value_count", self.value_count)
            })?;

        let child_len: usize = (start..end)
            .filter(|&idx| self.validity.value(idx))
            .map(|idx| self.sizes.as_slice()[idx].as_usize())
            .sum();

        let mut split = self.empty_like(&target.manager);
        split.config = target.config;
        split.allocate_exact(len, child_len)?;

        for (out_idx, idx) in (start..end).enumerate() {
            if !self.validity.value(idx) {
                split.set_null(out_idx)?;
                continue;
            }

            let offset = self.offsets.as_slice()[idx].as_usize();
            let size = self.sizes.as_slice()[idx].as_usize();
            let dest = split.start_new_value(out_idx)?;
            split.values.copy_from(dest, &self.values, offset, size)?;
            split.end_value(out_idx, size)?;
        }
        split.set_value_count(len)?;

        trace!(start, len, child_len, "split list view into target");

        *target = split;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::hash::SimpleHasher;
    use crate::arrays::physical_type::{PhysicalF64, PhysicalI32, PhysicalI64};
    use crate::buffer::buffer_manager::TrackedBufferManager;

    fn rows<O, B>(vector: &GenericListViewVector<O, B>) -> Vec<ScalarValue>
    where
        O: OffsetIndex,
        B: BufferManager,
    {
        (0..vector.value_count())
            .map(|idx| vector.get_object(idx).unwrap())
            .collect()
    }

    fn list(vals: &[i32]) -> ScalarValue {
        ScalarValue::from(vals.to_vec())
    }

    /// Rows [1, 2], [], [3, 4, 5] written as independent views.
    fn scenario_vector() -> ListViewVector {
        scenario_vector_in(&NopBufferManager)
    }

    fn scenario_vector_in<B: BufferManager>(manager: &B) -> ListViewVector<B> {
        let mut vector = ListViewVector::<B>::empty("list", DataType::Int32, manager).unwrap();
        vector.allocate_new_with_capacity(4).unwrap();
        vector
            .set_child_values::<PhysicalI32>(0, &[1, 2, 3, 4, 5])
            .unwrap();
        vector.set_list_view(0, 0, 2).unwrap();
        vector.set_list_view(1, 2, 0).unwrap();
        vector.set_list_view(2, 2, 3).unwrap();
        vector.set_value_count(3).unwrap();
        vector
    }

    #[test]
    fn sizes_and_offsets_resolve_rows() {
        let vector = scenario_vector();

        assert_eq!((0, 2), vector.element_range(0).unwrap());
        assert_eq!((2, 0), vector.element_range(1).unwrap());
        assert_eq!((2, 3), vector.element_range(2).unwrap());

        assert_eq!(vec![list(&[1, 2]), list(&[]), list(&[3, 4, 5])], rows(&vector));
        assert!(!vector.is_null(1).unwrap());
        assert_eq!(0, vector.null_count());
    }

    #[test]
    fn append_protocol() {
        let mut vector = ListViewVector::empty("list", DataType::Int32, &NopBufferManager).unwrap();
        vector.allocate_new_with_capacity(2).unwrap();

        let start = vector.start_new_value(0).unwrap();
        assert_eq!(0, start);
        vector
            .set_child_values::<PhysicalI32>(start, &[7, 8])
            .unwrap();
        vector.end_value(0, 2).unwrap();

        let start = vector.start_new_value(1).unwrap();
        assert_eq!(2, start);
        vector.set_child_values::<PhysicalI32>(start, &[9]).unwrap();
        vector.end_value(1, 1).unwrap();

        vector.set_value_count(2).unwrap();

        assert_eq!(3, vector.values_len());
        assert_eq!(2, vector.element_start_index(1).unwrap());
        assert_eq!(3, vector.element_end_index(1).unwrap());
        assert_eq!(vec![list(&[7, 8]), list(&[9])], rows(&vector));
    }

    #[test]
    fn set_null_keeps_range() {
        let mut vector = scenario_vector();
        vector.set_null(2).unwrap();

        assert!(vector.is_null(2).unwrap());
        assert_eq!((2, 3), vector.element_range(2).unwrap());
        assert_eq!(ScalarValue::Null, vector.get_object(2).unwrap());
        assert_eq!(1, vector.null_count());
    }

    #[test]
    fn overlapping_ranges_share_content() {
        let mut vector = scenario_vector();
        vector.set_list_view(3, 2, 3).unwrap();
        vector.set_value_count(4).unwrap();

        assert_eq!(vector.get_object(2).unwrap(), vector.get_object(3).unwrap());
        assert_eq!(vector.hash_code(2).unwrap(), vector.hash_code(3).unwrap());
    }

    #[test]
    fn set_list_view_out_of_range() {
        let mut vector = scenario_vector();
        let err = vector.set_list_view(0, 4, 2).unwrap_err();
        assert_eq!(ErrorKind::IndexOutOfRange, err.kind());
        // Row unchanged.
        assert_eq!((0, 2), vector.element_range(0).unwrap());
    }

    #[test]
    fn value_count_marks_trailing_nulls() {
        let mut vector = ListViewVector::empty("list", DataType::Int32, &NopBufferManager).unwrap();
        vector.allocate_new_with_capacity(2).unwrap();
        vector.set_list::<PhysicalI32>(0, &[1]).unwrap();
        vector.set_list::<PhysicalI32>(1, &[2, 3]).unwrap();
        assert_eq!(Some(1), vector.last_set());

        // Grows past the allocated capacity.
        vector.set_value_count(5).unwrap();
        assert!(vector.value_capacity() >= 5);
        assert_eq!(Some(4), vector.last_set());

        assert_eq!(
            vec![
                list(&[1]),
                list(&[2, 3]),
                ScalarValue::Null,
                ScalarValue::Null,
                ScalarValue::Null,
            ],
            rows(&vector)
        );
        assert_eq!((0, 0), vector.element_range(4).unwrap());
        assert_eq!(3, vector.null_count());
    }

    #[test]
    fn accessors_out_of_range() {
        let vector = scenario_vector();
        assert_eq!(ErrorKind::IndexOutOfRange, vector.is_null(3).unwrap_err().kind());
        assert_eq!(
            ErrorKind::IndexOutOfRange,
            vector.element_range(8).unwrap_err().kind()
        );
        assert_eq!(ErrorKind::IndexOutOfRange, vector.get_object(3).unwrap_err().kind());
    }

    #[test]
    fn written_rows_not_readable_before_value_count() {
        let mut vector = ListViewVector::empty("list", DataType::Int32, &NopBufferManager).unwrap();
        vector.set_list::<PhysicalI32>(0, &[1]).unwrap();
        vector.is_null(0).unwrap_err();

        vector.set_value_count(1).unwrap();
        assert_eq!(list(&[1]), vector.get_object(0).unwrap());
    }

    #[test]
    fn zero_length_vector() {
        let mut vector = ListViewVector::empty("list", DataType::Int32, &NopBufferManager).unwrap();
        vector.set_value_count(0).unwrap();

        assert_eq!(0, vector.value_count());
        assert_eq!(None, vector.last_set());
        for view in vector.field_buffers() {
            assert!(view.is_empty());
        }
    }

    #[test]
    fn all_null_vector() {
        let mut vector = ListViewVector::empty("list", DataType::Int32, &NopBufferManager).unwrap();
        vector.set_value_count(4).unwrap();

        assert_eq!(4, vector.null_count());
        for idx in 0..4 {
            assert!(vector.is_null(idx).unwrap());
            assert_eq!(ScalarValue::Null, vector.get_object(idx).unwrap());
        }
        assert_eq!(0, vector.values_len());
    }

    #[test]
    fn wrong_child_type() {
        let mut vector = ListViewVector::empty("list", DataType::Int32, &NopBufferManager).unwrap();
        let err = vector.set_list::<PhysicalF64>(0, &[1.0]).unwrap_err();
        assert_eq!(ErrorKind::SchemaMismatch, err.kind());
        assert_eq!(None, vector.last_set());
    }

    #[test]
    fn wrong_field_variant() {
        let field = Field::new("list", DataType::large_list_view(DataType::Int32), true);
        ListViewVector::try_new(field.clone(), &NopBufferManager).unwrap_err();
        LargeListViewVector::try_new(field, &NopBufferManager).unwrap();

        let field = Field::new("int", DataType::Int32, true);
        ListViewVector::try_new(field, &NopBufferManager).unwrap_err();
    }

    #[test]
    fn allocation_failure_propagates() {
        let manager = TrackedBufferManager::with_limit(64);
        let mut vector =
            ListViewVector::<TrackedBufferManager>::empty("list", DataType::Int64, &manager)
                .unwrap();

        let err = vector.allocate_new().unwrap_err();
        assert_eq!(ErrorKind::Allocation, err.kind());
        assert_eq!(0, manager.allocated_bytes());
        assert_eq!(0, vector.value_capacity());
    }

    #[test]
    fn allocate_uses_config() {
        let manager = TrackedBufferManager::new();
        let config = VectorConfig {
            initial_value_allocation: 8,
            repeat_per_record: 2,
        };
        let mut vector =
            ListViewVector::<TrackedBufferManager>::empty("list", DataType::Int32, &manager)
                .unwrap()
                .with_config(config);
        vector.allocate_new().unwrap();

        assert_eq!(8, vector.value_capacity());
        assert_eq!(16, vector.child_capacity());
        // 1 validity byte, 8 offsets, 8 sizes, 16 values.
        assert_eq!(1 + 32 + 32 + 64, manager.allocated_bytes());
    }

    #[test]
    fn capacity_doubles() {
        let config = VectorConfig {
            initial_value_allocation: 4,
            repeat_per_record: 1,
        };
        let mut vector = ListViewVector::empty("list", DataType::Int32, &NopBufferManager)
            .unwrap()
            .with_config(config);
        vector.allocate_new().unwrap();

        vector.set_null(4).unwrap();
        assert_eq!(8, vector.value_capacity());
        vector.set_null(17).unwrap();
        assert_eq!(32, vector.value_capacity());
    }

    #[test]
    fn field_buffers_export_order() {
        let vector = scenario_vector();
        let views = vector.field_buffers();

        let kinds: Vec<_> = views.iter().map(|v| v.kind).collect();
        assert_eq!(LIST_VIEW_BUFFER_ORDER.to_vec(), kinds);

        assert_eq!(1, views[0].bytes.len());
        assert_eq!(3, views[1].len());
        assert_eq!(PhysicalType::Int32, views[1].physical_type);
        assert_eq!(3, views[2].len());
        assert_eq!(5, views[3].len());
    }

    #[test]
    fn field_buffers_roundtrip_other_manager() {
        let mut source = scenario_vector();
        source.set_null(1).unwrap();

        let manager = TrackedBufferManager::new();
        let buffers = source
            .field_buffers()
            .iter()
            .map(|view| view.try_to_owned(&manager))
            .collect::<Result<Vec<_>>>()
            .unwrap();

        let mut loaded =
            ListViewVector::<TrackedBufferManager>::empty("list", DataType::Int32, &manager)
                .unwrap();
        loaded
            .load_field_buffers(source.field_node(), buffers)
            .unwrap();

        assert_eq!(rows(&source), rows(&loaded));
        for idx in 0..3 {
            assert_eq!(source.is_null(idx).unwrap(), loaded.is_null(idx).unwrap());
            assert_eq!(
                source.element_range(idx).unwrap(),
                loaded.element_range(idx).unwrap()
            );
        }
        assert_eq!(Some(2), loaded.last_set());
        assert!(manager.allocated_bytes() > 0);
    }

    #[test]
    fn into_field_buffers_zero_copy() {
        let source = scenario_vector();
        let expected = rows(&source);
        let values_ptr = source.values().as_ptr();

        let (node, buffers) = source.into_field_buffers();
        let mut loaded = ListViewVector::empty("list", DataType::Int32, &NopBufferManager).unwrap();
        loaded.load_field_buffers(node, buffers).unwrap();

        assert_eq!(expected, rows(&loaded));
        assert_eq!(values_ptr, loaded.values().as_ptr());
        assert_eq!(5, loaded.values_len());
    }

    #[test]
    fn load_rejects_wrong_buffer_count() {
        let mut vector = scenario_vector();
        let err = vector
            .load_field_buffers(FieldNode { length: 0, null_count: 0 }, Vec::new())
            .unwrap_err();
        assert_eq!(ErrorKind::SchemaMismatch, err.kind());
        assert_eq!(3, vector.value_count());
    }

    #[test]
    fn load_rejects_offset_width_mismatch() {
        let large = LargeListViewVector::try_from_rows::<PhysicalI32>(
            "list",
            &NopBufferManager,
            &[Some(&[1, 2][..]), None],
        )
        .unwrap();
        let (node, buffers) = large.into_field_buffers();

        let mut vector = scenario_vector();
        let before = rows(&vector);
        let err = vector.load_field_buffers(node, buffers).unwrap_err();
        assert_eq!(ErrorKind::SchemaMismatch, err.kind());
        assert_eq!(before, rows(&vector));
    }

    #[test]
    fn load_rejects_range_past_child_values() {
        let manager = NopBufferManager;
        let buffers = vec![
            ScalarBuffer::try_from_slice::<PhysicalU8>(&manager, &[0b11]).unwrap(),
            ScalarBuffer::try_from_slice::<PhysicalI32>(&manager, &[0, 2]).unwrap(),
            ScalarBuffer::try_from_slice::<PhysicalI32>(&manager, &[2, 2]).unwrap(),
            ScalarBuffer::try_from_slice::<PhysicalI32>(&manager, &[1, 2, 3]).unwrap(),
        ];

        let mut vector = scenario_vector();
        let before = rows(&vector);
        let err = vector
            .load_field_buffers(FieldNode { length: 2, null_count: 0 }, buffers)
            .unwrap_err();
        assert_eq!(ErrorKind::IndexOutOfRange, err.kind());
        assert_eq!(before, rows(&vector));
    }

    #[test]
    fn load_allows_null_row_past_child_values() {
        let manager = NopBufferManager;
        let buffers = vec![
            ScalarBuffer::try_from_slice::<PhysicalU8>(&manager, &[0b01]).unwrap(),
            ScalarBuffer::try_from_slice::<PhysicalI32>(&manager, &[0, 2]).unwrap(),
            ScalarBuffer::try_from_slice::<PhysicalI32>(&manager, &[2, 2]).unwrap(),
            ScalarBuffer::try_from_slice::<PhysicalI32>(&manager, &[1, 2, 3]).unwrap(),
        ];

        let mut vector = ListViewVector::empty("list", DataType::Int32, &manager).unwrap();
        vector
            .load_field_buffers(FieldNode { length: 2, null_count: 1 }, buffers)
            .unwrap();
        assert_eq!(vec![list(&[1, 2]), ScalarValue::Null], rows(&vector));
    }

    #[test]
    fn load_rejects_negative_offset() {
        let manager = NopBufferManager;
        let buffers = vec![
            ScalarBuffer::try_from_slice::<PhysicalU8>(&manager, &[0b1]).unwrap(),
            ScalarBuffer::try_from_slice::<PhysicalI32>(&manager, &[-1]).unwrap(),
            ScalarBuffer::try_from_slice::<PhysicalI32>(&manager, &[1]).unwrap(),
            ScalarBuffer::try_from_slice::<PhysicalI32>(&manager, &[1]).unwrap(),
        ];

        let mut vector = ListViewVector::empty("list", DataType::Int32, &manager).unwrap();
        let err = vector
            .load_field_buffers(FieldNode { length: 1, null_count: 0 }, buffers)
            .unwrap_err();
        assert_eq!(ErrorKind::IndexOutOfRange, err.kind());
    }

    #[test]
    fn load_rejects_bad_null_count() {
        let source = scenario_vector();
        let (mut node, buffers) = source.into_field_buffers();
        node.null_count = 2;

        let mut vector = ListViewVector::empty("list", DataType::Int32, &NopBufferManager).unwrap();
        let err = vector.load_field_buffers(node, buffers).unwrap_err();
        assert_eq!(ErrorKind::SchemaMismatch, err.kind());
    }

    #[test]
    fn transfer_moves_ownership_without_copy() {
        let source_manager = TrackedBufferManager::new();
        let target_manager = TrackedBufferManager::new();

        let mut source = ListViewVector::<TrackedBufferManager>::try_from_rows::<PhysicalI32>(
            "list",
            &source_manager,
            &[Some(&[1, 2][..]), None, Some(&[3, 4, 5][..])],
        )
        .unwrap();
        let expected = rows(&source);
        let bytes = source_manager.allocated_bytes();
        let values_ptr = source.values().as_ptr();

        let mut pair = source.transfer_pair(&target_manager);
        pair.transfer().unwrap();
        let target = pair.into_target();

        assert_eq!(0, source.value_count());
        assert_eq!(None, source.last_set());
        assert_eq!(expected, rows(&target));
        assert_eq!(values_ptr, target.values().as_ptr());

        assert_eq!(0, source_manager.allocated_bytes());
        assert_eq!(bytes, target_manager.allocated_bytes());
        assert_eq!(bytes, target_manager.peak_bytes());

        std::mem::drop(target);
        assert_eq!(0, target_manager.allocated_bytes());
    }

    #[test]
    fn transfer_failure_leaves_both_vectors() {
        let source_manager = TrackedBufferManager::new();
        let target_manager = TrackedBufferManager::with_limit(8);

        let mut source = ListViewVector::<TrackedBufferManager>::try_from_rows::<PhysicalI32>(
            "list",
            &source_manager,
            &[Some(&[1, 2, 3, 4][..]), Some(&[5][..])],
        )
        .unwrap();
        let expected = rows(&source);
        let bytes = source_manager.allocated_bytes();

        let mut pair = source.transfer_pair(&target_manager);
        let err = pair.transfer().unwrap_err();
        assert_eq!(ErrorKind::Allocation, err.kind());
        assert_eq!(0, pair.target().value_count());

        assert_eq!(expected, rows(&source));
        assert_eq!(bytes, source_manager.allocated_bytes());
        assert_eq!(0, target_manager.allocated_bytes());
    }

    #[test]
    fn make_transfer_pair_checks_type() {
        let mut source = scenario_vector();
        let target = ListViewVector::empty("other", DataType::Int64, &NopBufferManager).unwrap();
        let err = source.make_transfer_pair(target).unwrap_err();
        assert_eq!(ErrorKind::SchemaMismatch, err.kind());

        let target = ListViewVector::empty("other", DataType::Int32, &NopBufferManager).unwrap();
        let mut pair = source.make_transfer_pair(target).unwrap();
        pair.transfer().unwrap();
        assert_eq!(3, pair.target().value_count());
    }

    #[test]
    fn split_and_transfer_compacts() {
        let source_manager = TrackedBufferManager::new();
        let mut source = scenario_vector_in(&source_manager);
        // Row 3 overlaps row 2, row 4 is null.
        source.set_list_view(3, 3, 2).unwrap();
        source.set_null(4).unwrap();
        source.set_value_count(5).unwrap();

        let manager = TrackedBufferManager::new();
        let mut pair = source.transfer_pair(&manager);
        pair.split_and_transfer(2, 3).unwrap();
        let target = pair.into_target();

        assert_eq!(
            vec![list(&[3, 4, 5]), list(&[4, 5]), ScalarValue::Null],
            rows(&target)
        );
        assert_eq!((0, 3), target.element_range(0).unwrap());
        assert_eq!((3, 2), target.element_range(1).unwrap());
        assert_eq!(5, target.values_len());

        // Source keeps its rows and its bytes, target holds only the copy.
        assert_eq!(5, source.value_count());
        assert_eq!(source.size_bytes(), source_manager.allocated_bytes());
        assert_eq!(target.size_bytes(), manager.allocated_bytes());
    }

    #[test]
    fn max_row_index_errors() {
        let mut vector = scenario_vector();
        let expected = rows(&vector);

        let err = vector.set_null(usize::MAX).unwrap_err();
        assert_eq!(ErrorKind::IndexOutOfRange, err.kind());
        let err = vector.start_new_value(usize::MAX).unwrap_err();
        assert_eq!(ErrorKind::IndexOutOfRange, err.kind());
        let err = vector.set_list_view(usize::MAX, 0, 1).unwrap_err();
        assert_eq!(ErrorKind::IndexOutOfRange, err.kind());

        assert_eq!(expected, rows(&vector));
    }

    #[test]
    fn oversized_allocation_errors() {
        let manager = TrackedBufferManager::new();
        let mut vector = scenario_vector_in(&manager);
        let expected = rows(&vector);
        let bytes = manager.allocated_bytes();

        let err = vector.allocate_new_with_capacity(usize::MAX / 4).unwrap_err();
        assert_eq!(ErrorKind::Allocation, err.kind());

        // Previous buffers are kept.
        assert_eq!(expected, rows(&vector));
        assert_eq!(bytes, manager.allocated_bytes());

        let err = vector.set_value_count(1 << 60).unwrap_err();
        assert_eq!(ErrorKind::Allocation, err.kind());
    }

    #[test]
    fn split_out_of_range() {
        let mut source = scenario_vector();
        let mut pair = source.transfer_pair(&NopBufferManager);
        let err = pair.split_and_transfer(2, 2).unwrap_err();
        assert_eq!(ErrorKind::IndexOutOfRange, err.kind());
    }

    #[test]
    fn hash_stable_across_vectors() {
        let a = ListViewVector::try_from_rows::<PhysicalI32>(
            "a",
            &NopBufferManager,
            &[Some(&[1, 2][..]), Some(&[][..]), None],
        )
        .unwrap();
        let b = scenario_vector();

        assert_eq!(a.hash_code(0).unwrap(), b.hash_code(0).unwrap());
        assert_eq!(a.hash(1, &SimpleHasher).unwrap(), b.hash(1, &SimpleHasher).unwrap());
        assert_eq!(NULL_HASH, a.hash_code(2).unwrap());
        // Empty list is not null.
        assert_ne!(a.hash_code(1).unwrap(), a.hash_code(2).unwrap());
        assert_ne!(a.hash_code(0).unwrap(), b.hash_code(2).unwrap());
    }

    #[test]
    fn reset_keeps_capacity_clear_releases() {
        let manager = TrackedBufferManager::new();
        let mut vector = ListViewVector::<TrackedBufferManager>::try_from_rows::<PhysicalI32>(
            "list",
            &manager,
            &[Some(&[1, 2][..]), Some(&[3][..])],
        )
        .unwrap();
        let bytes = manager.allocated_bytes();

        vector.reset();
        assert_eq!(0, vector.value_count());
        assert_eq!(bytes, manager.allocated_bytes());
        assert_eq!(2, vector.value_capacity());

        vector.clear();
        assert_eq!(0, vector.value_capacity());
        assert_eq!(0, manager.allocated_bytes());
    }

    #[test]
    fn large_variant() {
        let mut vector =
            LargeListViewVector::empty("large", DataType::Int64, &NopBufferManager).unwrap();
        vector.set_list::<PhysicalI64>(0, &[10, 20]).unwrap();
        vector.set_list_view(1, 1, 1).unwrap();
        vector.set_value_count(2).unwrap();

        assert_eq!(
            vec![ScalarValue::from(vec![10i64, 20]), ScalarValue::from(vec![20i64])],
            rows(&vector)
        );
        let views = vector.field_buffers();
        assert_eq!(PhysicalType::Int64, views[1].physical_type);
        assert_eq!(16, views[2].bytes.len());
    }
}
