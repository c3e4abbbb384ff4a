//! Component stores: one dense table per component type.
//!
//! A [`ComponentStore`] owns an [`IdGenerator`], a [`DynamicArray`] with one
//! column per schema field, and an id → row [`ReverseIndex`]. Instances are
//! addressed by [`Id`]; rows move on every destroy, so instance accessors
//! re-resolve the row on each lookup and are never held across a mutation.

use std::fmt;

use crate::{
    config::ResizePolicy,
    error::{StoreError, StoreResult},
    id::{Id, IdGenerator},
    index::{self, ReverseIndex},
    lock::TypeLock,
    mirror::RecordLayout,
    schema::{FieldType, ScalarKind, Schema},
    storage::{ColumnInfo, DynamicArray},
    value::{Scalar, Value},
};

/// Dense storage for every instance of one component type.
pub struct ComponentStore {
    schema: Schema,
    ids: IdGenerator,
    /// Id → row.
    index: ReverseIndex<usize>,
    table: DynamicArray,
    lock: TypeLock,
}

impl ComponentStore {
    /// Create an empty store for `schema`.
    #[must_use]
    pub fn new(schema: Schema, policy: ResizePolicy) -> Self {
        let table = DynamicArray::new(
            schema.fields().iter().map(|field| ColumnInfo::field(field.ty)),
            policy,
        );
        Self {
            schema,
            ids: IdGenerator::new(),
            index: ReverseIndex::with_len(policy.min_capacity),
            table,
            lock: TypeLock::new(),
        }
    }

    /// Field layout.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Component type name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Number of live instances.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if no instances are live.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Allocated rows per column.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Ids covered by the reverse index.
    #[must_use]
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// The advisory lock for this component type.
    #[must_use]
    pub const fn lock(&self) -> &TypeLock {
        &self.lock
    }

    /// Create an instance.
    ///
    /// `values` fill the fields in schema order. Missing trailing fields are
    /// zeroed and a one-lane value is broadcast across a vector or matrix
    /// field. Nothing is allocated if any value is rejected.
    pub fn create(&mut self, values: &[Value]) -> StoreResult<Id> {
        if values.len() > self.schema.len() {
            return Err(StoreError::TooManyValues {
                ty: self.schema.name().to_owned(),
                expected: self.schema.len(),
                found: values.len(),
            });
        }
        for (idx, value) in values.iter().enumerate() {
            self.check_value(idx, value)?;
        }

        let (id, row) = self.push_zeroed();
        for (idx, value) in values.iter().enumerate() {
            self.table.column_mut(idx).write_row(row, value.as_bytes());
        }
        Ok(id)
    }

    /// Create an instance with every field zeroed.
    pub fn create_default(&mut self) -> Id {
        self.push_zeroed().0
    }

    fn push_zeroed(&mut self) -> (Id, usize) {
        let id = self.ids.allocate();
        let row = self.table.append(id);
        let policy = *self.table.policy();
        self.index.insert(id, row, &policy);
        (id, row)
    }

    /// Check if `id` names a live instance.
    #[must_use]
    pub fn contains(&self, id: Id) -> bool {
        self.index.contains(id)
    }

    /// Current row of a live instance.
    #[must_use]
    pub fn row_of(&self, id: Id) -> Option<usize> {
        self.index.get(id)
    }

    /// Current rows of many ids, `None` for each one not live.
    pub fn rows_for<I>(&self, ids: I) -> impl Iterator<Item = Option<usize>>
    where
        I: IntoIterator<Item = Id>,
    {
        ids.into_iter().map(move |id| self.index.get(id))
    }

    /// Look up an instance.
    #[must_use]
    pub fn get(&self, id: Id) -> Option<Component<'_>> {
        let row = self.index.get(id)?;
        Some(Component {
            store: self,
            id,
            row,
        })
    }

    /// Look up an instance for writing.
    #[must_use]
    pub fn get_mut(&mut self, id: Id) -> Option<ComponentMut<'_>> {
        let row = self.index.get(id)?;
        Some(ComponentMut {
            store: self,
            id,
            row,
        })
    }

    /// Destroy an instance.
    ///
    /// Returns `false`, doing nothing, if `id` is not live.
    pub fn destroy(&mut self, id: Id) -> bool {
        let Some(row) = self.index.remove(id) else {
            return false;
        };

        if let Some(moved) = self.table.swap_remove(row) {
            self.index.update(moved, row);
        }
        self.ids.recycle(id);

        self.table.shrink_if_sparse();
        index::trim(&mut self.index, &mut self.ids, self.table.policy());
        true
    }

    /// Destroy every instance and return to the just-registered state.
    pub fn clear(&mut self) {
        tracing::debug!("clearing {} ({} live)", self.schema.name(), self.table.len());

        self.table.reset();
        self.ids.reset();
        self.index.reset(self.table.policy().min_capacity);
    }

    /// Ids of the live instances, in row order.
    #[must_use]
    pub fn ids(&self) -> &[Id] {
        self.table.ids()
    }

    /// Every live instance, in row order.
    pub fn iter(&self) -> impl Iterator<Item = Component<'_>> {
        self.table
            .ids()
            .iter()
            .enumerate()
            .map(move |(row, &id)| Component {
                store: self,
                id,
                row,
            })
    }

    /// Whole live column of a field, flattened to `len * width` scalars.
    pub fn column<T: Scalar>(&self, field: &str) -> StoreResult<&[T]> {
        self.flat(field).map(|(column, _)| column)
    }

    /// Whole live column of a field, mutably.
    ///
    /// Writes go straight into storage; re-fetch after any create or destroy.
    pub fn column_mut<T: Scalar>(&mut self, field: &str) -> StoreResult<&mut [T]> {
        self.flat_mut(field).map(|(column, _)| column)
    }

    /// Whole live column viewed as one `[T; N]` per row.
    pub fn column_rows<T: Scalar, const N: usize>(&self, field: &str) -> StoreResult<&[[T; N]]> {
        let (column, width) = self.flat::<T>(field)?;
        check_row_width(field, width, N)?;
        Ok(bytemuck::cast_slice(column))
    }

    /// Whole live column viewed as one mutable `[T; N]` per row.
    pub fn column_rows_mut<T: Scalar, const N: usize>(
        &mut self,
        field: &str,
    ) -> StoreResult<&mut [[T; N]]> {
        let (column, width) = self.flat_mut::<T>(field)?;
        check_row_width(field, width, N)?;
        Ok(bytemuck::cast_slice_mut(column))
    }

    /// Assign one value to a field of every live instance.
    pub fn set_column(&mut self, field: &str, value: impl Into<Value>) -> StoreResult<()> {
        let value = value.into();
        let idx = self.field_index(field)?;
        self.check_value(idx, &value)?;

        let len = self.table.len();
        let column = self.table.column_mut(idx);
        for row in 0..len {
            column.write_row(row, value.as_bytes());
        }
        Ok(())
    }

    /// Packed record layout for mirroring this store.
    #[must_use]
    pub fn record_layout(&self) -> RecordLayout {
        RecordLayout::of(&self.schema)
    }

    /// Append every live row to `out` as packed records, in row order.
    ///
    /// Returns the number of records written.
    pub fn write_records(&self, out: &mut Vec<u8>) -> usize {
        let itemsize = self.record_layout().itemsize();
        out.reserve(self.table.len() * itemsize);

        for (row, id) in self.table.ids().iter().enumerate() {
            for idx in 0..self.table.column_count() {
                out.extend_from_slice(self.table.column(idx).row_bytes(row));
            }
            out.extend_from_slice(bytemuck::bytes_of(id));
        }
        self.table.len()
    }

    /// Flat live column and field width, checked against `T`.
    pub(crate) fn flat<T: Scalar>(&self, field: &str) -> StoreResult<(&[T], usize)> {
        let idx = self.field_index(field)?;
        let ty = self.schema.fields()[idx].ty;
        let column = self
            .table
            .column(idx)
            .as_slice::<T>(self.table.len())
            .ok_or_else(|| kind_mismatch(field, ty, T::KIND))?;
        Ok((column, ty.width()))
    }

    /// Mutable flat live column and field width, checked against `T`.
    pub(crate) fn flat_mut<T: Scalar>(&mut self, field: &str) -> StoreResult<(&mut [T], usize)> {
        let idx = self.field_index(field)?;
        let ty = self.schema.fields()[idx].ty;
        let len = self.table.len();
        match self.table.column_mut(idx).as_mut_slice::<T>(len) {
            Some(column) => Ok((column, ty.width())),
            None => Err(kind_mismatch(field, ty, T::KIND)),
        }
    }

    fn field_index(&self, field: &str) -> StoreResult<usize> {
        self.schema
            .field_index(field)
            .ok_or_else(|| StoreError::UnknownField {
                ty: self.schema.name().to_owned(),
                field: field.to_owned(),
            })
    }

    fn check_value(&self, idx: usize, value: &Value) -> StoreResult<()> {
        let def = &self.schema.fields()[idx];
        if value.kind() != def.ty.kind() {
            return Err(kind_mismatch(&def.name, def.ty, value.kind()));
        }

        let width = def.ty.width();
        if value.len() != width && value.len() != 1 {
            return Err(StoreError::WidthMismatch {
                field: def.name.clone(),
                expected: width,
                found: value.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStore")
            .field("name", &self.schema.name())
            .field("len", &self.table.len())
            .field("capacity", &self.table.capacity())
            .field("index_len", &self.index.len())
            .finish_non_exhaustive()
    }
}

fn kind_mismatch(field: &str, expected: FieldType, found: ScalarKind) -> StoreError {
    StoreError::KindMismatch {
        field: field.to_owned(),
        expected,
        found,
    }
}

fn check_row_width(field: &str, width: usize, requested: usize) -> StoreResult<()> {
    if width == requested {
        Ok(())
    } else {
        Err(StoreError::WidthMismatch {
            field: field.to_owned(),
            expected: width,
            found: requested,
        })
    }
}

/// Read access to one live instance.
#[derive(Clone, Copy)]
pub struct Component<'a> {
    store: &'a ComponentStore,
    id: Id,
    row: usize,
}

impl<'a> Component<'a> {
    /// The instance id.
    #[must_use]
    pub const fn id(&self) -> Id {
        self.id
    }

    /// The instance's current row.
    #[must_use]
    pub const fn row(&self) -> usize {
        self.row
    }

    /// The lanes of one field.
    pub fn get<T: Scalar>(&self, field: &str) -> StoreResult<&'a [T]> {
        let (column, width) = self.store.flat::<T>(field)?;
        Ok(&column[self.row * width..(self.row + 1) * width])
    }

    /// One field as a dynamically typed value.
    pub fn value(&self, field: &str) -> StoreResult<Value> {
        let idx = self.store.field_index(field)?;
        Ok(self.value_at(idx))
    }

    /// Every field, in schema order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        (0..self.store.schema.len())
            .map(|idx| self.value_at(idx))
            .collect()
    }

    fn value_at(&self, idx: usize) -> Value {
        let kind = self.store.schema.fields()[idx].ty.kind();
        Value::from_bytes(kind, self.store.table.column(idx).row_bytes(self.row))
    }
}

impl PartialEq for Component<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.store.schema.name() == other.store.schema.name() && self.values() == other.values()
    }
}

impl fmt::Debug for Component<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.store.name());
        s.field("id", &self.id);
        for (def, value) in self.store.schema.fields().iter().zip(self.values()) {
            s.field(&def.name, &value);
        }
        s.finish()
    }
}

/// Write access to one live instance.
pub struct ComponentMut<'a> {
    store: &'a mut ComponentStore,
    id: Id,
    row: usize,
}

impl ComponentMut<'_> {
    /// The instance id.
    #[must_use]
    pub const fn id(&self) -> Id {
        self.id
    }

    /// Reborrow as a read-only accessor.
    #[must_use]
    pub fn as_component(&self) -> Component<'_> {
        Component {
            store: &*self.store,
            id: self.id,
            row: self.row,
        }
    }

    /// The lanes of one field.
    pub fn get<T: Scalar>(&self, field: &str) -> StoreResult<&[T]> {
        let (column, width) = self.store.flat::<T>(field)?;
        Ok(&column[self.row * width..(self.row + 1) * width])
    }

    /// The lanes of one field, mutably.
    pub fn get_mut<T: Scalar>(&mut self, field: &str) -> StoreResult<&mut [T]> {
        let row = self.row;
        let (column, width) = self.store.flat_mut::<T>(field)?;
        Ok(&mut column[row * width..(row + 1) * width])
    }

    /// Assign one field. A one-lane value is broadcast.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> StoreResult<()> {
        let value = value.into();
        let idx = self.store.field_index(field)?;
        self.store.check_value(idx, &value)?;
        self.store
            .table
            .column_mut(idx)
            .write_row(self.row, value.as_bytes());
        Ok(())
    }
}

impl fmt::Debug for ComponentMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_component().fmt(f)
    }
}
