//! Column storage - type-erased parallel arrays sharing one length.
//!
//! Each [`Column`] holds one field for every row of a table in a single
//! contiguous allocation. A [`DynamicArray`] keeps several columns, plus the
//! row → id column, at one common `len` and `capacity`. Rows `[0, len)` are
//! live and dense; removal swaps the last live row into the gap.

use std::{alloc::Layout, fmt, ptr::NonNull};

use smallvec::SmallVec;

use crate::{
    config::ResizePolicy,
    id::Id,
    schema::{FieldType, ScalarKind},
    value::Scalar,
};

/// Byte pattern written into slack rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    /// All zero bytes, for data columns.
    Zero,
    /// All one bits, reading as `u32::MAX` ("no id") in reference columns.
    Absent,
}

impl Fill {
    const fn byte(self) -> u8 {
        match self {
            Self::Zero => 0x00,
            Self::Absent => 0xFF,
        }
    }
}

/// Element type, width and slack fill of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    kind: ScalarKind,
    width: usize,
    fill: Fill,
}

impl ColumnInfo {
    /// Describe a column.
    #[must_use]
    pub const fn new(kind: ScalarKind, width: usize, fill: Fill) -> Self {
        Self { kind, width, fill }
    }

    /// Zero-filled data column for a component field.
    #[must_use]
    pub const fn field(ty: FieldType) -> Self {
        Self::new(ty.kind(), ty.width(), Fill::Zero)
    }

    /// Column of ids, absent-filled.
    #[must_use]
    pub const fn ids() -> Self {
        Self::new(ScalarKind::U32, 1, Fill::Absent)
    }

    /// Element type.
    #[must_use]
    pub const fn kind(&self) -> ScalarKind {
        self.kind
    }

    /// Scalars per row.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Bytes per row.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.kind.size() * self.width
    }

    /// Slack fill pattern.
    #[must_use]
    pub const fn fill(&self) -> Fill {
        self.fill
    }
}

/// One field of every row of a table, stored contiguously.
///
/// The column does not know how many rows are live; its owner does.
pub struct Column {
    /// Pointer to `capacity * stride` bytes, aligned for the element type.
    data: NonNull<u8>,
    /// Allocated rows. Always at least 1.
    capacity: usize,
    info: ColumnInfo,
}

// SAFETY: Column exclusively owns its allocation and holds plain numeric data.
unsafe impl Send for Column {}
unsafe impl Sync for Column {}

impl Column {
    /// Allocate a column of `capacity` rows, every byte set to the fill pattern.
    #[must_use]
    pub fn with_capacity(info: ColumnInfo, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Self::allocate(&info, capacity),
            capacity,
            info,
        }
    }

    /// Allocated rows.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Column description.
    #[must_use]
    pub const fn info(&self) -> &ColumnInfo {
        &self.info
    }

    /// Every allocated byte, live or not.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: data points to capacity * stride initialized bytes owned by self.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.byte_len()) }
    }

    /// Every allocated byte, mutably.
    #[must_use]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), self.byte_len()) }
    }

    /// Bytes of one row.
    #[must_use]
    pub fn row_bytes(&self, row: usize) -> &[u8] {
        let stride = self.info.stride();
        &self.as_bytes()[row * stride..(row + 1) * stride]
    }

    /// Bytes of one row, mutably.
    #[must_use]
    pub fn row_bytes_mut(&mut self, row: usize) -> &mut [u8] {
        let stride = self.info.stride();
        &mut self.as_bytes_mut()[row * stride..(row + 1) * stride]
    }

    /// The first `rows` rows as a flat slice of `T`, if `T` is the element type.
    #[must_use]
    pub fn as_slice<T: Scalar>(&self, rows: usize) -> Option<&[T]> {
        if T::KIND != self.info.kind {
            return None;
        }
        let end = rows * self.info.stride();
        Some(bytemuck::cast_slice(&self.as_bytes()[..end]))
    }

    /// The first `rows` rows as a flat mutable slice of `T`.
    #[must_use]
    pub fn as_mut_slice<T: Scalar>(&mut self, rows: usize) -> Option<&mut [T]> {
        if T::KIND != self.info.kind {
            return None;
        }
        let end = rows * self.info.stride();
        Some(bytemuck::cast_slice_mut(&mut self.as_bytes_mut()[..end]))
    }

    /// Overwrite one row from raw bytes. A single scalar is broadcast to every
    /// lane.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is neither one scalar nor one full row.
    pub fn write_row(&mut self, row: usize, bytes: &[u8]) {
        let scalar = self.info.kind.size();
        let dst = self.row_bytes_mut(row);
        if bytes.len() == dst.len() {
            dst.copy_from_slice(bytes);
        } else {
            assert_eq!(bytes.len(), scalar, "row write of {} bytes", bytes.len());
            for lane in dst.chunks_exact_mut(scalar) {
                lane.copy_from_slice(bytes);
            }
        }
    }

    /// Reset one row to the fill pattern.
    pub fn fill_row(&mut self, row: usize) {
        let byte = self.info.fill.byte();
        self.row_bytes_mut(row).fill(byte);
    }

    /// Copy row `src` over row `dst`.
    pub fn copy_row(&mut self, src: usize, dst: usize) {
        let stride = self.info.stride();
        self.as_bytes_mut()
            .copy_within(src * stride..(src + 1) * stride, dst * stride);
    }

    /// Move to a new allocation of `new_capacity` rows, keeping the first
    /// `keep` rows and filling everything after them.
    pub fn reallocate(&mut self, new_capacity: usize, keep: usize) {
        let new_capacity = new_capacity.max(1);
        let new_data = Self::allocate(&self.info, new_capacity);
        let copied = keep.min(new_capacity).min(self.capacity) * self.info.stride();

        // SAFETY: both blocks hold at least `copied` bytes and are distinct allocations.
        unsafe {
            std::ptr::copy_nonoverlapping(self.data.as_ptr(), new_data.as_ptr(), copied);
        }

        self.release();
        self.data = new_data;
        self.capacity = new_capacity;
    }

    fn byte_len(&self) -> usize {
        self.capacity * self.info.stride()
    }

    fn allocate(info: &ColumnInfo, capacity: usize) -> NonNull<u8> {
        let layout = Self::array_layout(info, capacity);

        // SAFETY: layout size is non-zero (capacity >= 1, stride >= 1).
        let ptr = unsafe { std::alloc::alloc(layout) };
        let Some(data) = NonNull::new(ptr) else {
            std::alloc::handle_alloc_error(layout);
        };

        // SAFETY: the block is layout.size() bytes long and exclusively ours.
        unsafe {
            std::ptr::write_bytes(data.as_ptr(), info.fill.byte(), layout.size());
        }
        data
    }

    fn release(&mut self) {
        let layout = Self::array_layout(&self.info, self.capacity);
        // SAFETY: data was allocated with exactly this layout.
        unsafe {
            std::alloc::dealloc(self.data.as_ptr(), layout);
        }
    }

    /// Calculate the array layout for `count` rows.
    fn array_layout(info: &ColumnInfo, count: usize) -> Layout {
        let size = info.stride().checked_mul(count).expect("Layout overflow");
        Layout::from_size_align(size, info.kind.align()).expect("Layout overflow")
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("info", &self.info)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// A set of parallel columns plus a row → id column, sharing one length and
/// one capacity.
///
/// Row order is not meaningful: [`swap_remove`](Self::swap_remove) fills a
/// gap with the last live row. Owners keep an id → row index and patch it with
/// the id `swap_remove` reports as moved.
pub struct DynamicArray {
    /// Row → id.
    ids: Column,
    /// One column per field, in schema order.
    columns: SmallVec<[Column; 8]>,
    len: usize,
    capacity: usize,
    policy: ResizePolicy,
}

impl DynamicArray {
    /// Create an empty table at the policy's minimum capacity.
    pub fn new(infos: impl IntoIterator<Item = ColumnInfo>, policy: ResizePolicy) -> Self {
        let capacity = policy.min_capacity.max(1);
        Self {
            ids: Column::with_capacity(ColumnInfo::ids(), capacity),
            columns: infos
                .into_iter()
                .map(|info| Column::with_capacity(info, capacity))
                .collect(),
            len: 0,
            capacity,
            policy,
        }
    }

    /// Live rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if no rows are live.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated rows.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resize policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &ResizePolicy {
        &self.policy
    }

    /// Number of data columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Data column by position.
    #[must_use]
    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    /// Mutable data column by position.
    #[must_use]
    pub fn column_mut(&mut self, index: usize) -> &mut Column {
        &mut self.columns[index]
    }

    /// Ids of the live rows, in row order.
    #[must_use]
    pub fn ids(&self) -> &[Id] {
        bytemuck::cast_slice(&self.ids.as_bytes()[..self.len * ScalarKind::U32.size()])
    }

    /// Id stored at a live row.
    #[must_use]
    pub fn id_at(&self, row: usize) -> Option<Id> {
        self.ids().get(row).copied()
    }

    /// Append a row for `id`, growing if full. Data columns of the new row
    /// are reset to their fill pattern.
    pub fn append(&mut self, id: Id) -> usize {
        if self.len == self.capacity {
            let grown = self.policy.grown(self.capacity);
            tracing::trace!("table grown {} -> {grown} rows", self.capacity);
            self.reallocate(grown);
        }

        let row = self.len;
        self.len += 1;

        self.ids.row_bytes_mut(row).copy_from_slice(bytemuck::bytes_of(&id));
        for column in &mut self.columns {
            column.fill_row(row);
        }
        row
    }

    /// Remove a live row by moving the last live row into it.
    ///
    /// Returns the id now occupying `row`, or `None` if `row` was the last
    /// live row and nothing moved.
    ///
    /// # Panics
    ///
    /// Panics if `row` is not live.
    pub fn swap_remove(&mut self, row: usize) -> Option<Id> {
        assert!(row < self.len, "swap_remove of dead row {row} (len {})", self.len);

        self.len -= 1;
        let last = self.len;
        if row == last {
            return None;
        }

        self.ids.copy_row(last, row);
        for column in &mut self.columns {
            column.copy_row(last, row);
        }
        self.id_at(row)
    }

    /// Reallocate every column to `new_capacity` rows (never below `len`),
    /// keeping the live prefix.
    pub fn reallocate(&mut self, new_capacity: usize) {
        let new_capacity = new_capacity.max(self.len).max(1);
        self.ids.reallocate(new_capacity, self.len);
        for column in &mut self.columns {
            column.reallocate(new_capacity, self.len);
        }
        self.capacity = new_capacity;
    }

    /// Shrink if the table is sparse enough under the policy.
    ///
    /// Returns `true` if a reallocation happened.
    pub fn shrink_if_sparse(&mut self) -> bool {
        let Some(target) = self.policy.shrunk(self.capacity, self.len) else {
            return false;
        };

        tracing::trace!("table shrunk {} -> {target} rows ({} live)", self.capacity, self.len);
        self.reallocate(target);
        true
    }

    /// Drop every row and return to the minimum capacity.
    pub fn reset(&mut self) {
        let capacity = self.policy.min_capacity.max(1);
        self.ids = Column::with_capacity(ColumnInfo::ids(), capacity);
        for column in &mut self.columns {
            *column = Column::with_capacity(*column.info(), capacity);
        }
        self.len = 0;
        self.capacity = capacity;
    }
}

impl fmt::Debug for DynamicArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicArray")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("columns", &self.columns.len())
            .finish()
    }
}
