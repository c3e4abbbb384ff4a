//! Fixed byte layout of component records, for mirroring stores outside the
//! process.
//!
//! A record is every field of a row, packed in schema order with no padding,
//! followed by the row's id as a native-endian `u32`.

use smallvec::SmallVec;

use crate::schema::{FieldType, ScalarKind, Schema};

/// Position of one field inside a packed record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSlot {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: FieldType,
    /// Byte offset from the start of the record.
    pub offset: usize,
    /// Bytes occupied.
    pub size: usize,
}

/// Packed layout of one component type's records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    fields: SmallVec<[FieldSlot; 8]>,
    id_offset: usize,
    itemsize: usize,
}

impl RecordLayout {
    /// Compute the layout for a schema.
    #[must_use]
    pub fn of(schema: &Schema) -> Self {
        let mut offset = 0;
        let fields = schema
            .fields()
            .iter()
            .map(|field| {
                let slot = FieldSlot {
                    name: field.name.clone(),
                    ty: field.ty,
                    offset,
                    size: field.ty.size(),
                };
                offset += slot.size;
                slot
            })
            .collect();

        Self {
            fields,
            id_offset: offset,
            itemsize: offset + ScalarKind::U32.size(),
        }
    }

    /// Field slots in schema order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSlot] {
        &self.fields
    }

    /// Slot of a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSlot> {
        self.fields.iter().find(|slot| slot.name == name)
    }

    /// Byte offset of the trailing id.
    #[must_use]
    pub const fn id_offset(&self) -> usize {
        self.id_offset
    }

    /// Bytes per record.
    #[must_use]
    pub const fn itemsize(&self) -> usize {
        self.itemsize
    }
}

/// Receiver of mirror lifecycle events.
///
/// `allocate` is called once per component type before records are
/// published, `free` once when mirroring stops.
pub trait MirrorSink {
    /// Reserve room for `capacity` records of `layout` under `name`.
    fn allocate(&mut self, name: &str, layout: &RecordLayout, capacity: usize);

    /// Release everything reserved under `name`.
    fn free(&mut self, name: &str);
}
