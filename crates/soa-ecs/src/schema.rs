//! Field schemas for component and entity types.
//!
//! A schema is an ordered list of named, fixed-width fields declared once,
//! before any instance exists. Component fields hold numeric scalars, vectors
//! or matrices; entity fields hold references to component instances.

use std::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::{error::SchemaError, value::Scalar};

/// Identifier of a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentType(u32);

impl ComponentType {
    /// Create a component type id from a raw value.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({})", self.0)
    }
}

/// Identifier of a registered entity kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKind(u32);

impl EntityKind {
    /// Create an entity kind id from a raw value.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKind({})", self.0)
    }
}

/// Numeric element type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    F32,
    F64,
    I32,
    I64,
    U32,
    U8,
}

impl ScalarKind {
    /// Size of one scalar in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::F64 | Self::I64 => 8,
            Self::U8 => 1,
        }
    }

    /// Alignment of one scalar in bytes.
    #[must_use]
    pub const fn align(self) -> usize {
        self.size()
    }
}

/// Fixed-width semantic type of one component field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// One scalar per row.
    Scalar(ScalarKind),
    /// `dims` scalars per row.
    Vector {
        /// Element type.
        kind: ScalarKind,
        /// Number of lanes.
        dims: u32,
    },
    /// `rows * cols` scalars per row, row-major.
    Matrix {
        /// Element type.
        kind: ScalarKind,
        /// Matrix rows.
        rows: u32,
        /// Matrix columns.
        cols: u32,
    },
}

impl FieldType {
    /// A scalar field of type `T`.
    #[must_use]
    pub const fn of<T: Scalar>() -> Self {
        Self::Scalar(T::KIND)
    }

    /// A vector field of `dims` lanes of type `T`.
    #[must_use]
    pub const fn vector_of<T: Scalar>(dims: u32) -> Self {
        Self::Vector {
            kind: T::KIND,
            dims,
        }
    }

    /// A `rows x cols` matrix field of type `T`.
    #[must_use]
    pub const fn matrix_of<T: Scalar>(rows: u32, cols: u32) -> Self {
        Self::Matrix {
            kind: T::KIND,
            rows,
            cols,
        }
    }

    /// Two-lane `f32` vector.
    #[must_use]
    pub const fn vec2() -> Self {
        Self::vector_of::<f32>(2)
    }

    /// Three-lane `f32` vector.
    #[must_use]
    pub const fn vec3() -> Self {
        Self::vector_of::<f32>(3)
    }

    /// Four-lane `f32` vector.
    #[must_use]
    pub const fn vec4() -> Self {
        Self::vector_of::<f32>(4)
    }

    /// 2x2 `f32` matrix.
    #[must_use]
    pub const fn mat2() -> Self {
        Self::matrix_of::<f32>(2, 2)
    }

    /// 3x3 `f32` matrix.
    #[must_use]
    pub const fn mat3() -> Self {
        Self::matrix_of::<f32>(3, 3)
    }

    /// 4x4 `f32` matrix.
    #[must_use]
    pub const fn mat4() -> Self {
        Self::matrix_of::<f32>(4, 4)
    }

    /// Element type.
    #[must_use]
    pub const fn kind(self) -> ScalarKind {
        match self {
            Self::Scalar(kind) | Self::Vector { kind, .. } | Self::Matrix { kind, .. } => kind,
        }
    }

    /// Scalars per row.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Vector { dims, .. } => dims as usize,
            Self::Matrix { rows, cols, .. } => rows as usize * cols as usize,
        }
    }

    /// Bytes per row.
    #[must_use]
    pub const fn size(self) -> usize {
        self.kind().size() * self.width()
    }
}

/// One named component field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: FieldType,
}

/// Ordered, immutable field layout of a component type.
#[derive(Clone)]
pub struct Schema {
    name: String,
    fields: SmallVec<[FieldDef; 8]>,
    indices: HashMap<String, usize>,
}

impl Schema {
    /// Start declaring a component type.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false; a schema without fields is rejected at build time.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field in declaration order.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.field_index(name).map(|idx| &self.fields[idx])
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<(String, FieldType)>,
}

impl SchemaBuilder {
    /// Append a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    /// Validate and freeze the layout.
    pub fn build(self) -> Result<Schema, SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::NoFields(self.name));
        }

        let mut indices = HashMap::with_capacity(self.fields.len());
        let mut fields = SmallVec::with_capacity(self.fields.len());

        for (idx, (name, ty)) in self.fields.into_iter().enumerate() {
            if ty.width() == 0 {
                return Err(SchemaError::ZeroWidth {
                    ty: self.name,
                    field: name,
                });
            }
            if indices.insert(name.clone(), idx).is_some() {
                return Err(SchemaError::DuplicateField {
                    ty: self.name,
                    field: name,
                });
            }
            fields.push(FieldDef { name, ty });
        }

        Ok(Schema {
            name: self.name,
            fields,
            indices,
        })
    }
}

/// One named reference from an entity kind to a component type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundField {
    /// Field name.
    pub name: String,
    /// Component type the field refers to.
    pub component: ComponentType,
}

/// Ordered, immutable layout of an entity kind.
#[derive(Clone)]
pub struct EntitySchema {
    name: String,
    fields: SmallVec<[BoundField; 8]>,
    indices: HashMap<String, usize>,
}

impl EntitySchema {
    /// Start declaring an entity kind.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Kind name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[BoundField] {
        &self.fields
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false; an entity kind without fields is rejected at build time.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field in declaration order.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    /// First field referring to `component`.
    #[must_use]
    pub fn field_for(&self, component: ComponentType) -> Option<usize> {
        self.fields.iter().position(|f| f.component == component)
    }
}

impl fmt::Debug for EntitySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Builder for [`EntitySchema`].
#[derive(Debug, Clone)]
pub struct EntitySchemaBuilder {
    name: String,
    fields: Vec<(String, ComponentType)>,
}

impl EntitySchemaBuilder {
    /// Append a reference field.
    #[must_use]
    pub fn component(mut self, name: impl Into<String>, component: ComponentType) -> Self {
        self.fields.push((name.into(), component));
        self
    }

    /// Validate names and freeze the layout.
    ///
    /// Whether each referenced component type exists is checked when the
    /// kind is registered with a [`World`](crate::World).
    pub fn build(self) -> Result<EntitySchema, SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::NoFields(self.name));
        }

        let mut indices = HashMap::with_capacity(self.fields.len());
        let mut fields = SmallVec::with_capacity(self.fields.len());

        for (idx, (name, component)) in self.fields.into_iter().enumerate() {
            if indices.insert(name.clone(), idx).is_some() {
                return Err(SchemaError::DuplicateField {
                    ty: self.name,
                    field: name,
                });
            }
            fields.push(BoundField { name, component });
        }

        Ok(EntitySchema {
            name: self.name,
            fields,
            indices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_widths() {
        assert_eq!(FieldType::of::<f64>().width(), 1);
        assert_eq!(FieldType::vec3().width(), 3);
        assert_eq!(FieldType::mat4().width(), 16);
        assert_eq!(FieldType::mat3().size(), 36);
        assert_eq!(FieldType::vector_of::<u8>(4).size(), 4);
        assert_eq!(FieldType::vector_of::<i64>(2).kind(), ScalarKind::I64);
    }

    #[test]
    fn test_schema_order_and_lookup() {
        let schema = Schema::builder("Physical")
            .field("pos", FieldType::vec2())
            .field("mass", FieldType::of::<f32>())
            .build()
            .unwrap();

        assert_eq!(schema.name(), "Physical");
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.fields()[0].name, "pos");
        assert_eq!(schema.field_index("mass"), Some(1));
        assert_eq!(schema.field("pos").unwrap().ty, FieldType::vec2());
        assert!(schema.field("vel").is_none());
    }

    #[test]
    fn test_schema_without_fields_rejected() {
        let err = Schema::builder("Empty").build().unwrap_err();
        assert_eq!(err, SchemaError::NoFields("Empty".into()));

        let err = EntitySchema::builder("Nothing").build().unwrap_err();
        assert_eq!(err, SchemaError::NoFields("Nothing".into()));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Schema::builder("Twice")
            .field("x", FieldType::of::<f32>())
            .field("x", FieldType::of::<f64>())
            .build()
            .unwrap_err();

        assert!(matches!(err, SchemaError::DuplicateField { field, .. } if field == "x"));
    }

    #[test]
    fn test_zero_width_rejected() {
        let err = Schema::builder("Flat")
            .field("v", FieldType::vector_of::<f32>(0))
            .build()
            .unwrap_err();

        assert!(matches!(err, SchemaError::ZeroWidth { .. }));
    }

    #[test]
    fn test_entity_schema_lookup() {
        let physical = ComponentType::from_raw(0);
        let motion = ComponentType::from_raw(1);

        let schema = EntitySchema::builder("MovingObject")
            .component("physical", physical)
            .component("motion", motion)
            .build()
            .unwrap();

        assert_eq!(schema.field_index("motion"), Some(1));
        assert_eq!(schema.field_for(physical), Some(0));
        assert_eq!(schema.field_for(ComponentType::from_raw(7)), None);
    }
}
