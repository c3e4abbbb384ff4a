//! Error types.
//!
//! Lookups of absent records are not errors; they return `None`. These enums
//! cover definition-time schema violations and misuse of the typed accessors.

use thiserror::Error;

use crate::{
    id::Id,
    schema::{ComponentType, EntityKind, FieldType, ScalarKind},
};

/// A component or entity type definition was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The type declares no fields.
    #[error("type `{0}` declares no fields")]
    NoFields(String),

    /// Two fields share a name.
    #[error("type `{ty}` declares field `{field}` more than once")]
    DuplicateField {
        /// Type being defined.
        ty: String,
        /// Repeated field name.
        field: String,
    },

    /// A type with this name is already registered.
    #[error("a type named `{0}` is already registered")]
    DuplicateType(String),

    /// A vector or matrix field has a zero dimension.
    #[error("field `{field}` of `{ty}` has zero width")]
    ZeroWidth {
        /// Type being defined.
        ty: String,
        /// Offending field.
        field: String,
    },

    /// An entity field refers to something that is not a registered component type.
    #[error("entity `{kind}` field `{field}` references unregistered component {component:?}")]
    UnknownComponent {
        /// Entity kind being defined.
        kind: String,
        /// Offending field.
        field: String,
        /// The unregistered component type.
        component: ComponentType,
    },
}

/// Misuse of a store's typed API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No field with this name in the type's schema.
    #[error("`{ty}` has no field named `{field}`")]
    UnknownField {
        /// Type that was accessed.
        ty: String,
        /// Requested field name.
        field: String,
    },

    /// Scalar type of the accessor does not match the field.
    #[error("field `{field}` is {expected:?}, accessed as {found:?}")]
    KindMismatch {
        /// Field name.
        field: String,
        /// Declared field type.
        expected: FieldType,
        /// Scalar kind the caller used.
        found: ScalarKind,
    },

    /// Number of scalars supplied does not fit the field.
    #[error("field `{field}` takes {expected} scalars per row, got {found}")]
    WidthMismatch {
        /// Field name.
        field: String,
        /// Scalars expected.
        expected: usize,
        /// Scalars supplied.
        found: usize,
    },

    /// More constructor values than fields.
    #[error("`{ty}` has {expected} fields, got {found} values")]
    TooManyValues {
        /// Type being constructed.
        ty: String,
        /// Field count.
        expected: usize,
        /// Values supplied.
        found: usize,
    },

    /// The component type is not registered in this world.
    #[error("unknown component type {0:?}")]
    UnknownComponentType(ComponentType),

    /// The entity kind is not registered in this world.
    #[error("unknown entity kind {0:?}")]
    UnknownEntityKind(EntityKind),

    /// An entity was bound to a component instance that does not exist.
    #[error("field `{field}` bound to component {id} which does not exist")]
    DanglingComponent {
        /// Entity field name.
        field: String,
        /// Component id that was not found.
        id: Id,
    },
}

/// Invalid [`ResizePolicy`](crate::ResizePolicy) settings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// `min_capacity` must be at least 1.
    #[error("min_capacity must be non-zero")]
    ZeroMinCapacity,

    /// Growth must strictly enlarge a table.
    #[error("growth_factor must be greater than 1, got {0}")]
    GrowthFactor(f64),

    /// A shrink must leave room for every live row.
    #[error("shrink_target must be at least 1, got {0}")]
    ShrinkTarget(f64),

    /// Shrinking right back to the threshold would thrash.
    #[error("shrink_threshold {threshold} must exceed shrink_target {target}")]
    ShrinkThreshold {
        /// Configured threshold.
        threshold: f64,
        /// Configured target.
        target: f64,
    },

    /// Index trimming must only fire on a strictly oversized index.
    #[error("index_trim_threshold must be greater than 1, got {0}")]
    IndexTrimThreshold(f64),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
