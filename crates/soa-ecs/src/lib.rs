// Column storage manages raw, type-erased allocations
#![allow(unsafe_code)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::float_cmp)]

//! SoA ECS - dense struct-of-arrays component and entity storage
//!
//! Large homogeneous collections of small records packed column by column,
//! addressed by stable ids that survive row movement.
//!
//! # Key Concepts
//!
//! - **Component**: A record of fixed-width numeric fields. Every instance of a
//!   component type lives in one [`ComponentStore`], one column per field.
//! - **Id**: A stable handle, recycled lowest-first after destruction.
//! - **Row**: A slot in a column. Rows are dense and move on every destroy
//!   (swap-remove); ids are mapped to rows through a reverse index.
//! - **Entity**: A group of component references sharing one id. Ids are
//!   unique across every entity kind.
//! - **Masked view**: A component column restricted to the rows one entity kind
//!   refers to, for bulk arithmetic.
//!
//! # Access Patterns
//!
//! Two surfaces, never mixed:
//! - Type level: [`ComponentStore::column`] hands out the whole live column as
//!   a slice for vectorized work.
//! - Instance level: [`ComponentStore::get`] resolves id → row on every call.
//!
//! ```ignore
//! let mut world = World::new();
//! let pos = world.register_component(
//!     Schema::builder("Pos")
//!         .field("x", FieldType::of::<f32>())
//!         .field("y", FieldType::of::<f32>())
//!         .build()?,
//! )?;
//!
//! let id = world.create_component(pos, &[1.0f32.into(), 2.0f32.into()])?;
//! for x in world.component_mut(pos)?.column_mut::<f32>("x")? {
//!     *x += 1.0;
//! }
//! ```

mod component;
mod config;
mod entity;
mod error;
mod id;
mod index;
mod lock;
mod masked;
mod mirror;
mod schema;
mod storage;
mod value;
mod world;

pub use component::{Component, ComponentMut, ComponentStore};
pub use config::{MIN_CAPACITY, ResizePolicy, WorldConfig};
pub use entity::{BoundComponents, EntityRef, EntityStore};
pub use error::{ConfigError, SchemaError, StoreError, StoreResult};
pub use id::{Id, IdGenerator};
pub use index::ReverseIndex;
pub use lock::{TypeLock, TypeLockGuard};
pub use masked::{MaskedView, MaskedViewMut};
pub use mirror::{FieldSlot, MirrorSink, RecordLayout};
pub use schema::{
    BoundField, ComponentType, EntityKind, EntitySchema, EntitySchemaBuilder, FieldDef, FieldType,
    ScalarKind, Schema, SchemaBuilder,
};
pub use storage::{Column, ColumnInfo, DynamicArray, Fill};
pub use value::{Lanes, Scalar, Value};
pub use world::World;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ComponentType, EntityKind, EntitySchema, FieldType, Id, Schema, StoreError, StoreResult,
        Value, World,
    };
}
