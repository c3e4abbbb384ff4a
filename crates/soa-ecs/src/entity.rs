//! Entities: named groups of component references under one shared id.
//!
//! Every entity kind has its own [`DynamicArray`] with one `u32` reference
//! column per declared field, but ids come from a single generator and one
//! global index maps each id to its `(kind, row)`. A bare id can therefore be
//! resolved without knowing its kind.

use std::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::{
    config::ResizePolicy,
    error::{SchemaError, StoreError, StoreResult},
    id::{Id, IdGenerator},
    index::{self, ReverseIndex},
    lock::TypeLock,
    schema::{BoundField, ComponentType, EntityKind, EntitySchema},
    storage::{ColumnInfo, DynamicArray},
};

/// Reference column value of an unbound field.
const ABSENT: u32 = u32::MAX;

/// Component instances bound to one entity, as `(type, id)` pairs.
pub type BoundComponents = SmallVec<[(ComponentType, Id); 8]>;

/// Where a live entity is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct EntitySlot {
    kind: EntityKind,
    row: usize,
}

struct KindTable {
    schema: EntitySchema,
    table: DynamicArray,
}

impl KindTable {
    /// Live reference column of one field.
    fn references(&self, field: usize) -> &[u32] {
        let end = self.table.len() * std::mem::size_of::<u32>();
        bytemuck::cast_slice(&self.table.column(field).as_bytes()[..end])
    }

    fn reference(&self, field: usize, row: usize) -> Option<Id> {
        resolve(self.references(field)[row])
    }

    fn bound(&self, row: usize) -> BoundComponents {
        self.schema
            .fields()
            .iter()
            .enumerate()
            .filter_map(|(idx, field)| Some((field.component, self.reference(idx, row)?)))
            .collect()
    }

    fn field_index(&self, field: &str) -> StoreResult<usize> {
        self.schema
            .field_index(field)
            .ok_or_else(|| StoreError::UnknownField {
                ty: self.schema.name().to_owned(),
                field: field.to_owned(),
            })
    }
}

fn resolve(raw: u32) -> Option<Id> {
    (raw != ABSENT).then(|| Id::from_raw(raw))
}

/// Storage for every entity of every kind.
pub struct EntityStore {
    ids: IdGenerator,
    /// Id → (kind, row), shared by all kinds.
    slots: ReverseIndex<EntitySlot>,
    kinds: Vec<KindTable>,
    names: HashMap<String, EntityKind>,
    existing: usize,
    policy: ResizePolicy,
    lock: TypeLock,
}

impl EntityStore {
    /// Create a store with no kinds registered.
    #[must_use]
    pub fn new(policy: ResizePolicy) -> Self {
        Self {
            ids: IdGenerator::new(),
            slots: ReverseIndex::with_len(policy.min_capacity),
            kinds: Vec::new(),
            names: HashMap::new(),
            existing: 0,
            policy,
            lock: TypeLock::new(),
        }
    }

    /// Register an entity kind.
    ///
    /// Referenced component types are not checked here; see
    /// [`World::register_entity`](crate::World::register_entity).
    pub fn register(&mut self, schema: EntitySchema) -> Result<EntityKind, SchemaError> {
        if self.names.contains_key(schema.name()) {
            return Err(SchemaError::DuplicateType(schema.name().to_owned()));
        }

        let kind = EntityKind::from_raw(self.kinds.len() as u32);

        tracing::debug!("registered entity kind {} as {kind:?}", schema.name());

        let table = DynamicArray::new(
            std::iter::repeat_n(ColumnInfo::ids(), schema.len()),
            self.policy,
        );
        self.names.insert(schema.name().to_owned(), kind);
        self.kinds.push(KindTable { schema, table });
        Ok(kind)
    }

    /// Look up a kind by name.
    #[must_use]
    pub fn kind(&self, name: &str) -> Option<EntityKind> {
        self.names.get(name).copied()
    }

    /// Layout of a kind.
    #[must_use]
    pub fn schema(&self, kind: EntityKind) -> Option<&EntitySchema> {
        self.table(kind).ok().map(|t| &t.schema)
    }

    /// Every registered kind, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> {
        (0..self.kinds.len()).map(|idx| EntityKind::from_raw(idx as u32))
    }

    /// The advisory lock for the entity base type.
    #[must_use]
    pub const fn lock(&self) -> &TypeLock {
        &self.lock
    }

    /// Live entities across every kind.
    #[must_use]
    pub const fn existing(&self) -> usize {
        self.existing
    }

    /// Live entities of one kind.
    pub fn kind_len(&self, kind: EntityKind) -> StoreResult<usize> {
        Ok(self.table(kind)?.table.len())
    }

    /// Allocated rows of one kind's table.
    pub fn kind_capacity(&self, kind: EntityKind) -> StoreResult<usize> {
        Ok(self.table(kind)?.table.capacity())
    }

    /// Ids covered by the global index.
    #[must_use]
    pub fn index_len(&self) -> usize {
        self.slots.len()
    }

    /// Create an entity of `kind` bound to `components`, one per field in
    /// schema order. Missing trailing fields are left unbound.
    ///
    /// Whether the component ids are live is not checked here.
    pub fn create(&mut self, kind: EntityKind, components: &[Id]) -> StoreResult<Id> {
        let fields = self.table(kind)?.schema.len();
        if components.len() > fields {
            return Err(StoreError::TooManyValues {
                ty: self.table(kind)?.schema.name().to_owned(),
                expected: fields,
                found: components.len(),
            });
        }

        let id = self.ids.allocate();
        let kind_table = &mut self.kinds[kind.as_raw() as usize];
        let row = kind_table.table.append(id);
        for (idx, component) in components.iter().enumerate() {
            kind_table
                .table
                .column_mut(idx)
                .write_row(row, bytemuck::bytes_of(component));
        }

        self.slots.insert(id, EntitySlot { kind, row }, &self.policy);
        self.existing += 1;
        Ok(id)
    }

    /// Check if `id` names a live entity.
    #[must_use]
    pub fn contains(&self, id: Id) -> bool {
        self.slots.contains(id)
    }

    /// Kind of a live entity.
    #[must_use]
    pub fn kind_of(&self, id: Id) -> Option<EntityKind> {
        self.slots.get(id).map(|slot| slot.kind)
    }

    /// Look up an entity of any kind.
    #[must_use]
    pub fn get(&self, id: Id) -> Option<EntityRef<'_>> {
        let slot = self.slots.get(id)?;
        Some(EntityRef {
            table: &self.kinds[slot.kind.as_raw() as usize],
            id,
            kind: slot.kind,
            row: slot.row,
        })
    }

    /// Look up an entity, only if it is of `kind`.
    #[must_use]
    pub fn get_of_kind(&self, kind: EntityKind, id: Id) -> Option<EntityRef<'_>> {
        self.get(id).filter(|entity| entity.kind == kind)
    }

    /// Components bound to a live entity.
    #[must_use]
    pub fn bound_components(&self, id: Id) -> Option<BoundComponents> {
        let slot = self.slots.get(id)?;
        Some(self.kinds[slot.kind.as_raw() as usize].bound(slot.row))
    }

    /// Point one field of a live entity at another component instance.
    ///
    /// Returns `false` if the entity is not live. The previously bound
    /// instance is left alone.
    pub fn bind(&mut self, id: Id, field: &str, component: Id) -> StoreResult<bool> {
        let Some(slot) = self.slots.get(id) else {
            return Ok(false);
        };

        let kind_table = &mut self.kinds[slot.kind.as_raw() as usize];
        let idx = kind_table.field_index(field)?;
        kind_table
            .table
            .column_mut(idx)
            .write_row(slot.row, bytemuck::bytes_of(&component));
        Ok(true)
    }

    /// Remove one entity's row. Its components are not touched.
    ///
    /// Returns `false`, doing nothing, if `id` is not live.
    pub fn remove(&mut self, id: Id) -> bool {
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };

        let table = &mut self.kinds[slot.kind.as_raw() as usize].table;
        if let Some(moved) = table.swap_remove(slot.row) {
            self.slots.update(moved, slot);
        }
        self.ids.recycle(id);
        self.existing -= 1;

        table.shrink_if_sparse();
        index::trim(&mut self.slots, &mut self.ids, &self.policy);
        true
    }

    /// Remove every entity of one kind, returning the components they were
    /// bound to.
    pub fn drain_kind(&mut self, kind: EntityKind) -> StoreResult<Vec<(ComponentType, Id)>> {
        let kind_table = self.table(kind)?;
        let drained = kind_table.table.len();
        let bound: Vec<_> = (0..drained).flat_map(|row| kind_table.bound(row)).collect();

        tracing::debug!("clearing entity kind {} ({drained} live)", kind_table.schema.name());

        let kind_table = &mut self.kinds[kind.as_raw() as usize];
        for &id in kind_table.table.ids() {
            self.slots.remove(id);
            self.ids.recycle(id);
        }
        kind_table.table.reset();
        self.existing -= drained;

        index::trim(&mut self.slots, &mut self.ids, &self.policy);
        Ok(bound)
    }

    /// Remove every entity of every kind and reset the shared id space.
    pub fn reset(&mut self) {
        tracing::debug!("clearing all entities ({} live)", self.existing);

        for kind_table in &mut self.kinds {
            kind_table.table.reset();
        }
        self.ids.reset();
        self.slots.reset(self.policy.min_capacity);
        self.existing = 0;
    }

    /// Every live entity id of every kind, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<Id> {
        self.slots.iter().map(|(id, _)| id).collect()
    }

    /// Live ids of one kind, in row order.
    pub fn kind_ids(&self, kind: EntityKind) -> StoreResult<&[Id]> {
        Ok(self.table(kind)?.table.ids())
    }

    /// The reference column of one field of a kind, in row order.
    ///
    /// Unbound entries are `None`.
    pub fn component_ids(
        &self,
        kind: EntityKind,
        field: &str,
    ) -> StoreResult<impl Iterator<Item = Option<Id>> + '_> {
        let kind_table = self.table(kind)?;
        let idx = kind_table.field_index(field)?;
        Ok(kind_table.references(idx).iter().map(|&raw| resolve(raw)))
    }

    /// First field of `kind` that refers to `component`, by name.
    pub fn field_for(&self, kind: EntityKind, component: ComponentType) -> StoreResult<Option<&str>> {
        let schema = &self.table(kind)?.schema;
        Ok(schema
            .field_for(component)
            .map(|idx| schema.fields()[idx].name.as_str()))
    }

    fn table(&self, kind: EntityKind) -> StoreResult<&KindTable> {
        self.kinds
            .get(kind.as_raw() as usize)
            .ok_or(StoreError::UnknownEntityKind(kind))
    }
}

impl fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("kinds", &self.kinds.len())
            .field("existing", &self.existing)
            .field("index_len", &self.slots.len())
            .finish_non_exhaustive()
    }
}

/// Read access to one live entity.
#[derive(Clone, Copy)]
pub struct EntityRef<'a> {
    table: &'a KindTable,
    id: Id,
    kind: EntityKind,
    row: usize,
}

impl<'a> EntityRef<'a> {
    /// The entity id.
    #[must_use]
    pub const fn id(&self) -> Id {
        self.id
    }

    /// The entity's kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Name of the entity's kind.
    #[must_use]
    pub fn kind_name(&self) -> &'a str {
        self.table.schema.name()
    }

    /// Component bound to a field, `None` if unbound.
    pub fn component(&self, field: &str) -> StoreResult<Option<Id>> {
        let idx = self.table.field_index(field)?;
        Ok(self.table.reference(idx, self.row))
    }

    /// Component bound to the first field of type `component`.
    #[must_use]
    pub fn component_of(&self, component: ComponentType) -> Option<Id> {
        let idx = self.table.schema.field_for(component)?;
        self.table.reference(idx, self.row)
    }

    /// Every field and its binding, in schema order.
    pub fn components(&self) -> impl Iterator<Item = (&'a BoundField, Option<Id>)> + 'a {
        let (table, row) = (self.table, self.row);
        table
            .schema
            .fields()
            .iter()
            .enumerate()
            .map(move |(idx, field)| (field, table.reference(idx, row)))
    }
}

impl fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.kind_name());
        s.field("id", &self.id);
        for (field, component) in self.components() {
            s.field(&field.name, &component);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_CAPACITY;

    const PHYSICAL: ComponentType = ComponentType::from_raw(0);
    const MOTION: ComponentType = ComponentType::from_raw(1);

    fn store() -> (EntityStore, EntityKind, EntityKind) {
        let mut store = EntityStore::new(ResizePolicy::entity());
        let moving = store
            .register(
                EntitySchema::builder("MovingObject")
                    .component("physical", PHYSICAL)
                    .component("motion", MOTION)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let fixed = store
            .register(
                EntitySchema::builder("StaticObject")
                    .component("physical", PHYSICAL)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        (store, moving, fixed)
    }

    fn c(raw: u32) -> Id {
        Id::from_raw(raw)
    }

    #[test]
    fn test_ids_shared_across_kinds() {
        let (mut store, moving, fixed) = store();

        for i in 0..5 {
            store.create(moving, &[c(i), c(100 + i)]).unwrap();
        }
        for i in 0..5 {
            store.create(fixed, &[c(5 + i)]).unwrap();
        }

        assert_eq!(store.kind_ids(moving).unwrap(), &[c(0), c(1), c(2), c(3), c(4)]);
        assert_eq!(store.kind_ids(fixed).unwrap(), &[c(5), c(6), c(7), c(8), c(9)]);
        assert_eq!(store.ids(), (0..10).map(c).collect::<Vec<_>>());
        assert_eq!(store.existing(), 10);
    }

    #[test]
    fn test_get_dispatches_by_id() {
        let (mut store, moving, fixed) = store();
        let a = store.create(moving, &[c(10), c(20)]).unwrap();
        let b = store.create(fixed, &[c(30)]).unwrap();

        let entity = store.get(b).unwrap();
        assert_eq!(entity.kind(), fixed);
        assert_eq!(entity.kind_name(), "StaticObject");
        assert_eq!(entity.component("physical").unwrap(), Some(c(30)));

        assert_eq!(store.get(a).unwrap().component_of(MOTION), Some(c(20)));
        assert!(store.get_of_kind(moving, b).is_none());
        assert!(store.get(c(77)).is_none());
    }

    #[test]
    fn test_unbound_fields() {
        let (mut store, moving, _) = store();
        let id = store.create(moving, &[c(3)]).unwrap();

        let entity = store.get(id).unwrap();
        assert_eq!(entity.component("motion").unwrap(), None);
        assert!(matches!(
            entity.component("velocity"),
            Err(StoreError::UnknownField { .. })
        ));
        assert_eq!(
            store.bound_components(id).unwrap().as_slice(),
            &[(PHYSICAL, c(3))]
        );
    }

    #[test]
    fn test_create_errors() {
        let (mut store, _, fixed) = store();

        assert!(matches!(
            store.create(fixed, &[c(0), c(1)]),
            Err(StoreError::TooManyValues { .. })
        ));
        assert!(matches!(
            store.create(EntityKind::from_raw(9), &[]),
            Err(StoreError::UnknownEntityKind(_))
        ));
        assert_eq!(store.existing(), 0);
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let (mut store, _, _) = store();
        let again = EntitySchema::builder("StaticObject")
            .component("physical", PHYSICAL)
            .build()
            .unwrap();

        assert_eq!(
            store.register(again),
            Err(SchemaError::DuplicateType("StaticObject".into()))
        );
        assert_eq!(store.kind("MovingObject"), Some(EntityKind::from_raw(0)));
    }

    #[test]
    fn test_remove_patches_moved_slot() {
        let (mut store, moving, fixed) = store();
        let a = store.create(moving, &[c(0), c(1)]).unwrap();
        let b = store.create(moving, &[c(2), c(3)]).unwrap();
        let d = store.create(moving, &[c(4), c(5)]).unwrap();

        assert!(store.remove(a));
        assert!(!store.remove(a));

        assert!(store.get(a).is_none());
        assert_eq!(store.get(d).unwrap().component("motion").unwrap(), Some(c(5)));
        assert_eq!(store.get(b).unwrap().component("physical").unwrap(), Some(c(2)));
        assert_eq!(store.existing(), 2);

        // Lowest id is reissued, across kinds.
        assert_eq!(store.create(fixed, &[]).unwrap(), a);
    }

    #[test]
    fn test_bind() {
        let (mut store, moving, _) = store();
        let id = store.create(moving, &[c(1)]).unwrap();

        assert!(store.bind(id, "motion", c(9)).unwrap());
        assert_eq!(store.get(id).unwrap().component("motion").unwrap(), Some(c(9)));

        assert!(store.bind(id, "nope", c(9)).is_err());
        assert!(!store.bind(c(40), "motion", c(9)).unwrap());
    }

    #[test]
    fn test_component_ids_column() {
        let (mut store, moving, _) = store();
        store.create(moving, &[c(7), c(8)]).unwrap();
        store.create(moving, &[c(9)]).unwrap();

        let physical: Vec<_> = store.component_ids(moving, "physical").unwrap().collect();
        let motion: Vec<_> = store.component_ids(moving, "motion").unwrap().collect();

        assert_eq!(physical, vec![Some(c(7)), Some(c(9))]);
        assert_eq!(motion, vec![Some(c(8)), None]);
        assert_eq!(store.field_for(moving, MOTION).unwrap(), Some("motion"));
    }

    #[test]
    fn test_drain_kind_leaves_other_kinds() {
        let (mut store, moving, fixed) = store();
        for i in 0..3 {
            store.create(moving, &[c(i), c(10 + i)]).unwrap();
        }
        let kept = store.create(fixed, &[c(20)]).unwrap();

        let mut bound = store.drain_kind(moving).unwrap();
        bound.sort();

        assert_eq!(bound.len(), 6);
        assert_eq!(bound[0], (PHYSICAL, c(0)));
        assert_eq!(bound[5], (MOTION, c(12)));
        assert_eq!(store.kind_len(moving).unwrap(), 0);
        assert_eq!(store.existing(), 1);
        assert_eq!(store.ids(), vec![kept]);
        assert!(store.get(kept).is_some());

        // Freed ids below the survivor are reused first.
        assert_eq!(store.create(moving, &[]).unwrap(), c(0));
    }

    #[test]
    fn test_reset() {
        let (mut store, moving, fixed) = store();
        for _ in 0..30 {
            store.create(moving, &[]).unwrap();
            store.create(fixed, &[]).unwrap();
        }

        store.reset();

        assert_eq!(store.existing(), 0);
        assert!(store.ids().is_empty());
        assert_eq!(store.kind_capacity(moving).unwrap(), MIN_CAPACITY);
        assert_eq!(store.index_len(), MIN_CAPACITY);
        assert_eq!(store.create(fixed, &[]).unwrap(), c(0));
    }

    #[test]
    fn test_index_trimmed_after_churn() {
        let (mut store, moving, _) = store();
        for _ in 0..30 {
            store.create(moving, &[]).unwrap();
        }
        assert_eq!(store.index_len(), 36);

        // Trims fire as the largest live id drops to 20, then to 11.
        for raw in (8..30).rev() {
            assert!(store.remove(c(raw)));
        }

        assert_eq!(store.index_len(), 12);
        assert_eq!(store.existing(), 8);
        assert_eq!(store.ids(), (0..8).map(c).collect::<Vec<_>>());

        let reissued: Vec<_> = (0..5).map(|_| store.create(moving, &[]).unwrap()).collect();
        assert_eq!(reissued, (8..13).map(c).collect::<Vec<_>>());
        assert_eq!(store.kind_of(c(12)), Some(moving));
    }

    #[test]
    fn test_kind_tables_shrink_independently() {
        let (mut store, moving, fixed) = store();
        let ids: Vec<_> = (0..40).map(|_| store.create(moving, &[]).unwrap()).collect();
        store.create(fixed, &[]).unwrap();
        let grown = store.kind_capacity(moving).unwrap();

        for &id in &ids[4..] {
            store.remove(id);
        }

        assert!(store.kind_capacity(moving).unwrap() < grown);
        assert_eq!(store.kind_capacity(fixed).unwrap(), MIN_CAPACITY);
        assert_eq!(store.kind_len(moving).unwrap(), 4);
    }
}
