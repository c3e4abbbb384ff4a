//! The world: every component store plus the entity store.

use std::fmt;

use hashbrown::HashMap;

use crate::{
    component::{Component, ComponentStore},
    config::WorldConfig,
    entity::{EntityRef, EntityStore},
    error::{ConfigError, SchemaError, StoreError, StoreResult},
    id::Id,
    masked::{MaskedView, MaskedViewMut},
    mirror::MirrorSink,
    schema::{ComponentType, EntityKind, EntitySchema, Schema},
    value::Value,
};

/// Registry of component stores and the entity store that binds them.
///
/// Component types and entity kinds are registered once, up front. Stores are
/// addressed by the [`ComponentType`] and [`EntityKind`] handles returned at
/// registration.
pub struct World {
    components: Vec<ComponentStore>,
    component_names: HashMap<String, ComponentType>,
    entities: EntityStore,
    config: WorldConfig,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create an empty world with default resize policies.
    #[must_use]
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Create an empty world with custom resize policies.
    pub fn with_config(config: WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        Self {
            components: Vec::new(),
            component_names: HashMap::new(),
            entities: EntityStore::new(config.entities),
            config,
        }
    }

    /// Resize policies in effect.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    // ==================== Registration ====================

    /// Register a component type.
    pub fn register_component(&mut self, schema: Schema) -> Result<ComponentType, SchemaError> {
        if self.component_names.contains_key(schema.name()) {
            return Err(SchemaError::DuplicateType(schema.name().to_owned()));
        }

        let ty = ComponentType::from_raw(self.components.len() as u32);
        tracing::debug!("registered component {} as {ty:?}", schema.name());

        self.component_names.insert(schema.name().to_owned(), ty);
        self.components
            .push(ComponentStore::new(schema, self.config.components));
        Ok(ty)
    }

    /// Register an entity kind. Every field must refer to a registered
    /// component type.
    pub fn register_entity(&mut self, schema: EntitySchema) -> Result<EntityKind, SchemaError> {
        for field in schema.fields() {
            if self.store(field.component).is_err() {
                return Err(SchemaError::UnknownComponent {
                    kind: schema.name().to_owned(),
                    field: field.name.clone(),
                    component: field.component,
                });
            }
        }
        self.entities.register(schema)
    }

    /// Look up a component type by name.
    #[must_use]
    pub fn component_type(&self, name: &str) -> Option<ComponentType> {
        self.component_names.get(name).copied()
    }

    /// Look up an entity kind by name.
    #[must_use]
    pub fn entity_kind(&self, name: &str) -> Option<EntityKind> {
        self.entities.kind(name)
    }

    // ==================== Components ====================

    /// The store of one component type.
    pub fn component(&self, ty: ComponentType) -> StoreResult<&ComponentStore> {
        self.store(ty)
    }

    /// The store of one component type, mutably.
    pub fn component_mut(&mut self, ty: ComponentType) -> StoreResult<&mut ComponentStore> {
        self.components
            .get_mut(ty.as_raw() as usize)
            .ok_or(StoreError::UnknownComponentType(ty))
    }

    /// Every component store, in registration order.
    pub fn components(&self) -> impl Iterator<Item = (ComponentType, &ComponentStore)> {
        self.components
            .iter()
            .enumerate()
            .map(|(idx, store)| (ComponentType::from_raw(idx as u32), store))
    }

    /// Create a component instance. See [`ComponentStore::create`].
    pub fn create_component(&mut self, ty: ComponentType, values: &[Value]) -> StoreResult<Id> {
        self.component_mut(ty)?.create(values)
    }

    /// Destroy a component instance. Entities bound to it are left dangling
    /// and resolve it as absent.
    pub fn destroy_component(&mut self, ty: ComponentType, id: Id) -> StoreResult<bool> {
        Ok(self.component_mut(ty)?.destroy(id))
    }

    /// Destroy every instance of one component type.
    pub fn clear_component(&mut self, ty: ComponentType) -> StoreResult<()> {
        self.component_mut(ty)?.clear();
        Ok(())
    }

    // ==================== Entities ====================

    /// The entity store.
    #[must_use]
    pub const fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Create an entity bound to live component instances, one per field in
    /// schema order.
    pub fn create_entity(&mut self, kind: EntityKind, components: &[Id]) -> StoreResult<Id> {
        let schema = self
            .entities
            .schema(kind)
            .ok_or(StoreError::UnknownEntityKind(kind))?;

        for (field, &id) in schema.fields().iter().zip(components) {
            if !self.store(field.component)?.contains(id) {
                return Err(StoreError::DanglingComponent {
                    field: field.name.clone(),
                    id,
                });
            }
        }
        self.entities.create(kind, components)
    }

    /// Look up an entity of any kind.
    #[must_use]
    pub fn entity(&self, id: Id) -> Option<EntityRef<'_>> {
        self.entities.get(id)
    }

    /// The component instance bound to one field of an entity.
    ///
    /// `None` if the entity is gone, the field is unbound, or the bound
    /// instance has been destroyed.
    pub fn get_component(&self, entity: Id, field: &str) -> StoreResult<Option<Component<'_>>> {
        let Some(entity) = self.entities.get(entity) else {
            return Ok(None);
        };
        let Some(id) = entity.component(field)? else {
            return Ok(None);
        };

        let ty = self.bound_type(entity.kind(), field)?;
        Ok(self.store(ty)?.get(id))
    }

    /// Point one field of a live entity at another live component instance.
    ///
    /// Returns `false` if the entity is not live.
    pub fn bind(&mut self, entity: Id, field: &str, component: Id) -> StoreResult<bool> {
        let Some(kind) = self.entities.kind_of(entity) else {
            return Ok(false);
        };

        let ty = self.bound_type(kind, field)?;
        if !self.store(ty)?.contains(component) {
            return Err(StoreError::DanglingComponent {
                field: field.to_owned(),
                id: component,
            });
        }
        self.entities.bind(entity, field, component)
    }

    /// Destroy an entity and every component instance bound to it.
    ///
    /// Returns `false`, doing nothing, if `id` is not live.
    pub fn destroy_entity(&mut self, id: Id) -> bool {
        let Some(bound) = self.entities.bound_components(id) else {
            return false;
        };

        for (ty, component) in bound {
            if let Some(store) = self.components.get_mut(ty.as_raw() as usize) {
                store.destroy(component);
            }
        }
        self.entities.remove(id)
    }

    /// Destroy every entity of one kind and the components bound to them.
    pub fn clear_kind(&mut self, kind: EntityKind) -> StoreResult<()> {
        for (ty, component) in self.entities.drain_kind(kind)? {
            if let Some(store) = self.components.get_mut(ty.as_raw() as usize) {
                store.destroy(component);
            }
        }
        Ok(())
    }

    /// Destroy every entity of every kind and every component instance, and
    /// reset all id spaces.
    pub fn clear(&mut self) {
        tracing::debug!(
            "clearing world ({} entities, {} component types)",
            self.entities.existing(),
            self.components.len()
        );

        for store in &mut self.components {
            store.clear();
        }
        self.entities.reset();
    }

    // ==================== Masked views ====================

    /// View of `field` of the components bound through `binding` by every
    /// entity of `kind`, in kind row order.
    pub fn masked(&self, kind: EntityKind, binding: &str, field: &str) -> StoreResult<MaskedView<'_>> {
        let ty = self.bound_type(kind, binding)?;
        let store = self.store(ty)?;
        MaskedView::new(store, field, self.entities.component_ids(kind, binding)?)
    }

    /// Writable view, see [`masked`](Self::masked).
    pub fn masked_mut(
        &mut self,
        kind: EntityKind,
        binding: &str,
        field: &str,
    ) -> StoreResult<MaskedViewMut<'_>> {
        let ty = self.bound_type(kind, binding)?;
        let references = self.entities.component_ids(kind, binding)?;
        let store = self
            .components
            .get_mut(ty.as_raw() as usize)
            .ok_or(StoreError::UnknownComponentType(ty))?;
        MaskedViewMut::new(store, field, references)
    }

    // ==================== Mirroring ====================

    /// Announce every component type's record layout and current capacity.
    pub fn allocate_mirrors(&self, sink: &mut impl MirrorSink) {
        for store in &self.components {
            sink.allocate(store.name(), &store.record_layout(), store.capacity());
        }
    }

    /// Release every component type's mirror.
    pub fn free_mirrors(&self, sink: &mut impl MirrorSink) {
        for store in &self.components {
            sink.free(store.name());
        }
    }

    // ==================== Helpers ====================

    fn store(&self, ty: ComponentType) -> StoreResult<&ComponentStore> {
        self.components
            .get(ty.as_raw() as usize)
            .ok_or(StoreError::UnknownComponentType(ty))
    }

    /// Component type an entity field refers to.
    fn bound_type(&self, kind: EntityKind, field: &str) -> StoreResult<ComponentType> {
        let schema = self
            .entities
            .schema(kind)
            .ok_or(StoreError::UnknownEntityKind(kind))?;
        let idx = schema
            .field_index(field)
            .ok_or_else(|| StoreError::UnknownField {
                ty: schema.name().to_owned(),
                field: field.to_owned(),
            })?;
        Ok(schema.fields()[idx].component)
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("components", &self.components)
            .field("entities", &self.entities)
            .finish_non_exhaustive()
    }
}
