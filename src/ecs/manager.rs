use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap, HashSet};

use bevy::log::debug;
use thiserror::Error;

use super::entity::{ChildEntitiesComponent, EntityId};

/// Marker for anything that can be stored as a component.
///
/// Every `'static + Send + Sync` type qualifies; components are plain data.
pub trait EcsComponent: Any + Send + Sync {}

impl<T: Any + Send + Sync> EcsComponent for T {}

/// Invariant violations reported by the [`ComponentManager`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EcsError {
    #[error("entity {0} is not alive")]
    DeadEntity(EntityId),
    #[error("entity {entity} already has a component of type {component}")]
    DuplicateComponent {
        entity: EntityId,
        component: &'static str,
    },
    #[error("entity {entity} has no component of type {component}")]
    MissingComponent {
        entity: EntityId,
        component: &'static str,
    },
}

trait ErasedStorage: Send + Sync {
    fn remove_entity(&mut self, entity: EntityId) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Per-type component storage.
///
/// Values are ordered by an insertion sequence so iteration follows the order
/// in which components of this type were added.
struct Storage<T> {
    next_seq: u64,
    slots: HashMap<EntityId, u64>,
    values: BTreeMap<u64, (EntityId, T)>,
}

impl<T> Default for Storage<T> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            slots: HashMap::new(),
            values: BTreeMap::new(),
        }
    }
}

impl<T> Storage<T> {
    fn insert(&mut self, entity: EntityId, value: T) -> bool {
        if self.slots.contains_key(&entity) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(entity, seq);
        self.values.insert(seq, (entity, value));
        true
    }

    fn get(&self, entity: EntityId) -> Option<&T> {
        let seq = self.slots.get(&entity)?;
        self.values.get(seq).map(|(_, value)| value)
    }

    fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        let seq = self.slots.get(&entity)?;
        self.values.get_mut(seq).map(|(_, value)| value)
    }

    fn remove(&mut self, entity: EntityId) -> Option<T> {
        let seq = self.slots.remove(&entity)?;
        self.values.remove(&seq).map(|(_, value)| value)
    }

    fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.values.values().map(|(entity, value)| (*entity, value))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.values.values_mut().map(|(entity, value)| (*entity, value))
    }

    fn len(&self) -> usize {
        self.values.len()
    }
}

impl<T: EcsComponent> ErasedStorage for Storage<T> {
    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct EntityRecord {
    generation: u32,
    alive: bool,
    name: String,
    components: HashSet<TypeId>,
}

/// Registry mapping entity handles to heterogeneous components.
///
/// Structural changes made while iterating a query must be applied to a
/// snapshot taken with [`entities_with`](Self::entities_with); systems never
/// mutate the storage they are iterating.
#[derive(Default)]
pub struct ComponentManager {
    entities: Vec<EntityRecord>,
    free: Vec<u32>,
    storages: HashMap<TypeId, Box<dyn ErasedStorage>>,
    removed: Vec<EntityId>,
    alive_count: usize,
}

impl ComponentManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_entity(&mut self, name: impl Into<String>) -> EntityId {
        let name = name.into();
        self.alive_count += 1;

        if let Some(index) = self.free.pop() {
            let record = &mut self.entities[index as usize];
            record.generation = record.generation.wrapping_add(1);
            record.alive = true;
            record.name = name;
            return EntityId::new(index, record.generation);
        }

        let index = self.entities.len() as u32;
        self.entities.push(EntityRecord {
            generation: 0,
            alive: true,
            name,
            components: HashSet::new(),
        });
        EntityId::new(index, 0)
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.record(entity).is_some()
    }

    pub fn entity_name(&self, entity: EntityId) -> Option<&str> {
        self.record(entity).map(|record| record.name.as_str())
    }

    /// First live entity carrying the given name
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .enumerate()
            .find(|(_, record)| record.alive && record.name == name)
            .map(|(index, record)| EntityId::new(index as u32, record.generation))
    }

    pub fn entities_count(&self) -> usize {
        self.alive_count
    }

    /// Destroys the entity and drops all of its components immediately.
    ///
    /// Returns `false` when the handle was already stale.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        let Some(record) = self.record_mut(entity) else {
            return false;
        };
        record.alive = false;
        record.name.clear();
        let types: Vec<TypeId> = record.components.drain().collect();

        for type_id in types {
            if let Some(storage) = self.storages.get_mut(&type_id) {
                storage.remove_entity(entity);
            }
        }

        self.free.push(entity.index());
        self.alive_count -= 1;
        true
    }

    /// Schedules the entity for destruction at the end of the current frame.
    pub fn remove_entity(&mut self, entity: EntityId) {
        if self.is_alive(entity) {
            self.removed.push(entity);
        }
    }

    pub fn pending_removals(&self) -> usize {
        self.removed.len()
    }

    /// Destroys every entity scheduled with [`remove_entity`](Self::remove_entity)
    /// together with the entities listed in its [`ChildEntitiesComponent`].
    pub fn flush_removed(&mut self) -> usize {
        let mut destroyed = 0;
        while let Some(entity) = self.removed.pop() {
            if let Some(children) = self.take_component::<ChildEntitiesComponent>(entity) {
                self.removed.extend(children.0);
            }
            if self.destroy_entity(entity) {
                destroyed += 1;
            }
        }
        if destroyed > 0 {
            debug!("Removed {} entities", destroyed);
        }
        destroyed
    }

    pub fn try_add_component<T: EcsComponent>(
        &mut self,
        entity: EntityId,
        component: T,
    ) -> Result<(), EcsError> {
        let record = self.record_mut(entity).ok_or(EcsError::DeadEntity(entity))?;
        if !record.components.insert(TypeId::of::<T>()) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: type_name::<T>(),
            });
        }
        self.storage_or_insert::<T>().insert(entity, component);
        Ok(())
    }

    /// Adds a component to a live entity.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or already has a component of type `T`.
    pub fn add_component<T: EcsComponent>(&mut self, entity: EntityId, component: T) {
        if let Err(err) = self.try_add_component(entity, component) {
            panic!("{err}");
        }
    }

    /// Adds the component or replaces the existing instance of the same type.
    pub fn set_component<T: EcsComponent>(&mut self, entity: EntityId, component: T) {
        if let Some(existing) = self.get_component_mut::<T>(entity) {
            *existing = component;
        } else {
            self.add_component(entity, component);
        }
    }

    pub fn get_component<T: EcsComponent>(&self, entity: EntityId) -> Option<&T> {
        self.record(entity)?;
        self.storage::<T>()?.get(entity)
    }

    pub fn get_component_mut<T: EcsComponent>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.record(entity)?;
        self.storage_mut::<T>()?.get_mut(entity)
    }

    pub fn contains<T: EcsComponent>(&self, entity: EntityId) -> bool {
        self.get_component::<T>(entity).is_some()
    }

    pub fn try_remove_component<T: EcsComponent>(
        &mut self,
        entity: EntityId,
    ) -> Result<T, EcsError> {
        let record = self.record_mut(entity).ok_or(EcsError::DeadEntity(entity))?;
        let missing = EcsError::MissingComponent {
            entity,
            component: type_name::<T>(),
        };
        if !record.components.remove(&TypeId::of::<T>()) {
            return Err(missing);
        }
        self.storage_mut::<T>()
            .and_then(|storage| storage.remove(entity))
            .ok_or(missing)
    }

    /// Removes and returns a component.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or has no component of type `T`.
    pub fn remove_component<T: EcsComponent>(&mut self, entity: EntityId) -> T {
        match self.try_remove_component(entity) {
            Ok(component) => component,
            Err(err) => panic!("{err}"),
        }
    }

    /// Removes a component if present, without treating absence as an error.
    pub fn take_component<T: EcsComponent>(&mut self, entity: EntityId) -> Option<T> {
        if self.contains::<T>(entity) {
            self.try_remove_component(entity).ok()
        } else {
            None
        }
    }

    /// Iterates `(entity, component)` pairs in insertion order.
    pub fn query<T: EcsComponent>(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.storage::<T>().into_iter().flat_map(|storage| storage.iter())
    }

    pub fn query_mut<T: EcsComponent>(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> + '_ {
        self.storage_mut::<T>()
            .into_iter()
            .flat_map(|storage| storage.iter_mut())
    }

    /// Joint query over entities that carry both `A` and `B`.
    pub fn query2<A: EcsComponent, B: EcsComponent>(
        &self,
    ) -> impl Iterator<Item = (EntityId, &A, &B)> + '_ {
        let second = self.storage::<B>();
        self.query::<A>().filter_map(move |(entity, a)| {
            second
                .and_then(|storage| storage.get(entity))
                .map(|b| (entity, a, b))
        })
    }

    /// Snapshot of the entities currently carrying `T`.
    pub fn entities_with<T: EcsComponent>(&self) -> Vec<EntityId> {
        self.query::<T>().map(|(entity, _)| entity).collect()
    }

    pub fn count<T: EcsComponent>(&self) -> usize {
        self.storage::<T>().map_or(0, Storage::len)
    }

    pub fn singleton_entity<T: EcsComponent>(&self) -> Option<EntityId> {
        self.query::<T>().next().map(|(entity, _)| entity)
    }

    pub fn get_singleton<T: EcsComponent>(&self) -> Option<&T> {
        self.query::<T>().next().map(|(_, component)| component)
    }

    pub fn get_singleton_mut<T: EcsComponent>(&mut self) -> Option<&mut T> {
        self.query_mut::<T>().next().map(|(_, component)| component)
    }

    fn record(&self, entity: EntityId) -> Option<&EntityRecord> {
        self.entities
            .get(entity.index() as usize)
            .filter(|record| record.alive && record.generation == entity.generation())
    }

    fn record_mut(&mut self, entity: EntityId) -> Option<&mut EntityRecord> {
        self.entities
            .get_mut(entity.index() as usize)
            .filter(|record| record.alive && record.generation == entity.generation())
    }

    fn storage<T: EcsComponent>(&self) -> Option<&Storage<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any().downcast_ref::<Storage<T>>())
    }

    fn storage_mut<T: EcsComponent>(&mut self) -> Option<&mut Storage<T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any_mut().downcast_mut::<Storage<T>>())
    }

    fn storage_or_insert<T: EcsComponent>(&mut self) -> &mut Storage<T> {
        self.storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Storage::<T>::default()))
            .as_any_mut()
            .downcast_mut::<Storage<T>>()
            .unwrap_or_else(|| unreachable!("storage registered under a foreign type id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position(i32);

    #[derive(Debug, PartialEq)]
    struct Label(&'static str);

    #[test]
    fn test_destroy_drops_all_components() {
        let mut manager = ComponentManager::new();
        let entity = manager.create_entity("tile");
        manager.add_component(entity, Position(1));
        manager.add_component(entity, Label("a"));

        assert!(manager.destroy_entity(entity));
        assert!(!manager.is_alive(entity));
        assert_eq!(manager.count::<Position>(), 0);
        assert_eq!(manager.count::<Label>(), 0);
        assert!(!manager.destroy_entity(entity));
    }

    #[test]
    fn test_duplicate_component_is_rejected() {
        let mut manager = ComponentManager::new();
        let entity = manager.create_entity("tile");
        manager.add_component(entity, Position(1));

        let err = manager.try_add_component(entity, Position(2)).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { .. }));
        assert_eq!(manager.get_component::<Position>(entity), Some(&Position(1)));
    }

    #[test]
    #[should_panic(expected = "already has a component")]
    fn test_add_component_panics_on_duplicate() {
        let mut manager = ComponentManager::new();
        let entity = manager.create_entity("tile");
        manager.add_component(entity, Position(1));
        manager.add_component(entity, Position(2));
    }

    #[test]
    fn test_removing_missing_component_is_an_error() {
        let mut manager = ComponentManager::new();
        let entity = manager.create_entity("tile");

        assert!(matches!(
            manager.try_remove_component::<Position>(entity),
            Err(EcsError::MissingComponent { .. })
        ));
        assert_eq!(manager.take_component::<Position>(entity), None);
    }

    #[test]
    fn test_stale_handle_does_not_see_new_occupant() {
        let mut manager = ComponentManager::new();
        let old = manager.create_entity("old");
        manager.destroy_entity(old);

        let new = manager.create_entity("new");
        manager.add_component(new, Position(7));

        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
        assert!(manager.get_component::<Position>(old).is_none());
        assert!(manager.try_add_component(old, Position(1)).is_err());
    }

    #[test]
    fn test_query_follows_insertion_order() {
        let mut manager = ComponentManager::new();
        let a = manager.create_entity("a");
        let b = manager.create_entity("b");
        let c = manager.create_entity("c");
        manager.add_component(c, Position(3));
        manager.add_component(a, Position(1));
        manager.add_component(b, Position(2));

        let order: Vec<EntityId> = manager.query::<Position>().map(|(e, _)| e).collect();
        assert_eq!(order, vec![c, a, b]);
    }

    #[test]
    fn test_joint_query_only_yields_entities_with_both() {
        let mut manager = ComponentManager::new();
        let a = manager.create_entity("a");
        let b = manager.create_entity("b");
        manager.add_component(a, Position(1));
        manager.add_component(a, Label("a"));
        manager.add_component(b, Position(2));

        let joined: Vec<(EntityId, i32, &str)> = manager
            .query2::<Position, Label>()
            .map(|(e, p, l)| (e, p.0, l.0))
            .collect();
        assert_eq!(joined, vec![(a, 1, "a")]);
    }

    #[test]
    fn test_removing_last_component_of_type_keeps_other_entities() {
        let mut manager = ComponentManager::new();
        let a = manager.create_entity("a");
        let b = manager.create_entity("b");
        manager.add_component(a, Position(1));
        manager.add_component(b, Label("b"));

        manager.remove_component::<Position>(a);
        assert_eq!(manager.count::<Position>(), 0);
        assert_eq!(manager.get_component::<Label>(b), Some(&Label("b")));
        manager.add_component(a, Position(5));
        assert_eq!(manager.get_component::<Position>(a), Some(&Position(5)));
    }

    #[test]
    fn test_deferred_removal_cascades_to_children() {
        let mut manager = ComponentManager::new();
        let parent = manager.create_entity("parent");
        let child = manager.create_entity("child");
        let unrelated = manager.create_entity("unrelated");
        manager.add_component(parent, ChildEntitiesComponent(vec![child]));

        manager.remove_entity(parent);
        assert!(manager.is_alive(parent));
        assert_eq!(manager.flush_removed(), 2);
        assert!(!manager.is_alive(parent));
        assert!(!manager.is_alive(child));
        assert!(manager.is_alive(unrelated));
        assert_eq!(manager.entities_count(), 1);
    }

    #[test]
    fn test_find_entity_by_name() {
        let mut manager = ComponentManager::new();
        let entity = manager.create_entity("camera");
        assert_eq!(manager.find_entity("camera"), Some(entity));
        manager.destroy_entity(entity);
        assert_eq!(manager.find_entity("camera"), None);
    }
}
