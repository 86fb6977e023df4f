//! Scene world wrapper with typed change tracking

use super::events::{ComponentEvent, EventChannel, EventQueue};
use hecs::Entity;
use std::any::TypeId;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Wrapper around `hecs::World` that records component add/change/remove events
///
/// Only component types registered with [`SceneWorld::track`] produce events.
/// Mutations made through [`SceneWorld::inner_mut`] bypass tracking.
pub struct SceneWorld {
    inner: hecs::World,
    channels: HashMap<TypeId, Box<dyn EventChannel>>,
}

impl Default for SceneWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneWorld {
    /// Create a new empty world
    pub fn new() -> Self {
        Self {
            inner: hecs::World::new(),
            channels: HashMap::new(),
        }
    }

    /// Start recording events for component type `T`
    ///
    /// Calling this more than once for the same type is a no-op.
    pub fn track<T: hecs::Component + Clone>(&mut self) {
        self.channels
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                debug!(
                    component = std::any::type_name::<T>(),
                    "Tracking component changes"
                );
                Box::new(EventQueue::<T>::default())
            });
    }

    /// Whether events are being recorded for `T`
    pub fn is_tracked<T: hecs::Component>(&self) -> bool {
        self.channels.contains_key(&TypeId::of::<T>())
    }

    /// Take every queued event for `T`, oldest first
    pub fn drain_events<T: hecs::Component + Clone>(&mut self) -> Vec<ComponentEvent<T>> {
        self.queue_mut::<T>()
            .map(EventQueue::drain)
            .unwrap_or_default()
    }

    /// Total number of queued events across all tracked types
    pub fn pending_events(&self) -> usize {
        self.channels.values().map(|channel| channel.len()).sum()
    }

    /// Spawn a new entity with the given components
    pub fn spawn(&mut self, components: impl hecs::DynamicBundle) -> Entity {
        let entity = self.inner.spawn(components);
        for channel in self.channels.values_mut() {
            channel.record_spawn(&self.inner, entity);
        }
        entity
    }

    /// Insert or replace a component on an entity
    pub fn insert<T: hecs::Component + Clone>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<(), hecs::NoSuchEntity> {
        if !self.inner.contains(entity) {
            return Err(hecs::NoSuchEntity);
        }
        if !self.is_tracked::<T>() {
            return self.inner.insert_one(entity, component);
        }

        let old = self.inner.remove_one::<T>(entity).ok();
        self.inner.insert_one(entity, component.clone())?;
        let event = match old {
            Some(old) => ComponentEvent::Changed {
                entity,
                old,
                new: component,
            },
            None => ComponentEvent::Added { entity, component },
        };
        self.push_event(event);
        Ok(())
    }

    /// Mutate a component in place, recording a `Changed` event when tracked
    pub fn modify<T, R>(
        &mut self,
        entity: Entity,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, hecs::QueryOneError>
    where
        T: hecs::Component + Clone,
    {
        let tracked = self.is_tracked::<T>();
        let component = self.inner.query_one_mut::<&mut T>(entity)?;
        let old = tracked.then(|| component.clone());
        let result = f(component);
        if let Some(old) = old {
            let new = component.clone();
            self.push_event(ComponentEvent::Changed { entity, old, new });
        }
        Ok(result)
    }

    /// Remove a component from an entity, returning it
    pub fn remove<T: hecs::Component + Clone>(
        &mut self,
        entity: Entity,
    ) -> Result<T, hecs::ComponentError> {
        let component = self.inner.remove_one::<T>(entity)?;
        if self.is_tracked::<T>() {
            self.push_event(ComponentEvent::Removed {
                entity,
                component: component.clone(),
            });
        }
        Ok(component)
    }

    /// Despawn an entity and all its components
    pub fn despawn(&mut self, entity: Entity) -> Result<(), hecs::NoSuchEntity> {
        if !self.inner.contains(entity) {
            return Err(hecs::NoSuchEntity);
        }
        for channel in self.channels.values_mut() {
            channel.record_despawn(&self.inner, entity);
        }
        trace!(entity = ?entity, "Despawning entity");
        self.inner.despawn(entity)
    }

    /// Despawn every entity, recording removals for tracked components
    pub fn clear(&mut self) {
        let entities: Vec<Entity> = self.inner.iter().map(|entity| entity.entity()).collect();
        for entity in entities {
            for channel in self.channels.values_mut() {
                channel.record_despawn(&self.inner, entity);
            }
        }
        self.inner.clear();
    }

    /// Get a reference to a component on an entity
    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<'_, T>, hecs::ComponentError> {
        self.inner.get::<&T>(entity)
    }

    /// Query entities with specific components
    pub fn query<Q: hecs::Query>(&self) -> hecs::QueryBorrow<'_, Q> {
        self.inner.query()
    }

    /// Check if an entity exists
    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.contains(entity)
    }

    /// Number of live entities
    pub fn len(&self) -> u32 {
        self.inner.len()
    }

    /// Whether the world has no entities
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Get access to the inner hecs::World for advanced operations
    pub fn inner(&self) -> &hecs::World {
        &self.inner
    }

    /// Get mutable access to the inner hecs::World
    ///
    /// Changes made here are not reported to event consumers.
    pub fn inner_mut(&mut self) -> &mut hecs::World {
        &mut self.inner
    }

    fn queue_mut<T: hecs::Component + Clone>(&mut self) -> Option<&mut EventQueue<T>> {
        self.channels
            .get_mut(&TypeId::of::<T>())
            .and_then(|channel| channel.as_any_mut().downcast_mut::<EventQueue<T>>())
    }

    fn push_event<T: hecs::Component + Clone>(&mut self, event: ComponentEvent<T>) {
        if let Some(queue) = self.queue_mut::<T>() {
            queue.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::components::{Name, WorldTransform};
    use glam::Vec3;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(u32);

    #[test]
    fn test_world_spawn() {
        let mut world = SceneWorld::new();
        let entity = world.spawn((WorldTransform::default(),));
        assert!(world.contains(entity));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_untracked_components_record_nothing() {
        let mut world = SceneWorld::new();
        let entity = world.spawn((Tag(1),));
        world.insert(entity, Tag(2)).unwrap();
        world.remove::<Tag>(entity).unwrap();
        assert_eq!(world.pending_events(), 0);
    }

    #[test]
    fn test_spawn_insert_remove_events() {
        let mut world = SceneWorld::new();
        world.track::<Tag>();

        let entity = world.spawn((Tag(1), Name::new("tagged")));
        world.insert(entity, Tag(2)).unwrap();
        world.remove::<Tag>(entity).unwrap();
        world.insert(entity, Tag(3)).unwrap();

        let events = world.drain_events::<Tag>();
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], ComponentEvent::Added { component: Tag(1), .. }));
        assert!(matches!(
            &events[1],
            ComponentEvent::Changed { old: Tag(1), new: Tag(2), .. }
        ));
        assert!(matches!(&events[2], ComponentEvent::Removed { component: Tag(2), .. }));
        assert!(matches!(&events[3], ComponentEvent::Added { component: Tag(3), .. }));
        assert!(world.drain_events::<Tag>().is_empty());
    }

    #[test]
    fn test_modify_records_old_and_new() {
        let mut world = SceneWorld::new();
        world.track::<Tag>();
        let entity = world.spawn((Tag(1),));
        world.drain_events::<Tag>();

        let doubled = world.modify::<Tag, u32>(entity, |tag| {
            tag.0 *= 2;
            tag.0
        });
        assert_eq!(doubled.unwrap(), 2);

        let events = world.drain_events::<Tag>();
        assert!(matches!(
            &events[..],
            [ComponentEvent::Changed { old: Tag(1), new: Tag(2), .. }]
        ));
    }

    #[test]
    fn test_despawn_records_removal() {
        let mut world = SceneWorld::new();
        world.track::<Tag>();
        let entity = world.spawn((Tag(7), WorldTransform::from_position(Vec3::X)));
        world.drain_events::<Tag>();

        world.despawn(entity).unwrap();
        assert!(!world.contains(entity));
        let events = world.drain_events::<Tag>();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entity(), entity);
        assert!(world.despawn(entity).is_err());
    }

    #[test]
    fn test_clear_records_removals() {
        let mut world = SceneWorld::new();
        world.track::<Tag>();
        world.spawn((Tag(1),));
        world.spawn((Tag(2),));
        world.spawn((Name::new("untagged"),));
        world.drain_events::<Tag>();

        world.clear();
        assert!(world.is_empty());
        assert_eq!(world.drain_events::<Tag>().len(), 2);
    }

    #[test]
    fn test_insert_on_missing_entity_fails() {
        let mut world = SceneWorld::new();
        world.track::<Tag>();
        let entity = world.spawn(());
        world.despawn(entity).unwrap();
        assert!(world.insert(entity, Tag(1)).is_err());
        assert_eq!(world.pending_events(), 0);
    }
}
