//! Typed component change notifications
//!
//! The world records one `ComponentEvent<T>` per tracked mutation. Consumers
//! drain the queue on the thread that owns the world, so handlers never run
//! inside a world mutation.

use hecs::Entity;
use std::any::Any;

/// A single add/change/remove notification for component type `T`
#[derive(Debug, Clone)]
pub enum ComponentEvent<T> {
    /// `component` was attached to `entity` (spawn or first insert)
    Added {
        /// Entity that received the component
        entity: Entity,
        /// Copy of the inserted value
        component: T,
    },
    /// The value on `entity` was replaced or modified in place
    Changed {
        /// Entity whose component changed
        entity: Entity,
        /// Value before the change
        old: T,
        /// Value after the change
        new: T,
    },
    /// `component` was detached from `entity` (remove or despawn)
    Removed {
        /// Entity that lost the component; may no longer exist
        entity: Entity,
        /// The value that was removed
        component: T,
    },
}

impl<T> ComponentEvent<T> {
    /// Entity the event refers to
    pub fn entity(&self) -> Entity {
        match self {
            ComponentEvent::Added { entity, .. }
            | ComponentEvent::Changed { entity, .. }
            | ComponentEvent::Removed { entity, .. } => *entity,
        }
    }
}

/// Type-erased per-component event queue stored by the world
pub(crate) trait EventChannel: Send + Sync {
    /// Record an `Added` event if the freshly spawned entity carries the component
    fn record_spawn(&mut self, world: &hecs::World, entity: Entity);
    /// Record a `Removed` event if the entity about to be despawned carries the component
    fn record_despawn(&mut self, world: &hecs::World, entity: Entity);
    /// Number of queued events
    fn len(&self) -> usize;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Event queue for one concrete component type
pub(crate) struct EventQueue<T> {
    pub(crate) events: Vec<ComponentEvent<T>>,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<T> EventQueue<T> {
    pub(crate) fn push(&mut self, event: ComponentEvent<T>) {
        self.events.push(event);
    }

    pub(crate) fn drain(&mut self) -> Vec<ComponentEvent<T>> {
        std::mem::take(&mut self.events)
    }
}

impl<T: hecs::Component + Clone> EventChannel for EventQueue<T> {
    fn record_spawn(&mut self, world: &hecs::World, entity: Entity) {
        if let Ok(component) = world.get::<&T>(entity) {
            self.events.push(ComponentEvent::Added {
                entity,
                component: (*component).clone(),
            });
        }
    }

    fn record_despawn(&mut self, world: &hecs::World, entity: Entity) {
        if let Ok(component) = world.get::<&T>(entity) {
            self.events.push(ComponentEvent::Removed {
                entity,
                component: (*component).clone(),
            });
        }
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
