//! Entity-Component System (ECS) functionality
//!
//! This module provides the scene world the renderer reads from, the
//! components it understands and the typed change events resource managers
//! consume.

pub mod components;
pub mod events;
pub mod world;

// Re-export commonly used types
pub use components::{Name, Transform, WorldTransform, ALL_CAMERAS};
pub use events::ComponentEvent;
pub use world::SceneWorld;

// Re-export hecs types that users will need
pub use hecs::Entity;
