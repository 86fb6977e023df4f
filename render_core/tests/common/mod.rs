//! Shared scene setup for the integration tests

#![allow(dead_code)]

use render_core::prelude::*;
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub world: SceneWorld,
    pub managers: Arc<ResourceManagers>,
    pub logical: LogicalRenderer,
    pub renderer: FrameRenderer,
    pub backend: HeadlessBackend,
}

impl Harness {
    pub fn new(config: &RendererConfig) -> Self {
        let mut world = SceneWorld::new();
        let managers = Arc::new(ResourceManagers::new().unwrap());
        managers.attach(&mut world);
        let (logical, renderer) = pipeline(Arc::clone(&managers), config);
        Self {
            world,
            managers,
            logical,
            renderer,
            backend: HeadlessBackend::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(&RendererConfig::unbounded())
    }

    /// Screen camera at `position` looking down -Z
    pub fn camera_at(&mut self, position: Vec3) -> Entity {
        self.world
            .spawn((Camera::default(), WorldTransform::from_position(position)))
    }

    pub fn instance_at(&mut self, instance: MeshInstance, position: Vec3) -> Entity {
        self.world
            .spawn((instance, WorldTransform::from_position(position)))
    }

    /// Run one logical tick and render the queued frame
    pub fn frame(&mut self) -> FrameStats {
        match self.logical.tick(&mut self.world) {
            TickOutcome::Queued(_) => {}
            outcome => panic!("expected a queued frame, got {outcome:?}"),
        }
        self.renderer
            .try_render_next(&mut self.backend, Duration::from_secs(1))
            .expect("queued frame was not rendered")
    }
}

pub fn cube(name: &str) -> Arc<MeshDescriptor> {
    Arc::new(MeshDescriptor::cube(name, 1.0))
}

pub fn material(name: &str, color: [f32; 4]) -> Arc<MaterialDescriptor> {
    Arc::new(MaterialDescriptor::new(name, color))
}
