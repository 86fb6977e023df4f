//! Logical-thread side of the frame pipeline
//!
//! Each tick applies pending resource events, then, if the render thread has
//! taken the previous frame, walks the cameras and visible instances of the
//! scene and queues a new `RenderFrame`.

use super::batch::AnimationKey;
use super::camera_output::{CameraOutput, CameraView};
use super::frame::RenderFrame;
use super::frame_queue::FrameQueue;
use super::lights::LightCollector;
use crate::core::camera::Camera;
use crate::core::entity::{Entity, SceneWorld, WorldTransform};
use crate::graphics::instance::{AnimationState, MeshInstance, ResolvedMeshInstance};
use crate::graphics::resource_manager::ResourceManagers;
use crate::profile_zone;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Result of one logical tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame with this number was queued
    Queued(u64),
    /// The previous frame is still queued; nothing was built
    Skipped,
    /// The pipeline is shutting down
    Stopped,
}

/// Builds render frames from the scene on the logical thread
pub struct LogicalRenderer {
    managers: Arc<ResourceManagers>,
    queue: Arc<FrameQueue>,
    lights: LightCollector,
    next_frame: u64,
    skipped_frames: u64,
}

impl LogicalRenderer {
    pub fn new(managers: Arc<ResourceManagers>, queue: Arc<FrameQueue>) -> Self {
        Self {
            managers,
            queue,
            lights: LightCollector::new(),
            next_frame: 1,
            skipped_frames: 0,
        }
    }

    pub fn managers(&self) -> &Arc<ResourceManagers> {
        &self.managers
    }

    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }

    /// Frames not built because the render thread was still busy
    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames
    }

    /// Run one logical tick
    ///
    /// Resource events are applied on every tick, including skipped ones.
    pub fn tick(&mut self, world: &mut SceneWorld) -> TickOutcome {
        profile_zone!("LogicalRenderer::tick");
        if self.queue.is_quitting() {
            return TickOutcome::Stopped;
        }

        self.managers.process_events(world);

        if self.queue.is_occupied() {
            self.skipped_frames += 1;
            trace!(frame = self.next_frame, "Render thread busy, skipping frame");
            return TickOutcome::Skipped;
        }

        let frame = self.collect(world, self.next_frame);
        match self.queue.try_push(frame) {
            Ok(()) => {
                let number = self.next_frame;
                self.next_frame += 1;
                TickOutcome::Queued(number)
            }
            Err(_) if self.queue.is_quitting() => TickOutcome::Stopped,
            Err(_) => {
                self.skipped_frames += 1;
                TickOutcome::Skipped
            }
        }
    }

    /// Build a frame without queueing it
    ///
    /// Cameras are visited in ascending mask order; disabled or hidden
    /// cameras are left out. Off-screen parts are
    /// placed before screen parts so their targets are complete before
    /// anything samples them.
    pub fn collect(&mut self, world: &SceneWorld, number: u64) -> RenderFrame {
        profile_zone!("LogicalRenderer::collect");
        let started = Instant::now();
        let lights = self.lights.collect(world).clone();
        let mut frame = RenderFrame::new(number, lights);

        let mut cameras: Vec<(Entity, Camera, WorldTransform)> = world
            .query::<(&Camera, &WorldTransform)>()
            .iter()
            .filter(|(_, (camera, transform))| camera.mask != 0 && transform.visible)
            .map(|(entity, (camera, transform))| (entity, camera.clone(), *transform))
            .collect();
        cameras.sort_by_key(|(entity, camera, _)| (camera.mask, entity.id()));

        let mut offscreen = Vec::new();
        let mut onscreen = Vec::new();
        for (entity, camera, transform) in &cameras {
            let Some(output) = self.collect_camera(world, *entity, camera, transform) else {
                continue;
            };
            frame.stats.add_collected(output.stats());
            if output.is_offscreen() {
                offscreen.push(output);
            } else {
                onscreen.push(output);
            }
        }
        frame.parts = offscreen;
        frame.parts.append(&mut onscreen);
        frame.stats.collect_time = started.elapsed();

        debug!(
            frame = number,
            parts = frame.parts.len(),
            instances = frame.stats.instances,
            lights = frame.lights.enabled_count(),
            "Collected frame"
        );
        frame
    }

    fn collect_camera(
        &self,
        world: &SceneWorld,
        camera_entity: Entity,
        camera: &Camera,
        transform: &WorldTransform,
    ) -> Option<CameraOutput> {
        let target = match &camera.target {
            Some(descriptor) => match self.managers.renderbuffer(descriptor) {
                Some(entry) if entry.is_uploaded() => Some(entry),
                _ => {
                    debug!(
                        camera = ?camera_entity,
                        target = %descriptor.name,
                        "Camera target not allocated yet, skipping camera"
                    );
                    return None;
                }
            },
            None => None,
        };

        let mut output = CameraOutput::new(CameraView::new(camera, transform), target);
        let default_material = self.managers.default_material();

        let mut query = world.query::<(
            &MeshInstance,
            &ResolvedMeshInstance,
            &WorldTransform,
            Option<&AnimationState>,
        )>();
        for (entity, (instance, resolved, world_transform, animation)) in query.iter() {
            if !world_transform.is_seen_by(camera.mask) {
                continue;
            }
            let matrix = world_transform.matrix * instance.model;
            let animation =
                animation.map(|state| AnimationKey::new(Arc::clone(&state.clip), state.frame));

            let mut drawn = false;
            for (mesh_index, mesh) in resolved.meshes.iter().enumerate() {
                let Some(mesh) = mesh else {
                    continue;
                };
                let material = if resolved.materials.is_empty() {
                    Some(default_material)
                } else {
                    let material_index = instance.material_index(mesh_index);
                    match resolved.materials.get(material_index) {
                        Some(material) => material.as_ref(),
                        None => {
                            warn!(
                                entity = ?entity,
                                mesh_index,
                                material_index,
                                material_count = resolved.materials.len(),
                                "Material index out of range, skipping mesh"
                            );
                            continue;
                        }
                    }
                };
                let Some(material) = material else {
                    continue;
                };
                output.append_instance(mesh, material, matrix, animation.clone());
                drawn = true;
            }
            if drawn {
                output.count_entity();
            }
        }
        Some(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::descriptor::RenderbufferDescriptor;
    use crate::graphics::headless::HeadlessBackend;
    use crate::graphics::instance::RenderTarget;
    use crate::graphics::material::MaterialDescriptor;
    use crate::graphics::mesh::MeshDescriptor;
    use glam::{Mat4, Vec3};

    fn setup() -> (SceneWorld, LogicalRenderer) {
        let mut world = SceneWorld::new();
        let managers = Arc::new(ResourceManagers::new().unwrap());
        managers.attach(&mut world);
        let renderer = LogicalRenderer::new(managers, Arc::new(FrameQueue::new()));
        (world, renderer)
    }

    fn camera(world: &mut SceneWorld, camera: Camera) -> Entity {
        world.spawn((camera, WorldTransform::from_position(Vec3::new(0.0, 0.0, 10.0))))
    }

    #[test]
    fn test_tick_skips_while_frame_queued() {
        let (mut world, mut renderer) = setup();
        camera(&mut world, Camera::default());

        assert_eq!(renderer.tick(&mut world), TickOutcome::Queued(1));
        assert_eq!(renderer.tick(&mut world), TickOutcome::Skipped);
        assert_eq!(renderer.skipped_frames(), 1);

        renderer.queue().pop_blocking();
        assert_eq!(renderer.tick(&mut world), TickOutcome::Queued(2));
    }

    #[test]
    fn test_tick_stops_after_quit() {
        let (mut world, mut renderer) = setup();
        renderer.queue().request_quit();
        assert_eq!(renderer.tick(&mut world), TickOutcome::Stopped);
    }

    #[test]
    fn test_cameras_filtered_by_mask() {
        let (mut world, mut renderer) = setup();
        camera(&mut world, Camera::default().with_mask(0));
        camera(&mut world, Camera::default().with_mask(0b01));
        camera(&mut world, Camera::default().with_mask(0b10));

        let cube = Arc::new(MeshDescriptor::cube("cube", 1.0));
        world.spawn((
            MeshInstance::untextured(Arc::clone(&cube)),
            WorldTransform::default().with_camera_mask(0b10),
        ));
        world.spawn((
            MeshInstance::untextured(cube),
            WorldTransform::default().hidden(),
        ));
        renderer.managers().process_events(&mut world);

        let frame = renderer.collect(&world, 1);
        assert_eq!(frame.parts.len(), 2);
        assert_eq!(frame.parts[0].view().mask, 0b01);
        assert_eq!(frame.parts[0].stats().instances, 0);
        assert_eq!(frame.parts[1].stats().instances, 1);
        assert_eq!(frame.parts[1].stats().entities, 1);
    }

    #[test]
    fn test_hidden_camera_is_skipped() {
        let (mut world, mut renderer) = setup();
        world.spawn((Camera::default(), WorldTransform::default().hidden()));
        world.spawn((
            MeshInstance::untextured(Arc::new(MeshDescriptor::cube("cube", 1.0))),
            WorldTransform::default(),
        ));
        renderer.managers().process_events(&mut world);

        let frame = renderer.collect(&world, 1);
        assert!(frame.parts.is_empty());
        assert_eq!(frame.stats.cameras, 0);
    }

    #[test]
    fn test_out_of_range_material_skips_only_that_mesh() {
        let (mut world, mut renderer) = setup();
        camera(&mut world, Camera::default());

        let red = Arc::new(MaterialDescriptor::from_rgb("red", 1.0, 0.0, 0.0));
        let instance = MeshInstance::new(Arc::new(MeshDescriptor::cube("good", 1.0)), red)
            .with_mesh(Arc::new(MeshDescriptor::cube("bad", 1.0)), 3)
            .with_model(Mat4::from_translation(Vec3::X));
        world.spawn((instance, WorldTransform::default()));
        renderer.managers().process_events(&mut world);

        let frame = renderer.collect(&world, 1);
        let part = &frame.parts[0];
        assert_eq!(part.stats().instances, 1);
        let batch = &part.opaque().batches()[0];
        assert_eq!(batch.meshes()[0].mesh().label(), "good");
        assert_eq!(batch.meshes()[0].matrices()[0].w_axis.truncate(), Vec3::X);
    }

    #[test]
    fn test_instances_without_materials_use_default() {
        let (mut world, mut renderer) = setup();
        camera(&mut world, Camera::default());
        world.spawn((
            MeshInstance::untextured(Arc::new(MeshDescriptor::cube("cube", 1.0))),
            WorldTransform::default(),
        ));
        renderer.managers().process_events(&mut world);

        let frame = renderer.collect(&world, 1);
        let material = frame.parts[0].opaque().batches()[0].material();
        assert!(Arc::ptr_eq(material, renderer.managers().default_material()));
        assert!(material.upload_immediately());
    }

    #[test]
    fn test_offscreen_parts_come_first() {
        let (mut world, mut renderer) = setup();
        let mirror = Arc::new(RenderbufferDescriptor::new("mirror", 256, 256));
        world.spawn((RenderTarget(Arc::clone(&mirror)),));
        camera(&mut world, Camera::default().with_mask(0b01));
        camera(
            &mut world,
            Camera::default().with_mask(0b10).with_target(Arc::clone(&mirror)),
        );
        renderer.managers().process_events(&mut world);

        // Target not allocated yet: the off-screen camera is skipped
        let frame = renderer.collect(&world, 1);
        assert_eq!(frame.parts.len(), 1);
        assert!(!frame.parts[0].is_offscreen());

        let mut backend = HeadlessBackend::new();
        renderer
            .managers()
            .upload_pending_renderbuffers(&mut backend);

        let frame = renderer.collect(&world, 2);
        assert_eq!(frame.parts.len(), 2);
        assert!(frame.parts[0].is_offscreen());
        assert_eq!(frame.parts[0].view().mask, 0b10);
        assert!(!frame.parts[1].is_offscreen());
    }
}
