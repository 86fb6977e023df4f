//! Resource managers
//!
//! Keeps the GPU entry caches in sync with the scene. The logical thread
//! feeds `MeshInstance` and `RenderTarget` change events in through
//! [`ResourceManagers::process_events`]; the render thread allocates
//! renderbuffers and destroys retired entries. Both sides share one lock
//! around the caches, separate from the frame queue lock.

use super::backend::GraphicsBackend;
use super::descriptor::{Descriptor, RenderbufferDescriptor, ResourceError};
use super::entry::{MaterialEntry, MeshEntry, RenderbufferEntry};
use super::instance::{MeshInstance, RenderTarget, ResolvedMeshInstance};
use super::material::{MaterialDescriptor, TextureDescriptor};
use super::mesh::MeshDescriptor;
use super::resource_cache::{Release, ResourceCache};
use crate::core::entity::{ComponentEvent, Entity, SceneWorld};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, trace};

/// Per-kind caches guarded by the manager lock
struct Caches {
    meshes: ResourceCache<MeshDescriptor>,
    textures: ResourceCache<TextureDescriptor>,
    materials: ResourceCache<MaterialDescriptor, MaterialEntry>,
    renderbuffers: ResourceCache<RenderbufferDescriptor>,
}

/// Number of cached descriptors per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounts {
    pub meshes: usize,
    pub textures: usize,
    pub materials: usize,
    pub renderbuffers: usize,
}

/// Owner of every GPU entry cache
pub struct ResourceManagers {
    caches: Mutex<Caches>,
    default_material: Arc<MaterialEntry>,
}

impl ResourceManagers {
    /// Create empty managers with the built-in default material
    pub fn new() -> Result<Self, ResourceError> {
        Self::with_default_material(MaterialDescriptor::fallback())
    }

    /// Create empty managers drawing material-less instances with `material`
    ///
    /// The default material is always uploaded regardless of budget.
    pub fn with_default_material(material: MaterialDescriptor) -> Result<Self, ResourceError> {
        let material = Arc::new(material.uploaded_immediately());
        let default_material = Arc::new(MaterialEntry::create(&material, None)?);
        Ok(Self {
            caches: Mutex::new(Caches {
                meshes: ResourceCache::new(),
                textures: ResourceCache::new(),
                materials: ResourceCache::new(),
                renderbuffers: ResourceCache::new(),
            }),
            default_material,
        })
    }

    /// Start tracking render components on `world` and take over existing entities
    ///
    /// Events queued before attaching are discarded; the back-fill reads the
    /// current component values instead.
    pub fn attach(&self, world: &mut SceneWorld) {
        world.track::<MeshInstance>();
        world.track::<RenderTarget>();
        world.drain_events::<MeshInstance>();
        world.drain_events::<RenderTarget>();

        let instances: Vec<(Entity, MeshInstance)> = world
            .query::<&MeshInstance>()
            .iter()
            .map(|(entity, instance)| (entity, instance.clone()))
            .collect();
        let targets: Vec<Arc<RenderbufferDescriptor>> = world
            .query::<&RenderTarget>()
            .iter()
            .map(|(_, target)| Arc::clone(&target.0))
            .collect();

        let mut caches = self.lock();
        for (entity, instance) in &instances {
            let resolved = caches.acquire_instance(instance);
            write_resolved(world, *entity, resolved);
        }
        for target in &targets {
            caches.renderbuffers.acquire(target);
        }
        info!(
            instances = instances.len(),
            render_targets = targets.len(),
            "Resource managers attached"
        );
    }

    /// Apply queued render component events
    ///
    /// Must run on the thread that owns `world`. A replaced component
    /// acquires its new descriptors before releasing the old ones, so a
    /// descriptor present on both sides keeps its entry.
    pub fn process_events(&self, world: &mut SceneWorld) {
        let instance_events = world.drain_events::<MeshInstance>();
        let target_events = world.drain_events::<RenderTarget>();
        if instance_events.is_empty() && target_events.is_empty() {
            return;
        }
        trace!(
            instances = instance_events.len(),
            targets = target_events.len(),
            "Processing resource events"
        );

        let mut caches = self.lock();
        for event in instance_events {
            match event {
                ComponentEvent::Added { entity, component } => {
                    let resolved = caches.acquire_instance(&component);
                    write_resolved(world, entity, resolved);
                }
                ComponentEvent::Changed { entity, old, new } => {
                    let resolved = caches.acquire_instance(&new);
                    write_resolved(world, entity, resolved);
                    caches.release_instance(&old);
                }
                ComponentEvent::Removed { entity, component } => {
                    caches.release_instance(&component);
                    if world.contains(entity) {
                        let _ = world.inner_mut().remove_one::<ResolvedMeshInstance>(entity);
                    }
                }
            }
        }

        for event in target_events {
            match event {
                ComponentEvent::Added { component, .. } => {
                    caches.renderbuffers.acquire(&component.0);
                }
                ComponentEvent::Changed { old, new, .. } => {
                    caches.renderbuffers.acquire(&new.0);
                    caches.renderbuffers.release(&old.0);
                }
                ComponentEvent::Removed { component, .. } => {
                    caches.renderbuffers.release(&component.0);
                }
            }
        }
    }

    /// Material used for instances without a material list
    pub fn default_material(&self) -> &Arc<MaterialEntry> {
        &self.default_material
    }

    /// Entry for a renderbuffer referenced by a `RenderTarget`
    pub fn renderbuffer(
        &self,
        descriptor: &Arc<RenderbufferDescriptor>,
    ) -> Option<Arc<RenderbufferEntry>> {
        self.lock().renderbuffers.get(descriptor)
    }

    pub fn mesh(&self, descriptor: &Arc<MeshDescriptor>) -> Option<Arc<MeshEntry>> {
        self.lock().meshes.get(descriptor)
    }

    pub fn material(&self, descriptor: &Arc<MaterialDescriptor>) -> Option<Arc<MaterialEntry>> {
        self.lock().materials.get(descriptor)
    }

    pub fn mesh_refcount(&self, descriptor: &Arc<MeshDescriptor>) -> usize {
        self.lock().meshes.refcount(descriptor)
    }

    pub fn material_refcount(&self, descriptor: &Arc<MaterialDescriptor>) -> usize {
        self.lock().materials.refcount(descriptor)
    }

    pub fn texture_refcount(&self, descriptor: &Arc<TextureDescriptor>) -> usize {
        self.lock().textures.refcount(descriptor)
    }

    pub fn renderbuffer_refcount(&self, descriptor: &Arc<RenderbufferDescriptor>) -> usize {
        self.lock().renderbuffers.refcount(descriptor)
    }

    pub fn counts(&self) -> CacheCounts {
        let caches = self.lock();
        CacheCounts {
            meshes: caches.meshes.len(),
            textures: caches.textures.len(),
            materials: caches.materials.len(),
            renderbuffers: caches.renderbuffers.len(),
        }
    }

    /// Allocate renderbuffers that are not resident yet
    ///
    /// Render thread only. Failures are logged and retried next frame.
    pub fn upload_pending_renderbuffers(&self, backend: &mut dyn GraphicsBackend) -> usize {
        let pending: Vec<Arc<RenderbufferEntry>> = self
            .lock()
            .renderbuffers
            .entries()
            .filter(|entry| entry.needs_upload())
            .cloned()
            .collect();

        let mut allocated = 0;
        for entry in pending {
            match backend.allocate_renderbuffer(&entry) {
                Ok(()) => {
                    entry.mark_uploaded();
                    allocated += 1;
                    debug!(name = entry.label(), id = %entry.id(), "Allocated renderbuffer");
                }
                Err(err) => {
                    error!(name = entry.label(), error = %err, "Failed to allocate renderbuffer");
                }
            }
        }
        allocated
    }

    /// Mark every uploaded entry outdated so it uploads again
    ///
    /// Render thread only, after the backend lost its GPU objects. Retired
    /// entries are left alone and still go through `collect_garbage`.
    pub fn invalidate_all(&self) -> usize {
        let caches = self.lock();
        let invalidated = caches.meshes.entries().filter(|entry| entry.invalidate()).count()
            + caches.textures.entries().filter(|entry| entry.invalidate()).count()
            + caches.materials.entries().filter(|entry| entry.invalidate()).count()
            + caches.renderbuffers.entries().filter(|entry| entry.invalidate()).count()
            + usize::from(self.default_material.invalidate());
        info!(invalidated, "Invalidated GPU entries");
        invalidated
    }

    /// Destroy retired entries no frame references anymore
    ///
    /// Render thread only. Materials go first so the textures they release
    /// become collectable in the same pass.
    pub fn collect_garbage(&self, backend: &mut dyn GraphicsBackend) -> usize {
        let mut caches = self.lock();
        let destroyed = caches.materials.collect_garbage(backend)
            + caches.meshes.collect_garbage(backend)
            + caches.textures.collect_garbage(backend)
            + caches.renderbuffers.collect_garbage(backend);
        if destroyed > 0 {
            debug!(destroyed, "Destroyed retired GPU entries");
        }
        destroyed
    }

    fn lock(&self) -> MutexGuard<'_, Caches> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Caches {
    fn acquire_instance(&mut self, instance: &MeshInstance) -> ResolvedMeshInstance {
        ResolvedMeshInstance {
            meshes: instance
                .meshes
                .iter()
                .map(|mesh| self.meshes.acquire(mesh))
                .collect(),
            materials: instance
                .materials
                .iter()
                .map(|material| self.acquire_material(material))
                .collect(),
        }
    }

    fn release_instance(&mut self, instance: &MeshInstance) {
        for mesh in &instance.meshes {
            self.meshes.release(mesh);
        }
        for material in &instance.materials {
            self.release_material(material);
        }
    }

    fn acquire_material(&mut self, descriptor: &Arc<MaterialDescriptor>) -> Option<Arc<MaterialEntry>> {
        let Caches {
            materials,
            textures,
            ..
        } = self;
        materials.acquire_with(descriptor, |descriptor| {
            descriptor.validate()?;
            let texture = match &descriptor.texture {
                Some(texture) => match textures.acquire(texture) {
                    Some(entry) => Some(entry),
                    None => {
                        textures.release(texture);
                        return Err(ResourceError::TextureUnavailable {
                            material: descriptor.name.clone(),
                            texture: texture.source.clone(),
                        });
                    }
                },
                None => None,
            };
            MaterialEntry::create(descriptor, texture)
        })
    }

    fn release_material(&mut self, descriptor: &Arc<MaterialDescriptor>) {
        // Only created materials hold a texture reference
        if let Release::Evicted(Some(_)) = self.materials.release(descriptor) {
            if let Some(texture) = &descriptor.texture {
                self.textures.release(texture);
            }
        }
    }
}

fn write_resolved(world: &mut SceneWorld, entity: Entity, resolved: ResolvedMeshInstance) {
    if world.inner_mut().insert_one(entity, resolved).is_err() {
        trace!(entity = ?entity, "Entity gone before its resources resolved");
    }
}
