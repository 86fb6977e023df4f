//! Per-camera batch accumulator
//!
//! The logical thread appends every visible (mesh, material, transform)
//! tuple for a camera into a `CameraOutput`. After the frame is handed over
//! the render thread uploads what is missing and issues one instanced draw
//! per batch, opaque batches first.

use super::batch::{AnimationKey, BatchSet};
use super::upload_budget::{BudgetTimer, FrameUploads};
use crate::core::camera::{Camera, DepthSortMode};
use crate::core::entity::WorldTransform;
use crate::graphics::backend::{BackendError, GraphicsBackend};
use crate::graphics::entry::{MaterialEntry, MeshEntry, RenderbufferEntry};
use crate::profile_zone;
use glam::{Mat4, Vec3};
use std::sync::Arc;
use tracing::trace;

/// Camera state captured when the output was created
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub position: Vec3,
    pub forward: Vec3,
    pub view_projection: Mat4,
    pub sort_mode: DepthSortMode,
    pub mask: u32,
}

impl CameraView {
    pub fn new(camera: &Camera, transform: &WorldTransform) -> Self {
        Self {
            position: transform.position(),
            forward: transform.forward(),
            view_projection: camera.view_projection_matrix(transform),
            sort_mode: camera.sort_mode,
            mask: camera.mask,
        }
    }

    /// Sort depth of a world-space point, larger is farther
    pub fn depth(&self, point: Vec3) -> f32 {
        self.sort_mode.depth(self.position, self.forward, point)
    }
}

/// Counters for one camera output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputStats {
    pub entities: usize,
    pub materials: usize,
    pub meshes: usize,
    pub instances: usize,
    /// Batches deferred by the upload budget
    pub skipped: usize,
    pub uploads: usize,
    pub draw_calls: usize,
}

/// How many transparent batches and instances get depth sorted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortLimits {
    pub max_batches: usize,
    pub max_instances: usize,
}

impl Default for SortLimits {
    fn default() -> Self {
        Self {
            max_batches: 10,
            max_instances: 10,
        }
    }
}

/// Batches collected for one camera in one frame
#[derive(Debug, Clone)]
pub struct CameraOutput {
    view: CameraView,
    target: Option<Arc<RenderbufferEntry>>,
    opaque: BatchSet,
    transparent: BatchSet,
    stats: OutputStats,
}

impl CameraOutput {
    /// Empty output rendering into `target`, or the screen when `None`
    pub fn new(view: CameraView, target: Option<Arc<RenderbufferEntry>>) -> Self {
        Self {
            view,
            target,
            opaque: BatchSet::new(),
            transparent: BatchSet::new(),
            stats: OutputStats::default(),
        }
    }

    pub fn view(&self) -> &CameraView {
        &self.view
    }

    pub fn target(&self) -> Option<&Arc<RenderbufferEntry>> {
        self.target.as_ref()
    }

    pub fn is_offscreen(&self) -> bool {
        self.target.is_some()
    }

    pub fn opaque(&self) -> &BatchSet {
        &self.opaque
    }

    pub fn transparent(&self) -> &BatchSet {
        &self.transparent
    }

    pub fn stats(&self) -> &OutputStats {
        &self.stats
    }

    /// Count an entity that contributed instances
    pub fn count_entity(&mut self) {
        self.stats.entities += 1;
    }

    /// Add one instance to the batch forest
    ///
    /// Routed by material transparency, then grouped by material merge key
    /// and mesh entry. Single producer only.
    pub fn append_instance(
        &mut self,
        mesh: &Arc<MeshEntry>,
        material: &Arc<MaterialEntry>,
        matrix: Mat4,
        animation: Option<AnimationKey>,
    ) {
        let set = if material.has_transparency() {
            &mut self.transparent
        } else {
            &mut self.opaque
        };
        let appended = set.push(material, mesh, matrix, animation);
        self.stats.materials += usize::from(appended.new_material);
        self.stats.meshes += usize::from(appended.new_mesh);
        self.stats.instances += 1;
    }

    /// Order transparent geometry back-to-front for this camera
    pub fn sort_transparent(&mut self, limits: SortLimits) {
        let view = self.view;
        for batch in self.transparent.batches_mut() {
            batch.sort_back_to_front(
                |point| view.depth(point),
                limits.max_batches,
                limits.max_instances,
            );
        }
    }

    /// Upload what fits in the budget and draw every ready batch
    ///
    /// Opaque batches render before transparent ones. A batch whose material
    /// or mesh is deferred is skipped this frame and retried on the next.
    pub fn render(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        uploads: &mut FrameUploads,
        limits: SortLimits,
    ) -> Result<(), BackendError> {
        profile_zone!("CameraOutput::render");
        self.sort_transparent(limits);
        render_set(&self.opaque, backend, uploads, &mut self.stats)?;
        render_set(&self.transparent, backend, uploads, &mut self.stats)?;
        trace!(
            draws = self.stats.draw_calls,
            skipped = self.stats.skipped,
            offscreen = self.is_offscreen(),
            "Camera output rendered"
        );
        Ok(())
    }
}

fn render_set(
    set: &BatchSet,
    backend: &mut dyn GraphicsBackend,
    uploads: &mut FrameUploads,
    stats: &mut OutputStats,
) -> Result<(), BackendError> {
    for batch in set.batches() {
        let material = batch.material();
        if material.needs_upload() {
            if !uploads.materials.try_begin(material.upload_immediately()) {
                stats.skipped += 1;
                continue;
            }
            upload_material(backend, &mut uploads.materials, material)?;
            stats.uploads += 1;
        }

        for mesh_batch in batch.meshes() {
            let mesh = mesh_batch.mesh();
            if mesh.needs_upload() {
                if !uploads.meshes.try_begin(false) {
                    stats.skipped += 1;
                    continue;
                }
                uploads.meshes.measure(|| backend.upload_mesh(mesh))?;
                mesh.mark_uploaded();
                stats.uploads += 1;
            }

            if !mesh_batch.matrices().is_empty() {
                backend.draw_mesh_instanced(mesh, material, mesh_batch.matrices(), None)?;
                stats.draw_calls += 1;
            }
            for animated in mesh_batch.animations() {
                backend.draw_mesh_instanced(mesh, material, &animated.matrices, Some(&animated.key))?;
                stats.draw_calls += 1;
            }
        }
    }
    Ok(())
}

fn upload_material(
    backend: &mut dyn GraphicsBackend,
    timer: &mut BudgetTimer,
    material: &MaterialEntry,
) -> Result<(), BackendError> {
    timer.measure(|| {
        if let Some(texture) = material.texture().filter(|texture| texture.needs_upload()) {
            backend.upload_texture(texture)?;
            texture.mark_uploaded();
        }
        backend.upload_material(material)
    })?;
    material.mark_uploaded();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::descriptor::ResourceKind;
    use crate::graphics::headless::HeadlessBackend;
    use crate::graphics::material::MaterialDescriptor;
    use crate::graphics::mesh::MeshDescriptor;
    use crate::render::upload_budget::UploadBudget;

    fn view() -> CameraView {
        CameraView {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            view_projection: Mat4::IDENTITY,
            sort_mode: DepthSortMode::Orbit,
            mask: 1,
        }
    }

    fn mesh(name: &str) -> Arc<MeshEntry> {
        Arc::new(MeshEntry::create(&Arc::new(MeshDescriptor::cube(name, 1.0))).unwrap())
    }

    fn material(name: &str, alpha: f32) -> Arc<MaterialEntry> {
        let descriptor = Arc::new(MaterialDescriptor::new(name, [1.0, 1.0, 1.0, alpha]));
        Arc::new(MaterialEntry::create(&descriptor, None).unwrap())
    }

    #[test]
    fn test_append_routes_by_transparency() {
        let mut output = CameraOutput::new(view(), None);
        let cube = mesh("cube");
        output.append_instance(&cube, &material("solid", 1.0), Mat4::IDENTITY, None);
        output.append_instance(&cube, &material("glass", 0.5), Mat4::IDENTITY, None);

        assert_eq!(output.opaque().len(), 1);
        assert_eq!(output.transparent().len(), 1);
        assert_eq!(output.stats().materials, 2);
        assert_eq!(output.stats().meshes, 2);
        assert_eq!(output.stats().instances, 2);
    }

    #[test]
    fn test_render_uploads_then_draws() {
        let mut output = CameraOutput::new(view(), None);
        let cube = mesh("cube");
        let solid = material("solid", 1.0);
        for z in 0..3 {
            output.append_instance(&cube, &solid, Mat4::from_translation(Vec3::Z * z as f32), None);
        }

        let mut backend = HeadlessBackend::new();
        let mut uploads = UploadBudget::unbounded().start();
        output
            .render(&mut backend, &mut uploads, SortLimits::default())
            .unwrap();

        assert_eq!(backend.upload_count(ResourceKind::Mesh), 1);
        assert_eq!(backend.upload_count(ResourceKind::Material), 1);
        assert_eq!(backend.draw_count(), 1);
        assert_eq!(output.stats().draw_calls, 1);
        assert!(cube.is_uploaded() && solid.is_uploaded());
    }

    #[test]
    fn test_deferred_material_skips_its_meshes() {
        let mut output = CameraOutput::new(view(), None);
        let cube = mesh("cube");
        output.append_instance(&cube, &material("solid", 1.0), Mat4::IDENTITY, None);

        let mut backend = HeadlessBackend::new();
        let mut uploads = UploadBudget::new(Some(std::time::Duration::ZERO), None).start();
        output
            .render(&mut backend, &mut uploads, SortLimits::default())
            .unwrap();

        assert_eq!(output.stats().skipped, 1);
        assert_eq!(backend.draw_count(), 0);
        assert!(!cube.is_uploaded());
    }

    #[test]
    fn test_upload_failure_propagates() {
        let mut output = CameraOutput::new(view(), None);
        output.append_instance(&mesh("broken"), &material("solid", 1.0), Mat4::IDENTITY, None);

        let mut backend = HeadlessBackend::new();
        backend.fail_uploads_of("broken");
        let mut uploads = UploadBudget::unbounded().start();
        let result = output.render(&mut backend, &mut uploads, SortLimits::default());
        assert!(matches!(result, Err(BackendError::Upload { .. })));
    }
}
