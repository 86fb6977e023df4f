//! Render-facing components
//!
//! `MeshInstance` and `RenderTarget` are authored by the scene. The resource
//! managers answer each change by writing a `ResolvedMeshInstance` holding the
//! GPU entries the renderer draws with.

use super::descriptor::{AnimationClip, RenderbufferDescriptor};
use super::entry::{MaterialEntry, MeshEntry};
use super::material::MaterialDescriptor;
use super::mesh::MeshDescriptor;
use glam::Mat4;
use std::sync::Arc;

/// Meshes drawn for one entity
///
/// Mesh `i` is drawn with `materials[material_indices[i]]`. An instance with
/// no materials is drawn with the default material.
#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub meshes: Vec<Arc<MeshDescriptor>>,
    /// Per-mesh index into `materials`; a missing index means 0
    pub material_indices: Vec<usize>,
    pub materials: Vec<Arc<MaterialDescriptor>>,
    /// Model matrix applied before the entity's world transform
    pub model: Mat4,
}

impl MeshInstance {
    /// Single mesh with a single material
    pub fn new(mesh: Arc<MeshDescriptor>, material: Arc<MaterialDescriptor>) -> Self {
        Self {
            meshes: vec![mesh],
            material_indices: vec![0],
            materials: vec![material],
            model: Mat4::IDENTITY,
        }
    }

    /// Single mesh drawn with the default material
    pub fn untextured(mesh: Arc<MeshDescriptor>) -> Self {
        Self {
            meshes: vec![mesh],
            material_indices: Vec::new(),
            materials: Vec::new(),
            model: Mat4::IDENTITY,
        }
    }

    /// Append a mesh using the material at `material_index`
    pub fn with_mesh(mut self, mesh: Arc<MeshDescriptor>, material_index: usize) -> Self {
        self.material_indices.resize(self.meshes.len(), 0);
        self.meshes.push(mesh);
        self.material_indices.push(material_index);
        self
    }

    pub fn with_material(mut self, material: Arc<MaterialDescriptor>) -> Self {
        self.materials.push(material);
        self
    }

    pub fn with_model(mut self, model: Mat4) -> Self {
        self.model = model;
        self
    }

    /// Material index used by mesh `mesh_index`
    pub fn material_index(&self, mesh_index: usize) -> usize {
        self.material_indices.get(mesh_index).copied().unwrap_or(0)
    }
}

/// GPU entries resolved for a `MeshInstance`, parallel to its lists
///
/// `None` marks a descriptor whose entry could not be created; draws skip it.
#[derive(Debug, Clone, Default)]
pub struct ResolvedMeshInstance {
    pub meshes: Vec<Option<Arc<MeshEntry>>>,
    pub materials: Vec<Option<Arc<MaterialEntry>>>,
}

/// Animation clip and frame the entity is posed at
#[derive(Debug, Clone)]
pub struct AnimationState {
    pub clip: Arc<AnimationClip>,
    pub frame: u32,
}

impl AnimationState {
    pub fn new(clip: Arc<AnimationClip>, frame: u32) -> Self {
        Self { clip, frame }
    }
}

/// Keeps an off-screen renderbuffer allocated while the entity exists
#[derive(Debug, Clone)]
pub struct RenderTarget(pub Arc<RenderbufferDescriptor>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_index_defaults_to_zero() {
        let cube = Arc::new(MeshDescriptor::cube("cube", 1.0));
        let plane = Arc::new(MeshDescriptor::plane("plane", 1.0, 1.0));
        let red = Arc::new(MaterialDescriptor::from_rgb("red", 1.0, 0.0, 0.0));
        let blue = Arc::new(MaterialDescriptor::from_rgb("blue", 0.0, 0.0, 1.0));

        let instance = MeshInstance::new(cube, red)
            .with_material(blue)
            .with_mesh(plane, 1);
        assert_eq!(instance.material_index(0), 0);
        assert_eq!(instance.material_index(1), 1);
        assert_eq!(instance.material_index(5), 0);
    }

    #[test]
    fn test_untextured_instance_has_no_materials() {
        let cube = Arc::new(MeshDescriptor::cube("cube", 1.0));
        let instance = MeshInstance::untextured(cube).with_mesh(
            Arc::new(MeshDescriptor::plane("floor", 2.0, 2.0)),
            0,
        );
        assert!(instance.materials.is_empty());
        assert_eq!(instance.material_indices, vec![0, 0]);
    }
}
