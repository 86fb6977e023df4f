//! Mesh descriptors and vertex data
//!
//! A `MeshDescriptor` is the CPU copy of a triangle list. Primitive
//! generators are provided for scenes built in code.

use super::descriptor::{Descriptor, ResourceError, ResourceKind};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex layout shared with the backend
///
/// Tightly packed so the vertex buffer can be uploaded with `bytemuck::cast_slice`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Shared CPU description of an indexed triangle mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDescriptor {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshDescriptor {
    pub fn new(name: impl Into<String>, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
        }
    }

    /// Axis aligned cube centered at the origin
    ///
    /// Every face gets its own four vertices so normals and UVs stay flat.
    pub fn cube(name: impl Into<String>, size: f32) -> Self {
        let half = size * 0.5;
        // (normal, tangent u, tangent v) for each face
        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        ];
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = vertices.len() as u32;
            for (cu, cv) in corners {
                let position = (normal + u * cu + v * cv) * half;
                let uv = [(cu + 1.0) * 0.5, (1.0 - cv) * 0.5];
                vertices.push(Vertex::new(position.to_array(), normal.to_array(), uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(name, vertices, indices)
    }

    /// Double sided quad on the XZ plane
    pub fn plane(name: impl Into<String>, width: f32, depth: f32) -> Self {
        let (hw, hd) = (width * 0.5, depth * 0.5);
        let up = [0.0, 1.0, 0.0];
        let vertices = vec![
            Vertex::new([-hw, 0.0, -hd], up, [0.0, 0.0]),
            Vertex::new([hw, 0.0, -hd], up, [1.0, 0.0]),
            Vertex::new([hw, 0.0, hd], up, [1.0, 1.0]),
            Vertex::new([-hw, 0.0, hd], up, [0.0, 1.0]),
        ];
        let indices = vec![0, 1, 2, 0, 2, 3, 0, 2, 1, 0, 3, 2];

        Self::new(name, vertices, indices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Raw vertex bytes for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

impl Descriptor for MeshDescriptor {
    const KIND: ResourceKind = ResourceKind::Mesh;

    fn label(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), ResourceError> {
        if self.vertices.is_empty() {
            return Err(ResourceError::EmptyMesh(self.name.clone()));
        }
        let vertex_count = self.vertices.len();
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&index| index as usize >= vertex_count)
        {
            return Err(ResourceError::IndexOutOfRange {
                name: self.name.clone(),
                index,
                vertex_count,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn test_cube_layout() {
        let cube = MeshDescriptor::cube("cube", 2.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.validate().is_ok());

        for vertex in &cube.vertices[0..4] {
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
            assert_eq!(vertex.position[2], 1.0);
        }
        assert_eq!(cube.vertex_bytes().len(), 24 * 32);
    }

    #[test]
    fn test_plane_is_flat() {
        let plane = MeshDescriptor::plane("ground", 10.0, 4.0);
        assert_eq!(plane.indices.len(), 12);
        assert!(plane.vertices.iter().all(|v| v.position[1] == 0.0));
    }

    #[test]
    fn test_validation_rejects_bad_meshes() {
        let empty = MeshDescriptor::new("empty", Vec::new(), Vec::new());
        assert!(matches!(empty.validate(), Err(ResourceError::EmptyMesh(_))));

        let vertex = Vertex::new([0.0; 3], [0.0, 1.0, 0.0], [0.0; 2]);
        let dangling = MeshDescriptor::new("dangling", vec![vertex; 3], vec![0, 1, 3]);
        assert!(matches!(
            dangling.validate(),
            Err(ResourceError::IndexOutOfRange { index: 3, vertex_count: 3, .. })
        ));
    }
}
