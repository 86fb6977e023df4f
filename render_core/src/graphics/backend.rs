//! Graphics backend contract
//!
//! The renderer never talks to a graphics API directly. Everything that
//! touches the GPU goes through a `GraphicsBackend`, and only the render
//! thread holds one.

use super::descriptor::ResourceKind;
use super::entry::{EntryId, MaterialEntry, MeshEntry, RenderbufferEntry, TextureEntry};
use crate::render::batch::AnimationKey;
use crate::render::lights::Light;
use glam::{Mat4, Vec3};

/// Failures reported by a backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to upload {kind} '{name}': {reason}")]
    Upload {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    #[error("failed to allocate renderbuffer '{name}': {reason}")]
    Allocation { name: String, reason: String },

    #[error("render pass failed: {0}")]
    Pass(String),

    #[error("draw call failed: {0}")]
    Draw(String),
}

/// Operations the renderer needs from a graphics API
///
/// Implementations create GPU objects keyed by `EntryId` on upload and free
/// them on `destroy`. Upload state bookkeeping stays with the caller.
pub trait GraphicsBackend: Send {
    fn upload_mesh(&mut self, mesh: &MeshEntry) -> Result<(), BackendError>;

    fn upload_texture(&mut self, texture: &TextureEntry) -> Result<(), BackendError>;

    /// Upload material parameters; the material's texture is uploaded first by the caller
    fn upload_material(&mut self, material: &MaterialEntry) -> Result<(), BackendError>;

    fn allocate_renderbuffer(&mut self, renderbuffer: &RenderbufferEntry)
        -> Result<(), BackendError>;

    /// Free the GPU objects of a resident entry
    fn destroy(&mut self, kind: ResourceKind, id: EntryId);

    /// Start drawing into `target`, or the screen when `None`
    fn begin_pass(&mut self, target: Option<&RenderbufferEntry>) -> Result<(), BackendError>;

    fn end_pass(&mut self) -> Result<(), BackendError>;

    fn set_camera(&mut self, position: Vec3, view_projection: Mat4);

    /// Replace the light slots with `lights`; slots past the slice are disabled
    fn apply_lights(&mut self, lights: &[Light]);

    fn apply_ambient_light(&mut self, color: Vec3);

    /// Draw `mesh` once per matrix with `material`
    fn draw_mesh_instanced(
        &mut self,
        mesh: &MeshEntry,
        material: &MaterialEntry,
        matrices: &[Mat4],
        animation: Option<&AnimationKey>,
    ) -> Result<(), BackendError>;

    /// Whether every GPU object was lost since the last call
    ///
    /// After a loss the caller marks all resident entries outdated so they
    /// upload again. Backends that cannot lose their device keep the default.
    fn take_device_lost(&mut self) -> bool {
        false
    }
}
