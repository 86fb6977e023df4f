//! Headless graphics backend
//!
//! Records every call instead of talking to a GPU. Used for offscreen tools,
//! CI runs and the test-suite. Failures can be injected per resource name and
//! uploads can be slowed down to exercise upload budgets.

use super::backend::{BackendError, GraphicsBackend};
use super::descriptor::ResourceKind;
use super::entry::{EntryId, MaterialEntry, MeshEntry, RenderbufferEntry, TextureEntry};
use super::material::MaterialUniform;
use crate::render::batch::AnimationKey;
use crate::render::lights::Light;
use glam::{Mat4, Vec3};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::trace;

/// One recorded instanced draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub mesh: EntryId,
    pub mesh_name: String,
    pub material: EntryId,
    pub material_name: String,
    pub matrices: Vec<Mat4>,
    /// Clip name and frame for animated draws
    pub animation: Option<(String, u32)>,
    /// Pass target name, `None` for the screen
    pub target: Option<String>,
}

impl DrawCall {
    pub fn instance_count(&self) -> usize {
        self.matrices.len()
    }

    /// Translation of every instance, in draw order
    pub fn positions(&self) -> Vec<Vec3> {
        self.matrices
            .iter()
            .map(|matrix| matrix.w_axis.truncate())
            .collect()
    }
}

/// Every call the backend received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    UploadMesh { id: EntryId, name: String, bytes: usize },
    UploadTexture { id: EntryId, name: String },
    UploadMaterial { id: EntryId, name: String, uniform: MaterialUniform },
    AllocateRenderbuffer { id: EntryId, name: String },
    Destroy { kind: ResourceKind, id: EntryId },
    BeginPass { target: Option<String> },
    EndPass,
    SetCamera { position: Vec3 },
    ApplyLights { count: usize },
    ApplyAmbientLight { color: Vec3 },
    Draw(DrawCall),
}

/// Graphics backend that records calls
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    calls: Vec<BackendCall>,
    resident: HashMap<EntryId, ResourceKind>,
    failing_uploads: HashSet<String>,
    failing_passes: HashSet<String>,
    upload_delay: Option<Duration>,
    current_target: Option<String>,
    lights: Vec<Light>,
    ambient: Vec3,
    device_lost: bool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every upload
    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    /// Make uploads of resources labelled `name` fail
    pub fn fail_uploads_of(&mut self, name: impl Into<String>) {
        self.failing_uploads.insert(name.into());
    }

    /// Make passes into the renderbuffer labelled `name` fail
    pub fn fail_pass_for(&mut self, name: impl Into<String>) {
        self.failing_passes.insert(name.into());
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Recorded draws, in submission order
    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.calls.iter().filter_map(|call| match call {
            BackendCall::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    pub fn upload_count(&self, kind: ResourceKind) -> usize {
        self.calls
            .iter()
            .filter(|call| {
                matches!(
                    (call, kind),
                    (BackendCall::UploadMesh { .. }, ResourceKind::Mesh)
                        | (BackendCall::UploadTexture { .. }, ResourceKind::Texture)
                        | (BackendCall::UploadMaterial { .. }, ResourceKind::Material)
                        | (BackendCall::AllocateRenderbuffer { .. }, ResourceKind::Renderbuffer)
                )
            })
            .count()
    }

    pub fn destroy_count(&self, kind: ResourceKind) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Destroy { kind: k, .. } if *k == kind))
            .count()
    }

    /// Number of live GPU objects
    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn is_resident(&self, id: EntryId) -> bool {
        self.resident.contains_key(&id)
    }

    /// Drop every GPU object as a lost device would
    pub fn lose_device(&mut self) {
        self.resident.clear();
        self.device_lost = true;
    }

    /// Lights from the most recent `apply_lights`
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn ambient(&self) -> Vec3 {
        self.ambient
    }

    fn upload(
        &mut self,
        kind: ResourceKind,
        id: EntryId,
        name: &str,
    ) -> Result<(), BackendError> {
        if let Some(delay) = self.upload_delay {
            std::thread::sleep(delay);
        }
        if self.failing_uploads.contains(name) {
            return Err(BackendError::Upload {
                kind,
                name: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        trace!(kind = %kind, id = %id, name, "Headless upload");
        self.resident.insert(id, kind);
        Ok(())
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn upload_mesh(&mut self, mesh: &MeshEntry) -> Result<(), BackendError> {
        self.upload(ResourceKind::Mesh, mesh.id(), mesh.label())?;
        self.calls.push(BackendCall::UploadMesh {
            id: mesh.id(),
            name: mesh.label().to_string(),
            bytes: mesh.descriptor().vertex_bytes().len(),
        });
        Ok(())
    }

    fn upload_texture(&mut self, texture: &TextureEntry) -> Result<(), BackendError> {
        self.upload(ResourceKind::Texture, texture.id(), texture.label())?;
        self.calls.push(BackendCall::UploadTexture {
            id: texture.id(),
            name: texture.label().to_string(),
        });
        Ok(())
    }

    fn upload_material(&mut self, material: &MaterialEntry) -> Result<(), BackendError> {
        self.upload(ResourceKind::Material, material.id(), material.label())?;
        self.calls.push(BackendCall::UploadMaterial {
            id: material.id(),
            name: material.label().to_string(),
            uniform: MaterialUniform::from(material.descriptor().as_ref()),
        });
        Ok(())
    }

    fn allocate_renderbuffer(
        &mut self,
        renderbuffer: &RenderbufferEntry,
    ) -> Result<(), BackendError> {
        let name = renderbuffer.label();
        if self.failing_uploads.contains(name) {
            return Err(BackendError::Allocation {
                name: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.resident
            .insert(renderbuffer.id(), ResourceKind::Renderbuffer);
        self.calls.push(BackendCall::AllocateRenderbuffer {
            id: renderbuffer.id(),
            name: name.to_string(),
        });
        Ok(())
    }

    fn destroy(&mut self, kind: ResourceKind, id: EntryId) {
        self.resident.remove(&id);
        self.calls.push(BackendCall::Destroy { kind, id });
    }

    fn begin_pass(&mut self, target: Option<&RenderbufferEntry>) -> Result<(), BackendError> {
        let target = target.map(|entry| entry.label().to_string());
        if let Some(name) = &target {
            if self.failing_passes.contains(name) {
                return Err(BackendError::Pass(format!("injected failure for '{name}'")));
            }
        }
        self.current_target = target.clone();
        self.calls.push(BackendCall::BeginPass { target });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<(), BackendError> {
        self.current_target = None;
        self.calls.push(BackendCall::EndPass);
        Ok(())
    }

    fn set_camera(&mut self, position: Vec3, _view_projection: Mat4) {
        self.calls.push(BackendCall::SetCamera { position });
    }

    fn apply_lights(&mut self, lights: &[Light]) {
        self.lights = lights.to_vec();
        self.calls.push(BackendCall::ApplyLights {
            count: lights.len(),
        });
    }

    fn apply_ambient_light(&mut self, color: Vec3) {
        self.ambient = color;
        self.calls.push(BackendCall::ApplyAmbientLight { color });
    }

    fn draw_mesh_instanced(
        &mut self,
        mesh: &MeshEntry,
        material: &MaterialEntry,
        matrices: &[Mat4],
        animation: Option<&AnimationKey>,
    ) -> Result<(), BackendError> {
        if !self.is_resident(mesh.id()) || !self.is_resident(material.id()) {
            return Err(BackendError::Draw(format!(
                "'{}' with '{}' drawn before upload",
                mesh.label(),
                material.label()
            )));
        }
        self.calls.push(BackendCall::Draw(DrawCall {
            mesh: mesh.id(),
            mesh_name: mesh.label().to_string(),
            material: material.id(),
            material_name: material.label().to_string(),
            matrices: matrices.to_vec(),
            animation: animation.map(|key| (key.clip().name.clone(), key.frame())),
            target: self.current_target.clone(),
        }));
        Ok(())
    }

    fn take_device_lost(&mut self) -> bool {
        std::mem::take(&mut self.device_lost)
    }
}
