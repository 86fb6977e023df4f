//! GPU resource entries
//!
//! One entry exists per distinct descriptor while it is referenced. Entries
//! are created on the logical thread and uploaded on the render thread, so the
//! upload state is atomic.

use super::descriptor::{Descriptor, RenderbufferDescriptor, ResourceError, ResourceKind};
use super::material::{MaterialDescriptor, MaterialKey, TextureDescriptor};
use super::mesh::MeshDescriptor;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle the backend uses to name its GPU objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    fn next() -> Self {
        Self(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Upload state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UploadState {
    /// Never uploaded
    Pending = 0,
    /// Resident and current
    Uploaded = 1,
    /// Resident but the CPU data changed; needs a re-upload
    Outdated = 2,
}

impl UploadState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => UploadState::Uploaded,
            2 => UploadState::Outdated,
            _ => UploadState::Pending,
        }
    }
}

/// Common surface of every entry kind
pub trait ResourceEntry: Send + Sync {
    fn id(&self) -> EntryId;
    fn state(&self) -> UploadState;

    /// Whether the backend holds GPU objects for this entry
    fn is_resident(&self) -> bool {
        self.state() != UploadState::Pending
    }
}

/// GPU entry backed by descriptor `D`
#[derive(Debug)]
pub struct GpuEntry<D> {
    id: EntryId,
    descriptor: Arc<D>,
    state: AtomicU8,
}

impl<D: Descriptor> GpuEntry<D> {
    /// Validate `descriptor` and create a pending entry for it
    pub fn create(descriptor: &Arc<D>) -> Result<Self, ResourceError> {
        descriptor.validate()?;
        Ok(Self::new(Arc::clone(descriptor)))
    }

    pub fn kind(&self) -> ResourceKind {
        D::KIND
    }

    pub fn label(&self) -> &str {
        self.descriptor.label()
    }
}

impl<D> GpuEntry<D> {
    fn new(descriptor: Arc<D>) -> Self {
        Self {
            id: EntryId::next(),
            descriptor,
            state: AtomicU8::new(UploadState::Pending as u8),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn descriptor(&self) -> &Arc<D> {
        &self.descriptor
    }

    pub fn state(&self) -> UploadState {
        UploadState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Resident and current
    pub fn is_uploaded(&self) -> bool {
        self.state() == UploadState::Uploaded
    }

    pub fn is_outdated(&self) -> bool {
        self.state() == UploadState::Outdated
    }

    /// Whether the next draw must upload first
    pub fn needs_upload(&self) -> bool {
        !self.is_uploaded()
    }

    /// Record a successful upload
    pub fn mark_uploaded(&self) {
        self.state
            .store(UploadState::Uploaded as u8, Ordering::Release);
    }

    /// Flag a resident entry for re-upload; pending entries stay pending
    ///
    /// Returns `true` if the entry was uploaded before.
    pub fn invalidate(&self) -> bool {
        self.state
            .compare_exchange(
                UploadState::Uploaded as u8,
                UploadState::Outdated as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl<D: Send + Sync> ResourceEntry for GpuEntry<D> {
    fn id(&self) -> EntryId {
        self.id
    }

    fn state(&self) -> UploadState {
        GpuEntry::state(self)
    }
}

pub type MeshEntry = GpuEntry<MeshDescriptor>;
pub type TextureEntry = GpuEntry<TextureDescriptor>;
pub type RenderbufferEntry = GpuEntry<RenderbufferDescriptor>;

/// Material entry with its resolved texture and batching data
#[derive(Debug)]
pub struct MaterialEntry {
    gpu: GpuEntry<MaterialDescriptor>,
    key: MaterialKey,
    transparent: bool,
    texture: Option<Arc<TextureEntry>>,
}

impl MaterialEntry {
    /// Validate `descriptor` and bind it to an already resolved texture entry
    pub fn create(
        descriptor: &Arc<MaterialDescriptor>,
        texture: Option<Arc<TextureEntry>>,
    ) -> Result<Self, ResourceError> {
        descriptor.validate()?;
        Ok(Self {
            gpu: GpuEntry::new(Arc::clone(descriptor)),
            key: descriptor.merge_key(),
            transparent: descriptor.has_transparency(),
            texture,
        })
    }

    pub fn has_transparency(&self) -> bool {
        self.transparent
    }

    pub fn merge_key(&self) -> &MaterialKey {
        &self.key
    }

    pub fn texture(&self) -> Option<&Arc<TextureEntry>> {
        self.texture.as_ref()
    }

    pub fn upload_immediately(&self) -> bool {
        self.gpu.descriptor().upload_immediately
    }
}

impl Deref for MaterialEntry {
    type Target = GpuEntry<MaterialDescriptor>;

    fn deref(&self) -> &Self::Target {
        &self.gpu
    }
}

impl ResourceEntry for MaterialEntry {
    fn id(&self) -> EntryId {
        self.gpu.id()
    }

    fn state(&self) -> UploadState {
        self.gpu.state()
    }
}
