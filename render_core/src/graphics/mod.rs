//! Graphics module
//!
//! Resource descriptors, the GPU entries created for them, the reference
//! counted caches that own those entries and the backend contract they are
//! uploaded through.

pub mod backend;
pub mod descriptor;
pub mod entry;
pub mod headless;
pub mod instance;
pub mod material;
pub mod mesh;
pub mod resource_cache;
pub mod resource_manager;

// Re-export commonly used types
pub use backend::{BackendError, GraphicsBackend};
pub use descriptor::{AnimationClip, Descriptor, RenderbufferDescriptor, ResourceError, ResourceKind};
pub use entry::{
    EntryId, GpuEntry, MaterialEntry, MeshEntry, RenderbufferEntry, ResourceEntry, TextureEntry,
    UploadState,
};
pub use headless::{BackendCall, DrawCall, HeadlessBackend};
pub use instance::{AnimationState, MeshInstance, RenderTarget, ResolvedMeshInstance};
pub use material::{MaterialDescriptor, MaterialFlags, MaterialKey, MaterialUniform, TextureDescriptor, TextureKey};
pub use mesh::{MeshDescriptor, Vertex};
pub use resource_cache::{Release, ResourceCache};
pub use resource_manager::{CacheCounts, ResourceManagers};
