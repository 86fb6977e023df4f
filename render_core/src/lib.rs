//! Frame batching and GPU resource lifecycle core for a real-time renderer
//!
//! The scene lives in a [`core::entity::SceneWorld`]. Resource managers keep
//! one reference counted GPU entry per shared descriptor, the logical thread
//! batches visible instances per camera into render frames, and the render
//! thread uploads and draws them through a [`graphics::GraphicsBackend`].

pub mod config;
pub mod core;
pub mod graphics;
pub mod profiling;
pub mod render;

// Re-export commonly used types
pub mod prelude {
    // Scene types
    pub use crate::core::entity::{
        ComponentEvent, Entity, Name, SceneWorld, Transform, WorldTransform, ALL_CAMERAS,
    };

    // Camera and light components
    pub use crate::core::camera::{Camera, DepthSortMode, ProjectionMode};
    pub use crate::core::light::{AmbientLight, DirectionalLight, PointLight};

    // Math types
    pub use glam::{Mat4, Quat, Vec3, Vec4};

    // Graphics types
    pub use crate::graphics::{
        AnimationClip, AnimationState, GraphicsBackend, HeadlessBackend, MaterialDescriptor,
        MaterialFlags, MeshDescriptor, MeshInstance, RenderTarget, RenderbufferDescriptor,
        ResourceManagers, TextureDescriptor,
    };

    // Frame pipeline types
    pub use crate::render::{
        pipeline, FrameRenderer, FrameStats, LogicalRenderer, TickOutcome, UploadBudget,
    };

    // Config types
    pub use crate::config::RendererConfig;
}

/// Initialize logging
///
/// Honors `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
