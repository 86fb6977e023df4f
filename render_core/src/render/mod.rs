//! Frame pipeline
//!
//! The logical thread turns the scene into `RenderFrame`s through a
//! `LogicalRenderer`; the render thread draws them with a `FrameRenderer`.
//! The two meet at a single-slot `FrameQueue`.

pub mod batch;
pub mod camera_output;
pub mod frame;
pub mod frame_queue;
pub mod frame_renderer;
pub mod lights;
pub mod logical_renderer;
pub mod upload_budget;

pub use batch::{AnimationBatch, AnimationKey, BatchSet, MaterialBatch, MeshBatch};
pub use camera_output::{CameraOutput, CameraView, OutputStats, SortLimits};
pub use frame::{FrameStats, FrameStatsHistory, RenderFrame};
pub use frame_queue::FrameQueue;
pub use frame_renderer::FrameRenderer;
pub use lights::{GpuLight, Light, LightCollector, LightKind, LightSet, MAX_LIGHTS};
pub use logical_renderer::{LogicalRenderer, TickOutcome};
pub use upload_budget::{BudgetTimer, FrameUploads, UploadBudget};

use crate::config::RendererConfig;
use crate::graphics::resource_manager::ResourceManagers;
use std::sync::Arc;

/// Create both ends of a frame pipeline sharing `managers`
pub fn pipeline(
    managers: Arc<ResourceManagers>,
    config: &RendererConfig,
) -> (LogicalRenderer, FrameRenderer) {
    let queue = Arc::new(FrameQueue::new());
    let logical = LogicalRenderer::new(Arc::clone(&managers), Arc::clone(&queue));
    let renderer = FrameRenderer::new(managers, queue, config);
    (logical, renderer)
}
