//! Render-thread side of the frame pipeline
//!
//! Pops frames from the queue and turns them into backend calls: allocate
//! pending renderbuffers, apply lights, render every camera part in order,
//! then destroy entries that are no longer referenced.

use super::camera_output::{CameraOutput, SortLimits};
use super::frame::{FrameStats, FrameStatsHistory, RenderFrame};
use super::frame_queue::FrameQueue;
use super::upload_budget::{FrameUploads, UploadBudget};
use crate::config::RendererConfig;
use crate::graphics::backend::{BackendError, GraphicsBackend};
use crate::graphics::resource_manager::ResourceManagers;
use crate::profile_zone;
use crate::profiling::{mark_frame, set_thread_name};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Consumes render frames on the render thread
pub struct FrameRenderer {
    managers: Arc<ResourceManagers>,
    queue: Arc<FrameQueue>,
    budget: UploadBudget,
    sort_limits: SortLimits,
    history: FrameStatsHistory,
    frames_rendered: u64,
}

impl FrameRenderer {
    pub fn new(
        managers: Arc<ResourceManagers>,
        queue: Arc<FrameQueue>,
        config: &RendererConfig,
    ) -> Self {
        if let Err(err) = config.validate() {
            warn!(error = %err, "Renderer config is invalid, using sanitized values");
        }
        Self {
            managers,
            queue,
            budget: UploadBudget::from_config(config),
            sort_limits: config.sort_limits(),
            history: FrameStatsHistory::new(config.stats_history_len),
            frames_rendered: 0,
        }
    }

    /// Replace the per-frame upload budget
    pub fn set_budget(&mut self, budget: UploadBudget) {
        self.budget = budget;
    }

    pub fn history(&self) -> &FrameStatsHistory {
        &self.history
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Block until a frame arrives and render it
    ///
    /// Returns `None` once quit was requested.
    pub fn render_next(&mut self, backend: &mut dyn GraphicsBackend) -> Option<FrameStats> {
        let frame = self.queue.pop_blocking()?;
        Some(self.render_frame(frame, backend))
    }

    /// Render the next frame if one arrives within `timeout`
    pub fn try_render_next(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        timeout: Duration,
    ) -> Option<FrameStats> {
        let frame = self.queue.pop_timeout(timeout)?;
        Some(self.render_frame(frame, backend))
    }

    /// Render frames until quit is requested; returns the number rendered
    pub fn run(&mut self, backend: &mut dyn GraphicsBackend) -> u64 {
        let mut rendered = 0;
        while self.render_next(backend).is_some() {
            rendered += 1;
        }
        rendered
    }

    /// Move the renderer and its backend onto a dedicated render thread
    ///
    /// The thread exits after `FrameQueue::request_quit` and hands both back.
    pub fn spawn<B>(mut self, mut backend: B) -> std::io::Result<JoinHandle<(Self, B)>>
    where
        B: GraphicsBackend + 'static,
    {
        thread::Builder::new()
            .name("render".to_string())
            .spawn(move || {
                set_thread_name("render");
                info!("Render thread started");
                let frames = self.run(&mut backend);
                info!(frames, "Render thread stopped");
                (self, backend)
            })
    }

    /// Draw one frame
    ///
    /// A failing camera part is logged and the remaining parts still render.
    pub fn render_frame(
        &mut self,
        mut frame: RenderFrame,
        backend: &mut dyn GraphicsBackend,
    ) -> FrameStats {
        profile_zone!("FrameRenderer::render_frame");
        let started = Instant::now();
        let number = frame.number;
        let mut stats = frame.stats;

        if backend.take_device_lost() {
            warn!(frame = number, "Graphics device lost, uploading resources again");
            self.managers.invalidate_all();
        }
        self.managers.upload_pending_renderbuffers(backend);
        backend.apply_lights(frame.lights.enabled());
        backend.apply_ambient_light(frame.lights.ambient);

        let mut uploads = self.budget.start();
        for part in &mut frame.parts {
            let result = render_part(part, backend, &mut uploads, self.sort_limits);
            stats.add_rendered(part.stats());
            if let Err(err) = result {
                error!(
                    frame = number,
                    offscreen = part.is_offscreen(),
                    mask = part.view().mask,
                    error = %err,
                    "Failed to render camera"
                );
            }
        }

        // Entries referenced by this frame become collectable once it is gone
        drop(frame);
        self.managers.collect_garbage(backend);

        stats.render_time = started.elapsed();
        self.history.push(stats);
        self.frames_rendered += 1;
        mark_frame();
        debug!(
            frame = number,
            draws = stats.draw_calls,
            uploads = stats.uploads,
            skipped = stats.skipped,
            render_ms = stats.render_time.as_secs_f64() * 1000.0,
            "Rendered frame"
        );
        stats
    }
}

fn render_part(
    part: &mut CameraOutput,
    backend: &mut dyn GraphicsBackend,
    uploads: &mut FrameUploads,
    limits: SortLimits,
) -> Result<(), BackendError> {
    backend.begin_pass(part.target().map(Arc::as_ref))?;
    backend.set_camera(part.view().position, part.view().view_projection);
    let result = part.render(backend, uploads, limits);
    backend.end_pass()?;
    result
}
