//! Per-frame upload time budgets
//!
//! Uploading a resource happens synchronously on the render thread. To keep
//! frame times stable the time spent uploading materials and meshes is
//! measured, and once a kind's budget is spent further uploads of that kind
//! wait for a later frame.

use crate::config::RendererConfig;
use std::time::{Duration, Instant};
use tracing::warn;

/// Upload allowance for one frame; `None` means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadBudget {
    pub material: Option<Duration>,
    pub mesh: Option<Duration>,
}

impl UploadBudget {
    pub fn new(material: Option<Duration>, mesh: Option<Duration>) -> Self {
        Self { material, mesh }
    }

    pub fn unbounded() -> Self {
        Self::new(None, None)
    }

    /// Budget from the millisecond values of `config`
    ///
    /// Negative or NaN values become a zero budget, values too large for a
    /// `Duration` become unbounded.
    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            material: budget_from_ms("material_upload_budget_ms", config.material_upload_budget_ms),
            mesh: budget_from_ms("mesh_upload_budget_ms", config.mesh_upload_budget_ms),
        }
    }

    /// Start measuring a frame
    pub fn start(&self) -> FrameUploads {
        FrameUploads {
            materials: BudgetTimer::new(self.material),
            meshes: BudgetTimer::new(self.mesh),
        }
    }
}

fn budget_from_ms(field: &'static str, ms: Option<f64>) -> Option<Duration> {
    let ms = ms?;
    if ms.is_nan() || ms < 0.0 {
        warn!(field, ms, "Invalid upload budget, deferring uploads of this kind");
        return Some(Duration::ZERO);
    }
    Duration::try_from_secs_f64(ms / 1000.0).ok()
}

impl Default for UploadBudget {
    fn default() -> Self {
        Self::from_config(&RendererConfig::default())
    }
}

/// Time spent on uploads of one kind during a frame
#[derive(Debug, Clone)]
pub struct BudgetTimer {
    limit: Option<Duration>,
    spent: Duration,
    uploads: usize,
    deferred: usize,
}

impl BudgetTimer {
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            limit,
            spent: Duration::ZERO,
            uploads: 0,
            deferred: 0,
        }
    }

    /// Whether another upload may start; immediate resources always may
    pub fn allows(&self, immediate: bool) -> bool {
        immediate || self.limit.map_or(true, |limit| self.spent < limit)
    }

    /// Check the budget and count the resource as deferred when it is spent
    pub fn try_begin(&mut self, immediate: bool) -> bool {
        let allowed = self.allows(immediate);
        if !allowed {
            self.deferred += 1;
        }
        allowed
    }

    /// Run an upload and charge its wall-clock time to this budget
    pub fn measure<R>(&mut self, upload: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let result = upload();
        self.spent += started.elapsed();
        self.uploads += 1;
        result
    }

    pub fn spent(&self) -> Duration {
        self.spent
    }

    pub fn uploads(&self) -> usize {
        self.uploads
    }

    pub fn deferred(&self) -> usize {
        self.deferred
    }
}

/// Material and mesh timers for one frame, shared by every camera
#[derive(Debug, Clone)]
pub struct FrameUploads {
    pub materials: BudgetTimer,
    pub meshes: BudgetTimer,
}
