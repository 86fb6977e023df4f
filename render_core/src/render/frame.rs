//! Render frames and frame statistics

use super::camera_output::{CameraOutput, OutputStats};
use super::lights::LightSet;
use std::collections::VecDeque;
use std::ops::{Add, Div, Sub};
use std::time::Duration;

/// Everything the render thread needs to draw one tick
///
/// Built on the logical thread, consumed once on the render thread.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    pub number: u64,
    pub lights: LightSet,
    /// Off-screen parts first, screen parts last
    pub parts: Vec<CameraOutput>,
    pub stats: FrameStats,
}

impl RenderFrame {
    pub fn new(number: u64, lights: LightSet) -> Self {
        Self {
            number,
            lights,
            parts: Vec::new(),
            stats: FrameStats::default(),
        }
    }
}

/// Counters and timings of one frame
///
/// Supports `+`, `-` and `/` so a rolling average can be kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub collect_time: Duration,
    pub render_time: Duration,
    pub cameras: u64,
    pub entities: u64,
    pub materials: u64,
    pub meshes: u64,
    pub instances: u64,
    pub skipped: u64,
    pub uploads: u64,
    pub draw_calls: u64,
}

impl FrameStats {
    /// Fold collection counters of one camera output in
    pub fn add_collected(&mut self, output: &OutputStats) {
        self.cameras += 1;
        self.entities += output.entities as u64;
        self.materials += output.materials as u64;
        self.meshes += output.meshes as u64;
        self.instances += output.instances as u64;
    }

    /// Fold render counters of one camera output in
    pub fn add_rendered(&mut self, output: &OutputStats) {
        self.skipped += output.skipped as u64;
        self.uploads += output.uploads as u64;
        self.draw_calls += output.draw_calls as u64;
    }
}

impl Add for FrameStats {
    type Output = FrameStats;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            collect_time: self.collect_time + rhs.collect_time,
            render_time: self.render_time + rhs.render_time,
            cameras: self.cameras + rhs.cameras,
            entities: self.entities + rhs.entities,
            materials: self.materials + rhs.materials,
            meshes: self.meshes + rhs.meshes,
            instances: self.instances + rhs.instances,
            skipped: self.skipped + rhs.skipped,
            uploads: self.uploads + rhs.uploads,
            draw_calls: self.draw_calls + rhs.draw_calls,
        }
    }
}

impl Sub for FrameStats {
    type Output = FrameStats;

    /// Saturates at zero
    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            collect_time: self.collect_time.saturating_sub(rhs.collect_time),
            render_time: self.render_time.saturating_sub(rhs.render_time),
            cameras: self.cameras.saturating_sub(rhs.cameras),
            entities: self.entities.saturating_sub(rhs.entities),
            materials: self.materials.saturating_sub(rhs.materials),
            meshes: self.meshes.saturating_sub(rhs.meshes),
            instances: self.instances.saturating_sub(rhs.instances),
            skipped: self.skipped.saturating_sub(rhs.skipped),
            uploads: self.uploads.saturating_sub(rhs.uploads),
            draw_calls: self.draw_calls.saturating_sub(rhs.draw_calls),
        }
    }
}

impl Div<u32> for FrameStats {
    type Output = FrameStats;

    /// Dividing by zero yields empty stats
    fn div(self, rhs: u32) -> Self::Output {
        if rhs == 0 {
            return Self::default();
        }
        let n = u64::from(rhs);
        Self {
            collect_time: self.collect_time / rhs,
            render_time: self.render_time / rhs,
            cameras: self.cameras / n,
            entities: self.entities / n,
            materials: self.materials / n,
            meshes: self.meshes / n,
            instances: self.instances / n,
            skipped: self.skipped / n,
            uploads: self.uploads / n,
            draw_calls: self.draw_calls / n,
        }
    }
}

/// Bounded history of frame stats with a running total
#[derive(Debug, Clone)]
pub struct FrameStatsHistory {
    capacity: usize,
    samples: VecDeque<FrameStats>,
    total: FrameStats,
}

impl FrameStatsHistory {
    /// History keeping the last `capacity` frames (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            total: FrameStats::default(),
        }
    }

    pub fn push(&mut self, stats: FrameStats) {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.total = self.total - oldest;
            }
        }
        self.total = self.total + stats;
        self.samples.push_back(stats);
    }

    /// Average over the stored frames
    pub fn average(&self) -> FrameStats {
        self.total / self.samples.len() as u32
    }

    pub fn latest(&self) -> Option<&FrameStats> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(draw_calls: u64, render_ms: u64) -> FrameStats {
        FrameStats {
            draw_calls,
            render_time: Duration::from_millis(render_ms),
            ..Default::default()
        }
    }

    #[test]
    fn test_stats_arithmetic() {
        let sum = stats(4, 10) + stats(6, 20);
        assert_eq!(sum.draw_calls, 10);
        assert_eq!(sum.render_time, Duration::from_millis(30));
        assert_eq!((sum - stats(4, 10)), stats(6, 20));
        assert_eq!((sum / 2).draw_calls, 5);
        assert_eq!(stats(1, 1) - stats(2, 2), FrameStats::default());
        assert_eq!(sum / 0, FrameStats::default());
    }

    #[test]
    fn test_history_rolls_over() {
        let mut history = FrameStatsHistory::new(3);
        assert!(history.is_empty());
        assert_eq!(history.average(), FrameStats::default());

        for draws in [3, 6, 9, 12] {
            history.push(stats(draws, draws));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.average().draw_calls, 9);
        assert_eq!(history.average().render_time, Duration::from_millis(9));
        assert_eq!(history.latest().map(|s| s.draw_calls), Some(12));
    }

    #[test]
    fn test_collected_and_rendered_counters() {
        let output = OutputStats {
            entities: 2,
            instances: 5,
            draw_calls: 3,
            skipped: 1,
            ..Default::default()
        };
        let mut frame = FrameStats::default();
        frame.add_collected(&output);
        frame.add_rendered(&output);
        assert_eq!(frame.cameras, 1);
        assert_eq!(frame.instances, 5);
        assert_eq!(frame.draw_calls, 3);
        assert_eq!(frame.skipped, 1);
    }
}
