//! Light components
//!
//! Lights are positioned by the `WorldTransform` on the same entity. The
//! collector in `render::lights` turns them into per-frame light slots.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Light shining along the forward axis of its transform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DirectionalLight {
    /// Linear RGB color, premultiplied by intensity
    pub color: Vec3,
}

impl DirectionalLight {
    pub fn new(color: Vec3) -> Self {
        Self { color }
    }
}

/// Positional light aimed at a target point with a cone opening
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PointLight {
    /// Linear RGB color, premultiplied by intensity
    pub color: Vec3,
    /// World-space point the light is aimed at
    pub target: Vec3,
    /// Distance at which the light has fully fallen off
    pub distance: f32,
    /// Cosine of the half opening angle; `-1.0` lights every direction
    pub cos_opening: f32,
}

impl PointLight {
    /// Omnidirectional point light
    pub fn new(color: Vec3, distance: f32) -> Self {
        Self {
            color,
            target: Vec3::ZERO,
            distance,
            cos_opening: -1.0,
        }
    }

    /// Restrict the light to a cone around `target`
    pub fn aimed_at(mut self, target: Vec3, opening_degrees: f32) -> Self {
        self.target = target;
        self.cos_opening = (opening_degrees.to_radians() * 0.5).cos();
        self
    }
}

/// Uniform light added to every surface
///
/// Any number of ambient lights may exist; their colors are summed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AmbientLight {
    pub color: Vec3,
}

impl AmbientLight {
    pub fn new(color: Vec3) -> Self {
        Self { color }
    }
}
