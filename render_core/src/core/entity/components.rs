//! Core components for the entity system

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Camera mask value selecting every camera
pub const ALL_CAMERAS: u32 = u32::MAX;

/// Transform component representing position, rotation, and scale in local space
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    /// Position in local space
    pub position: Vec3,
    /// Rotation in local space as a quaternion
    pub rotation: Quat,
    /// Scale in local space
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform with the given position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Convert this transform to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// World-space transform of a renderable, light or camera entity
///
/// Visibility and camera-mask decisions are made upstream; the renderer only
/// reads the resolved flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WorldTransform {
    /// World-space transformation matrix
    pub matrix: Mat4,
    /// Whether the entity should be drawn this frame
    pub visible: bool,
    /// Bitfield of cameras this entity is relevant to
    pub camera_mask: u32,
}

impl Default for WorldTransform {
    fn default() -> Self {
        Self {
            matrix: Mat4::IDENTITY,
            visible: true,
            camera_mask: ALL_CAMERAS,
        }
    }
}

impl WorldTransform {
    /// Create a visible world transform seen by every camera
    pub fn from_matrix(matrix: Mat4) -> Self {
        Self {
            matrix,
            ..Default::default()
        }
    }

    /// Create a visible world transform at the given position
    pub fn from_position(position: Vec3) -> Self {
        Self::from_matrix(Mat4::from_translation(position))
    }

    /// Restrict the transform to the cameras selected by `mask`
    pub fn with_camera_mask(mut self, mask: u32) -> Self {
        self.camera_mask = mask;
        self
    }

    /// Mark the transform as hidden
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Get the world position from the transformation matrix
    pub fn position(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }

    /// Forward axis (-Z) in world space
    pub fn forward(&self) -> Vec3 {
        (-self.matrix.z_axis.truncate()).normalize_or_zero()
    }

    /// Whether a camera with `mask` should consider this entity
    pub fn is_seen_by(&self, mask: u32) -> bool {
        self.visible && self.camera_mask & mask != 0
    }
}

/// Name component for user-friendly entity identification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Name(pub String);

impl Name {
    /// Create a new name component
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}
