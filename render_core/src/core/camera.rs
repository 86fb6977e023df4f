//! Camera component and utilities
//!
//! Provides the camera descriptor the frame pipeline walks each tick:
//! projection parameters, the camera mask, the transparent sort mode and an
//! optional off-screen render target.

use crate::core::entity::WorldTransform;
use crate::graphics::descriptor::RenderbufferDescriptor;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Camera component that defines projection parameters for rendering
#[derive(Debug, Clone)]
pub struct Camera {
    /// Field of view in radians (for perspective projection)
    pub fov_y_radians: f32,
    /// Aspect ratio (width / height)
    pub aspect_ratio: f32,
    /// Near clipping plane distance
    pub z_near: f32,
    /// Far clipping plane distance
    pub z_far: f32,
    /// Projection mode (perspective or orthographic)
    pub projection_mode: ProjectionMode,
    /// Bitfield matched against `WorldTransform::camera_mask`; zero disables the camera
    pub mask: u32,
    /// How transparent batches are ordered for this camera
    pub sort_mode: DepthSortMode,
    /// Off-screen target; `None` renders straight to the screen
    pub target: Option<Arc<RenderbufferDescriptor>>,
}

/// Projection mode for the camera
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ProjectionMode {
    /// Perspective projection with depth
    Perspective,
    /// Orthographic projection (parallel)
    Orthographic {
        /// Height of the orthographic view
        height: f32,
    },
}

/// Depth metric used to order transparent geometry back-to-front
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DepthSortMode {
    /// Squared distance to the camera position
    #[default]
    Orbit,
    /// Distance along the camera forward axis
    ForwardFlight,
}

impl DepthSortMode {
    /// Depth of `point` as seen from a camera at `eye` looking along `forward`
    ///
    /// Larger values are farther away.
    pub fn depth(self, eye: Vec3, forward: Vec3, point: Vec3) -> f32 {
        match self {
            DepthSortMode::Orbit => eye.distance_squared(point),
            DepthSortMode::ForwardFlight => (point - eye).dot(forward),
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(60.0, 16.0 / 9.0, 0.1, 1000.0)
    }
}

impl Camera {
    /// Create a perspective camera
    ///
    /// # Arguments
    /// * `fov_y_degrees` - Vertical field of view in degrees
    /// * `aspect_ratio` - Width divided by height
    /// * `z_near` - Near clipping plane distance
    /// * `z_far` - Far clipping plane distance
    pub fn perspective(fov_y_degrees: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            fov_y_radians: fov_y_degrees.to_radians(),
            aspect_ratio,
            z_near,
            z_far,
            projection_mode: ProjectionMode::Perspective,
            mask: 1,
            sort_mode: DepthSortMode::Orbit,
            target: None,
        }
    }

    /// Create an orthographic camera
    pub fn orthographic(height: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            fov_y_radians: 0.0,
            projection_mode: ProjectionMode::Orthographic { height },
            ..Self::perspective(0.0, aspect_ratio, z_near, z_far)
        }
    }

    /// Set the camera mask
    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    /// Set the transparent sort mode
    pub fn with_sort_mode(mut self, sort_mode: DepthSortMode) -> Self {
        self.sort_mode = sort_mode;
        self
    }

    /// Render into an off-screen renderbuffer instead of the screen
    pub fn with_target(mut self, target: Arc<RenderbufferDescriptor>) -> Self {
        self.target = Some(target);
        self
    }

    /// Whether this camera renders off-screen
    pub fn is_offscreen(&self) -> bool {
        self.target.is_some()
    }

    /// Calculate the projection matrix for this camera
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection_mode {
            ProjectionMode::Perspective => Mat4::perspective_rh(
                self.fov_y_radians,
                self.aspect_ratio,
                self.z_near,
                self.z_far,
            ),
            ProjectionMode::Orthographic { height } => {
                let half_height = height * 0.5;
                let half_width = half_height * self.aspect_ratio;
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.z_near,
                    self.z_far,
                )
            }
        }
    }

    /// Calculate the view matrix from a camera's world transform
    ///
    /// The view matrix is the inverse of the camera's world transform
    pub fn view_matrix(camera_transform: &WorldTransform) -> Mat4 {
        camera_transform.matrix.inverse()
    }

    /// Calculate the combined view-projection matrix
    pub fn view_projection_matrix(&self, camera_transform: &WorldTransform) -> Mat4 {
        self.projection_matrix() * Self::view_matrix(camera_transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_perspective_projection() {
        let camera = Camera::perspective(60.0, 16.0 / 9.0, 0.1, 1000.0);
        let proj = camera.projection_matrix();

        // Perspective projection has w=0 in the last row
        assert_eq!(proj.w_axis.w, 0.0);
        assert!(proj.z_axis.z < 0.0);
    }

    #[test]
    fn test_camera_orthographic_projection() {
        let camera = Camera::orthographic(10.0, 16.0 / 9.0, 0.1, 1000.0);
        let proj = camera.projection_matrix();

        // Orthographic projection has w=1 in the last row
        assert_eq!(proj.w_axis.w, 1.0);
    }

    #[test]
    fn test_view_matrix() {
        use crate::core::entity::Transform;

        let transform = Transform::from_position(Vec3::new(0.0, 0.0, 5.0));
        let world = WorldTransform::from_matrix(transform.to_matrix());

        let view = Camera::view_matrix(&world);

        // View matrix should translate in opposite direction
        assert_eq!(view.w_axis.z, -5.0);
    }

    #[test]
    fn test_camera_default() {
        let camera = Camera::default();
        assert_eq!(camera.projection_mode, ProjectionMode::Perspective);
        assert_eq!(camera.aspect_ratio, 16.0 / 9.0);
        assert_eq!(camera.mask, 1);
        assert!(!camera.is_offscreen());
    }

    #[test]
    fn test_orbit_depth_is_squared_distance() {
        let depth = DepthSortMode::Orbit.depth(Vec3::ZERO, Vec3::NEG_Z, Vec3::new(0.0, 3.0, 4.0));
        assert_eq!(depth, 25.0);
    }

    #[test]
    fn test_forward_flight_depth_ignores_lateral_offset() {
        let eye = Vec3::ZERO;
        let near = DepthSortMode::ForwardFlight.depth(eye, Vec3::NEG_Z, Vec3::new(10.0, 0.0, -1.0));
        let far = DepthSortMode::ForwardFlight.depth(eye, Vec3::NEG_Z, Vec3::new(0.0, 0.0, -5.0));
        assert_eq!(near, 1.0);
        assert_eq!(far, 5.0);
    }
}
