//! Core scene types
//!
//! Scene world wrapper, transform components, camera and light components.

pub mod camera;
pub mod entity;
pub mod light;

pub use camera::{Camera, DepthSortMode, ProjectionMode};
pub use light::{AmbientLight, DirectionalLight, PointLight};
