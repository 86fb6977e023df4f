//! CPU-side resource descriptors
//!
//! A descriptor is the shared, immutable CPU description of a GPU resource.
//! Descriptors are handed around as `Arc`s and identified by pointer: two
//! components holding the same `Arc` share one GPU entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kinds of GPU resources managed by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Mesh,
    Material,
    Texture,
    Renderbuffer,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Mesh => "mesh",
            ResourceKind::Material => "material",
            ResourceKind::Texture => "texture",
            ResourceKind::Renderbuffer => "renderbuffer",
        };
        f.write_str(name)
    }
}

/// Errors detected while creating a GPU entry from a descriptor
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("mesh '{0}' has no vertices")]
    EmptyMesh(String),

    #[error("mesh '{name}' references vertex {index} but only has {vertex_count} vertices")]
    IndexOutOfRange {
        name: String,
        index: u32,
        vertex_count: usize,
    },

    #[error("texture '{name}' expects {expected} bytes of RGBA8 data, got {actual}")]
    PixelSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("material '{0}' has a non-finite color")]
    InvalidColor(String),

    #[error("material '{material}' could not resolve texture '{texture}'")]
    TextureUnavailable { material: String, texture: String },

    #[error("{kind} '{name}' has zero size")]
    ZeroSized { kind: ResourceKind, name: String },
}

/// A CPU descriptor that can back a GPU entry
pub trait Descriptor: fmt::Debug + Send + Sync + 'static {
    /// Resource kind created from this descriptor
    const KIND: ResourceKind;

    /// Human readable name used in logs
    fn label(&self) -> &str;

    /// Check the descriptor before an entry is created for it
    fn validate(&self) -> Result<(), ResourceError>;
}

/// Cache key derived from descriptor identity
///
/// Only meaningful while the descriptor `Arc` is kept alive, which the
/// resource cache guarantees by holding a clone.
pub(crate) fn identity<D>(descriptor: &Arc<D>) -> usize {
    Arc::as_ptr(descriptor) as *const () as usize
}

/// Off-screen color/depth target a camera can render into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderbufferDescriptor {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Whether a depth attachment is allocated alongside the color target
    pub depth: bool,
}

impl RenderbufferDescriptor {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            depth: true,
        }
    }

    /// Color-only target
    pub fn without_depth(mut self) -> Self {
        self.depth = false;
        self
    }
}

impl Descriptor for RenderbufferDescriptor {
    const KIND: ResourceKind = ResourceKind::Renderbuffer;

    fn label(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), ResourceError> {
        if self.width == 0 || self.height == 0 {
            return Err(ResourceError::ZeroSized {
                kind: Self::KIND,
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Skeletal or vertex animation clip
///
/// Clip sampling happens in the backend; the renderer only batches by
/// (clip, frame).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub frame_count: u32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, frame_count: u32) -> Self {
        Self {
            name: name.into(),
            frame_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderbuffer_validation() {
        assert!(RenderbufferDescriptor::new("shadow", 512, 512).validate().is_ok());

        let err = RenderbufferDescriptor::new("broken", 0, 512)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceError::ZeroSized {
                kind: ResourceKind::Renderbuffer,
                ..
            }
        ));
        assert_eq!(err.to_string(), "renderbuffer 'broken' has zero size");
    }

    #[test]
    fn test_identity_follows_arc_not_value() {
        let a = Arc::new(RenderbufferDescriptor::new("mirror", 64, 64));
        let b = Arc::new(RenderbufferDescriptor::new("mirror", 64, 64));
        assert_eq!(identity(&a), identity(&a.clone()));
        assert_ne!(identity(&a), identity(&b));
    }
}
