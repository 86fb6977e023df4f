//! Material and texture descriptors
//!
//! Materials are batched by their merge key rather than by identity, so two
//! separately loaded but equivalent materials share one instanced draw.

use super::descriptor::{Descriptor, ResourceError, ResourceKind};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// RGBA8 texture image
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    /// Where the image came from; textures from the same source are mergable
    pub source: String,
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 pixels
    pub pixels: Vec<u8>,
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Batching key of a texture
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub source: String,
    pub width: u32,
    pub height: u32,
}

impl TextureDescriptor {
    pub fn new(source: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            width,
            height,
            pixels,
        }
    }

    /// Single color texture
    pub fn solid(source: impl Into<String>, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat(pixel_count(width, height));
        Self::new(source, width, height, pixels)
    }

    pub fn merge_key(&self) -> TextureKey {
        TextureKey {
            source: self.source.clone(),
            width: self.width,
            height: self.height,
        }
    }

    pub fn pixel_count(&self) -> usize {
        pixel_count(self.width, self.height)
    }

    /// Whether any pixel is not fully opaque
    pub fn has_transparency(&self) -> bool {
        self.pixels.chunks_exact(4).any(|pixel| pixel[3] < u8::MAX)
    }
}

impl Descriptor for TextureDescriptor {
    const KIND: ResourceKind = ResourceKind::Texture;

    fn label(&self) -> &str {
        &self.source
    }

    fn validate(&self) -> Result<(), ResourceError> {
        if self.width == 0 || self.height == 0 {
            return Err(ResourceError::ZeroSized {
                kind: Self::KIND,
                name: self.source.clone(),
            });
        }
        let expected = pixel_count(self.width, self.height) * 4;
        if self.pixels.len() != expected {
            return Err(ResourceError::PixelSizeMismatch {
                name: self.source.clone(),
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// Rendering-relevant material switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialFlags {
    /// Force alpha blending even when color and texture are opaque
    pub transparent: bool,
    pub double_sided: bool,
    pub unlit: bool,
}

impl MaterialFlags {
    fn bits(self) -> u32 {
        (self.transparent as u32) | (self.double_sided as u32) << 1 | (self.unlit as u32) << 2
    }
}

/// Surface description shared by mesh instances
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDescriptor {
    pub name: String,
    /// Base color (RGBA, linear)
    pub color: [f32; 4],
    pub texture: Option<Arc<TextureDescriptor>>,
    pub flags: MaterialFlags,
    /// Upload even when the frame's material budget is exhausted
    pub upload_immediately: bool,
}

/// Batching key of a material
///
/// Two materials with equal keys render identically and may share a batch.
/// Upload priority is part of the key so an immediate material never waits
/// behind a budgeted one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    pub texture: Option<TextureKey>,
    pub color: [u32; 4],
    pub flags: MaterialFlags,
    pub upload_immediately: bool,
}

impl Default for MaterialDescriptor {
    fn default() -> Self {
        Self::new("default", [1.0, 1.0, 1.0, 1.0])
    }
}

impl MaterialDescriptor {
    pub fn new(name: impl Into<String>, color: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            color,
            texture: None,
            flags: MaterialFlags::default(),
            upload_immediately: false,
        }
    }

    /// Opaque material from RGB values
    pub fn from_rgb(name: impl Into<String>, r: f32, g: f32, b: f32) -> Self {
        Self::new(name, [r, g, b, 1.0])
    }

    /// Material used for instances without a material list
    pub fn fallback() -> Self {
        Self {
            upload_immediately: true,
            ..Self::new("default", [0.8, 0.8, 0.8, 1.0])
        }
    }

    pub fn with_texture(mut self, texture: Arc<TextureDescriptor>) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn uploaded_immediately(mut self) -> Self {
        self.upload_immediately = true;
        self
    }

    pub fn merge_key(&self) -> MaterialKey {
        MaterialKey {
            texture: self.texture.as_ref().map(|texture| texture.merge_key()),
            color: self.color.map(f32::to_bits),
            flags: self.flags,
            upload_immediately: self.upload_immediately,
        }
    }

    /// Whether instances using this material need blending
    pub fn has_transparency(&self) -> bool {
        self.flags.transparent
            || self.color[3] < 1.0
            || self
                .texture
                .as_ref()
                .is_some_and(|texture| texture.has_transparency())
    }
}

impl Descriptor for MaterialDescriptor {
    const KIND: ResourceKind = ResourceKind::Material;

    fn label(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), ResourceError> {
        if self.color.iter().any(|channel| !channel.is_finite()) {
            return Err(ResourceError::InvalidColor(self.name.clone()));
        }
        Ok(())
    }
}

/// Material data as laid out in the backend's uniform buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    pub color: [f32; 4],
    pub flags: u32,
    pub has_texture: u32,
    pub _padding: [u32; 2],
}

impl From<&MaterialDescriptor> for MaterialUniform {
    fn from(material: &MaterialDescriptor) -> Self {
        Self {
            color: material.color,
            flags: material.flags.bits(),
            has_texture: material.texture.is_some() as u32,
            _padding: [0; 2],
        }
    }
}
