//! Per-frame light collection
//!
//! Lights are rebuilt from the scene every frame. Directional and point
//! lights share `MAX_LIGHTS` slots; ambient lights are summed into a single
//! color and take no slot.

use crate::core::entity::{SceneWorld, WorldTransform};
use crate::core::light::{AmbientLight, DirectionalLight, PointLight};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use tracing::warn;

/// Number of directional and point light slots
pub const MAX_LIGHTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
}

/// One collected light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    /// Point the light is aimed at; for directional lights `position + direction`
    pub target: Vec3,
    pub color: Vec3,
    /// Distance at which the light has fully fallen off, zero for directional lights
    pub falloff: f32,
    /// Cosine of the cone half angle; `-1.0` for no cone
    pub cos_cutoff: f32,
    pub enabled: bool,
}

impl Light {
    pub const DISABLED: Light = Light {
        kind: LightKind::Directional,
        position: Vec3::ZERO,
        target: Vec3::ZERO,
        color: Vec3::ZERO,
        falloff: 0.0,
        cos_cutoff: -1.0,
        enabled: false,
    };

    pub fn directional(light: &DirectionalLight, transform: &WorldTransform) -> Self {
        let position = transform.position();
        Self {
            kind: LightKind::Directional,
            position,
            target: position + transform.forward(),
            color: light.color,
            falloff: 0.0,
            cos_cutoff: -1.0,
            enabled: true,
        }
    }

    pub fn point(light: &PointLight, transform: &WorldTransform) -> Self {
        Self {
            kind: LightKind::Point,
            position: transform.position(),
            target: light.target,
            color: light.color,
            falloff: light.distance,
            cos_cutoff: light.cos_opening,
            enabled: true,
        }
    }

    /// Unit vector from the light towards its target
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }
}

/// Light data as laid out in the backend's uniform buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// xyz = position, w = kind (0 directional, 1 point)
    pub position: [f32; 4],
    /// xyz = direction, w = falloff distance
    pub direction: [f32; 4],
    /// rgb = color, a = cone cosine
    pub color: [f32; 4],
}

impl From<&Light> for GpuLight {
    fn from(light: &Light) -> Self {
        if !light.enabled {
            return Self::zeroed();
        }
        let kind = match light.kind {
            LightKind::Directional => 0.0,
            LightKind::Point => 1.0,
        };
        Self {
            position: light.position.extend(kind).to_array(),
            direction: light.direction().extend(light.falloff).to_array(),
            color: light.color.extend(light.cos_cutoff).to_array(),
        }
    }
}

/// Lights of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct LightSet {
    slots: [Light; MAX_LIGHTS],
    count: usize,
    dropped: usize,
    /// Sum of every ambient light
    pub ambient: Vec3,
}

impl Default for LightSet {
    fn default() -> Self {
        Self {
            slots: [Light::DISABLED; MAX_LIGHTS],
            count: 0,
            dropped: 0,
            ambient: Vec3::ZERO,
        }
    }
}

impl LightSet {
    /// Disable every slot and reset the ambient color
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Fill the next free slot; returns `false` when every slot is taken
    pub fn push(&mut self, light: Light) -> bool {
        let Some(slot) = self.slots.get_mut(self.count) else {
            self.dropped += 1;
            return false;
        };
        *slot = light;
        self.count += 1;
        true
    }

    /// Enabled lights, in collection order
    pub fn enabled(&self) -> &[Light] {
        &self.slots[..self.count]
    }

    pub fn enabled_count(&self) -> usize {
        self.count
    }

    /// Lights that did not fit since the last `clear`
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Every slot, disabled ones included
    pub fn slots(&self) -> &[Light; MAX_LIGHTS] {
        &self.slots
    }

    pub fn to_gpu(&self) -> [GpuLight; MAX_LIGHTS] {
        self.slots.map(|light| GpuLight::from(&light))
    }
}

/// Collects scene lights into a `LightSet`
#[derive(Debug, Default)]
pub struct LightCollector {
    lights: LightSet,
}

impl LightCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the light set from scratch
    ///
    /// Directional lights are collected before point lights. Lights on
    /// hidden transforms are ignored.
    pub fn collect(&mut self, world: &SceneWorld) -> &LightSet {
        self.lights.clear();

        for (_, (light, transform)) in world
            .query::<(&DirectionalLight, &WorldTransform)>()
            .iter()
        {
            if transform.visible {
                self.lights.push(Light::directional(light, transform));
            }
        }
        for (_, (light, transform)) in world.query::<(&PointLight, &WorldTransform)>().iter() {
            if transform.visible {
                self.lights.push(Light::point(light, transform));
            }
        }
        for (_, (light, transform)) in world.query::<(&AmbientLight, &WorldTransform)>().iter() {
            if transform.visible {
                self.lights.ambient += light.color;
            }
        }

        let dropped = self.lights.dropped();
        if dropped > 0 {
            warn!(
                dropped,
                max_lights = MAX_LIGHTS,
                "Too many lights in scene, ignoring the rest"
            );
        }
        &self.lights
    }

    /// Light set from the last `collect`
    pub fn lights(&self) -> &LightSet {
        &self.lights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sun(world: &mut SceneWorld, intensity: f32) {
        world.spawn((
            DirectionalLight::new(Vec3::splat(intensity)),
            WorldTransform::default(),
        ));
    }

    #[test]
    fn test_collects_directional_and_point() {
        let mut world = SceneWorld::new();
        sun(&mut world, 1.0);
        world.spawn((
            PointLight::new(Vec3::X, 12.0).aimed_at(Vec3::ZERO, 60.0),
            WorldTransform::from_position(Vec3::new(0.0, 5.0, 0.0)),
        ));

        let mut collector = LightCollector::new();
        let lights = collector.collect(&world);
        assert_eq!(lights.enabled_count(), 2);
        assert_eq!(lights.enabled()[0].kind, LightKind::Directional);
        assert_eq!(lights.enabled()[0].direction(), Vec3::NEG_Z);

        let point = lights.enabled()[1];
        assert_eq!(point.kind, LightKind::Point);
        assert_eq!(point.falloff, 12.0);
        assert_eq!(point.direction(), Vec3::NEG_Y);
    }

    #[test]
    fn test_ambient_is_summed_without_slots() {
        let mut world = SceneWorld::new();
        for _ in 0..6 {
            world.spawn((AmbientLight::new(Vec3::splat(0.1)), WorldTransform::default()));
        }

        let mut collector = LightCollector::new();
        let lights = collector.collect(&world);
        assert_eq!(lights.enabled_count(), 0);
        assert!((lights.ambient - Vec3::splat(0.6)).abs().max_element() < 1e-6);
    }

    #[test]
    fn test_hidden_lights_are_ignored() {
        let mut world = SceneWorld::new();
        world.spawn((
            DirectionalLight::new(Vec3::ONE),
            WorldTransform::default().hidden(),
        ));
        let mut collector = LightCollector::new();
        assert_eq!(collector.collect(&world).enabled_count(), 0);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn count(&self, needle: &str) -> usize {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes).matches(needle).count()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_overflow_warns_once_per_collect() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let mut world = SceneWorld::new();
        let suns: Vec<_> = (0..MAX_LIGHTS + 2)
            .map(|_| {
                world.spawn((
                    DirectionalLight::new(Vec3::ONE),
                    WorldTransform::default(),
                ))
            })
            .collect();
        let mut collector = LightCollector::new();

        tracing::subscriber::with_default(subscriber, || {
            assert_eq!(collector.collect(&world).dropped(), 2);
            assert_eq!(logs.count("Too many lights"), 1);
            assert_eq!(collector.collect(&world).dropped(), 2);
            assert_eq!(logs.count("Too many lights"), 2);

            for entity in &suns[2..] {
                world.despawn(*entity).unwrap();
            }
            let lights = collector.collect(&world);
            assert_eq!(lights.enabled_count(), 2);
            assert_eq!(lights.dropped(), 0);
            assert_eq!(logs.count("Too many lights"), 2);
        });
    }

    #[test]
    fn test_gpu_layout() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 48);

        let mut set = LightSet::default();
        set.push(Light::point(
            &PointLight::new(Vec3::ONE, 3.0),
            &WorldTransform::from_position(Vec3::Y),
        ));
        let gpu = set.to_gpu();
        assert_eq!(gpu[0].position, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(gpu[0].direction[3], 3.0);
        assert_eq!(gpu[1], GpuLight::zeroed());
    }
}
