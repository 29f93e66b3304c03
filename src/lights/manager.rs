use serde::{Deserialize, Serialize};

use super::{Light, LightKind, ShaderLight};
use crate::gpu::{Gpu, ProgramId, Uniforms};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LightError {
    #[error("cannot add {kind} light: capacity of {capacity} reached")]
    CapacityExceeded { kind: LightKind, capacity: usize },
}

/// Maximum number of lights per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightCapacity {
    pub directional: usize,
    pub point: usize,
    pub spot: usize,
}

impl Default for LightCapacity {
    fn default() -> Self {
        Self {
            directional: LightKind::Directional.shader_limit(),
            point: LightKind::Point.shader_limit(),
            spot: LightKind::Spot.shader_limit(),
        }
    }
}

impl LightCapacity {
    pub fn of(&self, kind: LightKind) -> usize {
        match kind {
            LightKind::Directional => self.directional,
            LightKind::Point => self.point,
            LightKind::Spot => self.spot,
        }
    }

    /// Caps every kind at the array size compiled into the lighting shader.
    pub fn clamped(self) -> Self {
        let clamp = |kind: LightKind| {
            let requested = self.of(kind);
            let limit = kind.shader_limit();
            if requested > limit {
                log::warn!(
                    "Requested {} {} lights, the shader holds {}",
                    requested,
                    kind,
                    limit
                );
            }
            requested.min(limit)
        };
        Self {
            directional: clamp(LightKind::Directional),
            point: clamp(LightKind::Point),
            spot: clamp(LightKind::Spot),
        }
    }
}

/// Stable address of a light: its kind and index within that kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LightHandle {
    kind: LightKind,
    slot: usize,
}

impl LightHandle {
    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Owns every light and writes them to the lighting program.
///
/// Each kind keeps its lights in insertion order; a light's slot is its
/// index in that list and is the array element it is written to.
#[derive(Clone, Debug)]
pub struct LightManager {
    directional: Vec<Light>,
    point: Vec<Light>,
    spot: Vec<Light>,
    capacity: LightCapacity,
}

impl Default for LightManager {
    fn default() -> Self {
        Self::new(LightCapacity::default())
    }
}

impl LightManager {
    pub fn new(capacity: LightCapacity) -> Self {
        Self {
            directional: Vec::new(),
            point: Vec::new(),
            spot: Vec::new(),
            capacity: capacity.clamped(),
        }
    }

    pub fn capacity(&self) -> LightCapacity {
        self.capacity
    }

    pub fn add_light(&mut self, light: impl Into<Light>) -> Result<LightHandle, LightError> {
        let light = light.into();
        let kind = light.kind();
        let capacity = self.capacity.of(kind);
        let list = self.list_mut(kind);
        if list.len() >= capacity {
            return Err(LightError::CapacityExceeded { kind, capacity });
        }

        list.push(light);
        let handle = LightHandle {
            kind,
            slot: list.len() - 1,
        };
        log::debug!("Added {} light in slot {}", kind, handle.slot);
        Ok(handle)
    }

    pub fn get(&self, handle: LightHandle) -> Option<&Light> {
        self.list(handle.kind).get(handle.slot)
    }

    pub fn get_mut(&mut self, handle: LightHandle) -> Option<&mut Light> {
        self.list_mut(handle.kind).get_mut(handle.slot)
    }

    /// Lights with their handles, grouped by kind.
    pub fn iter(&self) -> impl Iterator<Item = (LightHandle, &Light)> + '_ {
        LightKind::ALL.into_iter().flat_map(move |kind| {
            self.list(kind)
                .iter()
                .enumerate()
                .map(move |(slot, light)| (LightHandle { kind, slot }, light))
        })
    }

    pub fn count(&self, kind: LightKind) -> usize {
        self.list(kind).len()
    }

    pub fn len(&self) -> usize {
        self.directional.len() + self.point.len() + self.spot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes every light to its slot, then the per-kind counts. Nothing is
    /// written when no lights are registered.
    pub fn push(&self, gpu: &mut dyn Gpu, program: ProgramId) {
        if self.is_empty() {
            return;
        }

        for (handle, light) in self.iter() {
            light.send_to_shader(gpu, program, handle.slot);
        }

        let mut uniforms = Uniforms::new(gpu, program);
        for kind in LightKind::ALL {
            uniforms.set_int(kind.count_uniform(), self.count(kind) as i32);
        }
    }

    fn list(&self, kind: LightKind) -> &Vec<Light> {
        match kind {
            LightKind::Directional => &self.directional,
            LightKind::Point => &self.point,
            LightKind::Spot => &self.spot,
        }
    }

    fn list_mut(&mut self, kind: LightKind) -> &mut Vec<Light> {
        match kind {
            LightKind::Directional => &mut self.directional,
            LightKind::Point => &mut self.point,
            LightKind::Spot => &mut self.spot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCall, ProgramSource, RecordingGpu, UniformValue};
    use crate::lights::{Attenuation, DirectionalLight, LightColor, PointLight, SpotLight};
    use glam::Vec3;

    fn point(x: f32) -> PointLight {
        PointLight::new(
            LightColor::white(0.1, 0.5, 1.0),
            Vec3::new(x, 0.0, 0.0),
            Attenuation::default(),
        )
    }

    #[test]
    fn slots_follow_insertion_order_per_kind() {
        let mut lights = LightManager::default();
        let p0 = lights.add_light(point(0.0)).unwrap();
        let d0 = lights
            .add_light(DirectionalLight::new(LightColor::white(0.1, 0.1, 0.1), Vec3::NEG_Y))
            .unwrap();
        let p1 = lights.add_light(point(1.0)).unwrap();
        let p2 = lights.add_light(point(2.0)).unwrap();

        assert_eq!((p0.slot(), p1.slot(), p2.slot()), (0, 1, 2));
        assert_eq!(d0.slot(), 0);
        assert_eq!(d0.kind(), LightKind::Directional);
        assert_eq!(lights.count(LightKind::Point), 3);
    }

    #[test]
    fn push_targets_exactly_the_assigned_slots() {
        let mut gpu = RecordingGpu::new();
        let program = gpu.create_program(&ProgramSource::phong()).unwrap();
        let mut lights = LightManager::default();
        for x in 0..3 {
            lights.add_light(point(x as f32)).unwrap();
        }

        lights.push(&mut gpu, program);

        for slot in 0..3 {
            assert_eq!(
                gpu.last_uniform(program, &format!("pointLights[{slot}].position")),
                Some(UniformValue::Vec3(Vec3::new(slot as f32, 0.0, 0.0)))
            );
        }
        assert!(gpu.uniform_writes("pointLights[3]").is_empty());
        assert_eq!(
            gpu.last_uniform(program, "pointLightCount"),
            Some(UniformValue::Int(3))
        );
        assert_eq!(
            gpu.last_uniform(program, "spotLightCount"),
            Some(UniformValue::Int(0))
        );
    }

    #[test]
    fn counts_are_written_after_lights() {
        let mut gpu = RecordingGpu::new();
        let program = gpu.create_program(&ProgramSource::phong()).unwrap();
        let mut lights = LightManager::default();
        lights.add_light(point(0.0)).unwrap();
        gpu.clear_calls();

        lights.push(&mut gpu, program);
        let names: Vec<&str> = gpu
            .calls()
            .iter()
            .filter_map(|call| match call {
                GpuCall::SetUniform { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            &names[names.len() - 3..],
            &["dirLightCount", "pointLightCount", "spotLightCount"]
        );
    }

    #[test]
    fn empty_manager_writes_nothing() {
        let mut gpu = RecordingGpu::new();
        let program = gpu.create_program(&ProgramSource::phong()).unwrap();
        gpu.clear_calls();
        LightManager::default().push(&mut gpu, program);
        assert!(gpu.calls().is_empty());
    }

    #[test]
    fn capacity_is_enforced_and_clamped() {
        let mut lights = LightManager::new(LightCapacity {
            spot: 1,
            point: 100,
            ..Default::default()
        });
        assert_eq!(lights.capacity().point, 16);

        let spot = || {
            SpotLight::new(
                LightColor::white(0.0, 0.0, 1.0),
                Vec3::Y * 15.0,
                Vec3::NEG_Y,
                Attenuation::new(0.0, 0.0, 0.001),
                12.5,
                12.5,
            )
        };
        lights.add_light(spot()).unwrap();
        assert_eq!(
            lights.add_light(spot()),
            Err(LightError::CapacityExceeded {
                kind: LightKind::Spot,
                capacity: 1
            })
        );
        assert_eq!(lights.len(), 1);
    }

    #[test]
    fn handles_give_mutable_access() {
        let mut lights = LightManager::default();
        let handle = lights
            .add_light(SpotLight::new(
                LightColor::white(0.6, 0.8, 1.0),
                Vec3::ZERO,
                Vec3::NEG_Z,
                Attenuation::new(1.0, 0.09, 0.032),
                12.5,
                15.0,
            ))
            .unwrap();

        if let Some(spot) = lights.get_mut(handle).and_then(Light::as_spot_mut) {
            spot.follow(Vec3::ONE, Vec3::X);
        }
        let spot = lights.get(handle).and_then(Light::as_spot).unwrap();
        assert_eq!(spot.position, Vec3::ONE);
    }
}
