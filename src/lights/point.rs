use glam::Vec3;

use super::{Attenuation, LightColor, LightKind, ShaderLight};
use crate::gpu::{Gpu, ProgramId, Uniforms};

/// Omnidirectional light with distance falloff.
#[derive(Clone, Debug, PartialEq)]
pub struct PointLight {
    pub color: LightColor,
    pub position: Vec3,
    pub attenuation: Attenuation,
}

impl PointLight {
    pub fn new(color: LightColor, position: Vec3, attenuation: Attenuation) -> Self {
        Self {
            color,
            position,
            attenuation,
        }
    }

    /// Light intensity multiplier at `point`.
    pub fn falloff_at(&self, point: Vec3) -> f32 {
        self.attenuation.factor(self.position.distance(point))
    }
}

impl ShaderLight for PointLight {
    fn kind(&self) -> LightKind {
        LightKind::Point
    }

    fn send_to_shader(&self, gpu: &mut dyn Gpu, program: ProgramId, slot: usize) {
        let kind = self.kind();
        let mut uniforms = Uniforms::new(gpu, program);
        uniforms.set_vec3(&kind.field(slot, "position"), self.position);
        self.color.send(&mut uniforms, kind, slot);
        self.attenuation.send(&mut uniforms, kind, slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{ProgramSource, RecordingGpu, UniformValue};

    #[test]
    fn writes_every_field_at_slot() {
        let mut gpu = RecordingGpu::new();
        let program = gpu.create_program(&ProgramSource::phong()).unwrap();
        let light = PointLight::new(
            LightColor::new(Vec3::new(0.0, 0.2, 0.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y),
            Vec3::new(15.0, 5.0, 5.0),
            Attenuation::new(1.0, 0.045, 0.0075),
        );
        light.send_to_shader(&mut gpu, program, 2);

        let writes = gpu.uniform_writes("pointLights[2].");
        assert_eq!(writes.len(), 7);
        assert_eq!(
            gpu.last_uniform(program, "pointLights[2].quadratic"),
            Some(UniformValue::Float(0.0075))
        );
        assert!(gpu.take_errors().is_empty());
    }

    #[test]
    fn falloff_uses_distance() {
        let light = PointLight::new(
            LightColor::white(0.1, 1.0, 1.0),
            Vec3::ZERO,
            Attenuation::new(1.0, 1.0, 0.0),
        );
        assert!((light.falloff_at(Vec3::new(3.0, 0.0, 0.0)) - 0.25).abs() < 1e-6);
    }
}
