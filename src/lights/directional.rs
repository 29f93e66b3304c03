use glam::Vec3;

use super::{LightColor, LightKind, ShaderLight};
use crate::gpu::{Gpu, ProgramId, Uniforms};

/// Light arriving from infinitely far away along `direction`.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: LightColor,
    pub direction: Vec3,
}

impl DirectionalLight {
    pub fn new(color: LightColor, direction: Vec3) -> Self {
        Self { color, direction }
    }
}

impl ShaderLight for DirectionalLight {
    fn kind(&self) -> LightKind {
        LightKind::Directional
    }

    fn send_to_shader(&self, gpu: &mut dyn Gpu, program: ProgramId, slot: usize) {
        let kind = self.kind();
        let mut uniforms = Uniforms::new(gpu, program);
        uniforms.set_vec3(&kind.field(slot, "direction"), self.direction);
        self.color.send(&mut uniforms, kind, slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{RecordingGpu, UniformValue};

    #[test]
    fn writes_direction_and_colors() {
        let mut gpu = RecordingGpu::new();
        let program = ProgramId::new(0);
        let light = DirectionalLight::new(LightColor::white(0.4, 0.7, 1.0), Vec3::new(-0.2, -1.0, -0.3));
        light.send_to_shader(&mut gpu, program, 0);

        let names: Vec<&str> = gpu
            .uniform_writes("dirLights[0].")
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            vec![
                "dirLights[0].direction",
                "dirLights[0].ambient",
                "dirLights[0].diffuse",
                "dirLights[0].specular"
            ]
        );
        assert_eq!(
            gpu.uniform_writes("dirLights[0].ambient")[0].1,
            UniformValue::Vec3(Vec3::splat(0.4))
        );
    }
}
