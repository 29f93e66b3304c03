use glam::Vec3;

use super::{Attenuation, LightColor, LightKind, ShaderLight};
use crate::gpu::{Gpu, ProgramId, Uniforms};

/// Cone light. Cutoffs are stored as cosines of the half-angles, which is
/// what the shader compares against.
#[derive(Clone, Debug, PartialEq)]
pub struct SpotLight {
    pub color: LightColor,
    pub position: Vec3,
    pub direction: Vec3,
    pub attenuation: Attenuation,
    cut_off: f32,
    outer_cut_off: f32,
}

impl SpotLight {
    /// `inner_degrees` and `outer_degrees` are cone half-angles.
    pub fn new(
        color: LightColor,
        position: Vec3,
        direction: Vec3,
        attenuation: Attenuation,
        inner_degrees: f32,
        outer_degrees: f32,
    ) -> Self {
        let mut light = Self {
            color,
            position,
            direction,
            attenuation,
            cut_off: 1.0,
            outer_cut_off: 1.0,
        };
        light.set_cutoff_degrees(inner_degrees, outer_degrees);
        light
    }

    pub fn set_cutoff_degrees(&mut self, inner_degrees: f32, outer_degrees: f32) {
        if outer_degrees < inner_degrees {
            log::warn!(
                "Spot light outer cutoff {}° is inside inner cutoff {}°",
                outer_degrees,
                inner_degrees
            );
        }
        self.cut_off = inner_degrees.to_radians().cos();
        self.outer_cut_off = outer_degrees.to_radians().cos();
    }

    pub fn cut_off(&self) -> f32 {
        self.cut_off
    }

    pub fn outer_cut_off(&self) -> f32 {
        self.outer_cut_off
    }

    pub fn cutoff_degrees(&self) -> (f32, f32) {
        (
            self.cut_off.clamp(-1.0, 1.0).acos().to_degrees(),
            self.outer_cut_off.clamp(-1.0, 1.0).acos().to_degrees(),
        )
    }

    /// Moves the light to `position` pointing along `direction`.
    pub fn follow(&mut self, position: Vec3, direction: Vec3) {
        self.position = position;
        self.direction = direction;
    }
}

impl ShaderLight for SpotLight {
    fn kind(&self) -> LightKind {
        LightKind::Spot
    }

    fn send_to_shader(&self, gpu: &mut dyn Gpu, program: ProgramId, slot: usize) {
        let kind = self.kind();
        let mut uniforms = Uniforms::new(gpu, program);
        uniforms
            .set_vec3(&kind.field(slot, "position"), self.position)
            .set_vec3(&kind.field(slot, "direction"), self.direction);
        self.color.send(&mut uniforms, kind, slot);
        self.attenuation.send(&mut uniforms, kind, slot);
        uniforms
            .set_float(&kind.field(slot, "cutOff"), self.cut_off)
            .set_float(&kind.field(slot, "outerCutOff"), self.outer_cut_off);
    }
}
