//! Light sources and their packing into the lighting program's uniform arrays.

mod directional;
pub mod manager;
mod point;
mod spot;

use std::fmt;

use glam::Vec3;

use crate::gpu::{
    Gpu, ProgramId, Uniforms, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS, MAX_SPOT_LIGHTS,
};

pub use directional::DirectionalLight;
pub use manager::{LightCapacity, LightError, LightHandle, LightManager};
pub use point::PointLight;
pub use spot::SpotLight;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

impl LightKind {
    pub const ALL: [LightKind; 3] = [LightKind::Directional, LightKind::Point, LightKind::Spot];

    /// Name of the uniform array holding lights of this kind.
    pub fn array_name(self) -> &'static str {
        match self {
            LightKind::Directional => "dirLights",
            LightKind::Point => "pointLights",
            LightKind::Spot => "spotLights",
        }
    }

    pub fn count_uniform(self) -> &'static str {
        match self {
            LightKind::Directional => "dirLightCount",
            LightKind::Point => "pointLightCount",
            LightKind::Spot => "spotLightCount",
        }
    }

    /// Array length compiled into the lighting shader.
    pub fn shader_limit(self) -> usize {
        match self {
            LightKind::Directional => MAX_DIRECTIONAL_LIGHTS,
            LightKind::Point => MAX_POINT_LIGHTS,
            LightKind::Spot => MAX_SPOT_LIGHTS,
        }
    }

    pub(crate) fn field(self, slot: usize, field: &str) -> String {
        format!("{}[{}].{}", self.array_name(), slot, field)
    }
}

impl fmt::Display for LightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LightKind::Directional => "directional",
            LightKind::Point => "point",
            LightKind::Spot => "spot",
        };
        f.write_str(name)
    }
}

/// Phong colour terms shared by every light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightColor {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl LightColor {
    pub fn new(ambient: Vec3, diffuse: Vec3, specular: Vec3) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
        }
    }

    /// Same colour for all three terms, scaled per term.
    pub fn white(ambient: f32, diffuse: f32, specular: f32) -> Self {
        Self::new(
            Vec3::splat(ambient),
            Vec3::splat(diffuse),
            Vec3::splat(specular),
        )
    }

    fn send(&self, uniforms: &mut Uniforms<'_>, kind: LightKind, slot: usize) {
        uniforms
            .set_vec3(&kind.field(slot, "ambient"), self.ambient)
            .set_vec3(&kind.field(slot, "diffuse"), self.diffuse)
            .set_vec3(&kind.field(slot, "specular"), self.specular);
    }
}

/// Distance falloff `1 / (constant + linear * d + quadratic * d^2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

/// (range, linear, quadratic) with constant 1.
const ATTENUATION_PRESETS: [(f32, f32, f32); 12] = [
    (7.0, 0.7, 1.8),
    (13.0, 0.35, 0.44),
    (20.0, 0.22, 0.20),
    (32.0, 0.14, 0.07),
    (50.0, 0.09, 0.032),
    (65.0, 0.07, 0.017),
    (100.0, 0.045, 0.0075),
    (160.0, 0.027, 0.0028),
    (200.0, 0.022, 0.0019),
    (325.0, 0.014, 0.0007),
    (600.0, 0.007, 0.0002),
    (3250.0, 0.0014, 0.000007),
];

impl Attenuation {
    pub fn new(constant: f32, linear: f32, quadratic: f32) -> Self {
        Self {
            constant,
            linear,
            quadratic,
        }
    }

    /// Smallest preset whose range covers `distance`.
    pub fn for_range(distance: f32) -> Self {
        let (_, linear, quadratic) = ATTENUATION_PRESETS
            .iter()
            .copied()
            .find(|(range, _, _)| *range >= distance)
            .unwrap_or(ATTENUATION_PRESETS[ATTENUATION_PRESETS.len() - 1]);
        Self::new(1.0, linear, quadratic)
    }

    pub fn factor(&self, distance: f32) -> f32 {
        let denominator = self.constant + self.linear * distance + self.quadratic * distance * distance;
        if denominator <= 0.0 {
            return 1.0;
        }
        1.0 / denominator
    }

    fn send(&self, uniforms: &mut Uniforms<'_>, kind: LightKind, slot: usize) {
        uniforms
            .set_float(&kind.field(slot, "constant"), self.constant)
            .set_float(&kind.field(slot, "linear"), self.linear)
            .set_float(&kind.field(slot, "quadratic"), self.quadratic);
    }
}

impl Default for Attenuation {
    fn default() -> Self {
        Self::for_range(50.0)
    }
}

/// Writes a light's fields into element `slot` of its kind's uniform array.
pub trait ShaderLight {
    fn kind(&self) -> LightKind;
    fn send_to_shader(&self, gpu: &mut dyn Gpu, program: ProgramId, slot: usize);
}

#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
}

impl Light {
    pub fn color(&self) -> &LightColor {
        match self {
            Light::Directional(light) => &light.color,
            Light::Point(light) => &light.color,
            Light::Spot(light) => &light.color,
        }
    }

    pub fn color_mut(&mut self) -> &mut LightColor {
        match self {
            Light::Directional(light) => &mut light.color,
            Light::Point(light) => &mut light.color,
            Light::Spot(light) => &mut light.color,
        }
    }

    pub fn as_directional_mut(&mut self) -> Option<&mut DirectionalLight> {
        match self {
            Light::Directional(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_point_mut(&mut self) -> Option<&mut PointLight> {
        match self {
            Light::Point(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_spot(&self) -> Option<&SpotLight> {
        match self {
            Light::Spot(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_spot_mut(&mut self) -> Option<&mut SpotLight> {
        match self {
            Light::Spot(light) => Some(light),
            _ => None,
        }
    }
}

impl ShaderLight for Light {
    fn kind(&self) -> LightKind {
        match self {
            Light::Directional(light) => light.kind(),
            Light::Point(light) => light.kind(),
            Light::Spot(light) => light.kind(),
        }
    }

    fn send_to_shader(&self, gpu: &mut dyn Gpu, program: ProgramId, slot: usize) {
        match self {
            Light::Directional(light) => light.send_to_shader(gpu, program, slot),
            Light::Point(light) => light.send_to_shader(gpu, program, slot),
            Light::Spot(light) => light.send_to_shader(gpu, program, slot),
        }
    }
}

impl From<DirectionalLight> for Light {
    fn from(light: DirectionalLight) -> Self {
        Light::Directional(light)
    }
}

impl From<PointLight> for Light {
    fn from(light: PointLight) -> Self {
        Light::Point(light)
    }
}

impl From<SpotLight> for Light {
    fn from(light: SpotLight) -> Self {
        Light::Spot(light)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attenuation_factor_matches_formula() {
        let att = Attenuation::new(1.0, 0.09, 0.032);
        let d = 10.0;
        let expected = 1.0 / (1.0 + 0.09 * d + 0.032 * d * d);
        assert!((att.factor(d) - expected).abs() < 1e-6);
        assert_eq!(att.factor(0.0), 1.0);
    }

    #[test]
    fn range_presets_cover_distance() {
        assert_eq!(Attenuation::for_range(50.0), Attenuation::new(1.0, 0.09, 0.032));
        assert_eq!(Attenuation::for_range(51.0), Attenuation::new(1.0, 0.07, 0.017));
        assert_eq!(Attenuation::for_range(1.0e6).linear, 0.0014);
    }

    #[test]
    fn field_names_index_the_kind_array() {
        assert_eq!(LightKind::Point.field(3, "linear"), "pointLights[3].linear");
        assert_eq!(LightKind::Spot.count_uniform(), "spotLightCount");
        assert_eq!(LightKind::Directional.shader_limit(), MAX_DIRECTIONAL_LIGHTS);
    }
}
