//! Sample scene: a wall of textured crates, two glTF models, a skybox and
//! the ground grid, lit by two point lights, a sun, a camera headlamp and a
//! blue overhead spot.

use glam::Vec3;

use crate::gpu::{kind, Gpu, GpuError, GpuResource, ProgramId, ProgramSource};
use crate::lights::{
    Attenuation, DirectionalLight, Light, LightCapacity, LightColor, LightHandle, PointLight,
    SpotLight,
};
use crate::renderer::{ObjectHandle, RenderError, Renderer, RendererBuilder};
use crate::scene::primitives::{CUBE_NORMALS, CUBE_POSITIONS, CUBE_TEX_COORDS};
use crate::scene::{
    Camera, Cubemap, FrameContext, Grid, Material, MeshBuilder, Model, Skybox, TextureCache,
    TextureRole,
};

pub const CRATE_TEXTURE: &str = "img/container2.png";
pub const SKYBOX_DIRECTORY: &str = "img/skybox/sky/";
pub const SKYBOX_EXTENSION: &str = "jpg";
pub const SEA_KEEP_MODEL: &str = "models/sea_keep/scene.gltf";
pub const TANK_MODEL: &str = "models/tank/scene.gltf";

pub const CRATE_COLUMNS: u32 = 100;
pub const CRATE_ROWS: u32 = 10;

/// The three built-in programs, owned for the lifetime of the scene.
pub struct DemoPrograms {
    pub phong: GpuResource<kind::Program>,
    pub skybox: GpuResource<kind::Program>,
    pub grid: GpuResource<kind::Program>,
}

impl DemoPrograms {
    pub fn create(gpu: &mut dyn Gpu) -> Result<Self, GpuError> {
        let phong = GpuResource::new(gpu.create_program(&ProgramSource::phong())?);
        let skybox = match gpu.create_program(&ProgramSource::skybox()) {
            Ok(id) => GpuResource::new(id),
            Err(err) => {
                phong.release(gpu);
                return Err(err);
            }
        };
        let grid = match gpu.create_program(&ProgramSource::grid()) {
            Ok(id) => GpuResource::new(id),
            Err(err) => {
                phong.release(gpu);
                skybox.release(gpu);
                return Err(err);
            }
        };
        Ok(Self {
            phong,
            skybox,
            grid,
        })
    }

    pub fn release(self, gpu: &mut dyn Gpu) {
        self.phong.release(gpu);
        self.skybox.release(gpu);
        self.grid.release(gpu);
    }
}

pub struct DemoScene {
    renderer: Renderer,
    headlamp: Option<LightHandle>,
    skybox: ObjectHandle<Skybox>,
    grid: ObjectHandle<Grid>,
    programs: DemoPrograms,
    textures: TextureCache,
}

impl DemoScene {
    pub fn build(
        gpu: &mut dyn Gpu,
        camera: &Camera,
        light_capacity: LightCapacity,
    ) -> Result<Self, RenderError> {
        let programs = DemoPrograms::create(gpu)?;
        let mut textures = TextureCache::new();

        let assembled = assemble(&programs, &mut textures, camera, light_capacity)
            .and_then(|(builder, handles)| Ok((builder.init(gpu)?, handles)));

        match assembled {
            Ok((renderer, (headlamp, skybox, grid))) => Ok(Self {
                renderer,
                headlamp,
                skybox,
                grid,
                programs,
                textures,
            }),
            Err(err) => {
                programs.release(gpu);
                Err(err)
            }
        }
    }

    /// Keeps the headlamp on the camera.
    pub fn update(&mut self, camera: &Camera) {
        let Some(headlamp) = self.headlamp else {
            return;
        };
        if let Some(spot) = self
            .renderer
            .lights_mut()
            .get_mut(headlamp)
            .and_then(Light::as_spot_mut)
        {
            spot.follow(camera.position, camera.front());
        }
    }

    pub fn render(&self, gpu: &mut dyn Gpu, frame: &FrameContext) {
        self.renderer.render(gpu, frame);
    }

    pub fn toggle_grid(&mut self) {
        if let Some(grid) = self.renderer.object_mut(self.grid) {
            let visible = !grid.is_visible();
            grid.set_visible(visible);
            log::info!("Grid {}", if visible { "shown" } else { "hidden" });
        }
    }

    pub fn toggle_skybox(&mut self) {
        if let Some(skybox) = self.renderer.object_mut(self.skybox) {
            let visible = !skybox.is_visible();
            skybox.set_visible(visible);
            log::info!("Skybox {}", if visible { "shown" } else { "hidden" });
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn phong_program(&self) -> ProgramId {
        self.programs.phong.id()
    }

    pub fn shutdown(mut self, gpu: &mut dyn Gpu) {
        self.renderer.shutdown(gpu);
        self.programs.release(gpu);
        self.textures.purge();
    }
}

type DemoHandles = (Option<LightHandle>, ObjectHandle<Skybox>, ObjectHandle<Grid>);

/// Registers `light`, or warns and skips it once its kind is full.
fn register_light(builder: &mut RendererBuilder, light: impl Into<Light>) -> Option<LightHandle> {
    match builder.insert_light(light) {
        Ok(handle) => Some(handle),
        Err(err) => {
            log::warn!("Dropping light: {}", err);
            None
        }
    }
}

fn assemble(
    programs: &DemoPrograms,
    textures: &mut TextureCache,
    camera: &Camera,
    light_capacity: LightCapacity,
) -> Result<(RendererBuilder, DemoHandles), RenderError> {
    let phong = programs.phong.id();
    let mut builder = RendererBuilder::new(phong).with_light_capacity(light_capacity);

    let attenuation = Attenuation::new(1.0, 0.045, 0.0075);
    let green = PointLight::new(
        LightColor::new(
            Vec3::new(0.0, 0.2, 0.0),
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ),
        Vec3::new(15.0, 5.0, 5.0),
        attenuation,
    );
    let red = PointLight::new(
        LightColor::new(
            Vec3::new(0.2, 0.0, 0.0),
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        ),
        Vec3::new(-5.0, 5.0, -5.0),
        attenuation,
    );
    let sun = DirectionalLight::new(
        LightColor::white(0.4, 0.7, 1.0),
        Vec3::new(-0.2, -1.0, -0.3),
    );
    let headlamp = SpotLight::new(
        LightColor::white(0.6, 0.8, 1.0),
        camera.position,
        camera.front(),
        Attenuation::new(1.0, 0.09, 0.032),
        12.5,
        15.0,
    );
    let overhead = SpotLight::new(
        LightColor::new(
            Vec3::new(0.0, 0.0, 0.6),
            Vec3::new(0.0, 0.0, 0.8),
            Vec3::new(0.0, 0.0, 1.0),
        ),
        Vec3::new(0.0, 15.0, 0.0),
        Vec3::NEG_Y,
        Attenuation::new(0.0, 0.0, 0.001),
        12.5,
        12.5,
    );

    register_light(&mut builder, green);
    register_light(&mut builder, red);
    register_light(&mut builder, sun);
    let headlamp = register_light(&mut builder, headlamp);
    register_light(&mut builder, overhead);

    let mut material = Material::default().with_shininess(32.0);
    match textures.load(CRATE_TEXTURE, TextureRole::Diffuse, true) {
        Ok(texture) => material.add_texture(texture),
        Err(err) => log::error!("Crates will be untextured: {}", err),
    }
    for x in 0..CRATE_COLUMNS {
        for y in 0..CRATE_ROWS {
            let mesh = MeshBuilder::new(&CUBE_POSITIONS, phong)
                .with_normals(&CUBE_NORMALS)
                .with_tex_coords(&CUBE_TEX_COORDS)
                .with_material(material.clone())
                .at(Vec3::new(x as f32, y as f32, 0.0))
                .build()?;
            builder.insert_object(mesh);
        }
    }

    let cubemap = Cubemap::from_directory(SKYBOX_DIRECTORY, SKYBOX_EXTENSION).unwrap_or_else(
        |err| {
            log::error!("Falling back to a plain sky: {}", err);
            Cubemap::solid([40, 60, 90, 255])
        },
    );
    let skybox = builder.insert_object(Skybox::new(programs.skybox.id(), cubemap));

    let mut sea_keep = Model::load(SEA_KEEP_MODEL, phong, textures);
    sea_keep
        .scale(Vec3::splat(0.05))
        .rotate(-90.0, Vec3::X);
    builder.insert_object(sea_keep);

    let mut tank = Model::load(TANK_MODEL, phong, textures);
    tank.translate(Vec3::new(30.0, 0.0, 30.0))
        .rotate(-90.0, Vec3::X);
    builder.insert_object(tank);

    // Blended, so it goes after everything it is drawn over.
    let grid = builder.insert_object(Grid::new(programs.grid.id()));

    Ok((builder, (headlamp, skybox, grid)))
}
