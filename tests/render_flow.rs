use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Vec3};
use wgpu_scene::gpu::{
    Gpu, GpuCall, GpuError, ImageData, ProgramId, ProgramSource, RecordingGpu, UniformValue,
};
use wgpu_scene::lights::{
    Attenuation, LightCapacity, LightColor, LightError, LightKind, PointLight, SpotLight,
};
use wgpu_scene::renderer::RendererBuilder;
use wgpu_scene::scene::primitives::{CUBE_NORMALS, CUBE_POSITIONS, CUBE_TEX_COORDS};
use wgpu_scene::scene::{
    Cubemap, Drawable, FrameContext, Grid, MeshBuilder, Skybox, TextureCache, TextureRole,
};

fn phong(gpu: &mut RecordingGpu) -> ProgramId {
    gpu.create_program(&ProgramSource::phong()).unwrap()
}

fn frame() -> FrameContext {
    FrameContext::new(
        Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y),
        Mat4::perspective_rh(45f32.to_radians(), 16.0 / 9.0, 0.1, 100.0),
        Vec3::new(0.0, 0.0, 3.0),
    )
}

fn point_light(x: f32) -> PointLight {
    PointLight::new(
        LightColor::white(0.1, 0.5, 1.0),
        Vec3::new(x, 1.0, 0.0),
        Attenuation::new(1.0, 0.09, 0.032),
    )
}

#[test]
fn unit_cube_without_lights_draws_once() {
    let mut gpu = RecordingGpu::new();
    let program = phong(&mut gpu);
    let cube = MeshBuilder::new(&CUBE_POSITIONS, program).build().unwrap();

    let renderer = RendererBuilder::new(program)
        .add_object(cube)
        .init(&mut gpu)
        .unwrap();

    gpu.begin_frame([0.0, 0.0, 0.0, 1.0]);
    renderer.render(&mut gpu, &frame());
    gpu.end_frame();

    let draws = gpu.draw_calls();
    assert_eq!(draws.len(), 1);
    assert!(matches!(
        draws[0],
        GpuCall::DrawArrays {
            first: 0,
            count: 36,
            ..
        }
    ));
    for prefix in ["dirLight", "pointLight", "spotLight"] {
        assert!(gpu.uniform_writes(prefix).is_empty(), "{prefix} written");
    }
    assert!(gpu.take_errors().is_empty());

    renderer.shutdown(&mut gpu);
}

struct Tagged {
    id: usize,
    drawn: Rc<RefCell<Vec<usize>>>,
}

impl Drawable for Tagged {
    fn setup_object(&mut self, _gpu: &mut dyn Gpu) -> Result<(), GpuError> {
        Ok(())
    }

    fn draw_object(&self, _gpu: &mut dyn Gpu, _frame: &FrameContext) {
        self.drawn.borrow_mut().push(self.id);
    }

    fn release(&mut self, _gpu: &mut dyn Gpu) {}
}

#[test]
fn objects_draw_in_registration_order() {
    let mut gpu = RecordingGpu::new();
    let program = phong(&mut gpu);
    let drawn = Rc::new(RefCell::new(Vec::new()));

    let mut builder = RendererBuilder::new(program);
    for id in [3, 1, 2, 0] {
        builder.insert_object(Tagged {
            id,
            drawn: drawn.clone(),
        });
    }
    let renderer = builder.init(&mut gpu).unwrap();

    renderer.render(&mut gpu, &frame());
    renderer.render(&mut gpu, &frame());
    assert_eq!(*drawn.borrow(), vec![3, 1, 2, 0, 3, 1, 2, 0]);

    renderer.shutdown(&mut gpu);
}

#[test]
fn light_slots_are_stable_across_frames() {
    let mut gpu = RecordingGpu::new();
    let program = phong(&mut gpu);

    let mut builder = RendererBuilder::new(program);
    let handles: Vec<_> = (0..3)
        .map(|i| builder.insert_light(point_light(i as f32)).unwrap())
        .collect();
    assert_eq!(
        handles.iter().map(|h| h.slot()).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    let mut renderer = builder.init(&mut gpu).unwrap();

    renderer.render(&mut gpu, &frame());
    if let Some(light) = renderer
        .lights_mut()
        .get_mut(handles[1])
        .and_then(|light| light.as_point_mut())
    {
        light.position = Vec3::new(9.0, 9.0, 9.0);
    }
    gpu.clear_calls();
    renderer.render(&mut gpu, &frame());

    assert_eq!(
        gpu.last_uniform(program, "pointLights[0].position"),
        Some(UniformValue::Vec3(Vec3::new(0.0, 1.0, 0.0)))
    );
    assert_eq!(
        gpu.last_uniform(program, "pointLights[1].position"),
        Some(UniformValue::Vec3(Vec3::splat(9.0)))
    );
    assert_eq!(
        gpu.last_uniform(program, "pointLightCount"),
        Some(UniformValue::Int(3))
    );
    assert!(gpu.uniform_writes("pointLights[3]").is_empty());
    assert_eq!(
        gpu.last_uniform(program, "viewPos"),
        Some(UniformValue::Vec3(Vec3::new(0.0, 0.0, 3.0)))
    );

    renderer.shutdown(&mut gpu);
}

#[test]
fn light_capacity_is_enforced_at_registration() {
    let spot = || {
        SpotLight::new(
            LightColor::white(0.0, 0.5, 1.0),
            Vec3::ZERO,
            Vec3::NEG_Y,
            Attenuation::default(),
            12.5,
            15.0,
        )
    };

    let result = RendererBuilder::new(ProgramId::new(0))
        .with_light_capacity(LightCapacity {
            spot: 1,
            ..Default::default()
        })
        .add_light(spot())
        .and_then(|builder| builder.add_light(spot()));

    assert!(matches!(
        result,
        Err(LightError::CapacityExceeded {
            kind: LightKind::Spot,
            capacity: 1
        })
    ));
}

#[test]
fn shutdown_releases_every_resource_once() {
    let mut gpu = RecordingGpu::new();
    let program = phong(&mut gpu);
    let skybox_program = gpu.create_program(&ProgramSource::skybox()).unwrap();
    let grid_program = gpu.create_program(&ProgramSource::grid()).unwrap();

    let mut cache = TextureCache::new();
    let shared = cache.insert("crate", ImageData::solid([200, 150, 80, 255]), TextureRole::Diffuse);
    let textured_cube = |position: Vec3| {
        MeshBuilder::new(&CUBE_POSITIONS, program)
            .with_normals(&CUBE_NORMALS)
            .with_tex_coords(&CUBE_TEX_COORDS)
            .with_texture(shared.clone())
            .at(position)
            .build()
            .unwrap()
    };

    let renderer = RendererBuilder::new(program)
        .add_object(textured_cube(Vec3::ZERO))
        .add_object(textured_cube(Vec3::X))
        .add_object(Skybox::new(skybox_program, Cubemap::solid([0, 0, 64, 255])))
        .add_object(Grid::new(grid_program))
        .init(&mut gpu)
        .unwrap();
    drop(shared);

    assert_eq!(gpu.live_textures(), 2);
    assert_eq!(gpu.live_vertex_arrays(), 4);

    gpu.begin_frame([0.0; 4]);
    renderer.render(&mut gpu, &frame());
    gpu.end_frame();
    renderer.shutdown(&mut gpu);

    assert_eq!(gpu.live_textures(), 0);
    assert_eq!(gpu.live_vertex_arrays(), 0);
    assert_eq!(gpu.live_resources(), 3);
    assert!(gpu.take_errors().is_empty());
    assert_eq!(cache.live(), 0);
}
