use std::path::PathBuf;

use glam::Vec3;
use wgpu_scene::gpu::{Gpu, ProgramSource, RecordingGpu};
use wgpu_scene::scene::{Drawable, Model, TextureCache, TextureRole};

// One triangle, (0,0,0) (1,0,0) (0,1,0), referenced by a root node and by its
// translated child. No normals or texture coordinates.
const TRIANGLE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [ { "nodes": [0] } ],
  "nodes": [
    { "mesh": 0, "children": [1] },
    { "mesh": 0, "translation": [0.0, 0.0, 5.0] }
  ],
  "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 } } ] } ],
  "accessors": [
    {
      "bufferView": 0,
      "componentType": 5126,
      "count": 3,
      "type": "VEC3",
      "min": [0.0, 0.0, 0.0],
      "max": [1.0, 1.0, 0.0]
    }
  ],
  "bufferViews": [ { "buffer": 0, "byteLength": 36 } ],
  "buffers": [
    {
      "byteLength": 36,
      "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
    }
  ]
}"#;

// The same triangle with a material whose only texture is an undecodable
// embedded image.
const BROKEN_TEXTURE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [ { "nodes": [0] } ],
  "nodes": [ { "mesh": 0 } ],
  "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 }, "material": 0 } ] } ],
  "materials": [
    {
      "name": "painted",
      "pbrMetallicRoughness": {
        "baseColorFactor": [0.25, 0.5, 0.75, 1.0],
        "baseColorTexture": { "index": 0 }
      }
    }
  ],
  "textures": [ { "source": 0 } ],
  "images": [ { "uri": "data:image/png;base64,!!!" } ],
  "accessors": [
    {
      "bufferView": 0,
      "componentType": 5126,
      "count": 3,
      "type": "VEC3",
      "min": [0.0, 0.0, 0.0],
      "max": [1.0, 1.0, 0.0]
    }
  ],
  "bufferViews": [ { "buffer": 0, "byteLength": 36 } ],
  "buffers": [
    {
      "byteLength": 36,
      "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
    }
  ]
}"#;

fn write_fixture(name: &str) -> PathBuf {
    write_gltf(name, TRIANGLE_GLTF)
}

fn write_gltf(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wgpu-scene-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("triangle.gltf");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn every_primitive_reference_becomes_a_mesh() {
    let path = write_fixture("flatten");
    let mut gpu = RecordingGpu::new();
    let program = gpu.create_program(&ProgramSource::phong()).unwrap();
    let mut cache = TextureCache::new();

    let mut model = Model::load(&path, program, &mut cache);

    assert_eq!(model.len(), 2);
    assert_eq!(model.directory(), path.parent().unwrap());

    let child = &model.meshes()[1];
    assert!(child
        .positions()
        .iter()
        .all(|p| (p[2] - 5.0).abs() < 1e-6));

    model.setup_object(&mut gpu).unwrap();
    assert_eq!(gpu.live_vertex_arrays(), 2);
    model.release(&mut gpu);
    assert_eq!(gpu.live_vertex_arrays(), 0);
}

#[test]
fn missing_attributes_are_filled_in() {
    let path = write_fixture("fill");
    let mut gpu = RecordingGpu::new();
    let program = gpu.create_program(&ProgramSource::phong()).unwrap();

    let model = Model::load(&path, program, &mut TextureCache::new());

    for mesh in model.meshes() {
        let tex_coords = mesh.tex_coords().unwrap();
        assert_eq!(tex_coords.len(), mesh.vertex_count());
        assert!(tex_coords.iter().all(|uv| *uv == [0.0, 0.0]));

        let normals = mesh.normals().unwrap();
        assert_eq!(normals.len(), mesh.vertex_count());
        assert!(normals
            .iter()
            .all(|n| Vec3::from_array(*n).abs_diff_eq(Vec3::Z, 1e-6)));
    }
}

#[test]
fn broken_embedded_texture_keeps_the_mesh() {
    let path = write_gltf("broken-texture", BROKEN_TEXTURE_GLTF);
    let mut gpu = RecordingGpu::new();
    let program = gpu.create_program(&ProgramSource::phong()).unwrap();
    let mut cache = TextureCache::new();

    let model = Model::load(&path, program, &mut cache);

    assert_eq!(model.len(), 1);
    let material = model.meshes()[0].material();
    assert!(material.texture(TextureRole::Diffuse).is_none());
    assert!(material.textures().is_empty());
    assert!(material.diffuse.abs_diff_eq(Vec3::new(0.25, 0.5, 0.75), 1e-6));
    assert_eq!(cache.live(), 0);
}

#[test]
fn unreadable_file_gives_an_empty_model() {
    let mut gpu = RecordingGpu::new();
    let program = gpu.create_program(&ProgramSource::phong()).unwrap();

    let model = Model::load(
        "does/not/exist/scene.gltf",
        program,
        &mut TextureCache::new(),
    );
    assert!(model.is_empty());
}
