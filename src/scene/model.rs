use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glam::{Mat3, Mat4, Vec3};

use super::drawable::{Drawable, FrameContext, TransformOp};
use super::import::{
    GltfImporter, ImageSource, ImportedMaterial, ImportedNode, ImportedPrimitive, ImportedScene,
    SceneImporter,
};
use super::material::Material;
use super::mesh::{Mesh, MeshBuilder, MeshError};
use super::texture::{self, Texture, TextureCache, TextureRole};
use crate::gpu::{Gpu, GpuError, ProgramId};
use crate::io::{self, AssetError};

/// Texture roles in the order they are bound to texture units.
const ROLE_ORDER: [TextureRole; 4] = [
    TextureRole::Diffuse,
    TextureRole::Specular,
    TextureRole::Normal,
    TextureRole::Height,
];

/// Meshes flattened out of an imported scene hierarchy.
///
/// Node transforms are baked into the vertex data, so every mesh starts with
/// an identity model matrix and model-level transforms apply to each mesh
/// independently.
#[derive(Debug, Default)]
pub struct Model {
    meshes: Vec<Mesh>,
    directory: PathBuf,
}

impl Model {
    /// Imports a glTF file. Failures are logged and yield an empty model.
    pub fn load(path: impl AsRef<Path>, program: ProgramId, cache: &mut TextureCache) -> Self {
        Self::load_with(&GltfImporter, path, program, cache)
    }

    pub fn load_with(
        importer: &dyn SceneImporter,
        path: impl AsRef<Path>,
        program: ProgramId,
        cache: &mut TextureCache,
    ) -> Self {
        let path = path.as_ref();
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        match importer.import(path) {
            Ok(scene) => {
                let model = Self::from_scene(scene, directory, program, cache);
                log::info!("Loaded model {:?} with {} meshes", path, model.len());
                model
            }
            Err(err) => {
                log::error!("Failed to import model {:?}: {}", path, err);
                Self {
                    meshes: Vec::new(),
                    directory,
                }
            }
        }
    }

    /// Builds one mesh per primitive reference, depth first: a node's own
    /// primitives in order, then its children in order.
    pub fn from_scene(
        scene: ImportedScene,
        directory: impl Into<PathBuf>,
        program: ProgramId,
        cache: &mut TextureCache,
    ) -> Self {
        let directory = directory.into();

        let mut placements = Vec::new();
        for root in &scene.roots {
            flatten(root, Mat4::IDENTITY, &mut placements);
        }

        let mut textures = MaterialTextures::new(&directory, &scene.materials);
        let mut meshes = Vec::with_capacity(placements.len());
        for (index, world) in placements {
            let Some(primitive) = scene.primitives.get(index) else {
                log::warn!("Node references missing primitive {}", index);
                continue;
            };
            let material = textures.material(primitive.material, cache);
            match build_mesh(primitive, world, program, material) {
                Ok(mesh) => meshes.push(mesh),
                Err(err) => log::error!("Skipping primitive {}: {}", index, err),
            }
        }

        Self { meshes, directory }
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut [Mesh] {
        &mut self.meshes
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn rotate(&mut self, degrees: f32, axis: Vec3) -> &mut Self {
        for mesh in &mut self.meshes {
            mesh.rotate(degrees, axis);
        }
        self
    }

    pub fn translate(&mut self, offset: Vec3) -> &mut Self {
        for mesh in &mut self.meshes {
            mesh.translate(offset);
        }
        self
    }

    pub fn scale(&mut self, factors: Vec3) -> &mut Self {
        for mesh in &mut self.meshes {
            mesh.scale(factors);
        }
        self
    }
}

impl Drawable for Model {
    fn setup_object(&mut self, gpu: &mut dyn Gpu) -> Result<(), GpuError> {
        for mesh in &mut self.meshes {
            mesh.setup_object(gpu)?;
        }
        Ok(())
    }

    fn draw_object(&self, gpu: &mut dyn Gpu, frame: &FrameContext) {
        for mesh in &self.meshes {
            mesh.draw_object(gpu, frame);
        }
    }

    fn release(&mut self, gpu: &mut dyn Gpu) {
        for mesh in &mut self.meshes {
            mesh.release(gpu);
        }
    }

    fn apply_transform(&mut self, op: TransformOp) {
        for mesh in &mut self.meshes {
            mesh.apply_transform(op);
        }
    }

    fn programs(&self) -> Vec<ProgramId> {
        let mut programs: Vec<ProgramId> = self.meshes.iter().map(Mesh::program).collect();
        programs.dedup();
        programs
    }

    fn name(&self) -> &'static str {
        "Model"
    }
}

fn flatten(node: &ImportedNode, parent: Mat4, out: &mut Vec<(usize, Mat4)>) {
    let world = parent * node.transform;
    out.extend(node.primitives.iter().map(|&index| (index, world)));
    for child in &node.children {
        flatten(child, world, out);
    }
}

/// Resolves each imported material's textures once and hands out clones.
struct MaterialTextures<'a> {
    directory: &'a Path,
    materials: &'a [ImportedMaterial],
    resolved: HashMap<usize, Material>,
}

impl<'a> MaterialTextures<'a> {
    fn new(directory: &'a Path, materials: &'a [ImportedMaterial]) -> Self {
        Self {
            directory,
            materials,
            resolved: HashMap::new(),
        }
    }

    fn material(&mut self, index: Option<usize>, cache: &mut TextureCache) -> Material {
        let materials = self.materials;
        let Some(imported) = index.and_then(|i| materials.get(i)) else {
            return Material::default();
        };
        let directory = self.directory;
        self.resolved
            .entry(index.unwrap_or_default())
            .or_insert_with(|| resolve_material(directory, imported, cache))
            .clone()
    }
}

fn resolve_material(
    directory: &Path,
    imported: &ImportedMaterial,
    cache: &mut TextureCache,
) -> Material {
    let mut material = Material::default();
    material.diffuse = imported.base_color;
    for role in ROLE_ORDER {
        for (_, source) in imported.textures.iter().filter(|(r, _)| *r == role) {
            match load_texture(directory, source, role, cache) {
                Ok(texture) => material.add_texture(texture),
                Err(err) => log::error!(
                    "Material {:?}: dropping {:?} texture: {}",
                    imported.name,
                    role,
                    err
                ),
            }
        }
    }
    material
}

fn load_texture(
    directory: &Path,
    source: &ImageSource,
    role: TextureRole,
    cache: &mut TextureCache,
) -> Result<Rc<Texture>, AssetError> {
    // glTF texture coordinates start at the top-left, matching image rows.
    match source {
        ImageSource::Uri(uri) => cache.load(io::resolve_relative(directory, uri), role, false),
        ImageSource::Embedded { key, bytes } => {
            if let Some(texture) = cache.get(key, role) {
                return Ok(texture);
            }
            let image = texture::decode_image_bytes(bytes, false, key)?;
            Ok(cache.insert(key, image, role))
        }
    }
}

fn build_mesh(
    primitive: &ImportedPrimitive,
    world: Mat4,
    program: ProgramId,
    material: Material,
) -> Result<Mesh, MeshError> {
    let positions: Vec<[f32; 3]> = primitive
        .positions
        .iter()
        .map(|&p| world.transform_point3(Vec3::from(p)).to_array())
        .collect();
    let tex_coords = primitive
        .tex_coords
        .clone()
        .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);

    let builder = match &primitive.normals {
        Some(normals) => {
            let normal_matrix = normal_matrix(world);
            let normals: Vec<[f32; 3]> = normals
                .iter()
                .map(|&n| {
                    (normal_matrix * Vec3::from(n))
                        .try_normalize()
                        .unwrap_or(Vec3::Y)
                        .to_array()
                })
                .collect();
            let builder = MeshBuilder::from_positions(&positions, program)
                .with_normals(bytemuck::cast_slice(&normals))
                .with_tex_coords(bytemuck::cast_slice(&tex_coords));
            match &primitive.indices {
                Some(indices) => builder.with_indices(indices),
                None => builder,
            }
        }
        None => {
            log::warn!(
                "Primitive has no normals, generating flat normals ({} vertices)",
                positions.len()
            );
            let flat = FlatShaded::new(&positions, &tex_coords, primitive.indices.as_deref());
            MeshBuilder::from_positions(&flat.positions, program)
                .with_normals(bytemuck::cast_slice(&flat.normals))
                .with_tex_coords(bytemuck::cast_slice(&flat.tex_coords))
        }
    };

    builder.with_material(material).build()
}

fn normal_matrix(world: Mat4) -> Mat3 {
    let linear = Mat3::from_mat4(world);
    if linear.determinant().abs() < f32::EPSILON {
        linear
    } else {
        linear.inverse().transpose()
    }
}

/// Unindexed triangle list where every vertex carries its face normal.
pub(crate) struct FlatShaded {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
}

impl FlatShaded {
    pub fn new(positions: &[[f32; 3]], tex_coords: &[[f32; 2]], indices: Option<&[u32]>) -> Self {
        let order: Vec<usize> = match indices {
            Some(indices) => indices.iter().map(|&i| i as usize).collect(),
            None => (0..positions.len()).collect(),
        };

        let mut out = Self {
            positions: Vec::with_capacity(order.len()),
            normals: Vec::with_capacity(order.len()),
            tex_coords: Vec::with_capacity(order.len()),
        };
        for triangle in order.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| {
                positions.get(i).copied().map(Vec3::from).unwrap_or(Vec3::ZERO)
            });
            // Degenerate faces still get a unit normal.
            let normal = (b - a).cross(c - a).try_normalize().unwrap_or(Vec3::Y);
            for &i in triangle {
                out.positions
                    .push(positions.get(i).copied().unwrap_or_default());
                out.normals.push(normal.to_array());
                out.tex_coords
                    .push(tex_coords.get(i).copied().unwrap_or_default());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{ProgramSource, RecordingGpu};

    fn soup(vertices: usize) -> ImportedPrimitive {
        ImportedPrimitive {
            positions: vec![[0.0; 3]; vertices],
            normals: Some(vec![[0.0, 0.0, 1.0]; vertices]),
            ..Default::default()
        }
    }

    fn triangle(material: Option<usize>) -> ImportedPrimitive {
        ImportedPrimitive {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: Some(vec![[0.0, 0.0, 1.0]; 3]),
            tex_coords: None,
            indices: None,
            material,
        }
    }

    #[test]
    fn flatten_visits_node_before_children() {
        let scene = ImportedScene {
            roots: vec![ImportedNode::new("root")
                .with_primitive(2)
                .with_child(ImportedNode::new("child").with_primitive(0))
                .with_child(ImportedNode::new("sibling").with_primitive(1))],
            primitives: vec![soup(6), soup(9), triangle(None)],
            materials: Vec::new(),
        };
        let mut cache = TextureCache::new();
        let model = Model::from_scene(scene, "models", ProgramId::new(0), &mut cache);

        let counts: Vec<usize> = model.meshes().iter().map(Mesh::vertex_count).collect();
        assert_eq!(counts, vec![3, 6, 9]);
        assert_eq!(model.directory(), Path::new("models"));
    }

    #[test]
    fn node_transforms_are_baked() {
        let parent = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let child = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let scene = ImportedScene {
            roots: vec![ImportedNode::new("root")
                .with_transform(parent)
                .with_child(ImportedNode::new("child").with_transform(child).with_primitive(0))],
            primitives: vec![triangle(None)],
            materials: Vec::new(),
        };
        let mut cache = TextureCache::new();
        let model = Model::from_scene(scene, "", ProgramId::new(0), &mut cache);
        let mesh = &model.meshes()[0];

        assert!(mesh.model_matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
        let p = Vec3::from(mesh.positions()[1]);
        assert!(p.abs_diff_eq(Vec3::new(10.0, 0.0, -1.0), 1e-5));
        let n = Vec3::from(mesh.normals().unwrap()[0]);
        assert!(n.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn missing_normals_become_flat_face_normals() {
        let scene = ImportedScene {
            roots: vec![ImportedNode::new("root").with_primitive(0)],
            primitives: vec![ImportedPrimitive {
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [5.0, 5.0, 5.0]],
                normals: None,
                tex_coords: None,
                indices: Some(vec![0, 1, 2, 0, 0, 0]),
                material: None,
            }],
            materials: Vec::new(),
        };
        let mut cache = TextureCache::new();
        let model = Model::from_scene(scene, "", ProgramId::new(0), &mut cache);
        let mesh = &model.meshes()[0];

        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.index_count(), None);
        let normals = mesh.normals().unwrap();
        assert!(Vec3::from(normals[0]).abs_diff_eq(Vec3::Y, 1e-6));
        // The degenerate triangle falls back to +Y rather than zero.
        assert!(normals.iter().all(|n| (Vec3::from(*n).length() - 1.0).abs() < 1e-6));
    }

    #[test]
    fn materials_share_embedded_textures() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(1, 1, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let scene = ImportedScene {
            roots: vec![ImportedNode::new("root").with_primitive(0).with_primitive(1)],
            primitives: vec![triangle(Some(0)), triangle(Some(0))],
            materials: vec![ImportedMaterial {
                name: "painted".into(),
                base_color: Vec3::new(0.5, 0.5, 0.5),
                textures: vec![
                    (
                        TextureRole::Normal,
                        ImageSource::Embedded {
                            key: "n".into(),
                            bytes: png.clone(),
                        },
                    ),
                    (
                        TextureRole::Diffuse,
                        ImageSource::Embedded {
                            key: "d".into(),
                            bytes: png,
                        },
                    ),
                    (
                        TextureRole::Specular,
                        ImageSource::Uri("missing.png".into()),
                    ),
                ],
            }],
        };
        let mut cache = TextureCache::new();
        let model = Model::from_scene(scene, "nowhere", ProgramId::new(0), &mut cache);

        let first = model.meshes()[0].material();
        let second = model.meshes()[1].material();
        let roles: Vec<_> = first.textures().iter().map(|t| t.role()).collect();
        assert_eq!(roles, vec![TextureRole::Diffuse, TextureRole::Normal]);
        assert!(Rc::ptr_eq(&first.textures()[0], &second.textures()[0]));
        assert_eq!(first.diffuse, Vec3::splat(0.5));
        assert_eq!(cache.live(), 2);
    }

    #[test]
    fn failed_import_gives_drawable_empty_model() {
        let mut gpu = RecordingGpu::new();
        let program = gpu.create_program(&ProgramSource::phong()).unwrap();
        let mut cache = TextureCache::new();
        let mut model = Model::load("models/missing/scene.gltf", program, &mut cache);
        assert!(model.is_empty());
        assert_eq!(model.directory(), Path::new("models/missing"));

        model.setup_object(&mut gpu).unwrap();
        model.draw_object(&mut gpu, &FrameContext::default());
        assert!(gpu.draw_calls().is_empty());
    }

    #[test]
    fn model_transforms_reach_every_mesh() {
        let scene = ImportedScene {
            roots: vec![ImportedNode::new("root").with_primitive(0).with_primitive(1)],
            primitives: vec![triangle(None), triangle(None)],
            materials: Vec::new(),
        };
        let mut cache = TextureCache::new();
        let mut model = Model::from_scene(scene, "", ProgramId::new(0), &mut cache);
        model
            .translate(Vec3::new(30.0, 0.0, 30.0))
            .rotate(-90.0, Vec3::X);

        for mesh in model.meshes() {
            let p = mesh.model_matrix().transform_point3(Vec3::Y);
            assert!(p.abs_diff_eq(Vec3::new(30.0, 0.0, 29.0), 1e-5));
        }
    }
}
