//! Importer-neutral scene description and the glTF importer that fills it.

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};

use super::texture::TextureRole;
use crate::io::{self, AssetError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to parse {path:?}: {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("{0:?} has no scene")]
    NoScene(PathBuf),
}

/// Where a material's image comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// Relative to the model file's directory, still percent-encoded.
    Uri(String),
    /// Encoded image bytes stored inside the model file.
    Embedded { key: String, bytes: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportedMaterial {
    pub name: String,
    pub base_color: Vec3,
    pub textures: Vec<(TextureRole, ImageSource)>,
}

impl Default for ImportedMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: Vec3::ONE,
            textures: Vec::new(),
        }
    }
}

/// One triangle list. Optional streams hold one entry per position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedPrimitive {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub indices: Option<Vec<u32>>,
    pub material: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportedNode {
    pub name: String,
    /// Local transform relative to the parent node.
    pub transform: Mat4,
    /// Indices into [`ImportedScene::primitives`].
    pub primitives: Vec<usize>,
    pub children: Vec<ImportedNode>,
}

impl ImportedNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            primitives: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_primitive(mut self, primitive: usize) -> Self {
        self.primitives.push(primitive);
        self
    }

    pub fn with_child(mut self, child: ImportedNode) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedScene {
    pub roots: Vec<ImportedNode>,
    pub primitives: Vec<ImportedPrimitive>,
    pub materials: Vec<ImportedMaterial>,
}

impl ImportedScene {
    /// Primitive references across the whole hierarchy.
    pub fn primitive_count(&self) -> usize {
        fn count(node: &ImportedNode) -> usize {
            node.primitives.len() + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }
}

pub trait SceneImporter {
    fn import(&self, path: &Path) -> Result<ImportedScene, ImportError>;
}

/// Reads `.gltf`/`.glb` files, including external, data-URI and GLB-embedded
/// buffers and images.
#[derive(Clone, Copy, Debug, Default)]
pub struct GltfImporter;

impl SceneImporter for GltfImporter {
    fn import(&self, path: &Path) -> Result<ImportedScene, ImportError> {
        let gltf_error = |source| ImportError::Gltf {
            path: path.to_path_buf(),
            source,
        };
        let gltf::Gltf { document, blob } = gltf::Gltf::open(path).map_err(gltf_error)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let buffers = gltf::import_buffers(&document, Some(base), blob).map_err(gltf_error)?;

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| ImportError::NoScene(path.to_path_buf()))?;

        let materials = document
            .materials()
            .map(|material| read_material(path, &material, &buffers))
            .collect::<Vec<_>>();

        // glTF primitives are addressed by (mesh, primitive); flatten them to a
        // single list and remember where each mesh starts.
        let mut primitives = Vec::new();
        let mut mesh_ranges = Vec::new();
        for mesh in document.meshes() {
            let start = primitives.len();
            for primitive in mesh.primitives() {
                match read_primitive(&primitive, &buffers) {
                    Some(read) => primitives.push(read),
                    None => log::warn!(
                        "Skipping primitive {} of mesh {:?} ({:?})",
                        primitive.index(),
                        mesh.name().unwrap_or("Unnamed"),
                        primitive.mode()
                    ),
                }
            }
            mesh_ranges.push(start..primitives.len());
        }

        let roots = scene
            .nodes()
            .map(|node| read_node(&node, &mesh_ranges))
            .collect();

        log::info!(
            "Imported {:?}: {} primitives, {} materials",
            path,
            primitives.len(),
            materials.len()
        );
        Ok(ImportedScene {
            roots,
            primitives,
            materials,
        })
    }
}

fn read_node(node: &gltf::Node, mesh_ranges: &[std::ops::Range<usize>]) -> ImportedNode {
    let primitives = node
        .mesh()
        .and_then(|mesh| mesh_ranges.get(mesh.index()).cloned())
        .map(|range| range.collect())
        .unwrap_or_default();

    ImportedNode {
        name: node.name().unwrap_or("Unnamed").to_string(),
        transform: Mat4::from_cols_array_2d(&node.transform().matrix()),
        primitives,
        children: node
            .children()
            .map(|child| read_node(&child, mesh_ranges))
            .collect(),
    }
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> Option<ImportedPrimitive> {
    use gltf::mesh::Mode;

    let reader =
        primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let normals = reader.read_normals().map(|n| n.collect::<Vec<_>>());
    let tex_coords = reader
        .read_tex_coords(0)
        .map(|uv| uv.into_f32().collect::<Vec<_>>());
    let indices = reader
        .read_indices()
        .map(|i| i.into_u32().collect::<Vec<_>>());

    let indices = match primitive.mode() {
        Mode::Triangles => indices,
        Mode::TriangleStrip => Some(triangulate_strip(&sequence(indices, positions.len()))),
        Mode::TriangleFan => Some(triangulate_fan(&sequence(indices, positions.len()))),
        Mode::Points | Mode::Lines | Mode::LineLoop | Mode::LineStrip => return None,
    };

    Some(ImportedPrimitive {
        positions,
        normals,
        tex_coords,
        indices,
        material: primitive.material().index(),
    })
}

fn sequence(indices: Option<Vec<u32>>, vertex_count: usize) -> Vec<u32> {
    indices.unwrap_or_else(|| (0..vertex_count as u32).collect())
}

/// Triangle list from a strip, keeping consistent winding.
pub fn triangulate_strip(strip: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(strip.len().saturating_sub(2) * 3);
    for (i, window) in strip.windows(3).enumerate() {
        if i % 2 == 0 {
            out.extend_from_slice(&[window[0], window[1], window[2]]);
        } else {
            out.extend_from_slice(&[window[1], window[0], window[2]]);
        }
    }
    out
}

pub fn triangulate_fan(fan: &[u32]) -> Vec<u32> {
    let Some((&center, rest)) = fan.split_first() else {
        return Vec::new();
    };
    rest.windows(2)
        .flat_map(|pair| [center, pair[0], pair[1]])
        .collect()
}

/// Texture slots whose image cannot be located are dropped with a warning;
/// the rest of the material is kept.
fn read_material(
    path: &Path,
    material: &gltf::Material,
    buffers: &[gltf::buffer::Data],
) -> ImportedMaterial {
    let name = material.name().unwrap_or("Unnamed").to_string();
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();

    let slots = [
        (
            TextureRole::Diffuse,
            pbr.base_color_texture().map(|info| info.texture()),
        ),
        (
            TextureRole::Normal,
            material.normal_texture().map(|normal| normal.texture()),
        ),
    ];
    let textures = slots
        .into_iter()
        .filter_map(|(role, texture)| {
            match image_source(path, &texture?.source(), buffers) {
                Ok(source) => Some((role, source)),
                Err(err) => {
                    log::warn!("Material {:?}: dropping {:?} texture: {}", name, role, err);
                    None
                }
            }
        })
        .collect();

    ImportedMaterial {
        name,
        base_color: Vec3::new(r, g, b),
        textures,
    }
}

fn image_source(
    path: &Path,
    image: &gltf::Image,
    buffers: &[gltf::buffer::Data],
) -> Result<ImageSource, AssetError> {
    let key = format!("{}#image{}", path.display(), image.index());
    match image.source() {
        gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => {
            Ok(ImageSource::Embedded {
                key,
                bytes: io::decode_data_uri(uri)?,
            })
        }
        gltf::image::Source::Uri { uri, .. } => Ok(ImageSource::Uri(uri.to_string())),
        gltf::image::Source::View { view, .. } => {
            let data = buffers
                .get(view.buffer().index())
                .ok_or_else(|| AssetError::DataUri(format!("missing buffer for {key}")))?;
            let range = view.offset()..view.offset() + view.length();
            let bytes = data
                .0
                .get(range)
                .ok_or_else(|| AssetError::DataUri(format!("buffer view out of range for {key}")))?;
            Ok(ImageSource::Embedded {
                key,
                bytes: bytes.to_vec(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_alternates_winding() {
        assert_eq!(triangulate_strip(&[0, 1, 2, 3]), vec![0, 1, 2, 2, 1, 3]);
        assert!(triangulate_strip(&[0, 1]).is_empty());
    }

    #[test]
    fn fan_shares_first_vertex() {
        assert_eq!(triangulate_fan(&[0, 1, 2, 3]), vec![0, 1, 2, 0, 2, 3]);
        assert!(triangulate_fan(&[]).is_empty());
    }

    #[test]
    fn primitive_count_walks_hierarchy() {
        let scene = ImportedScene {
            roots: vec![
                ImportedNode::new("root")
                    .with_primitive(0)
                    .with_child(ImportedNode::new("a").with_primitive(1).with_primitive(2))
                    .with_child(ImportedNode::new("b")),
                ImportedNode::new("other").with_primitive(3),
            ],
            ..Default::default()
        };
        assert_eq!(scene.primitive_count(), 4);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = GltfImporter.import(Path::new("models/none/scene.gltf"));
        assert!(matches!(result, Err(ImportError::Gltf { .. })));
    }
}
