//! Scene objects: everything the renderer can draw plus the camera.

pub mod camera;
pub mod drawable;
pub mod grid;
pub mod import;
pub mod material;
pub mod mesh;
pub mod model;
pub mod primitives;
pub mod skybox;
pub mod texture;
pub mod transform;

pub use camera::{Camera, CameraMovement};
pub use drawable::{AsAny, Drawable, FrameContext, TransformOp};
pub use grid::Grid;
pub use import::{GltfImporter, ImportError, ImportedScene, SceneImporter};
pub use material::Material;
pub use mesh::{Mesh, MeshBuilder, MeshError};
pub use model::Model;
pub use skybox::{Cubemap, Skybox};
pub use texture::{Texture, TextureCache, TextureRole};
pub use transform::Transform;
