use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use crate::gpu::{kind, Gpu, GpuError, GpuResource, ImageData, Sampling, TextureId};
use crate::io::{self, AssetError};

/// What a texture is used for when shading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureRole {
    Diffuse,
    Specular,
    Normal,
    Height,
}

/// Decoded image plus its lazily uploaded GPU copy.
///
/// Meshes share textures through `Rc<Texture>`. The first holder to call
/// [`Texture::upload`] creates the GPU copy; the last holder releases it.
#[derive(Debug)]
pub struct Texture {
    key: String,
    role: TextureRole,
    sampling: Sampling,
    image: ImageData,
    gpu: RefCell<Option<GpuResource<kind::Texture>>>,
}

impl Texture {
    pub fn new(key: impl Into<String>, image: ImageData, role: TextureRole) -> Self {
        Self {
            key: key.into(),
            role,
            sampling: Sampling::default(),
            image,
            gpu: RefCell::new(None),
        }
    }

    pub fn from_path(
        path: impl AsRef<Path>,
        role: TextureRole,
        flip_vertically: bool,
    ) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let image = decode_image(path, flip_vertically)?;
        Ok(Self::new(path.to_string_lossy(), image, role))
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn role(&self) -> TextureRole {
        self.role
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    pub fn image(&self) -> &ImageData {
        &self.image
    }

    pub fn gpu_id(&self) -> Option<TextureId> {
        self.gpu.borrow().as_ref().map(GpuResource::id)
    }

    /// Uploads the image unless a GPU copy already exists.
    pub fn upload(&self, gpu: &mut dyn Gpu) -> Result<TextureId, GpuError> {
        if let Some(id) = self.gpu_id() {
            return Ok(id);
        }
        let id = gpu.create_texture(&self.image, self.sampling)?;
        log::debug!(
            "Uploaded texture {} ({}x{})",
            self.key,
            self.image.width,
            self.image.height
        );
        *self.gpu.borrow_mut() = Some(GpuResource::new(id));
        Ok(id)
    }

    pub fn release_gpu(&self, gpu: &mut dyn Gpu) {
        if let Some(resource) = self.gpu.borrow_mut().take() {
            resource.release(gpu);
        }
    }
}

/// Releases `texture` on the GPU if the caller held the last reference.
pub fn release_shared(texture: Rc<Texture>, gpu: &mut dyn Gpu) {
    if let Ok(texture) = Rc::try_unwrap(texture) {
        texture.release_gpu(gpu);
    }
}

pub fn decode_image(path: &Path, flip_vertically: bool) -> Result<ImageData, AssetError> {
    let bytes = io::load_binary(path)?;
    decode_image_bytes(&bytes, flip_vertically, &path.to_string_lossy())
}

pub fn decode_image_bytes(
    bytes: &[u8],
    flip_vertically: bool,
    label: &str,
) -> Result<ImageData, AssetError> {
    let img = image::load_from_memory(bytes).map_err(|source| AssetError::Decode {
        label: label.to_string(),
        source,
    })?;
    let img = if flip_vertically { img.flipv() } else { img };
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageData {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// Texture sharing keyed by path and role.
///
/// Entries are weak, so a texture lives exactly as long as the meshes that
/// hold it; loading the same path for the same role while any holder is alive
/// returns the shared instance.
#[derive(Default)]
pub struct TextureCache {
    entries: HashMap<(String, TextureRole), Weak<Texture>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(
        &mut self,
        path: impl AsRef<Path>,
        role: TextureRole,
        flip_vertically: bool,
    ) -> Result<Rc<Texture>, AssetError> {
        let path = path.as_ref();
        let key = cache_key(path);
        if let Some(texture) = self.get(&key, role) {
            return Ok(texture);
        }

        log::info!("Loading {:?} texture: {:?}", role, path);
        let texture = Rc::new(Texture::from_path(path, role, flip_vertically)?);
        self.entries.insert((key, role), Rc::downgrade(&texture));
        Ok(texture)
    }

    /// Shares an already decoded image under `key`.
    pub fn insert(&mut self, key: &str, image: ImageData, role: TextureRole) -> Rc<Texture> {
        if let Some(texture) = self.get(key, role) {
            return texture;
        }
        let texture = Rc::new(Texture::new(key, image, role));
        self.entries
            .insert((key.to_string(), role), Rc::downgrade(&texture));
        texture
    }

    pub fn get(&self, key: &str, role: TextureRole) -> Option<Rc<Texture>> {
        self.entries
            .get(&(key.to_string(), role))
            .and_then(Weak::upgrade)
    }

    /// Number of textures still held by at least one owner.
    pub fn live(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn purge(&mut self) {
        self.entries.retain(|_, entry| entry.strong_count() > 0);
    }
}

fn cache_key(path: &Path) -> String {
    let path: PathBuf = path.components().collect();
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::RecordingGpu;

    fn checker() -> ImageData {
        ImageData {
            width: 2,
            height: 2,
            pixels: vec![
                255, 0, 0, 255, 0, 255, 0, 255, //
                0, 0, 255, 255, 255, 255, 255, 255,
            ],
        }
    }

    #[test]
    fn cache_shares_until_last_holder_drops() {
        let mut cache = TextureCache::new();
        let a = cache.insert("crate.png", checker(), TextureRole::Diffuse);
        let b = cache.insert("crate.png", ImageData::solid([0; 4]), TextureRole::Diffuse);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(b.image().width, 2);
        assert_eq!(cache.live(), 1);

        drop(a);
        assert_eq!(cache.live(), 1);
        drop(b);
        assert_eq!(cache.live(), 0);
        assert!(cache.get("crate.png", TextureRole::Diffuse).is_none());
    }

    #[test]
    fn same_path_is_shared_per_role() {
        let dir = std::env::temp_dir().join(format!("wgpu-scene-roles-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("container.png");
        image::RgbaImage::from_pixel(1, 1, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let mut cache = TextureCache::new();
        let diffuse = cache.load(&path, TextureRole::Diffuse, false).unwrap();
        let specular = cache.load(&path, TextureRole::Specular, false).unwrap();
        let again = cache.load(&path, TextureRole::Diffuse, false).unwrap();

        assert_eq!(diffuse.role(), TextureRole::Diffuse);
        assert_eq!(specular.role(), TextureRole::Specular);
        assert!(!Rc::ptr_eq(&diffuse, &specular));
        assert!(Rc::ptr_eq(&diffuse, &again));
        assert_eq!(cache.live(), 2);

        let normal = cache.insert("mem", checker(), TextureRole::Normal);
        let height = cache.insert("mem", checker(), TextureRole::Height);
        assert_eq!(normal.role(), TextureRole::Normal);
        assert_eq!(height.role(), TextureRole::Height);
    }

    #[test]
    fn upload_happens_once_and_last_holder_releases() {
        let mut gpu = RecordingGpu::new();
        let texture = Rc::new(Texture::new("t", checker(), TextureRole::Diffuse));
        let other = Rc::clone(&texture);

        let first = texture.upload(&mut gpu).unwrap();
        let second = other.upload(&mut gpu).unwrap();
        assert_eq!(first, second);
        assert_eq!(gpu.live_textures(), 1);

        release_shared(texture, &mut gpu);
        assert_eq!(gpu.live_textures(), 1);
        release_shared(other, &mut gpu);
        assert_eq!(gpu.live_textures(), 0);
    }

    #[test]
    fn png_bytes_decode_and_flip() {
        let mut png = Vec::new();
        let img = image::RgbaImage::from_fn(1, 2, |_, y| {
            if y == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let upright = decode_image_bytes(&png, false, "mem").unwrap();
        assert_eq!(&upright.pixels[..4], &[255, 0, 0, 255]);

        let flipped = decode_image_bytes(&png, true, "mem").unwrap();
        assert_eq!(&flipped.pixels[..4], &[0, 0, 255, 255]);
        assert_eq!((flipped.width, flipped.height), (1, 2));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            decode_image_bytes(b"not an image", false, "junk"),
            Err(AssetError::Decode { .. })
        ));
    }
}
