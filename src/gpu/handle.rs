use std::fmt;
use std::marker::PhantomData;

use super::Gpu;

/// Typed identifier for a resource living on the GPU side of a [`Gpu`].
pub struct Handle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

// Manual impls so `T` does not need to implement these traits itself.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T: ResourceKind> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", T::LABEL, self.index)
    }
}

impl<T> Handle<T> {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

pub enum VertexArray {}
pub enum Texture {}
pub enum Program {}
pub enum UniformBuffer {}

pub type VertexArrayId = Handle<VertexArray>;
pub type TextureId = Handle<Texture>;
pub type ProgramId = Handle<Program>;
pub type BufferId = Handle<UniformBuffer>;

/// A kind of GPU resource that knows how to destroy itself through a [`Gpu`].
pub trait ResourceKind: Sized + 'static {
    const LABEL: &'static str;

    fn destroy(gpu: &mut dyn Gpu, handle: Handle<Self>);
}

impl ResourceKind for VertexArray {
    const LABEL: &'static str = "VertexArray";

    fn destroy(gpu: &mut dyn Gpu, handle: Handle<Self>) {
        gpu.delete_vertex_array(handle);
    }
}

impl ResourceKind for Texture {
    const LABEL: &'static str = "Texture";

    fn destroy(gpu: &mut dyn Gpu, handle: Handle<Self>) {
        gpu.delete_texture(handle);
    }
}

impl ResourceKind for Program {
    const LABEL: &'static str = "Program";

    fn destroy(gpu: &mut dyn Gpu, handle: Handle<Self>) {
        gpu.delete_program(handle);
    }
}

impl ResourceKind for UniformBuffer {
    const LABEL: &'static str = "UniformBuffer";

    fn destroy(gpu: &mut dyn Gpu, handle: Handle<Self>) {
        gpu.delete_uniform_buffer(handle);
    }
}

/// Owning wrapper around a [`Handle`].
///
/// The resource is freed by [`GpuResource::release`], which consumes the
/// wrapper so a handle can only be released once. Dropping an unreleased
/// resource leaks it on the GPU and logs a warning.
pub struct GpuResource<T: ResourceKind> {
    handle: Handle<T>,
    released: bool,
}

impl<T: ResourceKind> GpuResource<T> {
    pub fn new(handle: Handle<T>) -> Self {
        Self {
            handle,
            released: false,
        }
    }

    pub fn id(&self) -> Handle<T> {
        self.handle
    }

    pub fn release(mut self, gpu: &mut dyn Gpu) {
        log::debug!("Releasing {:?}", self.handle);
        T::destroy(gpu, self.handle);
        self.released = true;
    }
}

impl<T: ResourceKind> fmt::Debug for GpuResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GpuResource").field(&self.handle).finish()
    }
}

impl<T: ResourceKind> Drop for GpuResource<T> {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("{:?} dropped without being released", self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCall, RecordingGpu};

    #[test]
    fn handle_is_copy() {
        let h1: TextureId = Handle::new(5);
        let h2 = h1;
        let h3 = h1;
        assert_eq!(h1.index(), h2.index());
        assert_eq!(h1, h3);
    }

    #[test]
    fn release_destroys_exactly_once() {
        let mut gpu = RecordingGpu::new();
        let buffer = gpu.create_uniform_buffer(64).unwrap();
        let resource = GpuResource::new(buffer);
        assert_eq!(resource.id(), buffer);

        resource.release(&mut gpu);

        let deletes = gpu
            .calls()
            .iter()
            .filter(|call| matches!(call, GpuCall::DeleteUniformBuffer(id) if *id == buffer))
            .count();
        assert_eq!(deletes, 1);
        assert_eq!(gpu.live_resources(), 0);
    }
}
