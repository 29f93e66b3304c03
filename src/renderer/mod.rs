mod renderer;
pub mod uniforms;

pub use renderer::{ObjectHandle, RenderError, Renderer, RendererBuilder};
pub use uniforms::{MatricesUniform, MATRICES_BINDING};
