use super::drawable::{Drawable, FrameContext};
use crate::gpu::{kind, DrawState, Gpu, GpuError, GpuResource, ProgramId, Uniforms, VertexData};

/// Vertices of the screen-covering quad; positions come from the shader.
const GRID_VERTICES: u32 = 6;

/// Infinite debug grid on the ground plane.
#[derive(Debug)]
pub struct Grid {
    program: ProgramId,
    vertex_array: Option<GpuResource<kind::VertexArray>>,
    visible: bool,
}

impl Grid {
    pub fn new(program: ProgramId) -> Self {
        Self {
            program,
            vertex_array: None,
            visible: true,
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

impl Drawable for Grid {
    fn setup_object(&mut self, gpu: &mut dyn Gpu) -> Result<(), GpuError> {
        if self.vertex_array.is_some() {
            return Ok(());
        }
        let positions = [[0.0f32; 3]; GRID_VERTICES as usize];
        let id = gpu.create_vertex_array(&VertexData {
            positions: &positions,
            ..Default::default()
        })?;
        self.vertex_array = Some(GpuResource::new(id));
        Ok(())
    }

    fn draw_object(&self, gpu: &mut dyn Gpu, frame: &FrameContext) {
        let Some(vertex_array) = &self.vertex_array else {
            return;
        };
        if !self.visible {
            return;
        }

        gpu.set_draw_state(DrawState::overlay_blended());
        gpu.use_program(self.program);
        Uniforms::new(gpu, self.program)
            .set_mat4("inverseViewProjection", frame.view_projection().inverse());
        gpu.draw_arrays(vertex_array.id(), 0, GRID_VERTICES);
        gpu.set_draw_state(DrawState::standard());
    }

    fn release(&mut self, gpu: &mut dyn Gpu) {
        if let Some(vertex_array) = self.vertex_array.take() {
            vertex_array.release(gpu);
        }
    }

    fn programs(&self) -> Vec<ProgramId> {
        vec![self.program]
    }

    fn name(&self) -> &'static str {
        "Grid"
    }
}
