use crate::document::{BufferTarget, ComponentType, Image};
use crate::renderer::draw_calls::DrawCall;

/// Opaque GPU object name (a GL buffer, vertex array or texture).
pub type GpuHandle = u32;

/// Layout of one vertex attribute inside its buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub components: usize,
    pub component_type: ComponentType,
    pub normalized: bool,
    pub stride: usize,
    pub offset: usize,
}

/// The GPU operations the model binder, scene renderer and texture upload
/// rely on. All calls happen on the thread owning the graphics context.
pub trait Gpu {
    /// Creates a buffer, binds it to `target` and uploads `data` into it.
    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> GpuHandle;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: GpuHandle);
    fn delete_buffer(&mut self, buffer: GpuHandle);

    fn create_vertex_array(&mut self) -> GpuHandle;
    /// `None` unbinds.
    fn bind_vertex_array(&mut self, vertex_array: Option<GpuHandle>);
    fn delete_vertex_array(&mut self, vertex_array: GpuHandle);

    /// Enables `slot` and points it at the currently bound array buffer.
    fn enable_vertex_attribute(&mut self, slot: u32, attribute: &VertexAttribute);
    /// Indexed draw from the currently bound element array buffer.
    fn draw_elements(&mut self, draw_call: &DrawCall);

    fn create_texture(&mut self, image: &Image) -> GpuHandle;
    fn bind_texture(&mut self, unit: u32, texture: GpuHandle);
    fn delete_texture(&mut self, texture: GpuHandle);
}
