use log::debug;

use crate::document::{BufferTarget, Document, Primitive};
use crate::renderer::binder::ModelBindings;
use crate::renderer::draw_calls::DrawCall;
use crate::renderer::gpu::Gpu;

/// Issues one indexed draw per primitive reachable from the default scene,
/// in the same order the binder visited them. Returns the number of draws.
pub fn draw_model(gpu: &mut impl Gpu, document: &Document, bindings: &ModelBindings) -> usize {
    gpu.bind_vertex_array(Some(bindings.vertex_array));
    let mut draws = 0;
    document.walk_default_scene(&mut |node| {
        let Some(mesh_index) = node.mesh_index else {
            return;
        };
        for primitive in &document.meshes[mesh_index].primitives {
            if draw_primitive(gpu, document, bindings, primitive) {
                draws += 1;
            }
        }
    });
    gpu.bind_vertex_array(None);
    draws
}

fn draw_primitive(
    gpu: &mut impl Gpu,
    document: &Document,
    bindings: &ModelBindings,
    primitive: &Primitive,
) -> bool {
    let Some(indices) = primitive.indices.map(|i| &document.accessors[i]) else {
        return false;
    };
    let Some(index_buffer) = indices
        .buffer_view
        .and_then(|view| bindings.index_buffers.get(view))
    else {
        debug!("skipping primitive without a bound index buffer");
        return false;
    };
    let Some(draw_call) = DrawCall::from_indices(primitive.mode, indices) else {
        debug!("skipping primitive with {} indices", indices.count);
        return false;
    };
    gpu.bind_buffer(BufferTarget::ElementArray, index_buffer);
    gpu.draw_elements(&draw_call);
    true
}
