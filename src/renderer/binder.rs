//! Uploads a document's buffer views and records its vertex layout into a
//! single vertex array object.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::document::{Accessor, BufferTarget, BufferView, Document, Mesh};
use crate::error::{Result, ViewerError};
use crate::renderer::draw_calls::DrawCall;
use crate::renderer::gpu::{Gpu, GpuHandle, VertexAttribute};

/// Vertex attribute slot of each supported semantic. The shader program
/// declares the same locations.
pub const ATTRIBUTE_SLOTS: [(&str, u32); 4] = [
    ("POSITION", 0),
    ("NORMAL", 1),
    ("TEXCOORD_0", 2),
    ("TANGENT", 3),
];

pub fn attribute_slot(semantic: &str) -> Option<u32> {
    ATTRIBUTE_SLOTS
        .iter()
        .find(|(name, _)| *name == semantic)
        .map(|&(_, slot)| slot)
}

/// Buffer view index to GPU buffer. Filled once by [`bind_model`] and only
/// read afterwards.
#[derive(Debug, Default)]
pub struct BindingTable {
    buffers: BTreeMap<usize, GpuHandle>,
}

impl BindingTable {
    pub fn get(&self, buffer_view: usize) -> Option<GpuHandle> {
        self.buffers.get(&buffer_view).copied()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, GpuHandle)> + '_ {
        self.buffers.iter().map(|(&view, &handle)| (view, handle))
    }
}

/// What the scene renderer needs to draw a bound model.
#[derive(Debug)]
pub struct ModelBindings {
    pub vertex_array: GpuHandle,
    /// Only element array buffers survive binding, the vertex array keeps
    /// its own reference to the vertex buffers.
    pub index_buffers: BindingTable,
}

impl ModelBindings {
    pub fn release(self, gpu: &mut impl Gpu) {
        for (_, buffer) in self.index_buffers.iter() {
            gpu.delete_buffer(buffer);
        }
        gpu.delete_vertex_array(self.vertex_array);
    }
}

/// Uploads every buffer view with a binding target, then walks the default
/// scene and points the attribute slots at the uploaded vertex data.
///
/// Byte ranges that overrun their backing storage abort the whole bind.
pub fn bind_model(gpu: &mut impl Gpu, document: &Document) -> Result<ModelBindings> {
    let vertex_array = gpu.create_vertex_array();
    gpu.bind_vertex_array(Some(vertex_array));

    let mut buffers = BTreeMap::new();
    let result = upload_buffer_views(gpu, document, &mut buffers).and_then(|_| {
        for mesh in document.reachable_meshes() {
            bind_mesh(gpu, document, &buffers, mesh)?;
        }
        Ok(())
    });
    gpu.bind_vertex_array(None);

    if let Err(err) = result {
        for (_, buffer) in buffers {
            gpu.delete_buffer(buffer);
        }
        gpu.delete_vertex_array(vertex_array);
        return Err(err);
    }

    buffers.retain(|&view_index, &mut buffer| {
        let keep = document.buffer_views[view_index].target == Some(BufferTarget::ElementArray);
        if !keep {
            gpu.delete_buffer(buffer);
        }
        keep
    });
    info!(
        "Bound model: vertex array {vertex_array}, {} index buffers retained",
        buffers.len()
    );

    Ok(ModelBindings {
        vertex_array,
        index_buffers: BindingTable { buffers },
    })
}

fn upload_buffer_views(
    gpu: &mut impl Gpu,
    document: &Document,
    buffers: &mut BTreeMap<usize, GpuHandle>,
) -> Result<()> {
    for (view_index, view) in document.buffer_views.iter().enumerate() {
        let Some(target) = view.target else {
            // Unindexed vertex data would need a glDrawArrays path.
            skip(format!("buffer view {view_index} has no target"));
            continue;
        };
        let bytes = buffer_view_bytes(document, view_index, view)?;
        debug!(
            "buffer view {view_index}: {} bytes from buffer {} at offset {}, target {target:?}",
            bytes.len(),
            view.buffer,
            view.byte_offset
        );
        buffers.insert(view_index, gpu.create_buffer(target, bytes));
    }
    Ok(())
}

fn buffer_view_bytes<'a>(
    document: &'a Document,
    view_index: usize,
    view: &BufferView,
) -> Result<&'a [u8]> {
    let data = &document.buffers[view.buffer].data;
    view.byte_offset
        .checked_add(view.byte_length)
        .and_then(|end| data.get(view.byte_offset..end))
        .ok_or_else(|| ViewerError::RangeViolation {
            what: format!("buffer view {view_index}"),
            offset: view.byte_offset,
            end: view.byte_offset.saturating_add(view.byte_length),
            len: data.len(),
            backing: format!("buffer {}", view.buffer),
        })
}

fn check_accessor_range(
    accessor_index: usize,
    accessor: &Accessor,
    view_index: usize,
    view: &BufferView,
) -> Result<()> {
    match accessor.byte_extent(view) {
        Some(end) if end <= view.byte_length => Ok(()),
        end => Err(ViewerError::RangeViolation {
            what: format!("accessor {accessor_index}"),
            offset: accessor.byte_offset,
            end: end.unwrap_or(usize::MAX),
            len: view.byte_length,
            backing: format!("buffer view {view_index}"),
        }),
    }
}

fn bind_mesh(
    gpu: &mut impl Gpu,
    document: &Document,
    buffers: &BTreeMap<usize, GpuHandle>,
    mesh: &Mesh,
) -> Result<()> {
    for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
        let Some(accessor_index) = primitive.indices else {
            skip(format!("{} primitive {primitive_index} is not indexed", mesh.name));
            continue;
        };
        let accessor = &document.accessors[accessor_index];
        if DrawCall::from_indices(primitive.mode, accessor).is_none() {
            return Err(ViewerError::RangeViolation {
                what: format!("index accessor {accessor_index} count"),
                offset: 0,
                end: accessor.count,
                len: i32::MAX as usize,
                backing: "a single draw call".to_string(),
            });
        }
        if let Some(view_index) = accessor.buffer_view {
            let view = &document.buffer_views[view_index];
            check_accessor_range(accessor_index, accessor, view_index, view)?;
            if view.target != Some(BufferTarget::ElementArray) {
                skip(format!(
                    "{} primitive {primitive_index}: indices in buffer view {view_index}, \
                     which is not an element array buffer",
                    mesh.name
                ));
            }
        } else {
            skip(format!(
                "{} primitive {primitive_index}: index accessor {accessor_index} has no buffer view",
                mesh.name
            ));
        }

        for (semantic, &accessor_index) in &primitive.attributes {
            let Some(slot) = attribute_slot(semantic) else {
                skip(format!("attribute {semantic} has no slot"));
                continue;
            };
            let accessor = &document.accessors[accessor_index];
            let Some(view_index) = accessor.buffer_view else {
                skip(format!("attribute {semantic} has no buffer view"));
                continue;
            };
            let view = &document.buffer_views[view_index];
            check_accessor_range(accessor_index, accessor, view_index, view)?;
            if accessor.kind.components() > 4 {
                skip(format!("attribute {semantic} is a {:?}", accessor.kind));
                continue;
            }
            let Some(buffer) = buffers.get(&view_index).copied() else {
                skip(format!(
                    "attribute {semantic} reads buffer view {view_index}, which was not uploaded"
                ));
                continue;
            };
            gpu.bind_buffer(BufferTarget::Array, buffer);
            gpu.enable_vertex_attribute(
                slot,
                &VertexAttribute {
                    components: accessor.kind.components(),
                    component_type: accessor.component_type,
                    normalized: accessor.normalized,
                    stride: accessor.byte_stride(view),
                    offset: accessor.byte_offset,
                },
            );
        }
    }
    Ok(())
}

fn skip(reason: String) {
    warn!("{}", ViewerError::Unsupported(reason));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::{self, triangle};
    use crate::document::{AccessorType, ComponentType};
    use crate::renderer::gpu::recording::{GpuCall, RecordingGpu};

    #[test]
    fn slot_table() {
        assert_eq!(attribute_slot("POSITION"), Some(0));
        assert_eq!(attribute_slot("NORMAL"), Some(1));
        assert_eq!(attribute_slot("TEXCOORD_0"), Some(2));
        assert_eq!(attribute_slot("TANGENT"), Some(3));
        assert_eq!(attribute_slot("COLOR_0"), None);
        assert_eq!(attribute_slot("position"), None);
    }

    #[test]
    fn views_without_target_are_skipped() {
        let document = triangle();
        let mut gpu = RecordingGpu::default();
        let bindings = bind_model(&mut gpu, &document).unwrap();

        // View 1 (normals) has no target.
        assert_eq!(gpu.created_buffers(), 2);
        assert!(!gpu
            .calls
            .iter()
            .any(|call| matches!(call, GpuCall::EnableVertexAttribute(1, _))));
        assert_eq!(bindings.index_buffers.len(), 1);
        assert!(bindings.index_buffers.get(1).is_none());
    }

    #[test]
    fn vertex_buffers_are_released_and_index_buffers_kept() {
        let document = triangle();
        let mut gpu = RecordingGpu::default();
        let bindings = bind_model(&mut gpu, &document).unwrap();

        let index_buffer = bindings.index_buffers.get(2).unwrap();
        assert_eq!(gpu.live_buffers.iter().copied().collect::<Vec<_>>(), vec![index_buffer]);
        assert!(bindings.index_buffers.get(0).is_none());

        // The vertex buffer is deleted only after the vertex array is unbound.
        let unbind = gpu
            .calls
            .iter()
            .position(|call| *call == GpuCall::BindVertexArray(None))
            .unwrap();
        let delete = gpu
            .calls
            .iter()
            .position(|call| matches!(call, GpuCall::DeleteBuffer(_)))
            .unwrap();
        assert!(unbind < delete);

        bindings.release(&mut gpu);
        assert!(gpu.live_buffers.is_empty());
    }

    #[test]
    fn position_attribute_layout() {
        let mut document = triangle();
        document.buffer_views[0].byte_stride = Some(12);
        let mut gpu = RecordingGpu::default();
        bind_model(&mut gpu, &document).unwrap();

        let position_buffer = match gpu.calls[2] {
            GpuCall::CreateBuffer { handle, .. } => handle,
            ref other => panic!("unexpected call {other:?}"),
        };
        let bind = gpu
            .calls
            .iter()
            .position(|call| *call == GpuCall::BindBuffer(BufferTarget::Array, position_buffer))
            .unwrap();
        assert_eq!(
            gpu.calls[bind + 1],
            GpuCall::EnableVertexAttribute(
                0,
                VertexAttribute {
                    components: 3,
                    component_type: ComponentType::F32,
                    normalized: false,
                    stride: 12,
                    offset: 0,
                }
            )
        );
    }

    #[test]
    fn unknown_semantics_are_skipped() {
        let mut document = triangle();
        document.meshes[0].primitives[0]
            .attributes
            .insert("COLOR_0".to_string(), 0);
        let mut gpu = RecordingGpu::default();
        bind_model(&mut gpu, &document).unwrap();
        let enabled = gpu
            .calls
            .iter()
            .filter(|call| matches!(call, GpuCall::EnableVertexAttribute(..)))
            .count();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn matrix_attributes_are_skipped() {
        let mut document = triangle();
        document.accessors[0].kind = AccessorType::Mat3;
        document.accessors[0].count = 1;
        let mut gpu = RecordingGpu::default();
        bind_model(&mut gpu, &document).unwrap();
        assert!(!gpu
            .calls
            .iter()
            .any(|call| matches!(call, GpuCall::EnableVertexAttribute(..))));
    }

    #[test]
    fn buffer_view_overrun_is_fatal() {
        let mut document = triangle();
        document.buffer_views[2].byte_length = 64;
        let mut gpu = RecordingGpu::default();
        let err = bind_model(&mut gpu, &document).unwrap_err();
        assert!(matches!(
            err,
            ViewerError::RangeViolation { offset: 72, end: 136, len: 80, .. }
        ));
        // Nothing uploaded so far is left behind.
        assert!(gpu.live_buffers.is_empty());
    }

    #[test]
    fn accessor_overrun_is_fatal() {
        let mut document = triangle();
        document.accessors[0].count = 4;
        let mut gpu = RecordingGpu::default();
        assert!(matches!(
            bind_model(&mut gpu, &document),
            Err(ViewerError::RangeViolation { end: 48, len: 36, .. })
        ));
    }

    #[test]
    fn overflowing_accessor_extent_is_fatal() {
        let mut document = triangle();
        document.accessors[0].count = usize::MAX / 8;
        let mut gpu = RecordingGpu::default();
        assert!(matches!(
            bind_model(&mut gpu, &document),
            Err(ViewerError::RangeViolation { end: usize::MAX, len: 36, .. })
        ));
        assert!(gpu.live_buffers.is_empty());

        let mut document = triangle();
        document.accessors[2].count = (1 << (usize::BITS - 1)) + 1;
        let mut gpu = RecordingGpu::default();
        assert!(bind_model(&mut gpu, &document).is_err());
        assert!(gpu.draws().is_empty());
    }

    #[test]
    fn index_counts_beyond_glsizei_are_fatal() {
        let mut document = triangle();
        document.accessors[2].count = i32::MAX as usize + 1;
        let mut gpu = RecordingGpu::default();
        let err = bind_model(&mut gpu, &document).unwrap_err();
        assert!(matches!(
            err,
            ViewerError::RangeViolation { ref what, .. } if what.contains("count")
        ));
    }

    #[test]
    fn shared_meshes_are_bound_once_per_visit() {
        let mut document = triangle();
        document.nodes = vec![
            fixtures::node(None, &[1, 1]),
            fixtures::node(Some(0), &[]),
        ];
        let mut gpu = RecordingGpu::default();
        bind_model(&mut gpu, &document).unwrap();
        // One upload per buffer view, but the attributes are set per visit.
        assert_eq!(gpu.created_buffers(), 2);
        let enabled = gpu
            .calls
            .iter()
            .filter(|call| matches!(call, GpuCall::EnableVertexAttribute(0, _)))
            .count();
        assert_eq!(enabled, 2);
    }
}
