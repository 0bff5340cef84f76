use crate::document::{Accessor, ComponentType};

/// One indexed draw of a primitive. The index buffer itself is bound
/// separately, right before the draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub mode: u32,
    pub index_type: ComponentType,
    pub index_count: i32,
    pub index_byte_offset: usize,
}

impl DrawCall {
    /// Returns `None` when the index count does not fit in a GL draw.
    pub fn from_indices(mode: u32, indices: &Accessor) -> Option<DrawCall> {
        Some(DrawCall {
            mode,
            index_type: indices.component_type,
            index_count: i32::try_from(indices.count).ok()?,
            index_byte_offset: indices.byte_offset,
        })
    }
}
