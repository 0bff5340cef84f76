//! In-memory representation of a loaded glTF asset. Everything here is
//! immutable once [`crate::loader`] has produced it; the binder and the
//! scene renderer only ever borrow it.

use std::collections::BTreeMap;

use glam::Mat4;
use log::debug;

pub struct Document {
    pub scene: Option<usize>,
    pub scenes: Vec<Scene>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub accessors: Vec<Accessor>,
    pub buffer_views: Vec<BufferView>,
    pub buffers: Vec<Buffer>,
    pub images: Vec<Image>,
    pub textures: Vec<Texture>,
    pub materials: Vec<Material>,
}

pub struct Scene {
    pub node_indices: Vec<usize>,
}

pub struct Node {
    pub mesh_index: Option<usize>,
    pub child_node_indices: Vec<usize>,
    /// Local transform. Parsed for completeness, every node is still drawn
    /// with the identity model matrix.
    pub transform: Mat4,
}

pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

pub struct Primitive {
    /// GL draw mode, `gl::TRIANGLES` (4) unless the asset says otherwise.
    pub mode: u32,
    pub indices: Option<usize>,
    /// Semantic name (`POSITION`, `NORMAL`, ...) to accessor index, ordered
    /// by name so binding order is deterministic.
    pub attributes: BTreeMap<String, usize>,
    pub material: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub fn from_gl_enum(value: u32) -> Option<ComponentType> {
        match value {
            5120 => Some(ComponentType::I8),
            5121 => Some(ComponentType::U8),
            5122 => Some(ComponentType::I16),
            5123 => Some(ComponentType::U16),
            5125 => Some(ComponentType::U32),
            5126 => Some(ComponentType::F32),
            _ => None,
        }
    }

    pub fn gl_enum(self) -> u32 {
        match self {
            ComponentType::I8 => 5120,
            ComponentType::U8 => 5121,
            ComponentType::I16 => 5122,
            ComponentType::U16 => 5123,
            ComponentType::U32 => 5125,
            ComponentType::F32 => 5126,
        }
    }

    /// Size of one component in bytes.
    pub fn size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    pub fn from_name(name: &str) -> Option<AccessorType> {
        match name {
            "SCALAR" => Some(AccessorType::Scalar),
            "VEC2" => Some(AccessorType::Vec2),
            "VEC3" => Some(AccessorType::Vec3),
            "VEC4" => Some(AccessorType::Vec4),
            "MAT2" => Some(AccessorType::Mat2),
            "MAT3" => Some(AccessorType::Mat3),
            "MAT4" => Some(AccessorType::Mat4),
            _ => None,
        }
    }

    pub fn components(self) -> usize {
        match self {
            AccessorType::Scalar => 1,
            AccessorType::Vec2 => 2,
            AccessorType::Vec3 => 3,
            AccessorType::Vec4 | AccessorType::Mat2 => 4,
            AccessorType::Mat3 => 9,
            AccessorType::Mat4 => 16,
        }
    }
}

pub struct Accessor {
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub count: usize,
    pub component_type: ComponentType,
    pub kind: AccessorType,
    pub normalized: bool,
}

impl Accessor {
    /// Size of one tightly packed element in bytes.
    pub fn element_size(&self) -> usize {
        self.kind.components() * self.component_type.size()
    }

    /// The distance between consecutive elements: the view's declared
    /// stride, or the packed element size when the view has none.
    pub fn byte_stride(&self, view: &BufferView) -> usize {
        match view.byte_stride {
            Some(stride) if stride > 0 => stride,
            _ => self.element_size(),
        }
    }

    /// Number of bytes the accessor reads from the start of its view, or
    /// `None` if that does not fit in a `usize`.
    pub fn byte_extent(&self, view: &BufferView) -> Option<usize> {
        if self.count == 0 {
            return Some(self.byte_offset);
        }
        self.byte_stride(view)
            .checked_mul(self.count - 1)?
            .checked_add(self.element_size())?
            .checked_add(self.byte_offset)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

impl BufferTarget {
    pub const ARRAY_BUFFER: u32 = 34962;
    pub const ELEMENT_ARRAY_BUFFER: u32 = 34963;

    pub fn from_gl_enum(value: u32) -> Option<BufferTarget> {
        match value {
            BufferTarget::ARRAY_BUFFER => Some(BufferTarget::Array),
            BufferTarget::ELEMENT_ARRAY_BUFFER => Some(BufferTarget::ElementArray),
            _ => None,
        }
    }

    pub fn gl_enum(self) -> u32 {
        match self {
            BufferTarget::Array => BufferTarget::ARRAY_BUFFER,
            BufferTarget::ElementArray => BufferTarget::ELEMENT_ARRAY_BUFFER,
        }
    }
}

pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    /// `None` when the asset leaves the target unset (or zero).
    pub target: Option<BufferTarget>,
}

pub struct Buffer {
    pub data: Vec<u8>,
}

/// A decoded image, always RGBA8.
pub struct Image {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub struct Texture {
    pub source: Option<usize>,
}

pub struct Material {
    pub name: String,
    pub base_color_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub metallic_roughness_texture: Option<usize>,
}

impl Document {
    /// The scene the asset asks to be shown, falling back to the first one.
    pub fn default_scene(&self) -> Option<&Scene> {
        self.scenes.get(self.scene.unwrap_or(0))
    }

    /// Visits every node reachable from the default scene's roots, depth
    /// first and parents before children. A node shared by several parents
    /// is visited once per parent visit.
    pub fn walk_default_scene<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        let Some(scene) = self.default_scene() else {
            return;
        };
        for &node_index in &scene.node_indices {
            self.walk_node(&self.nodes[node_index], visit);
        }
    }

    fn walk_node<'a>(&'a self, node: &'a Node, visit: &mut impl FnMut(&'a Node)) {
        visit(node);
        for &child_index in &node.child_node_indices {
            self.walk_node(&self.nodes[child_index], visit);
        }
    }

    /// Meshes in traversal order, one entry per visit of a node with a mesh.
    pub fn reachable_meshes(&self) -> Vec<&Mesh> {
        let mut meshes = Vec::new();
        self.walk_default_scene(&mut |node| {
            if let Some(mesh_index) = node.mesh_index {
                meshes.push(&self.meshes[mesh_index]);
            }
        });
        meshes
    }

    pub fn primitive_count_reachable(&self) -> usize {
        self.reachable_meshes()
            .iter()
            .map(|mesh| mesh.primitives.len())
            .sum()
    }

    pub fn log_summary(&self) {
        for mesh in &self.meshes {
            debug!("mesh: {}", mesh.name);
            for primitive in &mesh.primitives {
                if let Some(accessor) = primitive.indices.map(|i| &self.accessors[i]) {
                    debug!(
                        "  index accessor: count {}, type {:?}",
                        accessor.count, accessor.component_type
                    );
                }
                if let Some(material) = primitive.material.map(|i| &self.materials[i]) {
                    debug!("  material: {}", material.name);
                }
                debug!("  mode: {}", primitive.mode);
                for name in primitive.attributes.keys() {
                    debug!("  attribute: {name}");
                }
            }
        }
        for image in &self.images {
            debug!(
                "image {}: {}x{}, {} bytes",
                image.name,
                image.width,
                image.height,
                image.pixels.len()
            );
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn stride_falls_back_to_packed_size() {
        let document = triangle();
        let accessor = &document.accessors[0];
        let view = &document.buffer_views[0];
        assert_eq!(accessor.element_size(), 12);
        assert_eq!(accessor.byte_stride(view), 12);
        assert_eq!(accessor.byte_extent(view), Some(36));
    }

    #[test]
    fn declared_stride_wins() {
        let mut document = triangle();
        document.buffer_views[0].byte_stride = Some(24);
        let accessor = &document.accessors[0];
        assert_eq!(accessor.byte_stride(&document.buffer_views[0]), 24);
        assert_eq!(accessor.byte_extent(&document.buffer_views[0]), Some(24 * 2 + 12));
    }

    #[test]
    fn huge_counts_have_no_extent() {
        let mut document = triangle();
        document.accessors[0].count = usize::MAX / 8;
        assert_eq!(document.accessors[0].byte_extent(&document.buffer_views[0]), None);
        document.accessors[2].count = (1 << (usize::BITS - 1)) + 1;
        assert_eq!(document.accessors[2].byte_extent(&document.buffer_views[2]), None);
    }

    #[test]
    fn traversal_is_preorder_and_repeats_shared_children() {
        let mut document = triangle();
        // 0 -> [1, 2], 1 -> [3], 2 -> [3]
        document.scenes[0].node_indices = vec![0];
        document.nodes = vec![
            node(None, &[1, 2]),
            node(None, &[3]),
            node(None, &[3]),
            node(Some(0), &[]),
        ];
        let mut order = Vec::new();
        document.walk_default_scene(&mut |node| {
            let index = document
                .nodes
                .iter()
                .position(|n| std::ptr::eq(n, node))
                .unwrap();
            order.push(index);
        });
        assert_eq!(order, vec![0, 1, 3, 2, 3]);
        assert_eq!(document.primitive_count_reachable(), 2);
    }

    #[test]
    fn missing_scene_index_falls_back_to_first_scene() {
        let mut document = triangle();
        document.scene = None;
        assert!(document.default_scene().is_some());
        document.scenes.clear();
        assert!(document.default_scene().is_none());
        assert_eq!(document.primitive_count_reachable(), 0);
    }

    #[test]
    fn component_and_target_enums() {
        assert_eq!(ComponentType::from_gl_enum(5123), Some(ComponentType::U16));
        assert_eq!(ComponentType::from_gl_enum(5124), None);
        assert_eq!(ComponentType::F32.gl_enum(), 5126);
        assert_eq!(AccessorType::from_name("MAT4").map(|t| t.components()), Some(16));
        assert_eq!(BufferTarget::from_gl_enum(34963), Some(BufferTarget::ElementArray));
        assert_eq!(BufferTarget::from_gl_enum(0), None);
    }
}
