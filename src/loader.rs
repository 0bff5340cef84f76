//! glTF 2.0 parsing into a [`Document`]. Handles `.gltf` files with
//! external resources and `.glb` containers with an embedded BIN chunk.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use log::info;
use tinyjson::JsonValue;

use crate::document::{
    Accessor, AccessorType, Buffer, BufferTarget, BufferView, ComponentType, Document, Image,
    Material, Mesh, Node, Primitive, Scene, Texture,
};
use crate::error::{Result, ViewerError};

type Object = HashMap<String, JsonValue>;
type Parse<T> = std::result::Result<T, String>;

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;
const GLB_CHUNK_BIN: u32 = 0x004E_4942;

/// `TRIANGLE_FAN`, the last of the glTF primitive modes.
const MAX_PRIMITIVE_MODE: u32 = 6;
const MAX_BYTE_STRIDE: usize = 252;

/// Reads and parses the asset at `path`. External buffers and images are
/// resolved relative to the asset's directory.
pub fn load(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| ViewerError::load(path, err))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let resolve = |uri: &str| -> Parse<Vec<u8>> {
        fs::read(base.join(uri)).map_err(|err| format!("could not read \"{uri}\": {err}"))
    };

    let is_glb = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("glb"))
        .unwrap_or(false);
    let document = if is_glb {
        let (json, bin) = split_glb(&bytes).map_err(|reason| ViewerError::load(path, reason))?;
        parse(path, &json, bin, resolve)?
    } else {
        let json = String::from_utf8(bytes).map_err(|err| ViewerError::load(path, err))?;
        parse(path, &json, None, resolve)?
    };
    info!(
        "Loaded glTF: {} ({} nodes, {} meshes, {} buffer views)",
        path.display(),
        document.nodes.len(),
        document.meshes.len(),
        document.buffer_views.len()
    );
    Ok(document)
}

/// Parses glTF JSON. `bin` is the BIN chunk of a GLB, `resolve` fetches the
/// bytes behind a relative uri. `path` is only used for error messages.
pub fn parse(
    path: &Path,
    json: &str,
    bin: Option<Vec<u8>>,
    mut resolve: impl FnMut(&str) -> std::result::Result<Vec<u8>, String>,
) -> Result<Document> {
    parse_document(json, bin, &mut resolve)
        .and_then(|document| validate(&document).map(|_| document))
        .map_err(|reason| ViewerError::load(path, reason))
}

fn parse_document(
    json: &str,
    mut bin: Option<Vec<u8>>,
    resolve: &mut impl FnMut(&str) -> Parse<Vec<u8>>,
) -> Parse<Document> {
    let gltf: JsonValue = json.parse().map_err(|err| format!("invalid JSON: {err}"))?;
    let gltf: &Object = gltf.get().ok_or("top level is not an object")?;

    let mut buffers = Vec::new();
    for (i, buffer) in objects(gltf, "buffers")?.into_iter().enumerate() {
        let byte_length = req_usize(buffer, "byteLength")?;
        let mut data = match buffer.get("uri") {
            Some(uri) => {
                let uri = uri.get::<String>().ok_or("buffer uri is not a string")?;
                resolve_uri(uri, resolve)?
            }
            None => bin
                .take()
                .ok_or_else(|| format!("buffer {i} has no uri and there is no BIN chunk"))?,
        };
        if data.len() < byte_length {
            return Err(format!(
                "buffer {i} declares {byte_length} bytes but only {} are available",
                data.len()
            ));
        }
        data.truncate(byte_length);
        buffers.push(Buffer { data });
    }

    let mut buffer_views = Vec::new();
    for view in objects(gltf, "bufferViews")? {
        let target = match opt_usize(view, "target")?.unwrap_or(0) {
            0 => None,
            value => Some(
                BufferTarget::from_gl_enum(value as u32)
                    .ok_or_else(|| format!("unknown buffer view target {value}"))?,
            ),
        };
        buffer_views.push(BufferView {
            buffer: req_usize(view, "buffer")?,
            byte_offset: opt_usize(view, "byteOffset")?.unwrap_or(0),
            byte_length: req_usize(view, "byteLength")?,
            byte_stride: opt_usize(view, "byteStride")?,
            target,
        });
    }

    let mut accessors = Vec::new();
    for accessor in objects(gltf, "accessors")? {
        let component_type = req_usize(accessor, "componentType")?;
        let component_type = ComponentType::from_gl_enum(component_type as u32)
            .ok_or_else(|| format!("unknown accessor componentType {component_type}"))?;
        let kind = req_str(accessor, "type")?;
        let kind = AccessorType::from_name(kind)
            .ok_or_else(|| format!("unexpected accessor type \"{kind}\""))?;
        accessors.push(Accessor {
            buffer_view: opt_usize(accessor, "bufferView")?,
            byte_offset: opt_usize(accessor, "byteOffset")?.unwrap_or(0),
            count: req_usize(accessor, "count")?,
            component_type,
            kind,
            normalized: opt_bool(accessor, "normalized")?.unwrap_or(false),
        });
    }

    let mut meshes = Vec::new();
    for (i, mesh) in objects(gltf, "meshes")?.into_iter().enumerate() {
        let mut primitives = Vec::new();
        for primitive in objects(mesh, "primitives")? {
            let attributes = primitive
                .get("attributes")
                .and_then(|attributes| attributes.get::<Object>())
                .ok_or("primitive has no attributes object")?;
            let attributes = attributes
                .iter()
                .map(|(name, accessor)| take_usize(accessor).map(|index| (name.clone(), index)))
                .collect::<Parse<BTreeMap<_, _>>>()?;
            let mode = opt_usize(primitive, "mode")?.unwrap_or(4);
            primitives.push(Primitive {
                mode: u32::try_from(mode).map_err(|_| format!("unknown primitive mode {mode}"))?,
                indices: opt_usize(primitive, "indices")?,
                attributes,
                material: opt_usize(primitive, "material")?,
            });
        }
        let name = opt_str(mesh, "name")?.map(str::to_string);
        meshes.push(Mesh {
            name: name.unwrap_or_else(|| format!("mesh {i}")),
            primitives,
        });
    }

    let mut nodes = Vec::new();
    for node in objects(gltf, "nodes")? {
        let child_node_indices = array(node, "children")?
            .iter()
            .map(take_usize)
            .collect::<Parse<Vec<_>>>()?;
        nodes.push(Node {
            mesh_index: opt_usize(node, "mesh")?,
            child_node_indices,
            transform: take_transform(node)?,
        });
    }

    let mut scenes = Vec::new();
    for scene in objects(gltf, "scenes")? {
        let node_indices = array(scene, "nodes")?
            .iter()
            .map(take_usize)
            .collect::<Parse<Vec<_>>>()?;
        scenes.push(Scene { node_indices });
    }

    let mut images = Vec::new();
    for (i, image) in objects(gltf, "images")?.into_iter().enumerate() {
        let (name, bytes) = if let Some(uri) = opt_str(image, "uri")? {
            (uri.to_string(), resolve_uri(uri, resolve)?)
        } else if let Some(view_index) = opt_usize(image, "bufferView")? {
            let view = buffer_views
                .get(view_index)
                .ok_or_else(|| format!("image {i} references missing buffer view {view_index}"))?;
            let data = buffers
                .get(view.buffer)
                .map(|buffer| buffer.data.as_slice())
                .ok_or_else(|| format!("image {i} references missing buffer {}", view.buffer))?;
            let bytes = view
                .byte_offset
                .checked_add(view.byte_length)
                .and_then(|end| data.get(view.byte_offset..end))
                .ok_or_else(|| format!("image {i} buffer view is out of range"))?;
            (format!("image {i}"), bytes.to_vec())
        } else {
            return Err(format!("image {i} has neither uri nor bufferView"));
        };
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| format!("could not decode \"{name}\": {err}"))?
            .to_rgba8();
        images.push(Image {
            name,
            width: decoded.width(),
            height: decoded.height(),
            pixels: decoded.into_raw(),
        });
    }

    let mut textures = Vec::new();
    for texture in objects(gltf, "textures")? {
        textures.push(Texture {
            source: opt_usize(texture, "source")?,
        });
    }

    let mut materials = Vec::new();
    for (i, material) in objects(gltf, "materials")?.into_iter().enumerate() {
        let pbr = material.get("pbrMetallicRoughness").and_then(|v| v.get::<Object>());
        let name = opt_str(material, "name")?.map(str::to_string);
        materials.push(Material {
            name: name.unwrap_or_else(|| format!("material {i}")),
            base_color_texture: pbr
                .map(|pbr| texture_ref(pbr, "baseColorTexture"))
                .transpose()?
                .flatten(),
            metallic_roughness_texture: pbr
                .map(|pbr| texture_ref(pbr, "metallicRoughnessTexture"))
                .transpose()?
                .flatten(),
            normal_texture: texture_ref(material, "normalTexture")?,
        });
    }

    Ok(Document {
        scene: opt_usize(gltf, "scene")?,
        scenes,
        nodes,
        meshes,
        accessors,
        buffer_views,
        buffers,
        images,
        textures,
        materials,
    })
}

/// Checks every cross reference so the rest of the viewer can index freely.
fn validate(document: &Document) -> Parse<()> {
    let check = |what: &str, index: usize, len: usize| -> Parse<()> {
        if index < len {
            Ok(())
        } else {
            Err(format!("{what} index {index} is out of range (have {len})"))
        }
    };

    if let Some(scene) = document.scene {
        check("default scene", scene, document.scenes.len())?;
    }
    for scene in &document.scenes {
        for &node in &scene.node_indices {
            check("scene root node", node, document.nodes.len())?;
        }
    }
    for node in &document.nodes {
        if let Some(mesh) = node.mesh_index {
            check("mesh", mesh, document.meshes.len())?;
        }
        for &child in &node.child_node_indices {
            check("child node", child, document.nodes.len())?;
        }
    }
    for mesh in &document.meshes {
        for primitive in &mesh.primitives {
            if primitive.mode > MAX_PRIMITIVE_MODE {
                return Err(format!("unknown primitive mode {}", primitive.mode));
            }
            for &accessor in primitive.attributes.values().chain(&primitive.indices) {
                check("accessor", accessor, document.accessors.len())?;
            }
            if let Some(indices) = primitive.indices {
                let accessor = &document.accessors[indices];
                let unsigned = matches!(
                    accessor.component_type,
                    ComponentType::U8 | ComponentType::U16 | ComponentType::U32
                );
                if !unsigned || accessor.kind != AccessorType::Scalar {
                    return Err(format!(
                        "index accessor {indices} must be unsigned scalars, not {:?} {:?}",
                        accessor.component_type, accessor.kind
                    ));
                }
            }
            if let Some(material) = primitive.material {
                check("material", material, document.materials.len())?;
            }
        }
    }
    for accessor in &document.accessors {
        if let Some(view) = accessor.buffer_view {
            check("buffer view", view, document.buffer_views.len())?;
        }
    }
    for view in &document.buffer_views {
        check("buffer", view.buffer, document.buffers.len())?;
        if let Some(stride) = view.byte_stride {
            if !(4..=MAX_BYTE_STRIDE).contains(&stride) || stride % 4 != 0 {
                return Err(format!("byteStride {stride} is not a multiple of 4 in 4..=252"));
            }
        }
    }
    for texture in &document.textures {
        if let Some(source) = texture.source {
            check("image", source, document.images.len())?;
        }
    }
    for material in &document.materials {
        let textures = [
            material.base_color_texture,
            material.normal_texture,
            material.metallic_roughness_texture,
        ];
        for texture in textures.into_iter().flatten() {
            check("texture", texture, document.textures.len())?;
        }
    }
    Ok(())
}

/// Splits a binary glTF container into its JSON text and BIN chunk.
fn split_glb(bytes: &[u8]) -> Parse<(String, Option<Vec<u8>>)> {
    let read_u32 = |at: usize| -> Parse<u32> {
        bytes
            .get(at..at + 4)
            .and_then(|word| word.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or_else(|| format!("GLB is truncated at byte {at}"))
    };
    if read_u32(0)? != GLB_MAGIC {
        return Err("not a GLB file (bad magic)".to_string());
    }
    let version = read_u32(4)?;
    if version != 2 {
        return Err(format!("unsupported GLB version {version}"));
    }
    let total_length = (read_u32(8)? as usize).min(bytes.len());

    let mut json = None;
    let mut bin = None;
    let mut offset = 12;
    while offset + 8 <= total_length {
        let chunk_length = read_u32(offset)? as usize;
        let chunk_type = read_u32(offset + 4)?;
        let start = offset + 8;
        let chunk = start
            .checked_add(chunk_length)
            .and_then(|end| bytes.get(start..end))
            .ok_or_else(|| format!("GLB chunk at byte {offset} is truncated"))?;
        match chunk_type {
            GLB_CHUNK_JSON if json.is_none() => {
                let text = std::str::from_utf8(chunk)
                    .map_err(|err| format!("GLB JSON chunk is not UTF-8: {err}"))?;
                json = Some(text.to_string());
            }
            GLB_CHUNK_BIN if bin.is_none() => bin = Some(chunk.to_vec()),
            _ => {}
        }
        offset = start + chunk_length;
    }
    let json = json.ok_or("GLB has no JSON chunk")?;
    Ok((json, bin))
}

fn resolve_uri(uri: &str, resolve: &mut impl FnMut(&str) -> Parse<Vec<u8>>) -> Parse<Vec<u8>> {
    if uri.starts_with("data:") {
        return Err("embedded data: uris are not supported".to_string());
    }
    resolve(uri)
}

fn texture_ref(object: &Object, key: &str) -> Parse<Option<usize>> {
    match object.get(key).and_then(|v| v.get::<Object>()) {
        Some(info) => Ok(Some(req_usize(info, "index")?)),
        None => Ok(None),
    }
}

fn take_transform(node: &Object) -> Parse<Mat4> {
    if let Some(matrix_values) = node.get("matrix") {
        let values = take_f32s(matrix_values)?;
        if values.len() != 16 {
            return Err(format!("node matrix has {} values", values.len()));
        }
        return Ok(Mat4::from_cols_slice(&values));
    }
    let translation = node.get("translation").map(take_vec3).transpose()?;
    let scale = node.get("scale").map(take_vec3).transpose()?;
    let rotation = node.get("rotation").map(take_quat).transpose()?;
    Ok(Mat4::from_scale_rotation_translation(
        scale.unwrap_or(Vec3::ONE),
        rotation.unwrap_or(Quat::IDENTITY),
        translation.unwrap_or(Vec3::ZERO),
    ))
}

fn array<'a>(object: &'a Object, key: &str) -> Parse<&'a [JsonValue]> {
    match object.get(key) {
        Some(value) => value
            .get::<Vec<_>>()
            .map(Vec::as_slice)
            .ok_or_else(|| format!("\"{key}\" is not an array")),
        None => Ok(&[]),
    }
}

fn objects<'a>(object: &'a Object, key: &str) -> Parse<Vec<&'a Object>> {
    array(object, key)?
        .iter()
        .map(|value| {
            value
                .get::<Object>()
                .ok_or_else(|| format!("\"{key}\" contains a non-object"))
        })
        .collect()
}

/// Returns the value as usize if it is a non-negative whole number.
fn take_usize(value: &JsonValue) -> Parse<usize> {
    match value.get::<f64>() {
        Some(&n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
        _ => Err(format!("expected an index, got {value:?}")),
    }
}

fn opt_usize(object: &Object, key: &str) -> Parse<Option<usize>> {
    object.get(key).map(take_usize).transpose()
}

fn req_usize(object: &Object, key: &str) -> Parse<usize> {
    opt_usize(object, key)?.ok_or_else(|| format!("missing \"{key}\""))
}

fn opt_bool(object: &Object, key: &str) -> Parse<Option<bool>> {
    object
        .get(key)
        .map(|value| value.get::<bool>().copied().ok_or(format!("\"{key}\" is not a boolean")))
        .transpose()
}

fn opt_str<'a>(object: &'a Object, key: &str) -> Parse<Option<&'a str>> {
    object
        .get(key)
        .map(|value| {
            value
                .get::<String>()
                .map(String::as_str)
                .ok_or_else(|| format!("\"{key}\" is not a string"))
        })
        .transpose()
}

fn req_str<'a>(object: &'a Object, key: &str) -> Parse<&'a str> {
    opt_str(object, key)?.ok_or_else(|| format!("missing \"{key}\""))
}

fn take_f32s(value: &JsonValue) -> Parse<Vec<f32>> {
    let values = value.get::<Vec<JsonValue>>().ok_or("expected an array of numbers")?;
    values
        .iter()
        .map(|v| {
            v.get::<f64>()
                .map(|&n| n as f32)
                .ok_or_else(|| format!("expected a number, got {v:?}"))
        })
        .collect()
}

fn take_vec3(value: &JsonValue) -> Parse<Vec3> {
    let values = take_f32s(value)?;
    match values.as_slice() {
        &[x, y, z] => Ok(Vec3::new(x, y, z)),
        other => Err(format!("expected 3 numbers, got {}", other.len())),
    }
}

fn take_quat(value: &JsonValue) -> Parse<Quat> {
    let values = take_f32s(value)?;
    match values.as_slice() {
        &[x, y, z, w] => Ok(Quat::from_xyzw(x, y, z, w)),
        other => Err(format!("expected 4 numbers, got {}", other.len())),
    }
}
