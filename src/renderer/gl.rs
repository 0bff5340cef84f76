//! OpenGL ES 3.0 entry points and the helpers the renderer calls them with.

mod bindings {
    #![allow(
        clippy::all,
        dead_code,
        non_camel_case_types,
        non_snake_case,
        non_upper_case_globals,
        unused
    )]

    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}

pub use bindings::*;

use std::ffi::{c_void, CStr};
use std::ptr;

use crate::document::{BufferTarget, Image};
use crate::error::{Result, ViewerError};
use crate::renderer::draw_calls::DrawCall;
use crate::renderer::gpu::{Gpu, GpuHandle, VertexAttribute};

/// Runs a GL call, and in debug builds panics with the call site if it
/// raised an error.
macro_rules! call {
    ($expr:expr) => {{
        let result = unsafe { $expr };
        if cfg!(debug_assertions) {
            let error = unsafe { $crate::renderer::gl::GetError() };
            if error != $crate::renderer::gl::NO_ERROR {
                let error_number_stringified;
                let error_name = match error {
                    $crate::renderer::gl::INVALID_ENUM => "INVALID_ENUM",
                    $crate::renderer::gl::INVALID_VALUE => "INVALID_VALUE",
                    $crate::renderer::gl::INVALID_OPERATION => "INVALID_OPERATION",
                    $crate::renderer::gl::OUT_OF_MEMORY => "OUT_OF_MEMORY",
                    $crate::renderer::gl::INVALID_FRAMEBUFFER_OPERATION => {
                        "INVALID_FRAMEBUFFER_OPERATION"
                    }
                    _ => {
                        error_number_stringified = format!("{error}");
                        &error_number_stringified
                    }
                };
                panic!(
                    "OpenGL error {error_name} at {}:{}:{}",
                    file!(),
                    line!(),
                    column!(),
                );
            }
        }
        result
    }};
}
pub(crate) use call;

/// Returns the GL string for `name` (e.g. `VERSION`), if the driver has one.
pub fn get_string(name: types::GLenum) -> Option<String> {
    let string = call!(GetString(name));
    if string.is_null() {
        return None;
    }
    let string = unsafe { CStr::from_ptr(string as *const _) };
    Some(string.to_string_lossy().into_owned())
}

pub fn create_shader(shader_type: types::GLenum, source: &str) -> Result<types::GLuint> {
    let shader = call!(CreateShader(shader_type));
    let sources = [source.as_ptr() as *const types::GLchar];
    let source_lens = [source.len() as types::GLint];
    call!(ShaderSource(shader, 1, sources.as_ptr(), source_lens.as_ptr()));
    call!(CompileShader(shader));
    let mut compile_status = 0;
    call!(GetShaderiv(shader, COMPILE_STATUS, &mut compile_status));
    if compile_status == FALSE as types::GLint {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetShaderInfoLog(
            shader,
            info_log.len() as types::GLsizei,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteShader(shader));
        let info_log = String::from_utf8_lossy(&info_log[..length.max(0) as usize]);
        return Err(ViewerError::environment(format!(
            "compiling shader failed: {info_log}"
        )));
    }
    Ok(shader)
}

pub fn create_program(shaders: &[types::GLuint]) -> Result<types::GLuint> {
    let program = call!(CreateProgram());
    for &shader in shaders {
        call!(AttachShader(program, shader));
    }
    call!(LinkProgram(program));
    let mut link_status = 0;
    call!(GetProgramiv(program, LINK_STATUS, &mut link_status));
    if link_status == FALSE as types::GLint {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetProgramInfoLog(
            program,
            info_log.len() as types::GLsizei,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteProgram(program));
        let info_log = String::from_utf8_lossy(&info_log[..length.max(0) as usize]);
        return Err(ViewerError::environment(format!(
            "linking shader program failed: {info_log}"
        )));
    }
    Ok(program)
}

/// `None` if the uniform doesn't exist or was optimized out.
pub fn get_uniform_location(program: types::GLuint, name: &str) -> Option<types::GLint> {
    let mut name = name.as_bytes().to_vec();
    name.push(0);
    let location = call!(GetUniformLocation(
        program,
        name.as_ptr() as *const types::GLchar
    ));
    (location != -1).then_some(location)
}

/// [`Gpu`] backed by the current GL context.
pub struct GlContext {
    _private: (),
}

impl GlContext {
    /// Loads the GL entry points. Fails if the context lacks the OpenGL ES
    /// 3.0 functions the viewer needs.
    pub fn load(mut load_fn: impl FnMut(&'static str) -> *const c_void) -> Result<GlContext> {
        load_with(|name| load_fn(name));
        if !GenVertexArrays::is_loaded() || !DrawElements::is_loaded() {
            return Err(ViewerError::environment(
                "OpenGL ES 3.0 is required to run this viewer",
            ));
        }
        Ok(GlContext { _private: () })
    }
}

impl Gpu for GlContext {
    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> GpuHandle {
        let mut buffer = 0;
        call!(GenBuffers(1, &mut buffer));
        call!(BindBuffer(target.gl_enum(), buffer));
        call!(BufferData(
            target.gl_enum(),
            data.len() as types::GLsizeiptr,
            data.as_ptr() as *const c_void,
            STATIC_DRAW,
        ));
        buffer
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: GpuHandle) {
        call!(BindBuffer(target.gl_enum(), buffer));
    }

    fn delete_buffer(&mut self, buffer: GpuHandle) {
        call!(DeleteBuffers(1, &buffer));
    }

    fn create_vertex_array(&mut self) -> GpuHandle {
        let mut vertex_array = 0;
        call!(GenVertexArrays(1, &mut vertex_array));
        vertex_array
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<GpuHandle>) {
        call!(BindVertexArray(vertex_array.unwrap_or(0)));
    }

    fn delete_vertex_array(&mut self, vertex_array: GpuHandle) {
        call!(DeleteVertexArrays(1, &vertex_array));
    }

    fn enable_vertex_attribute(&mut self, slot: u32, attribute: &VertexAttribute) {
        call!(EnableVertexAttribArray(slot));
        call!(VertexAttribPointer(
            slot,
            attribute.components as types::GLint,
            attribute.component_type.gl_enum(),
            if attribute.normalized { TRUE } else { FALSE },
            attribute.stride as types::GLsizei,
            attribute.offset as *const c_void,
        ));
    }

    fn draw_elements(&mut self, draw_call: &DrawCall) {
        call!(DrawElements(
            draw_call.mode,
            draw_call.index_count,
            draw_call.index_type.gl_enum(),
            draw_call.index_byte_offset as *const c_void,
        ));
    }

    fn create_texture(&mut self, image: &Image) -> GpuHandle {
        let mut texture = 0;
        call!(GenTextures(1, &mut texture));
        call!(BindTexture(TEXTURE_2D, texture));
        call!(PixelStorei(UNPACK_ALIGNMENT, 1));
        call!(TexParameteri(TEXTURE_2D, TEXTURE_MIN_FILTER, LINEAR as types::GLint));
        call!(TexParameteri(TEXTURE_2D, TEXTURE_MAG_FILTER, LINEAR as types::GLint));
        call!(TexParameteri(TEXTURE_2D, TEXTURE_WRAP_S, REPEAT as types::GLint));
        call!(TexParameteri(TEXTURE_2D, TEXTURE_WRAP_T, REPEAT as types::GLint));
        let pixels = if image.pixels.is_empty() {
            ptr::null()
        } else {
            image.pixels.as_ptr() as *const c_void
        };
        call!(TexImage2D(
            TEXTURE_2D,
            0,
            RGBA as types::GLint,
            image.width as types::GLsizei,
            image.height as types::GLsizei,
            0,
            RGBA,
            UNSIGNED_BYTE,
            pixels,
        ));
        texture
    }

    fn bind_texture(&mut self, unit: u32, texture: GpuHandle) {
        call!(ActiveTexture(TEXTURE0 + unit));
        call!(BindTexture(TEXTURE_2D, texture));
    }

    fn delete_texture(&mut self, texture: GpuHandle) {
        call!(DeleteTextures(1, &texture));
    }
}
