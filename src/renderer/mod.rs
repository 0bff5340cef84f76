use std::ffi::c_void;

use glam::Mat4;
use log::info;

use crate::camera::OrbitCamera;
use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::projection::{aspect_ratio, build_projection, build_view, combine, FAR_PLANE, NEAR_PLANE};

pub mod binder;
pub mod draw_calls;
pub mod gl;
pub mod gpu;
pub mod program;
pub mod scene;
pub mod textures;

use binder::ModelBindings;
use gl::GlContext;
use program::ShaderProgram;
use textures::Textures;

/// Owns everything uploaded to the GL context for one model and draws it
/// each frame.
pub struct Renderer {
    gpu: GlContext,
    program: ShaderProgram,
    bindings: Option<ModelBindings>,
    textures: Textures,
    document: Document,
    config: Config,
}

impl Renderer {
    /// `load_fn` resolves GL function names, e.g. SDL's
    /// `gl_get_proc_address`.
    pub fn new(
        load_fn: impl FnMut(&'static str) -> *const c_void,
        document: Document,
        config: Config,
    ) -> Result<Renderer> {
        let mut gpu = GlContext::load(load_fn)?;
        if let (Some(renderer), Some(version)) =
            (gl::get_string(gl::RENDERER), gl::get_string(gl::VERSION))
        {
            info!("{renderer}, {version}");
        }

        gl::call!(gl::Enable(gl::DEPTH_TEST));
        gl::call!(gl::DepthFunc(gl::LESS));
        gl::call!(gl::BlendFunc(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA));
        gl::call!(gl::Enable(gl::BLEND));

        let program = ShaderProgram::new(config.displacement)?;
        let bindings = binder::bind_model(&mut gpu, &document)?;
        let textures = Textures::upload(&mut gpu, &document, config.displacement);
        info!(
            "Ready to draw {} primitives per frame",
            document.primitive_count_reachable()
        );

        Ok(Renderer {
            gpu,
            program,
            bindings: Some(bindings),
            textures,
            document,
            config,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        gl::call!(gl::Viewport(0, 0, width as i32, height as i32));
    }

    /// Draws one frame for a `width`×`height` viewport. The projection is
    /// rebuilt every frame so resizing needs no extra state.
    pub fn render(&mut self, camera: &OrbitCamera, (width, height): (u32, u32)) {
        let clear = self.config.clearcolor;
        gl::call!(gl::ClearColor(clear.x, clear.y, clear.z, 1.0));
        gl::call!(gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT));

        let view = build_view(camera.eye(), camera.pivot());
        let projection = build_projection(
            self.config.fov,
            aspect_ratio(width, height),
            NEAR_PLANE,
            FAR_PLANE,
        );
        let mvp = combine(projection, view, Mat4::IDENTITY);
        self.program
            .set_frame_uniforms(mvp, self.config.light_pos, camera.eye());

        self.textures.bind(&mut self.gpu);
        if let Some(bindings) = &self.bindings {
            scene::draw_model(&mut self.gpu, &self.document, bindings);
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Some(bindings) = self.bindings.take() {
            bindings.release(&mut self.gpu);
        }
        self.textures.release(&mut self.gpu);
    }
}
