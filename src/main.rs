use std::env;
use std::ffi::c_void;

use log::error;
use sdl2::event::Event;
use sdl2::mouse::MouseButton;
use sdl2::video::GLProfile;

use gltf_orbit_viewer::camera::OrbitCamera;
use gltf_orbit_viewer::config::Config;
use gltf_orbit_viewer::loader;
use gltf_orbit_viewer::renderer::Renderer;
use gltf_orbit_viewer::ViewerError;

const DEFAULT_ASSET: &str = "models/Cube/Cube.gltf";
const CONFIG_PATH: &str = "config.json";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let asset_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_ASSET.to_string());
    let config = Config::load(CONFIG_PATH)?;

    let sdl_context = sdl2::init().map_err(ViewerError::environment)?;
    let video_subsystem = sdl_context.video().map_err(ViewerError::environment)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::GLES);
    gl_attr.set_context_version(3, 0);
    gl_attr.set_depth_size(24);
    // Linear->SRGB conversion is done in shader.
    gl_attr.set_framebuffer_srgb_compatible(false);
    let window = video_subsystem
        .window(env!("CARGO_PKG_NAME"), 800, 600)
        .resizable()
        .opengl()
        .build()
        .map_err(ViewerError::environment)?;
    let _gl_context = window
        .gl_create_context()
        .map_err(ViewerError::environment)?;
    video_subsystem
        .gl_set_swap_interval(1)
        .map_err(ViewerError::environment)?;
    let mut event_pump = sdl_context.event_pump().map_err(ViewerError::environment)?;

    let document = match loader::load(&asset_path) {
        Ok(document) => document,
        Err(err) => {
            error!("{err}");
            return Ok(());
        }
    };
    document.log_summary();

    let mut camera = OrbitCamera::new(config.rc, config.camera_distance, config.camera_sensitivity);
    let mut renderer = Renderer::new(
        |name| video_subsystem.gl_get_proc_address(name) as *const c_void,
        document,
        config,
    )?;

    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => break 'running,
                Event::MouseButtonDown {
                    mouse_btn: MouseButton::Left,
                    ..
                } => camera.press(),
                Event::MouseButtonUp {
                    mouse_btn: MouseButton::Left,
                    ..
                } => camera.release(),
                Event::MouseMotion { x, y, .. } => camera.pointer_moved(x as f64, y as f64),
                _ => {}
            }
        }

        let viewport = window.drawable_size();
        renderer.resize(viewport.0, viewport.1);
        renderer.render(&camera, viewport);
        window.gl_swap_window();
    }

    Ok(())
}
