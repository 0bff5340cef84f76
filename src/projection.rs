//! View and projection matrices. Everything here is a pure function of its
//! arguments; the aspect ratio is recomputed by the caller every frame.

use glam::{Mat4, Vec3};

pub const NEAR_PLANE: f32 = 0.01;
pub const FAR_PLANE: f32 = 1000.0;

/// Right-handed look-at with +Y up. `eye == target`, or looking straight
/// along Y, gives a meaningless matrix.
pub fn build_view(eye: Vec3, target: Vec3) -> Mat4 {
    Mat4::look_at_rh(eye, target, Vec3::Y)
}

/// OpenGL-style perspective projection (clip z in -1..1).
pub fn build_projection(vertical_fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh_gl(vertical_fov_degrees.to_radians(), aspect, near, far)
}

pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    width as f32 / height.max(1) as f32
}

pub fn combine(projection: Mat4, view: Mat4, model: Mat4) -> Mat4 {
    projection * view * model
}
