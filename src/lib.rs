//! A glTF viewer: binds a model's buffers into a GL vertex array once, then
//! draws its default scene every frame from an orbiting camera.

pub mod camera;
pub mod config;
pub mod document;
pub mod error;
pub mod loader;
pub mod projection;
pub mod renderer;

pub use error::{Result, ViewerError};
