//! GPU rendering with OpenGL ES
//!
//! Handles:
//! - GBM device/surface creation
//! - EGL context creation (GBM platform)
//! - Triangle shader, buffers and per-frame transform

pub mod context;
pub mod error;
pub mod shader;
pub mod transform;
pub mod triangle;

pub use context::{EglContext, GbmDevice, GbmSurface, GlRenderer, GL_INFO_LOG_TARGET};
pub use error::{check_gl_error, GlError};
pub use shader::TriangleShader;
pub use triangle::TriangleMesh;
