//! OpenGL ES error reporting
//!
//! Every GL error is fatal. `check_gl_error` turns the first pending
//! glGetError code into a typed error carrying the stage that raised it.

use glow::HasContext;
use thiserror::Error;

/// GL error raised during a named stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("GL error 0x{code:04x} ({name}) during {stage}")]
pub struct GlError {
    pub code: u32,
    pub name: &'static str,
    pub stage: &'static str,
}

impl GlError {
    pub fn new(code: u32, stage: &'static str) -> Self {
        Self {
            code,
            name: gl_error_name(code),
            stage,
        }
    }
}

/// Symbolic name for a glGetError code
pub fn gl_error_name(code: u32) -> &'static str {
    match code {
        glow::INVALID_ENUM => "GL_INVALID_ENUM",
        glow::INVALID_VALUE => "GL_INVALID_VALUE",
        glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
        glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        _ => "unknown",
    }
}

/// Fail if the GL error flag is set
pub fn check_gl_error(gl: &glow::Context, stage: &'static str) -> Result<(), GlError> {
    let code = unsafe { gl.get_error() };
    if code == glow::NO_ERROR {
        Ok(())
    } else {
        Err(GlError::new(code, stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_contains_code() {
        let err = GlError::new(glow::INVALID_OPERATION, "draw");
        assert_eq!(
            err.to_string(),
            "GL error 0x0502 (GL_INVALID_OPERATION) during draw"
        );
    }

    #[test]
    fn test_unknown_code() {
        let err = GlError::new(0xbeef, "upload");
        assert_eq!(err.to_string(), "GL error 0xbeef (unknown) during upload");
    }

    #[test]
    fn test_converts_to_anyhow() {
        fn fails() -> anyhow::Result<()> {
            Err(GlError::new(glow::OUT_OF_MEMORY, "buffer upload"))?;
            Ok(())
        }
        let msg = format!("{}", fails().unwrap_err());
        assert!(msg.contains("0x0505"));
    }
}
