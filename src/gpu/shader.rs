//! Shader management
//!
//! GLSL ES 1.00 shader compilation and linking (runs on ES 2 and ES 3 contexts)

use anyhow::{anyhow, Result};
use glow::HasContext;
use log::info;

use super::transform::Mat4;

/// Triangle vertex shader (GLSL ES 1.00)
///
/// Input:
///   pos:   Vertex position (homogeneous)
///   color: Vertex color (RGBA)
/// Uniform:
///   modelviewProjection: Rotation + scale matrix
const TRIANGLE_VERTEX_SHADER: &str = r#"#version 100
attribute vec4 pos;
attribute vec4 color;

uniform mat4 modelviewProjection;

varying vec4 v_color;

void main() {
    gl_Position = modelviewProjection * pos;
    v_color = color;
}
"#;

/// Triangle fragment shader: interpolated vertex color
const TRIANGLE_FRAGMENT_SHADER: &str = r#"#version 100
precision mediump float;

varying vec4 v_color;

void main() {
    gl_FragColor = v_color;
}
"#;

/// Attribute name for vertex positions
pub const ATTR_POSITION: &str = "pos";
/// Attribute name for vertex colors
pub const ATTR_COLOR: &str = "color";
/// Uniform name for the transformation matrix
pub const UNIFORM_MATRIX: &str = "modelviewProjection";

/// Compiled triangle shader program
pub struct TriangleShader {
    program: glow::Program,
    pub a_pos: u32,
    pub a_color: u32,
    pub u_matrix: glow::UniformLocation,
}

impl TriangleShader {
    /// Compile and link triangle shader
    pub fn new(gl: &glow::Context) -> Result<Self> {
        let program = compile_program(gl, TRIANGLE_VERTEX_SHADER, TRIANGLE_FRAGMENT_SHADER)?;

        let lookup = || -> Result<(u32, u32, glow::UniformLocation)> {
            unsafe {
                let a_pos = gl
                    .get_attrib_location(program, ATTR_POSITION)
                    .ok_or_else(|| anyhow!("{} attribute not found", ATTR_POSITION))?;
                let a_color = gl
                    .get_attrib_location(program, ATTR_COLOR)
                    .ok_or_else(|| anyhow!("{} attribute not found", ATTR_COLOR))?;
                let u_matrix = gl
                    .get_uniform_location(program, UNIFORM_MATRIX)
                    .ok_or_else(|| anyhow!("{} uniform not found", UNIFORM_MATRIX))?;
                Ok((a_pos, a_color, u_matrix))
            }
        };

        let (a_pos, a_color, u_matrix) = match lookup() {
            Ok(locations) => locations,
            Err(e) => {
                unsafe { gl.delete_program(program) };
                return Err(e);
            }
        };

        info!(
            "Triangle shader compiled (pos={}, color={})",
            a_pos, a_color
        );
        Ok(Self {
            program,
            a_pos,
            a_color,
            u_matrix,
        })
    }

    /// Activate the shader
    pub fn bind(&self, gl: &glow::Context) {
        unsafe {
            gl.use_program(Some(self.program));
        }
    }

    /// Upload the transformation matrix (column-major)
    pub fn set_matrix(&self, gl: &glow::Context, matrix: &Mat4) {
        unsafe {
            gl.uniform_matrix_4_f32_slice(Some(&self.u_matrix), false, matrix);
        }
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.program);
        }
    }
}

/// Compile shader and link program
fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<glow::Program> {
    unsafe {
        let vs = compile_shader(gl, glow::VERTEX_SHADER, vertex_src)?;
        let fs = match compile_shader(gl, glow::FRAGMENT_SHADER, fragment_src) {
            Ok(fs) => fs,
            Err(e) => {
                gl.delete_shader(vs);
                return Err(e);
            }
        };

        let program = gl
            .create_program()
            .map_err(|e| anyhow!("Failed to create program: {}", e))?;

        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);

        let linked = gl.get_program_link_status(program);

        // Shader objects no longer needed after linking
        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);

        if !linked {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(anyhow!("Shader link failed: {}", log));
        }

        Ok(program)
    }
}

/// Compile individual shader
fn compile_shader(gl: &glow::Context, shader_type: u32, source: &str) -> Result<glow::Shader> {
    unsafe {
        let shader = gl
            .create_shader(shader_type)
            .map_err(|e| anyhow!("Failed to create shader: {}", e))?;

        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(anyhow!(
                "{} shader compile failed: {}",
                shader_type_name(shader_type),
                log
            ));
        }

        Ok(shader)
    }
}

fn shader_type_name(shader_type: u32) -> &'static str {
    match shader_type {
        glow::VERTEX_SHADER => "vertex",
        glow::FRAGMENT_SHADER => "fragment",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_declare_looked_up_names() {
        assert!(TRIANGLE_VERTEX_SHADER.contains(&format!("attribute vec4 {};", ATTR_POSITION)));
        assert!(TRIANGLE_VERTEX_SHADER.contains(&format!("attribute vec4 {};", ATTR_COLOR)));
        assert!(TRIANGLE_VERTEX_SHADER.contains(&format!("uniform mat4 {};", UNIFORM_MATRIX)));
    }

    #[test]
    fn test_sources_are_glsl_es_100() {
        for src in [TRIANGLE_VERTEX_SHADER, TRIANGLE_FRAGMENT_SHADER] {
            assert!(src.starts_with("#version 100\n"));
        }
        assert!(TRIANGLE_FRAGMENT_SHADER.contains("precision mediump float;"));
    }

    #[test]
    fn test_shader_type_name() {
        assert_eq!(shader_type_name(glow::VERTEX_SHADER), "vertex");
        assert_eq!(shader_type_name(glow::FRAGMENT_SHADER), "fragment");
    }
}
