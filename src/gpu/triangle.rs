//! Triangle geometry on the GPU
//!
//! Positions and colors live in two separate static array buffers,
//! uploaded once. ES 2 has no vertex array objects, so the attribute
//! pointers are re-specified on every draw.

use anyhow::{anyhow, Result};
use glow::HasContext;
use log::{debug, info};

use crate::constants::{
    ATTRIB_COMPONENTS, TRIANGLE_COLORS, TRIANGLE_POSITIONS, TRIANGLE_VERTEX_COUNT,
};
use crate::gpu::shader::TriangleShader;

/// Static triangle vertex buffers
pub struct TriangleMesh {
    position_vbo: glow::Buffer,
    color_vbo: glow::Buffer,
}

impl TriangleMesh {
    /// Upload positions and colors
    pub fn new(gl: &glow::Context) -> Result<Self> {
        let position_vbo = upload_static(gl, bytemuck_cast_slice(&TRIANGLE_POSITIONS))?;
        let color_vbo = match upload_static(gl, bytemuck_cast_slice(&TRIANGLE_COLORS)) {
            Ok(vbo) => vbo,
            Err(e) => {
                unsafe { gl.delete_buffer(position_vbo) };
                return Err(e);
            }
        };

        info!("Triangle buffers uploaded");
        Ok(Self {
            position_vbo,
            color_vbo,
        })
    }

    /// Bind both buffers to the shader's attributes and draw 3 vertices
    pub fn draw(&self, gl: &glow::Context, shader: &TriangleShader) {
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.position_vbo));
            gl.enable_vertex_attrib_array(shader.a_pos);
            gl.vertex_attrib_pointer_f32(shader.a_pos, ATTRIB_COMPONENTS, glow::FLOAT, false, 0, 0);

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.color_vbo));
            gl.enable_vertex_attrib_array(shader.a_color);
            gl.vertex_attrib_pointer_f32(
                shader.a_color,
                ATTRIB_COMPONENTS,
                glow::FLOAT,
                false,
                0,
                0,
            );

            gl.draw_arrays(glow::TRIANGLES, 0, TRIANGLE_VERTEX_COUNT);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_buffer(self.position_vbo);
            gl.delete_buffer(self.color_vbo);
        }
    }
}

/// Create an ARRAY_BUFFER holding `data` with STATIC_DRAW usage
fn upload_static(gl: &glow::Context, data: &[u8]) -> Result<glow::Buffer> {
    unsafe {
        let vbo = gl
            .create_buffer()
            .map_err(|e| anyhow!("Failed to create VBO: {}", e))?;
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, data, glow::STATIC_DRAW);
        gl.bind_buffer(glow::ARRAY_BUFFER, None);
        debug!("VBO uploaded: {} bytes", data.len());
        Ok(vbo)
    }
}

/// Reinterpret a slice of plain floats as bytes for upload
fn bytemuck_cast_slice<T>(slice: &[T]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            slice.as_ptr() as *const u8,
            std::mem::size_of_val(slice),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_literals() {
        assert_eq!(
            TRIANGLE_POSITIONS,
            [
                [-1.0, -1.0, 0.0, 1.0],
                [1.0, -1.0, 0.0, 1.0],
                [0.0, 1.0, 0.0, 1.0],
            ]
        );
        assert_eq!(
            TRIANGLE_COLORS,
            [
                [1.0, 0.0, 0.0, 1.0],
                [0.0, 1.0, 0.0, 1.0],
                [0.0, 0.0, 1.0, 1.0],
            ]
        );
        assert_eq!(TRIANGLE_VERTEX_COUNT as usize, TRIANGLE_POSITIONS.len());
        assert_eq!(ATTRIB_COMPONENTS as usize, TRIANGLE_POSITIONS[0].len());
    }

    #[test]
    fn test_upload_bytes() {
        let bytes = bytemuck_cast_slice(&TRIANGLE_COLORS);
        assert_eq!(bytes.len(), 48);
        // First float of the first color row is 1.0
        assert_eq!(&bytes[0..4], &1.0_f32.to_ne_bytes());
        // Last float (blue vertex alpha) is 1.0
        assert_eq!(&bytes[44..48], &1.0_f32.to_ne_bytes());
    }
}
