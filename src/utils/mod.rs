//! Utility functions shared across gles-triangle

pub mod color;

pub use color::parse_hex_color_to_f32;
