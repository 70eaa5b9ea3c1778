//! Global constants for gles-triangle
//!
//! Triangle geometry, render defaults and device discovery limits
//! in one place instead of magic numbers in the render loop.

// ============================================================================
// Geometry
// ============================================================================

/// Triangle vertex positions (x, y, z, w), one row per vertex
pub const TRIANGLE_POSITIONS: [[f32; 4]; 3] = [
    [-1.0, -1.0, 0.0, 1.0],
    [1.0, -1.0, 0.0, 1.0],
    [0.0, 1.0, 0.0, 1.0],
];

/// Per-vertex colors (r, g, b, a): red, green, blue
pub const TRIANGLE_COLORS: [[f32; 4]; 3] = [
    [1.0, 0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0, 1.0],
    [0.0, 0.0, 1.0, 1.0],
];

/// Number of vertices drawn per frame
pub const TRIANGLE_VERTEX_COUNT: i32 = 3;

/// Components per vertex attribute (vec4)
pub const ATTRIB_COMPONENTS: i32 = 4;

// ============================================================================
// Render Defaults
// ============================================================================

/// Uniform scale applied after the rotation
pub const DEFAULT_SCALE: f32 = 0.5;

/// Rotation advance per frame (degrees)
pub const DEFAULT_ROTATION_STEP: f32 = 1.0;

/// Idle delay between frames when vsync is off (milliseconds)
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 10;

/// Upper bound for frame_interval_ms (one second)
pub const MAX_FRAME_INTERVAL_MS: u64 = 1000;

/// Frames between FPS log lines
pub const FPS_LOG_INTERVAL_FRAMES: u64 = 300;

// ============================================================================
// Device Discovery
// ============================================================================

/// Highest /dev/dri/cardN index probed during auto-detection
pub const MAX_DRM_CARDS: u32 = 8;

/// How long to wait for libseat to enable the session (milliseconds)
#[cfg_attr(not(feature = "seatd"), allow(dead_code))]
pub const SEAT_ENABLE_TIMEOUT_MS: u64 = 2000;

/// Poll timeout while waiting for a page flip event (milliseconds)
pub const PAGE_FLIP_TIMEOUT_MS: i32 = 1000;
