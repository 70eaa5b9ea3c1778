//! 4x4 transformation matrices
//!
//! Column-major storage (OpenGL convention): element (row, col)
//! lives at index `col * 4 + row`.

/// Column-major 4x4 matrix
pub type Mat4 = [f32; 16];

/// Identity matrix
pub fn identity() -> Mat4 {
    [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

/// Rotation about the Z axis
pub fn z_rotation(degrees: f32) -> Mat4 {
    let (s, c) = degrees.to_radians().sin_cos();
    let mut m = identity();
    m[0] = c;
    m[1] = s;
    m[4] = -s;
    m[5] = c;
    m
}

/// Axis-aligned scale
pub fn scale(x: f32, y: f32, z: f32) -> Mat4 {
    let mut m = identity();
    m[0] = x;
    m[5] = y;
    m[10] = z;
    m
}

/// Matrix product `a * b` (b is applied first)
pub fn multiply(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [0.0_f32; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
        }
    }
    out
}

/// Per-frame model matrix: rotate about Z, then scale uniformly
pub fn model_matrix(angle_degrees: f32, uniform_scale: f32) -> Mat4 {
    multiply(
        &z_rotation(angle_degrees),
        &scale(uniform_scale, uniform_scale, uniform_scale),
    )
}

/// Advance the rotation angle, keeping it in [0, 360)
pub fn advance_angle(angle: f32, step: f32) -> f32 {
    let next = (angle + step).rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if next >= 360.0 {
        0.0
    } else {
        next
    }
}

/// Transform a homogeneous point
#[cfg(test)]
fn transform_point(m: &Mat4, p: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0_f32; 4];
    for (row, value) in out.iter_mut().enumerate() {
        *value = (0..4).map(|k| m[k * 4 + row] * p[k]).sum();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat_eq(a: &Mat4, b: &Mat4) {
        for i in 0..16 {
            assert!(
                (a[i] - b[i]).abs() < 1e-6,
                "element {} differs: {} vs {}",
                i,
                a[i],
                b[i]
            );
        }
    }

    #[test]
    fn test_zero_angle_is_scale_only() {
        let m = model_matrix(0.0, 0.5);
        let expected = [
            0.5, 0.0, 0.0, 0.0, //
            0.0, 0.5, 0.0, 0.0, //
            0.0, 0.0, 0.5, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        assert_mat_eq(&m, &expected);
    }

    #[test]
    fn test_z_rotation_quarter_turn() {
        let m = model_matrix(90.0, 0.5);
        let p = transform_point(&m, [1.0, 0.0, 0.0, 1.0]);
        assert!(p[0].abs() < 1e-6);
        assert!((p[1] - 0.5).abs() < 1e-6);
        assert!(p[2].abs() < 1e-6);
        assert!((p[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rotation_layout() {
        let m = z_rotation(30.0);
        let (s, c) = 30.0_f32.to_radians().sin_cos();
        assert!((m[0] - c).abs() < 1e-6);
        assert!((m[1] - s).abs() < 1e-6);
        assert!((m[4] + s).abs() < 1e-6);
        assert!((m[5] - c).abs() < 1e-6);
        assert_eq!(m[10], 1.0);
        assert_eq!(m[15], 1.0);
    }

    #[test]
    fn test_multiply_identity() {
        let r = z_rotation(42.0);
        assert_mat_eq(&multiply(&identity(), &r), &r);
        assert_mat_eq(&multiply(&r, &identity()), &r);
    }

    #[test]
    fn test_scale_keeps_w() {
        let m = scale(2.0, 3.0, 4.0);
        let p = transform_point(&m, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(p, [2.0, 3.0, 4.0, 1.0]);
    }

    #[test]
    fn test_advance_angle_wraps() {
        assert_eq!(advance_angle(0.0, 1.0), 1.0);
        assert!((advance_angle(359.5, 1.0) - 0.5).abs() < 1e-4);
        assert!((advance_angle(0.5, -1.0) - 359.5).abs() < 1e-4);
        let a = advance_angle(0.0, -1e-9);
        assert!((0.0..360.0).contains(&a));
    }
}
