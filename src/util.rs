use std::f64::consts::PI;

/// Returns the cross product of two vectors
#[inline]
pub fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Returns the L2-norm of a vector
#[inline]
pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|&f| f * f).sum::<f64>().sqrt()
}

/// Converts a quaternion `[w, x, y, z]` into Cardan XYZ angles (roll, pitch, yaw).
///
/// The quaternion is normalized first, so non-unit input is accepted.
#[inline]
pub fn quat_as_euler_angles(q: &[f64; 4]) -> [f64; 3] {
    let n = norm(q);
    let (w, x, y, z) = (q[0] / n, q[1] / n, q[2] / n, q[3] / n);

    let roll = (2. * (w * x + y * z)).atan2(1. - 2. * (x * x + y * y));
    let a = (1. + 2. * (w * y - x * z)).max(0.).sqrt();
    let b = (1. - 2. * (w * y - x * z)).max(0.).sqrt();
    let pitch = -PI / 2. + 2. * a.atan2(b);
    let yaw = (2. * (w * z + x * y)).atan2(1. - 2. * (y * y + z * z));
    [roll, pitch, yaw]
}

/// Returns the quaternion for a rotation of `angle` radians about `axis`.
///
/// A zero axis yields the identity rotation.
pub fn quat_from_axis_angle(angle: f64, axis: &[f64; 3]) -> [f64; 4] {
    let m = norm(axis);
    if m == 0. {
        return [1., 0., 0., 0.];
    }
    let (s, c) = (angle / 2.).sin_cos();
    [c, s * axis[0] / m, s * axis[1] / m, s * axis[2] / m]
}
