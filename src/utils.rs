use std::f64::consts::{PI, TAU};

/// Wrap an angle into [0, 2*pi).
pub fn normalize_angle(angle: f64) -> f64 {
    angle.rem_euclid(TAU)
}

/// Signed shortest rotation from `from` to `to`, in (-pi, pi].
/// Both inputs may be arbitrary radians; wraparound is handled.
pub fn angle_diff(from: f64, to: f64) -> f64 {
    let mut diff = normalize_angle(to) - normalize_angle(from);
    if diff > PI {
        diff -= TAU;
    } else if diff <= -PI {
        diff += TAU;
    }
    diff
}

/// Bearing (radians from +x) from one point to another.
pub fn bearing(from_x: f64, from_y: f64, to_x: f64, to_y: f64) -> f64 {
    normalize_angle((to_y - from_y).atan2(to_x - from_x))
}
