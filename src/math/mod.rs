pub mod interp;
pub mod poly;

pub use interp::LinearInterpolator;
pub use poly::PolyInterpolator;

/// Tolerance used for "effectively zero" geometry and float comparisons.
pub const EPSILON: f64 = 0.00000001;

pub fn pow2(x: f64) -> f64 {
    x * x
}

pub fn pow3(x: f64) -> f64 {
    x * x * x
}

/// Clamp that tolerates NaN bounds by returning the value unchanged.
pub fn clamp(x: f64, min: f64, max: f64) -> f64 {
    if x < min {
        min
    } else if x > max {
        max
    } else {
        x
    }
}

/// Linear map of `t` from [a, b] onto [va, vb].
pub fn map(t: f64, a: f64, b: f64, va: f64, vb: f64) -> f64 {
    if (b - a).abs() < EPSILON {
        return va;
    }
    va + (t - a) / (b - a) * (vb - va)
}

/// Sign with `sign(0) == 1`.
pub fn sign(x: f64) -> f64 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

pub fn equals(a: f64, b: f64) -> bool {
    let abs = a.abs().max(b.abs());
    if abs < EPSILON {
        return true;
    }
    (a - b).abs() < EPSILON * abs.max(1.0)
}

/// Zero out NaN results so a single bad component cannot poison a sum.
pub fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}
