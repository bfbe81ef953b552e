use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::math::pow2;

// ---------------------------------------------------------------------------
// Nose cone / transition shape families
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Conical,
    /// Parameter 0..1: 0 = cone, 1 = tangent ogive.
    Ogive,
    Ellipsoid,
    /// Parameter 0..1: exponent of x.
    Power,
    /// Parameter 0..1: 0 = cone, 1 = full parabola.
    Parabolic,
    /// Parameter 0..1/3: 0 = von Kármán, 1/3 = LV-Haack.
    Haack,
}

impl Shape {
    pub fn default_parameter(&self) -> f64 {
        match self {
            Shape::Ogive | Shape::Parabolic => 1.0,
            Shape::Power => 0.5,
            _ => 0.0,
        }
    }

    pub fn parameter_range(&self) -> (f64, f64) {
        match self {
            Shape::Ogive | Shape::Power | Shape::Parabolic => (0.0, 1.0),
            Shape::Haack => (0.0, 1.0 / 3.0),
            Shape::Conical | Shape::Ellipsoid => (0.0, 0.0),
        }
    }

    /// Radius at `x` of a nose growing from 0 at x=0 to `radius` at x=`length`.
    pub fn radius(&self, x: f64, radius: f64, length: f64, param: f64) -> f64 {
        if x <= 0.0 || length <= 0.0 {
            return 0.0;
        }
        if x >= length {
            return radius;
        }
        match self {
            Shape::Conical => radius * x / length,
            Shape::Ogive => {
                if param < 0.001 {
                    return Shape::Conical.radius(x, radius, length, param);
                }
                // circle radius of the ogive arc; l is the tangent length for this parameter
                let r = ((pow2(length) + pow2(radius))
                    * (pow2(2.0 - param) * pow2(length) + pow2(param * radius))
                    / (4.0 * pow2(param * radius)))
                    .sqrt();
                let l = length / param;
                let y0 = (pow2(r) - pow2(l)).max(0.0).sqrt();
                (pow2(r) - pow2(l - x)).max(0.0).sqrt() - y0
            }
            Shape::Ellipsoid => {
                let x = x * radius / length;
                (2.0 * radius * x - x * x).max(0.0).sqrt()
            }
            Shape::Power => {
                if param <= 0.00001 {
                    radius
                } else {
                    radius * (x / length).powf(param)
                }
            }
            Shape::Parabolic => {
                let t = x / length;
                radius * (2.0 * t - param * t * t) / (2.0 - param)
            }
            Shape::Haack => {
                let theta = (1.0 - 2.0 * x / length).clamp(-1.0, 1.0).acos();
                let v = (theta - (2.0 * theta).sin() / 2.0 + param * theta.sin().powi(3)) / PI;
                radius * v.max(0.0).sqrt()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Integrated body-of-revolution properties
// ---------------------------------------------------------------------------

const DIVISIONS: usize = 128;

/// Volume/area integrals of a body of revolution, taken over conical frusta.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RevolutionIntegrals {
    pub full_volume: f64,      // m^3, solid
    pub shell_volume: f64,     // m^3, wall of the given thickness
    pub shell_cg: f64,         // m from fore end
    pub planform_area: f64,    // m^2, side projection
    pub planform_center: f64,  // m from fore end
    pub wetted_area: f64,      // m^2
    /// Per-unit-mass shell inertia terms: (sum r^2 dm, sum x^2 dm) / m.
    pub shell_radial_moment: f64,
    pub shell_axial_moment: f64,
}

impl RevolutionIntegrals {
    pub fn compute(length: f64, thickness: f64, radius: impl Fn(f64) -> f64) -> Self {
        let mut out = RevolutionIntegrals::default();
        if length <= 0.0 {
            return out;
        }
        let dx = length / DIVISIONS as f64;
        let mut planform_moment = 0.0;
        let mut shell_moment = 0.0;
        let mut r1 = radius(0.0);
        for i in 0..DIVISIONS {
            let x1 = i as f64 * dx;
            let x2 = x1 + dx;
            let r2 = radius(x2);
            let mid = (x1 + x2) / 2.0;

            let outer = frustum_volume(r1, r2, dx);
            let inner = frustum_volume((r1 - thickness).max(0.0), (r2 - thickness).max(0.0), dx);
            out.full_volume += outer;
            let shell = outer - inner;
            out.shell_volume += shell;
            shell_moment += shell * mid;
            let ro2 = (pow2(r1) + pow2(r2)) / 2.0;
            let ri2 = (pow2((r1 - thickness).max(0.0)) + pow2((r2 - thickness).max(0.0))) / 2.0;
            out.shell_radial_moment += shell * (ro2 + ri2) / 2.0;
            out.shell_axial_moment += shell * mid * mid;

            let area = (r1 + r2) * dx; // 2 * mean radius * dx
            out.planform_area += area;
            if r1 + r2 > 0.0 {
                // trapezoid centroid
                planform_moment += area * (x1 + dx * (r1 + 2.0 * r2) / (3.0 * (r1 + r2)));
            }

            out.wetted_area += PI * (r1 + r2) * dx.hypot(r2 - r1);
            r1 = r2;
        }
        out.planform_center = if out.planform_area > 0.0 {
            planform_moment / out.planform_area
        } else {
            length / 2.0
        };
        if out.shell_volume > 0.0 {
            out.shell_cg = shell_moment / out.shell_volume;
            out.shell_radial_moment /= out.shell_volume;
            out.shell_axial_moment /= out.shell_volume;
        } else {
            out.shell_cg = length / 2.0;
        }
        out
    }
}

fn frustum_volume(r1: f64, r2: f64, h: f64) -> f64 {
    PI / 3.0 * h * (r1 * r1 + r1 * r2 + r2 * r2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SHAPES: [Shape; 6] = [
        Shape::Conical,
        Shape::Ogive,
        Shape::Ellipsoid,
        Shape::Power,
        Shape::Parabolic,
        Shape::Haack,
    ];

    #[test]
    fn shapes_meet_end_radii() {
        for shape in SHAPES {
            let p = shape.default_parameter();
            assert_abs_diff_eq!(shape.radius(0.0, 0.05, 0.3, p), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(shape.radius(0.3, 0.05, 0.3, p), 0.05, epsilon = 1e-12);
            assert_abs_diff_eq!(shape.radius(0.3 - 1e-9, 0.05, 0.3, p), 0.05, epsilon = 1e-6);
        }
    }

    #[test]
    fn shapes_are_monotone() {
        for shape in SHAPES {
            let p = shape.default_parameter();
            let mut prev = 0.0;
            for i in 1..=100 {
                let r = shape.radius(0.3 * i as f64 / 100.0, 0.05, 0.3, p);
                assert!(r >= prev - 1e-12, "{:?} not monotone", shape);
                prev = r;
            }
        }
    }

    #[test]
    fn cone_integrals_are_exact() {
        let (l, r) = (0.3, 0.05);
        let g = RevolutionIntegrals::compute(l, 0.0, |x| Shape::Conical.radius(x, r, l, 0.0));
        assert_abs_diff_eq!(g.full_volume, PI * r * r * l / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(g.planform_area, r * l, epsilon = 1e-12);
        assert_abs_diff_eq!(g.planform_center, 2.0 * l / 3.0, epsilon = 1e-9);
        let slant = l.hypot(r);
        assert_abs_diff_eq!(g.wetted_area, PI * r * slant, epsilon = 1e-9);
    }

    #[test]
    fn tube_shell_volume() {
        let g = RevolutionIntegrals::compute(1.0, 0.002, |_| 0.05);
        let expected = PI * (0.05f64.powi(2) - 0.048f64.powi(2));
        assert_abs_diff_eq!(g.shell_volume, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(g.shell_cg, 0.5, epsilon = 1e-9);
    }
}
