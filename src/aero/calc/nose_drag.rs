use std::sync::OnceLock;

use crate::aero::drag::stagnation_cd;
use crate::math::{pow2, LinearInterpolator, PolyInterpolator};
use crate::vehicle::Shape;

const GAMMA: f64 = 1.4;

// ---------------------------------------------------------------------------
// Measured nose pressure drag at fineness ratio 3
// ---------------------------------------------------------------------------
//
// Free-flight zero-lift drag of bodies of revolution (NASA TR R-100). Each
// table maps Mach number to pressure CD referenced to the base area.

struct NoseTables {
    ellipsoid: LinearInterpolator,
    x14: LinearInterpolator,
    x12: LinearInterpolator,
    x34: LinearInterpolator,
    von_karman: LinearInterpolator,
    lv_haack: LinearInterpolator,
    parabolic: LinearInterpolator,
    parabolic12: LinearInterpolator,
    parabolic34: LinearInterpolator,
    blunt: LinearInterpolator,
}

fn tables() -> &'static NoseTables {
    static TABLES: OnceLock<NoseTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let t = LinearInterpolator::from_points;
        let mut blunt = LinearInterpolator::new();
        for i in 0..60 {
            let m = i as f64 * 0.05;
            blunt.add_point(m, stagnation_cd(m));
        }
        NoseTables {
            ellipsoid: t(
                &[1.2, 1.25, 1.3, 1.4, 1.6, 2.0, 2.4],
                &[0.110, 0.128, 0.140, 0.148, 0.152, 0.159, 0.162],
            ),
            x14: t(
                &[1.2, 1.3, 1.4, 1.6, 1.8, 2.2, 2.6, 3.0, 3.6],
                &[0.140, 0.156, 0.169, 0.192, 0.206, 0.227, 0.241, 0.249, 0.252],
            ),
            x12: t(
                &[0.925, 0.95, 1.0, 1.05, 1.1, 1.2, 1.3, 1.7, 2.0],
                &[0.0, 0.014, 0.050, 0.060, 0.059, 0.081, 0.084, 0.085, 0.078],
            ),
            x34: t(
                &[0.8, 0.9, 1.0, 1.06, 1.2, 1.4, 1.6, 2.0, 2.8, 3.4],
                &[0.0, 0.015, 0.078, 0.121, 0.110, 0.098, 0.090, 0.084, 0.078, 0.074],
            ),
            von_karman: t(
                &[0.9, 0.95, 1.0, 1.05, 1.1, 1.2, 1.4, 1.6, 2.0, 3.0],
                &[0.0, 0.010, 0.027, 0.055, 0.070, 0.081, 0.095, 0.097, 0.091, 0.083],
            ),
            lv_haack: t(
                &[0.9, 0.95, 1.0, 1.05, 1.1, 1.2, 1.4, 1.6, 2.0],
                &[0.0, 0.010, 0.024, 0.066, 0.084, 0.100, 0.114, 0.117, 0.113],
            ),
            parabolic: t(
                &[0.95, 0.975, 1.0, 1.05, 1.1, 1.2, 1.4, 1.7],
                &[0.0, 0.016, 0.041, 0.092, 0.109, 0.119, 0.113, 0.108],
            ),
            parabolic12: t(
                &[0.8, 0.9, 0.95, 1.0, 1.05, 1.1, 1.3, 1.5, 1.8],
                &[0.0, 0.016, 0.042, 0.100, 0.126, 0.125, 0.100, 0.090, 0.088],
            ),
            parabolic34: t(
                &[0.9, 0.95, 1.0, 1.05, 1.1, 1.2, 1.4, 1.7],
                &[0.0, 0.023, 0.073, 0.098, 0.107, 0.106, 0.089, 0.082],
            ),
            blunt,
        }
    })
}

// ---------------------------------------------------------------------------
// Interpolator construction
// ---------------------------------------------------------------------------

/// Pressure CD against Mach of a forward-facing transition, referenced to
/// its frontal area.
///
/// Cones and ogives are computed directly. Other families blend the two
/// bounding fineness-3 tables by shape parameter and extrapolate to the
/// actual fineness ratio. Below the first supersonic point the curve is
/// filled in as `a*M^b + CD(M=0)`.
/// Fineness ratios the power-law correction from the fineness-3 tables is trusted over.
const TABULATED_FINENESS: std::ops::RangeInclusive<f64> = 1.5..=6.0;

/// Whether the pressure drag of `shape` at `fineness` is extrapolated from
/// the tables. Cones and ogives are computed, never extrapolated.
pub fn is_extrapolated(shape: Shape, fineness: f64) -> bool {
    !matches!(shape, Shape::Conical | Shape::Ogive) && !TABULATED_FINENESS.contains(&fineness)
}

pub fn pressure_interpolator(shape: Shape, param: f64, fineness: f64, sinphi: f64) -> LinearInterpolator {
    let t = tables();
    let cone_equivalent = || ogive_interpolator(0.0, 1.0 / (1.0 + 4.0 * pow2(fineness)).sqrt());

    let (low, high, p): (LinearInterpolator, Option<LinearInterpolator>, f64) = match shape {
        Shape::Conical => return subsonic_fill(ogive_interpolator(0.0, sinphi), sinphi),
        Shape::Ogive => return subsonic_fill(ogive_interpolator(param, sinphi), sinphi),
        Shape::Ellipsoid => (t.ellipsoid.clone(), None, 0.0),
        Shape::Power => {
            if param <= 0.25 {
                (t.blunt.clone(), Some(t.x14.clone()), param * 4.0)
            } else if param <= 0.5 {
                (t.x14.clone(), Some(t.x12.clone()), (param - 0.25) * 4.0)
            } else if param <= 0.75 {
                (t.x12.clone(), Some(t.x34.clone()), (param - 0.5) * 4.0)
            } else {
                (t.x34.clone(), Some(cone_equivalent()), (param - 0.75) * 4.0)
            }
        }
        Shape::Parabolic => {
            if param <= 0.5 {
                (cone_equivalent(), Some(t.parabolic12.clone()), param * 2.0)
            } else if param <= 0.75 {
                (t.parabolic12.clone(), Some(t.parabolic34.clone()), (param - 0.5) * 4.0)
            } else {
                (t.parabolic34.clone(), Some(t.parabolic.clone()), (param - 0.75) * 4.0)
            }
        }
        Shape::Haack => (t.von_karman.clone(), Some(t.lv_haack.clone()), param * 3.0),
    };

    let base = match high {
        Some(high) => blend(&low, &high, p.clamp(0.0, 1.0)),
        None => low,
    };

    // fineness-ratio extrapolation relative to the blunt-face limit
    let log4 = (fineness + 1.0).ln() / 4.0f64.ln();
    let mut out = LinearInterpolator::new();
    for m in base.x_points() {
        let stag = t.blunt.value(m);
        out.add_point(m, stag * (base.value(m) / stag).powf(log4));
    }
    subsonic_fill(out, sinphi)
}

fn blend(low: &LinearInterpolator, high: &LinearInterpolator, p: f64) -> LinearInterpolator {
    let mut out = LinearInterpolator::new();
    for m in low.x_points().into_iter().chain(high.x_points()) {
        out.add_point(m, p * high.value(m) + (1.0 - p) * low.value(m));
    }
    out
}

/// Cone/ogive wave drag from M = 1 upward. `param` is the ogive shape
/// parameter (0 = cone), `sinphi` the sine of the half-angle at the base.
fn ogive_interpolator(param: f64, sinphi: f64) -> LinearInterpolator {
    static POLY: OnceLock<PolyInterpolator> = OnceLock::new();
    let poly = POLY.get_or_init(|| PolyInterpolator::new(&[&[1.0, 1.3], &[1.0, 1.3]]));

    let cd_m1 = 2.1 * pow2(sinphi) + 0.6019 * sinphi;
    let coeffs = poly.interpolator(&[
        sinphi,
        cd_m1,
        4.0 / (GAMMA + 1.0) * (1.0 - 0.5 * cd_m1),
        -1.1341 * sinphi,
    ]);
    let mul = 0.72 * pow2(param - 0.5) + 0.82;

    let mut out = LinearInterpolator::new();
    for i in 0..=15 {
        let m = 1.0 + 0.02 * i as f64;
        out.add_point(m, mul * PolyInterpolator::eval(m, &coeffs));
    }
    for i in 0..134 {
        let m = 1.32 + 0.02 * i as f64;
        out.add_point(m, mul * (2.1 * pow2(sinphi) + 0.5 * sinphi / (m * m - 1.0).sqrt()));
    }
    out
}

/// Extend a curve that starts above zero drag down to M = 0.
fn subsonic_fill(mut interp: LinearInterpolator, sinphi: f64) -> LinearInterpolator {
    let Some(min) = interp.min_x() else {
        return interp;
    };
    let min_value = interp.value(min);
    if min_value < 0.001 {
        return interp;
    }
    let cd0 = 0.8 * pow2(sinphi);
    let min_deriv = (interp.value(min + 0.01) - min_value) / 0.01;
    if cd0 >= min_value - 0.01 || min_deriv <= 0.01 {
        return interp;
    }
    let a = min_value - cd0;
    let b = min_deriv / a;
    let mut i = 0;
    loop {
        let m = i as f64 * 0.05;
        if m >= min {
            break;
        }
        interp.add_point(m, a * m.powf(b) + cd0);
        i += 1;
    }
    interp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsonic_drag_is_small_for_slender_cone() {
        // fineness 3 cone: sinphi ~ 1/6.08
        let sinphi = 1.0 / (1.0f64 + 36.0).sqrt();
        let i = pressure_interpolator(Shape::Conical, 0.0, 3.0, sinphi);
        assert!(i.value(0.3) < i.value(1.2));
        assert!(i.value(0.0) >= 0.0);
    }

    #[test]
    fn haack_rises_through_transonic() {
        let i = pressure_interpolator(Shape::Haack, 0.0, 3.0, 0.0);
        assert!(i.value(0.5) < 0.01);
        assert!(i.value(1.2) > i.value(0.95));
    }

    #[test]
    fn blunter_power_series_has_more_drag() {
        let blunt = pressure_interpolator(Shape::Power, 0.1, 3.0, 0.5);
        let sharp = pressure_interpolator(Shape::Power, 0.9, 3.0, 0.5);
        assert!(blunt.value(1.5) > sharp.value(1.5));
    }

    #[test]
    fn higher_fineness_reduces_drag() {
        let short = pressure_interpolator(Shape::Ellipsoid, 0.0, 1.0, 0.9);
        let long = pressure_interpolator(Shape::Ellipsoid, 0.0, 5.0, 0.9);
        assert!(long.value(1.6) < short.value(1.6));
    }
}
