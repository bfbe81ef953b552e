use std::sync::OnceLock;

use crate::math::{pow2, PolyInterpolator};

// ---------------------------------------------------------------------------
// Mach-dependent drag coefficients (blunt faces, bases, skin friction)
// ---------------------------------------------------------------------------

/// Pressure coefficient of a blunt face normal to the flow.
pub fn stagnation_cd(mach: f64) -> f64 {
    let pressure = if mach <= 1.0 {
        1.0 + pow2(mach) / 4.0 + pow2(pow2(mach)) / 40.0
    } else {
        1.84 - 0.76 / pow2(mach) + 0.166 / pow2(pow2(mach)) + 0.035 / pow2(mach * mach * mach)
    };
    0.85 * pressure
}

/// Base drag coefficient of an aft-facing flat base.
pub fn base_cd(mach: f64) -> f64 {
    if mach <= 1.0 {
        0.12 + 0.13 * mach * mach
    } else {
        0.25 / mach
    }
}

/// Skin friction coefficient for a Reynolds number based on the rocket length,
/// with compressibility corrections. A perfect finish allows laminar flow up
/// to the transition Reynolds number; otherwise the boundary layer is
/// assumed turbulent from the nose.
pub fn friction_coefficient(mach: f64, re: f64, perfect_finish: bool) -> f64 {
    let mut c1 = 1.0;
    let mut c2 = 1.0;
    let cf = if perfect_finish {
        let cf = if re < 1.0e4 {
            1.33e-2
        } else if re < 5.39e5 {
            1.328 / re.sqrt()
        } else {
            1.0 / pow2(1.50 * re.ln() - 5.6) - 1700.0 / re
        };
        if mach < 1.1 && re > 1.0e6 {
            c1 = if re < 3.0e6 {
                1.0 - 0.1 * pow2(mach) * (re - 1.0e6) / 2.0e6
            } else {
                1.0 - 0.1 * pow2(mach)
            };
        }
        if mach > 0.9 && re > 1.0e6 {
            let full = 1.0 / (1.0 + 0.045 * pow2(mach)).powf(0.25);
            c2 = if re < 3.0e6 { 1.0 + (full - 1.0) * (re - 1.0e6) / 2.0e6 } else { full };
        }
        cf
    } else {
        let cf = if re < 1.0e4 { 1.48e-2 } else { 1.0 / pow2(1.50 * re.ln() - 5.6) };
        if mach < 1.1 {
            c1 = 1.0 - 0.1 * pow2(mach);
        }
        if mach > 0.9 {
            c2 = 1.0 / (1.0 + 0.15 * pow2(mach)).powf(0.58);
        }
        cf
    };

    if mach < 0.9 {
        cf * c1
    } else if mach < 1.1 {
        cf * (c2 * (mach - 0.9) / 0.2 + c1 * (1.1 - mach) / 0.2)
    } else {
        cf * c2
    }
}

/// Compressibility correction of the roughness-limited friction coefficient.
pub fn roughness_correction(mach: f64) -> f64 {
    if mach < 0.9 {
        1.0 - 0.1 * pow2(mach)
    } else if mach > 1.1 {
        1.0 / (1.0 + 0.18 * pow2(mach))
    } else {
        let c1 = 1.0 - 0.1 * pow2(0.9);
        let c2 = 1.0 / (1.0 + 0.18 * pow2(1.1));
        c2 * (mach - 0.9) / 0.2 + c1 * (1.1 - mach) / 0.2
    }
}

/// Friction coefficient of a surface of the given roughness height (m), once
/// the roughness dominates over the smooth-wall value.
pub fn roughness_limited_cf(roughness: f64, aero_length: f64, correction: f64) -> f64 {
    if aero_length <= 0.0 {
        return 0.0;
    }
    0.032 * (roughness / aero_length).powf(0.2) * correction
}

/// Friction coefficient applied to one component.
pub fn component_cf(cf: f64, roughness_limited: f64, re: f64, perfect_finish: bool) -> f64 {
    if perfect_finish {
        if re > 1.0e6 && roughness_limited > cf { roughness_limited } else { cf }
    } else {
        cf.max(roughness_limited)
    }
}

// ---------------------------------------------------------------------------
// Axial drag as a function of angle of attack
// ---------------------------------------------------------------------------

const AXIAL_BREAK: f64 = 17.0 * std::f64::consts::PI / 180.0;

fn axial_polys() -> &'static (Vec<f64>, Vec<f64>) {
    static POLYS: OnceLock<(Vec<f64>, Vec<f64>)> = OnceLock::new();
    POLYS.get_or_init(|| {
        let half_pi = std::f64::consts::FRAC_PI_2;
        let low = PolyInterpolator::new(&[&[0.0, AXIAL_BREAK], &[0.0, AXIAL_BREAK]])
            .interpolator(&[1.0, 1.3, 0.0, 0.0]);
        let high = PolyInterpolator::new(&[&[AXIAL_BREAK, half_pi], &[AXIAL_BREAK, half_pi], &[half_pi]])
            .interpolator(&[1.3, 0.0, 0.0, 0.0, 0.0]);
        (low, high)
    })
}

/// Axial drag coefficient from the zero-AOA total. Rises to 1.3x at 17 deg,
/// falls to zero broadside and reverses sign for backwards flight.
pub fn axial_cd(aoa: f64, cd: f64) -> f64 {
    let (low, high) = axial_polys();
    let original = aoa;
    let mut aoa = aoa.clamp(0.0, std::f64::consts::PI);
    if aoa > std::f64::consts::FRAC_PI_2 {
        aoa = std::f64::consts::PI - aoa;
    }
    let mul = if aoa < AXIAL_BREAK {
        PolyInterpolator::eval(aoa, low)
    } else {
        PolyInterpolator::eval(aoa, high)
    };
    if original < std::f64::consts::FRAC_PI_2 { mul * cd } else { -mul * cd }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn behaviour_across_mach_one() {
        let h = 1e-9;
        // the two stagnation fits meet with a small step: 0.85 * (1.281 - 1.275)
        assert_abs_diff_eq!(stagnation_cd(1.0 - h), 1.08375, epsilon = 1e-6);
        assert_abs_diff_eq!(stagnation_cd(1.0 + h), 1.08885, epsilon = 1e-6);
        assert_abs_diff_eq!(stagnation_cd(1.0 + h) - stagnation_cd(1.0 - h), 0.0051, epsilon = 1e-6);
        assert_abs_diff_eq!(base_cd(1.0 - h), base_cd(1.0 + h), epsilon = 1e-6);
        assert_abs_diff_eq!(stagnation_cd(0.0), 0.85, epsilon = 1e-12);
        assert_abs_diff_eq!(base_cd(0.0), 0.12, epsilon = 1e-12);
    }

    #[test]
    fn turbulent_friction_decreases_with_reynolds() {
        let a = friction_coefficient(0.3, 1.0e6, false);
        let b = friction_coefficient(0.3, 1.0e7, false);
        assert!(a > b && b > 0.0);
        assert_abs_diff_eq!(friction_coefficient(0.0, 5.0e3, false), 1.48e-2, epsilon = 1e-12);
    }

    #[test]
    fn laminar_friction_below_transition() {
        let re = 1.0e5;
        assert_abs_diff_eq!(friction_coefficient(0.0, re, true), 1.328 / re.sqrt(), epsilon = 1e-12);
        assert!(friction_coefficient(0.0, re, true) < friction_coefficient(0.0, re, false));
    }

    #[test]
    fn rough_surface_dominates() {
        let corr = roughness_correction(0.3);
        let limited = roughness_limited_cf(500e-6, 1.0, corr);
        let cf = friction_coefficient(0.3, 1.0e7, false);
        assert_abs_diff_eq!(component_cf(cf, limited, 1.0e7, false), limited.max(cf), epsilon = 1e-15);
        assert_eq!(component_cf(cf, 0.0, 1.0e5, true), cf);
    }

    #[test]
    fn axial_drag_shape() {
        assert_abs_diff_eq!(axial_cd(0.0, 0.5), 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(axial_cd(AXIAL_BREAK, 0.5), 0.65, epsilon = 1e-9);
        assert_abs_diff_eq!(axial_cd(std::f64::consts::FRAC_PI_2 - 1e-9, 0.5), 0.0, epsilon = 1e-6);
        assert!(axial_cd(std::f64::consts::PI, 0.5) < 0.0);
    }
}
