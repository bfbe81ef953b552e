use std::f64::consts::PI;

use crate::aero::conditions::FlightConditions;
use crate::math::pow2;

// ---------------------------------------------------------------------------
// Open tube: flow through the bore plus the annulus face
// ---------------------------------------------------------------------------

/// Pressure drag of an open tube aligned with the flow (tube fins, launch
/// lugs). The bore loses pressure to wall friction; the loss never exceeds
/// that of a blocked tube.
#[derive(Debug, Clone, Copy)]
pub struct OpenTube {
    pub length: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
    pub roughness: f64, // m
}

impl OpenTube {
    pub fn inner_area(&self) -> f64 {
        PI * pow2(self.inner_radius)
    }

    pub fn annulus_area(&self) -> f64 {
        PI * (pow2(self.outer_radius) - pow2(self.inner_radius))
    }

    /// Darcy friction factor from the Swamee-Jain fit to Colebrook.
    fn friction_factor(&self, re: f64) -> f64 {
        let d = 2.0 * self.inner_radius;
        let f = 0.25 / pow2((self.roughness / (3.7 * d) + 5.74 / re.powf(0.9)).log10());
        if f.is_finite() {
            f
        } else {
            0.0
        }
    }

    /// Pressure CD times area, m^2.
    pub fn pressure_cd(&self, conditions: &FlightConditions, stagnation: f64, base: f64) -> f64 {
        let blocked = stagnation + base;
        let d = 2.0 * self.inner_radius;
        let bore = if d <= 0.0 || self.length <= 0.0 {
            0.0
        } else {
            let re = conditions.reynolds(d);
            if re < 1.0 {
                blocked
            } else {
                (self.friction_factor(re) * self.length / d).min(blocked)
            }
        };
        bore * self.inner_area() + blocked * self.annulus_area()
    }
}
