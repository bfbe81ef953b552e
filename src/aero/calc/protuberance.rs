use std::sync::OnceLock;

use super::tube::OpenTube;
use crate::aero::conditions::FlightConditions;
use crate::math::LinearInterpolator;
use crate::vehicle::{Component, LaunchLug, RailButton};

// ---------------------------------------------------------------------------
// Small protrusions on the airframe: drag only
// ---------------------------------------------------------------------------

/// Frontal CD of a short blunt protrusion against the local Mach number.
fn frontal_cd() -> &'static LinearInterpolator {
    static TABLE: OnceLock<LinearInterpolator> = OnceLock::new();
    TABLE.get_or_init(|| {
        LinearInterpolator::from_points(
            &[0.0, 0.2, 0.4, 0.6, 0.8, 0.9, 1.0, 1.2, 1.5, 2.0, 3.0],
            &[0.80, 0.80, 0.82, 0.88, 1.00, 1.10, 1.30, 1.45, 1.40, 1.30, 1.20],
        )
    })
}

/// Short protrusions see more than their frontal drag: flow around the
/// sides adds up to 30% until the length reaches 0.3 diameters.
pub fn length_multiplier(length: f64, radius: f64) -> f64 {
    if radius <= 0.0 {
        return 1.0;
    }
    (1.3 - length / (2.0 * radius)).max(1.0)
}

/// Mean Mach number over the first `height` metres of a turbulent boundary
/// layer (1/7 power profile) that has grown over `x` metres of airframe.
pub fn local_mach(conditions: &FlightConditions, x: f64, height: f64) -> f64 {
    let mach = conditions.mach();
    let re = conditions.reynolds(x);
    if x <= 0.0 || height <= 0.0 || !(re > 1.0) {
        return mach;
    }
    let delta = 0.37 * x / re.powf(0.2);
    let fraction = if height < delta {
        7.0 / 8.0 * (height / delta).powf(1.0 / 7.0)
    } else {
        (7.0 / 8.0 * delta + (height - delta)) / height
    };
    mach * fraction
}

// ---------------------------------------------------------------------------
// Launch lug
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LaunchLugCalc {
    position: f64,
    tube: OpenTube,
    multiplier: f64,
}

impl LaunchLugCalc {
    pub fn new(component: &Component, lug: &LaunchLug) -> Self {
        Self {
            position: component.position(),
            tube: OpenTube {
                length: lug.length,
                inner_radius: lug.inner_radius(),
                outer_radius: lug.outer_radius,
                roughness: component.finish.roughness(),
            },
            multiplier: length_multiplier(lug.length, lug.outer_radius),
        }
    }

    pub fn pressure_cd(&self, conditions: &FlightConditions) -> f64 {
        let mach = local_mach(conditions, self.position, 2.0 * self.tube.outer_radius);
        self.multiplier * self.tube.pressure_cd(conditions, frontal_cd().value(mach), 0.0)
    }
}

// ---------------------------------------------------------------------------
// Rail buttons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RailButtonCalc {
    position: f64,
    height: f64,
    frontal_area: f64, // all buttons
    multiplier: f64,
}

impl RailButtonCalc {
    pub fn new(component: &Component, button: &RailButton) -> Self {
        let neck = (button.total_height - button.base_height - button.flange_height).max(0.0);
        let one = button.outer_diameter * (button.base_height + button.flange_height) + button.inner_diameter * neck;
        Self {
            position: component.position(),
            height: button.total_height,
            frontal_area: one * button.count as f64,
            multiplier: length_multiplier(button.outer_diameter, button.total_height),
        }
    }

    pub fn frontal_area(&self) -> f64 {
        self.frontal_area
    }

    pub fn pressure_cd(&self, conditions: &FlightConditions) -> f64 {
        let mach = local_mach(conditions, self.position, self.height);
        self.multiplier * frontal_cd().value(mach) * self.frontal_area
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::{ComponentKind, RocketBuilder};
    use approx::assert_abs_diff_eq;

    #[test]
    fn boundary_layer_slows_the_flow() {
        let mut c = FlightConditions::new(0.05);
        c.set_mach(0.5);
        let near_nose = local_mach(&c, 0.01, 0.005);
        let far_aft = local_mach(&c, 1.5, 0.005);
        assert!(far_aft < near_nose);
        assert!(near_nose <= 0.5);
        assert_abs_diff_eq!(local_mach(&c, 0.0, 0.005), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn stubby_protrusions_get_the_full_multiplier() {
        assert_abs_diff_eq!(length_multiplier(0.0, 0.01), 1.3, epsilon = 1e-12);
        assert_abs_diff_eq!(length_multiplier(0.1, 0.01), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn lug_and_buttons_add_drag() {
        let mut b = RocketBuilder::new("r");
        let stage = b.stage("s");
        let body = b.add(stage, Component::body_tube("body", 0.5, 0.02));
        let lug = b.add(body, Component::launch_lug("lug", 0.05, 0.003));
        let buttons = b.add(body, Component::rail_buttons("buttons", 2, 0.2));
        let r = b.build().unwrap();

        let mut c = FlightConditions::new(0.04);
        c.set_mach(0.3);
        let lug_cd = match &r.component(lug).kind {
            ComponentKind::LaunchLug(l) => LaunchLugCalc::new(r.component(lug), l).pressure_cd(&c),
            _ => unreachable!(),
        };
        let button_cd = match &r.component(buttons).kind {
            ComponentKind::RailButton(rb) => {
                let calc = RailButtonCalc::new(r.component(buttons), rb);
                assert!(calc.frontal_area() > 0.0);
                calc.pressure_cd(&c)
            }
            _ => unreachable!(),
        };
        assert!(lug_cd > 0.0);
        assert!(button_cd > 0.0);
    }
}
