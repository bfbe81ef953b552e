use std::f64::consts::PI;
use std::sync::OnceLock;

use crate::aero::conditions::FlightConditions;
use crate::aero::forces::{AerodynamicForces, WeightedPoint};
use crate::math::{pow2, sign, LinearInterpolator, PolyInterpolator, EPSILON};
use crate::vehicle::{Component, ComponentKind, CrossSection, FinSet, Rocket};
use crate::warning::{Warning, WarningSet};

/// Fins stall above 20 degrees.
pub(crate) const STALL_ANGLE: f64 = 20.0 * PI / 180.0;

/// Spanwise chord strips.
const DIVISIONS: usize = 48;

const CNA_SUBSONIC: f64 = 0.9;
const CNA_SUPERSONIC: f64 = 1.5;
const GAMMA: f64 = 1.4;

// ---------------------------------------------------------------------------
// Supersonic lift-curve constants (Busemann second-order theory)
// ---------------------------------------------------------------------------

struct Supersonic {
    k1: LinearInterpolator,
    k2: LinearInterpolator,
    k3: LinearInterpolator,
    transonic: PolyInterpolator,
}

fn supersonic() -> &'static Supersonic {
    static TABLES: OnceLock<Supersonic> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut k1 = LinearInterpolator::new();
        let mut k2 = LinearInterpolator::new();
        let mut k3 = LinearInterpolator::new();
        // up to Mach 5
        let n = ((5.0 - CNA_SUPERSONIC) * 10.0) as usize;
        for i in 0..n {
            let m = CNA_SUPERSONIC + i as f64 * 0.1;
            let beta = (m * m - 1.0).max(0.0).sqrt();
            k1.add_point(m, 2.0 / beta);
            k2.add_point(m, ((GAMMA + 1.0) * m.powi(4) - 4.0 * pow2(beta)) / (4.0 * beta.powi(4)));
            k3.add_point(
                m,
                ((GAMMA + 1.0) * m.powi(8)
                    + (2.0 * pow2(GAMMA) - 7.0 * GAMMA - 5.0) * m.powi(6)
                    + 10.0 * (GAMMA + 1.0) * m.powi(4)
                    + 8.0)
                    / (6.0 * beta.powi(7)),
            );
        }
        let transonic = PolyInterpolator::new(&[
            &[CNA_SUBSONIC, CNA_SUPERSONIC],
            &[CNA_SUBSONIC, CNA_SUPERSONIC],
            &[CNA_SUBSONIC],
        ]);
        Supersonic { k1, k2, k3, transonic }
    })
}

/// CP position along the chord as a fraction: quarter chord up to M 0.5,
/// an empirical supersonic law from M 2 and a fifth-order blend between,
/// matched in value and slope at both ends.
pub(crate) fn cp_fraction(mach: f64, beta: f64, ar: f64, poly: &[f64; 6]) -> f64 {
    if mach <= 0.5 {
        return 0.25;
    }
    if mach >= 2.0 {
        return (ar * beta - 0.67) / (2.0 * ar * beta - 1.0);
    }
    let v = PolyInterpolator::eval(mach, poly);
    if v.is_finite() {
        v
    } else {
        0.25
    }
}

/// Coefficients of the transonic CP blend for an aspect ratio.
pub(crate) fn cp_poly(ar: f64) -> [f64; 6] {
    let denom = pow2(1.0 - 3.4641 * ar);
    [
        9.16049 * (ar - 0.588838) * (ar - 0.20624) / denom,
        -31.6049 * (ar - 0.705375) * (ar - 0.198476) / denom,
        55.3086 * (ar - 0.711482) * (ar - 0.196772) / denom,
        -39.5062 * (ar - 0.72074) * (ar - 0.194245) / denom,
        12.8395 * (ar - 0.725688) * (ar - 0.19292) / denom,
        -1.58025 * (ar - 0.728769) * (ar - 0.192105) / denom,
    ]
}

// ---------------------------------------------------------------------------
// Planar fin set
// ---------------------------------------------------------------------------

/// Barrowman fin-set calculator. Geometry is reduced once to mean
/// aerodynamic chord values and spanwise chord strips.
#[derive(Debug, Clone)]
pub struct FinSetCalc {
    count: usize,
    thickness: f64,
    body_radius: f64,
    cant_angle: f64,
    cross_section: CrossSection,

    span: f64,
    fin_area: f64,
    ar: f64,
    mac_length: f64,
    mac_lead: f64,
    mac_span: f64,
    cos_gamma: f64,      // midchord sweep
    cos_gamma_lead: f64, // leading edge sweep
    roll_sum: f64,
    chord_length: [f64; DIVISIONS],

    interference_count: usize,
    poly: [f64; 6],
    geometry_warnings: Vec<Warning>,
}

impl FinSetCalc {
    pub fn new(rocket: &Rocket, component: &Component, fins: &FinSet) -> Self {
        let span = fins.span();
        let fin_area = fins.planform_area();
        let mut geometry_warnings = Vec::new();
        let ar = if fin_area < EPSILON {
            geometry_warnings.push(Warning::ZeroAreaFin);
            0.0
        } else {
            2.0 * pow2(span) / fin_area
        };

        // jagged outline: the edge comes back up after going down
        let mut down = false;
        for w in fins.points.windows(2) {
            if w[1].1 > w[0].1 + 0.001 && down {
                geometry_warnings.push(Warning::JaggedEdgedFin);
                break;
            }
            if w[1].1 < w[0].1 - 0.001 {
                down = true;
            }
        }

        let body_radius = component.body_radius();
        if body_radius > 0.0 && fins.thickness > body_radius / 2.0 {
            geometry_warnings.push(Warning::ThickFin);
        }

        let mut calc = Self {
            count: fins.count,
            thickness: fins.thickness,
            body_radius,
            cant_angle: fins.cant_angle,
            cross_section: fins.cross_section,
            span,
            fin_area,
            ar,
            mac_length: 0.0,
            mac_lead: 0.0,
            mac_span: 0.0,
            cos_gamma: 0.0,
            cos_gamma_lead: 0.0,
            roll_sum: 0.0,
            chord_length: [0.0; DIVISIONS],
            interference_count: fins.count,
            poly: cp_poly(ar),
            geometry_warnings,
        };
        calc.strip_geometry(fins);
        calc.interference_count = interference_count(rocket, component, fins.count);
        calc
    }

    /// Mean aerodynamic chord and sweep from chord strips across the span.
    fn strip_geometry(&mut self, fins: &FinSet) {
        let span = self.span;
        let mut lead = [f64::INFINITY; DIVISIONS];
        let mut trail = [f64::NEG_INFINITY; DIVISIONS];
        let mut chord = [0.0; DIVISIONS];

        if span > EPSILON {
            let mut outline = fins.points.clone();
            if let Some(&first) = fins.points.first() {
                outline.push(first);
            }
            for seg in outline.windows(2) {
                let (x1, y1) = seg[0];
                let (x2, y2) = seg[1];
                if (y1 - y2).abs() < 0.001 {
                    continue;
                }
                let last = (DIVISIONS - 1) as f64;
                let mut i1 = ((y1 * 1.0001 / span * last) as isize).clamp(0, DIVISIONS as isize - 1) as usize;
                let mut i2 = ((y2 * 1.0001 / span * last) as isize).clamp(0, DIVISIONS as isize - 1) as usize;
                if i1 > i2 {
                    std::mem::swap(&mut i1, &mut i2);
                }
                for i in i1..=i2 {
                    let y = i as f64 * span / last;
                    let x = ((y - y2) / (y1 - y2) * x1 + (y1 - y) / (y1 - y2) * x2)
                        .clamp(x1.min(x2), x1.max(x2));
                    lead[i] = lead[i].min(x);
                    trail[i] = trail[i].max(x);
                    if y1 < y2 {
                        chord[i] -= x;
                    } else {
                        chord[i] += x;
                    }
                }
            }
        }

        for i in 0..DIVISIONS {
            if !lead[i].is_finite() || !trail[i].is_finite() {
                lead[i] = 0.0;
                trail[i] = 0.0;
            }
            if !(chord[i] >= 0.0) {
                chord[i] = 0.0;
            }
            chord[i] = chord[i].min(trail[i] - lead[i]);
        }

        let dy = span / (DIVISIONS - 1) as f64;
        let (mut mac_length, mut mac_span, mut mac_lead, mut area, mut roll_sum) = (0.0, 0.0, 0.0, 0.0, 0.0);
        let (mut cos_gamma, mut cos_gamma_lead) = (0.0, 0.0);
        for i in 0..DIVISIONS {
            let length = trail[i] - lead[i];
            let y = i as f64 * dy;
            mac_length += length * length;
            mac_span += y * length;
            mac_lead += lead[i] * length;
            area += length;
            roll_sum += chord[i] * pow2(self.body_radius + y);
            if i > 0 {
                let dx = (trail[i] + lead[i]) / 2.0 - (trail[i - 1] + lead[i - 1]) / 2.0;
                let h = dx.hypot(dy);
                if h != 0.0 {
                    cos_gamma += dy / h;
                }
                let dx = lead[i] - lead[i - 1];
                let h = dx.hypot(dy);
                if h != 0.0 {
                    cos_gamma_lead += dy / h;
                }
            }
        }
        area *= dy;
        if area > EPSILON {
            self.mac_length = mac_length * dy / area;
            self.mac_span = mac_span * dy / area;
            self.mac_lead = mac_lead * dy / area;
        }
        self.roll_sum = roll_sum * dy;
        self.cos_gamma = cos_gamma / (DIVISIONS - 1) as f64;
        self.cos_gamma_lead = cos_gamma_lead / (DIVISIONS - 1) as f64;
        self.chord_length = chord;
    }

    pub fn mac_length(&self) -> f64 {
        self.mac_length
    }

    /// Midpoint of the mean aerodynamic chord, from the root leading edge.
    pub fn midchord_position(&self) -> f64 {
        self.mac_lead + 0.5 * self.mac_length
    }

    pub fn planform_area(&self) -> f64 {
        self.fin_area
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Forces for the whole set; fin `i` sits at `rotation + 2 pi i / count`.
    pub fn nonaxial_forces(
        &self,
        conditions: &FlightConditions,
        rotation: f64,
        warnings: &mut WarningSet,
    ) -> AerodynamicForces {
        for w in &self.geometry_warnings {
            warnings.add(w.clone());
        }
        if self.fin_area < EPSILON || self.mac_span < EPSILON {
            return AerodynamicForces::zero();
        }

        let cna1 = self.cna1(conditions);
        let theta = conditions.theta();
        let mut cna: f64 = (0..self.count)
            .map(|i| {
                let angle = rotation + 2.0 * PI * i as f64 / self.count as f64;
                cna1 * pow2((theta - angle).sin())
            })
            .sum();

        // fin-fin interference
        cna *= match self.interference_count {
            0..=4 => 1.0,
            5 => 0.948,
            6 => 0.913,
            7 => 0.854,
            8 => 0.81,
            _ => {
                warnings.add(Warning::ParallelFins);
                0.75
            }
        };

        // body-fin interference
        let r = self.body_radius;
        let mut tau = r / (self.span + r);
        if !tau.is_finite() {
            tau = 0.0;
        }
        cna *= 1.0 + tau;

        let x = self.mac_lead + cp_fraction(conditions.mach(), conditions.beta(), self.ar, &self.poly) * self.mac_length;

        let n = self.count as f64;
        let mut croll_force = n * (self.mac_span + r) * cna1 * (1.0 + tau) * self.cant_angle;
        if conditions.aoa() > STALL_ANGLE {
            croll_force *= (1.0 - (conditions.aoa() - STALL_ANGLE) / (STALL_ANGLE / 2.0)).clamp(0.0, 1.0);
        }
        let croll_damp = n * self.damping_moment(conditions, conditions.mach());

        AerodynamicForces {
            cp: WeightedPoint::axial(x, cna),
            cna,
            cn: cna * conditions.aoa().min(STALL_ANGLE),
            croll: croll_force - croll_damp,
            croll_force,
            croll_damp,
            ..Default::default()
        }
    }

    /// Normal force slope of a single fin without interference, m^2.
    fn cna1(&self, conditions: &FlightConditions) -> f64 {
        if self.fin_area < EPSILON || self.span < EPSILON || self.cos_gamma < EPSILON {
            return 0.0;
        }
        let mach = conditions.mach();
        let aoa = conditions.aoa();
        let alpha = aoa.min(PI - aoa).min(STALL_ANGLE);
        let s2 = pow2(self.span);
        let ac = self.fin_area * self.cos_gamma;

        if mach <= CNA_SUBSONIC {
            return 2.0 * PI * s2 / (1.0 + (1.0 + (1.0 - pow2(mach)) * pow2(s2 / ac)).sqrt());
        }

        let k = supersonic();
        let supersonic_cna =
            |m: f64| self.fin_area * (k.k1.value(m) + k.k2.value(m) * alpha + k.k3.value(m) * pow2(alpha));
        if mach >= CNA_SUPERSONIC {
            return supersonic_cna(mach);
        }

        // transonic: blend matched in value and slope
        let sq = (1.0 + (1.0 - pow2(CNA_SUBSONIC)) * pow2(s2 / ac)).sqrt();
        let sub_v = 2.0 * PI * s2 / (1.0 + sq);
        let sub_d = 2.0 * mach * PI * self.span.powi(6) / (pow2(ac) * sq * pow2(1.0 + sq));
        let super_v = supersonic_cna(CNA_SUPERSONIC);
        let super_d = -self.fin_area * 2.0 * CNA_SUPERSONIC / (pow2(CNA_SUPERSONIC) - 1.0).powf(1.5);
        let coeffs = k.transonic.interpolator(&[sub_v, super_v, sub_d, super_d, 0.0]);
        PolyInterpolator::eval(mach, &coeffs)
    }

    /// Roll damping of one fin, m^3.
    fn damping_moment(&self, conditions: &FlightConditions, mach: f64) -> f64 {
        let rate = conditions.roll_rate();
        let v = conditions.velocity();
        if rate.abs() < 0.1 || v < EPSILON {
            return 0.0;
        }
        let beta = (1.0 - mach * mach).abs().sqrt().max(EPSILON);
        let rb = self.body_radius;

        // near apogee the fin tips are far past stall; sum strips separately
        let stall = 15.0 * PI / 180.0;
        if rate.abs() * (rb + self.span) / v > stall {
            let mut sum = 0.0;
            for i in 0..DIVISIONS {
                let dist = rb + self.span * i as f64 / DIVISIONS as f64;
                let aoa = (rate.abs() * dist / v).min(stall);
                sum += self.chord_length[i] * dist * aoa;
            }
            return sign(rate) * sum * (self.span / DIVISIONS as f64) * 2.0 * PI / beta;
        }

        if mach <= CNA_SUBSONIC {
            return 2.0 * PI * rate * self.roll_sum / (v * beta);
        }
        if mach >= CNA_SUPERSONIC {
            let k = supersonic();
            let (k1, k2, k3) = (k.k1.value(mach), k.k2.value(mach), k.k3.value(mach));
            let mut sum = 0.0;
            for i in 0..DIVISIONS {
                let y = i as f64 * self.span / (DIVISIONS - 1) as f64;
                let angle = rate * (rb + y) / v;
                sum += (k1 * angle + k2 * angle * angle + k3 * angle * angle * angle)
                    * self.chord_length[i]
                    * (rb + y);
            }
            return sum * self.span / (DIVISIONS - 1) as f64;
        }

        let sub = self.damping_moment(conditions, CNA_SUBSONIC - 0.01);
        let sup = self.damping_moment(conditions, CNA_SUPERSONIC + 0.01);
        let span = CNA_SUPERSONIC - CNA_SUBSONIC;
        sub * (CNA_SUPERSONIC - mach) / span + sup * (mach - CNA_SUBSONIC) / span
    }

    /// Skin friction of both fin faces, m^2.
    pub fn friction_cd(&self, cf: f64) -> f64 {
        if self.fin_area < EPSILON || self.mac_length < EPSILON {
            return 0.0;
        }
        self.count as f64 * cf * (1.0 + 2.0 * self.thickness / self.mac_length) * 2.0 * self.fin_area
    }

    /// Leading and trailing edge pressure drag, m^2.
    pub fn pressure_cd(&self, conditions: &FlightConditions, stagnation: f64, base: f64) -> f64 {
        if self.fin_area < EPSILON {
            return 0.0;
        }
        let mach = conditions.mach();
        let mut cd = match self.cross_section {
            CrossSection::Rounded | CrossSection::Airfoil => {
                if mach < 0.9 {
                    (1.0 - pow2(mach)).powf(-0.417) - 1.0
                } else if mach < 1.0 {
                    1.0 - 1.785 * (mach - 0.9)
                } else {
                    1.214 - 0.502 / pow2(mach) + 0.1095 / pow2(pow2(mach))
                }
            }
            CrossSection::Square => stagnation,
        };
        cd *= pow2(self.cos_gamma_lead);
        cd += match self.cross_section {
            CrossSection::Square => base,
            CrossSection::Rounded => base / 2.0,
            CrossSection::Airfoil => 0.0,
        };
        self.count as f64 * cd * self.span * self.thickness
    }
}

/// Number of fins sharing the same stretch of body as this set, itself included.
fn interference_count(rocket: &Rocket, component: &Component, own: usize) -> usize {
    let lead = component.position();
    let trail = lead + component.length();
    if trail - lead < 0.007 {
        return own;
    }
    let Some(parent) = component.parent() else {
        return own;
    };
    let counted: usize = rocket
        .component(parent)
        .children()
        .iter()
        .map(|&id| rocket.component(id))
        .filter_map(|c| match &c.kind {
            ComponentKind::FinSet(f) => {
                let fin_lead = c.position();
                let fin_trail = fin_lead + c.length();
                (fin_lead < trail - 0.005 && fin_trail > lead + 0.005).then_some(f.count)
            }
            _ => None,
        })
        .sum();
    counted.max(own)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::{Placement, RocketBuilder};
    use approx::assert_abs_diff_eq;

    fn fin_rocket(counts: &[usize]) -> (Rocket, Vec<crate::vehicle::ComponentId>) {
        let mut b = RocketBuilder::new("fins");
        let stage = b.stage("s");
        let body = b.add(stage, Component::body_tube("body", 0.5, 0.025));
        let ids = counts
            .iter()
            .map(|&n| {
                b.add(
                    body,
                    Component::trapezoidal_fins(format!("fins{}", n), n, 0.08, 0.04, 0.04, 0.06)
                        .placement(Placement::Bottom(0.0)),
                )
            })
            .collect();
        (b.build().unwrap(), ids)
    }

    fn calc(rocket: &Rocket, id: crate::vehicle::ComponentId) -> FinSetCalc {
        let c = rocket.component(id);
        match &c.kind {
            ComponentKind::FinSet(f) => FinSetCalc::new(rocket, c, f),
            _ => unreachable!(),
        }
    }

    #[test]
    fn cna_scales_with_fin_count() {
        let (r3, ids3) = fin_rocket(&[3]);
        let (r4, ids4) = fin_rocket(&[4]);
        let mut cond = FlightConditions::new(0.05);
        cond.set_mach(0.3);
        let mut w = WarningSet::new();
        for theta in [0.0, 0.3, 1.0] {
            cond.set_theta(theta);
            let f3 = calc(&r3, ids3[0]).nonaxial_forces(&cond, 0.0, &mut w);
            let f4 = calc(&r4, ids4[0]).nonaxial_forces(&cond, 0.0, &mut w);
            assert_abs_diff_eq!(f3.cna / f4.cna, 0.75, epsilon = 1e-9);
        }
    }

    #[test]
    fn freeform_outline_matches_trapezoid() {
        let mut b = RocketBuilder::new("freeform");
        let stage = b.stage("s");
        let body = b.add(stage, Component::body_tube("body", 0.5, 0.025));
        let id = b.add(
            body,
            Component::freeform_fins("fins", 4, vec![(0.0, 0.0), (0.04, 0.06), (0.08, 0.06), (0.08, 0.0)])
                .placement(Placement::Bottom(0.0)),
        );
        let free = b.build().unwrap();
        let (trap, ids) = fin_rocket(&[4]);

        let mut cond = FlightConditions::new(0.05);
        cond.set_mach(0.3);
        cond.set_theta(0.2);
        let mut w = WarningSet::new();
        let a = calc(&free, id).nonaxial_forces(&cond, 0.0, &mut w);
        let b = calc(&trap, ids[0]).nonaxial_forces(&cond, 0.0, &mut w);
        assert_abs_diff_eq!(a.cna, b.cna, epsilon = 1e-12);
        assert_abs_diff_eq!(a.cp.x, b.cp.x, epsilon = 1e-12);
    }

    #[test]
    fn trapezoid_mean_aerodynamic_chord() {
        let (r, ids) = fin_rocket(&[3]);
        let c = calc(&r, ids[0]);
        // root 0.08, tip 0.04: MAC = 2/3 (cr + ct - cr ct / (cr + ct))
        let (cr, ct) = (0.08, 0.04);
        let mac = 2.0 / 3.0 * (cr + ct - cr * ct / (cr + ct));
        assert_abs_diff_eq!(c.mac_length(), mac, epsilon = 2e-3);
        assert!(c.midchord_position() > 0.0 && c.midchord_position() < cr + 0.04);
    }

    #[test]
    fn subsonic_cp_at_quarter_mac() {
        let (r, ids) = fin_rocket(&[4]);
        let c = calc(&r, ids[0]);
        let mut cond = FlightConditions::new(0.05);
        cond.set_mach(0.3);
        let f = c.nonaxial_forces(&cond, 0.0, &mut WarningSet::new());
        assert_abs_diff_eq!(f.cp.x, c.mac_lead + 0.25 * c.mac_length, epsilon = 1e-12);
        assert_abs_diff_eq!(f.cp.weight, f.cna, epsilon = 1e-15);
    }

    #[test]
    fn cna_is_continuous_through_transonic() {
        let (r, ids) = fin_rocket(&[4]);
        let c = calc(&r, ids[0]);
        let mut cond = FlightConditions::new(0.05);
        let mut at = |m: f64| {
            cond.set_mach(m);
            c.cna1(&cond)
        };
        assert_abs_diff_eq!(at(CNA_SUBSONIC - 1e-7), at(CNA_SUBSONIC + 1e-7), epsilon = 1e-6);
        assert_abs_diff_eq!(at(CNA_SUPERSONIC - 1e-7), at(CNA_SUPERSONIC + 1e-7), epsilon = 1e-6);
    }

    #[test]
    fn supersonic_cp_moves_aft() {
        let ar = 1.5;
        let poly = cp_poly(ar);
        let beta = (pow2(2.5) - 1.0f64).sqrt();
        let x = cp_fraction(2.5, beta, ar, &poly);
        assert_abs_diff_eq!(x, (ar * beta - 0.67) / (2.0 * ar * beta - 1.0), epsilon = 1e-12);
        assert!(x > 0.25);
    }

    #[test]
    fn overlapping_sets_interfere() {
        let (r, ids) = fin_rocket(&[4, 4]);
        let c = calc(&r, ids[0]);
        assert_eq!(c.interference_count, 8);
        let (r, ids) = fin_rocket(&[6, 4]);
        let mut w = WarningSet::new();
        let cond = FlightConditions::new(0.05);
        calc(&r, ids[0]).nonaxial_forces(&cond, 0.0, &mut w);
        assert!(w.contains(|x| *x == Warning::ParallelFins));
    }

    #[test]
    fn thick_fin_warning() {
        let mut b = RocketBuilder::new("thick");
        let stage = b.stage("s");
        let body = b.add(stage, Component::body_tube("body", 0.3, 0.01));
        let id = b.add(body, Component::trapezoidal_fins("f", 3, 0.05, 0.03, 0.02, 0.04).thickness(0.006));
        let r = b.build().unwrap();
        let mut w = WarningSet::new();
        calc(&r, id).nonaxial_forces(&FlightConditions::new(0.02), 0.0, &mut w);
        assert!(w.contains(|x| *x == Warning::ThickFin));
    }

    #[test]
    fn friction_counts_both_faces_of_every_fin() {
        let (r, ids) = fin_rocket(&[3]);
        let c = calc(&r, ids[0]);
        let area = 0.5 * (0.08 + 0.04) * 0.06;
        let expected = 3.0 * 0.01 * (1.0 + 2.0 * 0.003 / c.mac_length()) * 2.0 * area;
        assert_abs_diff_eq!(c.friction_cd(0.01), expected, epsilon = 1e-12);
    }
}
