use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::math::pow2;
use crate::vehicle::recovery::{DeploymentConfig, SeparationConfig};
use crate::vehicle::shape::{RevolutionIntegrals, Shape};

// ---------------------------------------------------------------------------
// Handles and enums
// ---------------------------------------------------------------------------

/// Stable index of a component inside its rocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentId(pub usize);

/// Surface finish; sets the roughness used by the skin-friction model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finish {
    Rough,
    Unfinished,
    #[default]
    Normal,
    Smooth,
    Polished,
    Mirror,
}

impl Finish {
    /// Roughness height, m.
    pub fn roughness(&self) -> f64 {
        match self {
            Finish::Rough => 500e-6,
            Finish::Unfinished => 150e-6,
            Finish::Normal => 60e-6,
            Finish::Smooth => 20e-6,
            Finish::Polished => 2e-6,
            Finish::Mirror => 0.0,
        }
    }
}

/// Axial placement relative to the parent (or previous sibling).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Directly behind the previous sibling (or at the parent's top for the first child).
    After,
    /// Fore end offset from the parent's fore end, m.
    Top(f64),
    /// Center offset from the parent's center, m.
    Middle(f64),
    /// Aft end offset from the parent's aft end, m.
    Bottom(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossSection {
    #[default]
    Square,
    Rounded,
    Airfoil,
}

// ---------------------------------------------------------------------------
// Component kinds
// ---------------------------------------------------------------------------

/// Nose cone or transition. A nose cone is a transition with zero fore radius.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub shape: Shape,
    pub shape_parameter: f64,
    pub length: f64,
    pub fore_radius: f64,
    pub aft_radius: f64,
    pub thickness: f64,
    pub filled: bool,
}

impl Transition {
    /// Radius at `x` from the fore end.
    pub fn radius(&self, x: f64) -> f64 {
        let (fore, aft) = (self.fore_radius, self.aft_radius);
        if fore <= aft {
            fore + self.shape.radius(x, aft - fore, self.length, self.shape_parameter)
        } else {
            aft + self.shape.radius(self.length - x, fore - aft, self.length, self.shape_parameter)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyTube {
    pub length: f64,
    pub outer_radius: f64,
    pub thickness: f64,
    pub motor_mount: bool,
    /// Motor aft end protrudes this far past the tube's aft end, m.
    pub motor_overhang: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinSet {
    pub count: usize,
    /// Planform outline (x aft along the root, y outward), starting at the root leading edge.
    pub points: Vec<(f64, f64)>,
    pub thickness: f64,
    pub cant_angle: f64,    // rad
    pub base_rotation: f64, // rad
    pub cross_section: CrossSection,
}

impl FinSet {
    pub fn trapezoidal(count: usize, root: f64, tip: f64, sweep: f64, span: f64) -> Self {
        Self {
            count,
            points: vec![(0.0, 0.0), (sweep, span), (sweep + tip, span), (root, 0.0)],
            thickness: 0.003,
            cant_angle: 0.0,
            base_rotation: 0.0,
            cross_section: CrossSection::Square,
        }
    }

    pub fn root_chord(&self) -> f64 {
        let max = self.points.iter().map(|p| p.0).fold(f64::MIN, f64::max);
        let min = self.points.iter().map(|p| p.0).fold(f64::MAX, f64::min);
        (max - min).max(0.0)
    }

    pub fn span(&self) -> f64 {
        self.points.iter().map(|p| p.1).fold(0.0, f64::max)
    }

    /// Planform area of one fin (shoelace), m^2.
    pub fn planform_area(&self) -> f64 {
        let n = self.points.len();
        let mut twice = 0.0;
        for i in 0..n {
            let (x1, y1) = self.points[i];
            let (x2, y2) = self.points[(i + 1) % n];
            twice += x1 * y2 - x2 * y1;
        }
        (twice / 2.0).abs()
    }

    /// Planform centroid (x, y) of one fin.
    pub fn centroid(&self) -> (f64, f64) {
        let n = self.points.len();
        let (mut a, mut cx, mut cy) = (0.0, 0.0, 0.0);
        for i in 0..n {
            let (x1, y1) = self.points[i];
            let (x2, y2) = self.points[(i + 1) % n];
            let cross = x1 * y2 - x2 * y1;
            a += cross;
            cx += (x1 + x2) * cross;
            cy += (y1 + y2) * cross;
        }
        if a.abs() < 1e-12 {
            return (self.root_chord() / 2.0, 0.0);
        }
        (cx / (3.0 * a), cy / (3.0 * a))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TubeFinSet {
    pub count: usize,
    pub length: f64,
    pub outer_radius: f64,
    pub thickness: f64,
    pub base_rotation: f64,
}

impl TubeFinSet {
    pub fn inner_radius(&self) -> f64 {
        (self.outer_radius - self.thickness).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchLug {
    pub length: f64,
    pub outer_radius: f64,
    pub thickness: f64,
}

impl LaunchLug {
    pub fn inner_radius(&self) -> f64 {
        (self.outer_radius - self.thickness).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RailButton {
    pub outer_diameter: f64,
    pub inner_diameter: f64,
    pub total_height: f64,
    pub base_height: f64,
    pub flange_height: f64,
    pub count: usize,
    /// Axial distance between consecutive buttons, m.
    pub spacing: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parachute {
    pub diameter: f64,
    pub cd: f64,
    pub mass: f64,
    pub packed_length: f64,
    pub deployment: DeploymentConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Streamer {
    pub length: f64,
    pub width: f64,
    /// Areal density of the strip material, kg/m^2.
    pub material_density: f64,
    pub packed_length: f64,
    pub deployment: DeploymentConfig,
}

impl Streamer {
    pub fn cd(&self) -> f64 {
        let aspect = self.length / self.width.max(1e-6);
        (0.034 * ((self.material_density + 0.025) / 0.105) * (aspect + 1.0) / aspect).min(0.4)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageData {
    pub separation: SeparationConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    Stage(StageData),
    NoseCone(Transition),
    Transition(Transition),
    BodyTube(BodyTube),
    FinSet(FinSet),
    TubeFinSet(TubeFinSet),
    LaunchLug(LaunchLug),
    RailButton(RailButton),
    Parachute(Parachute),
    Streamer(Streamer),
    Mass { mass: f64, length: f64 },
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    pub placement: Placement,
    pub finish: Finish,
    pub density: f64, // kg/m^3
    pub mass_override: Option<f64>,
    pub cg_override: Option<f64>, // m from the component's fore end
    pub cd_override: Option<f64>,

    // resolved when the rocket is built
    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: Vec<ComponentId>,
    pub(crate) position: f64,
    pub(crate) stage: usize,
    pub(crate) body_radius: f64,
    pub(crate) stage_length: f64,
    pub(crate) integrals: RevolutionIntegrals,
}

impl Component {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        let (placement, density) = match &kind {
            ComponentKind::Stage(_)
            | ComponentKind::NoseCone(_)
            | ComponentKind::Transition(_)
            | ComponentKind::BodyTube(_) => (Placement::After, 680.0),
            ComponentKind::FinSet(_) => (Placement::Bottom(0.0), 170.0),
            ComponentKind::TubeFinSet(_) => (Placement::Bottom(0.0), 680.0),
            _ => (Placement::Top(0.0), 1050.0),
        };
        Self {
            name: name.into(),
            kind,
            placement,
            finish: Finish::Normal,
            density,
            mass_override: None,
            cg_override: None,
            cd_override: None,
            parent: None,
            children: Vec::new(),
            position: 0.0,
            stage: 0,
            body_radius: 0.0,
            stage_length: 0.0,
            integrals: RevolutionIntegrals::default(),
        }
    }

    pub fn stage(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::Stage(StageData { separation: SeparationConfig::default() }))
    }

    pub fn nose_cone(name: impl Into<String>, shape: Shape, length: f64, radius: f64) -> Self {
        Self::new(
            name,
            ComponentKind::NoseCone(Transition {
                shape,
                shape_parameter: shape.default_parameter(),
                length,
                fore_radius: 0.0,
                aft_radius: radius,
                thickness: 0.002,
                filled: false,
            }),
        )
        .density(1050.0)
    }

    pub fn transition(name: impl Into<String>, shape: Shape, length: f64, fore: f64, aft: f64) -> Self {
        Self::new(
            name,
            ComponentKind::Transition(Transition {
                shape,
                shape_parameter: shape.default_parameter(),
                length,
                fore_radius: fore,
                aft_radius: aft,
                thickness: 0.002,
                filled: false,
            }),
        )
        .density(1050.0)
    }

    pub fn body_tube(name: impl Into<String>, length: f64, radius: f64) -> Self {
        Self::new(
            name,
            ComponentKind::BodyTube(BodyTube {
                length,
                outer_radius: radius,
                thickness: 0.0005,
                motor_mount: false,
                motor_overhang: 0.0,
            }),
        )
    }

    pub fn trapezoidal_fins(
        name: impl Into<String>,
        count: usize,
        root: f64,
        tip: f64,
        sweep: f64,
        span: f64,
    ) -> Self {
        Self::new(name, ComponentKind::FinSet(FinSet::trapezoidal(count, root, tip, sweep, span)))
    }

    pub fn freeform_fins(name: impl Into<String>, count: usize, points: Vec<(f64, f64)>) -> Self {
        let mut fins = FinSet::trapezoidal(count, 0.0, 0.0, 0.0, 0.0);
        fins.points = points;
        Self::new(name, ComponentKind::FinSet(fins))
    }

    pub fn tube_fins(name: impl Into<String>, count: usize, length: f64, outer_radius: f64) -> Self {
        Self::new(
            name,
            ComponentKind::TubeFinSet(TubeFinSet {
                count,
                length,
                outer_radius,
                thickness: 0.0005,
                base_rotation: 0.0,
            }),
        )
    }

    pub fn launch_lug(name: impl Into<String>, length: f64, outer_radius: f64) -> Self {
        Self::new(
            name,
            ComponentKind::LaunchLug(LaunchLug { length, outer_radius, thickness: 0.0005 }),
        )
        .placement(Placement::Middle(0.0))
    }

    pub fn rail_buttons(name: impl Into<String>, count: usize, spacing: f64) -> Self {
        Self::new(
            name,
            ComponentKind::RailButton(RailButton {
                outer_diameter: 0.0097,
                inner_diameter: 0.008,
                total_height: 0.0097,
                base_height: 0.002,
                flange_height: 0.002,
                count,
                spacing,
            }),
        )
    }

    pub fn parachute(name: impl Into<String>, diameter: f64, mass: f64) -> Self {
        Self::new(
            name,
            ComponentKind::Parachute(Parachute {
                diameter,
                cd: 0.8,
                mass,
                packed_length: 0.04,
                deployment: DeploymentConfig::default(),
            }),
        )
    }

    pub fn streamer(name: impl Into<String>, length: f64, width: f64) -> Self {
        Self::new(
            name,
            ComponentKind::Streamer(Streamer {
                length,
                width,
                material_density: 0.05,
                packed_length: 0.03,
                deployment: DeploymentConfig::default(),
            }),
        )
    }

    pub fn mass_component(name: impl Into<String>, mass: f64, length: f64) -> Self {
        Self::new(name, ComponentKind::Mass { mass, length })
    }

    // -- chained modifiers --

    pub fn placement(mut self, v: Placement) -> Self { self.placement = v; self }
    pub fn finish(mut self, v: Finish) -> Self { self.finish = v; self }
    pub fn density(mut self, v: f64) -> Self { self.density = v; self }
    pub fn mass_override(mut self, v: f64) -> Self { self.mass_override = Some(v); self }
    pub fn cg_override(mut self, v: f64) -> Self { self.cg_override = Some(v); self }
    pub fn cd_override(mut self, v: f64) -> Self { self.cd_override = Some(v); self }

    /// Wall (or fin) thickness for kinds that have one.
    pub fn thickness(mut self, v: f64) -> Self {
        match &mut self.kind {
            ComponentKind::NoseCone(t) | ComponentKind::Transition(t) => t.thickness = v,
            ComponentKind::BodyTube(b) => b.thickness = v,
            ComponentKind::FinSet(f) => f.thickness = v,
            ComponentKind::TubeFinSet(f) => f.thickness = v,
            ComponentKind::LaunchLug(l) => l.thickness = v,
            _ => {}
        }
        self
    }

    pub fn shape_parameter(mut self, v: f64) -> Self {
        if let ComponentKind::NoseCone(t) | ComponentKind::Transition(t) = &mut self.kind {
            t.shape_parameter = v;
        }
        self
    }

    pub fn motor_mount(mut self, overhang: f64) -> Self {
        if let ComponentKind::BodyTube(b) = &mut self.kind {
            b.motor_mount = true;
            b.motor_overhang = overhang;
        }
        self
    }

    pub fn deployment(mut self, v: DeploymentConfig) -> Self {
        match &mut self.kind {
            ComponentKind::Parachute(p) => p.deployment = v,
            ComponentKind::Streamer(s) => s.deployment = v,
            _ => {}
        }
        self
    }

    pub fn separation(mut self, v: SeparationConfig) -> Self {
        if let ComponentKind::Stage(s) = &mut self.kind {
            s.separation = v;
        }
        self
    }

    pub fn cant_angle(mut self, v: f64) -> Self {
        if let ComponentKind::FinSet(f) = &mut self.kind {
            f.cant_angle = v;
        }
        self
    }

    pub fn cross_section(mut self, v: CrossSection) -> Self {
        if let ComponentKind::FinSet(f) = &mut self.kind {
            f.cross_section = v;
        }
        self
    }

    // -- queries --

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    /// Absolute axial position of the fore end, m from the nose tip.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn stage_number(&self) -> usize {
        self.stage
    }

    /// Radius of the parent body at this component's location.
    pub fn body_radius(&self) -> f64 {
        self.body_radius
    }

    pub fn length(&self) -> f64 {
        match &self.kind {
            ComponentKind::Stage(_) => self.stage_length,
            ComponentKind::NoseCone(t) | ComponentKind::Transition(t) => t.length,
            ComponentKind::BodyTube(b) => b.length,
            ComponentKind::FinSet(f) => f.root_chord(),
            ComponentKind::TubeFinSet(f) => f.length,
            ComponentKind::LaunchLug(l) => l.length,
            ComponentKind::RailButton(r) => {
                r.outer_diameter + r.spacing * r.count.saturating_sub(1) as f64
            }
            ComponentKind::Parachute(p) => p.packed_length,
            ComponentKind::Streamer(s) => s.packed_length,
            ComponentKind::Mass { length, .. } => *length,
        }
    }

    pub fn is_stage(&self) -> bool {
        matches!(self.kind, ComponentKind::Stage(_))
    }

    /// Body of revolution on the rocket axis (tube, nose cone, transition).
    pub fn is_symmetric(&self) -> bool {
        matches!(
            self.kind,
            ComponentKind::NoseCone(_) | ComponentKind::Transition(_) | ComponentKind::BodyTube(_)
        )
    }

    pub fn is_recovery_device(&self) -> bool {
        matches!(self.kind, ComponentKind::Parachute(_) | ComponentKind::Streamer(_))
    }

    pub fn deployment_config(&self) -> Option<&DeploymentConfig> {
        match &self.kind {
            ComponentKind::Parachute(p) => Some(&p.deployment),
            ComponentKind::Streamer(s) => Some(&s.deployment),
            _ => None,
        }
    }

    /// CD·A of a deployed recovery device, m^2.
    pub fn recovery_drag_area(&self) -> f64 {
        match &self.kind {
            ComponentKind::Parachute(p) => p.cd * std::f64::consts::PI * pow2(p.diameter / 2.0),
            ComponentKind::Streamer(s) => s.cd() * s.length * s.width,
            _ => 0.0,
        }
    }

    pub fn fore_radius(&self) -> f64 {
        match &self.kind {
            ComponentKind::NoseCone(t) | ComponentKind::Transition(t) => t.fore_radius,
            ComponentKind::BodyTube(b) => b.outer_radius,
            _ => 0.0,
        }
    }

    pub fn aft_radius(&self) -> f64 {
        match &self.kind {
            ComponentKind::NoseCone(t) | ComponentKind::Transition(t) => t.aft_radius,
            ComponentKind::BodyTube(b) => b.outer_radius,
            _ => 0.0,
        }
    }

    /// Outer radius at `x` from the fore end (symmetric components only).
    pub fn radius_at(&self, x: f64) -> f64 {
        match &self.kind {
            ComponentKind::NoseCone(t) | ComponentKind::Transition(t) => t.radius(x),
            ComponentKind::BodyTube(b) => b.outer_radius,
            _ => 0.0,
        }
    }

    pub fn max_radius(&self) -> f64 {
        self.fore_radius().max(self.aft_radius())
    }

    /// Volume/area integrals (symmetric components only; zero otherwise).
    pub fn integrals(&self) -> &RevolutionIntegrals {
        &self.integrals
    }

    pub(crate) fn compute_integrals(&mut self) {
        self.integrals = match &self.kind {
            ComponentKind::NoseCone(t) | ComponentKind::Transition(t) => {
                let thickness = if t.filled { f64::INFINITY } else { t.thickness };
                RevolutionIntegrals::compute(t.length, thickness, |x| t.radius(x))
            }
            ComponentKind::BodyTube(b) => {
                RevolutionIntegrals::compute(b.length, b.thickness, |_| b.outer_radius)
            }
            _ => RevolutionIntegrals::default(),
        };
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let bad = |reason: &str| Err(ConfigError::geometry(&self.name, reason));
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;
        match &self.kind {
            ComponentKind::NoseCone(t) | ComponentKind::Transition(t) => {
                if !non_negative(t.length) || !non_negative(t.fore_radius) || !non_negative(t.aft_radius) {
                    return bad("length and radii must be non-negative");
                }
                let (lo, hi) = t.shape.parameter_range();
                if t.shape_parameter < lo - 1e-9 || t.shape_parameter > hi + 1e-9 {
                    return bad("shape parameter out of range");
                }
            }
            ComponentKind::BodyTube(b) => {
                if !non_negative(b.length) || !non_negative(b.outer_radius) || !non_negative(b.thickness) {
                    return bad("length, radius and thickness must be non-negative");
                }
            }
            ComponentKind::FinSet(f) => {
                if f.count == 0 {
                    return bad("fin count must be at least 1");
                }
                if f.points.len() < 3 || f.points.iter().any(|p| !p.0.is_finite() || !p.1.is_finite()) {
                    return bad("fin outline needs at least three finite points");
                }
                if f.points.iter().any(|p| p.1 < -1e-9) {
                    return bad("fin outline must not extend inside the body");
                }
                if !non_negative(f.thickness) {
                    return bad("fin thickness must be non-negative");
                }
            }
            ComponentKind::TubeFinSet(f) => {
                if f.count == 0 || !non_negative(f.length) || !non_negative(f.outer_radius) {
                    return bad("tube fins need a positive count and non-negative size");
                }
            }
            ComponentKind::LaunchLug(l) => {
                if !non_negative(l.length) || !non_negative(l.outer_radius) {
                    return bad("launch lug size must be non-negative");
                }
            }
            ComponentKind::RailButton(r) => {
                if r.count == 0 || !non_negative(r.outer_diameter) || !non_negative(r.total_height) {
                    return bad("rail buttons need a positive count and non-negative size");
                }
            }
            ComponentKind::Parachute(p) => {
                if !non_negative(p.diameter) || !non_negative(p.cd) || !non_negative(p.mass) {
                    return bad("parachute size, CD and mass must be non-negative");
                }
            }
            ComponentKind::Streamer(s) => {
                if !non_negative(s.length) || !non_negative(s.width) {
                    return bad("streamer size must be non-negative");
                }
            }
            ComponentKind::Mass { mass, length } => {
                if !non_negative(*mass) || !non_negative(*length) {
                    return bad("mass and length must be non-negative");
                }
            }
            ComponentKind::Stage(_) => {}
        }
        if let Some(m) = self.mass_override {
            if !non_negative(m) {
                return bad("mass override must be non-negative");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn trapezoid_fin_area_and_centroid() {
        let f = FinSet::trapezoidal(3, 0.1, 0.05, 0.05, 0.06);
        assert_abs_diff_eq!(f.planform_area(), 0.5 * (0.1 + 0.05) * 0.06, epsilon = 1e-12);
        assert_abs_diff_eq!(f.root_chord(), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(f.span(), 0.06, epsilon = 1e-12);
        let (_, cy) = f.centroid();
        // trapezoid centroid height: h (b + 2a) / (3 (a + b)) with a = tip
        assert_abs_diff_eq!(cy, 0.06 * (0.1 + 2.0 * 0.05) / (3.0 * 0.15), epsilon = 1e-12);
    }

    #[test]
    fn reversed_transition_radius() {
        let c = Component::transition("boattail", Shape::Conical, 0.1, 0.05, 0.03);
        assert_abs_diff_eq!(c.radius_at(0.0), 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(c.radius_at(0.1), 0.03, epsilon = 1e-12);
        assert_abs_diff_eq!(c.radius_at(0.05), 0.04, epsilon = 1e-12);
    }

    #[test]
    fn validation_rejects_negative_sizes() {
        assert!(Component::body_tube("t", -1.0, 0.02).validate().is_err());
        assert!(Component::trapezoidal_fins("f", 0, 0.1, 0.05, 0.0, 0.05).validate().is_err());
        assert!(Component::nose_cone("n", Shape::Haack, 0.1, 0.02).shape_parameter(0.9).validate().is_err());
        assert!(Component::body_tube("t", 0.3, 0.02).validate().is_ok());
    }

    #[test]
    fn streamer_cd_is_capped() {
        let c = Component::streamer("s", 1.0, 0.05);
        if let ComponentKind::Streamer(s) = &c.kind {
            assert!(s.cd() > 0.0 && s.cd() <= 0.4);
        }
        assert!(c.recovery_drag_area() > 0.0);
    }
}
