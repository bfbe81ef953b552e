use crate::error::ConfigError;
use crate::vehicle::component::{Component, ComponentId, ComponentKind, Placement};

// ---------------------------------------------------------------------------
// Rocket: frozen component arena
// ---------------------------------------------------------------------------

/// Immutable component tree. Stages are numbered from the top: stage 0 is the
/// uppermost, the last stage is the booster that leaves the pad first.
#[derive(Debug, Clone)]
pub struct Rocket {
    name: String,
    components: Vec<Component>,
    stages: Vec<ComponentId>,
    order: Vec<ComponentId>, // depth-first
    length: f64,
}

impl Rocket {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self, id: ComponentId) -> &Component {
        &self.components[id.0]
    }

    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.0)
    }

    /// All components in depth-first order (stage, then its children).
    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &Component)> + '_ {
        self.order.iter().map(move |&id| (id, &self.components[id.0]))
    }

    pub fn stages(&self) -> &[ComponentId] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Total length from nose tip to the aft end of the bottom stage, m.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn find(&self, name: &str) -> Option<ComponentId> {
        self.components().find(|(_, c)| c.name == name).map(|(id, _)| id)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RocketBuilder {
    name: String,
    components: Vec<Component>,
    stages: Vec<ComponentId>,
}

impl RocketBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Append a stage below the existing ones.
    pub fn stage(&mut self, name: impl Into<String>) -> ComponentId {
        self.add_stage(Component::stage(name))
    }

    pub fn add_stage(&mut self, stage: Component) -> ComponentId {
        let id = ComponentId(self.components.len());
        self.components.push(stage);
        self.stages.push(id);
        id
    }

    pub fn add(&mut self, parent: ComponentId, component: Component) -> ComponentId {
        let id = ComponentId(self.components.len());
        let mut component = component;
        component.parent = Some(parent);
        self.components.push(component);
        if let Some(p) = self.components.get_mut(parent.0) {
            p.children.push(id);
        }
        id
    }

    pub fn build(mut self) -> Result<Rocket, ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::geometry(&self.name, "rocket has no stages"));
        }
        for c in &self.components {
            c.validate()?;
            if let Some(parent) = c.parent {
                let p = self
                    .components
                    .get(parent.0)
                    .ok_or_else(|| ConfigError::geometry(&c.name, "unknown parent"))?;
                let allowed = if c.is_symmetric() { p.is_stage() } else { p.is_symmetric() };
                if !allowed {
                    return Err(ConfigError::geometry(
                        &c.name,
                        format!("cannot be attached to '{}'", p.name),
                    ));
                }
            } else if !c.is_stage() {
                return Err(ConfigError::geometry(&c.name, "component has no parent"));
            }
        }

        for c in self.components.iter_mut() {
            c.compute_integrals();
        }

        let mut fore = 0.0;
        let stages = self.stages.clone();
        for (number, &stage) in stages.iter().enumerate() {
            let length = self.stage_extent(stage);
            {
                let s = &mut self.components[stage.0];
                s.position = fore;
                s.stage_length = length;
                s.stage = number;
            }
            self.place_children(stage, fore, length, number);
            fore += length;
        }

        let mut order = Vec::with_capacity(self.components.len());
        for &stage in &stages {
            self.collect(stage, &mut order);
        }

        Ok(Rocket { name: self.name, components: self.components, stages, order, length: fore })
    }

    /// Length of a stage: the aft end of its furthest body component.
    fn stage_extent(&self, stage: ComponentId) -> f64 {
        let mut cursor = 0.0;
        let mut extent: f64 = 0.0;
        for &child in &self.components[stage.0].children {
            let c = &self.components[child.0];
            let len = c.length();
            let pos = match c.placement {
                Placement::After => cursor,
                Placement::Top(o) => o,
                Placement::Middle(_) | Placement::Bottom(_) => cursor,
            };
            cursor = pos + len;
            extent = extent.max(cursor);
        }
        extent
    }

    fn place_children(&mut self, parent: ComponentId, fore: f64, length: f64, stage: usize) {
        let children = self.components[parent.0].children.clone();
        let mut cursor = fore;
        for child in children {
            let len = self.components[child.0].length();
            let pos = match self.components[child.0].placement {
                Placement::After => cursor,
                Placement::Top(o) => fore + o,
                Placement::Middle(o) => fore + (length - len) / 2.0 + o,
                Placement::Bottom(o) => fore + length - len + o,
            };
            cursor = pos + len;

            let body_radius = {
                let p = &self.components[parent.0];
                if p.is_symmetric() {
                    let local = (pos + len / 2.0 - p.position).clamp(0.0, p.length());
                    p.radius_at(local)
                } else {
                    0.0
                }
            };
            let c = &mut self.components[child.0];
            c.position = pos;
            c.stage = stage;
            c.body_radius = body_radius;
            self.place_children(child, pos, len, stage);
        }
    }

    fn collect(&self, id: ComponentId, order: &mut Vec<ComponentId>) {
        order.push(id);
        for &child in &self.components[id.0].children {
            self.collect(child, order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::shape::Shape;
    use approx::assert_abs_diff_eq;

    fn simple() -> (Rocket, ComponentId, ComponentId) {
        let mut b = RocketBuilder::new("test");
        let s = b.stage("sustainer");
        b.add(s, Component::nose_cone("nose", Shape::Ogive, 0.1, 0.02));
        let tube = b.add(s, Component::body_tube("body", 0.3, 0.02));
        let fins = b.add(tube, Component::trapezoidal_fins("fins", 3, 0.08, 0.04, 0.04, 0.05));
        b.add(tube, Component::launch_lug("lug", 0.04, 0.003));
        (b.build().unwrap(), tube, fins)
    }

    #[test]
    fn positions_are_resolved() {
        let (r, tube, fins) = simple();
        assert_abs_diff_eq!(r.component(tube).position(), 0.1, epsilon = 1e-12);
        // fins flush with the aft end of the tube
        assert_abs_diff_eq!(r.component(fins).position(), 0.4 - 0.08, epsilon = 1e-12);
        assert_abs_diff_eq!(r.component(fins).body_radius(), 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(r.length(), 0.4, epsilon = 1e-12);
        let lug = r.find("lug").unwrap();
        assert_abs_diff_eq!(r.component(lug).position(), 0.1 + 0.13, epsilon = 1e-12);
    }

    #[test]
    fn stages_stack_from_the_top() {
        let mut b = RocketBuilder::new("two");
        let upper = b.stage("upper");
        b.add(upper, Component::nose_cone("nose", Shape::Conical, 0.1, 0.02));
        b.add(upper, Component::body_tube("upper body", 0.2, 0.02));
        let lower = b.stage("booster");
        let tube = b.add(lower, Component::body_tube("booster body", 0.1, 0.02));
        let r = b.build().unwrap();
        assert_eq!(r.stage_count(), 2);
        assert_abs_diff_eq!(r.component(tube).position(), 0.3, epsilon = 1e-12);
        assert_eq!(r.component(tube).stage_number(), 1);
        assert_abs_diff_eq!(r.length(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn depth_first_order() {
        let (r, _, _) = simple();
        let names: Vec<_> = r.components().map(|(_, c)| c.name.as_str()).collect();
        assert_eq!(names, vec!["sustainer", "nose", "body", "fins", "lug"]);
    }

    #[test]
    fn fins_cannot_attach_to_a_stage() {
        let mut b = RocketBuilder::new("bad");
        let s = b.stage("s");
        b.add(s, Component::trapezoidal_fins("fins", 3, 0.08, 0.04, 0.04, 0.05));
        assert!(b.build().is_err());
        assert!(RocketBuilder::new("empty").build().is_err());
    }
}
