use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::sim::event::{FlightEvent, FlightEventType};

// ---------------------------------------------------------------------------
// Data channels
// ---------------------------------------------------------------------------

/// One recorded quantity. All values are SI except latitude/longitude (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightDataType {
    Time,
    Altitude,
    PositionEast,
    PositionNorth,
    LateralDistance,
    LateralDirection,
    Latitude,
    Longitude,
    VelocityZ,
    VelocityXy,
    VelocityTotal,
    AccelerationZ,
    AccelerationXy,
    AccelerationTotal,
    Zenith,
    Azimuth,
    Aoa,
    RollRate,
    PitchRate,
    YawRate,
    Mass,
    MotorMass,
    LongitudinalInertia,
    RotationalInertia,
    CgLocation,
    CpLocation,
    Stability,
    Thrust,
    ThrustWeightRatio,
    Drag,
    Gravity,
    Coriolis,
    Mach,
    Reynolds,
    NormalForceCoeff,
    NormalForceSlope,
    SideForceCoeff,
    PitchMomentCoeff,
    YawMomentCoeff,
    RollMomentCoeff,
    RollForcingCoeff,
    RollDampingCoeff,
    PitchDampingCoeff,
    DragCoeff,
    AxialDragCoeff,
    FrictionDragCoeff,
    PressureDragCoeff,
    BaseDragCoeff,
    ReferenceLength,
    ReferenceArea,
    WindVelocity,
    AirTemperature,
    AirPressure,
    SpeedOfSound,
    TimeStep,
}

impl FlightDataType {
    pub fn name(&self) -> &'static str {
        use FlightDataType::*;
        match self {
            Time => "Time",
            Altitude => "Altitude",
            PositionEast => "Position East of launch",
            PositionNorth => "Position North of launch",
            LateralDistance => "Lateral distance",
            LateralDirection => "Lateral direction",
            Latitude => "Latitude",
            Longitude => "Longitude",
            VelocityZ => "Vertical velocity",
            VelocityXy => "Lateral velocity",
            VelocityTotal => "Total velocity",
            AccelerationZ => "Vertical acceleration",
            AccelerationXy => "Lateral acceleration",
            AccelerationTotal => "Total acceleration",
            Zenith => "Vertical orientation (zenith)",
            Azimuth => "Lateral orientation (azimuth)",
            Aoa => "Angle of attack",
            RollRate => "Roll rate",
            PitchRate => "Pitch rate",
            YawRate => "Yaw rate",
            Mass => "Mass",
            MotorMass => "Motor mass",
            LongitudinalInertia => "Longitudinal moment of inertia",
            RotationalInertia => "Rotational moment of inertia",
            CgLocation => "CG location",
            CpLocation => "CP location",
            Stability => "Stability margin calibers",
            Thrust => "Thrust",
            ThrustWeightRatio => "Thrust-to-weight ratio",
            Drag => "Drag force",
            Gravity => "Gravitational acceleration",
            Coriolis => "Coriolis acceleration",
            Mach => "Mach number",
            Reynolds => "Reynolds number",
            NormalForceCoeff => "Normal force coefficient",
            NormalForceSlope => "Normal force coefficient derivative",
            SideForceCoeff => "Side force coefficient",
            PitchMomentCoeff => "Pitch moment coefficient",
            YawMomentCoeff => "Yaw moment coefficient",
            RollMomentCoeff => "Roll moment coefficient",
            RollForcingCoeff => "Roll forcing coefficient",
            RollDampingCoeff => "Roll damping coefficient",
            PitchDampingCoeff => "Pitch damping coefficient",
            DragCoeff => "Drag coefficient",
            AxialDragCoeff => "Axial drag coefficient",
            FrictionDragCoeff => "Friction drag coefficient",
            PressureDragCoeff => "Pressure drag coefficient",
            BaseDragCoeff => "Base drag coefficient",
            ReferenceLength => "Reference length",
            ReferenceArea => "Reference area",
            WindVelocity => "Wind velocity",
            AirTemperature => "Air temperature",
            AirPressure => "Air pressure",
            SpeedOfSound => "Speed of sound",
            TimeStep => "Simulation time step",
        }
    }

    pub fn unit(&self) -> &'static str {
        use FlightDataType::*;
        match self {
            Time | TimeStep => "s",
            Altitude | PositionEast | PositionNorth | LateralDistance | CgLocation | CpLocation
            | ReferenceLength => "m",
            LateralDirection | Zenith | Azimuth | Aoa => "rad",
            Latitude | Longitude => "deg",
            VelocityZ | VelocityXy | VelocityTotal | WindVelocity | SpeedOfSound => "m/s",
            AccelerationZ | AccelerationXy | AccelerationTotal | Gravity | Coriolis => "m/s^2",
            RollRate | PitchRate | YawRate => "rad/s",
            Mass | MotorMass => "kg",
            LongitudinalInertia | RotationalInertia => "kg*m^2",
            Stability => "cal",
            NormalForceSlope => "1/rad",
            Thrust | Drag => "N",
            ReferenceArea => "m^2",
            AirTemperature => "K",
            AirPressure => "Pa",
            _ => "",
        }
    }
}

impl fmt::Display for FlightDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit() {
            "" => f.write_str(self.name()),
            unit => write!(f, "{} ({})", self.name(), unit),
        }
    }
}

// ---------------------------------------------------------------------------
// Flight data branch
// ---------------------------------------------------------------------------

/// Time series and event log of one physical body (the sustainer or a
/// separated booster). Every channel has one value per data point; values
/// never set for a point are NaN.
#[derive(Debug, Clone, Default)]
pub struct FlightDataBranch {
    name: String,
    len: usize,
    values: BTreeMap<FlightDataType, Vec<f64>>,
    minimum: BTreeMap<FlightDataType, f64>,
    maximum: BTreeMap<FlightDataType, f64>,
    events: Vec<FlightEvent>,
    apogee_altitude: Option<f64>,
    optimum_altitude: Option<f64>,
    time_to_optimum_altitude: Option<f64>,
}

impl FlightDataBranch {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of data points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Start a new data point; every channel gets a NaN slot.
    pub fn add_point(&mut self) {
        self.len += 1;
        for v in self.values.values_mut() {
            v.push(f64::NAN);
        }
    }

    /// Set a channel value of the last data point, creating the channel if needed.
    pub fn set_value(&mut self, kind: FlightDataType, value: f64) {
        if self.len == 0 {
            self.add_point();
        }
        let len = self.len;
        let series = self.values.entry(kind).or_insert_with(|| vec![f64::NAN; len]);
        series[len - 1] = value;
        if value.is_nan() {
            return;
        }
        let min = self.minimum.entry(kind).or_insert(value);
        *min = min.min(value);
        let max = self.maximum.entry(kind).or_insert(value);
        *max = max.max(value);
    }

    pub fn get(&self, kind: FlightDataType) -> Option<&[f64]> {
        self.values.get(&kind).map(|v| v.as_slice())
    }

    /// Channels that hold at least one value, in display order.
    pub fn types(&self) -> impl Iterator<Item = FlightDataType> + '_ {
        self.values.keys().copied()
    }

    /// Value of the last data point, NaN when unset.
    pub fn last(&self, kind: FlightDataType) -> f64 {
        self.values.get(&kind).and_then(|v| v.last().copied()).unwrap_or(f64::NAN)
    }

    pub fn min(&self, kind: FlightDataType) -> Option<f64> {
        self.minimum.get(&kind).copied()
    }

    pub fn max(&self, kind: FlightDataType) -> Option<f64> {
        self.maximum.get(&kind).copied()
    }

    /// Channel value at `time`, linearly interpolated between data points.
    pub fn value_at(&self, kind: FlightDataType, time: f64) -> Option<f64> {
        let times = self.get(FlightDataType::Time)?;
        let values = self.get(kind)?;
        let i = times.partition_point(|&t| t < time);
        if i == 0 {
            return values.first().copied();
        }
        if i >= times.len() {
            return values.last().copied();
        }
        let (t0, t1) = (times[i - 1], times[i]);
        if t1 - t0 <= 0.0 {
            return Some(values[i]);
        }
        let f = (time - t0) / (t1 - t0);
        Some(values[i - 1] + f * (values[i] - values[i - 1]))
    }

    // -- events --

    /// Log an event, keeping the log ordered by time.
    pub fn add_event(&mut self, event: FlightEvent) {
        let at = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(at, event);
    }

    pub fn events(&self) -> &[FlightEvent] {
        &self.events
    }

    pub fn first_event(&self, kind: FlightEventType) -> Option<&FlightEvent> {
        self.events.iter().find(|e| e.kind == kind)
    }

    pub fn last_event(&self, kind: FlightEventType) -> Option<&FlightEvent> {
        self.events.iter().rev().find(|e| e.kind == kind)
    }

    /// Apogee altitude refined inside the step that crossed it.
    pub fn set_apogee_altitude(&mut self, altitude: f64) {
        self.apogee_altitude = Some(altitude);
    }

    /// Altitude and time the rocket would reach with no recovery device out.
    pub fn set_optimum_altitude(&mut self, altitude: f64, time: f64) {
        self.optimum_altitude = Some(altitude);
        self.time_to_optimum_altitude = Some(time);
    }

    // -- summary values --

    pub fn max_altitude(&self) -> f64 {
        let sampled = self.max(FlightDataType::Altitude).unwrap_or(f64::NAN);
        match self.apogee_altitude {
            Some(a) if !(sampled >= a) => a,
            _ => sampled,
        }
    }

    pub fn time_to_apogee(&self) -> f64 {
        if let Some(e) = self.first_event(FlightEventType::Apogee) {
            return e.time;
        }
        let (Some(alt), Some(times)) = (self.get(FlightDataType::Altitude), self.get(FlightDataType::Time)) else {
            return f64::NAN;
        };
        alt.iter()
            .zip(times)
            .filter(|(a, _)| !a.is_nan())
            .fold((f64::NEG_INFINITY, f64::NAN), |acc, (&a, &t)| if a > acc.0 { (a, t) } else { acc })
            .1
    }

    pub fn flight_time(&self) -> f64 {
        match self.first_event(FlightEventType::GroundHit) {
            Some(e) => e.time,
            None => self.last(FlightDataType::Time),
        }
    }

    pub fn ground_hit_velocity(&self) -> f64 {
        self.first_event(FlightEventType::GroundHit)
            .and_then(|e| self.value_at(FlightDataType::VelocityTotal, e.time))
            .unwrap_or(f64::NAN)
    }

    pub fn launch_rod_velocity(&self) -> f64 {
        self.first_event(FlightEventType::LaunchRod)
            .and_then(|e| self.value_at(FlightDataType::VelocityTotal, e.time))
            .unwrap_or(f64::NAN)
    }

    pub fn deployment_velocity(&self) -> f64 {
        self.first_event(FlightEventType::RecoveryDeviceDeployment)
            .and_then(|e| self.value_at(FlightDataType::VelocityTotal, e.time))
            .unwrap_or(f64::NAN)
    }

    /// Ejection delay that would have deployed at apogee, s after the last burnout.
    pub fn optimum_delay(&self) -> f64 {
        match (self.time_to_optimum_altitude, self.last_event(FlightEventType::Burnout)) {
            (Some(t), Some(burnout)) => t - burnout.time,
            _ => f64::NAN,
        }
    }

    pub fn summary(&self) -> BranchSummary {
        let max = |k| self.max(k).unwrap_or(f64::NAN);
        BranchSummary {
            name: self.name.clone(),
            max_altitude: self.max_altitude(),
            time_to_apogee: self.time_to_apogee(),
            max_velocity: max(FlightDataType::VelocityTotal),
            max_acceleration: max(FlightDataType::AccelerationTotal),
            max_mach: max(FlightDataType::Mach),
            flight_time: self.flight_time(),
            ground_hit_velocity: self.ground_hit_velocity(),
            launch_rod_velocity: self.launch_rod_velocity(),
            deployment_velocity: self.deployment_velocity(),
            optimum_altitude: self.optimum_altitude.unwrap_or(f64::NAN),
            optimum_delay: self.optimum_delay(),
        }
    }
}

/// Per-branch summary statistics. NaN marks values that never occurred.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchSummary {
    pub name: String,
    pub max_altitude: f64,        // m
    pub time_to_apogee: f64,      // s
    pub max_velocity: f64,        // m/s
    pub max_acceleration: f64,    // m/s^2
    pub max_mach: f64,
    pub flight_time: f64,         // s
    pub ground_hit_velocity: f64, // m/s
    pub launch_rod_velocity: f64, // m/s
    pub deployment_velocity: f64, // m/s
    pub optimum_altitude: f64,    // m
    pub optimum_delay: f64,       // s
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp() -> FlightDataBranch {
        let mut b = FlightDataBranch::new("test");
        for i in 0..5 {
            b.add_point();
            b.set_value(FlightDataType::Time, i as f64);
            b.set_value(FlightDataType::Altitude, (i * 10) as f64);
        }
        b
    }

    #[test]
    fn late_channels_are_backfilled_with_nan() {
        let mut b = ramp();
        b.set_value(FlightDataType::Mach, 0.4);
        let mach = b.get(FlightDataType::Mach).unwrap();
        assert_eq!(mach.len(), 5);
        assert!(mach[0].is_nan() && mach[3].is_nan());
        assert_eq!(mach[4], 0.4);
        b.add_point();
        assert!(b.last(FlightDataType::Mach).is_nan());
        assert_eq!(b.get(FlightDataType::Altitude).unwrap().len(), 6);
    }

    #[test]
    fn min_max_ignore_nan() {
        let mut b = ramp();
        b.add_point();
        b.set_value(FlightDataType::Altitude, f64::NAN);
        assert_eq!(b.max(FlightDataType::Altitude), Some(40.0));
        assert_eq!(b.min(FlightDataType::Altitude), Some(0.0));
        assert_eq!(b.max(FlightDataType::Mach), None);
    }

    #[test]
    fn interpolates_between_points() {
        let b = ramp();
        assert_abs_diff_eq!(b.value_at(FlightDataType::Altitude, 2.5).unwrap(), 25.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b.value_at(FlightDataType::Altitude, 9.0).unwrap(), 40.0, epsilon = 1e-12);
    }

    #[test]
    fn events_stay_time_ordered() {
        let mut b = FlightDataBranch::new("e");
        b.add_event(FlightEvent::new(2.0, FlightEventType::GroundHit));
        b.add_event(FlightEvent::new(1.0, FlightEventType::Apogee));
        b.add_event(FlightEvent::new(2.0, FlightEventType::SimulationEnd));
        let kinds: Vec<_> = b.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![FlightEventType::Apogee, FlightEventType::GroundHit, FlightEventType::SimulationEnd]
        );
    }

    #[test]
    fn summary_uses_events_and_refined_apogee() {
        let mut b = ramp();
        b.add_event(FlightEvent::new(0.5, FlightEventType::Burnout));
        b.add_event(FlightEvent::new(3.7, FlightEventType::Apogee));
        b.set_apogee_altitude(41.5);
        b.set_optimum_altitude(41.5, 3.7);
        let s = b.summary();
        assert_abs_diff_eq!(s.max_altitude, 41.5, epsilon = 1e-12);
        assert_abs_diff_eq!(s.time_to_apogee, 3.7, epsilon = 1e-12);
        assert_abs_diff_eq!(s.optimum_delay, 3.2, epsilon = 1e-12);
        assert!(s.ground_hit_velocity.is_nan());
        assert_abs_diff_eq!(s.flight_time, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn headers_carry_units() {
        assert_eq!(FlightDataType::Altitude.to_string(), "Altitude (m)");
        assert_eq!(FlightDataType::Mach.to_string(), "Mach number");
    }
}
