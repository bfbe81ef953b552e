use std::fmt::Debug;
use std::sync::OnceLock;

use tracing::debug;

use crate::dynamics::state::G0;
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Atmospheric conditions at a single altitude
// ---------------------------------------------------------------------------

/// Specific gas constant for dry air, J/(kg·K).
pub const R_AIR: f64 = 287.053;

pub const STANDARD_TEMPERATURE: f64 = 288.15; // K
pub const STANDARD_PRESSURE: f64 = 101_325.0; // Pa

/// Temperature/pressure pair. Both are strictly positive; everything else is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphericConditions {
    temperature: f64, // K
    pressure: f64,    // Pa
}

impl AtmosphericConditions {
    pub fn new(temperature: f64, pressure: f64) -> Result<Self, ConfigError> {
        if !(temperature > 0.0) {
            return Err(ConfigError::NonPositiveTemperature(temperature));
        }
        if !(pressure > 0.0) {
            return Err(ConfigError::NonPositivePressure(pressure));
        }
        Ok(Self { temperature, pressure })
    }

    /// ISA sea-level conditions.
    pub fn standard() -> Self {
        Self { temperature: STANDARD_TEMPERATURE, pressure: STANDARD_PRESSURE }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    /// kg/m^3
    pub fn density(&self) -> f64 {
        self.pressure / (R_AIR * self.temperature)
    }

    /// Linear approximation in Kelvin, m/s.
    pub fn speed_of_sound(&self) -> f64 {
        165.77 + 0.606 * self.temperature
    }

    /// m^2/s
    pub fn kinematic_viscosity(&self) -> f64 {
        let dynamic = 3.7291e-06 + 4.9944e-08 * self.temperature;
        dynamic / self.density()
    }

    /// Component-wise linear blend. `fraction` in [0, 1] keeps both fields positive.
    fn blend(&self, other: &Self, fraction: f64) -> Self {
        Self {
            temperature: self.temperature + (other.temperature - self.temperature) * fraction,
            pressure: self.pressure + (other.pressure - self.pressure) * fraction,
        }
    }
}

impl Default for AtmosphericConditions {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Model trait
// ---------------------------------------------------------------------------

/// Altitude → conditions. Implementations are pure and safe to share between threads.
pub trait AtmosphericModel: Send + Sync + Debug {
    fn conditions(&self, altitude: f64) -> AtmosphericConditions;

    /// Lowest altitude the model distinguishes; queries below return this altitude's values.
    fn min_altitude(&self) -> f64 {
        0.0
    }

    /// Highest altitude the model distinguishes.
    fn max_altitude(&self) -> f64 {
        LAYER_ALTITUDE[LAYER_ALTITUDE.len() - 1]
    }
}

/// Same conditions at every altitude.
#[derive(Debug, Clone, Copy)]
pub struct ConstantAtmosphere {
    conditions: AtmosphericConditions,
}

impl ConstantAtmosphere {
    pub fn new(temperature: f64, pressure: f64) -> Result<Self, ConfigError> {
        Ok(Self { conditions: AtmosphericConditions::new(temperature, pressure)? })
    }
}

impl AtmosphericModel for ConstantAtmosphere {
    fn conditions(&self, _altitude: f64) -> AtmosphericConditions {
        self.conditions
    }
}

// ---------------------------------------------------------------------------
// Extended ISA: 8 layers, optional custom launch site
// ---------------------------------------------------------------------------

const LAYER_ALTITUDE: [f64; 8] = [
    0.0, 11_000.0, 20_000.0, 32_000.0, 47_000.0, 51_000.0, 71_000.0, 84_852.0,
];
const LAYER_TEMPERATURE: [f64; 8] = [
    288.15, 216.65, 216.65, 228.65, 270.65, 270.65, 214.65, 186.95,
];

/// Lapse rates below this are treated as isothermal, K/m.
const ISOTHERMAL_RATE: f64 = 0.001;

/// Layered ISA model. The lowest layer can be re-anchored at a launch site's
/// measured temperature and pressure; its lapse rate is then chosen so the
/// profile still meets the standard tropopause at 11 km.
///
/// Below the lowest layer the lowest-layer lapse rate is extrapolated down to
/// `min(0, launch altitude)`; queries under that floor or above 84 852 m are
/// clamped.
#[derive(Debug, Clone)]
pub struct ExtendedIsaModel {
    altitude: [f64; 8],
    temperature: [f64; 8],
    pressure: [f64; 8], // derived at construction
    floor: f64,
}

impl ExtendedIsaModel {
    pub fn standard() -> Self {
        Self::build(LAYER_ALTITUDE[0], LAYER_TEMPERATURE[0], STANDARD_PRESSURE)
    }

    /// Sea-level launch site with custom conditions.
    pub fn with_sea_level(temperature: f64, pressure: f64) -> Result<Self, ConfigError> {
        Self::with_launch_site(0.0, temperature, pressure)
    }

    pub fn with_launch_site(
        altitude: f64,
        temperature: f64,
        pressure: f64,
    ) -> Result<Self, ConfigError> {
        AtmosphericConditions::new(temperature, pressure)?;
        if !(altitude < LAYER_ALTITUDE[1]) {
            return Err(ConfigError::LaunchAltitudeOutOfRange {
                altitude,
                limit: LAYER_ALTITUDE[1],
            });
        }
        Ok(Self::build(altitude, temperature, pressure))
    }

    fn build(altitude0: f64, temperature0: f64, pressure0: f64) -> Self {
        let mut altitude = LAYER_ALTITUDE;
        let mut temperature = LAYER_TEMPERATURE;
        altitude[0] = altitude0;
        temperature[0] = temperature0;

        let mut pressure = [0.0; 8];
        pressure[0] = pressure0;
        for i in 1..altitude.len() {
            let dh = altitude[i] - altitude[i - 1];
            let rate = (temperature[i] - temperature[i - 1]) / dh;
            pressure[i] = layer_pressure(pressure[i - 1], temperature[i - 1], rate, dh);
        }

        Self { altitude, temperature, pressure, floor: altitude0.min(0.0) }
    }

    fn lapse_rate(&self, layer: usize) -> f64 {
        if layer + 1 >= self.altitude.len() {
            return 0.0;
        }
        (self.temperature[layer + 1] - self.temperature[layer])
            / (self.altitude[layer + 1] - self.altitude[layer])
    }
}

impl Default for ExtendedIsaModel {
    fn default() -> Self {
        Self::standard()
    }
}

impl AtmosphericModel for ExtendedIsaModel {
    fn conditions(&self, altitude: f64) -> AtmosphericConditions {
        let top = self.altitude[self.altitude.len() - 1];
        let h = altitude.clamp(self.floor, top);

        let layer = self.altitude.iter().rposition(|&a| h >= a).unwrap_or(0);
        let rate = self.lapse_rate(layer);
        let dh = h - self.altitude[layer];

        let t0 = self.temperature[layer];
        AtmosphericConditions {
            temperature: t0 + rate * dh,
            pressure: layer_pressure(self.pressure[layer], t0, rate, dh),
        }
    }

    fn min_altitude(&self) -> f64 {
        self.floor
    }

    fn max_altitude(&self) -> f64 {
        self.altitude[self.altitude.len() - 1]
    }
}

/// Barometric formula: exponential for isothermal layers, power law otherwise.
fn layer_pressure(p0: f64, t0: f64, rate: f64, dh: f64) -> f64 {
    if rate.abs() < ISOTHERMAL_RATE {
        p0 * (-dh * G0 / (R_AIR * t0)).exp()
    } else {
        p0 * (1.0 + dh * rate / t0).powf(-G0 / (rate * R_AIR))
    }
}

// ---------------------------------------------------------------------------
// Interpolating cache decorator
// ---------------------------------------------------------------------------

pub const DEFAULT_INTERPOLATION_STEP: f64 = 500.0; // m

/// Samples the wrapped model on a fixed altitude grid on first use and answers
/// every query by linear interpolation between the two bracketing samples.
///
/// The table is built exactly once even under concurrent first access; later
/// reads are lock-free.
#[derive(Debug)]
pub struct InterpolatingAtmosphere<M> {
    model: M,
    step: f64,
    table: OnceLock<Vec<AtmosphericConditions>>,
}

impl<M: AtmosphericModel> InterpolatingAtmosphere<M> {
    pub fn new(model: M) -> Self {
        Self::with_step(model, DEFAULT_INTERPOLATION_STEP)
    }

    pub fn with_step(model: M, step: f64) -> Self {
        let step = if step > 0.0 { step } else { DEFAULT_INTERPOLATION_STEP };
        Self { model, step, table: OnceLock::new() }
    }

    pub fn inner(&self) -> &M {
        &self.model
    }

    fn table(&self) -> &[AtmosphericConditions] {
        self.table.get_or_init(|| {
            let floor = self.model.min_altitude();
            let span = (self.model.max_altitude() - floor).max(0.0);
            let count = (span / self.step).ceil() as usize + 1;
            debug!(samples = count, step = self.step, "building atmosphere interpolation table");
            (0..count)
                .map(|i| self.model.conditions(floor + i as f64 * self.step))
                .collect()
        })
    }
}

impl<M: AtmosphericModel> AtmosphericModel for InterpolatingAtmosphere<M> {
    fn conditions(&self, altitude: f64) -> AtmosphericConditions {
        let table = self.table();
        let position = (altitude - self.model.min_altitude()) / self.step;
        if !(position > 0.0) {
            return table[0];
        }
        let index = position.floor() as usize;
        if index + 1 >= table.len() {
            return table[table.len() - 1];
        }
        table[index].blend(&table[index + 1], position - index as f64)
    }

    fn min_altitude(&self) -> f64 {
        self.model.min_altitude()
    }

    fn max_altitude(&self) -> f64 {
        self.model.max_altitude()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::sync::Arc;

    #[test]
    fn density_follows_ideal_gas() {
        for &(t, p) in &[(288.15, 101_325.0), (200.0, 5_000.0), (320.0, 120_000.0)] {
            let c = AtmosphericConditions::new(t, p).unwrap();
            assert_relative_eq!(c.density(), p / (R_AIR * t), max_relative = 1e-12);
        }
    }

    #[test]
    fn rejects_non_positive_inputs() {
        assert!(AtmosphericConditions::new(0.0, 1.0).is_err());
        assert!(AtmosphericConditions::new(300.0, -5.0).is_err());
        assert!(ConstantAtmosphere::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn standard_sea_level_and_below() {
        let model = ExtendedIsaModel::standard();
        for alt in [0.0, -1.0, -100.0] {
            let c = model.conditions(alt);
            assert_abs_diff_eq!(c.temperature(), 288.15, epsilon = 0.01);
            assert_abs_diff_eq!(c.pressure(), 101_325.0, epsilon = 0.01);
        }
    }

    #[test]
    fn custom_sea_level() {
        let model = ExtendedIsaModel::with_sea_level(278.15, 100_000.0).unwrap();
        let c = model.conditions(0.0);
        assert_abs_diff_eq!(c.temperature(), 278.15, epsilon = 0.01);
        assert_abs_diff_eq!(c.pressure(), 100_000.0, epsilon = 0.01);
    }

    #[test]
    fn troposphere_is_monotonic() {
        let model = ExtendedIsaModel::standard();
        let mut prev = model.conditions(0.0);
        for i in 1..=110 {
            let c = model.conditions(i as f64 * 100.0);
            assert!(c.temperature() <= prev.temperature());
            assert!(c.pressure() < prev.pressure());
            prev = c;
        }
    }

    #[test]
    fn continuous_across_layer_boundaries() {
        let model = ExtendedIsaModel::standard();
        for &b in &LAYER_ALTITUDE[1..7] {
            let below = model.conditions(b - 1e-6);
            let above = model.conditions(b + 1e-6);
            assert_abs_diff_eq!(below.temperature(), above.temperature(), epsilon = 1e-4);
            assert!((below.pressure() - above.pressure()).abs() / below.pressure() < 1e-6);
        }
    }

    #[test]
    fn high_altitude_stays_positive() {
        let model = ExtendedIsaModel::standard();
        for alt in [80_000.0, 84_852.0, 200_000.0] {
            let c = model.conditions(alt);
            assert!(c.temperature() > 0.0 && c.pressure() > 0.0);
        }
    }

    #[test]
    fn launch_site_exact_at_launch_altitude() {
        let model = ExtendedIsaModel::with_launch_site(1000.0, 281.15, 89_876.0).unwrap();
        let c = model.conditions(1000.0);
        assert_abs_diff_eq!(c.temperature(), 281.15, epsilon = 0.01);
        assert_abs_diff_eq!(c.pressure(), 89_876.0, epsilon = 0.01);
    }

    #[test]
    fn launch_site_extrapolates_to_sea_level() {
        let model = ExtendedIsaModel::with_launch_site(1000.0, 281.15, 89_876.0).unwrap();
        let c500 = model.conditions(500.0);
        let c0 = model.conditions(0.0);
        assert_abs_diff_eq!(c500.temperature(), 284.375, epsilon = 0.01);
        assert_abs_diff_eq!(c500.pressure(), 95_472.8, epsilon = 0.01);
        assert_abs_diff_eq!(c0.temperature(), 287.6, epsilon = 0.01);
        assert_abs_diff_eq!(c0.pressure(), 101_349.04, epsilon = 0.01);

        // clamped under the floor
        let below = model.conditions(-500.0);
        assert_eq!(below, c0);
    }

    #[test]
    fn launch_site_decreases_above() {
        let model = ExtendedIsaModel::with_launch_site(1000.0, 281.15, 89_876.0).unwrap();
        let c2 = model.conditions(2000.0);
        let c3 = model.conditions(3000.0);
        assert!(c2.temperature() < 281.15 && c2.pressure() < 89_876.0);
        assert!(c3.temperature() < c2.temperature() && c3.pressure() < c2.pressure());
    }

    #[test]
    fn launch_site_between_grid_points() {
        let model = ExtendedIsaModel::with_launch_site(2750.0, 271.15, 72_500.0).unwrap();
        assert_abs_diff_eq!(model.conditions(2750.0).pressure(), 72_500.0, epsilon = 50.0);
        let mut prev = model.conditions(2600.0);
        let mut alt = 2600.0;
        while alt < 2900.0 {
            alt += 10.0;
            let c = model.conditions(alt);
            assert!(c.pressure() < prev.pressure());
            assert!(c.temperature() <= prev.temperature());
            prev = c;
        }
    }

    #[test]
    fn launch_site_validation() {
        assert!(ExtendedIsaModel::with_launch_site(-100.0, 288.15, 101_325.0).is_ok());
        assert!(ExtendedIsaModel::with_launch_site(1000.0, 288.15, 0.0).is_err());
        assert!(ExtendedIsaModel::with_launch_site(1000.0, -5.0, 90_000.0).is_err());
        assert!(matches!(
            ExtendedIsaModel::with_launch_site(12_000.0, 220.0, 20_000.0),
            Err(ConfigError::LaunchAltitudeOutOfRange { .. })
        ));
        assert!(ExtendedIsaModel::with_launch_site(11_000.0, 220.0, 20_000.0).is_err());
    }

    #[test]
    fn interpolation_stays_between_grid_samples() {
        let exact = ExtendedIsaModel::standard();
        let interp = InterpolatingAtmosphere::new(ExtendedIsaModel::standard());
        let mut alt = 13.0;
        while alt < 84_000.0 {
            let lo = (alt / DEFAULT_INTERPOLATION_STEP).floor() * DEFAULT_INTERPOLATION_STEP;
            let a = exact.conditions(lo);
            let b = exact.conditions(lo + DEFAULT_INTERPOLATION_STEP);
            let c = interp.conditions(alt);
            let (tmin, tmax) = (a.temperature().min(b.temperature()), a.temperature().max(b.temperature()));
            let (pmin, pmax) = (a.pressure().min(b.pressure()), a.pressure().max(b.pressure()));
            assert!(c.temperature() >= tmin - 1e-9 && c.temperature() <= tmax + 1e-9, "T at {}", alt);
            assert!(c.pressure() >= pmin - 1e-9 && c.pressure() <= pmax + 1e-9, "P at {}", alt);
            alt += 737.0;
        }
    }

    #[test]
    fn interpolation_is_close_to_exact() {
        let exact = ExtendedIsaModel::standard();
        let interp = InterpolatingAtmosphere::new(ExtendedIsaModel::standard());
        for alt in [0.0, 250.0, 3333.0, 10_999.0, 25_100.0] {
            let e = exact.conditions(alt);
            let i = interp.conditions(alt);
            assert!((e.pressure() - i.pressure()).abs() / e.pressure() < 1e-3);
            assert_abs_diff_eq!(e.temperature(), i.temperature(), epsilon = 0.01);
        }
        // clamped at both ends
        assert_eq!(interp.conditions(-50.0), interp.conditions(0.0));
        assert_eq!(interp.conditions(1.0e6), interp.conditions(2.0e6));
    }

    #[test]
    fn concurrent_first_use() {
        let interp = Arc::new(InterpolatingAtmosphere::new(ExtendedIsaModel::standard()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let m = Arc::clone(&interp);
                std::thread::spawn(move || m.conditions(1000.0 * i as f64).pressure())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap() > 0.0);
        }
    }
}
