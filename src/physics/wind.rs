use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

// ---------------------------------------------------------------------------
// Wind models
// ---------------------------------------------------------------------------

/// Air velocity (launch frame, m/s) as a function of time and altitude.
/// Models carry their own turbulence state, so each run owns its copy.
#[derive(Debug, Clone)]
pub enum WindModel {
    Constant(Vector3<f64>),
    PinkNoise(PinkNoiseWind),
}

impl WindModel {
    pub fn calm() -> Self {
        WindModel::Constant(Vector3::zeros())
    }

    pub fn wind_velocity(&mut self, time: f64, altitude: f64) -> Vector3<f64> {
        match self {
            WindModel::Constant(v) => *v,
            WindModel::PinkNoise(model) => model.wind_velocity(time, altitude),
        }
    }
}

/// Horizontal air velocity for a wind blowing *from* `direction` (rad, clockwise from north).
pub fn wind_from(direction: f64, speed: f64) -> Vector3<f64> {
    -Vector3::new(direction.sin(), direction.cos(), 0.0) * speed
}

// ---------------------------------------------------------------------------
// Pink-noise turbulence
// ---------------------------------------------------------------------------

const ALPHA: f64 = 5.0 / 3.0;
const POLES: usize = 2;
/// Empirical standard deviation of the unscaled generator output.
const GENERATOR_STDDEV: f64 = 2.252;
const DELTA_T: f64 = 0.05; // s

/// 1/f^alpha noise from a small autoregressive filter over Gaussian samples.
#[derive(Debug, Clone)]
struct PinkNoise {
    rng: StdRng,
    multipliers: [f64; POLES],
    history: [f64; POLES],
}

impl PinkNoise {
    fn new(seed: u64) -> Self {
        let mut multipliers = [0.0; POLES];
        let mut a = 1.0;
        for (i, m) in multipliers.iter_mut().enumerate() {
            a = (i as f64 - ALPHA / 2.0) * a / (i as f64 + 1.0);
            *m = a;
        }
        let mut noise = Self { rng: StdRng::seed_from_u64(seed), multipliers, history: [0.0; POLES] };
        for _ in 0..5 * POLES {
            noise.next_value();
        }
        noise
    }

    fn next_value(&mut self) -> f64 {
        let mut x: f64 = StandardNormal.sample(&mut self.rng);
        for (m, h) in self.multipliers.iter().zip(&self.history) {
            x -= m * h;
        }
        self.history.rotate_right(1);
        self.history[0] = x;
        x
    }
}

/// Average wind plus pink-noise gusts, sampled every 50 ms and linearly interpolated.
#[derive(Debug, Clone)]
pub struct PinkNoiseWind {
    average: f64,    // m/s
    std_dev: f64,    // m/s
    direction: f64,  // rad, wind source bearing
    generator: PinkNoise,
    time1: f64,
    value1: f64,
    value2: f64,
}

impl PinkNoiseWind {
    pub fn new(average: f64, std_dev: f64, direction: f64, seed: u64) -> Self {
        let mut generator = PinkNoise::new(seed);
        let value1 = generator.next_value();
        let value2 = generator.next_value();
        Self {
            average: average.max(0.0),
            std_dev: std_dev.max(0.0),
            direction,
            generator,
            time1: 0.0,
            value1,
            value2,
        }
    }

    pub fn wind_velocity(&mut self, time: f64, _altitude: f64) -> Vector3<f64> {
        if self.average == 0.0 && self.std_dev == 0.0 {
            return Vector3::zeros();
        }
        while self.time1 + DELTA_T < time {
            self.value1 = self.value2;
            self.value2 = self.generator.next_value();
            self.time1 += DELTA_T;
        }
        let a = ((time - self.time1) / DELTA_T).clamp(0.0, 1.0);
        let noise = self.value1 * (1.0 - a) + self.value2 * a;
        let speed = self.average + noise * self.std_dev / GENERATOR_STDDEV;
        wind_from(self.direction, speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn north_wind_blows_south() {
        let v = wind_from(0.0, 5.0);
        assert!(v.y < -4.999 && v.x.abs() < 1e-12);
    }

    #[test]
    fn pink_noise_is_deterministic_per_seed() {
        let mut a = PinkNoiseWind::new(4.0, 1.0, 0.3, 42);
        let mut b = PinkNoiseWind::new(4.0, 1.0, 0.3, 42);
        for i in 0..200 {
            let t = i as f64 * 0.037;
            assert_eq!(a.wind_velocity(t, 0.0), b.wind_velocity(t, 0.0));
        }
    }

    #[test]
    fn pink_noise_mean_near_average() {
        let mut w = PinkNoiseWind::new(5.0, 1.0, 0.0, 7);
        let n = 20_000;
        let mean: f64 = (0..n).map(|i| w.wind_velocity(i as f64 * 0.05, 0.0).norm()).sum::<f64>()
            / n as f64;
        assert!((mean - 5.0).abs() < 1.0, "mean wind {}", mean);
    }

    #[test]
    fn calm_pink_noise_is_zero() {
        let mut w = WindModel::PinkNoise(PinkNoiseWind::new(0.0, 0.0, 1.0, 1));
        assert_eq!(w.wind_velocity(3.0, 100.0), Vector3::zeros());
    }
}
