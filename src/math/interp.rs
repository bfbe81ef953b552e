// ---------------------------------------------------------------------------
// Piecewise-linear interpolation over a sorted point table
// ---------------------------------------------------------------------------

/// Piecewise-linear interpolator. Values outside the tabulated range are
/// clamped to the first/last point.
#[derive(Debug, Clone, Default)]
pub struct LinearInterpolator {
    points: Vec<(f64, f64)>, // sorted by x, unique x
}

impl LinearInterpolator {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Build from paired x / y slices. Extra elements of the longer slice are ignored.
    pub fn from_points(xs: &[f64], ys: &[f64]) -> Self {
        let mut interp = Self::new();
        for (&x, &y) in xs.iter().zip(ys) {
            interp.add_point(x, y);
        }
        interp
    }

    /// Insert a point, replacing any existing point at the same x.
    pub fn add_point(&mut self, x: f64, y: f64) {
        match self.points.binary_search_by(|p| p.0.total_cmp(&x)) {
            Ok(i) => self.points[i].1 = y,
            Err(i) => self.points.insert(i, (x, y)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn x_points(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.0).collect()
    }

    pub fn min_x(&self) -> Option<f64> {
        self.points.first().map(|p| p.0)
    }

    pub fn value(&self, x: f64) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return f64::NAN,
        };
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }
        // first index with p.x > x; guaranteed in 1..len
        let hi = self.points.partition_point(|p| p.0 <= x);
        let (x0, y0) = self.points[hi - 1];
        let (x1, y1) = self.points[hi];
        y0 + (x - x0) / (x1 - x0) * (y1 - y0)
    }
}
