use nalgebra::{DMatrix, DVector};

// ---------------------------------------------------------------------------
// Polynomial fit through value/derivative constraints
// ---------------------------------------------------------------------------

/// Fits the unique polynomial matching a set of value and derivative
/// constraints. `constraints[k]` lists the x positions at which the k-th
/// derivative is prescribed; the polynomial degree is one less than the total
/// number of constraints.
///
/// The constraint matrix is inverted once, so repeated fits with different
/// right-hand sides are a single matrix-vector product.
#[derive(Debug, Clone)]
pub struct PolyInterpolator {
    inverse: DMatrix<f64>,
    count: usize,
}

impl PolyInterpolator {
    pub fn new(constraints: &[&[f64]]) -> Self {
        let count: usize = constraints.iter().map(|c| c.len()).sum();
        let mut matrix = DMatrix::<f64>::zeros(count, count);

        let mut row = 0;
        for (order, xs) in constraints.iter().enumerate() {
            for &x in xs.iter() {
                for power in order..count {
                    // d^order/dx^order of x^power
                    let mut factor = 1.0;
                    for j in 0..order {
                        factor *= (power - j) as f64;
                    }
                    matrix[(row, power)] = factor * x.powi((power - order) as i32);
                }
                row += 1;
            }
        }

        // Degenerate constraint sets produce the zero polynomial.
        let inverse = matrix
            .try_inverse()
            .unwrap_or_else(|| DMatrix::zeros(count, count));
        Self { inverse, count }
    }

    /// Coefficients (ascending powers) for the given constraint values, listed
    /// in the same order the constraint positions were given.
    pub fn interpolator(&self, values: &[f64]) -> Vec<f64> {
        let mut rhs = DVector::<f64>::zeros(self.count);
        for (i, v) in values.iter().take(self.count).enumerate() {
            rhs[i] = *v;
        }
        (&self.inverse * rhs).iter().copied().collect()
    }

    /// Horner evaluation of ascending-power coefficients.
    pub fn eval(x: f64, coefficients: &[f64]) -> f64 {
        coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }
}
