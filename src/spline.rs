//! Natural cubic spline interpolation.
//!
//! Used by the aligner to resample one channel's irregularly-timestamped
//! samples onto the uniform grid. The curve passes through every knot
//! exactly; second derivatives at the end knots are zero.

/// An interpolating cubic spline through a set of `(x, y)` knots.
///
/// Construction solves the tridiagonal system for the knot second
/// derivatives once; evaluation is a binary search plus the cubic formula.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative of the spline at each knot
    d2: Vec<f64>,
}

impl CubicSpline {
    /// Minimum number of knots accepted.
    pub const MIN_POINTS: usize = 4;

    /// Fits a natural cubic spline through the given knots.
    ///
    /// `xs` must be strictly increasing and at least [`Self::MIN_POINTS`]
    /// long; callers are expected to have validated both. Returns `None` if
    /// the preconditions do not hold.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<CubicSpline> {
        let n = xs.len();
        if n < Self::MIN_POINTS || ys.len() != n {
            return None;
        }
        if xs.windows(2).any(|p| p[1] <= p[0]) {
            return None;
        }

        // Thomas algorithm on the tridiagonal system for interior second
        // derivatives; natural boundary: d2[0] = d2[n-1] = 0.
        let mut sub = vec![0.0; n];
        let mut diag = vec![0.0; n];
        let mut sup = vec![0.0; n];
        let mut rhs = vec![0.0; n];
        for i in 1..n - 1 {
            let h0 = xs[i] - xs[i - 1];
            let h1 = xs[i + 1] - xs[i];
            sub[i] = h0;
            diag[i] = 2.0 * (h0 + h1);
            sup[i] = h1;
            rhs[i] = 6.0 * ((ys[i + 1] - ys[i]) / h1 - (ys[i] - ys[i - 1]) / h0);
        }

        let mut d2 = vec![0.0; n];
        if n > 2 {
            // Forward sweep over rows 1..n-1.
            for i in 2..n - 1 {
                let w = sub[i] / diag[i - 1];
                diag[i] -= w * sup[i - 1];
                rhs[i] -= w * rhs[i - 1];
            }
            d2[n - 2] = rhs[n - 2] / diag[n - 2];
            for i in (1..n - 2).rev() {
                d2[i] = (rhs[i] - sup[i] * d2[i + 1]) / diag[i];
            }
        }

        Some(CubicSpline {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            d2,
        })
    }

    /// Evaluates the spline at `x`.
    ///
    /// `x` outside the knot span is clamped to the nearest end knot's
    /// interval; the aligner never asks for extrapolation because the grid
    /// is confined to the channels' common window.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        // Index of the interval [xs[i], xs[i+1]] containing x.
        let i = match self.xs.partition_point(|&knot| knot <= x) {
            0 => 0,
            p if p >= n => n - 2,
            p => p - 1,
        };

        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - x) / h;
        let b = (x - self.xs[i]) / h;
        a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a * a * a - a) * self.d2[i] + (b * b * b - b) * self.d2[i + 1]) * (h * h) / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn passes_through_knots() {
        let xs = [0.0, 1.0, 2.5, 3.0, 4.2, 5.0];
        let ys = [1.0, -2.0, 0.5, 3.0, 3.0, -1.0];
        let spline = CubicSpline::fit(&xs, &ys).unwrap();
        for (&x, &y) in xs.iter().zip(&ys) {
            assert_relative_eq!(spline.eval(x), y, epsilon = 1e-9);
        }
    }

    #[test]
    fn reproduces_linear_data_exactly() {
        // Any cubic spline interpolant of a straight line is that line,
        // independent of boundary conditions.
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 3.0 * x - 7.0).collect();
        let spline = CubicSpline::fit(&xs, &ys).unwrap();
        for k in 0..100 {
            let x = 0.019 * k as f64;
            assert_relative_eq!(spline.eval(x), 3.0 * x - 7.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn too_few_knots_is_rejected() {
        assert!(CubicSpline::fit(&[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn non_increasing_knots_are_rejected() {
        assert!(CubicSpline::fit(&[0.0, 1.0, 1.0, 2.0], &[0.0; 4]).is_none());
    }
}
