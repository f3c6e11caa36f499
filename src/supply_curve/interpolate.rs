//! One-dimensional interpolation over sampled curves.
use anyhow::{Result, ensure};

/// Linearly interpolate `ys` at `x`, returning `fill` outside the range of `xs`.
///
/// `xs` must be sorted in ascending order and have the same length as `ys`.
pub fn linear(xs: &[f64], ys: &[f64], x: f64, fill: f64) -> f64 {
    assert_eq!(xs.len(), ys.len());
    let (Some(&first), Some(&last)) = (xs.first(), xs.last()) else {
        return fill;
    };
    if x < first || x > last {
        return fill;
    }

    // Index of the first sample strictly above x
    let upper = xs.partition_point(|&value| value <= x);
    if upper == 0 {
        return ys[0];
    }
    if upper == xs.len() {
        return ys[xs.len() - 1];
    }

    let lower = upper - 1;
    let span = xs[upper] - xs[lower];
    if span == 0.0 {
        return ys[upper];
    }
    ys[lower] + (x - xs[lower]) * (ys[upper] - ys[lower]) / span
}

/// A piecewise cubic Hermite interpolator which preserves monotonicity (PCHIP).
///
/// Derivatives are chosen with the Fritsch-Carlson weighted harmonic mean and a three-point
/// one-sided scheme at the ends. Values outside the sample range are extrapolated with the end
/// polynomials.
#[derive(Debug, Clone, PartialEq)]
pub struct Pchip {
    xs: Vec<f64>,
    ys: Vec<f64>,
    derivatives: Vec<f64>,
}

impl Pchip {
    /// Fit an interpolator to the given samples.
    ///
    /// `xs` must be strictly increasing and at least one sample is required.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        ensure!(
            xs.len() == ys.len(),
            "Sample sizes do not match ({} x values, {} y values)",
            xs.len(),
            ys.len()
        );
        ensure!(!xs.is_empty(), "At least one sample is required");
        ensure!(
            xs.iter().all(|x| x.is_finite()) && ys.iter().all(|y| y.is_finite()),
            "Samples must be finite"
        );
        ensure!(
            xs.windows(2).all(|pair| pair[0] < pair[1]),
            "x values must be strictly increasing"
        );

        let derivatives = derivatives(&xs, &ys);
        Ok(Self {
            xs,
            ys,
            derivatives,
        })
    }

    /// Evaluate the interpolant at `x`
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if n == 1 {
            return self.ys[0];
        }

        let k = self.xs.partition_point(|&value| value <= x).clamp(1, n - 1) - 1;
        let h = self.xs[k + 1] - self.xs[k];
        let s = (x - self.xs[k]) / h;
        let s2 = s * s;
        let s3 = s2 * s;

        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        h00 * self.ys[k]
            + h10 * h * self.derivatives[k]
            + h01 * self.ys[k + 1]
            + h11 * h * self.derivatives[k + 1]
    }

    /// Evaluate the interpolant at each of `xs`
    pub fn evaluate_all(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.evaluate(x)).collect()
    }
}

/// -1, 0 or 1 according to the sign of `value`
fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// Derivatives at each sample
fn derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    if n == 1 {
        return vec![0.0];
    }

    let h: Vec<f64> = xs.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let m: Vec<f64> = ys
        .windows(2)
        .zip(&h)
        .map(|(pair, h)| (pair[1] - pair[0]) / h)
        .collect();

    if n == 2 {
        return vec![m[0], m[0]];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        let (m_left, m_right) = (m[k - 1], m[k]);
        if sign(m_left) != sign(m_right) || m_left == 0.0 || m_right == 0.0 {
            continue;
        }
        let w1 = 2.0 * h[k] + h[k - 1];
        let w2 = h[k] + 2.0 * h[k - 1];
        d[k] = (w1 + w2) / (w1 / m_left + w2 / m_right);
    }
    d[0] = end_derivative(h[0], h[1], m[0], m[1]);
    d[n - 1] = end_derivative(h[n - 2], h[n - 3], m[n - 2], m[n - 3]);

    d
}

/// One-sided three-point derivative at an end, limited to preserve shape
fn end_derivative(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if sign(d) != sign(m0) {
        0.0
    } else if sign(m0) != sign(m1) && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(0.5, 1.0)]
    #[case(1.5, 2.5)]
    #[case(2.0, 3.0)]
    #[case(-1.0, 9.0)] // below range
    #[case(2.5, 9.0)] // above range
    fn test_linear(#[case] x: f64, #[case] expected: f64) {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 2.0, 3.0];
        assert_approx_eq!(f64, linear(&xs, &ys, x, 9.0), expected);
    }

    #[test]
    fn test_linear_single_point() {
        assert_approx_eq!(f64, linear(&[1.0], &[4.0], 1.0, 4.0), 4.0);
        assert_approx_eq!(f64, linear(&[1.0], &[4.0], 3.0, 4.0), 4.0);
    }

    #[test]
    fn test_pchip_passes_through_samples() {
        let xs = vec![0.0, 1.0, 3.0, 4.0, 7.0];
        let ys = vec![0.0, 0.5, 0.6, 2.0, 5.0];
        let pchip = Pchip::new(xs.clone(), ys.clone()).unwrap();
        for (x, y) in xs.iter().zip(&ys) {
            assert_approx_eq!(f64, pchip.evaluate(*x), *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pchip_is_monotone() {
        let pchip = Pchip::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 0.0, 1.0, 10.0]).unwrap();
        let mut previous = f64::NEG_INFINITY;
        for i in 0..=300 {
            let value = pchip.evaluate(f64::from(i) / 100.0);
            assert!(value >= previous - 1e-12);
            previous = value;
        }
        // Flat segment stays flat
        assert_approx_eq!(f64, pchip.evaluate(0.5), 0.0);
    }

    #[test]
    fn test_pchip_derivatives() {
        // Values checked against scipy.interpolate.PchipInterpolator
        let pchip = Pchip::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 4.0, 9.0]).unwrap();
        assert_approx_eq!(f64, pchip.derivatives[0], 0.0);
        assert_approx_eq!(f64, pchip.derivatives[1], 1.5);
        assert_approx_eq!(f64, pchip.derivatives[2], 3.75);
        assert_approx_eq!(f64, pchip.derivatives[3], 6.0);
    }

    #[test]
    fn test_pchip_two_points_is_linear() {
        let pchip = Pchip::new(vec![0.0, 2.0], vec![1.0, 5.0]).unwrap();
        assert_approx_eq!(f64, pchip.evaluate(0.5), 2.0);
        assert_approx_eq!(f64, pchip.evaluate(3.0), 7.0);
    }

    #[test]
    fn test_pchip_single_point() {
        let pchip = Pchip::new(vec![1.0], vec![2.0]).unwrap();
        assert_approx_eq!(f64, pchip.evaluate(-5.0), 2.0);
    }

    #[test]
    fn test_pchip_not_increasing() {
        assert_error!(
            Pchip::new(vec![0.0, 1.0, 1.0], vec![0.0, 1.0, 2.0]),
            "x values must be strictly increasing"
        );
    }
}
