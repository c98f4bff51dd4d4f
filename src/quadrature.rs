#[derive(Clone, Debug)]
pub struct Quadrature {
    pub points: Vec<f64>,
    pub weights: Vec<f64>,
}

impl Quadrature {
    /// Trapezoidal rule on the given (possibly non-uniform) sample points.
    ///
    /// Each weight is half the sum of the sample's neighboring intervals,
    /// so the weights add up to the span of `s`.
    pub fn trapezoidal(s: &[f64]) -> Self {
        let n = s.len();
        let mut weights = vec![0.; n];
        for i in 0..n {
            if i + 1 < n {
                weights[i] += 0.5 * (s[i + 1] - s[i]).abs();
            }
            if i > 0 {
                weights[i] += 0.5 * (s[i] - s[i - 1]).abs();
            }
        }
        Self {
            points: s.to_vec(),
            weights,
        }
    }
}
