use crate::error::{LmmError, Result};
use crate::types::DenseMatrix;

use super::traits::CovStructure;

/// Unstructured (fully correlated) covariance template.
///
/// The k(k+1)/2 parameters are the elements of the lower triangle of λ stored
/// column-major:
///
/// ```text
///   params = [λ[0,0], λ[1,0], ..., λ[k-1,0],   // column 0
///             λ[1,1], ..., λ[k-1,1],            // column 1
///             ...
///             λ[k-1,k-1]]
/// ```
///
/// The first entry of each column block is the diagonal element, which the
/// optimizer keeps non-negative; this guarantees `λ λᵀ` is positive
/// semi-definite for every admissible parameter value.
#[derive(Debug, Clone)]
pub struct Correlated {
    dim: usize,
}

impl Correlated {
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "covariance template needs at least one covariate");
        Self { dim }
    }
}

impl CovStructure for Correlated {
    fn name(&self) -> &'static str {
        "Correlated"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn n_params(&self) -> usize {
        self.dim * (self.dim + 1) / 2
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        let mut bounds = Vec::with_capacity(self.n_params());
        for col in 0..self.dim {
            bounds.push((0.0, f64::INFINITY));
            for _ in col + 1..self.dim {
                bounds.push((f64::NEG_INFINITY, f64::INFINITY));
            }
        }
        bounds
    }

    fn initial(&self) -> Vec<f64> {
        let mut params = vec![0.0; self.n_params()];
        let mut idx = 0;
        for col in 0..self.dim {
            params[idx] = 1.0;
            idx += self.dim - col;
        }
        params
    }

    fn factor(&self, params: &[f64]) -> Result<DenseMatrix> {
        if params.len() != self.n_params() {
            return Err(LmmError::InvalidParameter(format!(
                "Correlated(dim={}) expects {} parameters, got {}",
                self.dim,
                self.n_params(),
                params.len()
            )));
        }

        let k = self.dim;
        let mut lambda = DenseMatrix::zeros(k, k);
        let mut idx = 0;
        for col in 0..k {
            for row in col..k {
                lambda[(row, col)] = params[idx];
                idx += 1;
            }
        }
        Ok(lambda)
    }

    fn clone_boxed(&self) -> Box<dyn CovStructure> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parameter_count_and_layout() {
        let c = Correlated::new(2);
        assert_eq!(c.n_params(), 3);

        let lambda = c.factor(&[1.5, 0.3, 0.8]).unwrap();
        assert_relative_eq!(lambda[(0, 0)], 1.5);
        assert_relative_eq!(lambda[(1, 0)], 0.3);
        assert_relative_eq!(lambda[(1, 1)], 0.8);
        assert_relative_eq!(lambda[(0, 1)], 0.0);
    }

    #[test]
    fn bounds_pin_diagonal_entries() {
        let c = Correlated::new(3);
        let bounds = c.bounds();
        assert_eq!(bounds.len(), 6);
        // column-major lower triangle: diagonals at 0, 3, 5
        assert_eq!(bounds[0], (0.0, f64::INFINITY));
        assert_eq!(bounds[3], (0.0, f64::INFINITY));
        assert_eq!(bounds[5], (0.0, f64::INFINITY));
        assert_eq!(bounds[1].0, f64::NEG_INFINITY);
        assert_eq!(bounds[2].0, f64::NEG_INFINITY);
        assert_eq!(bounds[4].0, f64::NEG_INFINITY);
    }

    #[test]
    fn initial_is_identity_factor() {
        let c = Correlated::new(3);
        let lambda = c.factor(&c.initial()).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(lambda[(i, j)], expected);
            }
        }
    }

    #[test]
    fn wrong_parameter_count_errors() {
        let c = Correlated::new(2);
        assert!(matches!(
            c.factor(&[1.0]).unwrap_err(),
            LmmError::InvalidParameter(_)
        ));
    }
}
