use crate::error::{LmmError, Result};
use crate::types::DenseMatrix;

use super::traits::CovStructure;

/// Uncorrelated ("zerocorr") covariance template.
///
/// Only the k diagonal entries of λ are free; off-diagonals are fixed at zero
/// and never appear in θ. The implied random-effects covariance is diagonal:
/// the per-level effects are independent with their own scales.
#[derive(Debug, Clone)]
pub struct Diagonal {
    dim: usize,
}

impl Diagonal {
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "covariance template needs at least one covariate");
        Self { dim }
    }
}

impl CovStructure for Diagonal {
    fn name(&self) -> &'static str {
        "Diagonal"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn n_params(&self) -> usize {
        self.dim
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        vec![(0.0, f64::INFINITY); self.dim]
    }

    fn initial(&self) -> Vec<f64> {
        vec![1.0; self.dim]
    }

    fn factor(&self, params: &[f64]) -> Result<DenseMatrix> {
        if params.len() != self.dim {
            return Err(LmmError::InvalidParameter(format!(
                "Diagonal(dim={}) expects {} parameters, got {}",
                self.dim,
                self.dim,
                params.len()
            )));
        }

        let mut lambda = DenseMatrix::zeros(self.dim, self.dim);
        for (i, &value) in params.iter().enumerate() {
            lambda[(i, i)] = value;
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
    fn factor_is_diagonal() {
        let d = Diagonal::new(2);
        let lambda = d.factor(&[1.2, 0.4]).unwrap();
        assert_relative_eq!(lambda[(0, 0)], 1.2);
        assert_relative_eq!(lambda[(1, 1)], 0.4);
        assert_relative_eq!(lambda[(1, 0)], 0.0);
        assert_relative_eq!(lambda[(0, 1)], 0.0);
    }

    #[test]
    fn all_bounds_non_negative() {
        let d = Diagonal::new(3);
        for (lo, hi) in d.bounds() {
            assert_eq!(lo, 0.0);
            assert!(hi.is_infinite());
        }
    }

    #[test]
    fn zero_parameters_are_admissible() {
        // complete shrinkage: λ = 0 must be representable
        let d = Diagonal::new(2);
        let lambda = d.factor(&[0.0, 0.0]).unwrap();
        assert_relative_eq!(lambda[(0, 0)], 0.0);
        assert_relative_eq!(lambda[(1, 1)], 0.0);
    }

    #[test]
    fn wrong_parameter_count_errors() {
        let d = Diagonal::new(2);
        assert!(d.factor(&[1.0, 2.0, 3.0]).is_err());
    }
}
