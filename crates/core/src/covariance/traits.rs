use crate::error::Result;
use crate::types::DenseMatrix;

/// Covariance template for the random effects of one grouping factor.
///
/// A template fixes the topology of the k×k relative covariance factor λ and
/// maps a slice of the covariance parameter vector θ to a concrete
/// lower-triangular λ, such that the random-effects covariance for the factor
/// is `σ² · λ λᵀ`. The topology is chosen at model construction and never
/// changes during fitting; only the parameter values do.
///
/// Implementations are pure: the same parameter slice always produces the
/// same factor, and no state is held between calls.
pub trait CovStructure: Send + Sync + std::fmt::Debug {
    /// Human-readable name: "Correlated", "Diagonal".
    fn name(&self) -> &'static str;

    /// Number of random-effect covariates per level (k).
    fn dim(&self) -> usize;

    /// Number of free parameters this template contributes to θ.
    fn n_params(&self) -> usize;

    /// Feasible box per parameter, in parameter order. Diagonal positions of
    /// λ are bounded below at zero; off-diagonals are unbounded.
    fn bounds(&self) -> Vec<(f64, f64)>;

    /// Starting values: the identity factor (ones on the diagonal).
    fn initial(&self) -> Vec<f64>;

    /// Build the lower-triangular relative factor λ from a parameter slice.
    fn factor(&self, params: &[f64]) -> Result<DenseMatrix>;

    fn clone_boxed(&self) -> Box<dyn CovStructure>;
}

impl Clone for Box<dyn CovStructure> {
    fn clone(&self) -> Box<dyn CovStructure> {
        self.clone_boxed()
    }
}
