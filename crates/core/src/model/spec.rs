use crate::covariance::{CovStructure, ThetaLayout};
use crate::error::{LmmError, Result};
use crate::matrix::to_dense;
use crate::types::{DenseMatrix, SparseMat};

/// The random-effects term of one grouping factor.
///
/// Owns the factor's design matrix Z (n × q·k, level-major: level j holds
/// columns `[j·k, j·k + k)`) and the covariance template that maps θ to the
/// term's relative factor λ.
#[derive(Debug, Clone)]
pub struct RandomTerm {
    name: String,
    z: SparseMat,
    n_levels: usize,
    structure: Box<dyn CovStructure>,
    level_names: Vec<String>,
    effect_names: Vec<String>,
}

impl RandomTerm {
    pub fn new(
        name: &str,
        z: SparseMat,
        n_levels: usize,
        structure: Box<dyn CovStructure>,
        level_names: Vec<String>,
        effect_names: Vec<String>,
    ) -> Result<Self> {
        if n_levels < 2 {
            return Err(LmmError::DegenerateGroupingFactor {
                term: name.to_string(),
                n_levels,
            });
        }
        let expected = n_levels * structure.dim();
        if z.cols() != expected {
            return Err(LmmError::DimensionMismatch {
                expected,
                got: z.cols(),
                context: format!("random-effects design for '{name}'"),
            });
        }
        if level_names.len() != n_levels {
            return Err(LmmError::DimensionMismatch {
                expected: n_levels,
                got: level_names.len(),
                context: format!("level names for '{name}'"),
            });
        }
        if effect_names.len() != structure.dim() {
            return Err(LmmError::DimensionMismatch {
                expected: structure.dim(),
                got: effect_names.len(),
                context: format!("effect names for '{name}'"),
            });
        }

        Ok(Self {
            name: name.to_string(),
            z,
            n_levels,
            structure,
            level_names,
            effect_names,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn z(&self) -> &SparseMat {
        &self.z
    }

    pub fn n_levels(&self) -> usize {
        self.n_levels
    }

    /// Random-effect covariates per level (k).
    pub fn n_effects(&self) -> usize {
        self.structure.dim()
    }

    /// Total number of columns this term contributes (q·k).
    pub fn n_coords(&self) -> usize {
        self.n_levels * self.structure.dim()
    }

    pub fn structure(&self) -> &dyn CovStructure {
        self.structure.as_ref()
    }

    pub fn level_names(&self) -> &[String] {
        &self.level_names
    }

    pub fn effect_names(&self) -> &[String] {
        &self.effect_names
    }
}

/// An immutable, validated mixed-model specification.
///
/// Holds the response y, the fixed-effects design X and one [`RandomTerm`]
/// per grouping factor. Construction validates dimensions, requires X to have
/// full column rank and every grouping factor to have at least two levels.
/// Nothing here changes during fitting; the optimizer owns the only mutable
/// state (θ), and a fit is a pure function of this spec.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    response_name: String,
    y: Vec<f64>,
    x: SparseMat,
    fixed_names: Vec<String>,
    terms: Vec<RandomTerm>,
    theta: ThetaLayout,
}

impl ModelSpec {
    pub fn new(
        response_name: &str,
        y: Vec<f64>,
        x: SparseMat,
        fixed_names: Vec<String>,
        terms: Vec<RandomTerm>,
    ) -> Result<Self> {
        let n = y.len();
        if n == 0 {
            return Err(LmmError::Data("response vector is empty".into()));
        }
        if x.rows() != n {
            return Err(LmmError::DimensionMismatch {
                expected: n,
                got: x.rows(),
                context: "fixed-effects design rows".into(),
            });
        }
        let p = x.cols();
        if fixed_names.len() != p {
            return Err(LmmError::DimensionMismatch {
                expected: p,
                got: fixed_names.len(),
                context: "fixed-effect names".into(),
            });
        }
        if n <= p {
            return Err(LmmError::ModelSpec(format!(
                "model is saturated: {n} observations for {p} fixed effects"
            )));
        }
        if terms.is_empty() {
            return Err(LmmError::ModelSpec(
                "a mixed model needs at least one random-effects term".into(),
            ));
        }
        for term in &terms {
            if term.z().rows() != n {
                return Err(LmmError::DimensionMismatch {
                    expected: n,
                    got: term.z().rows(),
                    context: format!("random-effects design rows for '{}'", term.name()),
                });
            }
        }

        let rank = column_rank(&to_dense(&x));
        if rank < p {
            return Err(LmmError::RankDeficientDesign { rank, ncols: p });
        }

        let structures: Vec<&dyn CovStructure> =
            terms.iter().map(|t| t.structure()).collect();
        let theta = ThetaLayout::new(&structures);

        Ok(Self {
            response_name: response_name.to_string(),
            y,
            x,
            fixed_names,
            terms,
            theta,
        })
    }

    pub fn n_obs(&self) -> usize {
        self.y.len()
    }

    pub fn n_fixed(&self) -> usize {
        self.x.cols()
    }

    /// Dimension of the covariance parameter vector θ.
    pub fn n_theta(&self) -> usize {
        self.theta.dim()
    }

    /// Total random-effects dimension, Σ qₖ·kₖ.
    pub fn n_random(&self) -> usize {
        self.terms.iter().map(|t| t.n_coords()).sum()
    }

    /// Free parameters excluding σ: fixed effects plus θ components.
    pub fn n_free_params(&self) -> usize {
        self.n_fixed() + self.n_theta()
    }

    pub fn response_name(&self) -> &str {
        &self.response_name
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn x(&self) -> &SparseMat {
        &self.x
    }

    pub fn fixed_names(&self) -> &[String] {
        &self.fixed_names
    }

    pub fn terms(&self) -> &[RandomTerm] {
        &self.terms
    }

    pub fn theta_layout(&self) -> &ThetaLayout {
        &self.theta
    }

    /// Build the per-term relative factors λₖ(θ).
    pub fn relative_factors(&self, theta: &[f64]) -> Result<Vec<DenseMatrix>> {
        if theta.len() != self.theta.dim() {
            return Err(LmmError::InvalidParameter(format!(
                "theta has {} components, expected {}",
                theta.len(),
                self.theta.dim()
            )));
        }
        self.terms
            .iter()
            .enumerate()
            .map(|(k, term)| term.structure().factor(self.theta.slice(theta, k)))
            .collect()
    }

    /// Fit by restricted maximum likelihood with default options.
    pub fn fit_reml(&self) -> Result<crate::lmm::FittedModel<'_>> {
        crate::lmm::fit(self, &crate::lmm::FitOptions::reml())
    }

    /// Fit by maximum likelihood with default options.
    pub fn fit_ml(&self) -> Result<crate::lmm::FittedModel<'_>> {
        crate::lmm::fit(self, &crate::lmm::FitOptions::ml())
    }
}

/// Column rank via singular values, with the usual scaled tolerance.
fn column_rank(m: &DenseMatrix) -> usize {
    let max_dim = m.nrows().max(m.ncols());
    let svd = m.clone().svd(false, false);
    let max_sv = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    if max_sv == 0.0 {
        return 0;
    }
    let tol = max_dim as f64 * f64::EPSILON * max_sv;
    svd.singular_values.iter().filter(|&&s| s > tol).count()
}
