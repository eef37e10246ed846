use serde::Serialize;

use crate::model::ModelSpec;

use super::objective::{Criterion, ObjectiveEvaluation};

/// A named point estimate with its standard error.
#[derive(Debug, Clone, Serialize)]
pub struct NamedEstimate {
    pub name: String,
    pub estimate: f64,
    pub se: f64,
}

/// Conditional means of one grouping factor's random effects.
#[derive(Debug, Clone, Serialize)]
pub struct RanefBlock {
    pub term: String,
    /// Names of the k per-level effects (intercept, slopes...).
    pub effects: Vec<String>,
    pub levels: Vec<String>,
    /// One row of k values per level, on the data scale (λû).
    pub values: Vec<Vec<f64>>,
}

/// Estimated random-effects covariance for one grouping factor: σ̂²·λλᵀ.
#[derive(Debug, Clone, Serialize)]
pub struct CovarianceEstimate {
    pub term: String,
    pub structure: String,
    pub effects: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

impl CovarianceEstimate {
    /// Per-effect standard deviations (square roots of the diagonal).
    pub fn sd(&self) -> Vec<f64> {
        (0..self.matrix.len())
            .map(|i| self.matrix[i][i].max(0.0).sqrt())
            .collect()
    }

    /// Correlation matrix; entries involving a zero-variance effect are zero.
    pub fn correlation(&self) -> Vec<Vec<f64>> {
        let sd = self.sd();
        (0..sd.len())
            .map(|i| {
                (0..sd.len())
                    .map(|j| {
                        if i == j {
                            1.0
                        } else if sd[i] > 0.0 && sd[j] > 0.0 {
                            self.matrix[i][j] / (sd[i] * sd[j])
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// The immutable outcome of one fit.
///
/// Everything downstream consumers need is here by value, serializable as
/// name/value pairs; no optimizer internals or design matrices are exposed.
#[derive(Debug, Clone, Serialize)]
pub struct FitResult {
    pub criterion: Criterion,
    /// False when the evaluation budget ran out before the tolerance was met;
    /// the estimates are then the best point found, not a converged optimum.
    pub converged: bool,
    pub n_evals: usize,
    /// The optimized objective: profiled deviance (ML) or REML criterion.
    pub objective: f64,
    /// Covariance parameters at the optimum.
    pub theta: Vec<f64>,
    /// Residual scale estimate σ̂.
    pub sigma: f64,
    pub fixed_effects: Vec<NamedEstimate>,
    pub random_effects: Vec<RanefBlock>,
    pub covariance: Vec<CovarianceEstimate>,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    pub n_obs: usize,
    pub n_fixed: usize,
    pub n_theta: usize,
    /// Objective evaluations in order, for convergence inspection.
    pub history: Vec<ObjectiveEvaluation>,
}

impl FitResult {
    /// The optimized criterion value (deviance for ML fits).
    pub fn deviance(&self) -> f64 {
        self.objective
    }

    /// Estimated parameters counted by the information criteria:
    /// fixed effects + covariance parameters + σ.
    pub fn n_params(&self) -> usize {
        self.n_fixed + self.n_theta + 1
    }

    pub fn aic(&self) -> f64 {
        self.objective + 2.0 * self.n_params() as f64
    }

    /// Small-sample corrected AIC; infinite when n ≤ k + 1.
    pub fn aicc(&self) -> f64 {
        let k = self.n_params() as f64;
        let n = self.n_obs as f64;
        if n - k - 1.0 <= 0.0 {
            return f64::INFINITY;
        }
        self.aic() + 2.0 * k * (k + 1.0) / (n - k - 1.0)
    }

    pub fn bic(&self) -> f64 {
        self.objective + (self.n_obs as f64).ln() * self.n_params() as f64
    }

    /// Per-group regression coefficients for one grouping factor: the
    /// conditional means shifted by the matching fixed effect, on the same
    /// scale as coefficients from separate per-group fits.
    pub fn per_group_coefficients(&self, term: &str) -> Option<Vec<Vec<f64>>> {
        let block = self.random_effects.iter().find(|b| b.term == term)?;
        let shifts: Vec<f64> = block
            .effects
            .iter()
            .map(|name| {
                self.fixed_effects
                    .iter()
                    .find(|f| &f.name == name)
                    .map(|f| f.estimate)
                    .unwrap_or(0.0)
            })
            .collect();
        Some(
            block
                .values
                .iter()
                .map(|row| row.iter().zip(&shifts).map(|(v, s)| v + s).collect())
                .collect(),
        )
    }

    /// Formatted, human-readable account of the fit.
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str(&format!(
            "=== Linear mixed model fit by {} ===\n\n",
            self.criterion.label()
        ));
        s.push_str(&format!(
            "Observations: {}   Fixed effects: {}   Covariance parameters: {}\n",
            self.n_obs, self.n_fixed, self.n_theta
        ));
        s.push_str(&format!(
            "Converged: {}   Objective evaluations: {}\n\n",
            self.converged, self.n_evals
        ));
        s.push_str(&format!(
            "{} criterion: {:.4}\n",
            self.criterion.label(),
            self.objective
        ));
        s.push_str(&format!(
            "AIC: {:.4}   AICc: {:.4}   BIC: {:.4}\n",
            self.aic(),
            self.aicc(),
            self.bic()
        ));

        s.push_str("\n--- Random effects ---\n");
        for cov in &self.covariance {
            s.push_str(&format!("{} ({}):\n", cov.term, cov.structure));
            let sd = cov.sd();
            let corr = cov.correlation();
            for (i, effect) in cov.effects.iter().enumerate() {
                s.push_str(&format!("  {:<12} sd = {:.4}", effect, sd[i]));
                for j in 0..i {
                    s.push_str(&format!(
                        "   corr({}) = {:.2}",
                        cov.effects[j], corr[i][j]
                    ));
                }
                s.push('\n');
            }
        }
        s.push_str(&format!("Residual sd: {:.4}\n", self.sigma));

        s.push_str("\n--- Fixed effects ---\n");
        for effect in &self.fixed_effects {
            s.push_str(&format!(
                "  {:<12} {:>10.4}  (SE {:.4})\n",
                effect.name, effect.estimate, effect.se
            ));
        }

        s
    }
}

/// A fitted model: the spec it was fitted to plus the [`FitResult`].
///
/// The spec reference is what allows [`super::likelihood_ratio_test`] to
/// validate nesting structurally; serialization and reporting use only the
/// owned result.
#[derive(Debug, Clone)]
pub struct FittedModel<'m> {
    pub spec: &'m ModelSpec,
    pub result: FitResult,
}

impl FittedModel<'_> {
    pub fn deviance(&self) -> f64 {
        self.result.deviance()
    }

    pub fn aic(&self) -> f64 {
        self.result.aic()
    }

    pub fn aicc(&self) -> f64 {
        self.result.aicc()
    }

    pub fn bic(&self) -> f64 {
        self.result.bic()
    }

    pub fn converged(&self) -> bool {
        self.result.converged
    }

    pub fn theta(&self) -> &[f64] {
        &self.result.theta
    }

    pub fn sigma(&self) -> f64 {
        self.result.sigma
    }

    /// Free parameters excluding σ (fixed effects + θ), the count the
    /// likelihood-ratio test differences.
    pub fn n_free_params(&self) -> usize {
        self.result.n_fixed + self.result.n_theta
    }

    pub fn summary(&self) -> String {
        self.result.summary()
    }
}
