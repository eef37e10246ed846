use argmin::core::{Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;

use crate::error::{LmmError, Result};
use crate::matrix::spmv;
use crate::model::ModelSpec;
use crate::types::DenseVector;

use super::objective::{criterion_value, Criterion, ObjectiveEvaluation, ProfiledObjective};
use super::pls::PenalizedLeastSquares;
use super::result::{CovarianceEstimate, FitResult, FittedModel, NamedEstimate, RanefBlock};

/// Options controlling one fit.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub criterion: Criterion,
    /// Budget of simplex iterations before the fit is flagged non-converged.
    pub max_iters: u64,
    /// Standard-deviation tolerance on the simplex objective values.
    pub tolerance: f64,
    /// Starting θ; defaults to identity relative factors.
    pub start: Option<Vec<f64>>,
}

impl FitOptions {
    pub fn reml() -> Self {
        Self {
            criterion: Criterion::Reml,
            max_iters: 1000,
            tolerance: 1e-10,
            start: None,
        }
    }

    pub fn ml() -> Self {
        Self {
            criterion: Criterion::Ml,
            ..Self::reml()
        }
    }

    pub fn with_start(mut self, theta: Vec<f64>) -> Self {
        self.start = Some(theta);
        self
    }
}

impl Default for FitOptions {
    fn default() -> Self {
        Self::reml()
    }
}

/// Fit the model: minimize the profiled criterion over θ with a bounded
/// derivative-free simplex search, then assemble the [`FitResult`] from the
/// solution at the optimum.
///
/// Running out of the iteration budget is not an error: the best point found
/// is returned with `converged = false` and a warning, since a best-effort
/// estimate is still useful to the caller.
pub fn fit<'m>(spec: &'m ModelSpec, options: &FitOptions) -> Result<FittedModel<'m>> {
    let layout = spec.theta_layout();

    let mut theta0 = match &options.start {
        Some(theta) => {
            if theta.len() != layout.dim() {
                return Err(LmmError::InvalidParameter(format!(
                    "starting theta has {} components, expected {}",
                    theta.len(),
                    layout.dim()
                )));
            }
            theta.clone()
        }
        None => layout.initial(),
    };
    layout.clamp(&mut theta0);

    let objective = ProfiledObjective::new(spec, options.criterion);
    let trace = objective.trace_handle();

    let solver = NelderMead::new(initial_simplex(&theta0))
        .with_sd_tolerance(options.tolerance)
        .map_err(|e| LmmError::Optimization(e.to_string()))?;

    let optimized = Executor::new(objective, solver)
        .configure(|state| state.max_iters(options.max_iters))
        .run()
        .map_err(|e| LmmError::Optimization(e.to_string()))?;

    let state = optimized.state();
    let mut theta = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| LmmError::Optimization("optimizer returned no parameters".into()))?;
    layout.clamp(&mut theta);

    let converged = matches!(
        state.get_termination_status(),
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
    );
    if !converged {
        log::warn!(
            "optimizer stopped after {} iterations without meeting tolerance; \
             returning the best point found",
            state.get_iter()
        );
    }

    let history = trace.lock().map(|t| t.clone()).unwrap_or_default();

    build_result(spec, options.criterion, theta, converged, history)
}

/// Axis-step simplex around the starting point.
fn initial_simplex(theta0: &[f64]) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(theta0.len() + 1);
    simplex.push(theta0.to_vec());
    for i in 0..theta0.len() {
        let mut vertex = theta0.to_vec();
        let step = if vertex[i].abs() > 1.0 {
            0.25 * vertex[i].abs()
        } else {
            0.25
        };
        vertex[i] += step;
        simplex.push(vertex);
    }
    simplex
}

fn build_result<'m>(
    spec: &'m ModelSpec,
    criterion: Criterion,
    theta: Vec<f64>,
    converged: bool,
    history: Vec<ObjectiveEvaluation>,
) -> Result<FittedModel<'m>> {
    let pls = PenalizedLeastSquares::new(spec);
    let (sol, cov_beta) = pls.solve_detailed(spec, &theta)?;

    let n = spec.n_obs();
    let p = spec.n_fixed();
    let dof = match criterion {
        Criterion::Ml => n,
        Criterion::Reml => n - p,
    } as f64;
    let sigma2 = sol.rss / dof;
    let sigma = sigma2.sqrt();

    let fixed_effects: Vec<NamedEstimate> = spec
        .fixed_names()
        .iter()
        .enumerate()
        .map(|(j, name)| NamedEstimate {
            name: name.clone(),
            estimate: sol.beta[j],
            se: (sigma2 * cov_beta[(j, j)]).max(0.0).sqrt(),
        })
        .collect();

    let lambdas = spec.relative_factors(&theta)?;

    let mut random_effects = Vec::with_capacity(spec.terms().len());
    let mut stacked_means = Vec::with_capacity(spec.terms().len());
    for (k, term) in spec.terms().iter().enumerate() {
        let n_effects = term.n_effects();
        let lambda = &lambdas[k];

        let mut values = Vec::with_capacity(term.n_levels());
        let mut stacked = Vec::with_capacity(term.n_coords());
        for level in 0..term.n_levels() {
            let coords = &sol.u[k][level * n_effects..(level + 1) * n_effects];
            let mean = lambda * DenseVector::from_column_slice(coords);
            let row: Vec<f64> = mean.iter().cloned().collect();
            stacked.extend_from_slice(&row);
            values.push(row);
        }

        random_effects.push(RanefBlock {
            term: term.name().to_string(),
            effects: term.effect_names().to_vec(),
            levels: term.level_names().to_vec(),
            values,
        });
        stacked_means.push(stacked);
    }

    let covariance: Vec<CovarianceEstimate> = spec
        .terms()
        .iter()
        .zip(lambdas.iter())
        .map(|(term, lambda)| {
            let cov = lambda * lambda.transpose() * sigma2;
            CovarianceEstimate {
                term: term.name().to_string(),
                structure: term.structure().name().to_string(),
                effects: term.effect_names().to_vec(),
                matrix: (0..cov.nrows())
                    .map(|i| (0..cov.ncols()).map(|j| cov[(i, j)]).collect())
                    .collect(),
            }
        })
        .collect();

    let mut fitted = spmv(spec.x(), &sol.beta);
    for (term, means) in spec.terms().iter().zip(stacked_means.iter()) {
        for (f, v) in fitted.iter_mut().zip(spmv(term.z(), means)) {
            *f += v;
        }
    }
    let residuals: Vec<f64> = spec
        .y()
        .iter()
        .zip(fitted.iter())
        .map(|(y, f)| y - f)
        .collect();

    let objective = criterion_value(criterion, spec, &sol);

    let result = FitResult {
        criterion,
        converged,
        n_evals: history.len(),
        objective,
        theta,
        sigma,
        fixed_effects,
        random_effects,
        covariance,
        fitted,
        residuals,
        n_obs: n,
        n_fixed: p,
        n_theta: spec.n_theta(),
        history,
    };

    Ok(FittedModel { spec, result })
}
