use std::sync::{Arc, Mutex};

use argmin::core::CostFunction;
use serde::Serialize;

use crate::model::ModelSpec;

use super::pls::{PenalizedLeastSquares, PlsSolution};

/// Estimation criterion for the profiled objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Criterion {
    Ml,
    Reml,
}

impl Criterion {
    pub fn label(&self) -> &'static str {
        match self {
            Criterion::Ml => "ML",
            Criterion::Reml => "REML",
        }
    }
}

/// Objective value substituted when the joint factorization fails.
///
/// Large but finite: the optimizer treats the offending θ as a very bad point
/// and backs away from the boundary instead of aborting the fit.
pub(crate) const SINGULAR_PENALTY: f64 = 1e10;

/// One recorded objective evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectiveEvaluation {
    pub eval: usize,
    pub theta: Vec<f64>,
    pub objective: f64,
}

/// The profiled deviance (ML) or REML criterion as a function of θ alone.
///
/// β and u are concentrated out by the penalized least-squares solve, so the
/// optimizer only ever sees the low-dimensional covariance parameters. Every
/// evaluation is appended to a shared trace for the fit history.
pub struct ProfiledObjective<'m> {
    spec: &'m ModelSpec,
    pls: PenalizedLeastSquares,
    criterion: Criterion,
    trace: Arc<Mutex<Vec<ObjectiveEvaluation>>>,
}

impl<'m> ProfiledObjective<'m> {
    pub fn new(spec: &'m ModelSpec, criterion: Criterion) -> Self {
        Self {
            spec,
            pls: PenalizedLeastSquares::new(spec),
            criterion,
            trace: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn criterion(&self) -> Criterion {
        self.criterion
    }

    /// Shared handle to the evaluation trace; survives the optimizer taking
    /// ownership of the objective.
    pub fn trace_handle(&self) -> Arc<Mutex<Vec<ObjectiveEvaluation>>> {
        Arc::clone(&self.trace)
    }

    /// Objective at θ. The parameter is clamped into its feasible box first;
    /// the profiled criterion is invariant under sign flips of the factor
    /// diagonal, so clamping at zero loses nothing.
    pub fn value(&self, theta: &[f64]) -> f64 {
        let mut clamped = theta.to_vec();
        self.spec.theta_layout().clamp(&mut clamped);

        match self.pls.solve(self.spec, &clamped) {
            Ok(sol) => criterion_value(self.criterion, self.spec, &sol),
            Err(err) => {
                log::debug!("objective evaluation at theta {clamped:?} failed: {err}");
                SINGULAR_PENALTY
            }
        }
    }
}

/// Criterion value from a solved penalized system.
///
/// - ML:   log|ΛᵀZᵀZΛ + I| + n·(1 + log(2π·r²/n))
/// - REML: log|ΛᵀZᵀZΛ + I| + log|XᵀV⁻¹X| + (n−p)·(1 + log(2π·r²/(n−p)))
pub(crate) fn criterion_value(criterion: Criterion, spec: &ModelSpec, sol: &PlsSolution) -> f64 {
    let n = spec.n_obs() as f64;
    let two_pi = 2.0 * std::f64::consts::PI;
    match criterion {
        Criterion::Ml => sol.logdet_ltheta + n * (1.0 + (two_pi * sol.rss / n).ln()),
        Criterion::Reml => {
            let nmp = n - spec.n_fixed() as f64;
            sol.logdet_ltheta
                + sol.logdet_lx
                + nmp * (1.0 + (two_pi * sol.rss / nmp).ln())
        }
    }
}

impl CostFunction for ProfiledObjective<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> std::result::Result<f64, argmin::core::Error> {
        let value = self.value(theta);
        if let Ok(mut trace) = self.trace.lock() {
            let eval = trace.len() + 1;
            trace.push(ObjectiveEvaluation {
                eval,
                theta: theta.clone(),
                objective: value,
            });
        }
        Ok(value)
    }
}
