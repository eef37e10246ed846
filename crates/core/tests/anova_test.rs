//! Variance components on balanced one-way data.
//!
//! For a balanced random-intercept design, the REML estimates coincide with
//! the classical ANOVA decomposition: σ̂² = MSW and σ̂_b² = (MSB − MSW)/m,
//! where m is the per-group count. This pins the whole profiled-REML path to
//! a closed form that can be computed independently from the raw data.

use approx::assert_relative_eq;
use mixedlm_core::data::DataFrame;
use mixedlm_core::model::LmmBuilder;

/// Balanced one-way layout: q groups × m observations.
fn balanced_frame() -> (DataFrame, usize, usize) {
    let group_effects = [6.0, 3.0, 0.0, -3.0, -6.0, 1.5];
    let within = [0.9, -0.6, 0.4, -0.8, 0.1];
    let q = group_effects.len();
    let m = within.len();

    let mut y = Vec::with_capacity(q * m);
    let mut group = Vec::with_capacity(q * m);
    for (g, &effect) in group_effects.iter().enumerate() {
        for (j, &e) in within.iter().enumerate() {
            // rotate the within-group pattern so residuals differ per group
            let noise = within[(j + g) % m] * 0.5 + e * 0.5;
            y.push(10.0 + effect + noise);
            group.push(format!("g{g}"));
        }
    }

    let mut df = DataFrame::new();
    df.add_float("y", y).unwrap();
    df.add_factor("group", &group).unwrap();
    (df, q, m)
}

/// ANOVA mean squares computed straight from the data.
fn anova_decomposition(df: &DataFrame, q: usize, m: usize) -> (f64, f64) {
    let y = df.float("y").unwrap();
    let n = y.len();
    let grand = y.iter().sum::<f64>() / n as f64;

    let mut group_means = vec![0.0; q];
    for (i, &value) in y.iter().enumerate() {
        group_means[i / m] += value / m as f64;
    }

    let ssb: f64 = group_means
        .iter()
        .map(|&gm| m as f64 * (gm - grand).powi(2))
        .sum();
    let ssw: f64 = y
        .iter()
        .enumerate()
        .map(|(i, &value)| (value - group_means[i / m]).powi(2))
        .sum();

    let msb = ssb / (q - 1) as f64;
    let msw = ssw / (q * (m - 1)) as f64;
    (msb, msw)
}

#[test]
fn reml_matches_anova_on_balanced_data() {
    let (df, q, m) = balanced_frame();
    let (msb, msw) = anova_decomposition(&df, q, m);

    let spec = LmmBuilder::new()
        .data(&df)
        .response("y")
        .random("group", &[])
        .build()
        .unwrap();
    let fitted = spec.fit_reml().unwrap();

    assert!(fitted.converged());

    let sigma2 = fitted.sigma() * fitted.sigma();
    let group_var = fitted.result.covariance[0].matrix[0][0];

    assert_relative_eq!(sigma2, msw, max_relative = 1e-3);
    assert_relative_eq!(group_var, (msb - msw) / m as f64, max_relative = 1e-3);
}

#[test]
fn ml_deviance_is_minimized_at_the_optimizer_solution() {
    // grid evaluation around the optimum never beats the optimizer
    let (df, _, _) = balanced_frame();
    let spec = LmmBuilder::new()
        .data(&df)
        .response("y")
        .random("group", &[])
        .build()
        .unwrap();
    let fitted = spec.fit_ml().unwrap();

    use mixedlm_core::lmm::{Criterion, ProfiledObjective};
    let objective = ProfiledObjective::new(&spec, Criterion::Ml);
    let best = fitted.deviance();
    let theta_star = fitted.theta()[0];
    for delta in [-0.2, -0.05, 0.05, 0.2] {
        let theta = (theta_star + delta).max(0.0);
        assert!(objective.value(&[theta]) >= best - 1e-8);
    }
}

#[test]
fn two_level_factor_converges_at_the_zero_variance_boundary() {
    // identical group means: the variance estimate collapses to the boundary
    let mut df = DataFrame::new();
    df.add_float("y", vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]).unwrap();
    df.add_factor("group", &["a", "a", "a", "b", "b", "b"]).unwrap();

    let spec = LmmBuilder::new()
        .data(&df)
        .response("y")
        .random("group", &[])
        .build()
        .unwrap();
    let fitted = spec.fit_reml().unwrap();

    let theta = fitted.theta()[0];
    assert!(theta.is_finite());
    assert!(theta >= 0.0);

    let group_var = fitted.result.covariance[0].matrix[0][0];
    assert!(group_var >= 0.0);
    assert!(group_var < 0.05, "expected complete shrinkage, got {group_var}");

    // shrinkage to the fixed-effect-only model: conditional means near zero
    for row in &fitted.result.random_effects[0].values {
        assert!(row[0].abs() < 1e-3);
    }
}

#[test]
fn two_level_factor_with_real_spread_stays_finite() {
    let mut df = DataFrame::new();
    df.add_float("y", vec![9.8, 10.4, 10.1, 3.9, 4.3, 4.1]).unwrap();
    df.add_factor("group", &["a", "a", "a", "b", "b", "b"]).unwrap();

    let spec = LmmBuilder::new()
        .data(&df)
        .response("y")
        .random("group", &[])
        .build()
        .unwrap();
    let fitted = spec.fit_reml().unwrap();

    assert!(fitted.theta()[0].is_finite());
    assert!(fitted.theta()[0] > 0.0);
    assert!(fitted.sigma() > 0.0);
    assert!(fitted.deviance().is_finite());
}
