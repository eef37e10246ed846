use serde::Serialize;
use statrs::function::gamma::gamma_ur;

use crate::error::{LmmError, Result};
use crate::matrix::to_dense;
use crate::types::DenseMatrix;

use super::result::FittedModel;

/// Result of a likelihood-ratio test between two nested fits.
#[derive(Debug, Clone, Serialize)]
pub struct LrtResult {
    /// LR = deviance(smaller) − deviance(larger), clamped at zero.
    pub statistic: f64,
    /// Difference in free-parameter counts.
    pub df: usize,
    /// Upper tail of χ²(df) at the statistic.
    pub p_value: f64,
    pub deviance_smaller: f64,
    pub deviance_larger: f64,
}

/// Likelihood-ratio test of a smaller model against a larger one it is
/// nested in.
///
/// Nesting is validated structurally: the fits must use the same criterion on
/// the same number of observations, the smaller model must have strictly
/// fewer free parameters, and every fixed-effects column of the smaller
/// design must appear among the larger design's columns. A likelihood ratio
/// that is negative beyond numerical tolerance indicates a mis-specified pair
/// or a failed fit and is rejected rather than reported as a valid test.
pub fn likelihood_ratio_test(
    smaller: &FittedModel,
    larger: &FittedModel,
) -> Result<LrtResult> {
    if smaller.result.n_obs != larger.result.n_obs {
        return Err(LmmError::NotNested(format!(
            "models were fitted to different numbers of observations ({} vs {})",
            smaller.result.n_obs, larger.result.n_obs
        )));
    }
    if smaller.result.criterion != larger.result.criterion {
        return Err(LmmError::NotNested(format!(
            "models were fitted with different criteria ({} vs {})",
            smaller.result.criterion.label(),
            larger.result.criterion.label()
        )));
    }

    let free_smaller = smaller.n_free_params();
    let free_larger = larger.n_free_params();
    if free_smaller >= free_larger {
        return Err(LmmError::NotNested(format!(
            "smaller model must have strictly fewer free parameters ({free_smaller} vs {free_larger})"
        )));
    }

    let x_smaller = to_dense(smaller.spec.x());
    let x_larger = to_dense(larger.spec.x());
    if !is_sub_design(&x_smaller, &x_larger) {
        return Err(LmmError::NotNested(
            "fixed-effects design of the smaller model is not a sub-design of the larger model's"
                .into(),
        ));
    }

    let deviance_smaller = smaller.deviance();
    let deviance_larger = larger.deviance();
    let raw = deviance_smaller - deviance_larger;
    let tolerance = 1e-6 * (1.0 + deviance_larger.abs());
    if raw < -tolerance {
        return Err(LmmError::NotNested(format!(
            "likelihood ratio is negative ({raw:.6}): the larger fit is worse than the \
             smaller one, which indicates a fitting or nesting error"
        )));
    }

    let statistic = raw.max(0.0);
    let df = free_larger - free_smaller;

    Ok(LrtResult {
        statistic,
        df,
        p_value: chi_squared_sf(statistic, df as f64),
        deviance_smaller,
        deviance_larger,
    })
}

/// Every column of `smaller` must match some column of `larger` elementwise.
fn is_sub_design(smaller: &DenseMatrix, larger: &DenseMatrix) -> bool {
    if smaller.nrows() != larger.nrows() {
        return false;
    }
    (0..smaller.ncols()).all(|j| {
        let col = smaller.column(j);
        let scale = 1.0 + col.amax();
        (0..larger.ncols()).any(|l| {
            let other = larger.column(l);
            (0..col.len()).all(|i| (col[i] - other[i]).abs() <= 1e-8 * scale)
        })
    })
}

/// Survival function of the χ² distribution with `df` degrees of freedom.
fn chi_squared_sf(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        1.0
    } else {
        gamma_ur(df / 2.0, x / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataFrame;
    use crate::model::LmmBuilder;
    use approx::assert_relative_eq;

    #[test]
    fn chi_squared_tail_known_quantiles() {
        // 95th percentiles: χ²₁ = 3.841, χ²₂ = 5.991
        assert_relative_eq!(chi_squared_sf(3.841, 1.0), 0.05, epsilon = 1e-3);
        assert_relative_eq!(chi_squared_sf(5.991, 2.0), 0.05, epsilon = 1e-3);
        assert_relative_eq!(chi_squared_sf(0.0, 1.0), 1.0, epsilon = 1e-12);
    }

    fn longitudinal_frame() -> DataFrame {
        // 6 subjects × 4 occasions with subject-specific intercepts and slopes
        let subjects = ["s1", "s2", "s3", "s4", "s5", "s6"];
        let intercepts = [12.0, 8.0, 10.5, 9.0, 11.0, 9.5];
        let slopes = [1.8, 0.6, 1.1, 0.9, 1.5, 1.0];
        let noise = [
            0.3, -0.2, 0.1, -0.4, 0.2, 0.4, -0.3, 0.1, -0.1, 0.2, -0.2, 0.3,
            0.1, -0.3, 0.4, -0.1, -0.4, 0.2, 0.3, -0.2, 0.2, 0.1, -0.1, -0.3,
        ];

        let mut y = Vec::new();
        let mut day = Vec::new();
        let mut subject = Vec::new();
        let mut idx = 0;
        for (s, name) in subjects.iter().enumerate() {
            for t in 0..4 {
                y.push(intercepts[s] + slopes[s] * t as f64 + noise[idx]);
                day.push(t as f64);
                subject.push(*name);
                idx += 1;
            }
        }

        let mut df = DataFrame::new();
        df.add_float("y", y).unwrap();
        df.add_float("day", day).unwrap();
        df.add_factor("subject", &subject).unwrap();
        df
    }

    #[test]
    fn zerocorr_nested_in_correlated() {
        let df = longitudinal_frame();
        let full = LmmBuilder::new()
            .data(&df)
            .response("y")
            .fixed(&["day"])
            .random("subject", &["day"])
            .build()
            .unwrap();
        let reduced = LmmBuilder::new()
            .data(&df)
            .response("y")
            .fixed(&["day"])
            .random_zerocorr("subject", &["day"])
            .build()
            .unwrap();

        let full_fit = full.fit_ml().unwrap();
        let reduced_fit = reduced.fit_ml().unwrap();

        let lrt = likelihood_ratio_test(&reduced_fit, &full_fit).unwrap();
        assert_eq!(lrt.df, 1);
        assert!(lrt.statistic >= 0.0);
        assert!(lrt.p_value > 0.0 && lrt.p_value <= 1.0);
    }

    #[test]
    fn swapped_order_is_rejected() {
        let df = longitudinal_frame();
        let full = LmmBuilder::new()
            .data(&df)
            .response("y")
            .fixed(&["day"])
            .random("subject", &["day"])
            .build()
            .unwrap();
        let reduced = LmmBuilder::new()
            .data(&df)
            .response("y")
            .fixed(&["day"])
            .random_zerocorr("subject", &["day"])
            .build()
            .unwrap();

        let full_fit = full.fit_ml().unwrap();
        let reduced_fit = reduced.fit_ml().unwrap();

        let err = likelihood_ratio_test(&full_fit, &reduced_fit).unwrap_err();
        assert!(matches!(err, LmmError::NotNested(_)));
    }

    #[test]
    fn criterion_mismatch_is_rejected() {
        let df = longitudinal_frame();
        let full = LmmBuilder::new()
            .data(&df)
            .response("y")
            .fixed(&["day"])
            .random("subject", &["day"])
            .build()
            .unwrap();
        let reduced = LmmBuilder::new()
            .data(&df)
            .response("y")
            .fixed(&["day"])
            .random_zerocorr("subject", &["day"])
            .build()
            .unwrap();

        let full_fit = full.fit_ml().unwrap();
        let reduced_fit = reduced.fit_reml().unwrap();

        let err = likelihood_ratio_test(&reduced_fit, &full_fit).unwrap_err();
        assert!(matches!(err, LmmError::NotNested(_)));
    }

    #[test]
    fn different_fixed_design_is_rejected() {
        let df = longitudinal_frame();
        // smaller model carries a fixed covariate the larger one lacks
        let smaller = LmmBuilder::new()
            .data(&df)
            .response("y")
            .fixed(&["day"])
            .random_zerocorr("subject", &[])
            .build()
            .unwrap();
        let larger = LmmBuilder::new()
            .data(&df)
            .response("y")
            .random("subject", &["day"])
            .build()
            .unwrap();

        let smaller_fit = smaller.fit_ml().unwrap();
        let larger_fit = larger.fit_ml().unwrap();

        let err = likelihood_ratio_test(&smaller_fit, &larger_fit).unwrap_err();
        assert!(matches!(err, LmmError::NotNested(_)));
    }
}
