use serde::Serialize;
use statrs::function::erf::erfc;

use crate::lmm::FitResult;

/// A Wald z-test for one fixed-effect coefficient.
#[derive(Debug, Clone, Serialize)]
pub struct WaldTest {
    pub name: String,
    pub estimate: f64,
    pub se: f64,
    pub z: f64,
    pub p_value: f64,
}

/// Per-coefficient Wald z-tests against the standard normal.
///
/// Asymptotic: the reference distribution ignores the degrees of freedom
/// spent on the covariance parameters, so p-values are optimistic at small n.
pub fn wald_tests(result: &FitResult) -> Vec<WaldTest> {
    result
        .fixed_effects
        .iter()
        .map(|effect| {
            let z = if effect.se > 0.0 {
                effect.estimate / effect.se
            } else {
                f64::INFINITY
            };
            WaldTest {
                name: effect.name.clone(),
                estimate: effect.estimate,
                se: effect.se,
                z,
                p_value: two_sided_normal_p(z),
            }
        })
        .collect()
}

/// P(|Z| > |z|) for a standard normal Z.
fn two_sided_normal_p(z: f64) -> f64 {
    if z.is_infinite() {
        return 0.0;
    }
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

/// Format a test table for terminal output.
pub fn format_wald_tests(tests: &[WaldTest]) -> String {
    let mut s = String::new();
    s.push_str("--- Wald tests (fixed effects) ---\n");
    s.push_str(&format!(
        "{:<14} {:>10} {:>10} {:>8} {:>10}\n",
        "term", "estimate", "SE", "z", "p"
    ));
    for test in tests {
        let stars = if test.p_value < 0.001 {
            "***"
        } else if test.p_value < 0.01 {
            "**"
        } else if test.p_value < 0.05 {
            "*"
        } else {
            ""
        };
        s.push_str(&format!(
            "{:<14} {:>10.4} {:>10.4} {:>8.3} {:>10.2e} {}\n",
            test.name, test.estimate, test.se, test.z, test.p_value, stars
        ));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lmm::{Criterion, NamedEstimate};
    use approx::assert_relative_eq;

    fn result_with(effects: Vec<NamedEstimate>) -> FitResult {
        FitResult {
            criterion: Criterion::Reml,
            converged: true,
            n_evals: 1,
            objective: 0.0,
            theta: vec![1.0],
            sigma: 1.0,
            fixed_effects: effects,
            random_effects: vec![],
            covariance: vec![],
            fitted: vec![],
            residuals: vec![],
            n_obs: 10,
            n_fixed: 1,
            n_theta: 1,
            history: vec![],
        }
    }

    #[test]
    fn z_and_p_values() {
        let result = result_with(vec![
            NamedEstimate {
                name: "a".into(),
                estimate: 1.96,
                se: 1.0,
            },
            NamedEstimate {
                name: "b".into(),
                estimate: 0.0,
                se: 1.0,
            },
        ]);

        let tests = wald_tests(&result);
        assert_relative_eq!(tests[0].z, 1.96, epsilon = 1e-12);
        assert_relative_eq!(tests[0].p_value, 0.05, epsilon = 1e-3);
        assert_relative_eq!(tests[1].p_value, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_se_gives_zero_p() {
        let result = result_with(vec![NamedEstimate {
            name: "a".into(),
            estimate: 2.0,
            se: 0.0,
        }]);
        let tests = wald_tests(&result);
        assert_eq!(tests[0].p_value, 0.0);
    }

    #[test]
    fn table_formats_all_terms() {
        let result = result_with(vec![NamedEstimate {
            name: "(Intercept)".into(),
            estimate: 5.0,
            se: 0.5,
        }]);
        let table = format_wald_tests(&wald_tests(&result));
        assert!(table.contains("(Intercept)"));
        assert!(table.contains("z"));
    }
}
