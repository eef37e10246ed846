use crate::covariance::{Correlated, CovStructure, Diagonal};
use crate::data::DataFrame;
use crate::error::{LmmError, Result};

use super::design::{build_fixed_design, build_random_design};
use super::spec::{ModelSpec, RandomTerm};

/// Builder assembling a [`ModelSpec`] from named DataFrame columns.
///
/// ```
/// use mixedlm_core::data::DataFrame;
/// use mixedlm_core::model::LmmBuilder;
///
/// let mut df = DataFrame::new();
/// df.add_float("reaction", vec![250.0, 260.0, 220.0, 235.0, 210.0, 230.0]).unwrap();
/// df.add_float("days", vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]).unwrap();
/// df.add_factor("subject", &["A", "A", "B", "B", "C", "C"]).unwrap();
///
/// let spec = LmmBuilder::new()
///     .data(&df)
///     .response("reaction")
///     .fixed(&["days"])
///     .random("subject", &["days"])
///     .build()
///     .unwrap();
/// assert_eq!(spec.n_fixed(), 2);
/// ```
pub struct LmmBuilder<'a> {
    data: Option<&'a DataFrame>,
    response: Option<String>,
    fixed: Vec<String>,
    random: Vec<RandomPart>,
}

struct RandomPart {
    group: String,
    slopes: Vec<String>,
    zerocorr: bool,
}

impl<'a> LmmBuilder<'a> {
    pub fn new() -> Self {
        Self {
            data: None,
            response: None,
            fixed: Vec::new(),
            random: Vec::new(),
        }
    }

    pub fn data(mut self, df: &'a DataFrame) -> Self {
        self.data = Some(df);
        self
    }

    /// Response column name.
    pub fn response(mut self, column: &str) -> Self {
        self.response = Some(column.to_string());
        self
    }

    /// Fixed-effect covariate columns. An intercept is always included.
    pub fn fixed(mut self, covariates: &[&str]) -> Self {
        self.fixed = covariates.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add a grouping factor with a correlated (unstructured) template:
    /// a per-level intercept plus one slope per listed covariate.
    pub fn random(mut self, group: &str, slopes: &[&str]) -> Self {
        self.random.push(RandomPart {
            group: group.to_string(),
            slopes: slopes.iter().map(|s| s.to_string()).collect(),
            zerocorr: false,
        });
        self
    }

    /// Like [`LmmBuilder::random`], but with the zerocorr (diagonal) template:
    /// per-level effects are uncorrelated.
    pub fn random_zerocorr(mut self, group: &str, slopes: &[&str]) -> Self {
        self.random.push(RandomPart {
            group: group.to_string(),
            slopes: slopes.iter().map(|s| s.to_string()).collect(),
            zerocorr: true,
        });
        self
    }

    pub fn build(self) -> Result<ModelSpec> {
        let df = self
            .data
            .ok_or_else(|| LmmError::ModelSpec("no data provided".into()))?;
        let response = self
            .response
            .ok_or_else(|| LmmError::ModelSpec("no response column specified".into()))?;

        let y = df.float(&response)?.to_vec();

        let fixed_refs: Vec<&str> = self.fixed.iter().map(|s| s.as_str()).collect();
        let (x, fixed_names) = build_fixed_design(df, &fixed_refs)?;

        let mut terms = Vec::with_capacity(self.random.len());
        for part in &self.random {
            let slope_refs: Vec<&str> = part.slopes.iter().map(|s| s.as_str()).collect();
            let (z, n_levels, level_names, effect_names) =
                build_random_design(df, &part.group, &slope_refs)?;

            let k = effect_names.len();
            let structure: Box<dyn CovStructure> = if part.zerocorr {
                Box::new(Diagonal::new(k))
            } else {
                Box::new(Correlated::new(k))
            };

            terms.push(RandomTerm::new(
                &part.group,
                z,
                n_levels,
                structure,
                level_names,
                effect_names,
            )?);
        }

        ModelSpec::new(&response, y, x, fixed_names, terms)
    }
}

impl Default for LmmBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        let mut df = DataFrame::new();
        df.add_float(
            "reaction",
            vec![250.0, 260.0, 270.0, 220.0, 235.0, 250.0, 210.0, 230.0, 245.0],
        )
        .unwrap();
        df.add_float("days", vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 1.0, 2.0])
            .unwrap();
        df.add_factor(
            "subject",
            &["A", "A", "A", "B", "B", "B", "C", "C", "C"],
        )
        .unwrap();
        df
    }

    #[test]
    fn builds_correlated_intercept_slope_model() {
        let df = sample();
        let spec = LmmBuilder::new()
            .data(&df)
            .response("reaction")
            .fixed(&["days"])
            .random("subject", &["days"])
            .build()
            .unwrap();

        assert_eq!(spec.n_obs(), 9);
        assert_eq!(spec.n_fixed(), 2);
        assert_eq!(spec.terms().len(), 1);
        assert_eq!(spec.terms()[0].n_effects(), 2);
        assert_eq!(spec.terms()[0].structure().name(), "Correlated");
        assert_eq!(spec.n_theta(), 3);
    }

    #[test]
    fn builds_zerocorr_model() {
        let df = sample();
        let spec = LmmBuilder::new()
            .data(&df)
            .response("reaction")
            .fixed(&["days"])
            .random_zerocorr("subject", &["days"])
            .build()
            .unwrap();

        assert_eq!(spec.terms()[0].structure().name(), "Diagonal");
        assert_eq!(spec.n_theta(), 2);
    }

    #[test]
    fn missing_data_or_response_errors() {
        assert!(LmmBuilder::new().response("y").build().is_err());
        let df = sample();
        assert!(LmmBuilder::new().data(&df).build().is_err());
    }

    #[test]
    fn factor_response_errors() {
        let df = sample();
        let err = LmmBuilder::new()
            .data(&df)
            .response("subject")
            .random("subject", &[])
            .build()
            .unwrap_err();
        assert!(matches!(err, LmmError::Data(_)));
    }
}
