use sprs::TriMat;

use crate::data::DataFrame;
use crate::error::{LmmError, Result};
use crate::types::SparseMat;

/// Build the fixed-effects design matrix X from named covariate columns.
///
/// The first column is always an intercept (all ones); each covariate adds
/// one column of raw values. Returns X with one label per column.
pub fn build_fixed_design(
    df: &DataFrame,
    covariates: &[&str],
) -> Result<(SparseMat, Vec<String>)> {
    let n = df.nrows();
    if n == 0 {
        return Err(LmmError::Data("data has no observations".into()));
    }

    let p = 1 + covariates.len();
    let mut tri = TriMat::new((n, p));
    let mut names = Vec::with_capacity(p);

    for i in 0..n {
        tri.add_triplet(i, 0, 1.0);
    }
    names.push("(Intercept)".to_string());

    for (j, col) in covariates.iter().enumerate() {
        let values = df.float(col)?;
        for (i, &v) in values.iter().enumerate() {
            if v != 0.0 {
                tri.add_triplet(i, 1 + j, v);
            }
        }
        names.push(col.to_string());
    }

    Ok((tri.to_csc(), names))
}

/// Build a grouping factor's random-effects design matrix Z.
///
/// Each level owns a block of k = 1 + |slopes| consecutive columns in
/// level-major order: the per-level intercept first, then one column per
/// slope covariate, non-zero only on that level's rows.
///
/// Returns (Z, number of levels, level names, effect names).
pub fn build_random_design(
    df: &DataFrame,
    group: &str,
    slopes: &[&str],
) -> Result<(SparseMat, usize, Vec<String>, Vec<String>)> {
    let n = df.nrows();
    let factor = df.factor(group)?;
    let q = factor.n_levels();
    let k = 1 + slopes.len();

    let mut tri = TriMat::new((n, q * k));
    for (i, &code) in factor.codes().iter().enumerate() {
        tri.add_triplet(i, code * k, 1.0);
    }

    let mut effect_names = Vec::with_capacity(k);
    effect_names.push("(Intercept)".to_string());

    for (s, col) in slopes.iter().enumerate() {
        let values = df.float(col)?;
        for (i, (&code, &v)) in factor.codes().iter().zip(values.iter()).enumerate() {
            if v != 0.0 {
                tri.add_triplet(i, code * k + 1 + s, v);
            }
        }
        effect_names.push(col.to_string());
    }

    Ok((tri.to_csc(), q, factor.level_names(), effect_names))
}
