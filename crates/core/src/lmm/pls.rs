use crate::error::{LmmError, Result};
use crate::matrix::{cross, xt_y};
use crate::model::ModelSpec;
use crate::types::{DenseMatrix, DenseVector};

/// Penalized least-squares workspace for one model.
///
/// For a trial value of θ the joint normal equations, with the random-effects
/// coordinates ordered before the fixed effects, are
///
/// ```text
/// [ Λᵀ ZᵀZ Λ + I    Λᵀ ZᵀX ] [u]   [Λᵀ Zᵀy]
/// [   XᵀZ Λ          XᵀX   ] [β] = [ Xᵀy  ]
/// ```
///
/// which minimize ‖y − Xβ − ZΛu‖² + ‖u‖² jointly over (u, β). The
/// θ-independent cross-products are computed once per fit; each evaluation
/// only rescales them by the per-term relative factors λₖ(θ) and refactors.
///
/// The random block is ordered first so that the leading q×q part of the
/// Cholesky factor is the factor of ΛᵀZᵀZΛ + I, whose log-determinant is the
/// penalty term of the profiled deviance, and the trailing p×p part is the
/// factor of XᵀV⁻¹X, which the REML criterion needs.
#[derive(Debug)]
pub struct PenalizedLeastSquares {
    p: usize,
    q_total: usize,
    /// Start of each term's coordinate block within the random part.
    offsets: Vec<usize>,
    /// Coordinate count (qₖ·kₖ) per term.
    coords: Vec<usize>,
    /// ZₖᵀZₗ for every term pair.
    ztz: Vec<Vec<DenseMatrix>>,
    /// ZₖᵀX per term.
    ztx: Vec<DenseMatrix>,
    xtx: DenseMatrix,
    /// Zₖᵀy per term.
    zty: Vec<DenseVector>,
    xty: DenseVector,
    yty: f64,
}

/// Solution of the penalized system at one θ.
#[derive(Debug, Clone)]
pub struct PlsSolution {
    /// Spherical random-effects coordinates û per term (the conditional means
    /// on the data scale are λₖûₖ per level).
    pub u: Vec<Vec<f64>>,
    /// Fixed-effects estimate β̂ at this θ.
    pub beta: Vec<f64>,
    /// Penalized residual sum of squares ‖y − Xβ̂ − ZΛû‖² + ‖û‖².
    pub rss: f64,
    /// log|ΛᵀZᵀZΛ + I|.
    pub logdet_ltheta: f64,
    /// log|XᵀV⁻¹X|, from the trailing block of the factor.
    pub logdet_lx: f64,
}

impl PenalizedLeastSquares {
    pub fn new(spec: &ModelSpec) -> Self {
        let x = spec.x();
        let y = spec.y();
        let terms = spec.terms();

        let coords: Vec<usize> = terms.iter().map(|t| t.n_coords()).collect();
        let mut offsets = Vec::with_capacity(terms.len());
        let mut q_total = 0;
        for &c in &coords {
            offsets.push(q_total);
            q_total += c;
        }

        let ztz = terms
            .iter()
            .map(|tk| terms.iter().map(|tl| cross(tk.z(), tl.z())).collect())
            .collect();
        let ztx = terms.iter().map(|t| cross(t.z(), x)).collect();
        let zty = terms
            .iter()
            .map(|t| DenseVector::from_column_slice(&xt_y(t.z(), y)))
            .collect();

        Self {
            p: spec.n_fixed(),
            q_total,
            offsets,
            coords,
            ztz,
            ztx,
            xtx: cross(x, x),
            zty,
            xty: DenseVector::from_column_slice(&xt_y(x, y)),
            yty: y.iter().map(|v| v * v).sum(),
        }
    }

    /// Solve the penalized system at θ.
    pub fn solve(&self, spec: &ModelSpec, theta: &[f64]) -> Result<PlsSolution> {
        Ok(self.solve_inner(spec, theta, false)?.0)
    }

    /// Solve and additionally return the unscaled covariance of β̂,
    /// (XᵀV⁻¹X)⁻¹; multiply by σ̂² for standard errors.
    pub fn solve_detailed(
        &self,
        spec: &ModelSpec,
        theta: &[f64],
    ) -> Result<(PlsSolution, DenseMatrix)> {
        let (sol, cov) = self.solve_inner(spec, theta, true)?;
        Ok((sol, cov.expect("covariance requested")))
    }

    fn solve_inner(
        &self,
        spec: &ModelSpec,
        theta: &[f64],
        with_cov: bool,
    ) -> Result<(PlsSolution, Option<DenseMatrix>)> {
        let lambdas = spec.relative_factors(theta)?;
        let n_terms = lambdas.len();
        let dim = self.q_total + self.p;

        let mut c = DenseMatrix::zeros(dim, dim);
        let mut rhs = DenseVector::zeros(dim);

        for k in 0..n_terms {
            let off_k = self.offsets[k];
            let lam_k = &lambdas[k];

            // ΛₖᵀZₖᵀZₖΛₖ + I
            let mut diag = scale_cols(&scale_rows(&self.ztz[k][k], lam_k), lam_k);
            for i in 0..diag.nrows() {
                diag[(i, i)] += 1.0;
            }
            c.view_mut((off_k, off_k), (diag.nrows(), diag.ncols()))
                .copy_from(&diag);

            // cross-term blocks ΛₖᵀZₖᵀZₗΛₗ
            for l in k + 1..n_terms {
                let off_l = self.offsets[l];
                let block = scale_cols(&scale_rows(&self.ztz[k][l], lam_k), &lambdas[l]);
                c.view_mut((off_k, off_l), (block.nrows(), block.ncols()))
                    .copy_from(&block);
                c.view_mut((off_l, off_k), (block.ncols(), block.nrows()))
                    .copy_from(&block.transpose());
            }

            // ΛₖᵀZₖᵀX
            let zx = scale_rows(&self.ztx[k], lam_k);
            c.view_mut((off_k, self.q_total), (zx.nrows(), self.p))
                .copy_from(&zx);
            c.view_mut((self.q_total, off_k), (self.p, zx.nrows()))
                .copy_from(&zx.transpose());

            // ΛₖᵀZₖᵀy
            let zy = scale_vec(&self.zty[k], lam_k);
            rhs.rows_mut(off_k, zy.len()).copy_from(&zy);
        }

        c.view_mut((self.q_total, self.q_total), (self.p, self.p))
            .copy_from(&self.xtx);
        rhs.rows_mut(self.q_total, self.p).copy_from(&self.xty);

        let chol = c.cholesky().ok_or_else(|| {
            LmmError::SingularCovariance(
                "Cholesky factorization of the joint normal equations failed".into(),
            )
        })?;

        let sol = chol.solve(&rhs);

        let l = chol.l();
        let logdet_ltheta = 2.0 * (0..self.q_total).map(|i| l[(i, i)].ln()).sum::<f64>();
        let logdet_lx = 2.0 * (self.q_total..dim).map(|i| l[(i, i)].ln()).sum::<f64>();

        // ‖y − Xβ̂ − ZΛû‖² + ‖û‖² collapses to yᵀy − solᵀ·rhs at the optimum;
        // clamp to keep the logarithm finite on an exact fit.
        let rss = (self.yty - sol.dot(&rhs)).max(f64::MIN_POSITIVE);

        let u: Vec<Vec<f64>> = (0..n_terms)
            .map(|k| {
                sol.rows(self.offsets[k], self.coords[k])
                    .iter()
                    .cloned()
                    .collect()
            })
            .collect();
        let beta: Vec<f64> = sol.rows(self.q_total, self.p).iter().cloned().collect();

        let cov_beta = if with_cov {
            let c_inv = chol.inverse();
            Some(
                c_inv
                    .view((self.q_total, self.q_total), (self.p, self.p))
                    .into_owned(),
            )
        } else {
            None
        };

        Ok((
            PlsSolution {
                u,
                beta,
                rss,
                logdet_ltheta,
                logdet_lx,
            },
            cov_beta,
        ))
    }
}

/// (I ⊗ λᵀ) · m for a matrix whose rows are grouped in blocks of λ's order.
fn scale_rows(m: &DenseMatrix, lambda: &DenseMatrix) -> DenseMatrix {
    let k = lambda.nrows();
    let lt = lambda.transpose();
    let mut out = DenseMatrix::zeros(m.nrows(), m.ncols());
    for b in 0..m.nrows() / k {
        let block = &lt * m.rows(b * k, k);
        out.rows_mut(b * k, k).copy_from(&block);
    }
    out
}

/// m · (I ⊗ λ) for a matrix whose columns are grouped in blocks of λ's order.
fn scale_cols(m: &DenseMatrix, lambda: &DenseMatrix) -> DenseMatrix {
    let k = lambda.nrows();
    let mut out = DenseMatrix::zeros(m.nrows(), m.ncols());
    for b in 0..m.ncols() / k {
        let block = m.columns(b * k, k) * lambda;
        out.columns_mut(b * k, k).copy_from(&block);
    }
    out
}

/// (I ⊗ λᵀ) · v.
fn scale_vec(v: &DenseVector, lambda: &DenseMatrix) -> DenseVector {
    let k = lambda.nrows();
    let lt = lambda.transpose();
    let mut out = DenseVector::zeros(v.len());
    for b in 0..v.len() / k {
        let block = &lt * v.rows(b * k, k);
        out.rows_mut(b * k, k).copy_from(&block);
    }
    out
}
