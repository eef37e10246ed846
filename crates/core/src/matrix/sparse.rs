use sprs::CsMat;

use crate::types::DenseMatrix;

/// Multiply a sparse matrix by a dense vector: result = A * x.
pub fn spmv(a: &CsMat<f64>, x: &[f64]) -> Vec<f64> {
    assert_eq!(a.cols(), x.len());
    let mut result = vec![0.0; a.rows()];
    for (val, (row, col)) in a.iter() {
        result[row] += val * x[col];
    }
    result
}

/// Compute Aᵀ * y for a sparse matrix A and dense vector y.
pub fn xt_y(a: &CsMat<f64>, y: &[f64]) -> Vec<f64> {
    assert_eq!(a.rows(), y.len());
    let mut result = vec![0.0; a.cols()];
    for (val, (row, col)) in a.iter() {
        result[col] += val * y[row];
    }
    result
}

/// Compute the dense cross-product Aᵀ * B of two sparse matrices with the
/// same number of rows.
///
/// The result is dense because cross-products of design matrices are small
/// (columns × columns), even when the designs themselves are large and sparse.
pub fn cross(a: &CsMat<f64>, b: &CsMat<f64>) -> DenseMatrix {
    assert_eq!(a.rows(), b.rows(), "cross: row dimensions differ");

    let a_csc = if a.is_csc() { a.clone() } else { a.to_csc() };
    let b_csc = if b.is_csc() { b.clone() } else { b.to_csc() };

    let p = a_csc.cols();
    let q = b_csc.cols();
    let mut result = DenseMatrix::zeros(p, q);

    for i in 0..p {
        if let Some(col_a) = a_csc.outer_view(i) {
            for j in 0..q {
                if let Some(col_b) = b_csc.outer_view(j) {
                    result[(i, j)] = col_a.dot(&col_b);
                }
            }
        }
    }

    result
}

/// Expand a sparse matrix into a dense one (used for rank checks and
/// column-wise model comparison, where the matrices are small).
pub fn to_dense(a: &CsMat<f64>) -> DenseMatrix {
    let mut result = DenseMatrix::zeros(a.rows(), a.cols());
    for (val, (row, col)) in a.iter() {
        result[(row, col)] = *val;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    fn small_matrix() -> CsMat<f64> {
        // 3x2: [[1, 0], [1, 2], [0, 3]]
        let mut tri = TriMat::new((3, 2));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(1, 0, 1.0);
        tri.add_triplet(1, 1, 2.0);
        tri.add_triplet(2, 1, 3.0);
        tri.to_csc()
    }

    #[test]
    fn spmv_matches_dense_product() {
        let a = small_matrix();
        let result = spmv(&a, &[2.0, -1.0]);
        assert_relative_eq!(result[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(result[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(result[2], -3.0, epsilon = 1e-12);
    }

    #[test]
    fn xt_y_matches_dense_product() {
        let a = small_matrix();
        let result = xt_y(&a, &[1.0, 2.0, 3.0]);
        assert_relative_eq!(result[0], 3.0, epsilon = 1e-12); // 1*1 + 1*2
        assert_relative_eq!(result[1], 13.0, epsilon = 1e-12); // 2*2 + 3*3
    }

    #[test]
    fn cross_is_transpose_product() {
        let a = small_matrix();
        let ata = cross(&a, &a);
        // AᵀA = [[2, 2], [2, 13]]
        assert_relative_eq!(ata[(0, 0)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(ata[(0, 1)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(ata[(1, 0)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(ata[(1, 1)], 13.0, epsilon = 1e-12);
    }

    #[test]
    fn cross_of_distinct_matrices() {
        let a = small_matrix();
        let mut tri = TriMat::new((3, 1));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(1, 0, 1.0);
        tri.add_triplet(2, 0, 1.0);
        let ones = tri.to_csc();

        let atb = cross(&a, &ones);
        assert_eq!(atb.nrows(), 2);
        assert_eq!(atb.ncols(), 1);
        assert_relative_eq!(atb[(0, 0)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(atb[(1, 0)], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn to_dense_round_trip() {
        let a = small_matrix();
        let d = to_dense(&a);
        assert_eq!(d.nrows(), 3);
        assert_eq!(d.ncols(), 2);
        assert_relative_eq!(d[(1, 1)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(d[(2, 0)], 0.0, epsilon = 1e-12);
    }
}
