/// The scalar type used throughout the library.
pub type Scalar = f64;

/// Dense matrix type (column-major).
pub type DenseMatrix = nalgebra::DMatrix<Scalar>;

/// Dense vector type.
pub type DenseVector = nalgebra::DVector<Scalar>;

/// Sparse matrix type (CSC format), used for the design matrices X and Z.
pub type SparseMat = sprs::CsMat<Scalar>;
