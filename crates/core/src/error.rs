use thiserror::Error;

#[derive(Error, Debug)]
pub enum LmmError {
    #[error("Fixed-effects design matrix is rank deficient: rank {rank} < {ncols} columns")]
    RankDeficientDesign { rank: usize, ncols: usize },

    #[error("Grouping factor '{term}' has {n_levels} level(s); at least 2 are required")]
    DegenerateGroupingFactor { term: String, n_levels: usize },

    #[error("Joint normal equations are not positive definite: {0}")]
    SingularCovariance(String),

    #[error("Models are not nested: {0}")]
    NotNested(String),

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Dimension mismatch: expected {expected}, got {got} in {context}")]
    DimensionMismatch {
        expected: usize,
        got: usize,
        context: String,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Model specification error: {0}")]
    ModelSpec(String),

    #[error("Optimizer failure: {0}")]
    Optimization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, LmmError>;
