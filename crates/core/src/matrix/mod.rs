pub mod sparse;

pub use sparse::{cross, spmv, to_dense, xt_y};
