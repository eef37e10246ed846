//! Gaussian linear mixed models fitted by profiled maximum likelihood.
//!
//! The estimation core represents a mixed model as a validated, immutable
//! [`model::ModelSpec`] (response, fixed-effects design, one random-effects
//! term per grouping factor), concentrates the fixed effects and random
//! effects out of the likelihood with a penalized least-squares solve, and
//! minimizes the resulting profiled ML or REML criterion over the
//! low-dimensional covariance parameter θ with a bounded derivative-free
//! search. The outcome is a serializable [`lmm::FitResult`] with coefficient
//! estimates, conditional means of the random effects, covariance estimates
//! and information criteria; nested fits can be compared with
//! [`lmm::likelihood_ratio_test`].
//!
//! ```no_run
//! use mixedlm_core::data::DataFrame;
//! use mixedlm_core::model::LmmBuilder;
//!
//! let df = DataFrame::from_csv("sleepstudy.csv").unwrap();
//! let spec = LmmBuilder::new()
//!     .data(&df)
//!     .response("reaction")
//!     .fixed(&["days"])
//!     .random("subject", &["days"])
//!     .build()
//!     .unwrap();
//!
//! let fitted = spec.fit_reml().unwrap();
//! println!("{}", fitted.summary());
//! ```

pub mod covariance;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod lmm;
pub mod matrix;
pub mod model;
pub mod types;

pub use error::{LmmError, Result};
pub use lmm::{
    fit, likelihood_ratio_test, Criterion, FitOptions, FitResult, FittedModel, LrtResult,
};
pub use model::{LmmBuilder, ModelSpec};
