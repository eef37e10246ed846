mod compare;
mod fit;
mod objective;
mod pls;
mod result;

pub use compare::{likelihood_ratio_test, LrtResult};
pub use fit::{fit, FitOptions};
pub use objective::{Criterion, ObjectiveEvaluation, ProfiledObjective};
pub use pls::{PenalizedLeastSquares, PlsSolution};
pub use result::{CovarianceEstimate, FitResult, FittedModel, NamedEstimate, RanefBlock};
