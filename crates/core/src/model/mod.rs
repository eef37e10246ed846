mod builder;
mod design;
mod spec;

pub use builder::LmmBuilder;
pub use design::{build_fixed_design, build_random_design};
pub use spec::{ModelSpec, RandomTerm};
