mod wald;

pub use wald::{format_wald_tests, wald_tests, WaldTest};
