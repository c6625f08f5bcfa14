//! Helpers shared by the tests of the workspace crates.

mod approx_eq;
pub mod serp;

pub use float_cmp::approx_eq;

pub use crate::approx_eq::ApproxEqIter;
