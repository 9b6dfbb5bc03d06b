//! Query optimizer support: cardinality estimation.

mod histogram;

pub use histogram::{EstimateError, IntHistogram};
