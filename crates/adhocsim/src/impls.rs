//! Simulation engines.

pub use engine_impls::*;
