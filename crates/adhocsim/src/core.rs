//! Core `adhocsim` data structures, traits, and routines. The most common entry point is
//! [run_sweep()], which runs a [template](RunParameters) once per node count on an
//! [engine](Engine) and returns one [report](RunReport) per run.

pub use adhocsim_core::*;
