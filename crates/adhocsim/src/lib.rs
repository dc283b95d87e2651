//! `adhocsim` sweeps a wireless ad-hoc echo scenario over a range of node counts. Every run
//! places `N` nodes on a grid, has each node send UDP echo traffic to its ring neighbor while
//! the last node echoes, and reduces the flow monitor's counters into throughput, delay and
//! loss figures.

#![warn(unreachable_pub, missing_docs)]

pub mod core;
pub mod utils;

pub mod impls;
