#![warn(unreachable_pub, missing_debug_implementations)]

//! The core `adhocsim` library. This crate defines how a single wireless ad-hoc
//! [scenario](scenario::ScenarioRunner) is composed on top of a simulation
//! [engine](engine::Engine), how raw flow counters are [reduced](metrics::reduce) into
//! throughput, delay and loss figures, and how runs are [swept](sweep::Sweep) over a range of
//! node counts.

#[macro_use]
mod ident;

pub mod constants;
pub mod engine;
pub mod metrics;
pub mod params;
pub mod report;
pub mod scenario;
pub mod sweep;
pub mod topology;
pub mod traffic;
pub mod units;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{Engine, EngineError, SimulationContext};
pub use ident::{FlowId, NodeId};
pub use metrics::{reduce, FlowMetrics, FlowRecord, FlowRecords};
pub use params::{DeviceParams, RunParameters};
pub use report::{FlowReport, RunReport};
pub use scenario::{RunHandle, RunResult, ScenarioRunner};
pub use sweep::{run_sweep, Sweep};
pub use topology::{GridLayout, Placement, Position};
pub use traffic::TrafficAssignment;
