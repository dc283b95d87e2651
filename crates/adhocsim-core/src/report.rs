//! Per-flow and per-run reports.

use std::fmt;

use crate::constants;
use crate::ident::FlowId;
use crate::metrics::FlowMetrics;
use crate::scenario::{ArtifactPaths, RunResult};
use crate::units::Nanosecs;

/// The statistics of one flow.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FlowReport {
    pub flow_id: FlowId,
    pub tx_packets: u64,
    pub rx_packets: u64,
    #[serde(flatten)]
    pub metrics: FlowMetrics,
}

impl fmt::Display for FlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "======= FlowID: {} =======", self.flow_id)?;
        writeln!(f, "TX bitrate: {}", OrNone(self.metrics.tx_bitrate))?;
        writeln!(f, "RX bitrate: {}", OrNone(self.metrics.rx_bitrate))?;
        writeln!(f, "TX packets: {}", self.tx_packets)?;
        writeln!(f, "RX packets: {}", self.rx_packets)?;
        writeln!(f, "Mean delay: {}", OrNone(self.metrics.mean_delay))?;
        match self.metrics.loss_ratio {
            Some(ratio) => writeln!(f, "Packet loss ratio: {ratio:.2}%"),
            None => writeln!(f, "Packet loss ratio: None"),
        }
    }
}

struct OrNone<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for OrNone<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("None"),
        }
    }
}

/// Reduces the client flows of a run, in flow ID order.
///
/// Client flows carry IDs `2..=N`; IDs 0 and 1 are never reported. A flow the engine has no
/// record of is reported with zeroed counters.
pub fn reduce_run(result: &RunResult) -> Vec<FlowReport> {
    // Validated parameters keep the node count within flow ID range.
    let last = u32::try_from(result.nr_nodes).unwrap_or(u32::MAX);
    (constants::FIRST_REPORTED_FLOW..=last)
        .map(FlowId::new)
        .map(|flow_id| {
            let record = result.records.get_or_default(flow_id);
            FlowReport {
                flow_id,
                tx_packets: record.tx_packets,
                rx_packets: record.rx_packets,
                metrics: record.reduce(result.duration),
            }
        })
        .collect()
}

/// Everything reported about one run of a sweep.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RunReport {
    pub nr_nodes: usize,
    pub duration: Nanosecs,
    pub flows: Vec<FlowReport>,
    /// The artifacts written, if exporting succeeded.
    pub artifacts: Option<ArtifactPaths>,
    /// Why exporting artifacts failed, if it did.
    pub artifact_error: Option<String>,
}

impl RunReport {
    pub fn new(result: &RunResult, artifacts: Option<ArtifactPaths>) -> Self {
        Self {
            nr_nodes: result.nr_nodes,
            duration: result.duration,
            flows: reduce_run(result),
            artifacts,
            artifact_error: None,
        }
    }

    pub fn with_artifact_error(mut self, error: impl fmt::Display) -> Self {
        self.artifact_error = Some(error.to_string());
        self
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flow in &self.flows {
            write!(f, "{flow}")?;
        }
        writeln!(f, "Simulation for {} nodes", self.nr_nodes)
    }
}
