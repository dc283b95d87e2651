//! The interface to simulation engines.
//!
//! An [`Engine`] opens one [`SimulationContext`] per run. The context owns everything the
//! engine knows about that run (clock, event queue, nodes, applications) and is torn down
//! before the next one is opened.

use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::ident::NodeId;
use crate::metrics::FlowRecords;
use crate::params::{DeviceParams, RunParameters};
use crate::topology::Placement;
use crate::units::{Bytes, Nanosecs};

/// A simulation engine.
pub trait Engine {
    /// The per-run state of the engine.
    type Context: SimulationContext;

    /// A short name for logs.
    fn name(&self) -> String;

    /// Initializes the engine for one run.
    fn open(&mut self, params: &RunParameters) -> Result<Self::Context, EngineError>;
}

/// One simulation instance, from node creation to teardown.
pub trait SimulationContext {
    /// Creates `n` nodes with IDs `0..n`.
    fn create_nodes(&mut self, n: usize) -> Result<NodeSet, EngineError>;

    /// Pins every node to a fixed position.
    fn set_positions(&mut self, nodes: &NodeSet, placement: &Placement) -> Result<(), EngineError>;

    /// Installs devices, the internet stack, addresses and routes on `nodes`.
    fn install_network_stack(
        &mut self,
        nodes: &NodeSet,
        device: &DeviceParams,
    ) -> Result<AddressMap, EngineError>;

    /// Tracks every flow between `nodes`.
    fn install_flow_instrumentation(
        &mut self,
        nodes: &NodeSet,
    ) -> Result<FlowMonitorHandle, EngineError>;

    /// Installs an application on `node`.
    fn install_application(
        &mut self,
        node: NodeId,
        app: &AppConfig,
    ) -> Result<AppHandle, EngineError>;

    /// Processes all events up to `stop`. Blocks until done.
    fn advance_to(&mut self, stop: Nanosecs) -> Result<(), EngineError>;

    /// A snapshot of the counters collected by `monitor`.
    fn flow_records(&mut self, monitor: FlowMonitorHandle) -> Result<FlowRecords, EngineError>;

    /// Writes the flow monitor's report to `path`.
    fn serialize_flow_report(&self, monitor: FlowMonitorHandle, path: &Path) -> io::Result<()>;

    /// Writes an animation trace with nodes at the given positions to `path`.
    fn serialize_animation_trace(&self, path: &Path, placement: &Placement) -> io::Result<()>;

    /// Destroys the simulation. Called exactly once, after which the context is dropped.
    fn teardown(&mut self);
}

/// The nodes created by [`SimulationContext::create_nodes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet {
    nodes: Vec<NodeId>,
}

impl NodeSet {
    pub fn new(n: usize) -> Self {
        Self {
            nodes: (0..n).map(NodeId::new).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.inner() < self.nodes.len()
    }

    delegate::delegate! {
        to self.nodes {
            #[call(len)]
            pub fn nr_nodes(&self) -> usize;
        }
    }
}

/// The addresses assigned by [`SimulationContext::install_network_stack`].
#[derive(Debug, Clone, Default)]
pub struct AddressMap {
    addrs: Vec<Ipv4Addr>,
    nodes: FxHashMap<Ipv4Addr, NodeId>,
}

impl AddressMap {
    /// Builds a map in which node `i` has address `addrs[i]`.
    pub fn new(addrs: Vec<Ipv4Addr>) -> Self {
        let nodes = addrs
            .iter()
            .enumerate()
            .map(|(i, &addr)| (addr, NodeId::new(i)))
            .collect();
        Self { addrs, nodes }
    }

    pub fn address(&self, node: NodeId) -> Option<Ipv4Addr> {
        self.addrs.get(node.inner()).copied()
    }

    pub fn node(&self, addr: Ipv4Addr) -> Option<NodeId> {
        self.nodes.get(&addr).copied()
    }

    delegate::delegate! {
        to self.addrs {
            #[call(len)]
            pub fn nr_addrs(&self) -> usize;
        }
    }
}

/// An application to install on a node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum AppConfig {
    /// Sends `max_packets` packets of `packet_size` to `remote:port`, one every `interval`,
    /// and listens for the echoes.
    EchoClient {
        remote: Ipv4Addr,
        port: u16,
        max_packets: u32,
        interval: Nanosecs,
        packet_size: Bytes,
        start: Nanosecs,
        stop: Nanosecs,
    },
    /// Echoes every packet received on `port` back to its sender.
    EchoSink {
        port: u16,
        start: Nanosecs,
        stop: Nanosecs,
    },
}

impl AppConfig {
    pub fn is_sink(&self) -> bool {
        matches!(self, AppConfig::EchoSink { .. })
    }
}

/// An installed application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_new::new)]
pub struct AppHandle(usize);

/// Installed flow instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_new::new)]
pub struct FlowMonitorHandle(usize);

impl FlowMonitorHandle {
    pub fn inner(self) -> usize {
        self.0
    }
}

/// An error reported by an engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine refused the configuration.
    #[error("engine rejected configuration: {0}")]
    Rejected(String),

    /// A node, application or monitor handle the engine does not know.
    #[error("unknown {0}")]
    Unknown(&'static str),

    /// An engine backend failed.
    #[error("engine backend failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// IO error.
    #[error(transparent)]
    Io(#[from] io::Error),
}
