//! One simulation run: composing the scenario on an engine, running it, and exporting its
//! artifacts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use derivative::Derivative;
use log::{debug, info};

use crate::engine::{
    AddressMap, AppConfig, AppHandle, Engine, EngineError, FlowMonitorHandle, NodeSet,
    SimulationContext,
};
use crate::metrics::FlowRecords;
use crate::params::{ParamsError, RunParameters};
use crate::topology::{self, Placement};
use crate::traffic::{TrafficAssignment, TrafficError};
use crate::units::Nanosecs;

/// Composes and runs scenarios on an engine. A runner hands out at most one [`RunHandle`] at a
/// time.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct ScenarioRunner<E> {
    engine: E,
    /// Where flow reports and animation traces are written.
    #[builder(setter(into))]
    artifact_dir: PathBuf,
}

impl<E: Engine> ScenarioRunner<E> {
    /// Opens a simulation context and installs the whole scenario on it: nodes at their grid
    /// positions, the wireless stack, flow monitoring, one echo client per node, and the sink.
    ///
    /// This routine fails before touching the engine if the parameters are invalid or the node
    /// count cannot form a ring. If the engine rejects any part of the scenario, the context is
    /// torn down and the error is returned.
    pub fn prepare(&mut self, params: RunParameters) -> Result<RunHandle<'_, E::Context>, Error> {
        params.validate()?;
        let traffic = TrafficAssignment::build(params.nr_nodes)?;
        let placement = params.grid.place(params.nr_nodes);
        info!(
            "Preparing a {}-node run on the {} engine",
            params.nr_nodes,
            self.engine.name()
        );
        let ctx = self.engine.open(&params).map_err(Error::EngineSetup)?;
        let mut guard = ContextGuard { ctx };
        let installed =
            Installed::new(&mut guard.ctx, &params, &placement, &traffic).map_err(Error::EngineSetup)?;
        Ok(RunHandle {
            guard,
            params,
            placement,
            installed,
            artifact_dir: self.artifact_dir.clone(),
            _runner: std::marker::PhantomData,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }
}

/// Tears the context down when dropped, on every exit path.
struct ContextGuard<C: SimulationContext> {
    ctx: C,
}

impl<C: SimulationContext> Drop for ContextGuard<C> {
    fn drop(&mut self) {
        debug!("Tearing down simulation context");
        self.ctx.teardown();
    }
}

/// What the scenario installed on the engine.
#[derive(Debug)]
struct Installed {
    nodes: NodeSet,
    addresses: AddressMap,
    monitor: FlowMonitorHandle,
    apps: Vec<AppHandle>,
}

impl Installed {
    fn new<C: SimulationContext>(
        ctx: &mut C,
        params: &RunParameters,
        placement: &Placement,
        traffic: &TrafficAssignment,
    ) -> Result<Self, EngineError> {
        let nodes = ctx.create_nodes(params.nr_nodes)?;
        ctx.set_positions(&nodes, placement)?;
        let addresses = ctx.install_network_stack(&nodes, &params.device)?;
        let monitor = ctx.install_flow_instrumentation(&nodes)?;
        let mut apps = Vec::with_capacity(traffic.nr_nodes() + 1);
        for (client, dst) in traffic.destinations() {
            let remote = addresses
                .address(dst)
                .ok_or(EngineError::Unknown("destination address"))?;
            debug!("Client {client} -> node {dst} ({remote}:{})", params.port);
            let app = AppConfig::EchoClient {
                remote,
                port: params.port,
                max_packets: params.max_packets,
                interval: params.interval,
                packet_size: params.packet_size,
                start: params.start,
                stop: params.stop,
            };
            apps.push(ctx.install_application(client, &app)?);
        }
        let sink = AppConfig::EchoSink {
            port: params.port,
            start: params.start,
            stop: params.stop,
        };
        debug!("Sink on node {} port {}", traffic.sink(), params.port);
        apps.push(ctx.install_application(traffic.sink(), &sink)?);
        Ok(Self {
            nodes,
            addresses,
            monitor,
            apps,
        })
    }
}

/// A fully configured simulation that has not been torn down yet. Dropping the handle tears the
/// simulation down.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct RunHandle<'r, C: SimulationContext> {
    #[derivative(Debug = "ignore")]
    guard: ContextGuard<C>,
    params: RunParameters,
    placement: Placement,
    installed: Installed,
    artifact_dir: PathBuf,
    #[derivative(Debug = "ignore")]
    _runner: std::marker::PhantomData<&'r mut ()>,
}

impl<'r, C: SimulationContext> RunHandle<'r, C> {
    /// Runs the simulation until the stop time and snapshots the flow counters.
    ///
    /// This blocks until the engine has processed every event scheduled before the stop time.
    pub fn execute(&mut self) -> Result<RunResult, Error> {
        info!("Simulation running...");
        let ctx = &mut self.guard.ctx;
        ctx.advance_to(self.params.stop).map_err(Error::EngineRun)?;
        let records = ctx
            .flow_records(self.installed.monitor)
            .map_err(Error::EngineRun)?;
        debug!("Collected {} flow records", records.len());
        Ok(RunResult {
            nr_nodes: self.params.nr_nodes,
            records,
            duration: self.params.duration(),
        })
    }

    /// Writes the flow report and the animation trace for this run, named after the node count.
    pub fn export_artifacts(&self) -> Result<ArtifactPaths, Error> {
        let paths = ArtifactPaths::new(&self.artifact_dir, self.params.nr_nodes);
        fs::create_dir_all(&self.artifact_dir).map_err(|source| Error::ArtifactWrite {
            path: self.artifact_dir.clone(),
            source,
        })?;
        let ctx = &self.guard.ctx;
        ctx.serialize_flow_report(self.installed.monitor, &paths.flow_report)
            .map_err(|source| Error::ArtifactWrite {
                path: paths.flow_report.clone(),
                source,
            })?;
        let anim = topology::linear(self.params.nr_nodes, self.params.anim_spacing);
        ctx.serialize_animation_trace(&paths.animation, &anim)
            .map_err(|source| Error::ArtifactWrite {
                path: paths.animation.clone(),
                source,
            })?;
        Ok(paths)
    }

    /// Tears the simulation down.
    pub fn close(self) {
        drop(self);
    }

    pub fn params(&self) -> &RunParameters {
        &self.params
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn addresses(&self) -> &AddressMap {
        &self.installed.addresses
    }

    pub fn nr_apps(&self) -> usize {
        self.installed.apps.len()
    }

    pub fn nr_nodes(&self) -> usize {
        self.installed.nodes.nr_nodes()
    }
}

/// The outcome of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub nr_nodes: usize,
    pub records: FlowRecords,
    /// Stop time minus start time.
    pub duration: Nanosecs,
}

/// The files written by [`RunHandle::export_artifacts`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ArtifactPaths {
    pub flow_report: PathBuf,
    pub animation: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path, nr_nodes: usize) -> Self {
        Self {
            flow_report: dir.join(format!("flowmonitor-{nr_nodes}-nodes.xml")),
            animation: dir.join(format!("anim-{nr_nodes}-nodes.xml")),
        }
    }
}

/// The error type for scenario runs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The node count cannot form a ring.
    #[error("invalid traffic pattern")]
    Traffic(#[from] TrafficError),

    /// The run parameters are invalid.
    #[error("invalid run parameters")]
    InvalidParams(#[from] ParamsError),

    /// The engine rejected the scenario.
    #[error("engine setup failed")]
    EngineSetup(#[source] EngineError),

    /// The engine failed while running.
    #[error("engine failed during the run")]
    EngineRun(#[source] EngineError),

    /// An artifact could not be written.
    #[error("failed to write {}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Whether the error leaves the engine in a state that cannot be trusted for further runs.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::ArtifactWrite { .. })
    }
}
