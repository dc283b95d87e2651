//! An engine backed by the `adhoc-sweep` ns-3 program.
//!
//! The context only collects the scenario while it is being composed. The whole run happens in
//! one ns-3 process when the scenario is advanced, and the files that process writes back
//! become the context's records and artifacts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use adhocsim_core::{
    engine::{
        AddressMap, AppConfig, AppHandle, Engine, EngineError, FlowMonitorHandle, NodeSet,
        SimulationContext,
    },
    metrics::FlowRecords,
    params::{DeviceParams, RunParameters},
    topology::{self, Placement},
    units::Nanosecs,
    NodeId,
};
use log::{debug, info};
use ns3_frontend::{Ns3Output, Ns3Simulation, Scenario};

use crate::utils;

/// An ns-3 engine. Each run gets its own data directory, `{root_dir}/{n}-nodes`.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct Ns3Engine {
    /// The directory under which run directories are created.
    #[builder(setter(into))]
    root_dir: PathBuf,
    /// The root of the ns-3 source tree.
    #[builder(setter(into))]
    ns3_dir: PathBuf,
    /// The ns-3 program to run.
    #[builder(default = String::from("scratch/adhoc-sweep"), setter(into))]
    program: String,
}

impl Engine for Ns3Engine {
    type Context = Ns3Context;

    fn name(&self) -> String {
        format!("ns-3 ({})", self.program)
    }

    fn open(&mut self, params: &RunParameters) -> Result<Self::Context, EngineError> {
        if !self.ns3_dir.join("ns3").exists() {
            return Err(EngineError::Rejected(format!(
                "no ns-3 tree at {}",
                self.ns3_dir.display()
            )));
        }
        Ok(Ns3Context {
            data_dir: self.root_dir.join(format!("{}-nodes", params.nr_nodes)),
            ns3_dir: self.ns3_dir.clone(),
            program: self.program.clone(),
            anim_positions: topology::linear(params.nr_nodes, params.anim_spacing),
            nodes: None,
            positions: None,
            device: None,
            monitor: None,
            apps: Vec::new(),
            output: None,
        })
    }
}

/// A scenario being composed for ns-3, and the output of running it.
#[derive(Debug)]
pub struct Ns3Context {
    data_dir: PathBuf,
    ns3_dir: PathBuf,
    program: String,
    anim_positions: Placement,
    nodes: Option<NodeSet>,
    positions: Option<Placement>,
    device: Option<DeviceParams>,
    monitor: Option<FlowMonitorHandle>,
    apps: Vec<(NodeId, AppConfig)>,
    output: Option<Ns3Output>,
}

impl Ns3Context {
    fn check_nodes(&self, nodes: &NodeSet) -> Result<(), EngineError> {
        match &self.nodes {
            Some(ours) if ours == nodes => Ok(()),
            _ => Err(EngineError::Unknown("node set")),
        }
    }

    fn check_monitor(&self, monitor: FlowMonitorHandle) -> Result<(), EngineError> {
        match self.monitor {
            Some(m) if m == monitor => Ok(()),
            _ => Err(EngineError::Unknown("flow monitor")),
        }
    }

    fn output(&self) -> io::Result<&Ns3Output> {
        self.output
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "ns-3 has not run yet"))
    }

    fn scenario(&self, stop: Nanosecs) -> Result<Scenario, EngineError> {
        let positions = self
            .positions
            .clone()
            .ok_or_else(|| EngineError::Rejected("node positions were never set".into()))?;
        let device = self
            .device
            .clone()
            .ok_or_else(|| EngineError::Rejected("no network stack installed".into()))?;
        Ok(Scenario {
            device,
            positions,
            anim_positions: self.anim_positions.clone(),
            apps: self.apps.clone(),
            stop,
        })
    }
}

impl SimulationContext for Ns3Context {
    fn create_nodes(&mut self, n: usize) -> Result<NodeSet, EngineError> {
        let nodes = NodeSet::new(n);
        self.nodes = Some(nodes.clone());
        Ok(nodes)
    }

    fn set_positions(&mut self, nodes: &NodeSet, placement: &Placement) -> Result<(), EngineError> {
        self.check_nodes(nodes)?;
        self.positions = Some(placement.clone());
        Ok(())
    }

    fn install_network_stack(
        &mut self,
        nodes: &NodeSet,
        device: &DeviceParams,
    ) -> Result<AddressMap, EngineError> {
        self.check_nodes(nodes)?;
        utils::check_device(device)?;
        let addresses = utils::assign_addresses(nodes, device)?;
        self.device = Some(device.clone());
        Ok(addresses)
    }

    fn install_flow_instrumentation(
        &mut self,
        nodes: &NodeSet,
    ) -> Result<FlowMonitorHandle, EngineError> {
        self.check_nodes(nodes)?;
        let monitor = FlowMonitorHandle::new(0);
        self.monitor = Some(monitor);
        Ok(monitor)
    }

    fn install_application(
        &mut self,
        node: NodeId,
        app: &AppConfig,
    ) -> Result<AppHandle, EngineError> {
        match &self.nodes {
            Some(nodes) if nodes.contains(node) => {}
            _ => return Err(EngineError::Unknown("node")),
        }
        if let AppConfig::EchoClient { packet_size, .. } = *app {
            utils::check_payload(packet_size)?;
        }
        self.apps.push((node, app.clone()));
        Ok(AppHandle::new(self.apps.len() - 1))
    }

    fn advance_to(&mut self, stop: Nanosecs) -> Result<(), EngineError> {
        let sim = Ns3Simulation::builder()
            .ns3_dir(self.ns3_dir.clone())
            .data_dir(self.data_dir.clone())
            .program(self.program.clone())
            .scenario(self.scenario(stop)?)
            .build();
        let output = sim.run().map_err(|e| EngineError::Backend(Box::new(e)))?;
        self.output = Some(output);
        Ok(())
    }

    fn flow_records(&mut self, monitor: FlowMonitorHandle) -> Result<FlowRecords, EngineError> {
        self.check_monitor(monitor)?;
        Ok(self.output()?.records.clone())
    }

    fn serialize_flow_report(&self, monitor: FlowMonitorHandle, path: &Path) -> io::Result<()> {
        self.check_monitor(monitor)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        fs::copy(&self.output()?.flow_report, path).map(drop)
    }

    fn serialize_animation_trace(&self, path: &Path, placement: &Placement) -> io::Result<()> {
        if placement != &self.anim_positions {
            debug!("ns-3 traced the default animation layout, ignoring the one given");
        }
        fs::copy(&self.output()?.animation, path).map(drop)
    }

    fn teardown(&mut self) {
        // The ns-3 process exited with the run; only its data directory remains.
        info!("Finished with {}", self.data_dir.display());
        self.output = None;
    }
}

#[cfg(test)]
mod tests {
    use adhocsim_core::units::Bytes;

    use super::*;

    #[test]
    fn open_requires_ns3_tree() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut engine = Ns3Engine::builder()
            .root_dir(dir.path())
            .ns3_dir(dir.path().join("missing"))
            .build();
        let params = RunParameters::default().with_nodes(3);
        assert!(matches!(
            engine.open(&params),
            Err(EngineError::Rejected(_))
        ));
        Ok(())
    }

    #[test]
    fn composes_scenario_without_running() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("ns3"), "")?;
        let mut engine = Ns3Engine::builder()
            .root_dir(dir.path().join("data"))
            .ns3_dir(dir.path())
            .build();
        let params = RunParameters::default().with_nodes(3);
        let mut ctx = engine.open(&params)?;
        assert_eq!(ctx.data_dir, dir.path().join("data").join("3-nodes"));

        let nodes = ctx.create_nodes(3)?;
        assert!(matches!(
            ctx.scenario(params.stop),
            Err(EngineError::Rejected(_))
        ));
        ctx.set_positions(&nodes, &params.grid.place(3))?;
        let addrs = ctx.install_network_stack(&nodes, &params.device)?;
        assert_eq!(addrs.nr_addrs(), 3);
        let monitor = ctx.install_flow_instrumentation(&nodes)?;
        ctx.install_application(
            NodeId::new(2),
            &AppConfig::EchoSink {
                port: params.port,
                start: params.start,
                stop: params.stop,
            },
        )?;
        let sink = ctx.apps[0].1.clone();
        assert!(matches!(
            ctx.install_application(NodeId::new(3), &sink),
            Err(EngineError::Unknown("node"))
        ));

        let jumbo = AppConfig::EchoClient {
            remote: addrs.address(NodeId::new(2)).unwrap(),
            port: params.port,
            max_packets: params.max_packets,
            interval: params.interval,
            packet_size: Bytes::new(70_000),
            start: params.start,
            stop: params.stop,
        };
        assert!(matches!(
            ctx.install_application(NodeId::ZERO, &jumbo),
            Err(EngineError::Rejected(_))
        ));

        let scenario = ctx.scenario(params.stop)?;
        assert_eq!(scenario.apps.len(), 1);
        assert_eq!(scenario.anim_positions, topology::linear(3, params.anim_spacing));

        // Nothing ran, so there is nothing to report.
        assert!(ctx.flow_records(monitor).is_err());
        assert!(ctx
            .serialize_flow_report(monitor, &dir.path().join("flowmonitor.xml"))
            .is_err());
        Ok(())
    }
}
