use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::constants;
use crate::engine::{
    AddressMap, AppConfig, AppHandle, Engine, EngineError, FlowMonitorHandle, NodeSet,
    SimulationContext,
};
use crate::ident::{FlowId, NodeId};
use crate::metrics::{FlowRecord, FlowRecords};
use crate::params::{DeviceParams, RunParameters};
use crate::topology::Placement;
use crate::units::{Bytes, Nanosecs};

/// A call made on a [`RecordingEngine`] or one of its contexts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Open(usize),
    CreateNodes(usize),
    SetPositions(usize),
    InstallNetworkStack,
    InstallFlowInstrumentation,
    InstallApplication(NodeId, AppConfig),
    AdvanceTo(Nanosecs),
    FlowRecords,
    SerializeFlowReport(PathBuf),
    SerializeAnimationTrace(PathBuf),
    Teardown,
}

impl Call {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Call::Open(_) => "open",
            Call::CreateNodes(_) => "create_nodes",
            Call::SetPositions(_) => "set_positions",
            Call::InstallNetworkStack => "install_network_stack",
            Call::InstallFlowInstrumentation => "install_flow_instrumentation",
            Call::InstallApplication(..) => "install_application",
            Call::AdvanceTo(_) => "advance_to",
            Call::FlowRecords => "flow_records",
            Call::SerializeFlowReport(_) => "serialize_flow_report",
            Call::SerializeAnimationTrace(_) => "serialize_animation_trace",
            Call::Teardown => "teardown",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub(crate) fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// An engine that records every call and fabricates flow records following the ring pattern:
/// client `i` owns flow `i + 1`, and only the client addressing the sink gets its packets
/// through.
#[derive(Debug, Default)]
pub(crate) struct RecordingEngine {
    log: CallLog,
    reject_network_stack_at: Option<usize>,
    fail_artifacts: bool,
}

impl RecordingEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Rejects the network stack of every run.
    pub(crate) fn reject_network_stack(self) -> Self {
        self.reject_network_stack_at(0)
    }

    /// Rejects the network stack of runs with at least `nr_nodes` nodes.
    pub(crate) fn reject_network_stack_at(mut self, nr_nodes: usize) -> Self {
        self.reject_network_stack_at = Some(nr_nodes);
        self
    }

    pub(crate) fn fail_artifacts(mut self) -> Self {
        self.fail_artifacts = true;
        self
    }
}

impl Engine for RecordingEngine {
    type Context = RecordingContext;

    fn name(&self) -> String {
        "recording".into()
    }

    fn open(&mut self, params: &RunParameters) -> Result<Self::Context, EngineError> {
        self.log.push(Call::Open(params.nr_nodes));
        Ok(RecordingContext {
            log: self.log.clone(),
            reject_network_stack: self
                .reject_network_stack_at
                .is_some_and(|n| params.nr_nodes >= n),
            fail_artifacts: self.fail_artifacts,
            max_packets: params.max_packets,
            wire_size: params.packet_size + constants::UDP_IPV4_OVERHEAD,
            nr_nodes: 0,
        })
    }
}

#[derive(Debug)]
pub(crate) struct RecordingContext {
    log: CallLog,
    reject_network_stack: bool,
    fail_artifacts: bool,
    max_packets: u32,
    wire_size: Bytes,
    nr_nodes: usize,
}

impl RecordingContext {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if self.fail_artifacts {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        std::fs::write(path, contents)
    }
}

impl SimulationContext for RecordingContext {
    fn create_nodes(&mut self, n: usize) -> Result<NodeSet, EngineError> {
        self.log.push(Call::CreateNodes(n));
        self.nr_nodes = n;
        Ok(NodeSet::new(n))
    }

    fn set_positions(&mut self, _nodes: &NodeSet, placement: &Placement) -> Result<(), EngineError> {
        self.log.push(Call::SetPositions(placement.nr_nodes()));
        Ok(())
    }

    fn install_network_stack(
        &mut self,
        nodes: &NodeSet,
        device: &DeviceParams,
    ) -> Result<AddressMap, EngineError> {
        self.log.push(Call::InstallNetworkStack);
        if self.reject_network_stack {
            return Err(EngineError::Rejected("invalid MAC parameters".into()));
        }
        let addrs = nodes.iter().filter_map(|id| device.address_of(id)).collect();
        Ok(AddressMap::new(addrs))
    }

    fn install_flow_instrumentation(
        &mut self,
        _nodes: &NodeSet,
    ) -> Result<FlowMonitorHandle, EngineError> {
        self.log.push(Call::InstallFlowInstrumentation);
        Ok(FlowMonitorHandle::new(0))
    }

    fn install_application(
        &mut self,
        node: NodeId,
        app: &AppConfig,
    ) -> Result<AppHandle, EngineError> {
        self.log.push(Call::InstallApplication(node, app.clone()));
        Ok(AppHandle::new(node.inner()))
    }

    fn advance_to(&mut self, stop: Nanosecs) -> Result<(), EngineError> {
        self.log.push(Call::AdvanceTo(stop));
        Ok(())
    }

    fn flow_records(&mut self, _monitor: FlowMonitorHandle) -> Result<FlowRecords, EngineError> {
        self.log.push(Call::FlowRecords);
        let n = self.nr_nodes;
        let sent = u64::from(self.max_packets);
        let records = (0..n)
            .map(|i| {
                let reaches_sink = n >= 2 && i == n - 2;
                let received = if reaches_sink { sent } else { 0 };
                let record = FlowRecord {
                    tx_bytes: self.wire_size.scale_by(sent),
                    rx_bytes: self.wire_size.scale_by(received),
                    tx_packets: sent,
                    rx_packets: received,
                    lost_packets: sent - received,
                    delay_sum: Nanosecs::from_millis(1).scale_by(received),
                };
                (FlowId::new(i as u32 + 1), record)
            })
            .collect();
        Ok(records)
    }

    fn serialize_flow_report(&self, _monitor: FlowMonitorHandle, path: &Path) -> io::Result<()> {
        self.log.push(Call::SerializeFlowReport(path.to_owned()));
        self.write(path, "<FlowMonitor/>\n")
    }

    fn serialize_animation_trace(&self, path: &Path, placement: &Placement) -> io::Result<()> {
        self.log.push(Call::SerializeAnimationTrace(path.to_owned()));
        self.write(path, &format!("<anim nodes=\"{}\"/>\n", placement.nr_nodes()))
    }

    fn teardown(&mut self) {
        self.log.push(Call::Teardown);
    }
}
