//! A deterministic, in-process engine.
//!
//! Nodes share one channel and never contend for it. A packet reaches its destination if the
//! destination runs an echo sink on the right port and lies within radio range. It then takes
//! its serialization time at the standard's base rate plus the propagation delay. Sinks echo
//! every packet back to its sender.

use std::fmt::{self, Write as _};
use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

use adhocsim_core::{
    constants,
    engine::{
        AddressMap, AppConfig, AppHandle, Engine, EngineError, FlowMonitorHandle, NodeSet,
        SimulationContext,
    },
    metrics::{FlowRecord, FlowRecords},
    params::{DeviceParams, RunParameters},
    topology::{Placement, Position},
    units::{Bytes, Nanosecs},
    FlowId, NodeId,
};
use log::{debug, info, trace};
use rustc_hash::FxHashMap;

use crate::utils;

const SPEED_OF_LIGHT: f64 = 299_792_458.0; // m/s

// The first port handed out to a client socket.
const EPHEMERAL_PORT: u16 = 49153;

/// An engine with contention-free links of bounded range.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct IdealEngine {
    /// Radio range in meters.
    #[builder(default = 250.0)]
    range: f64,
}

impl Default for IdealEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Engine for IdealEngine {
    type Context = IdealContext;

    fn name(&self) -> String {
        "ideal".into()
    }

    fn open(&mut self, params: &RunParameters) -> Result<Self::Context, EngineError> {
        if !(self.range.is_finite() && self.range >= 0.0) {
            return Err(EngineError::Rejected(format!(
                "invalid radio range {}",
                self.range
            )));
        }
        debug!("Opening an ideal context for {} nodes", params.nr_nodes);
        Ok(IdealContext::new(self.range))
    }
}

/// The state of one ideal run.
#[derive(Debug)]
pub struct IdealContext {
    range: f64,
    nodes: Option<NodeSet>,
    positions: Vec<Position>,
    device: Option<DeviceParams>,
    addresses: AddressMap,
    monitor: Option<FlowMonitorHandle>,
    clients: Vec<Client>,
    sinks: FxHashMap<(NodeId, u16), Sink>,
    nr_apps: usize,
    now: Nanosecs,
    flows: Vec<Flow>,
    app_events: Vec<AppEvent>,
    torn_down: bool,
}

#[derive(Debug, Clone)]
struct Client {
    node: NodeId,
    remote: Ipv4Addr,
    port: u16,
    max_packets: u32,
    interval: Nanosecs,
    packet_size: Bytes,
    start: Nanosecs,
    stop: Nanosecs,
}

impl Client {
    /// Send times of every packet sent before `until`.
    fn send_times(&self, until: Nanosecs) -> Vec<Nanosecs> {
        let end = self.stop.min(until);
        (0..u64::from(self.max_packets))
            .map(|k| self.start + self.interval.scale_by(k))
            .take_while(|&t| t < end)
            .collect()
    }

    fn wire_size(&self) -> Bytes {
        self.packet_size + constants::UDP_IPV4_OVERHEAD
    }
}

#[derive(Debug, Clone, Copy)]
struct Sink {
    start: Nanosecs,
    stop: Nanosecs,
}

impl Sink {
    fn is_up(&self, t: Nanosecs) -> bool {
        t >= self.start && t < self.stop
    }
}

#[derive(Debug, Clone)]
struct Flow {
    id: FlowId,
    src: (Ipv4Addr, u16),
    dst: (Ipv4Addr, u16),
    record: FlowRecord,
}

/// A packet sent or received by an echo application.
#[derive(Debug, Clone, PartialEq)]
struct AppEvent {
    at: Nanosecs,
    node: NodeId,
    role: Role,
    direction: Direction,
    payload: Bytes,
    peer: (Ipv4Addr, u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Sent,
    Received,
}

impl fmt::Display for AppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            Role::Client => "client",
            Role::Server => "server",
        };
        let (verb, prep) = match self.direction {
            Direction::Sent => ("sent", "to"),
            Direction::Received => ("received", "from"),
        };
        write!(
            f,
            "At time +{}s node {} {role} {verb} {} bytes {prep} {} port {}",
            self.at.into_secs_f64(),
            self.node,
            self.payload.into_u64(),
            self.peer.0,
            self.peer.1
        )
    }
}

/// The outcome of replaying every client.
#[derive(Debug, Default)]
struct Replay {
    flows: Vec<Flow>,
    /// Empty unless application logging is on.
    events: Vec<AppEvent>,
}

impl IdealContext {
    fn new(range: f64) -> Self {
        Self {
            range,
            nodes: None,
            positions: Vec::new(),
            device: None,
            addresses: AddressMap::default(),
            monitor: None,
            clients: Vec::new(),
            sinks: FxHashMap::default(),
            nr_apps: 0,
            now: Nanosecs::ZERO,
            flows: Vec::new(),
            app_events: Vec::new(),
            torn_down: false,
        }
    }

    fn check_live(&self) -> Result<(), EngineError> {
        if self.torn_down {
            return Err(EngineError::Rejected("context was torn down".into()));
        }
        Ok(())
    }

    fn nodes(&self) -> Result<&NodeSet, EngineError> {
        self.nodes.as_ref().ok_or(EngineError::Unknown("node set"))
    }

    fn check_nodes(&self, nodes: &NodeSet) -> Result<(), EngineError> {
        if self.nodes()? != nodes {
            return Err(EngineError::Unknown("node set"));
        }
        Ok(())
    }

    fn check_monitor(&self, monitor: FlowMonitorHandle) -> Result<(), EngineError> {
        match self.monitor {
            Some(m) if m == monitor => Ok(()),
            _ => Err(EngineError::Unknown("flow monitor")),
        }
    }

    /// One-way latency of a packet of `size` over `distance` meters.
    fn latency(&self, size: Bytes, distance: f64) -> Nanosecs {
        let rate = self
            .device
            .as_ref()
            .map(|d| d.standard.base_rate())
            .unwrap_or_default()
            .max(1);
        let serialization = Nanosecs::new(size.into_bits() * 1_000_000_000 / rate);
        serialization + Nanosecs::from_secs_f64(distance / SPEED_OF_LIGHT)
    }

    /// The sink node a client reaches and the one-way latency to it, if the client's packets
    /// can be delivered at all.
    fn route(&self, client: &Client) -> Option<(NodeId, Sink, Nanosecs)> {
        let dst = self.addresses.node(client.remote)?;
        let sink = *self.sinks.get(&(dst, client.port))?;
        let src_pos = self.positions.get(client.node.inner())?;
        let dst_pos = self.positions.get(dst.inner())?;
        let distance = src_pos.distance_to(dst_pos);
        if distance > self.range {
            trace!("{} is {distance:.1}m from {dst}, out of range", client.node);
            return None;
        }
        Some((dst, sink, self.latency(client.wire_size(), distance)))
    }

    /// Replays every client from scratch up to `until`, recording application events in time
    /// order if `log_apps` is set.
    ///
    /// Client flows are numbered from 1 in installation order. Echo flows follow, in the order
    /// of the clients they answer. A client that never sends has no flow.
    fn simulate(&self, until: Nanosecs, log_apps: bool) -> Replay {
        let mut forward = Vec::new();
        let mut echoes = Vec::new();
        let mut events = Vec::new();
        for client in &self.clients {
            let sends = client.send_times(until);
            if sends.is_empty() {
                continue;
            }
            let wire = client.wire_size();
            let src = self
                .addresses
                .address(client.node)
                .unwrap_or(Ipv4Addr::UNSPECIFIED);
            let (server, arrivals, latency) = match self.route(client) {
                Some((dst, sink, latency)) => {
                    let arrivals = sends
                        .iter()
                        .map(|&t| t + latency)
                        .filter(|&t| t < until && sink.is_up(t))
                        .collect::<Vec<_>>();
                    (Some(dst), arrivals, latency)
                }
                None => (None, Vec::new(), Nanosecs::ZERO),
            };
            let end = client.stop.min(until);
            if log_apps {
                let event = |at, node, role, direction, peer| AppEvent {
                    at,
                    node,
                    role,
                    direction,
                    payload: client.packet_size,
                    peer,
                };
                let to_sink = (client.remote, client.port);
                let to_client = (src, EPHEMERAL_PORT);
                for &t in &sends {
                    events.push(event(t, client.node, Role::Client, Direction::Sent, to_sink));
                }
                if let Some(server) = server {
                    for &t in &arrivals {
                        events.push(event(t, server, Role::Server, Direction::Received, to_client));
                        events.push(event(t, server, Role::Server, Direction::Sent, to_client));
                        let back = t + latency;
                        if back < end {
                            let node = client.node;
                            events.push(event(back, node, Role::Client, Direction::Received, to_sink));
                        }
                    }
                }
            }
            forward.push((
                (src, EPHEMERAL_PORT),
                (client.remote, client.port),
                record(wire, sends.len(), arrivals.len(), latency),
            ));
            if arrivals.is_empty() {
                continue;
            }
            let returned = arrivals.iter().filter(|&&t| t + latency < end).count();
            echoes.push((
                (client.remote, client.port),
                (src, EPHEMERAL_PORT),
                record(wire, arrivals.len(), returned, latency),
            ));
        }
        let flows = forward
            .into_iter()
            .chain(echoes)
            .enumerate()
            .map(|(i, (src, dst, record))| Flow {
                id: FlowId::new(i as u32 + 1),
                src,
                dst,
                record,
            })
            .collect();
        events.sort_by_key(|e| e.at);
        Replay { flows, events }
    }
}

fn record(wire: Bytes, sent: usize, received: usize, latency: Nanosecs) -> FlowRecord {
    let (sent, received) = (sent as u64, received as u64);
    FlowRecord {
        tx_bytes: wire.scale_by(sent),
        rx_bytes: wire.scale_by(received),
        tx_packets: sent,
        rx_packets: received,
        lost_packets: sent - received,
        delay_sum: latency.scale_by(received),
    }
}

impl SimulationContext for IdealContext {
    fn create_nodes(&mut self, n: usize) -> Result<NodeSet, EngineError> {
        self.check_live()?;
        if self.nodes.is_some() {
            return Err(EngineError::Rejected("nodes were already created".into()));
        }
        let nodes = NodeSet::new(n);
        self.nodes = Some(nodes.clone());
        Ok(nodes)
    }

    fn set_positions(&mut self, nodes: &NodeSet, placement: &Placement) -> Result<(), EngineError> {
        self.check_live()?;
        self.check_nodes(nodes)?;
        if placement.nr_nodes() != nodes.nr_nodes() {
            return Err(EngineError::Rejected(format!(
                "{} positions for {} nodes",
                placement.nr_nodes(),
                nodes.nr_nodes()
            )));
        }
        self.positions = placement.iter().map(|(_, p)| p).collect();
        Ok(())
    }

    fn install_network_stack(
        &mut self,
        nodes: &NodeSet,
        device: &DeviceParams,
    ) -> Result<AddressMap, EngineError> {
        self.check_live()?;
        self.check_nodes(nodes)?;
        utils::check_device(device)?;
        if device.pcap {
            return Err(EngineError::Rejected("pcap capture is not supported".into()));
        }
        let addresses = utils::assign_addresses(nodes, device)?;
        debug!(
            "Installed {} on {} nodes",
            device.standard.as_str(),
            addresses.nr_addrs()
        );
        self.device = Some(device.clone());
        self.addresses = addresses.clone();
        Ok(addresses)
    }

    fn install_flow_instrumentation(
        &mut self,
        nodes: &NodeSet,
    ) -> Result<FlowMonitorHandle, EngineError> {
        self.check_live()?;
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
        self.check_live()?;
        if !self.nodes()?.contains(node) {
            return Err(EngineError::Unknown("node"));
        }
        if self.addresses.address(node).is_none() {
            return Err(EngineError::Rejected(format!(
                "{node} has no network stack"
            )));
        }
        match *app {
            AppConfig::EchoClient {
                remote,
                port,
                max_packets,
                interval,
                packet_size,
                start,
                stop,
            } => {
                if packet_size == Bytes::ZERO {
                    return Err(EngineError::Rejected("empty echo packets".into()));
                }
                utils::check_payload(packet_size)?;
                self.clients.push(Client {
                    node,
                    remote,
                    port,
                    max_packets,
                    interval,
                    packet_size,
                    start,
                    stop,
                });
            }
            AppConfig::EchoSink { port, start, stop } => {
                if self.sinks.insert((node, port), Sink { start, stop }).is_some() {
                    return Err(EngineError::Rejected(format!(
                        "port {port} is already bound on {node}"
                    )));
                }
            }
        }
        let handle = AppHandle::new(self.nr_apps);
        self.nr_apps += 1;
        Ok(handle)
    }

    fn advance_to(&mut self, stop: Nanosecs) -> Result<(), EngineError> {
        self.check_live()?;
        if stop < self.now {
            return Err(EngineError::Rejected(format!(
                "cannot go back from {} to {stop}",
                self.now
            )));
        }
        let log_apps = self.device.as_ref().is_some_and(|d| d.app_logging);
        let replay = self.simulate(stop, log_apps);
        for event in &replay.events {
            info!("{event}");
        }
        self.flows = replay.flows;
        self.app_events = replay.events;
        self.now = stop;
        debug!("Advanced to {stop} with {} flows", self.flows.len());
        Ok(())
    }

    fn flow_records(&mut self, monitor: FlowMonitorHandle) -> Result<FlowRecords, EngineError> {
        self.check_live()?;
        self.check_monitor(monitor)?;
        Ok(self.flows.iter().map(|f| (f.id, f.record)).collect())
    }

    fn serialize_flow_report(&self, monitor: FlowMonitorHandle, path: &Path) -> io::Result<()> {
        self.check_monitor(monitor)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        fs::write(path, flow_report_xml(&self.flows))
    }

    fn serialize_animation_trace(&self, path: &Path, placement: &Placement) -> io::Result<()> {
        fs::write(path, animation_xml(placement))
    }

    fn teardown(&mut self) {
        debug!("Tearing down ideal context at {}", self.now);
        self.clients.clear();
        self.sinks.clear();
        self.flows.clear();
        self.app_events.clear();
        self.torn_down = true;
    }
}

fn flow_report_xml(flows: &[Flow]) -> String {
    let mut s = String::new();
    s.push_str("<?xml version=\"1.0\" ?>\n<FlowMonitor>\n  <FlowStats>\n");
    for f in flows {
        let r = &f.record;
        writeln!(
            s,
            "    <Flow flowId=\"{}\" txBytes=\"{}\" rxBytes=\"{}\" txPackets=\"{}\" \
             rxPackets=\"{}\" lostPackets=\"{}\" delaySum=\"+{}\" />",
            f.id,
            r.tx_bytes.into_u64(),
            r.rx_bytes.into_u64(),
            r.tx_packets,
            r.rx_packets,
            r.lost_packets,
            r.delay_sum,
        )
        .unwrap();
    }
    s.push_str("  </FlowStats>\n  <Ipv4FlowClassifier>\n");
    for f in flows {
        // Protocol 17 is UDP.
        writeln!(
            s,
            "    <Flow flowId=\"{}\" sourceAddress=\"{}\" destinationAddress=\"{}\" \
             protocol=\"17\" sourcePort=\"{}\" destinationPort=\"{}\" />",
            f.id, f.src.0, f.dst.0, f.src.1, f.dst.1,
        )
        .unwrap();
    }
    s.push_str("  </Ipv4FlowClassifier>\n</FlowMonitor>\n");
    s
}

fn animation_xml(placement: &Placement) -> String {
    let (min, max) = placement.iter().fold(
        (
            Position::new(f64::INFINITY, f64::INFINITY),
            Position::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        ),
        |(lo, hi), (_, p)| {
            (
                Position::new(lo.x.min(p.x), lo.y.min(p.y)),
                Position::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        },
    );
    let (min, max) = if placement.is_empty() {
        (Position::default(), Position::default())
    } else {
        (min, max)
    };
    let mut s = String::new();
    s.push_str("<anim ver=\"netanim-3.108\" filetype=\"animation\" >\n");
    writeln!(
        s,
        "<topology minX = \"{}\" minY = \"{}\" maxX = \"{}\" maxY = \"{}\" width=\"{}\" height=\"{}\">",
        min.x,
        min.y,
        max.x,
        max.y,
        max.x - min.x,
        max.y - min.y
    )
    .unwrap();
    for (id, p) in placement.iter() {
        writeln!(
            s,
            "<node id = \"{id}\" sysId = \"0\" locX = \"{}\" locY = \"{}\" />",
            p.x, p.y
        )
        .unwrap();
    }
    s.push_str("</topology>\n</anim>\n");
    s
}

#[cfg(test)]
mod tests {
    use adhocsim_core::topology::{self, GridLayout};

    use super::*;

    fn client(remote: Ipv4Addr, params: &RunParameters) -> AppConfig {
        AppConfig::EchoClient {
            remote,
            port: params.port,
            max_packets: params.max_packets,
            interval: params.interval,
            packet_size: params.packet_size,
            start: params.start,
            stop: params.stop,
        }
    }

    fn sink(params: &RunParameters) -> AppConfig {
        AppConfig::EchoSink {
            port: params.port,
            start: params.start,
            stop: params.stop,
        }
    }

    /// Two nodes `distance` meters apart, with a client on node 0 and a sink on node 1.
    fn pair(engine: &mut IdealEngine, distance: f64) -> anyhow::Result<(IdealContext, FlowMonitorHandle)> {
        pair_with(engine, distance, &DeviceParams::default())
    }

    fn pair_with(
        engine: &mut IdealEngine,
        distance: f64,
        device: &DeviceParams,
    ) -> anyhow::Result<(IdealContext, FlowMonitorHandle)> {
        let params = RunParameters::default().with_nodes(2);
        let mut ctx = engine.open(&params)?;
        let nodes = ctx.create_nodes(2)?;
        let grid = GridLayout::builder().delta_x(distance).build();
        ctx.set_positions(&nodes, &grid.place(2))?;
        let addrs = ctx.install_network_stack(&nodes, device)?;
        let monitor = ctx.install_flow_instrumentation(&nodes)?;
        let remote = addrs.address(NodeId::new(1)).unwrap();
        ctx.install_application(NodeId::ZERO, &client(remote, &params))?;
        ctx.install_application(NodeId::new(1), &sink(&params))?;
        ctx.advance_to(params.stop)?;
        Ok((ctx, monitor))
    }

    #[test]
    fn delivers_within_range() -> anyhow::Result<()> {
        let (mut ctx, monitor) = pair(&mut IdealEngine::default(), 5.0)?;
        let records = ctx.flow_records(monitor)?;
        // One client flow and its echo.
        assert_eq!(records.len(), 2);
        let sent = records.get(FlowId::ONE).unwrap();
        assert_eq!(sent.tx_packets, 10);
        assert_eq!(sent.rx_packets, 10);
        assert_eq!(sent.lost_packets, 0);
        assert_eq!(sent.tx_bytes, Bytes::new(5400));
        // 540B at 3 Mbit/s, plus 5m of propagation.
        let mean = sent.delay_sum.checked_div(sent.rx_packets).unwrap();
        assert_eq!(mean, Nanosecs::new(1_440_000 + 17));
        let echoed = records.get(FlowId::new(2)).unwrap();
        assert_eq!(echoed.rx_packets, 10);
        Ok(())
    }

    #[test]
    fn drops_out_of_range() -> anyhow::Result<()> {
        let mut engine = IdealEngine::builder().range(100.0).build();
        let (mut ctx, monitor) = pair(&mut engine, 150.0)?;
        let records = ctx.flow_records(monitor)?;
        assert_eq!(records.len(), 1);
        let sent = records.get(FlowId::ONE).unwrap();
        assert_eq!((sent.tx_packets, sent.rx_packets, sent.lost_packets), (10, 0, 10));
        assert_eq!(sent.delay_sum, Nanosecs::ZERO);
        Ok(())
    }

    #[test]
    fn no_sink_means_no_delivery() -> anyhow::Result<()> {
        let params = RunParameters::default().with_nodes(2);
        let mut ctx = IdealEngine::default().open(&params)?;
        let nodes = ctx.create_nodes(2)?;
        ctx.set_positions(&nodes, &params.grid.place(2))?;
        let addrs = ctx.install_network_stack(&nodes, &params.device)?;
        let monitor = ctx.install_flow_instrumentation(&nodes)?;
        let remote = addrs.address(NodeId::ZERO).unwrap();
        ctx.install_application(NodeId::new(1), &client(remote, &params))?;
        ctx.advance_to(params.stop)?;
        let records = ctx.flow_records(monitor)?;
        assert_eq!(records.get(FlowId::ONE).unwrap().rx_packets, 0);
        Ok(())
    }

    #[test]
    fn stopping_early_truncates_sends() -> anyhow::Result<()> {
        let params = RunParameters::default().with_nodes(2);
        let mut ctx = IdealEngine::default().open(&params)?;
        let nodes = ctx.create_nodes(2)?;
        ctx.set_positions(&nodes, &params.grid.place(2))?;
        let addrs = ctx.install_network_stack(&nodes, &params.device)?;
        let monitor = ctx.install_flow_instrumentation(&nodes)?;
        let remote = addrs.address(NodeId::new(1)).unwrap();
        ctx.install_application(NodeId::ZERO, &client(remote, &params))?;
        ctx.install_application(NodeId::new(1), &sink(&params))?;
        // Sends at 1s, 1.005s and 1.010s happen before 1.012s.
        ctx.advance_to(params.start + Nanosecs::from_millis(12))?;
        let records = ctx.flow_records(monitor)?;
        assert_eq!(records.get(FlowId::ONE).unwrap().tx_packets, 3);
        Ok(())
    }

    #[test]
    fn rejects_bad_configurations() -> anyhow::Result<()> {
        let params = RunParameters::default();
        let mut ctx = IdealEngine::default().open(&params)?;
        let nodes = ctx.create_nodes(2)?;
        assert!(matches!(
            ctx.set_positions(&nodes, &params.grid.place(3)),
            Err(EngineError::Rejected(_))
        ));
        assert!(matches!(
            ctx.install_application(NodeId::ZERO, &sink(&params)),
            Err(EngineError::Rejected(_))
        ));
        ctx.install_network_stack(&nodes, &params.device)?;
        assert!(matches!(
            ctx.install_application(NodeId::new(7), &sink(&params)),
            Err(EngineError::Unknown("node"))
        ));
        ctx.install_application(NodeId::ZERO, &sink(&params))?;
        assert!(matches!(
            ctx.install_application(NodeId::ZERO, &sink(&params)),
            Err(EngineError::Rejected(_))
        ));
        assert!(matches!(
            ctx.flow_records(FlowMonitorHandle::new(0)),
            Err(EngineError::Unknown("flow monitor"))
        ));
        Ok(())
    }

    #[test]
    fn oversized_packets_rejected() -> anyhow::Result<()> {
        let params = RunParameters::default().with_nodes(2);
        let mut ctx = IdealEngine::default().open(&params)?;
        let nodes = ctx.create_nodes(2)?;
        let addrs = ctx.install_network_stack(&nodes, &params.device)?;
        let remote = addrs.address(NodeId::new(1)).unwrap();
        let sized = |size| {
            let mut app = client(remote, &params);
            if let AppConfig::EchoClient { packet_size, .. } = &mut app {
                *packet_size = Bytes::new(size);
            }
            app
        };
        ctx.install_application(NodeId::ZERO, &sized(65_507))?;
        for size in [65_508, u64::MAX / 8] {
            assert!(matches!(
                ctx.install_application(NodeId::ZERO, &sized(size)),
                Err(EngineError::Rejected(_))
            ));
        }
        Ok(())
    }

    #[test]
    fn pcap_capture_rejected() -> anyhow::Result<()> {
        let params = RunParameters::default().with_nodes(2);
        let mut ctx = IdealEngine::default().open(&params)?;
        let nodes = ctx.create_nodes(2)?;
        let device = DeviceParams::builder().pcap(true).build();
        assert!(matches!(
            ctx.install_network_stack(&nodes, &device),
            Err(EngineError::Rejected(_))
        ));
        Ok(())
    }

    #[test]
    fn app_logging_records_every_packet() -> anyhow::Result<()> {
        let device = DeviceParams::builder().app_logging(true).build();
        let (ctx, _) = pair_with(&mut IdealEngine::default(), 5.0, &device)?;
        // Each of the 10 packets is sent, received, echoed and received back.
        assert_eq!(ctx.app_events.len(), 40);
        assert!(ctx.app_events.windows(2).all(|w| w[0].at <= w[1].at));
        let lines = ctx.app_events[..4]
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        insta::assert_snapshot!(lines, @r###"
        At time +1s node 0 client sent 512 bytes to 10.1.1.2 port 443
        At time +1.001440017s node 1 server received 512 bytes from 10.1.1.1 port 49153
        At time +1.001440017s node 1 server sent 512 bytes to 10.1.1.1 port 49153
        At time +1.002880034s node 0 client received 512 bytes from 10.1.1.2 port 443
        "###);

        let (quiet, _) = pair(&mut IdealEngine::default(), 5.0)?;
        assert!(quiet.app_events.is_empty());
        Ok(())
    }

    #[test]
    fn unusable_after_teardown() -> anyhow::Result<()> {
        let (mut ctx, monitor) = pair(&mut IdealEngine::default(), 5.0)?;
        ctx.teardown();
        assert!(matches!(
            ctx.flow_records(monitor),
            Err(EngineError::Rejected(_))
        ));
        Ok(())
    }

    #[test]
    fn flow_report_lists_every_flow() -> anyhow::Result<()> {
        let (ctx, monitor) = pair(&mut IdealEngine::default(), 5.0)?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("flowmonitor.xml");
        ctx.serialize_flow_report(monitor, &path)?;
        insta::assert_snapshot!(fs::read_to_string(&path)?, @r###"
        <?xml version="1.0" ?>
        <FlowMonitor>
          <FlowStats>
            <Flow flowId="1" txBytes="5400" rxBytes="5400" txPackets="10" rxPackets="10" lostPackets="0" delaySum="+14400170ns" />
            <Flow flowId="2" txBytes="5400" rxBytes="5400" txPackets="10" rxPackets="10" lostPackets="0" delaySum="+14400170ns" />
          </FlowStats>
          <Ipv4FlowClassifier>
            <Flow flowId="1" sourceAddress="10.1.1.1" destinationAddress="10.1.1.2" protocol="17" sourcePort="49153" destinationPort="443" />
            <Flow flowId="2" sourceAddress="10.1.1.2" destinationAddress="10.1.1.1" protocol="17" sourcePort="443" destinationPort="49153" />
          </Ipv4FlowClassifier>
        </FlowMonitor>
        "###);
        Ok(())
    }

    #[test]
    fn animation_uses_given_positions() {
        let s = animation_xml(&topology::linear(3, 10.0));
        insta::assert_snapshot!(s, @r###"
        <anim ver="netanim-3.108" filetype="animation" >
        <topology minX = "0" minY = "0" maxX = "20" maxY = "0" width="20" height="0">
        <node id = "0" sysId = "0" locX = "0" locY = "0" />
        <node id = "1" sysId = "0" locX = "10" locY = "0" />
        <node id = "2" sysId = "0" locX = "20" locY = "0" />
        </topology>
        </anim>
        "###);
    }
}
