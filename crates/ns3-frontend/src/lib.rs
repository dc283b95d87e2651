//! An interface to the backend ns-3 simulation.
//!
//! This crate is tightly coupled to the interface provided by the `adhoc-sweep` ns-3 program
//! (`backends/scratch/adhoc-sweep.cc`, to be copied into an ns-3 tree's `scratch/`), which
//! reads a `scenario.txt` from its root directory and writes `flow_stats.txt`,
//! `flowmonitor.xml` and `anim.xml` next to it.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

use std::fs;
use std::net::{AddrParseError, Ipv4Addr};
use std::num::ParseIntError;
use std::path::PathBuf;
use std::{fmt::Write, io};

use adhocsim_core::{
    engine::AppConfig,
    metrics::{FlowRecord, FlowRecords},
    params::DeviceParams,
    topology::Placement,
    units::{Bytes, Nanosecs},
    FlowId, NodeId,
};
use log::{debug, info};

/// An ns-3 simulation of one ad-hoc scenario.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct Ns3Simulation {
    /// The root of the ns-3 source tree (the directory containing the `ns3` script).
    #[builder(setter(into))]
    pub ns3_dir: PathBuf,
    /// The directory in which to write the scenario and read back results.
    #[builder(setter(into))]
    pub data_dir: PathBuf,
    /// The ns-3 program to run.
    #[builder(default = String::from("scratch/adhoc-sweep"), setter(into))]
    pub program: String,
    /// The scenario to simulate.
    pub scenario: Scenario,
}

/// Everything the ns-3 program needs to know to set up a run.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Device and network stack settings.
    pub device: DeviceParams,
    /// Node positions. The number of nodes is the number of positions.
    pub positions: Placement,
    /// Node positions in the animation trace.
    pub anim_positions: Placement,
    /// Applications, in installation order.
    pub apps: Vec<(NodeId, AppConfig)>,
    /// When the simulation stops.
    pub stop: Nanosecs,
}

/// The results of an ns-3 run.
#[derive(Debug)]
pub struct Ns3Output {
    /// Per-flow counters.
    pub records: FlowRecords,
    /// The flow monitor's XML report.
    pub flow_report: PathBuf,
    /// The NetAnim trace.
    pub animation: PathBuf,
}

impl Ns3Simulation {
    /// Run the simulation, returning the flow records and the paths of the files ns-3 wrote.
    ///
    /// This routine can fail due to IO errors, a failing ns-3 process, or errors parsing ns-3
    /// data.
    pub fn run(&self) -> Result<Ns3Output, Error> {
        // Set up directory
        let mk_path = |file: &str| self.data_dir.join(file);
        fs::create_dir_all(&self.data_dir)?;

        // Set up the scenario
        let scenario = translate_scenario(&self.scenario);
        fs::write(mk_path("scenario.txt"), scenario)?;

        // Run ns-3
        info!(
            "Running {} with {} nodes",
            self.program,
            self.scenario.positions.nr_nodes()
        );
        self.invoke_ns3().map_err(Error::Ns3)?;

        // Parse and return results
        let s = fs::read_to_string(mk_path("flow_stats.txt"))?;
        let records = parse_flow_stats(&s)?;
        debug!("ns-3 reported {} flows", records.len());
        Ok(Ns3Output {
            records,
            flow_report: mk_path("flowmonitor.xml"),
            animation: mk_path("anim.xml"),
        })
    }

    fn invoke_ns3(&self) -> io::Result<()> {
        // We need to canonicalize the directories because we run `cd` below.
        let data_dir = fs::canonicalize(&self.data_dir)?;
        let ns3_dir = fs::canonicalize(&self.ns3_dir)?;
        let program = format!("{} --root={}", self.program, data_dir.display());
        cmd_lib::run_cmd! {
            cd ${ns3_dir};
            ./ns3 run ${program} > ${data_dir}/output.txt 2>&1
        }
    }
}

/// The error type for [Ns3Simulation::run].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error parsing ns-3 formats.
    #[error("failed to parse ns-3 format")]
    ParseNs3(#[from] ParseNs3Error),

    /// The ns-3 process failed.
    #[error("ns-3 failed (see output.txt in the data directory)")]
    Ns3(#[source] io::Error),

    /// IO error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn translate_scenario(scenario: &Scenario) -> String {
    let mut s = String::new();
    let device = &scenario.device;
    // First line: node #, stop time (s)
    writeln!(
        s,
        "{} {}",
        scenario.positions.nr_nodes(),
        scenario.stop.into_secs_f64()
    )
    .unwrap();
    // wifi standard rts_cts_threshold base mask pcap app_logging
    writeln!(
        s,
        "wifi {} {} {} {} {} {}",
        device.standard.as_str(),
        device.rts_cts_threshold.into_u64(),
        device.ipv4_base,
        device.ipv4_mask,
        u8::from(device.pcap),
        u8::from(device.app_logging),
    )
    .unwrap();
    // pos id x y
    for (id, p) in scenario.positions.iter() {
        writeln!(s, "pos {id} {} {}", p.x, p.y).unwrap();
    }
    // anim id x y
    for (id, p) in scenario.anim_positions.iter() {
        writeln!(s, "anim {id} {} {}", p.x, p.y).unwrap();
    }
    // sink id port start stop
    // client id dst port max_packets interval_ns packet_size start stop
    for (id, app) in &scenario.apps {
        match app {
            AppConfig::EchoSink { port, start, stop } => writeln!(
                s,
                "sink {id} {port} {} {}",
                start.into_secs_f64(),
                stop.into_secs_f64()
            )
            .unwrap(),
            AppConfig::EchoClient {
                remote,
                port,
                max_packets,
                interval,
                packet_size,
                start,
                stop,
            } => writeln!(
                s,
                "client {id} {remote} {port} {max_packets} {} {} {} {}",
                interval.into_u64(),
                packet_size.into_u64(),
                start.into_secs_f64(),
                stop.into_secs_f64()
            )
            .unwrap(),
        }
    }
    s
}

fn parse_flow_stats(s: &str) -> Result<FlowRecords, ParseNs3Error> {
    s.lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_flow_stat)
        .collect()
}

fn parse_flow_stat(s: &str) -> Result<(FlowId, FlowRecord), ParseNs3Error> {
    // flow_id, sip, dip, tx_bytes, rx_bytes, tx_packets, rx_packets, lost_packets, delay_sum (ns)
    const NR_NS3_FIELDS: usize = 9;
    let fields = s.split_whitespace().collect::<Vec<_>>();
    let nr_fields = fields.len();
    if nr_fields != NR_NS3_FIELDS {
        return Err(ParseNs3Error::WrongNrFields {
            expected: NR_NS3_FIELDS,
            got: nr_fields,
        });
    }
    // The addresses are only checked for well-formedness.
    let _src: Ipv4Addr = fields[1].parse()?;
    let _dst: Ipv4Addr = fields[2].parse()?;
    let record = FlowRecord {
        tx_bytes: Bytes::new(fields[3].parse()?),
        rx_bytes: Bytes::new(fields[4].parse()?),
        tx_packets: fields[5].parse()?,
        rx_packets: fields[6].parse()?,
        lost_packets: fields[7].parse()?,
        delay_sum: Nanosecs::new(fields[8].parse()?),
    };
    Ok((FlowId::new(fields[0].parse()?), record))
}

/// Error parsing ns-3 formats.
#[derive(Debug, thiserror::Error)]
pub enum ParseNs3Error {
    /// Incorrect number of fields.
    #[error("Wrong number of fields (expected {expected}, got {got})")]
    WrongNrFields {
        /// Expected number of fields.
        expected: usize,
        /// Actual number of fields.
        got: usize,
    },

    /// Error parsing field value.
    #[error("Failed to parse field")]
    ParseInt(#[from] ParseIntError),

    /// Error parsing an address.
    #[error("Failed to parse address")]
    ParseAddr(#[from] AddrParseError),
}
