use std::path::PathBuf;

use adhocsim_core::{
    constants, units::Nanosecs, Engine, RunParameters, RunReport, ScenarioRunner, Sweep,
};
use clap::{Parser, ValueEnum};
use engine_impls::{IdealEngine, Ns3Engine};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

/// Sweep an ad-hoc echo scenario over a range of node counts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Smallest number of nodes
    #[arg(long, default_value_t = constants::MIN_NODES)]
    min_nodes: usize,

    /// Largest number of nodes
    #[arg(long, default_value_t = constants::MAX_NODES)]
    max_nodes: usize,

    /// Milliseconds between echo packets [default: 5]
    #[arg(long)]
    interval: Option<u64>,

    /// Packets each client sends [default: 10]
    #[arg(long)]
    max_packets: Option<u32>,

    /// Directory for flow monitor reports and animation traces
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Simulation engine
    #[arg(long, value_enum, default_value_t = EngineKind::Ideal)]
    engine: EngineKind,

    /// Root of the ns-3 tree
    #[arg(long, required_if_eq("engine", "ns3"))]
    ns3_dir: Option<PathBuf>,

    /// Directory for ns-3 run directories
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// ns-3 program to run
    #[arg(long, default_value = "scratch/adhoc-sweep")]
    program: String,

    /// Radio range of the ideal engine, in meters
    #[arg(long, default_value_t = 250.0)]
    range: f64,

    /// Capture packets on every device (ns-3 engine only)
    #[arg(long)]
    pcap: bool,

    /// Log every echo packet
    #[arg(long)]
    app_logging: bool,

    /// Run template (JSON or Dhall)
    #[arg(long)]
    template: Option<PathBuf>,

    /// Where to write a summary of the sweep (JSON or MsgPack)
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Don't show a progress bar
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineKind {
    /// Contention-free links of bounded range
    Ideal,
    /// The `adhoc-sweep` ns-3 program
    Ns3,
}

impl Args {
    /// The template every run starts from. Flags override the template file.
    fn template(&self) -> anyhow::Result<RunParameters> {
        let mut params = match &self.template {
            Some(path) => adhocsim_utils::read_template(path)?,
            None => RunParameters::default(),
        };
        if let Some(ms) = self.interval {
            params.interval = Nanosecs::from_millis(ms);
        }
        if let Some(n) = self.max_packets {
            params.max_packets = n;
        }
        params.device.pcap |= self.pcap;
        params.device.app_logging |= self.app_logging;
        params.validate()?;
        Ok(params)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    sweep(&args)?;
    Ok(())
}

fn sweep(args: &Args) -> anyhow::Result<Vec<RunReport>> {
    anyhow::ensure!(
        args.min_nodes <= args.max_nodes,
        "--min-nodes ({}) exceeds --max-nodes ({})",
        args.min_nodes,
        args.max_nodes
    );
    let template = args.template()?;
    anyhow::ensure!(
        !(template.device.pcap && args.engine == EngineKind::Ideal),
        "packet capture needs --engine ns3"
    );
    let reports = match (args.engine, &args.ns3_dir) {
        (EngineKind::Ideal, _) => {
            let engine = IdealEngine::builder().range(args.range).build();
            run(engine, args, template)?
        }
        (EngineKind::Ns3, Some(ns3_dir)) => {
            let engine = Ns3Engine::builder()
                .root_dir(args.data_dir.clone())
                .ns3_dir(ns3_dir.clone())
                .program(args.program.clone())
                .build();
            run(engine, args, template)?
        }
        (EngineKind::Ns3, None) => anyhow::bail!("--engine ns3 requires --ns3-dir"),
    };
    if let Some(path) = &args.summary {
        adhocsim_utils::write_summary(path, &reports)?;
        info!("Wrote summary to {}", path.display());
    }
    Ok(reports)
}

fn run<E: Engine>(
    engine: E,
    args: &Args,
    template: RunParameters,
) -> anyhow::Result<Vec<RunReport>> {
    let mut runner = ScenarioRunner::builder()
        .engine(engine)
        .artifact_dir(args.out_dir.clone())
        .build();
    let nodes = args.min_nodes..=args.max_nodes;
    info!(
        "Sweeping {} to {} nodes with the {} engine",
        nodes.start(),
        nodes.end(),
        runner.engine().name()
    );
    let bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(nodes.clone().count() as u64)
    };
    bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} runs {msg}")?);
    let mut reports = Vec::new();
    for report in Sweep::new(&mut runner, nodes, template) {
        let report = report?;
        bar.suspend(|| print!("{report}"));
        bar.set_message(format!("({} nodes)", report.nr_nodes));
        bar.inc(1);
        reports.push(report);
    }
    bar.finish_and_clear();
    Ok(reports)
}
