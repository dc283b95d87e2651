//! Sweeps over node counts.
//!
//! Runs are strictly sequential: each run's simulation context is torn down before the next one
//! is opened, so a sweep can be resumed from any node count by starting a new one there.

use std::ops::RangeInclusive;

use log::{info, warn};

use crate::engine::Engine;
use crate::params::RunParameters;
use crate::report::RunReport;
use crate::scenario::{self, ScenarioRunner};

/// An iterator over the runs of a sweep, one [`RunReport`] per node count, in ascending order.
///
/// A run that fails to set up or to execute yields its error and ends the sweep. A run whose
/// artifacts cannot be written is still reported, with the failure recorded in the report.
#[derive(Debug)]
pub struct Sweep<'r, E> {
    runner: &'r mut ScenarioRunner<E>,
    template: RunParameters,
    nodes: RangeInclusive<usize>,
    failed: bool,
}

impl<'r, E: Engine> Sweep<'r, E> {
    pub fn new(
        runner: &'r mut ScenarioRunner<E>,
        nodes: RangeInclusive<usize>,
        template: RunParameters,
    ) -> Self {
        Self {
            runner,
            template,
            nodes,
            failed: false,
        }
    }

    fn run(&mut self, nr_nodes: usize) -> Result<RunReport, Error> {
        let fatal = |source| Error { nr_nodes, source };
        let params = self.template.with_nodes(nr_nodes);
        let mut handle = self.runner.prepare(params).map_err(fatal)?;
        let result = handle.execute().map_err(fatal)?;
        let report = match handle.export_artifacts() {
            Ok(paths) => RunReport::new(&result, Some(paths)),
            Err(e) => {
                warn!("Run with {nr_nodes} nodes: {e}; continuing without artifacts");
                RunReport::new(&result, None).with_artifact_error(e)
            }
        };
        handle.close();
        Ok(report)
    }
}

impl<'r, E: Engine> Iterator for Sweep<'r, E> {
    type Item = Result<RunReport, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let nr_nodes = self.nodes.next()?;
        let report = self.run(nr_nodes);
        match &report {
            Ok(_) => info!("Simulation for {nr_nodes} nodes finished"),
            Err(_) => self.failed = true,
        }
        Some(report)
    }
}

/// Runs a whole sweep, stopping at the first fatal error.
pub fn run_sweep<E: Engine>(
    runner: &mut ScenarioRunner<E>,
    nodes: RangeInclusive<usize>,
    template: RunParameters,
) -> Result<Vec<RunReport>, Error> {
    Sweep::new(runner, nodes, template).collect()
}

/// A fatal error in one run of a sweep.
#[derive(Debug, thiserror::Error)]
#[error("run with {nr_nodes} nodes failed")]
pub struct Error {
    pub nr_nodes: usize,
    #[source]
    pub source: scenario::Error,
}
