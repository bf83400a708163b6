//! Sweeps over a grid of polling-place configurations.
//!
//! A sweep visits the Cartesian product of candidate service times, machine counts, and voters per machine, in that
//! order from the outermost to the innermost axis. Each grid point becomes one [`SweepCell`]: a full batch of trials
//! plus the fraction of those trials whose longest wait exceeds each configured threshold.
//!
//! Cells are independent of each other, so a sweep can be executed serially or spread across a rayon pool. Each cell
//! draws from a random stream derived from the master seed and the cell's position in the grid, which makes the two
//! execution strategies produce identical results, always reported in grid order.

use crate::arrivals::ArrivalGenerator;
use crate::profile::HourlyRateProfile;
use crate::queue::PollingPlace;
use crate::trials::{stream_seed, TrialRunner, TrialSummaryBatch};
use crate::{Error, Result};
use rayon::prelude::*;
use tracing::{debug, info};

/// Parameters of a full sweep.
///
/// The [`Default`] configuration reproduces the standard planning grid: 10000 trials for each of 125 cells, built from
/// service times of 2, 5, 7, 10 and 15 minutes, 2 to 20 machines, and 50 to 300 voters per machine, reporting
/// exceedance of 15, 30, 60, 90 and 120 minute waits.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    /// Trials per cell.
    pub num_trials: usize,
    /// Candidate minutes per voter at a machine (outer axis).
    pub service_times: Vec<f64>,
    /// Candidate machine counts (middle axis).
    pub machine_counts: Vec<usize>,
    /// Candidate mean turnouts per machine (inner axis).
    pub voters_per_machine: Vec<u32>,
    /// Wait thresholds, in minutes, to report exceedance fractions for.
    pub thresholds: Vec<f64>,
    /// Hourly arrival profile shared by every cell.
    pub profile: HourlyRateProfile,
    /// Master seed from which every cell's random stream is derived.
    pub seed: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            num_trials: 10_000,
            service_times: vec![2.0, 5.0, 7.0, 10.0, 15.0],
            machine_counts: vec![2, 5, 10, 15, 20],
            voters_per_machine: vec![50, 100, 150, 200, 300],
            thresholds: vec![15.0, 30.0, 60.0, 90.0, 120.0],
            profile: HourlyRateProfile::default(),
            seed: 42,
        }
    }
}

impl SweepConfig {
    /// Check every parameter up front, so that an invalid value is reported before any cell runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a zero trial count, an empty axis or threshold list, a non-positive
    /// service time, a zero machine count, a threshold that is not finite, or a turnout whose hourly arrival counts
    /// cannot be sampled.
    pub fn validate(&self) -> Result<()> {
        if self.num_trials == 0 {
            return Err(Error::invalid("num_trials", "at least one trial is required"));
        }
        if self.service_times.is_empty() {
            return Err(Error::invalid("service_times", "at least one service time is required"));
        }
        if self.machine_counts.is_empty() {
            return Err(Error::invalid("machine_counts", "at least one machine count is required"));
        }
        if self.voters_per_machine.is_empty() {
            return Err(Error::invalid("voters_per_machine", "at least one turnout is required"));
        }
        if self.thresholds.is_empty() {
            return Err(Error::invalid("thresholds", "at least one threshold is required"));
        }
        if let Some(threshold) = self.thresholds.iter().find(|t| !t.is_finite()) {
            return Err(Error::invalid("thresholds", format!("must be finite, got {threshold}")));
        }

        for &service_time in &self.service_times {
            for &machines in &self.machine_counts {
                PollingPlace::new(machines, service_time)?;
            }
        }

        for &machines in &self.machine_counts {
            for &voters_per_machine in &self.voters_per_machine {
                let mean_total_voters = f64::from(voters_per_machine) * machines as f64;
                ArrivalGenerator::new(mean_total_voters, self.profile.clone())?;
            }
        }

        Ok(())
    }

    /// The grid points of the sweep, in reporting order.
    pub fn grid(&self) -> impl Iterator<Item = CellParams> + '_ {
        self.service_times
            .iter()
            .flat_map(move |&service_time| {
                self.machine_counts.iter().flat_map(move |&machines| {
                    self.voters_per_machine
                        .iter()
                        .map(move |&voters_per_machine| (service_time, machines, voters_per_machine))
                })
            })
            .enumerate()
            .map(|(index, (service_time, machines, voters_per_machine))| CellParams {
                index,
                service_time,
                machines,
                voters_per_machine,
            })
    }

    /// Number of grid points.
    pub fn cell_count(&self) -> usize {
        self.service_times.len() * self.machine_counts.len() * self.voters_per_machine.len()
    }
}

/// One point of the sweep grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellParams {
    /// Position in the grid's reporting order, starting at zero.
    pub index: usize,
    /// Minutes each voter spends at a machine.
    pub service_time: f64,
    /// Number of machines.
    pub machines: usize,
    /// Mean turnout per machine.
    pub voters_per_machine: u32,
}

impl CellParams {
    /// Expected turnout of the whole polling place.
    pub fn mean_total_voters(&self) -> f64 {
        f64::from(self.voters_per_machine) * self.machines as f64
    }
}

/// Results for one grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepCell {
    /// The grid point.
    pub params: CellParams,
    /// Per-trial longest waits and last departures.
    pub batch: TrialSummaryBatch,
    /// Fraction of trials exceeding each threshold, in threshold order.
    pub exceedance: Vec<f64>,
}

/// Results of a full sweep, with cells in grid order.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    /// Thresholds the exceedance fractions refer to.
    pub thresholds: Vec<f64>,
    /// One entry per grid point.
    pub cells: Vec<SweepCell>,
}

/// A validated sweep, ready to run.
#[derive(Debug, Clone)]
pub struct Sweep {
    config: SweepConfig,
}

impl Sweep {
    /// Validate `config` and prepare a sweep over it.
    ///
    /// # Errors
    ///
    /// Returns the first problem reported by [`SweepConfig::validate()`].
    pub fn new(config: SweepConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The sweep's configuration.
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Run every cell on the current thread.
    pub fn run(&self) -> Result<SweepResult> {
        self.run_with(|_| Ok(()))
    }

    /// Run every cell on the current thread, handing each one to `on_cell` as soon as it completes, e.g. to save it
    /// before the rest of the sweep has finished.
    ///
    /// # Errors
    ///
    /// Stops at the first error returned by `on_cell` and passes it back unchanged.
    pub fn run_with<F>(&self, mut on_cell: F) -> Result<SweepResult>
    where
        F: FnMut(&SweepCell) -> Result<()>,
    {
        let cells = self
            .config
            .grid()
            .map(|params| -> Result<SweepCell> {
                let cell = self.run_cell(params)?;
                on_cell(&cell)?;
                Ok(cell)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.finish(cells))
    }

    /// Run the cells on the current rayon pool. Cells are returned in grid order regardless of completion order.
    pub fn par_run(&self) -> Result<SweepResult> {
        self.par_run_with(|_| Ok(()))
    }

    /// Run the cells on the current rayon pool, handing each one to `on_cell` on its worker as soon as it completes.
    /// `on_cell` sees cells in completion order, while the returned result keeps grid order.
    ///
    /// # Errors
    ///
    /// Returns an error raised by `on_cell`. Cells already in flight on other workers still finish.
    pub fn par_run_with<F>(&self, on_cell: F) -> Result<SweepResult>
    where
        F: Fn(&SweepCell) -> Result<()> + Sync,
    {
        let params: Vec<CellParams> = self.config.grid().collect();
        let cells = params
            .into_par_iter()
            .map(|params| -> Result<SweepCell> {
                let cell = self.run_cell(params)?;
                on_cell(&cell)?;
                Ok(cell)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.finish(cells))
    }

    /// Run a single grid point. The result does not depend on which other cells are run, or in what order.
    pub fn run_cell(&self, params: CellParams) -> Result<SweepCell> {
        info!(
            "cell {}/{}: service time {}, {} machines, {} voters per machine",
            params.index + 1,
            self.config.cell_count(),
            params.service_time,
            params.machines,
            params.voters_per_machine
        );

        let place = PollingPlace::new(params.machines, params.service_time)?;
        let generator = ArrivalGenerator::new(params.mean_total_voters(), self.config.profile.clone())?;
        let runner = TrialRunner::new(self.config.num_trials, place, generator)?;

        let batch = runner.run(stream_seed(self.config.seed, params.index as u64));
        let exceedance = batch.exceedance_fractions(&self.config.thresholds);
        debug!(cell = params.index, ?exceedance, "cell complete");

        Ok(SweepCell {
            params,
            batch,
            exceedance,
        })
    }

    fn finish(&self, cells: Vec<SweepCell>) -> SweepResult {
        SweepResult {
            thresholds: self.config.thresholds.clone(),
            cells,
        }
    }
}

/// Build a dedicated pool of `threads` workers, or one sized by rayon's defaults if `threads` is zero.
///
/// # Errors
///
/// Returns [`Error::ThreadPool`] if the pool cannot be created.
pub fn worker_pool(threads: usize) -> Result<rayon::ThreadPool> {
    Ok(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?)
}
