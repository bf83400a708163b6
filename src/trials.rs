//! Repeated, independent trials of one polling-place configuration.

use crate::arrivals::{ArrivalGenerator, ArrivalSchedule};
use crate::queue::{PollingPlace, QueueOutcome};
use crate::{Error, Result};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Trials between two progress reports.
pub const PROGRESS_INTERVAL: usize = 1000;

/// Derive the seed of an independent random stream from a base seed and a stream index.
///
/// Every trial (and every sweep cell) draws from its own stream, so results depend only on the base seed and never on
/// the order in which work happens to be executed.
pub(crate) fn stream_seed(seed: u64, index: u64) -> u64 {
    seed.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9e37_79b9_7f4a_7c15))
}

/// The two numbers a single trial contributes to its batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialSummary {
    /// Longest wait of the day. Zero if nobody voted.
    pub max_wait: f64,
    /// Departure of the last voter. Zero if nobody voted.
    pub last_departure: f64,
}

impl From<&QueueOutcome> for TrialSummary {
    fn from(outcome: &QueueOutcome) -> Self {
        Self {
            max_wait: outcome.max_wait().unwrap_or(0.0),
            last_departure: outcome.last_departure().unwrap_or(0.0),
        }
    }
}

/// Per-trial summaries of a batch of trials sharing one set of parameters, in trial order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialSummaryBatch {
    wait_maxes: Vec<f64>,
    last_departures: Vec<f64>,
}

impl TrialSummaryBatch {
    /// Empty batch with room for `trials` summaries.
    pub fn with_capacity(trials: usize) -> Self {
        Self {
            wait_maxes: Vec::with_capacity(trials),
            last_departures: Vec::with_capacity(trials),
        }
    }

    /// Append one trial's summary.
    pub fn push(&mut self, summary: TrialSummary) {
        self.wait_maxes.push(summary.max_wait);
        self.last_departures.push(summary.last_departure);
    }

    /// Longest wait of each trial.
    pub fn wait_maxes(&self) -> &[f64] {
        &self.wait_maxes
    }

    /// Last departure of each trial.
    pub fn last_departures(&self) -> &[f64] {
        &self.last_departures
    }

    /// Number of trials in the batch.
    pub fn len(&self) -> usize {
        self.wait_maxes.len()
    }

    /// Whether the batch holds no trials.
    pub fn is_empty(&self) -> bool {
        self.wait_maxes.is_empty()
    }

    /// Iterate over the per-trial summaries in trial order.
    pub fn iter(&self) -> impl Iterator<Item = TrialSummary> + '_ {
        self.wait_maxes
            .iter()
            .zip(&self.last_departures)
            .map(|(&max_wait, &last_departure)| TrialSummary {
                max_wait,
                last_departure,
            })
    }

    /// Fraction of trials whose longest wait strictly exceeds `threshold` minutes. An empty batch yields zero.
    pub fn exceedance_fraction(&self, threshold: f64) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let exceeding = self.wait_maxes.iter().filter(|&&wait| wait > threshold).count();
        exceeding as f64 / self.len() as f64
    }

    /// [`exceedance_fraction()`] for each of `thresholds`, in the same order.
    ///
    /// [`exceedance_fraction()`]: TrialSummaryBatch::exceedance_fraction
    pub fn exceedance_fractions(&self, thresholds: &[f64]) -> Vec<f64> {
        thresholds
            .iter()
            .map(|&threshold| self.exceedance_fraction(threshold))
            .collect()
    }
}

impl FromIterator<TrialSummary> for TrialSummaryBatch {
    fn from_iter<I: IntoIterator<Item = TrialSummary>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut batch = Self::with_capacity(iter.size_hint().0);
        batch.extend(iter);
        batch
    }
}

impl Extend<TrialSummary> for TrialSummaryBatch {
    fn extend<I: IntoIterator<Item = TrialSummary>>(&mut self, iter: I) {
        for summary in iter {
            self.push(summary);
        }
    }
}

/// One traced trial: the day's arrivals alongside the queue they produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRun {
    /// Arrival times drawn for the trial.
    pub arrivals: ArrivalSchedule,
    /// Per-voter start, departure, and wait times.
    pub outcome: QueueOutcome,
}

/// Simulate `runs` days of `place` fed by `generator`, keeping every voter's arrival and queue times.
///
/// Day `i` is drawn from the same random stream as trial `i` of a [`TrialRunner`] with the same seed, so a trace can
/// replay the days behind a batch. Zero runs yield an empty trace.
pub fn trace_days(place: &PollingPlace, generator: &ArrivalGenerator, seed: u64, runs: usize) -> Vec<TraceRun> {
    (0..runs)
        .map(|trial| {
            let mut rng = Pcg64::seed_from_u64(stream_seed(seed, trial as u64));
            let arrivals = generator.generate(&mut rng);
            let outcome = place.simulate(&arrivals);
            TraceRun { arrivals, outcome }
        })
        .collect()
}

/// Buffers reused across the trials handled by one worker.
#[derive(Debug, Default)]
struct Scratch {
    arrivals: Vec<f64>,
    outcome: QueueOutcome,
}

/// Runs a fixed number of independent trials of one polling-place configuration.
///
/// Each trial draws a fresh day of arrivals and queues them. Trial `i` draws from a random stream seeded from the base
/// seed and `i` alone, so [`run()`] and [`par_run()`] produce identical batches for the same seed, and trial `i` of a
/// batch is the same day that [`trace()`] returns at position `i`.
///
/// [`run()`]: TrialRunner::run
/// [`par_run()`]: TrialRunner::par_run
/// [`trace()`]: TrialRunner::trace
#[derive(Debug, Clone)]
pub struct TrialRunner {
    num_trials: usize,
    place: PollingPlace,
    generator: ArrivalGenerator,
}

impl TrialRunner {
    /// Prepare `num_trials` trials of `place` fed by `generator`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `num_trials` is zero.
    pub fn new(num_trials: usize, place: PollingPlace, generator: ArrivalGenerator) -> Result<Self> {
        if num_trials == 0 {
            return Err(Error::invalid("num_trials", "at least one trial is required"));
        }

        Ok(Self {
            num_trials,
            place,
            generator,
        })
    }

    /// Number of trials per batch.
    pub fn num_trials(&self) -> usize {
        self.num_trials
    }

    /// The simulated polling place.
    pub fn place(&self) -> &PollingPlace {
        &self.place
    }

    /// The arrival process feeding each trial.
    pub fn generator(&self) -> &ArrivalGenerator {
        &self.generator
    }

    /// Run every trial on the current thread, reporting progress every [`PROGRESS_INTERVAL`] trials.
    pub fn run(&self, seed: u64) -> TrialSummaryBatch {
        let mut scratch = Scratch::default();
        let mut batch = TrialSummaryBatch::with_capacity(self.num_trials);

        for trial in 0..self.num_trials {
            if trial % PROGRESS_INTERVAL == 0 {
                info!("{} out of {} trials", trial, self.num_trials);
            }
            batch.push(self.run_trial(seed, trial, &mut scratch));
        }

        batch
    }

    /// Run the trials on the current rayon pool. The batch is identical to the one [`run()`] produces for `seed`.
    ///
    /// [`run()`]: TrialRunner::run
    pub fn par_run(&self, seed: u64) -> TrialSummaryBatch {
        let completed = AtomicUsize::new(0);

        let summaries: Vec<TrialSummary> = (0..self.num_trials)
            .into_par_iter()
            .map_init(Scratch::default, |scratch, trial| {
                let summary = self.run_trial(seed, trial, scratch);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_INTERVAL == 0 {
                    info!("{} out of {} trials", done, self.num_trials);
                }
                summary
            })
            .collect();

        summaries.into_iter().collect()
    }

    /// Keep the full per-voter detail of the first `runs` trials, e.g. for plotting waits against arrival times.
    pub fn trace(&self, seed: u64, runs: usize) -> Vec<TraceRun> {
        trace_days(&self.place, &self.generator, seed, runs)
    }

    fn run_trial(&self, seed: u64, trial: usize, scratch: &mut Scratch) -> TrialSummary {
        let mut rng = Pcg64::seed_from_u64(stream_seed(seed, trial as u64));
        self.generator.generate_into(&mut rng, &mut scratch.arrivals);
        self.place.simulate_into(&scratch.arrivals, &mut scratch.outcome);
        TrialSummary::from(&scratch.outcome)
    }
}
