//! # Overview
//!
//! votequeue estimates how long voters wait in line at a polling place served by a fixed number of identical voting
//! machines. It runs Monte Carlo trials of a simulated election day and summarizes, for every configuration in a grid
//! of service times, machine counts, and turnouts, how often the longest wait of the day exceeds a set of thresholds.
//! Planners read those exceedance tables to decide how many machines a polling place needs.
//!
//! The crate is organized from the inside out:
//!
//! * [`PollingPlace`] queues one day's voters on first-come-first-served machines. With a constant service time the
//!   queue reduces to a single linear pass over the sorted arrivals, which is the part of the crate that runs millions
//!   of times in a full sweep.
//! * [`ArrivalGenerator`] draws that day's arrivals from a Poisson process whose rate changes hour by hour according
//!   to an [`HourlyRateProfile`].
//! * [`TrialRunner`] repeats independent days with one configuration and keeps the longest wait and the last
//!   departure of each, as a [`TrialSummaryBatch`].
//! * [`Sweep`] runs a batch for every point of a [`SweepConfig`] grid, and [`report`] writes the results as
//!   tab-delimited files.
//!
//! # Determinism and parallelism
//!
//! All randomness flows from a single `u64` seed. Every trial and every sweep cell derives its own [`rand_pcg::Pcg64`]
//! stream from that seed and its index, so no state is shared between units of work. This makes trials and cells
//! embarrassingly parallel: the `par_run` variants spread them over a rayon pool and return exactly the same results,
//! in the same order, as their serial counterparts.
//!
//! ```
//! use votequeue::{ArrivalGenerator, HourlyRateProfile, PollingPlace, TrialRunner};
//!
//! let place = PollingPlace::new(10, 5.0).unwrap();
//! let generator = ArrivalGenerator::new(1500.0, HourlyRateProfile::default()).unwrap();
//! let runner = TrialRunner::new(100, place, generator).unwrap();
//!
//! let batch = runner.run(42);
//! assert_eq!(batch, runner.par_run(42));
//! println!("P(wait > 60 min) = {}", batch.exceedance_fraction(60.0));
//! ```

mod arrivals;
mod error;
mod profile;
mod queue;
pub mod report;
pub mod sweep;
mod trials;

pub use arrivals::{ArrivalGenerator, ArrivalSchedule};
pub use error::{Error, Result};
pub use profile::{HourlyRateProfile, MINUTES_PER_HOUR};
pub use queue::{PollingPlace, QueueOutcome};
pub use sweep::{CellParams, Sweep, SweepCell, SweepConfig, SweepResult};
pub use trials::{trace_days, TraceRun, TrialRunner, TrialSummary, TrialSummaryBatch, PROGRESS_INTERVAL};
