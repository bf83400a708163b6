//! The multi-machine first-come-first-served queue.
//!
//! With `c` identical machines and arrivals handled strictly in arrival order, voter `i` always ends up on the machine
//! most recently vacated by voter `i - c`: the first `c` voters each find an idle machine, and from then on every
//! machine serves every `c`-th voter in turn. Voter `i` therefore starts once they have arrived and voter `i - c` has
//! left, which turns the whole simulation into one linear pass with no explicit machine bookkeeping.

use crate::arrivals::ArrivalSchedule;
use crate::{Error, Result};

/// Per-voter results of running one day's arrivals through a [`PollingPlace`].
///
/// The three sequences are parallel to the arrival schedule they were computed from: entry `i` of each describes the
/// `i`-th voter to arrive, and `wait_times[i] == start_times[i] - arrivals[i]`. For every voter,
/// `departure >= start >= arrival`.
///
/// An outcome may be reused across trials through [`PollingPlace::simulate_into()`] to avoid reallocating its buffers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueOutcome {
    start_times: Vec<f64>,
    departure_times: Vec<f64>,
    wait_times: Vec<f64>,
}

impl QueueOutcome {
    /// Time at which each voter started voting.
    pub fn start_times(&self) -> &[f64] {
        &self.start_times
    }

    /// Time at which each voter left their machine.
    pub fn departure_times(&self) -> &[f64] {
        &self.departure_times
    }

    /// Time each voter spent in line before reaching a machine.
    pub fn wait_times(&self) -> &[f64] {
        &self.wait_times
    }

    /// Number of voters simulated.
    pub fn len(&self) -> usize {
        self.start_times.len()
    }

    /// Whether the simulated day had no voters.
    pub fn is_empty(&self) -> bool {
        self.start_times.is_empty()
    }

    /// Longest wait of the day, or `None` if nobody voted.
    pub fn max_wait(&self) -> Option<f64> {
        self.wait_times.iter().copied().reduce(f64::max)
    }

    /// Departure of the last voter to arrive, or `None` if nobody voted. Service times are constant, so this is also
    /// the moment the last machine falls idle.
    pub fn last_departure(&self) -> Option<f64> {
        self.departure_times.last().copied()
    }

    fn clear(&mut self) {
        self.start_times.clear();
        self.departure_times.clear();
        self.wait_times.clear();
    }
}

/// A polling place with a fixed number of identical voting machines and a constant time spent at each machine.
///
/// ```
/// use votequeue::{ArrivalSchedule, PollingPlace};
///
/// let place = PollingPlace::new(2, 5.0).unwrap();
/// let arrivals = ArrivalSchedule::new(vec![0.0, 1.0, 2.0, 20.0]).unwrap();
/// let outcome = place.simulate(&arrivals);
///
/// assert_eq!(&[0.0, 1.0, 5.0, 20.0], outcome.start_times());
/// assert_eq!(&[0.0, 0.0, 3.0, 0.0], outcome.wait_times());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingPlace {
    machines: usize,
    service_time: f64,
}

impl PollingPlace {
    /// Describe a polling place with `machines` voting machines, each occupied for `service_time` minutes per voter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `machines` is zero or if `service_time` is not a finite, strictly
    /// positive number.
    pub fn new(machines: usize, service_time: f64) -> Result<Self> {
        if machines == 0 {
            return Err(Error::invalid("machines", "at least one machine is required"));
        }
        if !service_time.is_finite() || service_time <= 0.0 {
            return Err(Error::invalid(
                "service_time",
                format!("must be finite and positive, got {service_time}"),
            ));
        }

        Ok(Self {
            machines,
            service_time,
        })
    }

    /// Number of voting machines.
    pub fn machines(&self) -> usize {
        self.machines
    }

    /// Minutes each voter spends at a machine.
    pub fn service_time(&self) -> f64 {
        self.service_time
    }

    /// Run one day's arrivals through the queue.
    pub fn simulate(&self, arrivals: &ArrivalSchedule) -> QueueOutcome {
        let mut outcome = QueueOutcome::default();
        self.simulate_into(arrivals.times(), &mut outcome);
        outcome
    }

    /// Run `arrivals` through the queue, overwriting `outcome` in place.
    ///
    /// `arrivals` must be sorted ascending; unlike an [`ArrivalSchedule`], a raw slice carries no such guarantee, and
    /// the ordering is only checked in debug builds. Unsorted input does not panic in release builds but produces
    /// meaningless start and departure times.
    pub fn simulate_into(&self, arrivals: &[f64], outcome: &mut QueueOutcome) {
        debug_assert!(
            arrivals.windows(2).all(|pair| pair[0] <= pair[1]),
            "arrival times must be sorted ascending"
        );

        outcome.clear();
        let QueueOutcome {
            start_times,
            departure_times,
            wait_times,
        } = outcome;
        start_times.reserve(arrivals.len());
        departure_times.reserve(arrivals.len());
        wait_times.reserve(arrivals.len());

        let c = self.machines;
        let d = self.service_time;

        for (i, &arrival) in arrivals.iter().enumerate() {
            let start = if i < c {
                arrival
            } else {
                arrival.max(departure_times[i - c])
            };
            start_times.push(start);
            departure_times.push(start + d);
            wait_times.push(start - arrival);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(machines: usize, service_time: f64, arrivals: Vec<f64>) -> QueueOutcome {
        let place = PollingPlace::new(machines, service_time).unwrap();
        place.simulate(&ArrivalSchedule::new(arrivals).unwrap())
    }

    #[test]
    fn two_machines_absorb_a_burst() {
        let outcome = run(2, 5.0, vec![0.0, 1.0, 2.0, 20.0]);

        assert_eq!(&[0.0, 1.0, 5.0, 20.0], outcome.start_times());
        assert_eq!(&[5.0, 6.0, 10.0, 25.0], outcome.departure_times());
        assert_eq!(&[0.0, 0.0, 3.0, 0.0], outcome.wait_times());
        assert_eq!(Some(3.0), outcome.max_wait());
        assert_eq!(Some(25.0), outcome.last_departure());
    }

    #[test]
    fn single_machine_queue_builds_up() {
        let outcome = run(1, 10.0, vec![0.0, 5.0, 7.0]);

        assert_eq!(&[0.0, 10.0, 20.0], outcome.start_times());
        assert_eq!(&[10.0, 20.0, 30.0], outcome.departure_times());
        assert_eq!(&[0.0, 5.0, 13.0], outcome.wait_times());
    }

    #[test]
    fn more_machines_than_voters_means_no_wait() {
        let outcome = run(10, 7.0, vec![0.0, 0.0, 0.5, 0.5, 1.0]);

        assert_eq!(5, outcome.len());
        assert!(outcome.wait_times().iter().all(|&w| w == 0.0));
        assert_eq!(&[7.0, 7.0, 7.5, 7.5, 8.0], outcome.departure_times());
    }

    #[test]
    fn machine_count_equal_to_voters_means_no_wait() {
        let outcome = run(3, 15.0, vec![0.0, 0.0, 0.0]);
        assert_eq!(Some(0.0), outcome.max_wait());
    }

    #[test]
    fn empty_day_has_no_summary() {
        let outcome = run(2, 5.0, Vec::new());

        assert!(outcome.is_empty());
        assert_eq!(None, outcome.max_wait());
        assert_eq!(None, outcome.last_departure());
    }

    #[test]
    fn simultaneous_arrivals_are_served_in_order() {
        let outcome = run(2, 4.0, vec![1.0; 5]);
        assert_eq!(&[0.0, 0.0, 4.0, 4.0, 8.0], outcome.wait_times());
    }

    #[test]
    fn first_machines_never_wait() {
        let outcome = run(3, 30.0, vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]);

        assert_eq!(&[0.0, 0.0, 0.0], &outcome.wait_times()[..3]);
        assert!(outcome.wait_times()[3..].iter().all(|&w| w > 0.0));
    }

    #[test]
    fn simulate_into_overwrites_previous_outcome() {
        let place = PollingPlace::new(1, 2.0).unwrap();
        let mut outcome = QueueOutcome::default();

        place.simulate_into(&[0.0, 0.0, 0.0, 0.0], &mut outcome);
        assert_eq!(4, outcome.len());

        place.simulate_into(&[3.0], &mut outcome);
        assert_eq!(&[3.0], outcome.start_times());
        assert_eq!(&[5.0], outcome.departure_times());
        assert_eq!(&[0.0], outcome.wait_times());
    }

    #[test]
    fn zero_machines_are_rejected() {
        let err = PollingPlace::new(0, 5.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "machines", .. }));
    }

    #[test]
    fn bad_service_times_are_rejected() {
        for service_time in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = PollingPlace::new(2, service_time).unwrap_err();
            assert!(
                matches!(err, Error::InvalidParameter { name: "service_time", .. }),
                "service time {service_time} should be rejected"
            );
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "sorted")]
    fn unsorted_slice_is_caught_in_debug_builds() {
        let place = PollingPlace::new(1, 1.0).unwrap();
        place.simulate_into(&[2.0, 1.0], &mut QueueOutcome::default());
    }
}
