//! Arrival process for a single simulated day.
//!
//! Voters arrive according to a piecewise-constant-rate Poisson process: the number arriving in each hour is Poisson
//! distributed around the hour's share of the mean turnout, and each of them arrives at a uniformly random moment
//! within that hour. Sorting each hour's block and concatenating blocks in hour order yields a globally sorted
//! [`ArrivalSchedule`] without a full sort of the day.

use crate::profile::{HourlyRateProfile, MINUTES_PER_HOUR};
use crate::{Error, Result};
use ordered_float::OrderedFloat;
use rand::Rng;
use rand_distr::{Distribution, Poisson};

/// Sorted arrival times, in minutes since the polls opened, for one simulated day.
///
/// A schedule is immutable once built. Every timestamp is finite and non-negative, and the sequence is non-decreasing,
/// which is the precondition the queue recurrence relies on. Schedules produced by [`ArrivalGenerator`] satisfy this by
/// construction, while [`ArrivalSchedule::new()`] checks a caller-supplied sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrivalSchedule {
    times: Vec<f64>,
}

impl ArrivalSchedule {
    /// Wrap caller-supplied arrival times after checking that they are finite, non-negative, and sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming the first offending index.
    pub fn new(times: Vec<f64>) -> Result<Self> {
        let mut previous = 0.0;
        for (i, &time) in times.iter().enumerate() {
            if !time.is_finite() || time < 0.0 {
                return Err(Error::invalid(
                    "arrivals",
                    format!("arrival {i} must be finite and non-negative, got {time}"),
                ));
            }
            if time < previous {
                return Err(Error::invalid(
                    "arrivals",
                    format!("arrival {i} at {time} precedes the previous arrival at {previous}"),
                ));
            }
            previous = time;
        }

        Ok(Self { times })
    }

    /// Arrival times in ascending order.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Number of voters arriving during the day.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether nobody arrived.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Unwrap the underlying buffer, e.g. to reuse its allocation.
    pub fn into_inner(self) -> Vec<f64> {
        self.times
    }
}

impl AsRef<[f64]> for ArrivalSchedule {
    fn as_ref(&self) -> &[f64] {
        &self.times
    }
}

/// Draws [`ArrivalSchedule`]s for a polling place with a given mean turnout and hourly arrival profile.
///
/// The per-hour Poisson distributions are built once, on construction, so that a generator can be shared by every
/// trial of a batch (it is [`Sync`]) and each trial only pays for its random draws. Hours with a mean of zero always
/// produce zero arrivals.
#[derive(Debug, Clone)]
pub struct ArrivalGenerator {
    mean_total_voters: f64,
    profile: HourlyRateProfile,
    hourly_counts: Vec<Option<Poisson<f64>>>,
}

impl ArrivalGenerator {
    /// Prepare a generator for `mean_total_voters` expected voters spread according to `profile`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `mean_total_voters` is negative or not finite, or if some hour's expected
    /// count is too large to sample from.
    pub fn new(mean_total_voters: f64, profile: HourlyRateProfile) -> Result<Self> {
        if !mean_total_voters.is_finite() || mean_total_voters < 0.0 {
            return Err(Error::invalid(
                "mean_total_voters",
                format!("must be finite and non-negative, got {mean_total_voters}"),
            ));
        }

        let hourly_counts = profile
            .rates()
            .iter()
            .map(|rate| {
                let mean = mean_total_voters * rate;
                if mean > 0.0 {
                    Poisson::new(mean)
                        .map(Some)
                        .map_err(|e| Error::invalid("mean_total_voters", format!("hourly mean {mean}: {e}")))
                } else {
                    Ok(None)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mean_total_voters,
            profile,
            hourly_counts,
        })
    }

    /// Expected number of voters the profile is scaled by.
    pub fn mean_total_voters(&self) -> f64 {
        self.mean_total_voters
    }

    /// The hourly arrival profile.
    pub fn profile(&self) -> &HourlyRateProfile {
        &self.profile
    }

    /// Draw a fresh schedule for one simulated day.
    pub fn generate<R>(&self, rng: &mut R) -> ArrivalSchedule
    where
        R: Rng + ?Sized,
    {
        let mut times = Vec::new();
        self.generate_into(rng, &mut times);
        ArrivalSchedule { times }
    }

    /// Draw a fresh schedule into `times`, replacing its contents but keeping its allocation. The result is sorted
    /// ascending, just as with [`generate()`].
    ///
    /// [`generate()`]: ArrivalGenerator::generate
    pub fn generate_into<R>(&self, rng: &mut R, times: &mut Vec<f64>)
    where
        R: Rng + ?Sized,
    {
        times.clear();

        for (hour, count) in self.hourly_counts.iter().enumerate() {
            let Some(count) = count else { continue };

            let arrivals = count.sample(rng) as usize;
            let hour_start = hour as f64 * MINUTES_PER_HOUR;
            let hour_end = hour_start + MINUTES_PER_HOUR;

            let block_start = times.len();
            times.extend((0..arrivals).map(|_| rng.random_range(hour_start..hour_end)));
            times[block_start..].sort_unstable_by_key(|&time| OrderedFloat(time));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn is_sorted(times: &[f64]) -> bool {
        times.windows(2).all(|pair| pair[0] <= pair[1])
    }

    #[test]
    fn generated_schedule_is_sorted_and_within_day() {
        let profile = HourlyRateProfile::default();
        let day_length = profile.day_length();
        let generator = ArrivalGenerator::new(1500.0, profile).unwrap();
        let mut rng = Pcg64::seed_from_u64(2013);

        for _ in 0..20 {
            let schedule = generator.generate(&mut rng);
            assert!(is_sorted(schedule.times()), "schedule should be sorted");
            assert!(
                schedule.times().iter().all(|&t| (0.0..day_length).contains(&t)),
                "arrival outside of polling hours"
            );
        }
    }

    #[test]
    fn turnout_is_near_the_mean() {
        let generator = ArrivalGenerator::new(1000.0, HourlyRateProfile::default()).unwrap();
        let mut rng = Pcg64::seed_from_u64(7);

        let trials = 200;
        let total: usize = (0..trials).map(|_| generator.generate(&mut rng).len()).sum();
        let mean = total as f64 / trials as f64;
        // profile sums to 1, standard error of the mean is about 2.2
        assert!((mean - 1000.0).abs() < 15.0, "mean turnout {mean} too far from 1000");
    }

    #[test]
    fn arrivals_follow_their_hour() {
        let profile = HourlyRateProfile::new(vec![0.0, 1.0, 0.0]).unwrap();
        let generator = ArrivalGenerator::new(50.0, profile).unwrap();
        let mut rng = Pcg64::seed_from_u64(99);

        let schedule = generator.generate(&mut rng);
        assert!(!schedule.is_empty());
        assert!(schedule.times().iter().all(|&t| (60.0..120.0).contains(&t)));
    }

    #[test]
    fn zero_turnout_produces_empty_day() {
        let generator = ArrivalGenerator::new(0.0, HourlyRateProfile::default()).unwrap();
        let mut rng = Pcg64::seed_from_u64(1);
        assert!(generator.generate(&mut rng).is_empty());
    }

    #[test]
    fn generate_into_reuses_buffer() {
        let generator = ArrivalGenerator::new(300.0, HourlyRateProfile::default()).unwrap();
        let mut rng = Pcg64::seed_from_u64(5);
        let mut buffer = vec![-1.0; 4];

        generator.generate_into(&mut rng, &mut buffer);
        assert!(buffer.iter().all(|&t| t >= 0.0), "stale contents should be cleared");
        assert!(is_sorted(&buffer));
    }

    #[test]
    fn same_seed_same_schedule() {
        let generator = ArrivalGenerator::new(500.0, HourlyRateProfile::default()).unwrap();
        let first = generator.generate(&mut Pcg64::seed_from_u64(11));
        let second = generator.generate(&mut Pcg64::seed_from_u64(11));
        assert_eq!(first, second);
    }

    #[test]
    fn negative_mean_is_rejected() {
        let err = ArrivalGenerator::new(-1.0, HourlyRateProfile::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "mean_total_voters", .. }));
    }

    #[test]
    fn caller_schedule_is_validated() {
        assert!(ArrivalSchedule::new(vec![0.0, 1.0, 1.0, 4.5]).is_ok());
        assert!(ArrivalSchedule::new(vec![0.0, 2.0, 1.0]).is_err());
        assert!(ArrivalSchedule::new(vec![-0.5, 1.0]).is_err());
        assert!(ArrivalSchedule::new(vec![f64::NAN]).is_err());
        assert!(ArrivalSchedule::new(Vec::new()).unwrap().is_empty());
    }
}
