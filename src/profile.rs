use crate::{Error, Result};

/// Length of one slot of an [`HourlyRateProfile`], in minutes of simulated time.
pub const MINUTES_PER_HOUR: f64 = 60.0;

const DEFAULT_RATES: [f64; 13] = [0.1, 0.1, 0.05, 0.05, 0.05, 0.1, 0.1, 0.05, 0.05, 0.05, 0.1, 0.1, 0.1];

/// Expected share of a day's voters arriving in each hour the polls are open.
///
/// Slot `h` covers the simulated interval `[60h, 60h + 60)` minutes. Each rate is the expected fraction of the mean
/// total voter count that arrives during its slot, so the sum over the profile is the intended normalization target
/// without being required to equal 1 exactly: the day's turnout is Poisson distributed regardless.
///
/// A profile is validated once on construction and read-only afterwards. Every rate must be finite and non-negative,
/// and the profile must cover at least one hour.
///
/// The [`Default`] profile covers a 13-hour day with heavier traffic in the morning, around midday, and in the
/// evening:
///
/// ```
/// use votequeue::HourlyRateProfile;
///
/// let profile = HourlyRateProfile::default();
/// assert_eq!(13, profile.hours());
/// assert_eq!(780.0, profile.day_length());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRateProfile {
    rates: Vec<f64>,
}

impl HourlyRateProfile {
    /// Build a profile from one rate per hour.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `rates` is empty or if any rate is negative, infinite, or NaN.
    pub fn new(rates: Vec<f64>) -> Result<Self> {
        if rates.is_empty() {
            return Err(Error::invalid("rates", "profile must cover at least one hour"));
        }

        if let Some((hour, rate)) = rates.iter().enumerate().find(|(_, rate)| !rate.is_finite() || **rate < 0.0) {
            return Err(Error::invalid(
                "rates",
                format!("rate for hour {hour} must be finite and non-negative, got {rate}"),
            ));
        }

        Ok(Self { rates })
    }

    /// The per-hour rates, in hour order.
    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    /// Number of hour slots covered by the profile.
    pub fn hours(&self) -> usize {
        self.rates.len()
    }

    /// Sum of all rates, i.e. the expected turnout as a fraction of the mean total voter count.
    pub fn total(&self) -> f64 {
        self.rates.iter().sum()
    }

    /// Length of the simulated day in minutes. All arrivals fall in `[0, day_length())`.
    pub fn day_length(&self) -> f64 {
        self.rates.len() as f64 * MINUTES_PER_HOUR
    }
}

impl Default for HourlyRateProfile {
    fn default() -> Self {
        Self {
            rates: DEFAULT_RATES.to_vec(),
        }
    }
}
