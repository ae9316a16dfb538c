//! Bisection on the load magnitude that puts a target share of data points
//! under the analytical envelope.
//!
//! The containment percentage grows with sigma for a fixed set of points, so
//! the bracket is halved towards the side that brings the percentage closer to
//! the target.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregate::AggregatedRecord;
use crate::analytical::SifMode;
use crate::errors::BoundError;

/// Why the search stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    /// The percentage came within tolerance of the target.
    Converged,
    /// The iteration limit was reached first.
    Exhausted,
}

/// Solver settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundSettings {
    /// Accepted distance from the target, in percentage points.
    pub tolerance: f64,
    /// Maximum number of probes.
    pub iteration_limit: usize,
}

impl Default for BoundSettings {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            iteration_limit: 100,
        }
    }
}

impl BoundSettings {
    /// Check that the settings can drive a search.
    ///
    /// # Errors
    ///
    /// Returns [`BoundError::InvalidSettings`] for a negative or non-finite
    /// tolerance or a zero iteration limit.
    pub fn validate(&self) -> Result<(), BoundError> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(BoundError::InvalidSettings("tolerance must be finite and non-negative"));
        }
        if self.iteration_limit == 0 {
            return Err(BoundError::InvalidSettings("iteration limit must be at least 1"));
        }
        Ok(())
    }
}

/// One probe of the search.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundStep {
    /// Probed load magnitude.
    pub sigma: f64,
    /// Percentage of points inside the envelope at `sigma`.
    pub percentage: f64,
}

/// Outcome of a search: its status and every probe in order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundSolution {
    /// Why the search stopped.
    pub status: Status,
    /// Probes in the order they were made.
    pub log: Vec<BoundStep>,
}

impl BoundSolution {
    /// Last probe; the bound found by the search.
    #[must_use]
    pub fn last(&self) -> Option<BoundStep> {
        self.log.last().copied()
    }

    /// Sigma of the last probe.
    #[must_use]
    pub fn sigma(&self) -> Option<f64> {
        self.last().map(|step| step.sigma)
    }

    /// Percentage of the last probe.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        self.last().map(|step| step.percentage)
    }

    /// Number of probes made.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.log.len()
    }
}

/// Percentage of data points contained at a given load magnitude.
pub trait ContainmentProbe {
    /// Return the percentage, in `[0, 100]`, of points inside the envelope at `sigma`.
    ///
    /// # Errors
    ///
    /// Returns [`BoundError`] when the envelope cannot be evaluated.
    fn percentage_inside(&self, sigma: f64) -> Result<f64, BoundError>;
}

impl<F> ContainmentProbe for F
where
    F: Fn(f64) -> f64,
{
    fn percentage_inside(&self, sigma: f64) -> Result<f64, BoundError> {
        Ok(self(sigma))
    }
}

/// Probe counting the `(angle, |result|)` points of an aggregate under `|envelope(sigma)|`.
#[derive(Clone, Copy, Debug)]
pub struct EnvelopeProbe<'a> {
    aggregate: &'a AggregatedRecord,
    mode: SifMode,
}

impl<'a> EnvelopeProbe<'a> {
    /// Create a probe for one mode of an aggregate.
    #[must_use]
    pub fn new(aggregate: &'a AggregatedRecord, mode: SifMode) -> Self {
        Self { aggregate, mode }
    }

    /// Count `(total, inside, outside)` points at `sigma`.
    ///
    /// # Errors
    ///
    /// Returns [`BoundError::Aggregate`] when the envelope cannot be evaluated.
    pub fn count(&self, sigma: f64) -> Result<(usize, usize, usize), BoundError> {
        let points = self.aggregate.magnitude_points(self.mode)?;
        let region = self.aggregate.envelope_region(sigma, self.mode)?;
        let flags = region.contains_points(&points);
        let inside = flags.iter().filter(|flag| **flag).count();
        let outside = flags.iter().filter(|flag| !**flag).count();
        Ok((points.len(), inside, outside))
    }
}

impl ContainmentProbe for EnvelopeProbe<'_> {
    fn percentage_inside(&self, sigma: f64) -> Result<f64, BoundError> {
        let (total, inside, outside) = self.count(sigma)?;
        if total == 0 {
            return Err(BoundError::EmptyAggregate(self.mode));
        }
        if inside + outside != total {
            return Err(BoundError::ContainmentMismatch {
                inside,
                outside,
                total,
            });
        }
        Ok(100.0 * inside as f64 / total as f64)
    }
}

/// Validate bracket values and return them in increasing order.
fn validate_bracket(bracket: [f64; 2]) -> Result<(f64, f64), BoundError> {
    let [low, high] = bracket;
    if !low.is_finite() || !high.is_finite() || low == high {
        return Err(BoundError::InvalidBracket { low, high });
    }
    Ok(if low < high { (low, high) } else { (high, low) })
}

/// Bisect `bracket` until the probe returns `target` within tolerance.
///
/// Every probe is logged. The search ends as [`Status::Converged`] when a
/// probe lands within tolerance, or as [`Status::Exhausted`] once the log
/// holds `iteration_limit` probes.
///
/// # Errors
///
/// Returns [`BoundError`] for invalid settings or bracket, when the probe
/// fails, and [`BoundError::UnexpectedPercentage`] when it returns `NaN` or an
/// infinity.
///
/// # Examples
/// ```
/// use shardx::bound::{find_bound, BoundSettings, Status};
///
/// let probe = |sigma: f64| sigma / 10.0;
/// let solution = find_bound(&probe, 41.3, &BoundSettings::default(), [0.0, 1000.0])
///     .expect("valid search");
/// assert_eq!(solution.status, Status::Converged);
/// assert!((solution.sigma().expect("probed") - 413.0).abs() < 1.0);
/// ```
pub fn find_bound<P>(
    probe: &P,
    target: f64,
    settings: &BoundSettings,
    bracket: [f64; 2],
) -> Result<BoundSolution, BoundError>
where
    P: ContainmentProbe + ?Sized,
{
    settings.validate()?;
    let (mut low, mut high) = validate_bracket(bracket)?;
    let mut log = Vec::with_capacity(settings.iteration_limit);
    loop {
        let sigma = 0.5 * (low + high);
        let percentage = probe.percentage_inside(sigma)?;
        if !percentage.is_finite() {
            return Err(BoundError::UnexpectedPercentage { sigma, percentage });
        }
        log.push(BoundStep { sigma, percentage });
        debug!(iteration = log.len(), sigma, percentage, target, "bound probe");

        if (percentage - target).abs() <= settings.tolerance {
            return Ok(BoundSolution {
                status: Status::Converged,
                log,
            });
        }
        if log.len() >= settings.iteration_limit {
            warn!(target, sigma, percentage, "bound search exhausted its iteration limit");
            return Ok(BoundSolution {
                status: Status::Exhausted,
                log,
            });
        }
        if percentage < target {
            low = sigma;
        } else {
            high = sigma;
        }
    }
}

/// Search the bound of every named target for one mode of an aggregate.
///
/// The bracket is `[0, 2 sigma]` around the nominal stress of the aggregate.
///
/// # Errors
///
/// Returns [`BoundError::EmptyAggregate`] when the aggregate holds no points,
/// otherwise see [`find_bound`].
pub fn find_bounds(
    aggregate: &AggregatedRecord,
    mode: SifMode,
    targets: &BTreeMap<String, f64>,
    settings: &BoundSettings,
) -> Result<BTreeMap<String, BoundSolution>, BoundError> {
    let nominal = aggregate
        .parameters()
        .ok_or(BoundError::EmptyAggregate(mode))?
        .sigma;
    let probe = EnvelopeProbe::new(aggregate, mode);
    targets
        .iter()
        .map(|(name, target)| {
            let solution = find_bound(&probe, *target, settings, [0.0, 2.0 * nominal])?;
            Ok((name.clone(), solution))
        })
        .collect()
}
