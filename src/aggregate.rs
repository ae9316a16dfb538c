//! Merged, angle-sorted series of every successful simulation in a subtree.

use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;
use tracing::{info, warn};

use crate::analytical::{self, AnalyticalParameters, SifMode};
use crate::errors::{AggregateError, RecordError};
use crate::geometry::{CurveRegion, Point};
use crate::metrics::{self, SignMode, StatValue, Statistic};
use crate::record::SimulationRecord;
use crate::repository::Repository;
use crate::tree::ClassificationTree;

/// Series of an aggregate that can be plotted against the angles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeriesKind {
    /// Contour-averaged simulation results.
    Results,
    /// Pointwise `|result| - |analytical|`.
    Difference,
}

/// Data points split by an envelope band.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointPartition {
    /// Points inside the upper envelope and outside the lower one.
    pub inside: Vec<Point>,
    /// Every other point.
    pub outside: Vec<Point>,
}

/// Scalar statistics of an aggregate, keyed by statistic then mode.
pub type Estimates = BTreeMap<Statistic, BTreeMap<SifMode, f64>>;

/// Concatenation of the successful records of one subtree.
#[derive(Clone, Debug, Default)]
pub struct AggregatedRecord {
    modes: Vec<SifMode>,
    sign_mode: SignMode,
    members: Vec<String>,
    angles: Vec<f64>,
    results: BTreeMap<SifMode, Vec<f64>>,
    analytical: BTreeMap<SifMode, Vec<f64>>,
    parameters: Option<AnalyticalParameters>,
    differences: BTreeMap<SifMode, Vec<f64>>,
    estimates: Estimates,
}

impl AggregatedRecord {
    /// Load and merge every successful member of `node`, in sorted key order.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError`] when a member fails to load or evaluate, or
    /// when the members disagree on an analytical parameter.
    pub fn build(
        repo: &dyn Repository,
        tree: &ClassificationTree,
        node: NodeIndex,
        modes: &[SifMode],
        sign_mode: SignMode,
    ) -> Result<Self, AggregateError> {
        let records = tree
            .successful_members(node)
            .iter()
            .map(|key| SimulationRecord::load(repo, key, modes).map(|r| r.with_sign_mode(sign_mode)))
            .collect::<Result<Vec<_>, RecordError>>()?;
        let aggregate = Self::from_records(records, modes, sign_mode)?;
        info!(
            branch = ?tree.path_names(node),
            members = aggregate.members.len(),
            points = aggregate.angles.len(),
            "built aggregate"
        );
        Ok(aggregate)
    }

    /// Merge already loaded records; failed records are skipped.
    ///
    /// Records are evaluated first when needed.
    ///
    /// # Errors
    ///
    /// See [`AggregatedRecord::build`].
    pub fn from_records(
        records: impl IntoIterator<Item = SimulationRecord>,
        modes: &[SifMode],
        sign_mode: SignMode,
    ) -> Result<Self, AggregateError> {
        let mut aggregate = Self {
            modes: modes.to_vec(),
            sign_mode,
            ..Self::default()
        };
        let mut parameters = Vec::new();
        for mut record in records {
            if !record.is_successful() {
                continue;
            }
            if !record.calculated_errors() {
                record.compute_analytical_solution()?;
                record.compute_statistics()?;
            }
            for &mode in modes {
                let missing = || RecordError::MissingResults {
                    key: record.key().to_owned(),
                    mode,
                };
                let results = record.results(mode).ok_or_else(missing)?;
                let solution = record
                    .analytical_solution(mode)
                    .ok_or_else(|| RecordError::MissingSolution(record.key().to_owned()))?;
                aggregate.results.entry(mode).or_default().extend_from_slice(results);
                aggregate.analytical.entry(mode).or_default().extend_from_slice(solution);
            }
            aggregate.angles.extend_from_slice(record.angles());
            aggregate.members.push(record.key().to_owned());
            parameters.push(record.analytical_parameters());
        }
        aggregate.sort_by_angle();
        aggregate.parameters = unique_parameters(&parameters)?;
        Ok(aggregate)
    }

    /// Wrap angles into `[0, 360)` and reorder every series by ascending angle.
    fn sort_by_angle(&mut self) {
        for angle in &mut self.angles {
            *angle = angle.rem_euclid(360.0);
        }
        let mut order: Vec<usize> = (0..self.angles.len()).collect();
        order.sort_by(|&left, &right| self.angles[left].total_cmp(&self.angles[right]));
        let permute = |values: &[f64]| order.iter().map(|&idx| values[idx]).collect::<Vec<_>>();
        self.angles = permute(&self.angles);
        for series in self.results.values_mut().chain(self.analytical.values_mut()) {
            *series = permute(series.as_slice());
        }
    }

    /// Compute the pointwise difference series of every mode.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::Statistic`] on inconsistent series.
    pub fn compute_errors(&mut self) -> Result<(), AggregateError> {
        for &mode in &self.modes {
            let values = metrics::difference(
                mode_series(&self.analytical, mode),
                mode_series(&self.results, mode),
            )?;
            self.differences.insert(mode, values);
        }
        Ok(())
    }

    /// Compute every scalar statistic of every mode over the merged series.
    ///
    /// A zero reference quantity stores `NaN`.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::Statistic`] on inconsistent series.
    pub fn compute_estimates(&mut self) -> Result<(), AggregateError> {
        for &mode in &self.modes {
            for stat in Statistic::SCALAR {
                let value = metrics::evaluate_stat_or_nan(
                    stat,
                    &self.angles,
                    mode_series(&self.analytical, mode),
                    mode_series(&self.results, mode),
                    self.sign_mode,
                )?;
                let value = value.as_scalar().unwrap_or(f64::NAN);
                if value.is_nan() {
                    warn!(%mode, %stat, members = self.members.len(), "aggregate estimate is NaN");
                }
                self.estimates.entry(stat).or_default().insert(mode, value);
            }
        }
        Ok(())
    }

    fn check_mode(&self, mode: SifMode) -> Result<(), AggregateError> {
        if self.modes.contains(&mode) {
            Ok(())
        } else {
            Err(AggregateError::UnknownMode(mode))
        }
    }

    /// Analytical solution at the aggregate's angles with the tensile stress set to `sigma`.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::UnknownMode`] for a mode outside the aggregate
    /// and [`AggregateError::Solution`] for invalid parameters.
    pub fn evaluate_envelope_at(&self, sigma: f64, mode: SifMode) -> Result<Vec<f64>, AggregateError> {
        self.check_mode(mode)?;
        match self.parameters {
            Some(params) => Ok(analytical::evaluate(mode, &params.with_sigma(sigma), &self.angles)?),
            None => Ok(Vec::new()),
        }
    }

    /// Data points as `(angle, |result|)`.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::UnknownMode`] for a mode outside the aggregate.
    pub fn magnitude_points(&self, mode: SifMode) -> Result<Vec<Point>, AggregateError> {
        self.check_mode(mode)?;
        Ok(self
            .angles
            .iter()
            .zip(mode_series(&self.results, mode))
            .map(|(&angle, &value)| Point::new(angle, value.abs()))
            .collect())
    }

    /// Region under the envelope `|solution(sigma)|`; points on the envelope
    /// count as under it.
    ///
    /// # Errors
    ///
    /// See [`AggregatedRecord::evaluate_envelope_at`].
    pub fn envelope_region(&self, sigma: f64, mode: SifMode) -> Result<CurveRegion, AggregateError> {
        let magnitudes: Vec<f64> = self
            .evaluate_envelope_at(sigma, mode)?
            .into_iter()
            .map(f64::abs)
            .collect();
        Ok(CurveRegion::new(&self.angles, &magnitudes))
    }

    /// Split data points by the band between two envelopes.
    ///
    /// A point is inside when it lies under the upper envelope but not under
    /// the lower one. Returned points keep the sign of the result.
    ///
    /// # Errors
    ///
    /// See [`AggregatedRecord::evaluate_envelope_at`].
    pub fn partition_points(
        &self,
        mode: SifMode,
        sigma_lower: f64,
        sigma_upper: f64,
    ) -> Result<PointPartition, AggregateError> {
        let points = self.magnitude_points(mode)?;
        let lower = self.envelope_region(sigma_lower, mode)?.contains_points(&points);
        let upper = self.envelope_region(sigma_upper, mode)?.contains_points(&points);
        let mut partition = PointPartition::default();
        let signed = mode_series(&self.results, mode);
        for (idx, (&below_lower, &below_upper)) in lower.iter().zip(&upper).enumerate() {
            let point = Point::new(self.angles[idx], signed[idx]);
            if below_upper && !below_lower {
                partition.inside.push(point);
            } else {
                partition.outside.push(point);
            }
        }
        Ok(partition)
    }

    /// Modes the aggregate was built for.
    #[must_use]
    pub fn modes(&self) -> &[SifMode] {
        &self.modes
    }

    /// Keys of the merged records.
    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Number of merged data points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.angles.len()
    }

    /// Whether no data point was merged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    /// Sorted angles in `[0, 360)`.
    #[must_use]
    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    /// Merged results of a mode.
    #[must_use]
    pub fn results(&self, mode: SifMode) -> Option<&[f64]> {
        self.results.get(&mode).map(Vec::as_slice)
    }

    /// Merged analytical solution of a mode.
    #[must_use]
    pub fn analytical_solution(&self, mode: SifMode) -> Option<&[f64]> {
        self.analytical.get(&mode).map(Vec::as_slice)
    }

    /// Difference series of a mode, after [`AggregatedRecord::compute_errors`].
    #[must_use]
    pub fn differences(&self, mode: SifMode) -> Option<&[f64]> {
        self.differences.get(&mode).map(Vec::as_slice)
    }

    /// Series selected by kind.
    #[must_use]
    pub fn series(&self, kind: SeriesKind, mode: SifMode) -> Option<&[f64]> {
        match kind {
            SeriesKind::Results => self.results(mode),
            SeriesKind::Difference => self.differences(mode),
        }
    }

    /// Single-valued analytical parameters; `None` when nothing was merged.
    #[must_use]
    pub fn parameters(&self) -> Option<AnalyticalParameters> {
        self.parameters
    }

    /// Scalar statistics, after [`AggregatedRecord::compute_estimates`].
    #[must_use]
    pub fn estimates(&self) -> &Estimates {
        &self.estimates
    }

    /// One scalar statistic.
    #[must_use]
    pub fn estimate(&self, stat: Statistic, mode: SifMode) -> Option<f64> {
        self.estimates.get(&stat).and_then(|per_mode| per_mode.get(&mode)).copied()
    }

    /// Statistic value in the form shared with single records.
    #[must_use]
    pub fn stat_value(&self, stat: Statistic, mode: SifMode) -> Option<StatValue> {
        match stat {
            Statistic::Difference => self.differences(mode).map(|values| StatValue::Series(values.to_vec())),
            _ => self.estimate(stat, mode).map(StatValue::Scalar),
        }
    }
}

fn mode_series(map: &BTreeMap<SifMode, Vec<f64>>, mode: SifMode) -> &[f64] {
    map.get(&mode).map(Vec::as_slice).unwrap_or_default()
}

/// Collapse per-record parameters, failing when any of them takes two values.
fn unique_parameters(
    parameters: &[AnalyticalParameters],
) -> Result<Option<AnalyticalParameters>, AggregateError> {
    let Some(first) = parameters.first().copied() else {
        return Ok(None);
    };
    let fields: [(&'static str, fn(&AnalyticalParameters) -> f64); 6] = [
        ("a", |p| p.a),
        ("b", |p| p.b),
        ("v", |p| p.v),
        ("gamma", |p| p.gamma),
        ("omega", |p| p.omega),
        ("sigma", |p| p.sigma),
    ];
    for (name, field) in fields {
        let mut values: Vec<f64> = parameters.iter().map(field).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        if values.len() > 1 {
            return Err(AggregateError::AmbiguousParameter { name, values });
        }
    }
    Ok(Some(first))
}
