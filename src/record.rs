//! A single simulation: its parameters, raw results and error statistics.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::analytical::{self, AnalyticalParameters, SifMode};
use crate::errors::{RecordError, StatError};
use crate::metrics::{self, ContourMap, SignMode, StatValue, Statistic};
use crate::repository::{Repository, SeedParameters, SimulationEntry};
use crate::tree::Category;

/// Container dimensions of a simulation.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Container {
    /// Twice the stored container radius.
    pub diameter: f64,
    /// Container height.
    pub height: f64,
}

/// Per-mode statistics of one record, keyed by statistic then mode.
pub type ErrorReport = BTreeMap<Statistic, BTreeMap<SifMode, StatValue>>;

/// One loaded simulation.
///
/// Parameters and raw results are immutable after [`SimulationRecord::load`];
/// the analytical solution and the statistics are derived lazily.
#[derive(Clone, Debug)]
pub struct SimulationRecord {
    key: String,
    modes: Vec<SifMode>,
    sign_mode: SignMode,
    entry: SimulationEntry,
    angles: Vec<f64>,
    raw_results: BTreeMap<SifMode, ContourMap>,
    analytical: BTreeMap<SifMode, Vec<f64>>,
    results: BTreeMap<SifMode, Vec<f64>>,
    errors: ErrorReport,
    calculated_errors: bool,
}

impl SimulationRecord {
    /// Read a record from the repository, keeping raw results for `modes`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the entry cannot be read or decoded, or when
    /// a successful entry lacks consistent results for one of the modes.
    pub fn load(repo: &dyn Repository, key: &str, modes: &[SifMode]) -> Result<Self, RecordError> {
        let entry = repo.load_entry(key)?;
        Self::from_entry(key, entry, modes)
    }

    /// Build a record from an already decoded entry.
    ///
    /// # Errors
    ///
    /// See [`SimulationRecord::load`].
    pub fn from_entry(key: &str, entry: SimulationEntry, modes: &[SifMode]) -> Result<Self, RecordError> {
        let mut angles = Vec::new();
        let mut raw_results = BTreeMap::new();
        if entry.reports.successful_analysis {
            for &mode in modes {
                let missing = || RecordError::MissingResults {
                    key: key.to_owned(),
                    mode,
                };
                let results = entry.results().ok_or_else(missing)?;
                let contours = results.sorted_sifs.contours(mode).ok_or_else(missing)?;
                for series in contours.values() {
                    if series.len() != results.sorted_beta_angles.len() {
                        return Err(RecordError::Statistic {
                            key: key.to_owned(),
                            mode,
                            source: StatError::LengthMismatch {
                                left: results.sorted_beta_angles.len(),
                                right: series.len(),
                            },
                        });
                    }
                }
                angles.clone_from(&results.sorted_beta_angles);
                raw_results.insert(mode, contours.clone());
            }
        }
        Ok(Self {
            key: key.to_owned(),
            modes: modes.to_vec(),
            sign_mode: SignMode::default(),
            entry,
            angles,
            raw_results,
            analytical: BTreeMap::new(),
            results: BTreeMap::new(),
            errors: BTreeMap::new(),
            calculated_errors: false,
        })
    }

    /// Use `sign_mode` for the normalized error statistics.
    #[must_use]
    pub fn with_sign_mode(mut self, sign_mode: SignMode) -> Self {
        self.sign_mode = sign_mode;
        self
    }

    /// Evaluate the analytical solution of every requested mode at the record's angles.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Solution`] when the record parameters are invalid.
    pub fn compute_analytical_solution(&mut self) -> Result<(), RecordError> {
        let params = self.analytical_parameters();
        for &mode in &self.modes {
            let values = analytical::evaluate(mode, &params, &self.angles).map_err(|source| {
                RecordError::Solution {
                    key: self.key.clone(),
                    source,
                }
            })?;
            self.analytical.insert(mode, values);
        }
        Ok(())
    }

    /// Average the contours and compute every statistic for every requested mode.
    ///
    /// The `contours - 2` centered contours are averaged, dropping the
    /// innermost and outermost one. Does nothing for failed records or when
    /// already computed. A zero reference quantity stores `NaN` for the
    /// affected statistic.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingSolution`] when the analytical solution has
    /// not been computed, and [`RecordError::Statistic`] on inconsistent series
    /// or when a mode has fewer than three contours.
    pub fn compute_statistics(&mut self) -> Result<(), RecordError> {
        if self.calculated_errors || !self.is_successful() {
            return Ok(());
        }
        for &mode in &self.modes {
            let Some(solution) = self.analytical.get(&mode) else {
                return Err(RecordError::MissingSolution(self.key.clone()));
            };
            let Some(contours) = self.raw_results.get(&mode) else {
                return Err(RecordError::MissingResults {
                    key: self.key.clone(),
                    mode,
                });
            };
            let window = contours.len().saturating_sub(2);
            let stat_error = |source| RecordError::Statistic {
                key: self.key.clone(),
                mode,
                source,
            };
            let averaged = metrics::contour_average(contours, window).map_err(stat_error)?;
            for stat in Statistic::ALL {
                let value = metrics::evaluate_stat_or_nan(
                    stat,
                    &self.angles,
                    solution,
                    &averaged,
                    self.sign_mode,
                )
                .map_err(stat_error)?;
                if value.as_scalar().is_some_and(f64::is_nan) {
                    warn!(key = %self.key, %mode, %stat, "zero reference quantity; stored NaN");
                }
                self.errors.entry(stat).or_default().insert(mode, value);
            }
            self.results.insert(mode, averaged);
        }
        self.calculated_errors = true;
        debug!(key = %self.key, "computed record statistics");
        Ok(())
    }

    /// Composite repository key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Modes whose results were loaded.
    #[must_use]
    pub fn modes(&self) -> &[SifMode] {
        &self.modes
    }

    /// Sign rule of the normalized errors.
    #[must_use]
    pub fn sign_mode(&self) -> SignMode {
        self.sign_mode
    }

    /// Whether the analysis finished.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.entry.reports.successful_analysis
    }

    /// Whether [`SimulationRecord::compute_statistics`] has run.
    #[must_use]
    pub fn calculated_errors(&self) -> bool {
        self.calculated_errors
    }

    /// Decoded repository entry.
    #[must_use]
    pub fn entry(&self) -> &SimulationEntry {
        &self.entry
    }

    /// Crack-front angles in degrees; empty for failed records.
    #[must_use]
    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    /// Raw contours of a mode.
    #[must_use]
    pub fn raw_results(&self, mode: SifMode) -> Option<&ContourMap> {
        self.raw_results.get(&mode)
    }

    /// Contour-averaged results of a mode.
    #[must_use]
    pub fn results(&self, mode: SifMode) -> Option<&[f64]> {
        self.results.get(&mode).map(Vec::as_slice)
    }

    /// Analytical solution of a mode.
    #[must_use]
    pub fn analytical_solution(&self, mode: SifMode) -> Option<&[f64]> {
        self.analytical.get(&mode).map(Vec::as_slice)
    }

    /// Every computed statistic.
    #[must_use]
    pub fn errors(&self) -> &ErrorReport {
        &self.errors
    }

    /// One computed statistic.
    #[must_use]
    pub fn error(&self, stat: Statistic, mode: SifMode) -> Option<&StatValue> {
        self.errors.get(&stat).and_then(|per_mode| per_mode.get(&mode))
    }

    /// Inputs of the analytical solution.
    #[must_use]
    pub fn analytical_parameters(&self) -> AnalyticalParameters {
        let input = &self.entry.input;
        AnalyticalParameters {
            a: input.crack_parameters.a,
            b: input.crack_parameters.b,
            v: input.material.v,
            gamma: input.analysis_parameters.gamma,
            omega: input.analysis_parameters.omega,
            sigma: input.analysis_parameters.sigma,
        }
    }

    /// Mesh seed counts.
    #[must_use]
    pub fn mesh_parameters(&self) -> SeedParameters {
        self.entry.input.seed_parameters
    }

    /// Container dimensions.
    #[must_use]
    pub fn container(&self) -> Container {
        let geometry = &self.entry.input.geometric_parameters;
        Container {
            diameter: 2.0 * geometry.container_radius,
            height: geometry.container_height,
        }
    }

    /// Ratio of the crack axes `a / b`.
    #[must_use]
    pub fn crack_ratio(&self) -> f64 {
        self.entry.input.crack_parameters.a / self.entry.input.crack_parameters.b
    }

    /// Categorical value of the record for a tree level.
    ///
    /// FEM analyses are told apart by their mesh transformation, so
    /// [`Category::ModelType`] resolves to the transformation for them.
    #[must_use]
    pub fn parameter(&self, category: Category) -> Option<String> {
        let input = &self.entry.input;
        match category {
            Category::CrackRatio => Some(self.crack_ratio().to_string()),
            Category::AnalysisType => Some(input.analysis_type.clone()),
            Category::ModelType if input.analysis_type == "FEM" => {
                input.mesh_parameters.transformation_type.clone()
            }
            Category::ModelType => Some(input.model_type.clone()),
            Category::Transform => input.mesh_parameters.transformation_type.clone(),
            Category::Elements => Some(input.mesh_parameters.elements.clone()),
            Category::EntryKey => Some(self.key.clone()),
            Category::Diameter => Some(self.container().diameter.to_string()),
            Category::Height => Some(self.container().height.to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use approx::assert_relative_eq;
    use serde_json::{json, Value};

    use super::*;
    use crate::repository::MemoryRepository;

    /// Stored entry whose contours are the analytical K1 values scaled per contour.
    pub(crate) fn entry_json(analysis_type: &str, success: bool, scales: &[f64]) -> Value {
        let params = AnalyticalParameters { a: 20.0, b: 10.0, v: 0.3, gamma: 0.0, omega: 0.0, sigma: 100.0 };
        let angles = [0.0, 45.0, 90.0, 135.0, 180.0];
        let exact = analytical::evaluate(SifMode::I, &params, &angles).expect("valid parameters");
        let contours: serde_json::Map<String, Value> = scales
            .iter()
            .enumerate()
            .map(|(idx, scale)| {
                let series: Vec<f64> = exact.iter().map(|v| v * scale).collect();
                ((idx + 1).to_string(), json!(series))
            })
            .collect();
        let zeros: serde_json::Map<String, Value> = (1..=scales.len())
            .map(|idx| (idx.to_string(), json!([0.0, 0.0, 0.0, 0.0, 0.0])))
            .collect();
        let mut value = json!({
            "input": {
                "crackParameters": {"a": 20.0, "b": 10.0, "crackType": "embedded"},
                "analysisParameters": {"sigma": 100.0, "gamma": 0.0, "omega": 0.0},
                "analysisType": analysis_type,
                "modelType": "multiplePartitions",
                "meshParameters": {"elements": "LinearTet", "transformationType": "FFT"},
                "geometricParameters": {"containerHeight": 200.0, "containerRadius": 60.0},
                "material": {"E": 210_000.0, "v": 0.3}
            },
            "reports": {"successfulAnalysis": success}
        });
        if success {
            value["odb"] = json!({
                "results": {
                    "sortedBetaAngles": angles,
                    "sortedSIFs": {"K1": contours, "K2": zeros.clone(), "K3": zeros}
                }
            });
        }
        value
    }

    fn load(value: Value, modes: &[SifMode]) -> SimulationRecord {
        let mut repo = MemoryRepository::new();
        let key = repo.insert("db", "sim", value);
        SimulationRecord::load(&repo, &key, modes).expect("valid record")
    }

    #[test]
    fn statistics_use_the_centered_contour_window() {
        let mut record = load(entry_json("XFEM", true, &[0.5, 1.1, 1.2, 3.0]), &[SifMode::I]);
        record.compute_analytical_solution().expect("valid parameters");
        record.compute_statistics().expect("consistent series");

        let exact = record.analytical_solution(SifMode::I).expect("computed").to_vec();
        let averaged = record.results(SifMode::I).expect("computed");
        for (value, reference) in averaged.iter().zip(&exact) {
            assert_relative_eq!(*value, 1.15 * reference, epsilon = 1.0e-9);
        }
        let dot = record.error(Statistic::DotProd, SifMode::I).and_then(StatValue::as_scalar);
        assert_relative_eq!(dot.expect("scalar"), 1.15_f64.powi(2) - 1.0, epsilon = 1.0e-9);
        let area = record.error(Statistic::AreaDiff, SifMode::I).and_then(StatValue::as_scalar);
        assert_relative_eq!(area.expect("scalar"), 0.15, epsilon = 1.0e-9);
        assert!(record.calculated_errors());
        assert_eq!(record.errors().len(), Statistic::ALL.len());
    }

    #[test]
    fn zero_analytical_reference_yields_nan() {
        let mut record = load(entry_json("XFEM", true, &[1.0, 1.0, 1.0]), &[SifMode::II]);
        record.compute_analytical_solution().expect("valid parameters");
        record.compute_statistics().expect("recoverable");
        for stat in Statistic::SCALAR {
            let value = record.error(stat, SifMode::II).and_then(StatValue::as_scalar);
            if stat == Statistic::Rmsd {
                assert_eq!(value, Some(0.0));
            } else {
                assert!(value.expect("scalar").is_nan(), "{stat} should be NaN");
            }
        }
    }

    #[test]
    fn two_contours_leave_an_empty_window() {
        let mut record = load(entry_json("XFEM", true, &[1.0, 1.0]), &[SifMode::I]);
        record.compute_analytical_solution().expect("valid parameters");
        assert!(matches!(
            record.compute_statistics(),
            Err(RecordError::Statistic {
                mode: SifMode::I,
                source: StatError::InvalidContourWindow { requested: 0, available: 2 },
                ..
            })
        ));
        assert!(!record.calculated_errors());
    }

    #[test]
    fn statistics_require_the_analytical_solution() {
        let mut record = load(entry_json("XFEM", true, &[1.0, 1.0, 1.0]), &[SifMode::I]);
        assert!(matches!(record.compute_statistics(), Err(RecordError::MissingSolution(_))));
    }

    #[test]
    fn failed_records_skip_statistics() {
        let mut record = load(entry_json("XFEM", false, &[]), &SifMode::ALL);
        assert!(!record.is_successful());
        record.compute_analytical_solution().expect("valid parameters");
        record.compute_statistics().expect("no-op");
        assert!(record.errors().is_empty());
        assert!(record.angles().is_empty());
    }

    #[test]
    fn successful_records_need_results_for_each_mode() {
        let mut value = entry_json("XFEM", true, &[1.0, 1.0, 1.0]);
        value["odb"]["results"]["sortedSIFs"]
            .as_object_mut()
            .expect("object")
            .remove("K3");
        let mut repo = MemoryRepository::new();
        let key = repo.insert("db", "sim", value);
        assert!(matches!(
            SimulationRecord::load(&repo, &key, &SifMode::ALL),
            Err(RecordError::MissingResults { mode: SifMode::III, .. })
        ));
    }

    #[test]
    fn parameters_for_tree_levels() {
        let fem = load(entry_json("FEM", false, &[]), &[]);
        assert_eq!(fem.parameter(Category::ModelType).as_deref(), Some("FFT"));
        assert_eq!(fem.parameter(Category::CrackRatio).as_deref(), Some("2"));
        assert_eq!(fem.parameter(Category::EntryKey).as_deref(), Some("db$sim"));
        assert_eq!(fem.parameter(Category::Diameter).as_deref(), Some("120"));
        assert_eq!(fem.container(), Container { diameter: 120.0, height: 200.0 });

        let xfem = load(entry_json("XFEM", false, &[]), &[]);
        assert_eq!(xfem.parameter(Category::ModelType).as_deref(), Some("multiplePartitions"));
        assert_eq!(xfem.analytical_parameters().sigma, 100.0);
        assert_eq!(xfem.mesh_parameters(), SeedParameters::default());
    }
}
