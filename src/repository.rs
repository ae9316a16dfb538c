//! Keyed access to stored simulation entries.
//!
//! Records are addressed by composite keys `dataset$record`. A dataset is one
//! JSON object mapping record names to entries that follow the field contract
//! modelled by [`SimulationEntry`].

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::analytical::SifMode;
use crate::errors::RepositoryError;
use crate::metrics::ContourMap;

/// Separator between the dataset name and the record name of a composite key.
pub const KEY_SEPARATOR: char = '$';

/// Dataset entries that never describe a simulation.
pub const SKIPPED_ENTRIES: [&str; 1] = ["metadata"];

/// Join a dataset name and a record name into a composite key.
///
/// # Examples
/// ```
/// use shardx::repository::{compose_key, split_key};
///
/// let key = compose_key("batch01", "sim042");
/// assert_eq!(key, "batch01$sim042");
/// assert_eq!(split_key(&key).expect("composite"), ("batch01", "sim042"));
/// ```
#[must_use]
pub fn compose_key(dataset: &str, record: &str) -> String {
    format!("{dataset}{KEY_SEPARATOR}{record}")
}

/// Split a composite key into its dataset and record names.
///
/// # Errors
///
/// Returns [`RepositoryError::MalformedKey`] when the separator is missing.
pub fn split_key(key: &str) -> Result<(&str, &str), RepositoryError> {
    key.split_once(KEY_SEPARATOR)
        .ok_or_else(|| RepositoryError::MalformedKey(key.to_owned()))
}

/// Crack geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrackParameters {
    /// Major crack axis.
    pub a: f64,
    /// Minor crack axis.
    pub b: f64,
    /// Crack type label.
    pub crack_type: String,
}

/// Remote load.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadParameters {
    /// Tensile stress magnitude.
    pub sigma: f64,
    /// Load inclination in degrees.
    pub gamma: f64,
    /// Shear orientation in degrees.
    pub omega: f64,
}

/// Mesh description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshDescription {
    /// Element type label.
    pub elements: String,
    /// Mesh transformation, only present for some FEM models.
    #[serde(default)]
    pub transformation_type: Option<String>,
}

/// Mesh seed counts; every field is optional in stored entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedParameters {
    /// Seeds along the refined crack zone.
    pub crack_zone_refinement_seeds: Option<u32>,
    /// Seeds along the refined container region.
    pub container_refinement_seeds: Option<u32>,
    /// Seeds along the main crack zone edges.
    pub crack_zone_main_seeds: Option<u32>,
    /// Seeds along the crack front arc.
    pub arc_seeds: Option<u32>,
    /// Seeds on every edge (XFEM models).
    pub all_edges: Option<u32>,
    /// Seeds on the crack edges (XFEM models).
    pub crack_edges: Option<u32>,
}

/// Container geometry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometricParameters {
    /// Height of the cylindrical container.
    pub container_height: f64,
    /// Radius of the cylindrical container.
    pub container_radius: f64,
}

/// Linear elastic material.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Young's modulus.
    #[serde(rename = "E")]
    pub modulus: f64,
    /// Poisson ratio.
    pub v: f64,
}

/// Simulation inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInput {
    /// Crack geometry.
    pub crack_parameters: CrackParameters,
    /// Remote load.
    pub analysis_parameters: LoadParameters,
    /// Analysis family, such as `FEM` or `XFEM`.
    pub analysis_type: String,
    /// Model variant within the analysis family.
    pub model_type: String,
    /// Mesh description.
    pub mesh_parameters: MeshDescription,
    /// Mesh seeds.
    #[serde(default)]
    pub seed_parameters: SeedParameters,
    /// Container geometry.
    pub geometric_parameters: GeometricParameters,
    /// Material constants.
    pub material: Material,
}

/// Post-processing reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReports {
    /// Whether the solver finished and produced results.
    pub successful_analysis: bool,
}

/// Raw per-contour SIF results; auxiliary quantities are kept undecoded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SortedSifs {
    /// Opening mode contours.
    #[serde(rename = "K1", default)]
    pub k1: Option<ContourMap>,
    /// In-plane shear mode contours.
    #[serde(rename = "K2", default)]
    pub k2: Option<ContourMap>,
    /// Out-of-plane shear mode contours.
    #[serde(rename = "K3", default)]
    pub k3: Option<ContourMap>,
    /// J-integral contours.
    #[serde(rename = "J", default)]
    pub j: Option<Value>,
    /// Crack propagation direction.
    #[serde(rename = "Cpd", default)]
    pub cpd: Option<Value>,
    /// J-integral estimated from the SIFs.
    #[serde(rename = "JKs", default)]
    pub jks: Option<Value>,
    /// T-stress contours.
    #[serde(rename = "T", default)]
    pub t: Option<Value>,
}

impl SortedSifs {
    /// Raw contours of one SIF mode.
    #[must_use]
    pub fn contours(&self, mode: SifMode) -> Option<&ContourMap> {
        match mode {
            SifMode::I => self.k1.as_ref(),
            SifMode::II => self.k2.as_ref(),
            SifMode::III => self.k3.as_ref(),
        }
    }
}

/// Results extracted from the solver output database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OdbResults {
    /// Crack-front angles in degrees.
    pub sorted_beta_angles: Vec<f64>,
    /// Raw SIF results.
    #[serde(rename = "sortedSIFs", default)]
    pub sorted_sifs: SortedSifs,
}

/// Wrapper around [`OdbResults`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Odb {
    /// Extracted results.
    pub results: OdbResults,
}

/// One stored simulation, decoded from the nested field contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationEntry {
    /// Simulation inputs.
    pub input: SimulationInput,
    /// Solver reports.
    pub reports: SimulationReports,
    /// Results; absent for failed analyses.
    #[serde(default)]
    pub odb: Option<Odb>,
}

impl SimulationEntry {
    /// Decode an entry from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Malformed`] when a required field is missing
    /// or has the wrong type.
    pub fn from_value(key: &str, value: Value) -> Result<Self, RepositoryError> {
        serde_json::from_value(value).map_err(|source| RepositoryError::Malformed {
            key: key.to_owned(),
            source,
        })
    }

    /// Raw results, present only for entries written by a finished analysis.
    #[must_use]
    pub fn results(&self) -> Option<&OdbResults> {
        self.odb.as_ref().map(|odb| &odb.results)
    }
}

/// Read-only store of simulation entries.
pub trait Repository {
    /// Load the raw JSON entry for a composite key.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the dataset or record is unknown or
    /// cannot be read.
    fn load_record(&self, key: &str) -> Result<Value, RepositoryError>;

    /// List the composite keys of every simulation in a dataset.
    ///
    /// Entries named in [`SKIPPED_ENTRIES`] are never listed.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the dataset cannot be read.
    fn list_keys(&self, dataset: &str) -> Result<BTreeSet<String>, RepositoryError>;

    /// Load and decode the entry for a composite key.
    ///
    /// # Errors
    ///
    /// See [`Repository::load_record`] and [`SimulationEntry::from_value`].
    fn load_entry(&self, key: &str) -> Result<SimulationEntry, RepositoryError> {
        SimulationEntry::from_value(key, self.load_record(key)?)
    }

    /// Union of the keys of several datasets.
    ///
    /// # Errors
    ///
    /// Fails on the first dataset that cannot be listed.
    fn all_keys(&self, datasets: &[String]) -> Result<BTreeSet<String>, RepositoryError> {
        let mut keys = BTreeSet::new();
        for dataset in datasets {
            keys.extend(self.list_keys(dataset)?);
        }
        Ok(keys)
    }
}

fn listed_keys<'a>(dataset: &str, records: impl Iterator<Item = &'a String>) -> BTreeSet<String> {
    records
        .filter(|name| !SKIPPED_ENTRIES.contains(&name.as_str()))
        .map(|name| compose_key(dataset, name))
        .collect()
}

/// Repository backed by one `<dataset>.json` file per dataset under a root directory.
///
/// Each file is parsed once, on first access.
#[derive(Debug)]
pub struct JsonRepository {
    root: PathBuf,
    datasets: RefCell<BTreeMap<String, Rc<Map<String, Value>>>>,
}

impl JsonRepository {
    /// Create a repository rooted at `root`; nothing is read until first access.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            datasets: RefCell::new(BTreeMap::new()),
        }
    }

    /// Root directory of the repository.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the datasets available under the root, in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Io`] when the root cannot be listed.
    pub fn discover_datasets(&self) -> Result<Vec<String>, RepositoryError> {
        let io_error = |source| RepositoryError::Io {
            path: self.root.clone(),
            source,
        };
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    names.push(stem.to_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn dataset(&self, name: &str) -> Result<Rc<Map<String, Value>>, RepositoryError> {
        if let Some(cached) = self.datasets.borrow().get(name) {
            return Ok(Rc::clone(cached));
        }
        let path = self.root.join(format!("{name}.json"));
        if !path.is_file() {
            return Err(RepositoryError::UnknownDataset(name.to_owned()));
        }
        let text = fs::read_to_string(&path).map_err(|source| RepositoryError::Io {
            path: path.clone(),
            source,
        })?;
        let entries: Map<String, Value> =
            serde_json::from_str(&text).map_err(|source| RepositoryError::Malformed {
                key: name.to_owned(),
                source,
            })?;
        debug!(dataset = name, entries = entries.len(), "loaded dataset");
        let entries = Rc::new(entries);
        self.datasets
            .borrow_mut()
            .insert(name.to_owned(), Rc::clone(&entries));
        Ok(entries)
    }
}

impl Repository for JsonRepository {
    fn load_record(&self, key: &str) -> Result<Value, RepositoryError> {
        let (dataset, record) = split_key(key)?;
        self.dataset(dataset)?
            .get(record)
            .cloned()
            .ok_or_else(|| RepositoryError::UnknownRecord(key.to_owned()))
    }

    fn list_keys(&self, dataset: &str) -> Result<BTreeSet<String>, RepositoryError> {
        Ok(listed_keys(dataset, self.dataset(dataset)?.keys()))
    }
}

/// Repository holding its entries in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryRepository {
    datasets: BTreeMap<String, BTreeMap<String, Value>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry and return its composite key.
    pub fn insert(&mut self, dataset: &str, record: &str, entry: Value) -> String {
        self.datasets
            .entry(dataset.to_owned())
            .or_default()
            .insert(record.to_owned(), entry);
        compose_key(dataset, record)
    }

    /// Names of the stored datasets.
    pub fn datasets(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }
}

impl Repository for MemoryRepository {
    fn load_record(&self, key: &str) -> Result<Value, RepositoryError> {
        let (dataset, record) = split_key(key)?;
        self.datasets
            .get(dataset)
            .ok_or_else(|| RepositoryError::UnknownDataset(dataset.to_owned()))?
            .get(record)
            .cloned()
            .ok_or_else(|| RepositoryError::UnknownRecord(key.to_owned()))
    }

    fn list_keys(&self, dataset: &str) -> Result<BTreeSet<String>, RepositoryError> {
        let records = self
            .datasets
            .get(dataset)
            .ok_or_else(|| RepositoryError::UnknownDataset(dataset.to_owned()))?;
        Ok(listed_keys(dataset, records.keys()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(success: bool) -> Value {
        let mut value = json!({
            "input": {
                "crackParameters": {"a": 20.0, "b": 10.0, "crackType": "embedded"},
                "analysisParameters": {"sigma": 100.0, "gamma": 0.0, "omega": 0.0},
                "analysisType": "FEM",
                "modelType": "multiplePartitions",
                "meshParameters": {"elements": "C3D15", "transformationType": "FFT"},
                "seedParameters": {"arcSeeds": 12, "allEdges": 40},
                "geometricParameters": {"containerHeight": 200.0, "containerRadius": 60.0},
                "material": {"E": 210_000.0, "v": 0.3}
            },
            "reports": {"successfulAnalysis": success}
        });
        if success {
            value["odb"] = json!({
                "results": {
                    "sortedBetaAngles": [0.0, 90.0],
                    "sortedSIFs": {
                        "K1": {"1": [1.0, 2.0], "2": [3.0, 4.0]},
                        "J": {"1": [0.5, 0.5]}
                    }
                }
            });
        }
        value
    }

    #[test]
    fn composite_keys() {
        assert_eq!(compose_key("db", "sim"), "db$sim");
        assert_eq!(split_key("db$sim").expect("composite"), ("db", "sim"));
        assert!(matches!(split_key("sim"), Err(RepositoryError::MalformedKey(_))));
    }

    #[test]
    fn decodes_field_contract() {
        let decoded = SimulationEntry::from_value("db$sim", entry(true)).expect("valid entry");
        assert_eq!(decoded.input.crack_parameters.a, 20.0);
        assert_eq!(decoded.input.material.modulus, 210_000.0);
        assert_eq!(decoded.input.seed_parameters.arc_seeds, Some(12));
        assert_eq!(decoded.input.seed_parameters.crack_edges, None);
        let results = decoded.results().expect("successful entry");
        let k1 = results.sorted_sifs.k1.as_ref().expect("K1 results");
        assert_eq!(k1.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert!(results.sorted_sifs.contours(SifMode::II).is_none());
        assert!(results.sorted_sifs.j.is_some());

        let failed = SimulationEntry::from_value("db$sim", entry(false)).expect("valid entry");
        assert!(failed.results().is_none());
    }

    #[test]
    fn rejects_incomplete_entries() {
        let result = SimulationEntry::from_value("db$sim", json!({"input": {}}));
        assert!(matches!(result, Err(RepositoryError::Malformed { .. })));
    }

    #[test]
    fn memory_repository_skips_metadata() {
        let mut repo = MemoryRepository::new();
        let key = repo.insert("db", "sim1", entry(true));
        repo.insert("db", "metadata", json!({"created": "today"}));
        repo.insert("other", "sim2", entry(false));

        assert_eq!(repo.list_keys("db").expect("known"), BTreeSet::from([key.clone()]));
        assert_eq!(repo.load_entry(&key).expect("stored").input.analysis_type, "FEM");
        let all = repo
            .all_keys(&["db".to_owned(), "other".to_owned()])
            .expect("known datasets");
        assert_eq!(all.len(), 2);
        assert!(matches!(repo.list_keys("none"), Err(RepositoryError::UnknownDataset(_))));
        assert!(matches!(repo.load_record("db$missing"), Err(RepositoryError::UnknownRecord(_))));
    }

    #[test]
    fn json_repository_reads_dataset_files() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let dataset = json!({"sim1": entry(true), "sim2": entry(false), "metadata": {}});
        fs::write(dir.path().join("batch.json"), dataset.to_string()).expect("writable");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("writable");

        let repo = JsonRepository::new(dir.path());
        assert_eq!(repo.discover_datasets().expect("listable"), vec!["batch".to_owned()]);
        let keys = repo.list_keys("batch").expect("dataset exists");
        assert_eq!(
            keys,
            BTreeSet::from(["batch$sim1".to_owned(), "batch$sim2".to_owned()])
        );
        assert!(repo.load_entry("batch$sim1").expect("stored").reports.successful_analysis);
        assert!(matches!(repo.list_keys("absent"), Err(RepositoryError::UnknownDataset(_))));
    }

    #[test]
    fn json_repository_reports_malformed_files() {
        let dir = tempfile::tempdir().expect("temporary directory");
        fs::write(dir.path().join("broken.json"), "{not json").expect("writable");
        let repo = JsonRepository::new(dir.path());
        assert!(matches!(repo.list_keys("broken"), Err(RepositoryError::Malformed { .. })));
    }
}
