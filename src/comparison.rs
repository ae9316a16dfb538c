//! Side-by-side error comparison of the simulations of several tree branches.
//!
//! Every successful member of the compared branches gets a selection number,
//! counted from 1 across all branches in order. For each branch the output
//! holds a [`DataStr`] describing the members and a [`DataDict`] with the
//! error of every member per mode, ready for a plotting front end.

use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analytical::SifMode;
use crate::errors::{AggregateError, TreeError};
use crate::metrics::{SignMode, StatValue, Statistic};
use crate::record::{Container, SimulationRecord};
use crate::repository::Repository;
use crate::tree::ClassificationTree;

/// Axis label of every comparison panel.
pub const SELECTION_AXIS_LABEL: &str = "Selection ID Number";

/// Statistic and mode used to pick the best simulation of a branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    /// Scalar statistic to minimize in absolute value.
    pub statistic: Statistic,
    /// Mode the statistic is read for.
    pub mode: SifMode,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            statistic: Statistic::Rmsd,
            mode: SifMode::I,
        }
    }
}

/// Settings of a comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonOptions {
    /// Optimal member selection.
    pub criteria: Criteria,
    /// Statistic reported for every member.
    pub error_statistic: Statistic,
    /// Modes reported for every member.
    pub modes: Vec<SifMode>,
    /// Sign rule of the normalized errors.
    pub sign_mode: SignMode,
    /// Number of trailing path names in a panel title.
    pub title_depth: usize,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            criteria: Criteria::default(),
            error_statistic: Statistic::Difference,
            modes: SifMode::ALL.to_vec(),
            sign_mode: SignMode::default(),
            title_depth: 3,
        }
    }
}

/// Description of one compared branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStr {
    /// Selection number to record key.
    pub members: BTreeMap<usize, String>,
    /// Selection number of the member with the lowest criteria error.
    pub optimal_key: Option<usize>,
    /// Label of the selection axis.
    pub axis_label: String,
    /// Panel title.
    pub title: String,
}

/// Error of every member of a branch, keyed by mode then selection number.
pub type DataDict = BTreeMap<SifMode, BTreeMap<usize, StatValue>>;

/// Result of [`compare_branches`]; `data_str` and `data_dicts` are parallel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    /// One description per branch.
    pub data_str: Vec<DataStr>,
    /// One error table per branch.
    pub data_dicts: Vec<DataDict>,
}

impl Comparison {
    /// Selection number to record key over every branch.
    #[must_use]
    pub fn selection(&self) -> BTreeMap<usize, &str> {
        self.data_str
            .iter()
            .flat_map(|entry| entry.members.iter().map(|(number, key)| (*number, key.as_str())))
            .collect()
    }
}

/// Title made of the names of `node` and its ancestors, `depth` names in all.
///
/// # Errors
///
/// Returns [`TreeError::TooShallow`] when `node` sits above level `depth`.
pub fn subplot_title(
    tree: &ClassificationTree,
    node: NodeIndex,
    depth: usize,
) -> Result<String, TreeError> {
    let level = tree.level(node);
    if level < depth {
        return Err(TreeError::TooShallow { level, depth });
    }
    let names = tree.path_names(node);
    Ok(names[names.len() - depth..].join(" "))
}

/// Compare the successful members of `branches`.
///
/// Members are loaded in sorted key order. The optimal member of a branch
/// is the one whose criteria statistic has the lowest absolute value; `NaN`
/// values never win.
///
/// # Errors
///
/// Returns [`AggregateError`] when a title cannot be built or a member fails
/// to load or evaluate.
pub fn compare_branches(
    repo: &dyn Repository,
    tree: &ClassificationTree,
    branches: &[NodeIndex],
    options: &ComparisonOptions,
) -> Result<Comparison, AggregateError> {
    let mut modes = options.modes.clone();
    if !modes.contains(&options.criteria.mode) {
        modes.push(options.criteria.mode);
    }
    let mut comparison = Comparison::default();
    let mut count = 0;
    for &node in branches {
        let title = subplot_title(tree, node, options.title_depth)?;
        let mut entry = DataStr {
            members: BTreeMap::new(),
            optimal_key: None,
            axis_label: SELECTION_AXIS_LABEL.to_owned(),
            title,
        };
        let mut data = DataDict::new();
        let mut best: Option<(f64, usize)> = None;
        for key in tree.successful_members(node) {
            count += 1;
            let record = evaluated(repo, &key, &modes, options.sign_mode)?;
            for &mode in &options.modes {
                if let Some(value) = record.error(options.error_statistic, mode) {
                    data.entry(mode).or_default().insert(count, value.clone());
                }
            }
            if let Some(error) = criteria_error(&record, options.criteria) {
                if best.map_or(true, |(lowest, _)| error < lowest) {
                    best = Some((error, count));
                }
            }
            entry.members.insert(count, key);
        }
        entry.optimal_key = best.map(|(_, number)| number);
        debug!(title = %entry.title, members = entry.members.len(), optimal = ?entry.optimal_key, "compared branch");
        comparison.data_str.push(entry);
        comparison.data_dicts.push(data);
    }
    info!(branches = branches.len(), members = count, "built comparison");
    Ok(comparison)
}

fn evaluated(
    repo: &dyn Repository,
    key: &str,
    modes: &[SifMode],
    sign_mode: SignMode,
) -> Result<SimulationRecord, AggregateError> {
    let mut record = SimulationRecord::load(repo, key, modes)?.with_sign_mode(sign_mode);
    record.compute_analytical_solution()?;
    record.compute_statistics()?;
    Ok(record)
}

fn criteria_error(record: &SimulationRecord, criteria: Criteria) -> Option<f64> {
    record
        .error(criteria.statistic, criteria.mode)
        .and_then(StatValue::as_scalar)
        .map(f64::abs)
        .filter(|error| !error.is_nan())
}

/// For every container size, the record with the lowest absolute criteria
/// error and that error.
///
/// Records must have their statistics computed; records without a scalar
/// value for the criteria are skipped.
#[must_use]
pub fn lowest_error_per_container<'a>(
    records: impl IntoIterator<Item = &'a SimulationRecord>,
    criteria: Criteria,
) -> Vec<(Container, &'a str, f64)> {
    let mut lowest: Vec<(Container, &'a str, f64)> = Vec::new();
    for record in records {
        let Some(error) = criteria_error(record, criteria) else {
            continue;
        };
        let container = record.container();
        match lowest.iter_mut().find(|(size, _, _)| *size == container) {
            Some(slot) if error < slot.2 => *slot = (container, record.key(), error),
            Some(_) => {}
            None => lowest.push((container, record.key(), error)),
        }
    }
    lowest.sort_by(|left, right| {
        left.0
            .diameter
            .total_cmp(&right.0.diameter)
            .then(left.0.height.total_cmp(&right.0.height))
    });
    lowest
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use serde_json::Value;

    use super::*;
    use crate::record::tests::entry_json;
    use crate::repository::MemoryRepository;
    use crate::tree::Category;

    fn repository() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        repo.insert("db", "s1", entry_json("FEM", true, &[1.0, 1.3, 1.0]));
        repo.insert("db", "s2", entry_json("FEM", true, &[1.0, 1.05, 1.0]));
        repo.insert("db", "s3", entry_json("FEM", false, &[]));
        let mut xfem = entry_json("XFEM", true, &[1.0, 0.8, 1.0]);
        xfem["input"]["modelType"] = Value::from("simple");
        repo.insert("db", "s4", xfem);
        repo
    }

    fn tree(repo: &MemoryRepository) -> ClassificationTree {
        let keys = repo.list_keys("db").expect("dataset");
        ClassificationTree::from_repository(repo, &keys, &Category::DEFAULT_LEVELS).expect("loadable")
    }

    #[test]
    fn titles_use_trailing_path_names() {
        let repo = repository();
        let tree = tree(&repo);
        let leaf = tree.tree_branch(&["FEM", "FFT", "LinearTet"]).expect("unique");
        assert_eq!(subplot_title(&tree, leaf, 3).expect("deep enough"), "FEM FFT LinearTet");
        assert_eq!(subplot_title(&tree, leaf, 1).expect("deep enough"), "LinearTet");
        let fem = tree.tree_branch(&["FEM"]).expect("unique");
        assert_eq!(
            subplot_title(&tree, fem, 3),
            Err(TreeError::TooShallow { level: 2, depth: 3 })
        );
    }

    #[test]
    fn members_are_numbered_across_branches() {
        let repo = repository();
        let tree = tree(&repo);
        let branches = [
            tree.tree_branch(&["FEM", "FFT", "LinearTet"]).expect("unique"),
            tree.tree_branch(&["XFEM", "simple", "LinearTet"]).expect("unique"),
        ];
        let comparison = compare_branches(&repo, &tree, &branches, &ComparisonOptions::default())
            .expect("comparable");

        assert_eq!(comparison.data_str.len(), 2);
        let fem = &comparison.data_str[0];
        assert_eq!(fem.members, BTreeMap::from([(1, "db$s1".to_owned()), (2, "db$s2".to_owned())]));
        assert_eq!(fem.optimal_key, Some(2));
        assert_eq!(fem.axis_label, SELECTION_AXIS_LABEL);
        assert_eq!(fem.title, "FEM FFT LinearTet");

        let xfem = &comparison.data_str[1];
        assert_eq!(xfem.members, BTreeMap::from([(3, "db$s4".to_owned())]));
        assert_eq!(xfem.optimal_key, Some(3));
        assert_eq!(comparison.selection().len(), 3);

        let differences = &comparison.data_dicts[0][&SifMode::I][&1];
        let series = differences.as_series().expect("difference is a series");
        assert_eq!(series.len(), 5);
        assert!(series.iter().all(|value| *value > 0.0));
        assert_eq!(comparison.data_dicts[1][&SifMode::III].len(), 1);
    }

    #[test]
    fn lowest_error_is_grouped_by_container() {
        let repo = repository();
        let mut records: Vec<SimulationRecord> = ["db$s1", "db$s2", "db$s4"]
            .iter()
            .map(|key| {
                let mut record = SimulationRecord::load(&repo, key, &[SifMode::I]).expect("valid");
                record.compute_analytical_solution().expect("valid parameters");
                record.compute_statistics().expect("consistent");
                record
            })
            .collect();
        let mut wide = entry_json("FEM", true, &[1.0, 1.5, 1.0]);
        wide["input"]["geometricParameters"]["containerRadius"] = Value::from(80.0);
        let mut repo = repo;
        let key = repo.insert("db", "s5", wide);
        let mut record = SimulationRecord::load(&repo, &key, &[SifMode::I]).expect("valid");
        record.compute_analytical_solution().expect("valid parameters");
        record.compute_statistics().expect("consistent");
        records.push(record);

        let criteria = Criteria { statistic: Statistic::AreaDiff, mode: SifMode::I };
        let lowest = lowest_error_per_container(&records, criteria);
        assert_eq!(lowest.len(), 2);
        assert_eq!(lowest[0].0, Container { diameter: 120.0, height: 200.0 });
        assert_eq!(lowest[0].1, "db$s2");
        assert_relative_eq!(lowest[0].2, 0.05, epsilon = 1.0e-9);
        assert_eq!(lowest[1].1, "db$s5");
        assert_relative_eq!(lowest[1].2, 0.5, epsilon = 1.0e-9);
    }

    #[test]
    fn comparison_serializes_for_rendering() {
        let repo = repository();
        let tree = tree(&repo);
        let branch = tree.tree_branch(&["XFEM", "simple", "LinearTet"]).expect("unique");
        let options = ComparisonOptions {
            error_statistic: Statistic::Rmsd,
            modes: vec![SifMode::I],
            ..ComparisonOptions::default()
        };
        let comparison = compare_branches(&repo, &tree, &[branch], &options).expect("comparable");
        let json = serde_json::to_value(&comparison).expect("serializable");
        assert_eq!(json["dataStr"][0]["members"]["1"], "db$s4");
        assert_eq!(json["dataStr"][0]["optimalKey"], 1);
        assert_eq!(json["dataStr"][0]["axisLabel"], SELECTION_AXIS_LABEL);
        assert_eq!(json["dataStr"][0]["title"], "XFEM simple LinearTet");
        assert!(json["dataStr"][0].get("optimal_key").is_none());
        assert!(json["dataDicts"][0]["K1"]["1"].is_number());
    }
}
