#![warn(clippy::pedantic)]

use std::collections::{BTreeMap, BTreeSet};

use approx::assert_relative_eq;
use serde_json::{json, Map, Value};
use shardx::aggregate::AggregatedRecord;
use shardx::analytical::{self, AnalyticalParameters, SifMode};
use shardx::bound::{find_bounds, BoundSettings, Status};
use shardx::comparison::{compare_branches, ComparisonOptions};
use shardx::repository::{JsonRepository, Repository};
use shardx::tree::{Category, ClassificationTree, ROOT_NAME};
use shardx::{SignMode, Statistic};

const ANGLES: [f64; 5] = [0.0, 45.0, 90.0, 135.0, 180.0];

/// Entry whose middle contour is the analytical K1 curve scaled by `scale`.
fn entry(analysis_type: &str, elements: &str, scale: Option<f64>) -> Value {
    let params = AnalyticalParameters {
        a: 30.0,
        b: 10.0,
        v: 0.3,
        gamma: 0.0,
        omega: 0.0,
        sigma: 100.0,
    };
    let mut value = json!({
        "input": {
            "crackParameters": {"a": 30.0, "b": 10.0, "crackType": "embedded"},
            "analysisParameters": {"sigma": 100.0, "gamma": 0.0, "omega": 0.0},
            "analysisType": analysis_type,
            "modelType": "multiplePartitions",
            "meshParameters": {"elements": elements, "transformationType": "FFT"},
            "seedParameters": {"crackZoneMainSeeds": 24},
            "geometricParameters": {"containerHeight": 200.0, "containerRadius": 60.0},
            "material": {"E": 210_000.0, "v": 0.3}
        },
        "reports": {"successfulAnalysis": scale.is_some()}
    });
    if let Some(scale) = scale {
        let exact = analytical::evaluate(SifMode::I, &params, &ANGLES).expect("valid parameters");
        let contour = |factor: f64| json!(exact.iter().map(|v| v * factor).collect::<Vec<_>>());
        let zeros = json!({"1": [0.0, 0.0, 0.0, 0.0, 0.0], "2": [0.0, 0.0, 0.0, 0.0, 0.0], "3": [0.0, 0.0, 0.0, 0.0, 0.0]});
        value["odb"] = json!({
            "results": {
                "sortedBetaAngles": ANGLES,
                "sortedSIFs": {
                    "K1": {"1": contour(1.0), "2": contour(scale), "3": contour(1.0)},
                    "K2": zeros.clone(),
                    "K3": zeros
                }
            }
        });
    }
    value
}

fn write_repository(dir: &std::path::Path) {
    let mut dataset = Map::new();
    dataset.insert("metadata".into(), json!({"created": "2015-06-01"}));
    dataset.insert("fem_lin".into(), entry("FEM", "LinearTet", Some(1.02)));
    dataset.insert("fem_quad".into(), entry("FEM", "QuadraticTet", Some(1.01)));
    dataset.insert("fem_lost".into(), entry("FEM", "LinearTet", None));
    dataset.insert("xfem_a".into(), entry("XFEM", "LinearTet", Some(0.9)));
    dataset.insert("xfem_b".into(), entry("XFEM", "LinearTet", Some(1.1)));
    std::fs::write(dir.join("crack_3.json"), Value::Object(dataset).to_string()).expect("writable");
}

fn classify(repo: &JsonRepository) -> ClassificationTree {
    let datasets = repo.discover_datasets().expect("listable root");
    assert_eq!(datasets, vec!["crack_3".to_owned()]);
    let keys = repo.all_keys(&datasets).expect("readable datasets");
    ClassificationTree::from_repository(repo, &keys, &Category::DEFAULT_LEVELS).expect("loadable")
}

#[test]
fn repository_to_confidence_bounds() {
    let dir = tempfile::tempdir().expect("temporary directory");
    write_repository(dir.path());
    let repo = JsonRepository::new(dir.path());
    let mut tree = classify(&repo);

    let root = tree.root();
    assert_eq!(tree.name(root), Some(ROOT_NAME));
    let counts = tree.member_counts(root);
    assert_eq!((counts.total, counts.successful, counts.failed), (5, 4, 1));
    let successful = ["crack_3$fem_lin", "crack_3$fem_quad", "crack_3$xfem_a", "crack_3$xfem_b"];
    assert_eq!(tree.successful_members(root), BTreeSet::from(successful.map(str::to_owned)));
    assert_eq!(tree.failed_members(root), BTreeSet::from(["crack_3$fem_lost".to_owned()]));
    assert_eq!(tree.depth(), 4);

    let xfem = tree.tree_branch(&["3", "XFEM"]).expect("unique branch");
    let mut aggregate =
        AggregatedRecord::build(&repo, &tree, xfem, &[SifMode::I], SignMode::Areas).expect("consistent");
    assert_eq!(aggregate.members(), ["crack_3$xfem_a".to_owned(), "crack_3$xfem_b".to_owned()]);
    assert_eq!(aggregate.len(), 10);
    aggregate.compute_errors().expect("consistent");
    aggregate.compute_estimates().expect("consistent");
    assert_relative_eq!(
        aggregate.estimate(Statistic::AreaDiff, SifMode::I).expect("computed"),
        0.0,
        epsilon = 1.0e-9
    );

    let targets = BTreeMap::from([("lower".to_owned(), 2.5), ("upper".to_owned(), 97.5)]);
    let bounds = find_bounds(&aggregate, SifMode::I, &targets, &BoundSettings::default()).expect("searchable");
    // Ten points move the percentage in steps of 10, so both searches narrow
    // onto the jump instead of hitting the target.
    for bound in bounds.values() {
        assert_eq!(bound.status, Status::Exhausted);
        assert_eq!(bound.iterations(), BoundSettings::default().iteration_limit);
    }
    assert_relative_eq!(bounds["lower"].sigma().expect("probed"), 90.0, epsilon = 1.0e-6);
    assert_relative_eq!(bounds["upper"].sigma().expect("probed"), 110.0, epsilon = 1.0e-6);

    let settled = BTreeMap::from([("half".to_owned(), 50.0)]);
    let half = find_bounds(&aggregate, SifMode::I, &settled, &BoundSettings::default()).expect("searchable");
    assert_eq!(half["half"].status, Status::Converged);
    assert_eq!(half["half"].sigma(), Some(100.0));

    assert_eq!(tree.assign_member_as_failed("crack_3$xfem_b"), 1);
    assert_eq!(tree.assign_member_as_failed("crack_3$xfem_b"), 0);
    assert_eq!(tree.member_counts(xfem).failed, 1);
    assert_eq!(tree.member_counts(root).failed, 2);
    assert!(!tree.successful_members(root).contains("crack_3$xfem_b"));
    assert_eq!(
        tree.failed_members(root),
        BTreeSet::from(["crack_3$fem_lost".to_owned(), "crack_3$xfem_b".to_owned()])
    );
    assert_eq!(tree.successful_members(xfem), BTreeSet::from(["crack_3$xfem_a".to_owned()]));
    let reduced =
        AggregatedRecord::build(&repo, &tree, xfem, &[SifMode::I], SignMode::Areas).expect("consistent");
    assert_eq!(reduced.members(), ["crack_3$xfem_a".to_owned()]);
}

#[test]
fn comparing_fem_branches() {
    let dir = tempfile::tempdir().expect("temporary directory");
    write_repository(dir.path());
    let repo = JsonRepository::new(dir.path());
    let tree = classify(&repo);

    let branches = [
        tree.tree_branch(&["FEM", "FFT", "LinearTet"]).expect("unique branch"),
        tree.tree_branch(&["FEM", "FFT", "QuadraticTet"]).expect("unique branch"),
    ];
    let comparison = compare_branches(&repo, &tree, &branches, &ComparisonOptions::default()).expect("comparable");
    let selection = comparison.selection();
    assert_eq!(selection.len(), 2);
    assert_eq!(selection[&1], "crack_3$fem_lin");
    assert_eq!(selection[&2], "crack_3$fem_quad");
    assert_eq!(comparison.data_str[0].title, "FEM FFT LinearTet");
    assert_eq!(comparison.data_str[1].optimal_key, Some(2));
    assert_eq!(comparison.data_dicts[0].len(), SifMode::ALL.len());
}
