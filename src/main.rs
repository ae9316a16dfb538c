mod report;

use clap::{Parser, Subcommand};
use report::{render_bounds, render_tree};
use shardx::aggregate::AggregatedRecord;
use shardx::bound::find_bounds;
use shardx::comparison::{compare_branches, ComparisonOptions, Criteria};
use shardx::repository::{JsonRepository, Repository};
use shardx::{ClassificationTree, Config, SifMode, Statistic};
use std::error::Error;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Width of the tree summary table.
const TABLE_WIDTH: usize = 80;

#[derive(Parser, Debug)]
#[command(name = "shardx")]
#[command(version)]
#[command(about = "Classify elliptical crack simulations and compare them with the analytical SIFs")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Repository root; overrides the configuration
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Dataset to classify; may be repeated and overrides the configuration
    #[arg(short, long, global = true)]
    dataset: Vec<String>,

    /// Record key to treat as failed; may be repeated
    #[arg(long, global = true)]
    failed: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the classification summary table
    Tree,
    /// Print the aggregate statistics of a branch as JSON
    Estimates {
        /// Branch path suffix, names separated by `/`
        #[arg(short, long)]
        branch: String,
    },
    /// Print the confidence bounds of a branch
    Bounds {
        /// Branch path suffix, names separated by `/`
        #[arg(short, long)]
        branch: String,
        /// Mode of the envelope
        #[arg(short, long, default_value = "K1")]
        mode: SifMode,
    },
    /// Print the comparison tables of several branches as JSON
    Compare {
        /// Branch path suffix, names separated by `/`; may be repeated
        #[arg(short, long, required = true)]
        branch: Vec<String>,
        /// Statistic used to pick the optimal simulation
        #[arg(long, default_value = "rmsd")]
        criteria: Statistic,
        /// Mode used to pick the optimal simulation
        #[arg(long, default_value = "K1")]
        criteria_mode: SifMode,
        /// Statistic reported for every simulation
        #[arg(long, default_value = "difference")]
        error: Statistic,
    },
}

fn branch_path(branch: &str) -> Vec<&str> {
    branch.split('/').filter(|name| !name.is_empty()).collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // File values first, then command line overrides.
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(root) = args.root {
        config.repository_root = root;
    }
    if !args.dataset.is_empty() {
        config.datasets = args.dataset;
    }
    config.validate()?;

    let repo: JsonRepository = config.repository();
    let datasets = if config.datasets.is_empty() {
        repo.discover_datasets()?
    } else {
        config.datasets.clone()
    };
    let keys = repo.all_keys(&datasets)?;
    info!(datasets = datasets.len(), records = keys.len(), "classifying records");
    let mut tree = ClassificationTree::from_repository(&repo, &keys, &config.levels)?;
    tree.assign_members_as_failed(args.failed.iter().map(String::as_str));

    match args.command {
        Command::Tree => print!("{}", render_tree(&tree, TABLE_WIDTH)),
        Command::Estimates { branch } => {
            let node = tree.tree_branch(branch_path(&branch).as_slice())?;
            let mut aggregate =
                AggregatedRecord::build(&repo, &tree, node, &config.modes, config.sign_mode)?;
            aggregate.compute_errors()?;
            aggregate.compute_estimates()?;
            println!("{}", serde_json::to_string_pretty(aggregate.estimates())?);
        }
        Command::Bounds { branch, mode } => {
            let node = tree.tree_branch(branch_path(&branch).as_slice())?;
            let aggregate = AggregatedRecord::build(&repo, &tree, node, &[mode], config.sign_mode)?;
            let bounds = find_bounds(&aggregate, mode, &config.bounds.targets, &config.bounds.settings())?;
            print!("{}", render_bounds(&branch, mode, &bounds));
        }
        Command::Compare {
            branch,
            criteria,
            criteria_mode,
            error,
        } => {
            let nodes = branch
                .iter()
                .map(|branch| tree.tree_branch(branch_path(branch).as_slice()))
                .collect::<Result<Vec<_>, _>>()?;
            let options = ComparisonOptions {
                criteria: Criteria {
                    statistic: criteria,
                    mode: criteria_mode,
                },
                error_statistic: error,
                modes: config.modes.clone(),
                sign_mode: config.sign_mode,
                ..ComparisonOptions::default()
            };
            let comparison = compare_branches(&repo, &tree, &nodes, &options)?;
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
    }

    Ok(())
}
