#![warn(clippy::all)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod aggregate;
pub mod analytical;
pub mod bound;
pub mod comparison;
pub mod config;
pub mod errors;
pub mod geometry;
pub mod metrics;
pub mod record;
pub mod repository;
pub mod tree;

pub use aggregate::AggregatedRecord;
pub use analytical::{AnalyticalParameters, SifMode};
pub use bound::{find_bound, find_bounds, BoundSettings, BoundSolution, EnvelopeProbe, Status};
pub use comparison::{compare_branches, Comparison, ComparisonOptions};
pub use config::Config;
pub use errors::{
    AggregateError, BoundError, ConfigError, ParseError, RecordError, RepositoryError, SolutionError,
    StatError, TreeError,
};
pub use metrics::{SignMode, StatValue, Statistic};
pub use record::SimulationRecord;
pub use repository::{JsonRepository, MemoryRepository, Repository};
pub use tree::{Category, ClassificationTree};
