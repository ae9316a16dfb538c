//! Error types produced while loading, classifying and analysing simulations.

use std::path::PathBuf;

use thiserror::Error;

use crate::analytical::SifMode;

/// Error returned when the closed-form solution receives invalid inputs.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum SolutionError {
    /// Returned when the crack axes are not ordered `a >= b > 0`.
    #[error("crack axes must satisfy a >= b > 0 (received a = {a}, b = {b})")]
    InvalidAxes {
        /// Rejected major axis.
        a: f64,
        /// Rejected minor axis.
        b: f64,
    },
    /// Returned when the Poisson ratio lies outside `(0, 0.5]`.
    #[error("Poisson ratio must lie in (0, 0.5] (received {0})")]
    InvalidPoissonRatio(f64),
    /// Returned when the elliptic modulus lies outside `[0, 1)`.
    #[error("elliptic modulus must lie in [0, 1) (received {0})")]
    InvalidModulus(f64),
    /// Returned when the load angle does not reduce into `[0, 90]` degrees.
    #[error("load angle must reduce into [0, 90] degrees (received {0})")]
    InvalidLoadAngle(f64),
}

/// Error returned by the statistical comparison functions.
///
/// Only [`StatError::DivisionByZero`] is recoverable: record and aggregate
/// statistics store `NaN` for the affected cell and carry on.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum StatError {
    /// Returned when two series that must pair up have different lengths.
    #[error("series lengths differ ({left} != {right})")]
    LengthMismatch {
        /// Length of the first series.
        left: usize,
        /// Length of the second series.
        right: usize,
    },
    /// Returned when an integration domain is negative or decreasing.
    #[error("integration domain must be non-negative and non-decreasing (at index {index})")]
    InvalidDomain {
        /// First offending position in the domain.
        index: usize,
    },
    /// Returned when a contour window does not fit the available contours.
    #[error("cannot average {requested} contours out of {available}")]
    InvalidContourWindow {
        /// Number of contours requested.
        requested: usize,
        /// Number of contours available.
        available: usize,
    },
    /// Returned when the reference quantity of a relative statistic is zero.
    #[error("reference quantity is zero")]
    DivisionByZero,
}

/// Error returned when a name cannot be parsed into one of the closed enums.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Unrecognized stress intensity factor mode.
    #[error("unrecognized SIF mode `{0}`")]
    UnknownMode(String),
    /// Unrecognized statistic name.
    #[error("`{0}` does not correspond to a statistic")]
    UnknownStatistic(String),
    /// Unrecognized sign mode.
    #[error("unrecognized sign mode `{0}`")]
    UnknownSignMode(String),
    /// Unrecognized tree category.
    #[error("unrecognized category `{0}`")]
    UnknownCategory(String),
}

/// Error returned by a simulation repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Returned when a dataset file cannot be read.
    #[error("cannot read dataset file {path}")]
    Io {
        /// Path of the dataset file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Returned when a dataset file or entry is not valid JSON for the field contract.
    #[error("malformed entry `{key}`")]
    Malformed {
        /// Dataset name or record key being decoded.
        key: String,
        /// Underlying decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// Returned when a composite key lacks the dataset separator.
    #[error("`{0}` is not a composite dataset key")]
    MalformedKey(String),
    /// Returned when the dataset does not exist in the repository.
    #[error("unknown dataset `{0}`")]
    UnknownDataset(String),
    /// Returned when the record does not exist in its dataset.
    #[error("unknown record `{0}`")]
    UnknownRecord(String),
}

/// Error returned while loading or evaluating a single simulation record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Returned when the repository read fails.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// Returned when the analytical solution rejects the record parameters.
    #[error("record `{key}` has invalid analytical parameters")]
    Solution {
        /// Record key.
        key: String,
        /// Underlying precondition failure.
        #[source]
        source: SolutionError,
    },
    /// Returned when a statistic fails for a reason other than a zero reference.
    #[error("record `{key}` cannot be compared for {mode}")]
    Statistic {
        /// Record key.
        key: String,
        /// Mode being compared.
        mode: SifMode,
        /// Underlying precondition failure.
        #[source]
        source: StatError,
    },
    /// Returned when a successful record lacks raw results for a requested mode.
    #[error("record `{key}` has no results for {mode}")]
    MissingResults {
        /// Record key.
        key: String,
        /// Missing mode.
        mode: SifMode,
    },
    /// Returned when statistics are requested before the analytical solution.
    #[error("record `{0}` has no analytical solution; compute it first")]
    MissingSolution(String),
}

/// Error returned while merging records into an aggregate.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Returned when one of the merged records fails.
    #[error(transparent)]
    Record(#[from] RecordError),
    /// Returned when the subtree lookup fails.
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// Returned when merged records disagree on an analytical parameter.
    #[error("ambiguous aggregation: parameter `{name}` takes values {values:?}")]
    AmbiguousParameter {
        /// Parameter name.
        name: &'static str,
        /// Distinct values found.
        values: Vec<f64>,
    },
    /// Returned when the merged series are evaluated with invalid parameters.
    #[error(transparent)]
    Solution(#[from] SolutionError),
    /// Returned when a merged statistic fails for a reason other than a zero reference.
    #[error(transparent)]
    Statistic(#[from] StatError),
    /// Returned when a mode was not part of the aggregate.
    #[error("aggregate was not built for {0}")]
    UnknownMode(SifMode),
}

/// Error returned by classification tree lookups.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// Returned when no node path ends with the requested names.
    #[error("{0:?} not in the tree")]
    PathNotFound(Vec<String>),
    /// Returned when more than one node path ends with the requested names.
    #[error("{0:?} is ambiguous; it corresponds to more than one node")]
    AmbiguousPath(Vec<String>),
    /// Returned when a node lies above the level a title needs.
    #[error("node at level {level} cannot provide a title of depth {depth}")]
    TooShallow {
        /// Level of the node.
        level: usize,
        /// Requested title depth.
        depth: usize,
    },
}

/// Error returned by the confidence bound solver.
#[derive(Debug, Error)]
pub enum BoundError {
    /// Returned when the search interval is not finite or has zero width.
    #[error("invalid sigma bracket [{low}, {high}]")]
    InvalidBracket {
        /// Lower end of the bracket.
        low: f64,
        /// Upper end of the bracket.
        high: f64,
    },
    /// Returned when the tolerance is negative or the iteration limit is zero.
    #[error("invalid solver settings: {0}")]
    InvalidSettings(&'static str),
    /// Returned when the aggregate holds no data points for the mode.
    #[error("aggregate holds no data points for {0}")]
    EmptyAggregate(SifMode),
    /// Returned when inside and outside counts do not add up; signals a defect.
    #[error("containment counts disagree: {inside} inside + {outside} outside != {total}")]
    ContainmentMismatch {
        /// Points classified inside.
        inside: usize,
        /// Points classified outside.
        outside: usize,
        /// Points tested.
        total: usize,
    },
    /// Returned when a probe yields a percentage that is not a finite number.
    #[error("probe returned {percentage} % at sigma {sigma}")]
    UnexpectedPercentage {
        /// Probed load magnitude.
        sigma: f64,
        /// Value returned by the probe.
        percentage: f64,
    },
    /// Returned when the probe envelope cannot be evaluated.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Error returned when a configuration file cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when the file cannot be read.
    #[error("cannot read configuration file {path}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Returned when the file is not valid JSON for [`Config`](crate::Config).
    #[error("malformed configuration file {path}")]
    Malformed {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// Returned when a configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
