//! Run configuration, read from a JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analytical::SifMode;
use crate::bound::BoundSettings;
use crate::errors::ConfigError;
use crate::metrics::SignMode;
use crate::repository::JsonRepository;
use crate::tree::Category;

/// Settings of the confidence bound searches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundsConfig {
    /// Accepted distance from each target, in percentage points.
    pub tolerance: f64,
    /// Maximum number of probes per search.
    pub iteration_limit: usize,
    /// Named containment targets, in percent.
    pub targets: BTreeMap<String, f64>,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        let settings = BoundSettings::default();
        Self {
            tolerance: settings.tolerance,
            iteration_limit: settings.iteration_limit,
            targets: BTreeMap::from([("lower".to_owned(), 2.5), ("upper".to_owned(), 97.5)]),
        }
    }
}

impl BoundsConfig {
    /// Solver settings of this section.
    #[must_use]
    pub fn settings(&self) -> BoundSettings {
        BoundSettings {
            tolerance: self.tolerance,
            iteration_limit: self.iteration_limit,
        }
    }
}

/// Main configuration structure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `<dataset>.json` files.
    pub repository_root: PathBuf,
    /// Datasets to classify; every dataset under the root when empty.
    pub datasets: Vec<String>,
    /// Tree levels, from the root down.
    pub levels: Vec<Category>,
    /// Modes loaded and evaluated.
    pub modes: Vec<SifMode>,
    /// Sign rule of the normalized errors.
    pub sign_mode: SignMode,
    /// Confidence bound searches.
    pub bounds: BoundsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repository_root: PathBuf::from("."),
            datasets: Vec::new(),
            levels: Category::DEFAULT_LEVELS.to_vec(),
            modes: SifMode::ALL.to_vec(),
            sign_mode: SignMode::default(),
            bounds: BoundsConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, decoded or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levels.is_empty() {
            return Err(ConfigError::Invalid("levels must not be empty".into()));
        }
        for (idx, level) in self.levels.iter().enumerate() {
            if self.levels[..idx].contains(level) {
                return Err(ConfigError::Invalid(format!("level `{level}` is repeated")));
            }
        }
        if self.modes.is_empty() {
            return Err(ConfigError::Invalid("modes must not be empty".into()));
        }
        self.bounds
            .settings()
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("bounds: {err}")))?;
        for (name, target) in &self.bounds.targets {
            if !(0.0..=100.0).contains(target) {
                return Err(ConfigError::Invalid(format!(
                    "bounds target `{name}` must lie in [0, 100] (received {target})"
                )));
            }
        }
        Ok(())
    }

    /// Repository reading from [`Config::repository_root`].
    #[must_use]
    pub fn repository(&self) -> JsonRepository {
        JsonRepository::new(&self.repository_root)
    }
}
