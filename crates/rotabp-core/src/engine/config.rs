use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    Invalid {
        parameter: &'static str,
        reason: String,
    },

    #[error("Failed to read config file '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}", path = path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

const fn default_fold_singletons() -> bool {
    true
}

/// Parameters of one belief-propagation solve.
///
/// Read once when an evaluator is constructed. Deserializes from TOML with kebab-case keys:
///
/// ```toml
/// damping = 0.5
/// max-iter = 1000
/// tol = 1e-5
/// iteration-chunk-size = 10
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SolverConfig {
    /// Weight of the previous estimate in each damped update, in `[0, 1)`.
    pub damping: f64,
    pub max_iter: usize,
    /// Convergence threshold on the largest absolute belief change.
    pub tol: f64,
    /// Iterations run between convergence checks.
    pub iteration_chunk_size: usize,
    /// Absorb singleton variables into their neighbours before iterating.
    #[serde(default = "default_fold_singletons")]
    pub fold_singletons: bool,
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.damping) {
            return Err(ConfigError::Invalid {
                parameter: "damping",
                reason: format!("must be in [0, 1), got {}", self.damping),
            });
        }
        if self.max_iter == 0 {
            return Err(ConfigError::Invalid {
                parameter: "max_iter",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.tol.is_finite() || self.tol <= 0.0 {
            return Err(ConfigError::Invalid {
                parameter: "tol",
                reason: format!("must be positive and finite, got {}", self.tol),
            });
        }
        if self.iteration_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                parameter: "iteration_chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Default)]
pub struct SolverConfigBuilder {
    damping: Option<f64>,
    max_iter: Option<usize>,
    tol: Option<f64>,
    iteration_chunk_size: Option<usize>,
    fold_singletons: Option<bool>,
}

impl SolverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn damping(mut self, damping: f64) -> Self {
        self.damping = Some(damping);
        self
    }
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }
    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }
    pub fn iteration_chunk_size(mut self, size: usize) -> Self {
        self.iteration_chunk_size = Some(size);
        self
    }
    pub fn fold_singletons(mut self, fold: bool) -> Self {
        self.fold_singletons = Some(fold);
        self
    }

    pub fn build(self) -> Result<SolverConfig, ConfigError> {
        let config = SolverConfig {
            damping: self
                .damping
                .ok_or(ConfigError::MissingParameter("damping"))?,
            max_iter: self
                .max_iter
                .ok_or(ConfigError::MissingParameter("max_iter"))?,
            tol: self.tol.ok_or(ConfigError::MissingParameter("tol"))?,
            iteration_chunk_size: self
                .iteration_chunk_size
                .ok_or(ConfigError::MissingParameter("iteration_chunk_size"))?,
            fold_singletons: self.fold_singletons.unwrap_or(default_fold_singletons()),
        };
        config.validate()?;
        Ok(config)
    }
}
