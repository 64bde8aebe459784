use crate::cli::SolveArgs;
use crate::error::{CliError, Result};
use rotabp::engine::config::{SolverConfig, SolverConfigBuilder};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

pub struct DefaultsConfig {
    pub damping: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub iteration_chunk_size: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            damping: 0.5,
            max_iter: 1000,
            tol: 1e-5,
            iteration_chunk_size: 10,
        }
    }
}

/// Solver settings as read from a file; anything left out falls back to the command line or
/// to [`DefaultsConfig`].
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialSolverConfig {
    pub damping: Option<f64>,
    pub max_iter: Option<usize>,
    pub tol: Option<f64>,
    pub iteration_chunk_size: Option<usize>,
    pub fold_singletons: Option<bool>,
}

impl PartialSolverConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading solver configuration from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| CliError::FileParsing {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Command-line values win over file values, which win over defaults.
    pub fn merge_with_cli(self, args: &SolveArgs) -> Result<SolverConfig> {
        let defaults = DefaultsConfig::default();
        let fold = if args.no_fold {
            false
        } else {
            self.fold_singletons.unwrap_or(true)
        };

        let config = SolverConfigBuilder::new()
            .damping(args.damping.or(self.damping).unwrap_or(defaults.damping))
            .max_iter(args.max_iter.or(self.max_iter).unwrap_or(defaults.max_iter))
            .tol(args.tol.or(self.tol).unwrap_or(defaults.tol))
            .iteration_chunk_size(
                args.chunk_size
                    .or(self.iteration_chunk_size)
                    .unwrap_or(defaults.iteration_chunk_size),
            )
            .fold_singletons(fold)
            .build()?;
        debug!("Final solver configuration: {:?}", config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn args() -> SolveArgs {
        SolveArgs {
            problem: PathBuf::from("problem.toml"),
            ..SolveArgs::default()
        }
    }

    #[test]
    fn empty_partial_config_uses_defaults() {
        let config = PartialSolverConfig::default().merge_with_cli(&args()).unwrap();
        let defaults = DefaultsConfig::default();
        assert_eq!(config.damping, defaults.damping);
        assert_eq!(config.max_iter, defaults.max_iter);
        assert_eq!(config.tol, defaults.tol);
        assert_eq!(config.iteration_chunk_size, defaults.iteration_chunk_size);
        assert!(config.fold_singletons);
    }

    #[test]
    fn cli_overrides_take_precedence_over_file_values() {
        let partial = PartialSolverConfig {
            damping: Some(0.2),
            max_iter: Some(300),
            fold_singletons: Some(true),
            ..Default::default()
        };
        let cli_args = SolveArgs {
            damping: Some(0.7),
            no_fold: true,
            ..args()
        };

        let config = partial.merge_with_cli(&cli_args).unwrap();
        assert_eq!(config.damping, 0.7);
        assert_eq!(config.max_iter, 300);
        assert!(!config.fold_singletons);
    }

    #[test]
    fn invalid_merged_values_are_reported() {
        let cli_args = SolveArgs {
            tol: Some(-1.0),
            ..args()
        };
        let result = PartialSolverConfig::default().merge_with_cli(&cli_args);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn from_file_reads_kebab_case_keys() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "damping = 0.25\niteration-chunk-size = 4\nfold-singletons = false").unwrap();

        let partial = PartialSolverConfig::from_file(file.path()).unwrap();
        assert_eq!(partial.damping, Some(0.25));
        assert_eq!(partial.iteration_chunk_size, Some(4));
        assert_eq!(partial.fold_singletons, Some(false));
        assert_eq!(partial.tol, None);
    }

    #[test]
    fn from_file_rejects_unknown_keys() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "dampening = 0.25").unwrap();

        let result = PartialSolverConfig::from_file(file.path());
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }
}
