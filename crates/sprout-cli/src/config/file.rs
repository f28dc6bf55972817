use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The TOML configuration file. Every field is optional; anything left out
/// falls back to the command line or the built-in defaults.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub fragments: Option<Vec<String>>,
    pub fragment_library: Option<PathBuf>,
    /// Wall-clock limit in seconds.
    pub timeout: Option<u64>,
    pub generation: Option<FileGenerationConfig>,
    pub clash: Option<FileClashConfig>,
    pub optimization: Option<FileOptimizationConfig>,
    pub ranking: Option<FileRankingConfig>,
    pub scoring: Option<FileScoringConfig>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileGenerationConfig {
    pub num_conf: Option<usize>,
    pub minimum_conf_rms: Option<f64>,
    pub flexible_atoms: Option<Vec<usize>>,
    pub max_attempts: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileClashConfig {
    pub threshold: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileOptimizationConfig {
    pub ligand_force_field: Option<String>,
    pub use_ani: Option<bool>,
    pub ani_model: Option<PathBuf>,
    pub unsupported_element_policy: Option<String>,
    pub sigma_scale_factor: Option<f64>,
    pub relative_permittivity: Option<f64>,
    pub water_model: Option<String>,
    pub interaction_cutoff: Option<f64>,
    pub max_iterations: Option<usize>,
    pub gradient_tolerance: Option<f64>,
    pub energy_tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileRankingConfig {
    pub energy_range: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileScoringConfig {
    pub enabled: Option<bool>,
    pub engine: Option<String>,
    pub executable: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::parsing(path, e))
    }
}
