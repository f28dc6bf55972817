use crate::core::forcefield::intermolecular::InteractionSettings;
use crate::core::forcefield::params::WaterModel;
use crate::core::utils::minimize::MinimizerSettings;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

/// What happens to a congener whose elements the learned potential cannot
/// handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedElementPolicy {
    /// Optimize with the classical intramolecular model instead.
    #[default]
    Classical,
    /// Drop every conformer; the congener ends up missing.
    Discard,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown unsupported-element policy '{0}' (expected classical or discard)")]
pub struct ParsePolicyError(pub String);

impl FromStr for UnsupportedElementPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classical" => Ok(Self::Classical),
            "discard" => Ok(Self::Discard),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

impl fmt::Display for UnsupportedElementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Classical => "classical",
            Self::Discard => "discard",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringEngine {
    #[default]
    Gnina,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown scoring engine '{0}' (expected gnina)")]
pub struct ParseScoringEngineError(pub String);

impl FromStr for ScoringEngine {
    type Err = ParseScoringEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gnina" => Ok(Self::Gnina),
            _ => Err(ParseScoringEngineError(s.to_string())),
        }
    }
}

impl fmt::Display for ScoringEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("gnina")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub num_conf: usize,
    /// Minimum best-fit heavy-atom RMSD between retained conformers.
    pub minimum_conf_rms: f64,
    /// Template atom indices that may move during embedding.
    pub flexible_atoms: Vec<usize>,
    pub max_attempts: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClashConfig {
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationConfig {
    /// Built-in parameter set name or path to a parameter file.
    pub ligand_force_field: String,
    pub use_ani: bool,
    pub ani_model: Option<PathBuf>,
    pub unsupported_element_policy: UnsupportedElementPolicy,
    pub interaction: InteractionSettings,
    pub minimizer: MinimizerSettings,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingConfig {
    pub energy_range: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub engine: ScoringEngine,
    /// Explicit executable; looked up on `PATH` when absent.
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrowConfig {
    pub generation: GenerationConfig,
    pub clash: ClashConfig,
    pub optimization: OptimizationConfig,
    pub ranking: RankingConfig,
    pub scoring: Option<ScoringConfig>,
}

pub const DEFAULT_CLASH_THRESHOLD: f64 = 1.0;
pub const DEFAULT_ENERGY_RANGE: f64 = 5.0;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Default)]
pub struct GrowConfigBuilder {
    num_conf: Option<usize>,
    minimum_conf_rms: Option<f64>,
    flexible_atoms: Vec<usize>,
    max_attempts: Option<usize>,
    seed: Option<u64>,
    clash_threshold: Option<f64>,
    ligand_force_field: Option<String>,
    use_ani: bool,
    ani_model: Option<PathBuf>,
    sigma_scale_factor: Option<f64>,
    relative_permittivity: Option<f64>,
    water_model: Option<WaterModel>,
    interaction_cutoff: Option<f64>,
    unsupported_element_policy: Option<UnsupportedElementPolicy>,
    max_iterations: Option<usize>,
    gradient_tolerance: Option<f64>,
    energy_tolerance: Option<f64>,
    energy_range: Option<f64>,
    scoring: Option<ScoringConfig>,
}

impl GrowConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_conf(mut self, n: usize) -> Self {
        self.num_conf = Some(n);
        self
    }
    pub fn minimum_conf_rms(mut self, rms: f64) -> Self {
        self.minimum_conf_rms = Some(rms);
        self
    }
    pub fn flexible_atoms(mut self, atoms: Vec<usize>) -> Self {
        self.flexible_atoms = atoms;
        self
    }
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn clash_threshold(mut self, threshold: f64) -> Self {
        self.clash_threshold = Some(threshold);
        self
    }
    pub fn ligand_force_field(mut self, identifier: impl Into<String>) -> Self {
        self.ligand_force_field = Some(identifier.into());
        self
    }
    pub fn use_ani(mut self, enabled: bool) -> Self {
        self.use_ani = enabled;
        self
    }
    pub fn ani_model(mut self, path: PathBuf) -> Self {
        self.ani_model = Some(path);
        self
    }
    pub fn sigma_scale_factor(mut self, factor: f64) -> Self {
        self.sigma_scale_factor = Some(factor);
        self
    }
    pub fn relative_permittivity(mut self, permittivity: f64) -> Self {
        self.relative_permittivity = Some(permittivity);
        self
    }
    pub fn water_model(mut self, model: WaterModel) -> Self {
        self.water_model = Some(model);
        self
    }
    pub fn interaction_cutoff(mut self, cutoff: f64) -> Self {
        self.interaction_cutoff = Some(cutoff);
        self
    }
    pub fn unsupported_element_policy(mut self, policy: UnsupportedElementPolicy) -> Self {
        self.unsupported_element_policy = Some(policy);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn gradient_tolerance(mut self, tolerance: f64) -> Self {
        self.gradient_tolerance = Some(tolerance);
        self
    }
    pub fn energy_tolerance(mut self, tolerance: f64) -> Self {
        self.energy_tolerance = Some(tolerance);
        self
    }
    pub fn energy_range(mut self, range: f64) -> Self {
        self.energy_range = Some(range);
        self
    }
    pub fn scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = Some(scoring);
        self
    }

    pub fn build(self) -> Result<GrowConfig, ConfigError> {
        let num_conf = self.num_conf.ok_or(ConfigError::MissingParameter("num_conf"))?;
        if num_conf == 0 {
            return Err(invalid("num_conf", "must be at least 1"));
        }
        let minimum_conf_rms = self
            .minimum_conf_rms
            .ok_or(ConfigError::MissingParameter("minimum_conf_rms"))?;
        if !(minimum_conf_rms >= 0.0) {
            return Err(invalid("minimum_conf_rms", "must be non-negative"));
        }
        let max_attempts = self.max_attempts.unwrap_or(num_conf.saturating_mul(10));
        if max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }

        let threshold = self.clash_threshold.unwrap_or(DEFAULT_CLASH_THRESHOLD);
        if !(threshold >= 0.0) {
            return Err(invalid("clash_threshold", "must be non-negative"));
        }

        let ligand_force_field = self
            .ligand_force_field
            .ok_or(ConfigError::MissingParameter("ligand_force_field"))?;
        if self.use_ani && self.ani_model.is_none() {
            return Err(ConfigError::MissingParameter("ani_model"));
        }

        let defaults = InteractionSettings::default();
        let interaction = InteractionSettings {
            sigma_scale_factor: self.sigma_scale_factor.unwrap_or(defaults.sigma_scale_factor),
            relative_permittivity: self
                .relative_permittivity
                .unwrap_or(defaults.relative_permittivity),
            water_model: self.water_model.unwrap_or(defaults.water_model),
            cutoff: self.interaction_cutoff.unwrap_or(defaults.cutoff),
        };
        if !(interaction.relative_permittivity > 0.0) {
            return Err(invalid("relative_permittivity", "must be positive"));
        }
        if !(interaction.sigma_scale_factor > 0.0) {
            return Err(invalid("sigma_scale_factor", "must be positive"));
        }

        let minimizer_defaults = MinimizerSettings::default();
        let minimizer = MinimizerSettings {
            max_iterations: self.max_iterations.unwrap_or(minimizer_defaults.max_iterations),
            gradient_tolerance: self
                .gradient_tolerance
                .unwrap_or(minimizer_defaults.gradient_tolerance),
            energy_tolerance: self
                .energy_tolerance
                .unwrap_or(minimizer_defaults.energy_tolerance),
            ..minimizer_defaults
        };
        if minimizer.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1"));
        }

        let energy_range = self.energy_range.unwrap_or(DEFAULT_ENERGY_RANGE);
        if !(energy_range >= 0.0) {
            return Err(invalid("energy_range", "must be non-negative"));
        }

        Ok(GrowConfig {
            generation: GenerationConfig {
                num_conf,
                minimum_conf_rms,
                flexible_atoms: self.flexible_atoms,
                max_attempts,
                seed: self.seed.unwrap_or(DEFAULT_SEED),
            },
            clash: ClashConfig { threshold },
            optimization: OptimizationConfig {
                ligand_force_field,
                use_ani: self.use_ani,
                ani_model: self.ani_model,
                unsupported_element_policy: self.unsupported_element_policy.unwrap_or_default(),
                interaction,
                minimizer,
            },
            ranking: RankingConfig { energy_range },
            scoring: self.scoring,
        })
    }
}
