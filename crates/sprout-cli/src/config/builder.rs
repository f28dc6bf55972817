use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileScoringConfig};
use super::models::AppConfig;
use crate::cli::GrowArgs;
use crate::error::{CliError, Result};
use crate::utils::parser::{self, ParseError};
use sprout::core::forcefield::params::WaterModel;
use sprout::engine::config::{GrowConfigBuilder, ScoringConfig, ScoringEngine, UnsupportedElementPolicy};
use std::time::Duration;

/// Resolves every setting with the precedence: command-line flag, `--set`
/// override, config file, built-in default.
pub fn build_config(args: &GrowArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let gen_file = file_config.generation.take().unwrap_or_default();
    let clash_file = file_config.clash.take().unwrap_or_default();
    let opt_file = file_config.optimization.take().unwrap_or_default();
    let ranking_file = file_config.ranking.take().unwrap_or_default();
    let scoring_file = file_config.scoring.take().unwrap_or_default();

    let num_conf = args.num_conf.or(gen_file.num_conf).unwrap_or(defaults.num_conf);
    let minimum_conf_rms = args
        .minimum_conf_rms
        .or(gen_file.minimum_conf_rms)
        .unwrap_or(defaults.minimum_conf_rms);
    let flexible_atoms = if args.flexible.is_empty() {
        gen_file.flexible_atoms.unwrap_or_default()
    } else {
        args.flexible.clone()
    };
    let ligand_force_field = args
        .ligand_force_field
        .clone()
        .or(opt_file.ligand_force_field)
        .unwrap_or(defaults.ligand_force_field);

    let use_ani = match (args.ani.ani, args.ani.no_ani) {
        (true, false) => true,
        (false, true) => false,
        _ => opt_file.use_ani.unwrap_or(defaults.use_ani),
    };

    let mut builder = GrowConfigBuilder::new()
        .num_conf(num_conf)
        .minimum_conf_rms(minimum_conf_rms)
        .flexible_atoms(flexible_atoms)
        .ligand_force_field(ligand_force_field)
        .use_ani(use_ani);

    if let Some(attempts) = gen_file.max_attempts {
        builder = builder.max_attempts(attempts);
    }
    if let Some(seed) = args.seed.or(gen_file.seed) {
        builder = builder.seed(seed);
    }
    if let Some(threshold) = args.clash_threshold.or(clash_file.threshold) {
        builder = builder.clash_threshold(threshold);
    }
    if let Some(model) = args.ani_model.clone().or(opt_file.ani_model) {
        builder = builder.ani_model(model);
    }
    if let Some(policy) = opt_file.unsupported_element_policy {
        let policy: UnsupportedElementPolicy = policy.parse().map_err(|e| CliError::Config(format!("{e}")))?;
        builder = builder.unsupported_element_policy(policy);
    }
    if let Some(factor) = opt_file.sigma_scale_factor {
        builder = builder.sigma_scale_factor(factor);
    }
    if let Some(permittivity) = opt_file.relative_permittivity {
        builder = builder.relative_permittivity(permittivity);
    }
    if let Some(model) = opt_file.water_model {
        let model: WaterModel = model
            .parse()
            .map_err(|_| CliError::Config(format!("Unknown water model '{model}' (expected tip3p, spce or none)")))?;
        builder = builder.water_model(model);
    }
    if let Some(cutoff) = opt_file.interaction_cutoff {
        builder = builder.interaction_cutoff(cutoff);
    }
    if let Some(iterations) = opt_file.max_iterations {
        builder = builder.max_iterations(iterations);
    }
    if let Some(tolerance) = opt_file.gradient_tolerance {
        builder = builder.gradient_tolerance(tolerance);
    }
    if let Some(tolerance) = opt_file.energy_tolerance {
        builder = builder.energy_tolerance(tolerance);
    }
    if let Some(range) = args.energy_range.or(ranking_file.energy_range) {
        builder = builder.energy_range(range);
    }
    if let Some(scoring) = merge_scoring(args, scoring_file)? {
        builder = builder.scoring(scoring);
    }

    let core_config = builder.build().map_err(|e| CliError::Config(e.to_string()))?;

    let fragments = if args.fragments.is_empty() {
        file_config.fragments.unwrap_or_default()
    } else {
        args.fragments.clone()
    };

    Ok(AppConfig {
        template_path: args.template.clone(),
        receptor_path: args.receptor.clone(),
        output_dir: args.output.clone(),
        attachments: args.attachments.clone(),
        fragments,
        fragment_library: args.fragment_library.clone().or(file_config.fragment_library),
        timeout: args.timeout.or(file_config.timeout).map(Duration::from_secs),
        core_config,
    })
}

fn merge_scoring(args: &GrowArgs, file_val: FileScoringConfig) -> Result<Option<ScoringConfig>> {
    let enabled = args.score || args.gnina.is_some() || file_val.enabled.unwrap_or(false);
    if !enabled {
        return Ok(None);
    }
    let engine = match file_val.engine {
        Some(name) => name.parse::<ScoringEngine>().map_err(|e| CliError::Config(e.to_string()))?,
        None => ScoringEngine::default(),
    };
    Ok(Some(ScoringConfig {
        engine,
        executable: args.gnina.clone().or(file_val.executable),
    }))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        apply_set_value(&mut config, kv_pair).map_err(|e| CliError::Config(e.to_string()))?;
    }
    Ok(config)
}

fn apply_set_value(config: &mut FileConfig, kv_pair: &str) -> std::result::Result<(), SetError> {
    let (key, value) = parser::split_key_value(kv_pair)?;

    match key {
        "generation.num-conf" => section(&mut config.generation).num_conf = Some(parser::parse_value(key, value, "integer")?),
        "generation.minimum-conf-rms" => {
            section(&mut config.generation).minimum_conf_rms = Some(parser::parse_value(key, value, "float")?)
        }
        "generation.flexible-atoms" => {
            section(&mut config.generation).flexible_atoms = Some(parser::parse_list(key, value, "atom index")?)
        }
        "generation.max-attempts" => section(&mut config.generation).max_attempts = Some(parser::parse_value(key, value, "integer")?),
        "generation.seed" => section(&mut config.generation).seed = Some(parser::parse_value(key, value, "integer")?),
        "clash.threshold" => {
            section(&mut config.clash).threshold =
                Some(parser::parse_value(key, value, "float")?)
        }
        "ranking.energy-range" => {
            section(&mut config.ranking).energy_range =
                Some(parser::parse_value(key, value, "float")?)
        }
        "fragments" => config.fragments = Some(parser::parse_list(key, value, "fragment name")?),
        "fragment-library" => config.fragment_library = Some(value.into()),
        "timeout" => config.timeout = Some(parser::parse_value(key, value, "integer")?),
        _ if key.starts_with("optimization.") => apply_optimization(config, key, value)?,
        _ if key.starts_with("scoring.") => {
            let scoring = section(&mut config.scoring);
            match key {
                "scoring.enabled" => scoring.enabled = Some(parser::parse_value(key, value, "boolean")?),
                "scoring.engine" => scoring.engine = Some(value.to_string()),
                "scoring.executable" => scoring.executable = Some(value.into()),
                _ => return Err(SetError::UnsupportedKey(key.to_string())),
            }
        }
        _ => return Err(SetError::UnsupportedKey(key.to_string())),
    }
    Ok(())
}

fn apply_optimization(config: &mut FileConfig, key: &str, value: &str) -> std::result::Result<(), SetError> {
    let opt = section(&mut config.optimization);
    match key {
        "optimization.ligand-force-field" => opt.ligand_force_field = Some(value.to_string()),
        "optimization.use-ani" => opt.use_ani = Some(parser::parse_value(key, value, "boolean")?),
        "optimization.ani-model" => opt.ani_model = Some(value.into()),
        "optimization.unsupported-element-policy" => opt.unsupported_element_policy = Some(value.to_string()),
        "optimization.sigma-scale-factor" => opt.sigma_scale_factor = Some(parser::parse_value(key, value, "float")?),
        "optimization.relative-permittivity" => {
            opt.relative_permittivity = Some(parser::parse_value(key, value, "float")?)
        }
        "optimization.water-model" => opt.water_model = Some(value.to_string()),
        "optimization.interaction-cutoff" => opt.interaction_cutoff = Some(parser::parse_value(key, value, "float")?),
        "optimization.max-iterations" => opt.max_iterations = Some(parser::parse_value(key, value, "integer")?),
        "optimization.gradient-tolerance" => opt.gradient_tolerance = Some(parser::parse_value(key, value, "float")?),
        "optimization.energy-tolerance" => opt.energy_tolerance = Some(parser::parse_value(key, value, "float")?),
        _ => return Err(SetError::UnsupportedKey(key.to_string())),
    }
    Ok(())
}

fn section<T: Default>(slot: &mut Option<T>) -> &mut T {
    slot.get_or_insert_with(Default::default)
}

#[derive(Debug, thiserror::Error)]
enum SetError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Unsupported configuration key for --set: '{0}'")]
    UnsupportedKey(String),
}
