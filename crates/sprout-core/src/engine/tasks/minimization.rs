use crate::core::forcefield::classical::ClassicalLigandModel;
use crate::core::forcefield::hybrid::HybridEnergy;
use crate::core::forcefield::intermolecular::LigandReceptorModel;
use crate::core::forcefield::learned::{AniModel, LearnedPotential};
use crate::core::forcefield::model::{EnergyError, EnergyModel, flatten, unflatten};
use crate::core::forcefield::params::ClassicalParams;
use crate::core::models::congener::{Congener, CongenerStatus};
use crate::core::models::receptor::Receptor;
use crate::core::utils::minimize::{MinimizeError, MinimizerSettings, minimize};
use crate::engine::cancel::CancellationToken;
use crate::engine::config::{OptimizationConfig, UnsupportedElementPolicy};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Parameter sets loaded once per run and shared by every congener.
#[derive(Debug, Clone)]
pub struct ForceFields {
    pub classical: ClassicalParams,
    pub learned: Option<Arc<AniModel>>,
}

impl ForceFields {
    pub fn load(config: &OptimizationConfig) -> Result<Self, EngineError> {
        let classical = ClassicalParams::from_identifier(&config.ligand_force_field)?;
        let learned = match (&config.ani_model, config.use_ani) {
            (Some(path), true) => Some(Arc::new(AniModel::load(path)?)),
            _ => None,
        };
        info!(
            classical = %classical.name,
            learned = learned.as_ref().map(|m| m.name.as_str()).unwrap_or("off"),
            "Force fields loaded."
        );
        Ok(Self { classical, learned })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinimizationOutcome {
    pub optimized: usize,
    pub discarded: usize,
    /// The learned potential could not handle the congener and the classical
    /// model was used instead.
    pub fell_back: bool,
}

/// Builds the hybrid model for one congener.
///
/// With a learned model configured, an element it does not cover either
/// falls back to the classical model or fails with `UnsupportedElement`,
/// depending on the policy. Returns the model and whether it fell back.
pub fn build_energy_model<'a>(
    congener: &Congener,
    receptor: Option<&'a Receptor>,
    config: &OptimizationConfig,
    forcefields: &ForceFields,
) -> Result<(HybridEnergy<'a>, bool), EngineError> {
    let molecule = &congener.molecule;
    let classical = || -> Result<Box<dyn EnergyModel>, EngineError> {
        Ok(Box::new(ClassicalLigandModel::new(molecule, &forcefields.classical)?))
    };

    let (intramolecular, fell_back) = match &forcefields.learned {
        Some(model) if config.use_ani => match LearnedPotential::new(Arc::clone(model), molecule) {
            Ok(potential) => (Box::new(potential) as Box<dyn EnergyModel>, false),
            Err(EnergyError::UnsupportedElement { element, atom, model })
                if config.unsupported_element_policy == UnsupportedElementPolicy::Classical =>
            {
                warn!(
                    congener = %congener.label(),
                    %element,
                    atom,
                    "Learned potential {} does not cover this element, using the classical model.",
                    model
                );
                (classical()?, true)
            }
            Err(error) => return Err(error.into()),
        },
        _ => (classical()?, false),
    };

    let intermolecular = receptor
        .map(|r| LigandReceptorModel::new(r, molecule, &forcefields.classical, config.interaction))
        .transpose()?;
    Ok((HybridEnergy::new(intramolecular, intermolecular), fell_back))
}

fn convergence_error(error: MinimizeError<EnergyError>) -> EngineError {
    match error {
        MinimizeError::NotConverged { iterations, .. } => EngineError::Convergence { iterations },
        MinimizeError::NonFinite { iteration } => EngineError::Convergence { iterations: iteration },
        MinimizeError::Objective(error) => error.into(),
    }
}

/// Minimizes every conformer of `congener` in place under `model`.
///
/// A conformer whose minimization fails is discarded. Conformers not yet
/// reached when `cancel` trips keep their coordinates and no energy.
pub fn optimize_congener(
    congener: &mut Congener,
    model: &dyn EnergyModel,
    settings: &MinimizerSettings,
    cancel: &CancellationToken,
) -> MinimizationOutcome {
    let mut outcome = MinimizationOutcome::default();
    for id in congener.conformer_ids().to_vec() {
        if cancel.is_cancelled() {
            break;
        }
        let Some(conformer) = congener.conformer(id) else {
            continue;
        };
        let mut x = flatten(&conformer.coordinates);
        let result = minimize(&mut x, settings, |x| {
            let (energy, gradient) = model.energy_and_gradient(&unflatten(x))?;
            Ok((energy, gradient.iter().flat_map(|g| [g.x, g.y, g.z]).collect()))
        });
        match result {
            Ok(report) => {
                if let Some(conformer) = congener.conformer_mut(id) {
                    conformer.coordinates = unflatten(&x);
                    conformer.energy = Some(report.value);
                }
                outcome.optimized += 1;
            }
            Err(error) => {
                let error = convergence_error(error);
                debug!(congener = %congener.label(), %error, "Discarding conformer.");
                congener.discard(id);
                outcome.discarded += 1;
            }
        }
    }
    congener.refresh_status();
    outcome
}

fn optimize_one(
    congener: &mut Congener,
    receptor: Option<&Receptor>,
    config: &OptimizationConfig,
    forcefields: &ForceFields,
    cancel: &CancellationToken,
) -> MinimizationOutcome {
    if congener.status() != CongenerStatus::Populated || cancel.is_cancelled() {
        return MinimizationOutcome::default();
    }
    match build_energy_model(congener, receptor, config, forcefields) {
        Ok((model, fell_back)) => {
            let mut outcome = optimize_congener(congener, &model, &config.minimizer, cancel);
            outcome.fell_back = fell_back;
            outcome
        }
        Err(error) => {
            warn!(congener = %congener.label(), %error, "Cannot build energy model, dropping congener.");
            let discarded = congener.discard_all();
            congener.refresh_status();
            MinimizationOutcome {
                discarded,
                ..MinimizationOutcome::default()
            }
        }
    }
}

#[instrument(skip_all, name = "minimization_task")]
pub fn run(
    congeners: &mut [Congener],
    receptor: Option<&Receptor>,
    config: &OptimizationConfig,
    forcefields: &ForceFields,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Vec<MinimizationOutcome> {
    info!(
        congeners = congeners.len(),
        use_ani = config.use_ani,
        with_receptor = receptor.is_some(),
        max_iterations = config.minimizer.max_iterations,
        "Minimizing conformers."
    );
    reporter.report(Progress::TaskStart {
        total_steps: congeners.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = congeners.iter_mut();

    #[cfg(feature = "parallel")]
    let iterator = congeners.par_iter_mut();

    let outcomes: Vec<MinimizationOutcome> = iterator
        .map(|congener| {
            let outcome = optimize_one(congener, receptor, config, forcefields, cancel);
            reporter.report(Progress::TaskIncrement);
            outcome
        })
        .collect();

    reporter.report(Progress::TaskFinish);
    info!(
        optimized = outcomes.iter().map(|o| o.optimized).sum::<usize>(),
        discarded = outcomes.iter().map(|o| o.discarded).sum::<usize>(),
        fallbacks = outcomes.iter().filter(|o| o.fell_back).count(),
        "Minimization complete."
    );
    outcomes
}
