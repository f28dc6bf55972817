use crate::core::embedding::embed::{Embedder, is_distinct};
use crate::core::models::congener::{Congener, CongenerStatus};
use crate::core::models::conformer::Conformer;
use crate::engine::cancel::CancellationToken;
use crate::engine::config::GenerationConfig;
use crate::engine::progress::{Progress, ProgressReporter};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Per-congener bookkeeping of one generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub accepted: usize,
    pub attempts: usize,
    /// Attempts rejected for non-finite coordinates or distorted bonds.
    pub failed: usize,
    /// Attempts rejected as too similar to an accepted conformer.
    pub duplicates: usize,
}

fn congener_seed(base: u64, index: usize) -> u64 {
    base.wrapping_add((index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Fills `congener` with up to `num_conf` mutually distinct conformers.
///
/// Stops after `max_attempts` attempts or when `cancel` trips; a congener
/// left without conformers becomes missing. A congener whose run was
/// cancelled before the first attempt stays pending.
pub fn generate_for(
    congener: &mut Congener,
    config: &GenerationConfig,
    seed: u64,
    cancel: &CancellationToken,
) -> GenerationOutcome {
    let mut outcome = GenerationOutcome::default();
    if cancel.is_cancelled() {
        return outcome;
    }

    let rigid = congener.rigid_atoms(&config.flexible_atoms);
    let embedder = match Embedder::new(&congener.molecule, &rigid) {
        Ok(embedder) => embedder,
        Err(error) => {
            warn!(congener = %congener.label(), %error, "Cannot embed congener.");
            congener.refresh_status();
            return outcome;
        }
    };

    let heavy = congener.molecule.heavy_atom_indices();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut accepted: Vec<Vec<_>> = congener.conformers().map(|(_, c)| c.coordinates.clone()).collect();

    while accepted.len() < config.num_conf && outcome.attempts < config.max_attempts {
        if cancel.is_cancelled() {
            break;
        }
        outcome.attempts += 1;
        match embedder.embed(&mut rng) {
            Ok(coords) if is_distinct(&coords, &accepted, &heavy, config.minimum_conf_rms) => {
                congener.add_conformer(Conformer::new(coords.clone()));
                accepted.push(coords);
                outcome.accepted += 1;
            }
            Ok(_) => outcome.duplicates += 1,
            Err(reason) => {
                debug!(congener = %congener.label(), %reason, "Embedding attempt rejected.");
                outcome.failed += 1;
            }
        }
    }

    if outcome.attempts > 0 || congener.status() != CongenerStatus::Pending {
        congener.refresh_status();
    }
    outcome
}

#[instrument(skip_all, name = "conformer_generation_task")]
pub fn run(
    congeners: &mut [Congener],
    config: &GenerationConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Vec<GenerationOutcome> {
    info!(
        congeners = congeners.len(),
        num_conf = config.num_conf,
        max_attempts = config.max_attempts,
        "Generating conformers."
    );
    reporter.report(Progress::TaskStart {
        total_steps: congeners.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = congeners.iter_mut().enumerate();

    #[cfg(feature = "parallel")]
    let iterator = congeners.par_iter_mut().enumerate();

    let outcomes: Vec<GenerationOutcome> = iterator
        .map(|(index, congener)| {
            let outcome = generate_for(congener, config, congener_seed(config.seed, index), cancel);
            debug!(
                congener = %congener.label(),
                accepted = outcome.accepted,
                attempts = outcome.attempts,
                "Conformer generation finished."
            );
            reporter.report(Progress::TaskIncrement);
            outcome
        })
        .collect();

    reporter.report(Progress::TaskFinish);
    info!(
        conformers = outcomes.iter().map(|o| o.accepted).sum::<usize>(),
        missing = congeners.iter().filter(|c| c.is_missing()).count(),
        "Conformer generation complete."
    );
    outcomes
}
