use crate::core::embedding::embed::is_distinct;
use crate::core::models::congener::{Congener, CongenerStatus};
use crate::core::models::ids::ConformerId;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{debug, info, instrument};

/// Orders one congener's conformers by energy and keeps those within
/// `energy_range` of the lowest. Returns how many were removed.
///
/// Conformers without an energy are removed first. Walking up in energy, a
/// conformer closer than `minimum_rms` (heavy-atom aligned RMSD) to a kept
/// one is removed, since minimization can collapse distinct starts into one
/// minimum. Ranking an already ranked congener with the same settings
/// changes nothing.
pub fn rank_congener(congener: &mut Congener, energy_range: f64, minimum_rms: f64) -> usize {
    if congener.status() == CongenerStatus::Pending {
        return 0;
    }

    let mut scored = Vec::with_capacity(congener.conformer_count());
    let mut unscored = Vec::new();
    for (id, conformer) in congener.conformers() {
        match conformer.energy {
            Some(energy) if energy.is_finite() => scored.push((id, energy)),
            _ => unscored.push(id),
        }
    }
    let mut removed = unscored.into_iter().filter(|&id| congener.discard(id)).count();

    // Stable, so equal energies keep their previous order.
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (scored, duplicates) = prune_duplicates(congener, scored, minimum_rms);
    removed += duplicates.into_iter().filter(|&id| congener.discard(id)).count();
    if let Some(&(_, minimum)) = scored.first() {
        let (kept, dropped): (Vec<_>, Vec<_>) = scored.into_iter().partition(|(_, e)| e - minimum <= energy_range);
        for (id, _) in dropped {
            if congener.discard(id) {
                removed += 1;
            }
        }
        for (rank, &(id, energy)) in kept.iter().enumerate() {
            if let Some(conformer) = congener.conformer_mut(id) {
                conformer.relative_energy = Some(energy - minimum);
                conformer.rank = Some(rank);
            }
        }
        congener.set_order(kept.into_iter().map(|(id, _)| id).collect());
    }

    congener.refresh_status();
    removed
}

/// Splits energy-sorted conformers into the distinct ones and the
/// near-duplicates of a lower-energy conformer.
fn prune_duplicates(
    congener: &Congener,
    sorted: Vec<(ConformerId, f64)>,
    minimum_rms: f64,
) -> (Vec<(ConformerId, f64)>, Vec<ConformerId>) {
    let heavy = congener.molecule.heavy_atom_indices();
    let mut kept = Vec::with_capacity(sorted.len());
    let mut kept_coords = Vec::with_capacity(sorted.len());
    let mut duplicates = Vec::new();
    for (id, energy) in sorted {
        let Some(conformer) = congener.conformer(id) else {
            continue;
        };
        if is_distinct(&conformer.coordinates, &kept_coords, &heavy, minimum_rms) {
            kept_coords.push(conformer.coordinates.clone());
            kept.push((id, energy));
        } else {
            duplicates.push(id);
        }
    }
    (kept, duplicates)
}

#[instrument(skip_all, name = "ranking_task")]
pub fn run(congeners: &mut [Congener], energy_range: f64, minimum_rms: f64, reporter: &ProgressReporter) -> usize {
    info!(congeners = congeners.len(), energy_range, minimum_rms, "Ranking conformers.");
    reporter.report(Progress::TaskStart {
        total_steps: congeners.len() as u64,
    });
    let mut removed = 0;
    for congener in congeners.iter_mut() {
        let dropped = rank_congener(congener, energy_range, minimum_rms);
        if dropped > 0 {
            debug!(congener = %congener.label(), dropped, kept = congener.conformer_count(), "Pruned duplicates and applied energy window.");
        }
        removed += dropped;
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    info!(removed, missing = missing_indices(congeners).len(), "Ranking complete.");
    removed
}

/// Positions of the congeners that ended up without conformers.
pub fn missing_indices(congeners: &[Congener]) -> Vec<usize> {
    congeners
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_missing())
        .map(|(i, _)| i)
        .collect()
}

/// Removes missing congeners from `congeners` and returns their original
/// positions.
pub fn discard_missing(congeners: &mut Vec<Congener>) -> Vec<usize> {
    let missing = missing_indices(congeners);
    let mut index = 0;
    congeners.retain(|_| {
        let keep = missing.binary_search(&index).is_err();
        index += 1;
        keep
    });
    missing
}
