use crate::core::models::congener::{Congener, CongenerStatus};
use crate::core::models::receptor::Receptor;
use crate::core::utils::geometry::min_distance;
use crate::engine::cancel::CancellationToken;
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::Point3;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Smallest ligand-receptor atom distance, looked up through the receptor's
/// k-d tree.
pub fn min_distance_to_receptor(coordinates: &[Point3<f64>], receptor: &Receptor) -> Option<f64> {
    coordinates
        .iter()
        .filter_map(|p| receptor.nearest(p).map(|(_, d)| d))
        .min_by(|a, b| a.total_cmp(b))
}

/// Same as [`min_distance_to_receptor`], checking every atom pair.
pub fn min_distance_brute_force(coordinates: &[Point3<f64>], receptor: &Receptor) -> Option<f64> {
    let receptor_points: Vec<Point3<f64>> = receptor.atoms().iter().map(|a| a.position).collect();
    min_distance(coordinates, &receptor_points)
}

/// Flags and removes the conformers of one congener that come closer than
/// `threshold` to any receptor atom. Returns how many were removed.
pub fn filter_congener(congener: &mut Congener, receptor: &Receptor, threshold: f64) -> usize {
    if congener.status() == CongenerStatus::Pending {
        return 0;
    }
    let mut clashing = Vec::new();
    for (id, conformer) in congener.conformers_mut() {
        conformer.clashing = min_distance_to_receptor(&conformer.coordinates, receptor).is_some_and(|d| d < threshold);
        if conformer.clashing {
            clashing.push(id);
        }
    }
    let removed = clashing.into_iter().filter(|&id| congener.discard(id)).count();
    congener.refresh_status();
    removed
}

#[instrument(skip_all, name = "clash_detection_task")]
pub fn run(
    congeners: &mut [Congener],
    receptor: &Receptor,
    threshold: f64,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> usize {
    info!(threshold, receptor_atoms = receptor.len(), "Filtering clashing conformers.");
    reporter.report(Progress::TaskStart {
        total_steps: congeners.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = congeners.iter_mut();

    #[cfg(feature = "parallel")]
    let iterator = congeners.par_iter_mut();

    let removed: usize = iterator
        .map(|congener| {
            if cancel.is_cancelled() {
                return 0;
            }
            let removed = filter_congener(congener, receptor, threshold);
            if removed > 0 {
                debug!(congener = %congener.label(), removed, "Removed clashing conformers.");
            }
            reporter.report(Progress::TaskIncrement);
            removed
        })
        .sum();

    reporter.report(Progress::TaskFinish);
    info!(removed, "Clash filtering complete.");
    removed
}
