use crate::core::fragments::fragment::Fragment;
use crate::core::io::report::{SummaryRow, write_summary_to_path};
use crate::core::io::sdf::SdfFile;
use crate::core::models::congener::{Congener, CongenerStatus};
use crate::core::models::conformer::Conformer;
use crate::core::models::ids::ConformerId;
use crate::core::models::molecule::Molecule;
use crate::core::models::receptor::Receptor;
use crate::engine::cancel::CancellationToken;
use crate::engine::config::{ConfigError, GrowConfig, ScoringConfig, ScoringEngine};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::scoring::{AffinityScorer, GninaScorer, Pose, ScoringError};
use crate::engine::tasks;
use crate::engine::tasks::attachment::AttachmentFailure;
use crate::engine::tasks::minimization::ForceFields;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

pub const SUMMARY_FILE: &str = "summary.csv";

/// Inputs of one growing run. Everything is borrowed and left untouched.
#[derive(Debug, Clone, Copy)]
pub struct GrowRequest<'a> {
    pub template: &'a Molecule,
    /// Template indices of the hydrogens to replace.
    pub attachments: &'a [usize],
    pub fragments: &'a [&'a Fragment],
    pub receptor: Option<&'a Receptor>,
    /// Receptor file handed to the external scorer.
    pub receptor_path: Option<&'a Path>,
}

#[derive(Debug)]
pub struct GrowResult {
    /// Every grown congener in (attachment, fragment) order, including
    /// missing ones.
    pub congeners: Vec<Congener>,
    pub attachment_failures: Vec<AttachmentFailure>,
    /// Positions in `congeners` of the congeners left without conformers.
    pub missing: Vec<usize>,
    /// Set when scoring was requested and failed; poses stay valid.
    pub scoring_error: Option<ScoringError>,
    /// The run stopped early; congeners not reached are still pending.
    pub cancelled: bool,
}

impl GrowResult {
    pub fn conformer_count(&self) -> usize {
        self.congeners.iter().map(Congener::conformer_count).sum()
    }

    /// Congeners that kept at least one conformer.
    pub fn populated(&self) -> impl Iterator<Item = &Congener> {
        self.congeners
            .iter()
            .filter(|c| c.status() == CongenerStatus::Populated)
    }

    /// Writes one SDF per ranked conformer plus `summary.csv` into
    /// `directory`, creating it if needed. Returns the written pose files.
    ///
    /// Conformers that never reached ranking get no pose file; their
    /// congener is listed as pending.
    #[instrument(skip_all, name = "write_outputs")]
    pub fn write_to_directory(&self, directory: &Path) -> Result<Vec<PathBuf>, EngineError> {
        std::fs::create_dir_all(directory).map_err(|e| EngineError::io(directory, e))?;

        let mut files = Vec::new();
        let mut rows = Vec::new();
        for congener in &self.congeners {
            if congener.conformer_count() == 0 {
                rows.push(SummaryRow::for_empty(congener));
                continue;
            }
            let ranked: Vec<(usize, &Conformer)> = congener
                .conformers()
                .filter_map(|(_, c)| c.rank.map(|rank| (rank, c)))
                .collect();
            if ranked.is_empty() {
                rows.push(SummaryRow::for_unfinished(congener));
                continue;
            }
            for (rank, conformer) in ranked {
                let file_name = format!("{}_{}.sdf", congener.label(), rank);
                let path = directory.join(&file_name);
                write_pose_file(&path, congener, conformer)?;
                rows.push(SummaryRow::for_conformer(congener, conformer, Some(file_name)));
                files.push(path);
            }
        }

        let summary = directory.join(SUMMARY_FILE);
        write_summary_to_path(&summary, &rows)?;
        info!(poses = files.len(), directory = %directory.display(), "Wrote results.");
        Ok(files)
    }
}

fn pose_properties(congener: &Congener, conformer: &Conformer) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    properties.insert("congener".to_string(), congener.label());
    properties.insert("attachment".to_string(), congener.attachment_index.to_string());
    properties.insert("fragment".to_string(), congener.fragment_name.clone());
    if let Some(rank) = conformer.rank {
        properties.insert("rank".to_string(), rank.to_string());
    }
    if let Some(energy) = conformer.energy {
        properties.insert("energy".to_string(), format!("{energy:.4}"));
    }
    if let Some(relative) = conformer.relative_energy {
        properties.insert("relative_energy".to_string(), format!("{relative:.4}"));
    }
    if let Some(score) = conformer.score {
        properties.insert("affinity_pk".to_string(), format!("{:.4}", score.affinity_pk));
        properties.insert("ic50_nM".to_string(), format!("{:.4}", score.ic50_nanomolar()));
        if let Some(vina) = score.vina_affinity {
            properties.insert("vina_affinity".to_string(), format!("{vina:.4}"));
        }
    }
    properties
}

fn write_pose_file(path: &Path, congener: &Congener, conformer: &Conformer) -> Result<(), EngineError> {
    let file = File::create(path).map_err(|e| EngineError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    SdfFile::write_pose(
        &congener.molecule,
        &conformer.coordinates,
        &pose_properties(congener, conformer),
        &mut writer,
    )?;
    writer.flush().map_err(|e| EngineError::io(path, e))
}

/// The scorer a [`ScoringConfig`] asks for.
pub fn scorer_for(config: &ScoringConfig) -> Box<dyn AffinityScorer> {
    match config.engine {
        ScoringEngine::Gnina => Box::new(GninaScorer::new(config.executable.clone())),
    }
}

fn validate(request: &GrowRequest<'_>, config: &GrowConfig) -> Result<(), EngineError> {
    if !request.template.has_coordinates() {
        return Err(EngineError::Format(format!(
            "template '{}' has atoms without coordinates",
            request.template.name
        )));
    }
    if request.attachments.is_empty() {
        return Err(ConfigError::MissingParameter("attachments").into());
    }
    if let Some(index) = request.attachments.iter().duplicates().next() {
        return Err(ConfigError::InvalidParameter {
            name: "attachments",
            reason: format!("atom {index} is listed more than once"),
        }
        .into());
    }
    if request.fragments.is_empty() {
        return Err(ConfigError::MissingParameter("fragments").into());
    }
    if config.scoring.is_some() && request.receptor_path.is_none() {
        return Err(ConfigError::MissingParameter("receptor_path").into());
    }
    Ok(())
}

/// Runs the full pipeline, scoring with the engine named in the config.
pub fn run(
    request: GrowRequest<'_>,
    config: &GrowConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<GrowResult, EngineError> {
    let scorer = config.scoring.as_ref().map(scorer_for);
    run_with_scorer(request, config, scorer.as_deref(), reporter, cancel)
}

/// Runs the full pipeline with an explicit scorer; `None` skips scoring.
///
/// Per-combination and per-conformer failures are recorded and never abort
/// the run. Cancellation ends the run after the current stage with
/// `cancelled` set.
#[instrument(skip_all, name = "grow_workflow")]
pub fn run_with_scorer(
    request: GrowRequest<'_>,
    config: &GrowConfig,
    scorer: Option<&dyn AffinityScorer>,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<GrowResult, EngineError> {
    validate(&request, config)?;

    // === Phase 0: Preparation ===
    let forcefields = reporter.phase("Preparation", || {
        info!(
            template = %request.template.name,
            attachments = request.attachments.len(),
            fragments = request.fragments.len(),
            receptor = request.receptor.map(|r| r.name.as_str()).unwrap_or("none"),
            "Starting grow workflow."
        );
        ForceFields::load(&config.optimization)
    })?;

    // === Phase 1: Attach fragments ===
    let batch = reporter.phase("Attachment", || {
        tasks::attachment::run(request.template, request.attachments, request.fragments, reporter)
    });
    let mut result = GrowResult {
        congeners: batch.congeners,
        attachment_failures: batch.failures,
        missing: Vec::new(),
        scoring_error: None,
        cancelled: false,
    };

    // === Phase 2: Conformer ensembles ===
    if stop_requested(&mut result, cancel) {
        return Ok(result);
    }
    reporter.phase("Conformer Generation", || {
        tasks::conformer_generation::run(&mut result.congeners, &config.generation, reporter, cancel)
    });

    // === Phase 3: Receptor clashes ===
    if stop_requested(&mut result, cancel) {
        return Ok(result);
    }
    if let Some(receptor) = request.receptor {
        reporter.phase("Clash Filtering", || {
            tasks::clash_detection::run(&mut result.congeners, receptor, config.clash.threshold, reporter, cancel)
        });
    } else {
        info!("No receptor given, skipping clash filtering.");
    }

    // === Phase 4: Hybrid energy minimization ===
    if stop_requested(&mut result, cancel) {
        return Ok(result);
    }
    reporter.phase("Minimization", || {
        tasks::minimization::run(
            &mut result.congeners,
            request.receptor,
            &config.optimization,
            &forcefields,
            reporter,
            cancel,
        )
    });

    // === Phase 5: Energy window and ranks ===
    if stop_requested(&mut result, cancel) {
        return Ok(result);
    }
    reporter.phase("Ranking", || {
        tasks::ranking::run(
            &mut result.congeners,
            config.ranking.energy_range,
            config.generation.minimum_conf_rms,
            reporter,
        )
    });
    result.missing = tasks::ranking::missing_indices(&result.congeners);

    // === Phase 6: External scoring ===
    if let (Some(scorer), Some(receptor_path)) = (scorer, request.receptor_path) {
        if stop_requested(&mut result, cancel) {
            return Ok(result);
        }
        reporter.phase("Scoring", || score_poses(&mut result, scorer, receptor_path));
    }

    info!(
        congeners = result.congeners.len(),
        conformers = result.conformer_count(),
        missing = result.missing.len(),
        failures = result.attachment_failures.len(),
        "Grow workflow complete."
    );
    Ok(result)
}

fn stop_requested(result: &mut GrowResult, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        warn!("Cancellation requested, stopping after the current stage.");
        result.missing = tasks::ranking::missing_indices(&result.congeners);
        result.cancelled = true;
    }
    result.cancelled
}

fn score_poses(result: &mut GrowResult, scorer: &dyn AffinityScorer, receptor_path: &Path) {
    let keys: Vec<(usize, ConformerId)> = result
        .congeners
        .iter()
        .enumerate()
        .flat_map(|(i, c)| c.conformer_ids().iter().map(move |&id| (i, id)))
        .collect();
    if keys.is_empty() {
        info!("No poses to score.");
        return;
    }

    let scored = {
        let poses: Vec<Pose<'_>> = keys
            .iter()
            .filter_map(|&(i, id)| {
                let congener = &result.congeners[i];
                congener.conformer(id).map(|c| Pose {
                    molecule: &congener.molecule,
                    coordinates: &c.coordinates,
                })
            })
            .collect();
        info!(poses = poses.len(), scorer = scorer.name(), "Scoring poses.");
        scorer.score(receptor_path, &poses)
    };

    match scored {
        Ok(scores) => {
            for ((i, id), score) in keys.into_iter().zip(scores) {
                if let Some(conformer) = result.congeners[i].conformer_mut(id) {
                    conformer.score = Some(score);
                }
            }
        }
        Err(error) => {
            warn!(%error, "Scoring failed; poses are kept without scores.");
            result.scoring_error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fragments::library::FragmentLibrary;
    use crate::core::io::report::read_summary_from_path;
    use crate::core::io::traits::MolecularFile;
    use crate::core::models::conformer::PoseScore;
    use crate::core::models::molecule::tests::ethane;
    use crate::engine::config::GrowConfigBuilder;
    use crate::engine::progress::Progress;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Unavailable;

    impl AffinityScorer for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn score(&self, _: &Path, _: &[Pose<'_>]) -> Result<Vec<PoseScore>, ScoringError> {
            Err(ScoringError::ExecutableNotFound("unavailable".to_string()))
        }
    }

    fn config() -> GrowConfig {
        GrowConfigBuilder::new()
            .num_conf(3)
            .minimum_conf_rms(0.3)
            .ligand_force_field("uff")
            .build()
            .unwrap()
    }

    #[test]
    fn template_without_coordinates_is_rejected() {
        let library = FragmentLibrary::builtin().unwrap();
        let fragments = [library.get("methyl").unwrap()];
        let mut template = ethane();
        template.atom_mut(0).unwrap().position = None;
        let request = GrowRequest {
            template: &template,
            attachments: &[2],
            fragments: &fragments,
            receptor: None,
            receptor_path: None,
        };
        let error = run(request, &config(), &ProgressReporter::new(), &CancellationToken::new()).unwrap_err();
        assert!(matches!(error, EngineError::Format(_)));
    }

    #[test]
    fn scoring_failure_keeps_poses() {
        let library = FragmentLibrary::builtin().unwrap();
        let fragments = [library.get("methyl").unwrap()];
        let template = ethane();
        let request = GrowRequest {
            template: &template,
            attachments: &[2],
            fragments: &fragments,
            receptor: None,
            receptor_path: Some(Path::new("receptor.pdb")),
        };
        let result = run_with_scorer(
            request,
            &config(),
            Some(&Unavailable),
            &ProgressReporter::new(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(matches!(result.scoring_error, Some(ScoringError::ExecutableNotFound(_))));
        assert!(result.conformer_count() > 0);
        assert!(result.populated().all(|c| c.conformers().all(|(_, conf)| conf.energy.is_some())));
    }

    fn request<'a>(template: &'a Molecule, attachments: &'a [usize], fragments: &'a [&'a Fragment]) -> GrowRequest<'a> {
        GrowRequest {
            template,
            attachments,
            fragments,
            receptor: None,
            receptor_path: None,
        }
    }

    #[test]
    fn repeated_attachment_atoms_are_rejected() {
        let library = FragmentLibrary::builtin().unwrap();
        let fragments = [library.get("methyl").unwrap()];
        let template = ethane();
        let error = run(
            request(&template, &[5, 3, 5], &fragments),
            &config(),
            &ProgressReporter::new(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(
            error,
            EngineError::Config(ConfigError::InvalidParameter { name: "attachments", .. })
        ));
    }

    #[test]
    fn cancelled_run_writes_no_unranked_poses() {
        let library = FragmentLibrary::builtin().unwrap();
        let fragments = [library.get("fluoro").unwrap()];
        let template = ethane();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let finished = AtomicUsize::new(0);
        // Preparation, Attachment, then Conformer Generation.
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            if matches!(event, Progress::PhaseFinish) && finished.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                trigger.cancel();
            }
        }));
        let result = run(request(&template, &[5], &fragments), &config(), &reporter, &cancel).unwrap();
        assert!(result.cancelled);
        let held: usize = result.congeners.iter().map(Congener::conformer_count).sum();
        assert!(held > 0);
        assert!(result.congeners.iter().all(|c| c.conformers().all(|(_, conf)| conf.rank.is_none() && conf.energy.is_none())));

        let dir = tempfile::tempdir().unwrap();
        let files = result.write_to_directory(dir.path()).unwrap();
        assert!(files.is_empty());
        let rows = read_summary_from_path(&dir.path().join(SUMMARY_FILE)).unwrap();
        assert_eq!(rows.len(), result.congeners.len());
        assert!(rows.iter().all(|r| r.file.is_none() && r.status == "pending"));
    }

    #[test]
    fn outputs_follow_congener_labels() {
        let library = FragmentLibrary::builtin().unwrap();
        let fragments = [library.get("fluoro").unwrap()];
        let template = ethane();
        let request = GrowRequest {
            template: &template,
            attachments: &[5],
            fragments: &fragments,
            receptor: None,
            receptor_path: None,
        };
        let result = run(request, &config(), &ProgressReporter::new(), &CancellationToken::new()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let files = result.write_to_directory(dir.path()).unwrap();
        assert_eq!(files.len(), result.conformer_count());
        let first = dir.path().join("ethane_a5_fluoro_0.sdf");
        assert!(files.contains(&first));

        let records = SdfFile::read_from_path(&first).unwrap();
        assert_eq!(records[0].atom_count(), template.atom_count());
        assert_eq!(records[0].properties.get("rank").map(String::as_str), Some("0"));
        assert_eq!(records[0].properties.get("relative_energy").map(String::as_str), Some("0.0000"));

        let rows = read_summary_from_path(&dir.path().join(SUMMARY_FILE)).unwrap();
        assert_eq!(rows.len(), files.len());
        assert!(rows.iter().all(|r| r.congener == "ethane_a5_fluoro"));
    }
}
