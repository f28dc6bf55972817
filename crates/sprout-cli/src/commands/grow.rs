use super::fragments::load_library;
use crate::cli::GrowArgs;
use crate::config::{AppConfig, build_config};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use sprout::{
    core::fragments::selection::{AllFragments, FragmentSelector, NameSelection},
    core::io::{pdb::PdbFile, sdf::SdfFile, traits::MolecularFile},
    core::models::{molecule::Molecule, receptor::Receptor},
    engine::{cancel::CancellationToken, error::EngineError, progress::ProgressReporter},
    workflows::grow::{self, GrowRequest, GrowResult, SUMMARY_FILE},
};
use std::path::Path;
use tracing::{info, warn};

pub async fn run(args: GrowArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_config(&args)?;

    info!("Loading template from {:?}", &app.template_path);
    let template = load_template(&app.template_path)?;
    let receptor = app.receptor_path.as_deref().map(load_receptor).transpose()?;
    if receptor.is_none() {
        warn!("No receptor given; clash filtering and intermolecular energies are skipped.");
    }

    let library = load_library(app.fragment_library.as_deref())?;
    let fragments = if app.fragments.is_empty() {
        AllFragments.select(&library)
    } else {
        NameSelection::new(app.fragments.iter().cloned()).select(&library)
    }
    .map_err(EngineError::from)?;

    let cancel = new_token(&app);
    let signal_token = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing the current stage.");
            signal_token.cancel();
        }
    });

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let request = GrowRequest {
        template: &template,
        attachments: &app.attachments,
        fragments: &fragments,
        receptor: receptor.as_ref(),
        receptor_path: app.receptor_path.as_deref(),
    };

    println!(
        "Growing {} fragment(s) at {} attachment point(s) on '{}'...",
        fragments.len(),
        app.attachments.len(),
        template.name
    );
    info!("Invoking the core grow workflow...");
    let outcome = tokio::task::block_in_place(|| grow::run(request, &app.core_config, &reporter, &cancel));
    signal_task.abort();
    let result = outcome?;

    let files = result.write_to_directory(&app.output_dir)?;
    for line in summary_lines(&result, files.len(), &app.output_dir) {
        println!("{line}");
    }
    Ok(())
}

fn new_token(app: &AppConfig) -> CancellationToken {
    match app.timeout {
        Some(timeout) => {
            info!(seconds = timeout.as_secs(), "Run time is limited.");
            CancellationToken::with_timeout(timeout)
        }
        None => CancellationToken::new(),
    }
}

/// Reads the first record of an SDF/MOL file.
fn load_template(path: &Path) -> Result<Molecule> {
    let records = SdfFile::read_from_path(path).map_err(|e| CliError::parsing(path, e))?;
    if records.len() > 1 {
        warn!(records = records.len(), "Template file has several records; using the first.");
    }
    records
        .into_iter()
        .next()
        .ok_or_else(|| CliError::parsing(path, anyhow::anyhow!("no molecule records found")))
}

fn load_receptor(path: &Path) -> Result<Receptor> {
    info!("Loading receptor from {:?}", path);
    let receptor = PdbFile::read_from_path(path).map_err(|e| CliError::parsing(path, e))?;
    if receptor.is_empty() {
        return Err(CliError::parsing(path, anyhow::anyhow!("no receptor atoms found")));
    }
    Ok(receptor)
}

fn summary_lines(result: &GrowResult, file_count: usize, output_dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    if result.cancelled {
        lines.push("Run stopped early; unfinished congeners are listed as pending without pose files.".to_string());
    }
    lines.push(format!(
        "✓ {} pose(s) for {} congener(s) written to: {}",
        file_count,
        result.populated().count(),
        output_dir.display()
    ));
    lines.push(format!("  Summary: {}", output_dir.join(SUMMARY_FILE).display()));

    let missing: Vec<String> = result
        .missing
        .iter()
        .filter_map(|&i| result.congeners.get(i))
        .map(|c| c.label())
        .collect();
    if !missing.is_empty() {
        lines.push(format!("  Missing (no conformer survived): {}", missing.join(", ")));
    }
    for failure in &result.attachment_failures {
        lines.push(format!(
            "  Could not attach '{}' at atom {}: {}",
            failure.fragment_name, failure.attachment_index, failure.error
        ));
    }
    if let Some(error) = &result.scoring_error {
        lines.push(format!("  Scoring skipped: {error}"));
    }
    lines
}
