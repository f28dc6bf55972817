use crate::core::io::sdf::{SdfError, SdfFile};
use crate::core::models::conformer::PoseScore;
use crate::core::models::molecule::Molecule;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Scoring is not supported on {0}")]
    UnsupportedPlatform(&'static str),
    #[error("Scoring executable '{0}' not found")]
    ExecutableNotFound(String),
    #[error("Failed to prepare scoring input: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write poses: {0}")]
    Sdf(#[from] SdfError),
    #[error("Scoring engine exited with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },
    #[error("Scoring engine reported {found} scores for {expected} poses")]
    OutputMismatch { expected: usize, found: usize },
}

/// A ligand pose handed to an external scorer.
#[derive(Debug, Clone, Copy)]
pub struct Pose<'a> {
    pub molecule: &'a Molecule,
    pub coordinates: &'a [Point3<f64>],
}

/// An external binding-affinity predictor. Returns one score per pose, in
/// pose order.
pub trait AffinityScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, receptor_path: &Path, poses: &[Pose<'_>]) -> Result<Vec<PoseScore>, ScoringError>;
}

/// Runs `gnina --score_only` on the poses.
#[derive(Debug, Clone, Default)]
pub struct GninaScorer {
    executable: Option<PathBuf>,
}

impl GninaScorer {
    pub const EXECUTABLE: &'static str = "gnina";

    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }

    fn resolve_executable(&self) -> Result<PathBuf, ScoringError> {
        if !cfg!(target_os = "linux") {
            return Err(ScoringError::UnsupportedPlatform(std::env::consts::OS));
        }
        match &self.executable {
            Some(path) if path.is_file() => Ok(path.clone()),
            Some(path) => Err(ScoringError::ExecutableNotFound(path.display().to_string())),
            None => which::which(Self::EXECUTABLE)
                .map_err(|_| ScoringError::ExecutableNotFound(Self::EXECUTABLE.to_string())),
        }
    }
}

impl AffinityScorer for GninaScorer {
    fn name(&self) -> &'static str {
        "gnina"
    }

    #[instrument(skip_all, name = "gnina_scoring")]
    fn score(&self, receptor_path: &Path, poses: &[Pose<'_>]) -> Result<Vec<PoseScore>, ScoringError> {
        let executable = self.resolve_executable()?;
        if poses.is_empty() {
            return Ok(Vec::new());
        }

        let scratch = tempfile::tempdir()?;
        let ligands = scratch.path().join("poses.sdf");
        {
            let mut writer = BufWriter::new(File::create(&ligands)?);
            let properties = BTreeMap::new();
            for pose in poses {
                SdfFile::write_pose(pose.molecule, pose.coordinates, &properties, &mut writer)?;
            }
            writer.flush()?;
        }

        info!(poses = poses.len(), executable = %executable.display(), "Running external scorer.");
        let output = Command::new(&executable)
            .arg("-r")
            .arg(receptor_path)
            .arg("-l")
            .arg(&ligands)
            .arg("--score_only")
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            return Err(ScoringError::Failed {
                status: output.status.code(),
                stderr: lines[lines.len().saturating_sub(5)..].join("\n"),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let scores = parse_score_output(&stdout);
        debug!(parsed = scores.len(), "Parsed scorer output.");
        if scores.len() != poses.len() {
            return Err(ScoringError::OutputMismatch {
                expected: poses.len(),
                found: scores.len(),
            });
        }
        Ok(scores)
    }
}

fn leading_number(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}

/// Extracts per-pose `Affinity` (kcal/mol) and `CNNaffinity` (pK) values.
/// A pose is complete once its `CNNaffinity` line is seen.
pub fn parse_score_output(output: &str) -> Vec<PoseScore> {
    let mut scores = Vec::new();
    let mut vina = None;
    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Affinity:") {
            vina = leading_number(rest);
        } else if let Some(rest) = line.strip_prefix("CNNaffinity:") {
            if let Some(affinity_pk) = leading_number(rest) {
                scores.push(PoseScore {
                    affinity_pk,
                    vina_affinity: vina.take(),
                });
            }
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::tests::ethane;

    const OUTPUT: &str = "\
              _
   ___ _ __  (_)_ __   __ _
Commandline: gnina -r rec.pdb -l poses.sdf --score_only
## Name
Affinity: -6.51432 (kcal/mol)
CNNscore: 0.81234
CNNaffinity: 5.92341
CNNvariance: 0.31

## Name
Affinity: -4.10000 (kcal/mol)
CNNscore: 0.41
CNNaffinity: 4.50000
CNNvariance: 0.40
";

    #[test]
    fn parses_one_score_per_pose() {
        let scores = parse_score_output(OUTPUT);
        assert_eq!(scores.len(), 2);
        assert!((scores[0].affinity_pk - 5.92341).abs() < 1e-9);
        assert_eq!(scores[0].vina_affinity, Some(-6.51432));
        assert!((scores[1].ic50_nanomolar() - 10f64.powf(4.5)).abs() < 1e-6);
    }

    #[test]
    fn missing_cnn_values_yield_no_score() {
        assert!(parse_score_output("Affinity: -5.0 (kcal/mol)\n").is_empty());
        let scores = parse_score_output("CNNaffinity: 6.0\n");
        assert_eq!(scores[0].vina_affinity, None);
    }

    #[test]
    fn missing_executable_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let scorer = GninaScorer::new(Some(dir.path().join("no-such-gnina")));
        let mol = ethane();
        let coords = mol.positions().unwrap();
        let poses = [Pose {
            molecule: &mol,
            coordinates: &coords,
        }];
        let error = scorer.score(&dir.path().join("rec.pdb"), &poses).unwrap_err();
        assert!(matches!(
            error,
            ScoringError::ExecutableNotFound(_) | ScoringError::UnsupportedPlatform(_)
        ));
    }
}
