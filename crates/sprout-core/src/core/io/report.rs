use crate::core::models::congener::{Congener, CongenerStatus};
use crate::core::models::conformer::Conformer;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("CSV error: {0}")]
    Stream(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One line of `summary.csv`: a ranked conformer, or a congener that ended
/// up without conformers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub congener: String,
    pub attachment: usize,
    pub fragment: String,
    pub status: String,
    pub rank: Option<usize>,
    pub file: Option<String>,
    pub energy: Option<f64>,
    pub relative_energy: Option<f64>,
    pub score: Option<f64>,
    pub vina_affinity: Option<f64>,
    pub ic50_nm: Option<f64>,
}

fn status_label(status: CongenerStatus) -> &'static str {
    match status {
        CongenerStatus::Pending => "pending",
        CongenerStatus::Populated => "populated",
        CongenerStatus::Missing => "missing",
    }
}

impl SummaryRow {
    pub fn for_conformer(congener: &Congener, conformer: &Conformer, file: Option<String>) -> Self {
        Self {
            congener: congener.label(),
            attachment: congener.attachment_index,
            fragment: congener.fragment_name.clone(),
            status: status_label(congener.status()).to_string(),
            rank: conformer.rank,
            file,
            energy: conformer.energy,
            relative_energy: conformer.relative_energy,
            score: conformer.score.map(|s| s.affinity_pk),
            vina_affinity: conformer.score.and_then(|s| s.vina_affinity),
            ic50_nm: conformer.score.map(|s| s.ic50_nanomolar()),
        }
    }

    /// Row for a congener with no conformer to report.
    pub fn for_empty(congener: &Congener) -> Self {
        Self::without_pose(congener, status_label(congener.status()))
    }

    /// Row for a congener whose conformers never reached ranking, as after
    /// a cancelled run. Reported as pending.
    pub fn for_unfinished(congener: &Congener) -> Self {
        Self::without_pose(congener, status_label(CongenerStatus::Pending))
    }

    fn without_pose(congener: &Congener, status: &str) -> Self {
        Self {
            congener: congener.label(),
            attachment: congener.attachment_index,
            fragment: congener.fragment_name.clone(),
            status: status.to_string(),
            rank: None,
            file: None,
            energy: None,
            relative_energy: None,
            score: None,
            vina_affinity: None,
            ic50_nm: None,
        }
    }
}

pub fn write_summary<W: Write>(writer: W, rows: &[SummaryRow]) -> Result<(), ReportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_summary_to_path(path: &Path, rows: &[SummaryRow]) -> Result<(), ReportError> {
    let file = std::fs::File::create(path)?;
    write_summary(file, rows)
}

pub fn read_summary<R: Read>(reader: R) -> Result<Vec<SummaryRow>, ReportError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let rows = csv_reader.deserialize().collect::<Result<Vec<SummaryRow>, _>>()?;
    Ok(rows)
}

pub fn read_summary_from_path(path: &Path) -> Result<Vec<SummaryRow>, ReportError> {
    let mut csv_reader = csv::Reader::from_path(path).map_err(|e| ReportError::Csv {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    csv_reader
        .deserialize()
        .collect::<Result<Vec<SummaryRow>, _>>()
        .map_err(|e| ReportError::Csv {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
}
