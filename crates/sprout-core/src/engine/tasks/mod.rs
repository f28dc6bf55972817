//! Pipeline stages.
//!
//! Each task operates on a batch of congeners in place, reports its work
//! through a [`ProgressReporter`](super::progress::ProgressReporter), and
//! never aborts the batch because one congener or conformer failed. Stages
//! leave `Pending` congeners alone, so a cancelled run can be told apart
//! from one that ran out of conformers.

pub mod attachment;
pub mod clash_detection;
pub mod conformer_generation;
pub mod minimization;
pub mod ranking;
